//! Contract negotiation models.
//!
//! The negotiation is a remote state machine: the engine starts it, then
//! observes its state through polling. Everything here is either the
//! outbound request envelope or the parsed observation.

use crate::catalog_models::Dataset;
use crate::jsonld::odrl_context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote negotiation states that end the polling loop successfully.
pub const NEGOTIATION_SUCCESS: [&str; 2] = ["CONFIRMED", "FINALIZED"];

/// Remote negotiation states that end the polling loop as a failure.
pub const NEGOTIATION_FAILURE: [&str; 3] = ["ERROR", "TERMINATED", "TERMINATING"];

/// An offer policy as advertised in a catalog dataset.
///
/// Only the identifier is meaningful to the engine; the body is carried
/// verbatim so the counterparty receives its own terms back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Policy {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Policy {
    /// Copy of this policy with the identifier cleared, used as the
    /// agreement proposal inside an offer.
    pub fn as_proposal(&self) -> Self {
        Self {
            id: None,
            body: self.body.clone(),
        }
    }
}

/// The offer the engine chose to negotiate: one policy paired with the
/// asset it covers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Identifier of the chosen policy, echoed back to the counterparty.
    pub offer_id: String,

    /// Asset the offer covers.
    pub asset_id: String,

    /// Agreement proposal: the chosen policy with its id cleared.
    pub policy: Policy,
}

impl Offer {
    /// Project an offer out of a dataset.
    ///
    /// A dataset advertises either a single policy object or a list of
    /// candidates; on conflict the first policy wins. Returns `None` when
    /// the payload holds no usable policy.
    pub fn from_dataset(dataset: &Dataset) -> Option<Self> {
        let raw = match &dataset.policy {
            Value::Array(candidates) => candidates.first()?,
            other => other,
        };
        let policy: Policy = serde_json::from_value(raw.clone()).ok()?;
        let offer_id = policy.id.clone()?;
        Some(Self {
            offer_id,
            asset_id: dataset.asset_id.clone(),
            policy: policy.as_proposal(),
        })
    }
}

/// Outbound contract negotiation request envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NegotiationRequest {
    #[serde(rename = "@context")]
    pub context: Value,

    #[serde(rename = "counterPartyAddress")]
    pub counter_party_address: String,

    #[serde(rename = "counterPartyId")]
    pub counter_party_id: String,

    pub offer: Offer,
}

impl NegotiationRequest {
    pub fn new(
        counter_party_address: impl Into<String>,
        counter_party_id: impl Into<String>,
        offer: Offer,
    ) -> Self {
        Self {
            context: odrl_context(),
            counter_party_address: counter_party_address.into(),
            counter_party_id: counter_party_id.into(),
            offer,
        }
    }
}

/// Identifier response returned when a negotiation or transfer is started.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdResponse {
    #[serde(rename = "@id", alias = "id")]
    pub id: String,

    #[serde(
        rename = "edc:createdAt",
        alias = "createdAt",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub created_at: Option<i64>,
}

impl IdResponse {
    /// Placeholder persisted before the remote call returns, so a crash in
    /// between leaves a diagnosable journal. The process id stands in for
    /// the not-yet-known remote id.
    pub fn placeholder(process_id: impl Into<String>) -> Self {
        Self {
            id: process_id.into(),
            created_at: None,
        }
    }
}

/// Observed state of a remote contract negotiation.
///
/// The state is kept as the raw label: the engine only classifies it
/// against the terminal sets and otherwise treats it as observational.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    #[serde(rename = "@id", alias = "id")]
    pub id: String,

    #[serde(rename = "edc:state", alias = "state")]
    pub state: String,

    /// Set by the counterparty once the negotiation succeeds; required to
    /// start a transfer.
    #[serde(
        rename = "edc:contractAgreementId",
        alias = "contractAgreementId",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub contract_agreement_id: Option<String>,
}

impl Negotiation {
    /// Whether `state` ends the negotiation polling loop.
    pub fn is_terminal(state: &str) -> bool {
        NEGOTIATION_SUCCESS.contains(&state) || NEGOTIATION_FAILURE.contains(&state)
    }

    /// Whether this negotiation ended in a terminal-success state.
    pub fn is_successful(&self) -> bool {
        NEGOTIATION_SUCCESS.contains(&self.state.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(policy: Value) -> Dataset {
        Dataset {
            asset_id: "urn:uuid:a1".to_string(),
            policy,
        }
    }

    #[test]
    fn test_offer_from_single_policy() {
        let dataset = dataset(json!({"@id": "pol-1", "odrl:permission": []}));
        let offer = Offer::from_dataset(&dataset).unwrap();

        assert_eq!(offer.offer_id, "pol-1");
        assert_eq!(offer.asset_id, "urn:uuid:a1");
        // The embedded proposal must not carry the policy id.
        assert!(offer.policy.id.is_none());
        assert!(offer.policy.body.contains_key("odrl:permission"));
    }

    #[test]
    fn test_offer_takes_first_policy_on_conflict() {
        let dataset = dataset(json!([
            {"@id": "pol-1"},
            {"@id": "pol-2"}
        ]));
        let offer = Offer::from_dataset(&dataset).unwrap();
        assert_eq!(offer.offer_id, "pol-1");
    }

    #[test]
    fn test_offer_requires_a_policy_id() {
        let dataset = dataset(json!({"odrl:permission": []}));
        assert!(Offer::from_dataset(&dataset).is_none());

        let empty = Dataset {
            asset_id: "urn:uuid:a1".to_string(),
            policy: json!([]),
        };
        assert!(Offer::from_dataset(&empty).is_none());
    }

    #[test]
    fn test_negotiation_terminal_sets() {
        for state in NEGOTIATION_SUCCESS.iter().chain(NEGOTIATION_FAILURE.iter()) {
            assert!(Negotiation::is_terminal(state), "{state} should be terminal");
        }
        assert!(!Negotiation::is_terminal("REQUESTED"));
        assert!(!Negotiation::is_terminal("NEGOTIATING"));
    }

    #[test]
    fn test_negotiation_parses_prefixed_body() {
        let negotiation: Negotiation = serde_json::from_value(json!({
            "@id": "neg-1",
            "edc:state": "FINALIZED",
            "edc:contractAgreementId": "agreement-1"
        }))
        .unwrap();

        assert!(negotiation.is_successful());
        assert_eq!(negotiation.contract_agreement_id.as_deref(), Some("agreement-1"));
    }
}
