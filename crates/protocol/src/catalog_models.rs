//! Catalog query models.
//!
//! This module defines the outbound catalog request envelope and the value
//! objects parsed out of catalog responses: the catalog itself, the datasets
//! it advertises and the registry endpoint descriptor used by the
//! digital-twin-registry path.

use crate::jsonld::odrl_context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single equality filter inside a catalog query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    #[serde(rename = "leftOperand")]
    pub left_operand: String,

    pub operator: String,

    #[serde(rename = "rightOperand")]
    pub right_operand: String,
}

impl FilterExpression {
    /// Equality filter `key = value`.
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            left_operand: key.into(),
            operator: "=".to_string(),
            right_operand: value.into(),
        }
    }
}

/// Query restriction carried by a catalog request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    #[serde(rename = "filterExpression")]
    pub filter_expression: Vec<FilterExpression>,
}

/// Outbound catalog request envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogRequest {
    #[serde(rename = "@context")]
    pub context: Value,

    #[serde(rename = "counterPartyAddress")]
    pub counter_party_address: String,

    #[serde(rename = "querySpec")]
    pub query_spec: QuerySpec,
}

impl CatalogRequest {
    /// Catalog request with a single equality filter expression.
    pub fn by_filter(
        counter_party_address: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            context: odrl_context(),
            counter_party_address: counter_party_address.into(),
            query_spec: QuerySpec {
                filter_expression: vec![FilterExpression::equals(key, value)],
            },
        }
    }
}

/// A catalog advertised by a provider connector.
///
/// The dataset payload is kept raw: depending on the provider it is a single
/// object or a list, and the engine only ever indexes it by asset id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Catalog {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,

    #[serde(
        rename = "edc:participantId",
        alias = "participantId",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub participant_id: Option<String>,

    #[serde(
        rename = "dcat:dataset",
        alias = "dataset",
        alias = "contractOffers",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub contract_offers: Option<Value>,
}

/// One advertised asset together with its offer policies.
///
/// The policy payload is raw as well: a single policy object or a list of
/// candidates, resolved by the negotiation driver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dataset {
    #[serde(rename = "edc:id", alias = "@id", alias = "assetId")]
    pub asset_id: String,

    #[serde(rename = "odrl:hasPolicy", alias = "hasPolicy", alias = "policy")]
    pub policy: Value,
}

/// Descriptor of one digital-twin-registry endpoint discovered during
/// search, carrying everything a registry transfer needs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Dtr {
    /// Provider connector base URL.
    pub endpoint: String,

    /// Asset id of the registry asset.
    pub asset_id: String,

    /// Contract agreement id negotiated for the registry asset.
    pub contract_id: String,

    /// Business-partner identifier of the registry owner, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bpn: Option<String>,
}
