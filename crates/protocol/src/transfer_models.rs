//! Transfer process models.
//!
//! Symmetric to the negotiation models: the outbound transfer request
//! envelope and the observed remote transfer state.

use crate::jsonld::odrl_context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote transfer states that end the polling loop successfully.
pub const TRANSFER_SUCCESS: [&str; 3] = ["COMPLETED", "VERIFIED", "FINALIZED"];

/// Remote transfer states that end the polling loop as a failure.
pub const TRANSFER_FAILURE: [&str; 3] = ["ERROR", "TERMINATED", "TERMINATING"];

/// Wire protocol identifier sent with every transfer request.
pub const DATASPACE_PROTOCOL: &str = "dataspace-protocol-http";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferType {
    pub content_type: String,
    pub is_finite: bool,
}

impl Default for TransferType {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            is_finite: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DataDestination {
    #[serde(rename = "type")]
    pub destination_type: String,
}

impl Default for DataDestination {
    fn default() -> Self {
        Self {
            destination_type: "HttpProxy".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateProperties {
    /// Callback endpoint the data plane pushes the artifact to.
    pub receiver_http_endpoint: String,
}

/// Outbound transfer process request envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransferRequest {
    #[serde(rename = "@context")]
    pub context: Value,

    #[serde(rename = "assetId")]
    pub asset_id: String,

    #[serde(rename = "counterPartyAddress")]
    pub counter_party_address: String,

    #[serde(rename = "counterPartyId")]
    pub counter_party_id: String,

    #[serde(rename = "contractId")]
    pub contract_id: String,

    #[serde(rename = "dataDestination")]
    pub data_destination: DataDestination,

    #[serde(rename = "managedResources")]
    pub managed_resources: bool,

    #[serde(rename = "privateProperties")]
    pub private_properties: PrivateProperties,

    pub protocol: String,

    #[serde(rename = "transferType")]
    pub transfer_type: TransferType,
}

impl TransferRequest {
    /// Transfer request with the fixed engine defaults: HttpProxy
    /// destination, finite octet-stream payload, unmanaged resources.
    pub fn new(
        asset_id: impl Into<String>,
        counter_party_address: impl Into<String>,
        counter_party_id: impl Into<String>,
        contract_id: impl Into<String>,
        receiver_http_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            context: odrl_context(),
            asset_id: asset_id.into(),
            counter_party_address: counter_party_address.into(),
            counter_party_id: counter_party_id.into(),
            contract_id: contract_id.into(),
            data_destination: DataDestination::default(),
            managed_resources: false,
            private_properties: PrivateProperties {
                receiver_http_endpoint: receiver_http_endpoint.into(),
            },
            protocol: DATASPACE_PROTOCOL.to_string(),
            transfer_type: TransferType::default(),
        }
    }
}

/// Observed state of a remote transfer process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    #[serde(rename = "@id", alias = "id")]
    pub id: String,

    #[serde(rename = "edc:state", alias = "state")]
    pub state: String,
}

impl Transfer {
    /// Whether `state` ends the transfer polling loop.
    pub fn is_terminal(state: &str) -> bool {
        TRANSFER_SUCCESS.contains(&state) || TRANSFER_FAILURE.contains(&state)
    }

    /// Whether this transfer ended in a terminal-success state.
    pub fn is_successful(&self) -> bool {
        TRANSFER_SUCCESS.contains(&self.state.as_str())
    }
}
