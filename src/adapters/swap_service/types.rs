use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of both `POST /approve` and `POST /swap`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub chain_id: u64,
    pub dex_id: String,
    pub path: Vec<String>,
    pub amount_in: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    /// Realized amount of the last asset in the path
    pub amount_out: Decimal,
    #[serde(default)]
    pub tx_hash: Option<String>,
}
