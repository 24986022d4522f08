use serde::{Deserialize, Serialize};

/// A newly listed token reported by the discovery scraper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub blockchain: String,
    pub ticker: String,
    pub contract_address: String,
}

impl Candidate {
    pub fn new(blockchain: &str, ticker: &str, contract_address: &str) -> Self {
        Self {
            blockchain: blockchain.to_string(),
            ticker: ticker.to_string(),
            contract_address: contract_address.to_string(),
        }
    }
}
