//! Chain Routing
//!
//! Static mapping from a blockchain name (as reported by discovery) to the
//! routing metadata the quote and swap services need.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Routing metadata for one blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRoute {
    /// Normalized blockchain name (lowercase)
    pub blockchain: String,
    /// Numeric chain id
    pub chain_id: u64,
    /// DEX identifier understood by the quote/swap services
    pub dex_id: String,
    /// Address of the quote asset (stablecoin) positions are valued in
    pub quote_asset: String,
}

/// Read-only registry of supported chains, keyed case-insensitively
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    routes: HashMap<String, ChainRoute>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a chain
    pub fn with_chain(
        mut self,
        blockchain: &str,
        chain_id: u64,
        dex_id: &str,
        quote_asset: &str,
    ) -> Self {
        self.insert(ChainRoute {
            blockchain: normalize(blockchain),
            chain_id,
            dex_id: dex_id.to_string(),
            quote_asset: quote_asset.to_string(),
        });
        self
    }

    pub fn insert(&mut self, mut route: ChainRoute) {
        route.blockchain = normalize(&route.blockchain);
        self.routes.insert(route.blockchain.clone(), route);
    }

    /// Resolve routing metadata for a blockchain name
    pub fn resolve(&self, blockchain: &str) -> Option<&ChainRoute> {
        self.routes.get(&normalize(blockchain))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Supported chain names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn normalize(blockchain: &str) -> String {
    blockchain.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ChainRegistry {
        ChainRegistry::new()
            .with_chain("BSC", 56, "pancakeswap", "0x55d398326f99059fF775485246999027B3197955")
            .with_chain("ethereum", 1, "uniswap", "0xdAC17F958D2ee523a2206206994597C13D831ec7")
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = registry();
        let route = registry.resolve("bsc").unwrap();
        assert_eq!(route.chain_id, 56);
        assert_eq!(route.dex_id, "pancakeswap");
        assert!(registry.resolve("  Ethereum ").is_some());
    }

    #[test]
    fn test_resolve_unknown_chain() {
        assert!(registry().resolve("solana").is_none());
    }

    #[test]
    fn test_names_sorted() {
        assert_eq!(registry().names(), vec!["bsc", "ethereum"]);
    }
}
