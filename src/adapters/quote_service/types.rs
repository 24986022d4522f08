use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /quote`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    pub chain_id: u64,
    pub dex_id: String,
    /// Comma-separated token addresses
    pub path: String,
    pub amount_in: String,
}

impl QuoteParams {
    pub fn new(chain_id: u64, dex_id: &str, path: &[String], amount_in: Decimal) -> Self {
        Self {
            chain_id,
            dex_id: dex_id.to_string(),
            path: path.join(","),
            amount_in: amount_in.normalize().to_string(),
        }
    }
}

/// Response of `GET /quote`: one amount per hop, input first
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub amounts_out: Vec<Decimal>,
}

impl QuoteResponse {
    /// Amount received at the end of the path
    pub fn final_amount(&self) -> Option<Decimal> {
        self.amounts_out.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_response_parses_decimal_strings() {
        let json = r#"{"amountsOut": ["1000", "12.345678901234567890"]}"#;
        let response: QuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.final_amount(), Some(dec!(12.345678901234567890)));
    }

    #[test]
    fn test_params_encoding() {
        let path = vec!["0xA".to_string(), "0xUSDT".to_string()];
        let params = QuoteParams::new(56, "pancakeswap", &path, dec!(1500.000));
        assert_eq!(params.path, "0xA,0xUSDT");
        assert_eq!(params.amount_in, "1500");

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["chainId"], 56);
        assert_eq!(value["dexId"], "pancakeswap");
        assert_eq!(value["amountIn"], "1500");
    }
}
