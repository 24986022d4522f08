use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price observation along a trade path. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub path: Vec<String>,
}

impl Quote {
    pub fn new(input_amount: Decimal, output_amount: Decimal, path: Vec<String>) -> Self {
        Self {
            input_amount,
            output_amount,
            path,
        }
    }
}
