//! Scripted port implementations for tests and dry runs
//!
//! Each double records its calls and replays responses configured up front
//! with builder methods.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Candidate, ChainRoute, Quote};
use super::discovery::{DiscoveryError, DiscoverySource};
use super::execution::{ExecutionError, SwapExecutor, SwapReceipt};
use super::price_oracle::{FeedError, PriceOracle};

/// Oracle that replays a per-token sequence of quote values.
///
/// Once a token's script is exhausted the last successful value repeats, so a
/// monitor keeps polling without triggering.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOracle {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Result<Decimal, FeedError>>>>>,
    last: Arc<Mutex<HashMap<String, Decimal>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to append quote values for a token
    pub fn with_values(self, token: &str, values: &[Decimal]) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(token.to_string()).or_default();
            script.extend(values.iter().copied().map(Ok));
        }
        self
    }

    /// Builder method to append a feed failure for a token
    pub fn with_failure(self, token: &str, error: FeedError) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(token.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Tokens quoted, in call order
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, token: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| t.as_str() == token).count()
    }
}

#[async_trait]
impl PriceOracle for ScriptedOracle {
    async fn quote(
        &self,
        _route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<Quote, FeedError> {
        let token = path.first().cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(token.clone());

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&token)
            .and_then(VecDeque::pop_front);

        let value = match next {
            Some(Ok(value)) => {
                self.last.lock().unwrap().insert(token, value);
                value
            }
            Some(Err(e)) => return Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .get(&token)
                .copied()
                .ok_or_else(|| FeedError::Transport(format!("no quote scripted for {}", token)))?,
        };

        Ok(Quote::new(amount_in, value, path.to_vec()))
    }
}

/// Swap executor that records every swap and answers from configuration.
///
/// By default a swap returns `amount_in` as its output.
#[derive(Debug, Default, Clone)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<(Vec<String>, Decimal)>>>,
    outputs: Arc<Mutex<HashMap<String, Decimal>>>,
    failures: Arc<Mutex<HashMap<String, (Option<u32>, ExecutionError)>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the output of any swap touching `token`
    pub fn with_output(self, token: &str, amount_out: Decimal) -> Self {
        self.outputs.lock().unwrap().insert(token.to_string(), amount_out);
        self
    }

    /// Builder method to make every swap touching `token` fail
    pub fn with_failure(self, token: &str, error: ExecutionError) -> Self {
        self.failures.lock().unwrap().insert(token.to_string(), (None, error));
        self
    }

    /// Builder method to make the next `times` swaps touching `token` fail
    pub fn with_failures(self, token: &str, times: u32, error: ExecutionError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(token.to_string(), (Some(times), error));
        self
    }

    /// Recorded `(path, amount_in)` pairs, in call order
    pub fn get_calls(&self) -> Vec<(Vec<String>, Decimal)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of swaps whose path touches `token`
    pub fn swaps_for(&self, token: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.iter().any(|p| p == token))
            .count()
    }
}

#[async_trait]
impl SwapExecutor for RecordingExecutor {
    async fn execute_swap(
        &self,
        _route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<SwapReceipt, ExecutionError> {
        self.calls.lock().unwrap().push((path.to_vec(), amount_in));

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(token) = path.iter().find(|p| failures.contains_key(*p)).cloned() {
                let exhausted = match failures.get_mut(&token) {
                    Some((None, error)) => return Err(error.clone()),
                    Some((Some(remaining), error)) if *remaining > 0 => {
                        *remaining -= 1;
                        return Err(error.clone());
                    }
                    _ => true,
                };
                if exhausted {
                    failures.remove(&token);
                }
            }
        }

        let amount_out = {
            let outputs = self.outputs.lock().unwrap();
            path.iter()
                .find_map(|p| outputs.get(p).copied())
                .unwrap_or(amount_in)
        };

        Ok(SwapReceipt {
            amount_in,
            amount_out,
            tx_hash: Some(format!("0xmock{}", self.calls.lock().unwrap().len())),
        })
    }
}

/// Discovery source that replays queued results, then reports nothing new
#[derive(Debug, Default, Clone)]
pub struct StaticDiscovery {
    results: Arc<Mutex<VecDeque<Result<Vec<Candidate>, DiscoveryError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue one discovery result
    pub fn with_result(self, result: Result<Vec<Candidate>, DiscoveryError>) -> Self {
        self.results.lock().unwrap().push_back(result);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl DiscoverySource for StaticDiscovery {
    fn name(&self) -> &str {
        "static"
    }

    async fn discover(&self) -> Result<Vec<Candidate>, DiscoveryError> {
        *self.calls.lock().unwrap() += 1;
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
