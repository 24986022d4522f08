//! Swap Service Client
//!
//! Approve-then-swap against the transaction service. A 4xx from `/approve`
//! is an approval rejection, a 4xx from `/swap` a rejected transaction;
//! network failures and 5xx responses are transport errors.
//!
//! Both steps are sent exactly once. The service signs and broadcasts, so a
//! resend after a lost response could execute the swap twice; retrying a sell
//! is left to the caller.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::http::{HttpError, ServiceClient, ServiceConfig};
use crate::domain::ChainRoute;
use crate::ports::{ExecutionError, SwapExecutor, SwapReceipt};
use super::types::{ApproveResponse, SwapRequest, SwapResponse};

#[derive(Debug, Clone)]
pub struct SwapServiceClient {
    client: ServiceClient,
}

impl SwapServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self, ExecutionError> {
        let client = ServiceClient::new(config).map_err(|e| ExecutionError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn api_url(&self) -> &str {
        self.client.api_url()
    }

    pub async fn approve(&self, request: &SwapRequest) -> Result<ApproveResponse, ExecutionError> {
        let req = self.client.post("approve").json(request);
        self.client
            .json_once(req)
            .await
            .map_err(|e| classify(e, ExecutionError::ApprovalRejected))
    }

    pub async fn swap(&self, request: &SwapRequest) -> Result<SwapResponse, ExecutionError> {
        let req = self.client.post("swap").json(request);
        self.client
            .json_once(req)
            .await
            .map_err(|e| classify(e, ExecutionError::TransactionRejected))
    }
}

/// Client errors are rejections of the step; everything else is transport
fn classify(e: HttpError, rejected: fn(String) -> ExecutionError) -> ExecutionError {
    match e {
        HttpError::Status { status, body } if (400..500).contains(&status) && status != 429 => {
            rejected(format!("HTTP {}: {}", status, body))
        }
        other => ExecutionError::Transport(other.to_string()),
    }
}

#[async_trait]
impl SwapExecutor for SwapServiceClient {
    async fn execute_swap(
        &self,
        route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<SwapReceipt, ExecutionError> {
        if path.len() < 2 {
            return Err(ExecutionError::InvalidParameters(format!(
                "path needs at least two assets, got {}",
                path.len()
            )));
        }
        if amount_in <= Decimal::ZERO {
            return Err(ExecutionError::InvalidParameters(format!(
                "amount_in must be positive, got {}",
                amount_in
            )));
        }

        let request = SwapRequest {
            chain_id: route.chain_id,
            dex_id: route.dex_id.clone(),
            path: path.to_vec(),
            amount_in,
        };

        let approval = self.approve(&request).await?;
        tracing::debug!(
            "Approved {} of {} (tx: {})",
            amount_in,
            path[0],
            approval.tx_hash.as_deref().unwrap_or("n/a")
        );

        let swap = self.swap(&request).await?;
        Ok(SwapReceipt {
            amount_in,
            amount_out: swap.amount_out,
            tx_hash: swap.tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn route() -> ChainRoute {
        ChainRoute {
            blockchain: "ethereum".to_string(),
            chain_id: 1,
            dex_id: "uniswap".to_string(),
            quote_asset: "0xUSDC".to_string(),
        }
    }

    fn client(url: &str) -> SwapServiceClient {
        let mut config = ServiceConfig::new(url);
        config.max_retries = 1;
        SwapServiceClient::new(config).unwrap()
    }

    fn path() -> Vec<String> {
        vec!["0xUSDC".to_string(), "0xPEPE".to_string()]
    }

    #[tokio::test]
    async fn test_approve_then_swap() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "chainId": 1,
            "dexId": "uniswap",
            "path": ["0xUSDC", "0xPEPE"],
            "amountIn": "25"
        });
        let approve = server
            .mock("POST", "/approve")
            .match_body(Matcher::Json(body.clone()))
            .with_status(200)
            .with_body(r#"{"txHash": "0xapprove"}"#)
            .create_async()
            .await;
        let swap = server
            .mock("POST", "/swap")
            .match_body(Matcher::Json(body))
            .with_status(200)
            .with_body(r#"{"amountOut": "1234567.5", "txHash": "0xswap"}"#)
            .create_async()
            .await;

        let receipt = client(&server.url())
            .execute_swap(&route(), &path(), dec!(25))
            .await
            .unwrap();

        assert_eq!(receipt.amount_out, dec!(1234567.5));
        assert_eq!(receipt.tx_hash.as_deref(), Some("0xswap"));
        approve.assert_async().await;
        swap.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_approval_skips_swap() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/approve")
            .with_status(403)
            .with_body("allowance denied")
            .create_async()
            .await;
        let swap = server.mock("POST", "/swap").expect(0).create_async().await;

        let result = client(&server.url()).execute_swap(&route(), &path(), dec!(25)).await;
        assert!(matches!(result, Err(ExecutionError::ApprovalRejected(msg)) if msg.contains("allowance denied")));
        swap.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_swap() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/approve")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("POST", "/swap")
            .with_status(422)
            .with_body("execution reverted")
            .create_async()
            .await;

        let result = client(&server.url()).execute_swap(&route(), &path(), dec!(25)).await;
        assert!(matches!(result, Err(ExecutionError::TransactionRejected(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/approve")
            .with_status(500)
            .with_body("node down")
            .create_async()
            .await;

        let result = client(&server.url()).execute_swap(&route(), &path(), dec!(25)).await;
        assert!(matches!(result, Err(ExecutionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_swap_not_resubmitted_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/approve")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let swap = server
            .mock("POST", "/swap")
            .with_status(503)
            .with_body("upstream timeout")
            .expect(1)
            .create_async()
            .await;

        // default config allows three attempts for idempotent requests
        let c = SwapServiceClient::new(ServiceConfig::new(server.url())).unwrap();
        let result = c.execute_swap(&route(), &path(), dec!(25)).await;

        assert!(matches!(result, Err(ExecutionError::Transport(_))));
        swap.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected_locally() {
        let c = client("http://127.0.0.1:9");
        let short = vec!["0xUSDC".to_string()];
        assert!(matches!(
            c.execute_swap(&route(), &short, dec!(1)).await,
            Err(ExecutionError::InvalidParameters(_))
        ));
        assert!(matches!(
            c.execute_swap(&route(), &path(), Decimal::ZERO).await,
            Err(ExecutionError::InvalidParameters(_))
        ));
    }
}
