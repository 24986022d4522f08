//! Quote Service Client
//!
//! Values a trade path by asking the quote API what `amount_in` of the first
//! asset yields at the end of the path.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::http::{HttpError, ServiceClient, ServiceConfig};
use crate::domain::{ChainRoute, Quote};
use crate::ports::{FeedError, PriceOracle};
use super::types::{QuoteParams, QuoteResponse};

#[derive(Debug, Clone)]
pub struct QuoteServiceClient {
    client: ServiceClient,
}

impl QuoteServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self, FeedError> {
        let client = ServiceClient::new(config).map_err(FeedError::from)?;
        Ok(Self { client })
    }

    pub fn api_url(&self) -> &str {
        self.client.api_url()
    }

    /// Raw `GET /quote`
    pub async fn get_quote(&self, params: &QuoteParams) -> Result<QuoteResponse, FeedError> {
        let request = self.client.get("quote").query(params);
        Ok(self.client.json(request).await?)
    }
}

impl From<HttpError> for FeedError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Status { status, body } => FeedError::Http { status, body },
            HttpError::Decode(msg) => FeedError::Malformed(msg),
            HttpError::Client(msg) | HttpError::Transport(msg) => FeedError::Transport(msg),
        }
    }
}

#[async_trait]
impl PriceOracle for QuoteServiceClient {
    async fn quote(
        &self,
        route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<Quote, FeedError> {
        let params = QuoteParams::new(route.chain_id, &route.dex_id, path, amount_in);
        let response = self.get_quote(&params).await?;

        if response.amounts_out.len() != path.len() {
            tracing::debug!(
                "Quote returned {} amounts for a {}-hop path",
                response.amounts_out.len(),
                path.len()
            );
        }

        let output = response
            .final_amount()
            .ok_or_else(|| FeedError::Malformed("empty amountsOut".into()))?;

        if output.is_sign_negative() {
            return Err(FeedError::Malformed(format!("negative output amount {}", output)));
        }

        Ok(Quote::new(amount_in, output, path.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn route() -> ChainRoute {
        ChainRoute {
            blockchain: "bsc".to_string(),
            chain_id: 56,
            dex_id: "pancakeswap".to_string(),
            quote_asset: "0xUSDT".to_string(),
        }
    }

    fn client(url: &str) -> QuoteServiceClient {
        let mut config = ServiceConfig::new(url);
        config.max_retries = 1;
        QuoteServiceClient::new(config).unwrap()
    }

    fn path() -> Vec<String> {
        vec!["0xPEPE".to_string(), "0xUSDT".to_string()]
    }

    #[tokio::test]
    async fn test_quote_uses_last_amount() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chainId".into(), "56".into()),
                Matcher::UrlEncoded("dexId".into(), "pancakeswap".into()),
                Matcher::UrlEncoded("path".into(), "0xPEPE,0xUSDT".into()),
                Matcher::UrlEncoded("amountIn".into(), "1000".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"amountsOut": ["1000", "42.5"]}"#)
            .create_async()
            .await;

        let quote = client(&server.url()).quote(&route(), &path(), dec!(1000)).await.unwrap();
        assert_eq!(quote.output_amount, dec!(42.5));
        assert_eq!(quote.input_amount, dec!(1000));
        assert_eq!(quote.path, path());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_amounts_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"amountsOut": []}"#)
            .create_async()
            .await;

        let result = client(&server.url()).quote(&route(), &path(), dec!(1)).await;
        assert_eq!(result, Err(FeedError::Malformed("empty amountsOut".into())));
    }

    #[tokio::test]
    async fn test_http_error_maps_to_feed_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let result = client(&server.url()).quote(&route(), &path(), dec!(1)).await;
        assert_eq!(
            result,
            Err(FeedError::Http { status: 502, body: "bad gateway".into() })
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // nothing listens on port 9 locally
        let result = client("http://127.0.0.1:9").quote(&route(), &path(), dec!(1)).await;
        assert!(matches!(result, Err(FeedError::Transport(_))));
    }
}
