//! Ratchet - New-listing sniper with a trailing stop-loss

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (API keys go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = ratchet::adapters::cli::init();
    ratchet::adapters::cli::execute(app).await
}
