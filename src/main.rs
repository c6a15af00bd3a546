use anyhow::{Context, Result};
use clap::Parser;

use athlete_gateway::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment from .env takes effect before flags are parsed
    dotenvy::dotenv().ok();
    if let Err(err) = athlete_gateway::init_tracing() {
        eprintln!("Failed to initialize tracing: {err:#}");
    }

    let settings = Settings::parse();
    settings
        .database
        .validate()
        .context("Invalid database configuration")?;

    athlete_gateway::run(settings).await.context("Server error")?;

    Ok(())
}
