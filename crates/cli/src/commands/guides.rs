//! `sqlclaw guides`: Run guide retrieval on its own.

use sqlclaw_config::AppConfig;

use super::{provider, retriever};

pub async fn run(config: AppConfig, term: &str) -> anyhow::Result<()> {
    // Keyword scoring works offline; the model-backed stages need a key.
    let provider = if config.has_api_key() {
        Some(provider(&config)?)
    } else {
        None
    };
    let retriever = retriever(&config, provider)?;
    println!("{}", retriever.retrieve(term).await);
    Ok(())
}
