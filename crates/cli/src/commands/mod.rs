//! Subcommands and the wiring they share.

pub mod ask;
pub mod eval;
pub mod guides;

use std::sync::Arc;

use anyhow::{Context, bail};
use sqlclaw_agent::{Agent, LlmVerifier, Verifier};
use sqlclaw_config::AppConfig;
use sqlclaw_core::provider::Provider;
use sqlclaw_core::tool::ToolRegistry;
use sqlclaw_database::{SqlEngine, SqliteEngine};
use sqlclaw_eval::AgentFactory;
use sqlclaw_guides::{GuideIndex, GuideRetriever, LlmGuideValidator, ProviderEmbedder};
use sqlclaw_providers::OpenAiCompatProvider;
use sqlclaw_tools::GenerateSqlTool;
use tracing::info;

/// The configured provider, or a setup hint when no key is available.
pub fn provider(config: &AppConfig) -> anyhow::Result<Arc<dyn Provider>> {
    let Some(api_key) = &config.api_key else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    SQLCLAW_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    };
    let provider = OpenAiCompatProvider::new("openrouter", &config.api_url, api_key)?;
    Ok(Arc::new(provider))
}

/// Guide retrieval with the semantic and validation stages the config
/// enables. Both need a provider.
pub fn retriever(
    config: &AppConfig,
    provider: Option<Arc<dyn Provider>>,
) -> anyhow::Result<GuideRetriever> {
    let index = GuideIndex::load_dir(&config.guides.dir)
        .with_context(|| format!("loading guides from {}", config.guides.dir.display()))?;
    let mut retriever = GuideRetriever::new(index);
    if let Some(provider) = provider {
        if let Some(model) = &config.guides.embedding_model {
            retriever = retriever.with_embedder(Arc::new(ProviderEmbedder::new(provider.clone(), model)));
        }
        if let Some(model) = &config.guides.validator_model {
            retriever = retriever.with_validator(Arc::new(LlmGuideValidator::new(provider, model)));
        }
    }
    Ok(retriever)
}

/// Everything needed to build agents over one database.
pub struct AgentKit {
    config: AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    verifier: Option<Arc<dyn Verifier>>,
    engine: Arc<dyn SqlEngine>,
}

impl AgentKit {
    pub async fn load(config: AppConfig) -> anyhow::Result<Self> {
        let provider = provider(&config)?;
        let engine: Arc<dyn SqlEngine> = Arc::new(
            SqliteEngine::open(&config.database.path, config.database.attach_dir.as_deref()).await?,
        );
        let retriever = Arc::new(retriever(&config, Some(provider.clone()))?);
        let verifier: Option<Arc<dyn Verifier>> = config
            .verifier
            .enabled
            .then(|| Arc::new(LlmVerifier::new(provider.clone(), &config.verifier.model)) as Arc<dyn Verifier>);

        let generator = config
            .agent
            .nl2sql_model
            .as_ref()
            .map(|model| GenerateSqlTool::new(provider.clone(), model));

        let tools = Arc::new(sqlclaw_tools::sql_registry(
            engine.clone(),
            retriever.clone(),
            verifier.clone(),
            generator,
            config.database.max_rows,
            config.database.max_output_chars,
        ));
        info!(
            model = %config.model,
            tools = tools.len(),
            guides = retriever.index().len(),
            verifier = verifier.is_some(),
            nl2sql = ?config.agent.nl2sql_model,
            "Agent kit ready"
        );

        Ok(Self {
            config,
            provider,
            tools,
            verifier,
            engine,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> Arc<dyn SqlEngine> {
        self.engine.clone()
    }
}

impl AgentFactory for AgentKit {
    fn build(&self) -> Agent {
        Agent::from_config(
            &self.config,
            self.provider.clone(),
            self.tools.clone(),
            self.verifier.clone(),
        )
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}
