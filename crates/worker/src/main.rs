use clap::Parser;
use std::sync::Arc;
use tickerlens_core::enrich::pipeline::{BatchRunner, RunOptions};
use tickerlens_core::ingest::yahoo::YahooFinanceClient;
use tickerlens_core::llm::catalog::ModelCatalog;
use tickerlens_core::llm::gemini::GeminiClient;
use tickerlens_core::llm::LlmClient;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tickerlens_worker")]
struct Args {
    /// Ticker id to start tracking (e.g. 2330). Prepended to this run.
    #[arg(long)]
    add: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let llm = build_llm(&settings);
    let catalog = match llm.as_deref() {
        Some(client) => ModelCatalog::discover(client).await,
        None => ModelCatalog::defaults(),
    };
    let preview: Vec<&str> = catalog.iter().take(3).map(|m| m.display_name()).collect();
    tracing::info!(models = ?preview, total = catalog.len(), "model priority list ready");

    let market = Arc::new(YahooFinanceClient::from_settings(&settings)?);
    let runner = BatchRunner::new(market, llm, catalog, RunOptions::from_settings(&settings));

    let previous = tickerlens_core::storage::state::load_state(&settings.data_path);
    let records = runner.run(previous, args.add.as_deref()).await;

    if let Err(err) = tickerlens_core::storage::state::save_state(&settings.data_path, &records) {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(path = %settings.data_path.display(), error = %err, "failed to save state");
        return Err(err);
    }

    Ok(())
}

fn build_llm(settings: &tickerlens_core::config::Settings) -> Option<Arc<dyn LlmClient>> {
    if settings.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; running facts-only");
        return None;
    }
    match GeminiClient::from_settings(settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "failed to build Gemini client; running facts-only");
            None
        }
    }
}

fn init_sentry(settings: &tickerlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
