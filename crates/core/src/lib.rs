pub mod domain;
pub mod enrich;
pub mod ingest;
pub mod llm;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::time::Duration;

    pub const DEFAULT_MARKET_SUFFIX: &str = ".TW";
    pub const DEFAULT_DATA_PATH: &str = "data.json";
    pub const DEFAULT_TICKER_DELAY_MS: u64 = 2000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub market_data_base_url: Option<String>,
        pub market_suffix: String,
        pub data_path: PathBuf,
        pub ticker_delay: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let ticker_delay_ms = std::env::var("TICKER_DELAY_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_TICKER_DELAY_MS);

            Ok(Self {
                gemini_api_key: std::env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                market_suffix: std::env::var("MARKET_SUFFIX")
                    .unwrap_or_else(|_| DEFAULT_MARKET_SUFFIX.to_string()),
                data_path: std::env::var("WATCHLIST_DATA_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
                ticker_delay: Duration::from_millis(ticker_delay_ms),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }
    }
}
