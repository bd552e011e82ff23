use crate::config::Settings;
use crate::domain::record::StockRecord;
use crate::enrich::{merge, prompt};
use crate::ingest::collector::{collect_market_fact, normalize_ticker};
use crate::ingest::provider::MarketDataProvider;
use crate::llm::catalog::ModelCatalog;
use crate::llm::failover::{invoke_with_failover, FailoverOutcome};
use crate::llm::LlmClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub market_suffix: String,
    /// Pause between consecutive tickers to stay under provider rate limits.
    pub ticker_delay: Duration,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            market_suffix: settings.market_suffix.clone(),
            ticker_delay: settings.ticker_delay,
        }
    }
}

/// Processing order for a run: previous ids (suffix stripped) in stored order,
/// with `add` (uppercased, suffix stripped) prepended unless already tracked.
pub fn target_order(previous: &[StockRecord], add: Option<&str>, market_suffix: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::with_capacity(previous.len() + 1);
    for rec in previous {
        let id = normalize_ticker(&rec.id, market_suffix);
        if !targets.contains(&id) {
            targets.push(id);
        }
    }

    if let Some(raw) = add {
        let id = normalize_ticker(&raw.trim().to_uppercase(), &market_suffix.to_uppercase());
        if !id.is_empty() && !targets.contains(&id) {
            targets.insert(0, id);
        }
    }

    targets
}

pub struct BatchRunner {
    market: Arc<dyn MarketDataProvider>,
    llm: Option<Arc<dyn LlmClient>>,
    catalog: ModelCatalog,
    options: RunOptions,
}

impl BatchRunner {
    /// `llm = None` runs facts-only: every record gets the AI defaults.
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        llm: Option<Arc<dyn LlmClient>>,
        catalog: ModelCatalog,
        options: RunOptions,
    ) -> Self {
        Self {
            market,
            llm,
            catalog,
            options,
        }
    }

    /// Runs every target ticker in order and returns the new state. Never
    /// fails: a ticker that cannot be processed is carried over or dropped.
    pub async fn run(&self, previous: Vec<StockRecord>, add: Option<&str>) -> Vec<StockRecord> {
        let targets = target_order(&previous, add, &self.options.market_suffix);
        let previous_by_id: HashMap<String, StockRecord> = previous
            .into_iter()
            .map(|r| (normalize_ticker(&r.id, &self.options.market_suffix), r))
            .collect();

        tracing::info!(
            tickers = targets.len(),
            models = self.catalog.len(),
            ai_enabled = self.llm.is_some(),
            market = self.market.provider_name(),
            "starting watchlist run"
        );

        let mut out = Vec::with_capacity(targets.len());
        let mut carried: usize = 0;
        let mut dropped: usize = 0;

        for (idx, ticker) in targets.iter().enumerate() {
            if idx != 0 && !self.options.ticker_delay.is_zero() {
                tokio::time::sleep(self.options.ticker_delay).await;
            }

            match self.process_ticker(ticker, previous_by_id.get(ticker)).await {
                TickerResult::Fresh(rec) => out.push(rec),
                TickerResult::Carried(rec) => {
                    carried += 1;
                    out.push(rec);
                }
                TickerResult::Dropped => dropped += 1,
            }
        }

        tracing::info!(
            records = out.len(),
            carried,
            dropped,
            "watchlist run finished"
        );
        out
    }

    /// `ticker` is already suffix-stripped by [`target_order`].
    async fn process_ticker(&self, ticker: &str, previous: Option<&StockRecord>) -> TickerResult {
        tracing::info!(%ticker, "analyzing");

        let Some(fact) =
            collect_market_fact(self.market.as_ref(), ticker, &self.options.market_suffix).await
        else {
            return match merge::carry_over(ticker, previous) {
                Some(rec) => TickerResult::Carried(rec),
                None => TickerResult::Dropped,
            };
        };

        let outcome = match &self.llm {
            Some(llm) => {
                let prompt = prompt::build_prompt(&fact);
                invoke_with_failover(llm.as_ref(), &self.catalog, &prompt, ticker).await
            }
            None => FailoverOutcome::Exhausted,
        };

        let updated_at = chrono::Local::now().naive_local();
        TickerResult::Fresh(merge::build_record(&fact, &outcome, previous, updated_at))
    }
}

enum TickerResult {
    Fresh(StockRecord),
    Carried(StockRecord),
    Dropped,
}
