use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteSnapshot {
    pub last_price: f64,
    pub previous_close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub published_at: DateTime<Utc>,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub long_name: Option<String>,
    pub price_to_book: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    FiveDays,
    OneYear,
}

impl HistoryRange {
    pub fn as_query(self) -> &'static str {
        match self {
            HistoryRange::FiveDays => "5d",
            HistoryRange::OneYear => "1y",
        }
    }
}

/// Market-data boundary. Every call is keyed by the full exchange symbol
/// (ticker id plus market suffix).
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn quote_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot>;

    /// Daily closes in ascending date order.
    async fn daily_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<DailyBar>>;

    /// Most recent items first.
    async fn recent_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>>;

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile>;
}
