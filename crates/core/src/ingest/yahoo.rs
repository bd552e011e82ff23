use crate::config::Settings;
use crate::ingest::provider::{
    CompanyProfile, DailyBar, HistoryRange, MarketDataProvider, NewsItem, QuoteSnapshot,
};
use anyhow::{Context, Result};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 2;
const MAX_BACKOFF_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooFinanceClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .market_data_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_once(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let res = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("market data response is not valid JSON: {text}"))
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::debug!(attempt, path, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn chart(&self, symbol: &str, range: &str) -> Result<ChartResult> {
        let path = format!("/v8/finance/chart/{symbol}");
        let raw = self
            .get_json(
                &path,
                &[("range", range.to_string()), ("interval", "1d".to_string())],
            )
            .await?;
        parse_chart(raw)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooFinanceClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn quote_snapshot(&self, symbol: &str) -> Result<QuoteSnapshot> {
        let chart = self.chart(symbol, "1d").await?;
        Ok(chart.meta.snapshot())
    }

    async fn daily_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<DailyBar>> {
        let chart = self.chart(symbol, range.as_query()).await?;
        Ok(chart.bars())
    }

    async fn recent_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let raw = self
            .get_json(
                "/v1/finance/search",
                &[
                    ("q", symbol.to_string()),
                    ("newsCount", limit.to_string()),
                    ("quotesCount", "0".to_string()),
                ],
            )
            .await?;
        let parsed = serde_json::from_value::<SearchResponse>(raw)
            .context("failed to decode search response")?;

        let mut items: Vec<NewsItem> = parsed
            .news
            .into_iter()
            .filter_map(|n| {
                let published_at = DateTime::from_timestamp(n.provider_publish_time?, 0)?;
                let title = n.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }
                Some(NewsItem {
                    published_at,
                    title,
                })
            })
            .collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(limit);
        Ok(items)
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile> {
        let path = format!("/v10/finance/quoteSummary/{symbol}");
        let raw = self
            .get_json(
                &path,
                &[("modules", "price,defaultKeyStatistics".to_string())],
            )
            .await?;
        parse_profile(raw)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteIndicator {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartMeta {
    fn snapshot(&self) -> QuoteSnapshot {
        QuoteSnapshot {
            last_price: self.regular_market_price.unwrap_or(0.0),
            previous_close: self
                .previous_close
                .or(self.chart_previous_close)
                .unwrap_or(0.0),
        }
    }
}

impl ChartResult {
    /// Bars dated in the exchange's local calendar.
    fn bars(&self) -> Vec<DailyBar> {
        let closes = self
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or_default();

        self.timestamp
            .iter()
            .zip(closes)
            .filter_map(|(ts, &close)| {
                let close = close.filter(|c| c.is_finite())?;
                let date = DateTime::from_timestamp(ts + self.meta.gmtoffset, 0)?.date_naive();
                Some(DailyBar { date, close })
            })
            .collect()
    }
}

fn parse_chart(raw: Value) -> Result<ChartResult> {
    let envelope =
        serde_json::from_value::<ChartEnvelope>(raw).context("failed to decode chart response")?;
    if let Some(err) = envelope.chart.error.filter(|e| !e.is_null()) {
        anyhow::bail!("chart error: {err}");
    }
    envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .context("chart response has no result")
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNews {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    provider_publish_time: Option<i64>,
}

fn parse_profile(raw: Value) -> Result<CompanyProfile> {
    let result = raw
        .get("quoteSummary")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .context("quoteSummary response has no result")?;

    let long_name = result
        .get("price")
        .and_then(|p| p.get("longName"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let price_to_book = result
        .get("defaultKeyStatistics")
        .and_then(|s| s.get("priceToBook"))
        .and_then(|v| v.get("raw").and_then(|r| r.as_f64()).or_else(|| v.as_f64()));

    Ok(CompanyProfile {
        long_name,
        price_to_book,
    })
}

/// 1s, 2s, 4s, ... capped at `MAX_BACKOFF_SECS`.
fn retry_backoff(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn chart_snapshot_prefers_previous_close() {
        let raw = json!({
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 550.0,
                        "previousClose": 540.0,
                        "chartPreviousClose": 530.0,
                        "gmtoffset": 28800
                    },
                    "timestamp": [],
                    "indicators": { "quote": [{ "close": [] }] }
                }],
                "error": null
            }
        });
        let chart = parse_chart(raw).unwrap();
        let snap = chart.meta.snapshot();
        assert_eq!(snap.last_price, 550.0);
        assert_eq!(snap.previous_close, 540.0);
    }

    #[test]
    fn chart_bars_skip_null_closes_and_use_exchange_dates() {
        // 2026-01-30 01:00 UTC is 09:00 in Taipei.
        let ts = NaiveDate::from_ymd_opt(2026, 1, 30)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        let raw = json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 28800 },
                    "timestamp": [ts, ts + 86_400],
                    "indicators": { "quote": [{ "close": [600.5, null] }] }
                }],
                "error": null
            }
        });
        let bars = parse_chart(raw).unwrap().bars();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
        assert_eq!(bars[0].close, 600.5);
    }

    #[test]
    fn chart_error_is_reported() {
        let raw = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found" }
            }
        });
        assert!(parse_chart(raw).is_err());
    }

    #[test]
    fn profile_reads_raw_wrapped_numbers() {
        let raw = json!({
            "quoteSummary": {
                "result": [{
                    "price": { "longName": "Taiwan Semiconductor Manufacturing Company Limited" },
                    "defaultKeyStatistics": { "priceToBook": { "raw": 6.42, "fmt": "6.42" } }
                }],
                "error": null
            }
        });
        let profile = parse_profile(raw).unwrap();
        assert_eq!(
            profile.long_name.as_deref(),
            Some("Taiwan Semiconductor Manufacturing Company Limited")
        );
        assert_eq!(profile.price_to_book, Some(6.42));
    }

    #[test]
    fn search_news_tolerates_missing_fields() {
        let raw = json!({
            "news": [
                { "title": "Earnings beat", "providerPublishTime": 1_760_000_000 },
                { "title": "No timestamp" },
            ]
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.news.len(), 2);
        assert_eq!(parsed.news[1].provider_publish_time, None);
    }

    #[test]
    fn retry_backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(3), Duration::from_secs(4));
        assert_eq!(retry_backoff(6), Duration::from_secs(30));
        assert_eq!(retry_backoff(66), Duration::from_secs(30));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(30));
    }
}
