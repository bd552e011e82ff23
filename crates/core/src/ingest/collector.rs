use crate::domain::fact::{format_change_percent, ChartPoint, MarketFact};
use crate::ingest::provider::{DailyBar, HistoryRange, MarketDataProvider, NewsItem};
use chrono::{Datelike, Local};
use std::future::Future;

pub const NEWS_LIMIT: usize = 3;
pub const CHART_POINTS: usize = 12;

/// Strips the market suffix from a ticker id, e.g. `2330.TW` -> `2330`.
pub fn normalize_ticker(raw: &str, market_suffix: &str) -> String {
    let trimmed = raw.trim();
    if market_suffix.is_empty() {
        return trimmed.to_string();
    }
    trimmed
        .strip_suffix(market_suffix)
        .unwrap_or(trimmed)
        .to_string()
}

pub fn market_symbol(ticker: &str, market_suffix: &str) -> String {
    format!("{ticker}{market_suffix}")
}

/// Gathers ground-truth facts for one ticker.
///
/// Returns `None` only when no non-zero price could be resolved. Every other
/// lookup degrades to a neutral default.
pub async fn collect_market_fact(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    market_suffix: &str,
) -> Option<MarketFact> {
    let symbol = market_symbol(ticker, market_suffix);

    let (price, previous_close) = resolve_price(provider, ticker, &symbol).await;
    if price == 0.0 {
        tracing::warn!(%ticker, %symbol, "no price available");
        return None;
    }
    let change_percent = format_change_percent(price, previous_close);

    let news = best_effort(ticker, "news", provider.recent_news(&symbol, NEWS_LIMIT))
        .await
        .map(|items| format_news(&items))
        .unwrap_or_default();

    let chart = best_effort(
        ticker,
        "history",
        provider.daily_history(&symbol, HistoryRange::OneYear),
    )
    .await
    .map(|bars| month_end_series(&bars, CHART_POINTS))
    .unwrap_or_default();

    let profile = best_effort(ticker, "profile", provider.profile(&symbol))
        .await
        .unwrap_or_default();

    Some(MarketFact {
        ticker: ticker.to_string(),
        name: profile.long_name.unwrap_or_else(|| ticker.to_string()),
        price,
        previous_close,
        change_percent,
        chart,
        news,
        price_to_book: profile.price_to_book,
    })
}

async fn resolve_price(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    symbol: &str,
) -> (f64, f64) {
    let snapshot = best_effort(ticker, "quote", provider.quote_snapshot(symbol)).await;
    let (price, previous_close) = snapshot
        .map(|s| (s.last_price, s.previous_close))
        .unwrap_or((0.0, 0.0));
    if price != 0.0 {
        return (price, previous_close);
    }

    let Some(bars) = best_effort(
        ticker,
        "recent history",
        provider.daily_history(symbol, HistoryRange::FiveDays),
    )
    .await
    else {
        return (0.0, previous_close);
    };

    match bars.as_slice() {
        [.., prev, last] => (last.close, prev.close),
        [last] => (last.close, 0.0),
        [] => (0.0, previous_close),
    }
}

async fn best_effort<T>(
    ticker: &str,
    what: &'static str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Option<T> {
    match fut.await {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::debug!(%ticker, what, error = %err, "optional market lookup failed");
            None
        }
    }
}

/// Last close of each calendar month, most recent `limit` months.
pub fn month_end_series(bars: &[DailyBar], limit: usize) -> Vec<ChartPoint> {
    let mut sorted: Vec<&DailyBar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.date);

    let mut months: Vec<((i32, u32), f64)> = Vec::new();
    for bar in sorted {
        let key = (bar.date.year(), bar.date.month());
        if let Some((last_key, close)) = months.last_mut() {
            if *last_key == key {
                *close = bar.close;
                continue;
            }
        }
        months.push((key, bar.close));
    }

    let skip = months.len().saturating_sub(limit);
    months
        .into_iter()
        .skip(skip)
        .map(|((year, month), close)| ChartPoint {
            month: format!("{year:04}-{month:02}"),
            price: round2(close),
        })
        .collect()
}

pub fn format_news(items: &[NewsItem]) -> String {
    let mut out = String::new();
    for item in items.iter().take(NEWS_LIMIT) {
        let date = item.published_at.with_timezone(&Local).format("%Y-%m-%d");
        out.push_str(&format!("- {date}: {}\n", item.title));
    }
    out
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
