use serde::{Deserialize, Serialize};

pub const UNAVAILABLE_CHANGE_PERCENT: &str = "0%";

/// One month-end close on the chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(rename = "d")]
    pub month: String,
    #[serde(rename = "p")]
    pub price: f64,
}

/// Ground-truth market data for one ticker, rebuilt on every run.
///
/// A `MarketFact` only exists when a non-zero price was resolved; total
/// retrieval failure is represented by its absence.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFact {
    pub ticker: String,
    pub name: String,
    pub price: f64,
    pub previous_close: f64,
    pub change_percent: String,
    pub chart: Vec<ChartPoint>,
    pub news: String,
    pub price_to_book: Option<f64>,
}

impl MarketFact {
    pub fn formatted_price(&self) -> String {
        format!("{:.2}", self.price)
    }

    /// Absolute change back-derived from the already rounded percent string.
    pub fn formatted_change(&self) -> String {
        let pct = parse_change_percent(&self.change_percent).unwrap_or(0.0);
        let change = self.price - self.price / (1.0 + pct / 100.0);
        format!("{change:+.2}")
    }

    pub fn chart_dates(&self) -> Vec<String> {
        self.chart.iter().map(|p| p.month.clone()).collect()
    }

    pub fn chart_prices(&self) -> Vec<f64> {
        self.chart.iter().map(|p| p.price).collect()
    }
}

pub fn format_change_percent(price: f64, previous_close: f64) -> String {
    if price == 0.0 || previous_close == 0.0 {
        return UNAVAILABLE_CHANGE_PERCENT.to_string();
    }
    let pct = (price - previous_close) / previous_close * 100.0;
    format!("{pct:+.2}%")
}

fn parse_change_percent(s: &str) -> Option<f64> {
    s.trim().trim_matches('%').parse::<f64>().ok()
}
