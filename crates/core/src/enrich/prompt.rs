use crate::domain::fact::MarketFact;

const RESPONSE_SCHEMA: &str = r#"{
  "industry": { "moat_status": "..", "position_map": "..", "competitors": ".." },
  "financials": {
    "eps_table": [
      { "period": "2024Q3", "gross_margin": "..", "eps": "reported", "cumulative": "..", "is_estimate": false },
      { "period": "2025Q1", "gross_margin": "..", "eps": "forecast", "cumulative": "..", "is_estimate": true }
    ],
    "revenue_trend": [
      { "month": "2024-11", "revenue": "..", "mom": "..", "yoy": "..", "is_estimate": false }
    ],
    "valuation": {
      "pe_status": "..", "pb": "..", "roe": "..",
      "pe_river_data": { "dates": [], "price": [], "pe20": [], "pe16": [], "pe12": [] }
    }
  },
  "technical": {
    "status": "..", "signal_light": "red_flash/green_flash/stable",
    "analysis_text": "..",
    "predictions": { "days30": "..", "days180": "..", "days360": "..", "entry_zone": ".." },
    "correction_c": "0.XX",
    "bollinger": { "status": "..", "description": ".." }
  },
  "news_events": {
    "news": [ { "date": "YYYY-MM-DD", "title": "..", "type": "positive/neutral/negative", "is_new": true } ],
    "calendar": [ { "date": "YYYY-MM-DD", "event": ".." } ]
  },
  "dividend": { "yield": "..", "history_roi": "..", "future_roi": ".." },
  "memo": ""
}"#;

/// Compact `[{"d": "YYYY-MM", "p": price}, ...]` rendering of the chart series.
pub fn chart_dump(fact: &MarketFact) -> String {
    serde_json::to_string(&fact.chart).unwrap_or_else(|_| "[]".to_string())
}

pub fn build_prompt(fact: &MarketFact) -> String {
    let mut out = format!(
        "You are a professional equity analyst. Complete the report below using the LOCKED FACTS as ground truth.\n\
\n\
LOCKED FACTS (from market data) - DO NOT change any of these values:\n\
- Stock: {name} ({ticker})\n\
- Price: {price} ({change_pct})\n\
- Month-end closes (for charting): {chart}\n",
        name = fact.name,
        ticker = fact.ticker,
        price = fact.formatted_price(),
        change_pct = fact.change_percent,
        chart = chart_dump(fact),
    );

    if !fact.news.trim().is_empty() {
        out.push_str("\nRecent headlines:\n");
        out.push_str(&fact.news);
    }

    out.push_str(
        "\nYOUR TASKS (search the web where needed):\n\
1. Financials:\n\
   - Revenue: if this month's figure is not published yet, estimate it and mark `is_estimate: true`.\n\
   - EPS: look up consensus estimates and mark them `is_estimate: true`.\n\
   - Valuation: from the month-end closes above, derive fair PE multiple bands (pe20/pe16/pe12).\n\
2. Qualitative: industry moat and competitors.\n\
3. Technical: 30/180/360 day price outlook and an entry strategy.\n\
\n\
Any figure that has not been officially published MUST be flagged with `is_estimate: true`.\n\
Respond with exactly ONE JSON object in the format below. No markdown, no code fences, no prose.\n",
    );
    out.push_str(RESPONSE_SCHEMA);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fact::ChartPoint;

    fn fact() -> MarketFact {
        MarketFact {
            ticker: "2330".to_string(),
            name: "TSMC".to_string(),
            price: 550.0,
            previous_close: 540.0,
            change_percent: "+1.85%".to_string(),
            chart: vec![
                ChartPoint { month: "2026-08".to_string(), price: 530.0 },
                ChartPoint { month: "2026-09".to_string(), price: 545.25 },
            ],
            news: String::new(),
            price_to_book: None,
        }
    }

    #[test]
    fn embeds_locked_facts() {
        let prompt = build_prompt(&fact());
        assert!(prompt.contains("- Stock: TSMC (2330)"));
        assert!(prompt.contains("- Price: 550.00 (+1.85%)"));
        assert!(prompt.contains(r#"[{"d":"2026-08","p":530.0},{"d":"2026-09","p":545.25}]"#));
        assert!(prompt.contains("DO NOT change"));
        assert!(prompt.contains("is_estimate: true"));
    }

    #[test]
    fn ends_with_schema() {
        let prompt = build_prompt(&fact());
        for section in ["\"industry\"", "\"financials\"", "\"technical\"", "\"news_events\"", "\"dividend\""] {
            assert!(prompt.contains(section), "missing {section}");
        }
        assert!(prompt.trim_end().ends_with('}'));
    }

    #[test]
    fn headlines_only_when_present() {
        assert!(!build_prompt(&fact()).contains("Recent headlines"));

        let mut with_news = fact();
        with_news.news = "- 2026-10-13: Capex raised\n".to_string();
        let prompt = build_prompt(&with_news);
        assert!(prompt.contains("Recent headlines:\n- 2026-10-13: Capex raised\n"));
    }
}
