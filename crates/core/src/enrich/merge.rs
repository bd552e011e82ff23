use crate::domain::fact::MarketFact;
use crate::domain::record::{
    default_news_events, default_technical, empty_array, empty_object, missing_text, BasicInfo,
    Financials, RiverChart, StockRecord, Valuation, MISSING_TEXT, NEW_CATEGORY,
};
use crate::llm::failover::FailoverOutcome;
use chrono::NaiveDateTime;
use serde_json::{Map, Value};

pub const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Produces this run's record for `ticker`, or `None` when it should be
/// dropped from the output.
///
/// Without fresh facts the previous record is returned untouched, provided it
/// has a resolved name.
pub fn merge_record(
    ticker: &str,
    fact: Option<&MarketFact>,
    outcome: &FailoverOutcome,
    previous: Option<&StockRecord>,
    updated_at: NaiveDateTime,
) -> Option<StockRecord> {
    match fact {
        Some(fact) => Some(build_record(fact, outcome, previous, updated_at)),
        None => carry_over(ticker, previous),
    }
}

pub fn carry_over(ticker: &str, previous: Option<&StockRecord>) -> Option<StockRecord> {
    match previous {
        Some(prev) if prev.has_resolved_name() => {
            tracing::warn!(%ticker, "market data unavailable; keeping previous record");
            Some(prev.clone())
        }
        _ => {
            tracing::warn!(%ticker, "market data unavailable and no previous record; dropping");
            None
        }
    }
}

pub fn build_record(
    fact: &MarketFact,
    outcome: &FailoverOutcome,
    previous: Option<&StockRecord>,
    updated_at: NaiveDateTime,
) -> StockRecord {
    let ai = outcome.analysis();
    let financials = object(section(ai, "financials"));
    let valuation = object(financials.and_then(|f| f.get("valuation")));
    let river = object(valuation.and_then(|v| v.get("pe_river_data")));

    let (category, memo) = match previous {
        Some(prev) => (prev.category.clone(), prev.memo.clone()),
        None => (NEW_CATEGORY.to_string(), String::new()),
    };

    StockRecord {
        id: fact.ticker.clone(),
        name: Some(fact.name.clone()),
        category,
        last_updated: updated_at.format(LAST_UPDATED_FORMAT).to_string(),
        ai_model: outcome.model_used().to_string(),
        memo,
        basic_info: BasicInfo {
            price: fact.formatted_price(),
            change: fact.formatted_change(),
            change_percent: fact.change_percent.clone(),
        },
        industry: taken_or(section(ai, "industry"), empty_object),
        news_events: taken_or(section(ai, "news_events"), default_news_events),
        financials: Financials {
            eps_table: taken_or(field(financials, "eps_table"), empty_array),
            revenue_trend: taken_or(field(financials, "revenue_trend"), empty_array),
            valuation: Valuation {
                pe_status: taken_or(field(valuation, "pe_status"), missing_text),
                pb: fact
                    .price_to_book
                    .map(|pb| format!("{pb:?}"))
                    .unwrap_or_else(|| MISSING_TEXT.to_string()),
                roe: taken_or(field(valuation, "roe"), missing_text),
                pe_river_data: RiverChart {
                    dates: fact.chart_dates(),
                    price: fact.chart_prices(),
                    pe20: taken_or(field(river, "pe20"), empty_array),
                    pe16: taken_or(field(river, "pe16"), empty_array),
                    pe12: taken_or(field(river, "pe12"), empty_array),
                },
            },
        },
        technical: taken_or(section(ai, "technical"), default_technical),
        dividend: taken_or(section(ai, "dividend"), empty_object),
        extra: Map::new(),
        stored: None,
    }
}

fn section<'a>(ai: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    ai.and_then(|m| m.get(key))
}

fn object(v: Option<&Value>) -> Option<&Map<String, Value>> {
    v.and_then(Value::as_object)
}

fn field<'a>(obj: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    obj.and_then(|m| m.get(key))
}

fn taken_or(v: Option<&Value>, default: fn() -> Value) -> Value {
    v.cloned().unwrap_or_else(default)
}
