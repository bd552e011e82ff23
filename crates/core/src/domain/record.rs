use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const NEW_CATEGORY: &str = "newly added";
pub const MODEL_UNAVAILABLE: &str = "N/A";
pub const MISSING_TEXT: &str = "-";

/// One persisted watchlist entry.
///
/// AI-authored sections are kept as loose JSON: whatever the model produced is
/// stored verbatim. Records read from disk also keep their original object in
/// `stored`, which is what gets written back when the record is carried over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: String,
    #[serde(default = "default_model")]
    pub ai_model: String,
    #[serde(default)]
    pub memo: String,
    #[serde(rename = "basicInfo", default)]
    pub basic_info: BasicInfo,
    #[serde(default = "empty_object")]
    pub industry: Value,
    #[serde(default = "default_news_events")]
    pub news_events: Value,
    #[serde(default)]
    pub financials: Financials,
    #[serde(default = "default_technical")]
    pub technical: Value,
    #[serde(default = "empty_object")]
    pub dividend: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub stored: Option<Map<String, Value>>,
}

impl StockRecord {
    /// An empty record for `id`, with every section at its default.
    pub fn skeleton(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            category: default_category(),
            last_updated: String::new(),
            ai_model: default_model(),
            memo: String::new(),
            basic_info: BasicInfo::default(),
            industry: empty_object(),
            news_events: default_news_events(),
            financials: Financials::default(),
            technical: default_technical(),
            dividend: empty_object(),
            extra: Map::new(),
            stored: None,
        }
    }

    /// Typed view of a stored entry. Only a string `id` is required: when the
    /// rest of the entry does not fit the typed layout, the user annotations are
    /// picked out by hand. The original object is kept either way.
    pub fn from_stored(entry: Map<String, Value>) -> Option<Self> {
        let id = entry.get("id").and_then(Value::as_str)?.to_string();

        let mut rec = match serde_json::from_value::<StockRecord>(Value::Object(entry.clone())) {
            Ok(rec) => rec,
            Err(err) => {
                tracing::debug!(%id, error = %err, "state entry has unexpected field types; keeping annotations only");
                let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
                let mut rec = Self::skeleton(id);
                rec.name = text("name");
                rec.category = text("category").unwrap_or_else(default_category);
                rec.memo = text("memo").unwrap_or_default();
                rec
            }
        };
        rec.stored = Some(entry);
        Some(rec)
    }

    /// JSON written to the state file: the original object for records that
    /// were read from disk, the typed fields otherwise.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match &self.stored {
            Some(entry) => Ok(Value::Object(entry.clone())),
            None => serde_json::to_value(self),
        }
    }

    /// A record counts as resolved once a display name has been stored for it.
    pub fn has_resolved_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub change: String,
    #[serde(rename = "changePercent", default)]
    pub change_percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    #[serde(default = "empty_array")]
    pub eps_table: Value,
    #[serde(default = "empty_array")]
    pub revenue_trend: Value,
    #[serde(default)]
    pub valuation: Valuation,
}

impl Default for Financials {
    fn default() -> Self {
        Self {
            eps_table: empty_array(),
            revenue_trend: empty_array(),
            valuation: Valuation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    #[serde(default = "missing_text")]
    pub pe_status: Value,
    #[serde(default = "missing_text_string")]
    pub pb: String,
    #[serde(default = "missing_text")]
    pub roe: Value,
    #[serde(default)]
    pub pe_river_data: RiverChart,
}

impl Default for Valuation {
    fn default() -> Self {
        Self {
            pe_status: missing_text(),
            pb: missing_text_string(),
            roe: missing_text(),
            pe_river_data: RiverChart::default(),
        }
    }
}

/// Price line plus three PE-multiple bands.
///
/// `dates` and `price` are market ground truth; the bands are AI estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiverChart {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub price: Vec<f64>,
    #[serde(default = "empty_array")]
    pub pe20: Value,
    #[serde(default = "empty_array")]
    pub pe16: Value,
    #[serde(default = "empty_array")]
    pub pe12: Value,
}

impl Default for RiverChart {
    fn default() -> Self {
        Self {
            dates: Vec::new(),
            price: Vec::new(),
            pe20: empty_array(),
            pe16: empty_array(),
            pe12: empty_array(),
        }
    }
}

fn default_category() -> String {
    NEW_CATEGORY.to_string()
}

fn default_model() -> String {
    MODEL_UNAVAILABLE.to_string()
}

fn missing_text_string() -> String {
    MISSING_TEXT.to_string()
}

pub(crate) fn missing_text() -> Value {
    Value::String(MISSING_TEXT.to_string())
}

pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}

pub(crate) fn empty_array() -> Value {
    Value::Array(Vec::new())
}

pub(crate) fn default_news_events() -> Value {
    json!({ "news": [], "calendar": [] })
}

pub(crate) fn default_technical() -> Value {
    json!({ "signal_light": "stable" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sparse_record_with_defaults() {
        let rec: StockRecord = serde_json::from_value(json!({ "id": "2330" })).unwrap();
        assert_eq!(rec.category, NEW_CATEGORY);
        assert_eq!(rec.ai_model, MODEL_UNAVAILABLE);
        assert_eq!(rec.technical, json!({ "signal_light": "stable" }));
        assert_eq!(rec.financials.valuation.pe_status, json!("-"));
        assert!(!rec.has_resolved_name());
    }

    #[test]
    fn keeps_unknown_keys() {
        let v = json!({
            "id": "2330",
            "name": "TSMC",
            "pinned": true,
        });
        let rec: StockRecord = serde_json::from_value(v).unwrap();
        assert_eq!(rec.extra.get("pinned"), Some(&json!(true)));

        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["pinned"], json!(true));
        assert_eq!(back["name"], json!("TSMC"));
    }

    #[test]
    fn uses_camel_case_keys_where_stored() {
        let rec: StockRecord = serde_json::from_value(json!({
            "id": "2330",
            "lastUpdated": "2026-10-14 09:00",
            "basicInfo": { "price": "550.00", "change": "+9.99", "changePercent": "+1.85%" },
        }))
        .unwrap();
        assert_eq!(rec.last_updated, "2026-10-14 09:00");
        assert_eq!(rec.basic_info.change_percent, "+1.85%");
    }

    #[test]
    fn stored_entry_with_odd_types_keeps_annotations() {
        let entry = json!({
            "id": "2317",
            "name": "Hon Hai",
            "category": "core holding",
            "memo": null,
            "financials": { "valuation": { "pb": 1.4 } },
        });
        let rec = StockRecord::from_stored(entry.as_object().unwrap().clone()).unwrap();
        assert_eq!(rec.id, "2317");
        assert!(rec.has_resolved_name());
        assert_eq!(rec.category, "core holding");
        assert_eq!(rec.memo, "");
        assert_eq!(rec.to_json().unwrap(), entry);
    }

    #[test]
    fn stored_entry_is_written_back_verbatim() {
        let entry = json!({ "id": "2330", "memo": "x", "name": "TSMC" });
        let rec = StockRecord::from_stored(entry.as_object().unwrap().clone()).unwrap();
        assert_eq!(rec.category, NEW_CATEGORY);
        assert_eq!(rec.to_json().unwrap(), entry);

        let fresh = StockRecord::skeleton("2454");
        assert_eq!(fresh.to_json().unwrap()["category"], json!(NEW_CATEGORY));
    }

    #[test]
    fn stored_entry_needs_string_id() {
        let no_id = json!({ "name": "no id" });
        assert!(StockRecord::from_stored(no_id.as_object().unwrap().clone()).is_none());
        let numeric = json!({ "id": 2330 });
        assert!(StockRecord::from_stored(numeric.as_object().unwrap().clone()).is_none());
    }
}
