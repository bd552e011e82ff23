use crate::domain::record::StockRecord;
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads the previous run's records. A missing or unreadable file is an empty
/// watchlist. Entries that are not objects with a string `id` are skipped.
///
/// Duplicate ids collapse into one entry at the first id's position holding
/// the last occurrence's value.
pub fn load_state(path: &Path) -> Vec<StockRecord> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no state file yet; starting empty");
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read state file; starting empty");
            return Vec::new();
        }
    };
    decode_state(&text, path)
}

fn decode_state(text: &str, path: &Path) -> Vec<StockRecord> {
    let items = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "state file is not a JSON array; starting empty");
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "state file is not valid JSON; starting empty");
            return Vec::new();
        }
    };

    let mut records: Vec<StockRecord> = Vec::with_capacity(items.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for (pos, item) in items.into_iter().enumerate() {
        let Some(rec) = item.as_object().cloned().and_then(StockRecord::from_stored) else {
            tracing::warn!(pos, "skipping state entry without a string id");
            continue;
        };
        match index.get(&rec.id) {
            Some(&i) => records[i] = rec,
            None => {
                index.insert(rec.id.clone(), records.len());
                records.push(rec);
            }
        }
    }
    records
}

/// Writes the full record list, replacing the previous file only once the new
/// content is completely on disk.
pub fn save_state(path: &Path, records: &[StockRecord]) -> anyhow::Result<()> {
    let entries = records
        .iter()
        .map(StockRecord::to_json)
        .collect::<serde_json::Result<Vec<Value>>>()
        .context("failed to serialize state")?;
    let json = serde_json::to_string_pretty(&entries).context("failed to serialize state")?;

    let tmp = temp_path(path);
    std::fs::write(&tmp, json.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| {
        format!("failed to move {} over {}", tmp.display(), path.display())
    })?;

    tracing::info!(path = %path.display(), records = records.len(), "state saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state.json".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
