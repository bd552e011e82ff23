use anyhow::Context;
use serde_json::{Map, Value};

/// Removes an enclosing Markdown fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Language tag directly after the opening fence.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let inner = match rest.rfind("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    inner.trim()
}

/// Parses a model response into a JSON object. Shape is not checked beyond
/// the top level being an object.
pub fn parse_analysis(text: &str) -> anyhow::Result<Map<String, Value>> {
    let body = strip_code_fences(text);
    let value = serde_json::from_str::<Value>(body)
        .with_context(|| format!("LLM output is not valid JSON: {body}"))?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("LLM output is JSON but not an object: {other}"),
    }
}
