use crate::domain::record::MODEL_UNAVAILABLE;
use crate::llm::catalog::{ModelCatalog, ModelDescriptor};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::LlmClient;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FailoverOutcome {
    Success {
        model: String,
        analysis: Map<String, Value>,
    },
    Exhausted,
}

impl FailoverOutcome {
    pub fn model_used(&self) -> &str {
        match self {
            FailoverOutcome::Success { model, .. } => model,
            FailoverOutcome::Exhausted => MODEL_UNAVAILABLE,
        }
    }

    pub fn analysis(&self) -> Option<&Map<String, Value>> {
        match self {
            FailoverOutcome::Success { analysis, .. } => Some(analysis),
            FailoverOutcome::Exhausted => None,
        }
    }
}

/// Result of one model attempt. Call errors and unparseable output are both
/// `Failed`.
#[derive(Debug)]
enum AttemptOutcome {
    Parsed(Map<String, Value>),
    Failed(anyhow::Error),
}

async fn attempt(client: &dyn LlmClient, model: &ModelDescriptor, prompt: &str) -> AttemptOutcome {
    let text = match client.generate(model.id(), prompt).await {
        Ok(text) => text,
        Err(err) => return AttemptOutcome::Failed(err),
    };

    match json::parse_analysis(&text) {
        Ok(map) => AttemptOutcome::Parsed(map),
        Err(err) => AttemptOutcome::Failed(
            LlmDiagnosticsError {
                model: model.id().to_string(),
                stage: "parse",
                detail: format!("{err:#}"),
                raw_output: Some(text),
            }
            .into(),
        ),
    }
}

/// Tries each catalog model once, in order, and stops at the first one whose
/// response parses as a JSON object.
pub async fn invoke_with_failover(
    client: &dyn LlmClient,
    catalog: &ModelCatalog,
    prompt: &str,
    ticker: &str,
) -> FailoverOutcome {
    for (idx, model) in catalog.iter().enumerate() {
        match attempt(client, model, prompt).await {
            AttemptOutcome::Parsed(analysis) => {
                tracing::info!(%ticker, model = model.display_name(), attempt = idx + 1, "analysis generated");
                return FailoverOutcome::Success {
                    model: model.display_name().to_string(),
                    analysis,
                };
            }
            AttemptOutcome::Failed(err) => {
                let raw_output = err
                    .downcast_ref::<LlmDiagnosticsError>()
                    .and_then(|diag| diag.raw_output.as_deref());
                tracing::debug!(%ticker, model = model.id(), error = %err, ?raw_output, "model attempt failed; trying next");
            }
        }
    }

    tracing::warn!(%ticker, models = catalog.len(), "all models failed; keeping facts only");
    FailoverOutcome::Exhausted
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::catalog::Tier;
    use crate::llm::ModelInfo;
    use anyhow::bail;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted client: each model id maps to a canned reply; unknown ids error.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedLlm {
        pub replies: HashMap<String, String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub(crate) fn with(replies: &[(&str, &str)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(m, r)| (m.to_string(), r.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }

        async fn generate(&self, model: &str, _prompt: &str) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(model.to_string());
            match self.replies.get(model) {
                Some(reply) => Ok(reply.clone()),
                None => bail!("model {model} unavailable"),
            }
        }
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::from_model_ids([
            "models/gemini-2.0-flash-exp",
            "models/gemini-2.5-pro",
            "models/gemini-2.0-flash",
        ])
    }

    #[tokio::test]
    async fn third_model_wins_after_two_non_json_replies() {
        let llm = ScriptedLlm::with(&[
            ("models/gemini-2.0-flash-exp", "I cannot help with that."),
            ("models/gemini-2.5-pro", "```json\n{ not json ```"),
            ("models/gemini-2.0-flash", "```json\n{\"dividend\": {\"yield\": \"2.1%\"}}\n```"),
        ]);

        let out = invoke_with_failover(&llm, &catalog(), "prompt", "2330").await;
        assert_eq!(out.model_used(), "gemini-2.0-flash");
        assert_eq!(
            out.analysis().and_then(|a| a.get("dividend")),
            Some(&serde_json::json!({ "yield": "2.1%" }))
        );
        assert_eq!(llm.calls().len(), 3);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let llm = ScriptedLlm::with(&[
            ("models/gemini-2.0-flash-exp", "{}"),
            ("models/gemini-2.5-pro", "{\"industry\": {}}"),
        ]);
        let out = invoke_with_failover(&llm, &catalog(), "prompt", "2330").await;
        assert_eq!(out.model_used(), "gemini-2.0-flash-exp");
        assert_eq!(llm.calls(), vec!["models/gemini-2.0-flash-exp"]);
    }

    #[tokio::test]
    async fn call_errors_and_parse_errors_both_move_on() {
        let llm = ScriptedLlm::with(&[("models/gemini-2.5-pro", "[\"array\"]")]);
        let out = invoke_with_failover(&llm, &catalog(), "prompt", "2330").await;
        assert_eq!(out, FailoverOutcome::Exhausted);
        assert_eq!(out.model_used(), "N/A");
        assert!(out.analysis().is_none());
        // One pass, no retries.
        assert_eq!(
            llm.calls(),
            vec![
                "models/gemini-2.0-flash-exp",
                "models/gemini-2.5-pro",
                "models/gemini-2.0-flash",
            ]
        );
    }

    #[tokio::test]
    async fn model_without_prefix_is_reported_verbatim() {
        let catalog = ModelCatalog::from_model_ids(["gemini-2.5-pro"]);
        assert_eq!(catalog.models()[0].tier(), Tier::Pro);
        let llm = ScriptedLlm::with(&[("gemini-2.5-pro", "{}")]);
        let out = invoke_with_failover(&llm, &catalog, "prompt", "2330").await;
        assert_eq!(out.model_used(), "gemini-2.5-pro");
    }
}
