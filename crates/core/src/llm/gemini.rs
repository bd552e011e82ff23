use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{LlmClient, ModelInfo};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const LIST_PAGE_SIZE: u32 = 1000;
// Guards against a listing endpoint that keeps handing out page tokens.
const MAX_LIST_PAGES: usize = 20;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{API_VERSION}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn list_page(&self, page_token: Option<&str>) -> anyhow::Result<ListModelsResponse> {
        let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let res = self
            .http
            .get(self.url("models"))
            .headers(self.headers()?)
            .query(&query)
            .send()
            .await
            .context("Gemini list models request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini list models body")?;
        if !status.is_success() {
            anyhow::bail!("Gemini list models HTTP {status}: {text}");
        }

        serde_json::from_str::<ListModelsResponse>(&text)
            .with_context(|| format!("failed to parse Gemini list models JSON: {text}"))
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let page = self.list_page(page_token.as_deref()).await?;
            out.extend(page.models.into_iter().map(|m| ModelInfo {
                name: m.name,
                supported_generation_methods: m.supported_generation_methods,
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(out)
    }

    async fn generate(&self, model: &str, prompt: &str) -> anyhow::Result<String> {
        let req = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = self.url(&format!("{}:generateContent", resource_name(model)));
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            return Err(LlmDiagnosticsError {
                model: model.to_string(),
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
            }
            .into());
        }

        let parsed = serde_json::from_str::<GenerateContentResponse>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;

        let out = response_text(&parsed);
        if out.trim().is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no text candidates".to_string());
            return Err(LlmDiagnosticsError {
                model: model.to_string(),
                stage: "empty_response",
                detail: reason,
                raw_output: Some(text),
            }
            .into());
        }
        Ok(out)
    }
}

/// Gemini addresses models as `models/{id}`; the catalog may hand out either form.
fn resource_name(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn response_text(res: &GenerateContentResponse) -> String {
    let Some(candidate) = res.candidates.first() else {
        return String::new();
    };
    let mut out = String::new();
    for part in candidate.content.iter().flat_map(|c| c.parts.iter()) {
        if let Some(text) = &part.text {
            out.push_str(text);
        }
    }
    out
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ListedModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
