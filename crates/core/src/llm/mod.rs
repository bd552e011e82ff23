pub mod catalog;
pub mod error;
pub mod failover;
pub mod gemini;
pub mod json;

pub const GENERATE_CONTENT: &str = "generateContent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_CONTENT)
    }
}

/// AI boundary: one prompt in, one text response out per call.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>>;

    async fn generate(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}
