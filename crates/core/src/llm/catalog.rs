use crate::llm::LlmClient;

const MODEL_RESOURCE_PREFIX: &str = "models/";

pub const DEFAULT_PRO_MODEL: &str = "models/gemini-1.5-pro";
pub const DEFAULT_FLASH_MODEL: &str = "models/gemini-1.5-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Experimental,
    Pro,
    Flash,
}

impl Tier {
    const ORDER: [Tier; 3] = [Tier::Experimental, Tier::Pro, Tier::Flash];

    fn matches(self, id: &str) -> bool {
        let experimental = id.contains("exp");
        match self {
            Tier::Experimental => experimental,
            Tier::Pro => !experimental && id.contains("pro"),
            Tier::Flash => !experimental && id.contains("flash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    id: String,
    tier: Tier,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            tier,
        }
    }

    /// Identifier as used when calling the provider.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Identifier without the `models/` resource prefix.
    pub fn display_name(&self) -> &str {
        self.id
            .strip_prefix(MODEL_RESOURCE_PREFIX)
            .unwrap_or(&self.id)
    }
}

/// Candidate models, highest priority first. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    pub fn defaults() -> Self {
        Self {
            models: vec![
                ModelDescriptor::new(DEFAULT_PRO_MODEL, Tier::Pro),
                ModelDescriptor::new(DEFAULT_FLASH_MODEL, Tier::Flash),
            ],
        }
    }

    /// Orders model ids by tier (experimental, pro, flash), each tier in
    /// descending lexicographic order. Ids matching no tier are dropped. Each
    /// tier filters the full list, so an id can land in both pro and flash.
    pub fn from_model_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort_by(|a, b| b.cmp(a));

        let models: Vec<ModelDescriptor> = Tier::ORDER
            .iter()
            .flat_map(|&tier| {
                ids.iter()
                    .filter(move |id| tier.matches(id))
                    .map(move |id| ModelDescriptor::new(id.clone(), tier))
            })
            .collect();

        if models.is_empty() {
            return Self::defaults();
        }
        Self { models }
    }

    /// Lists models that support content generation and orders them. Any
    /// discovery failure falls back to [`ModelCatalog::defaults`].
    pub async fn discover(client: &dyn LlmClient) -> Self {
        match client.list_models().await {
            Ok(models) => Self::from_model_ids(
                models
                    .into_iter()
                    .filter(|m| m.supports_generate_content())
                    .map(|m| m.name),
            ),
            Err(err) => {
                tracing::warn!(
                    provider = client.provider_name(),
                    error = %err,
                    "model discovery failed; using default model list"
                );
                Self::defaults()
            }
        }
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelDescriptor> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
