//! Model selection and fallback
//!
//! A static table describes every model we know how to call. Each task has
//! an ordered preference list; only models whose provider is configured are
//! candidates, and a failed call moves on to the next candidate.

use super::client::{
    AiError, AnthropicClient, GeneratedImage, ImageModel, ImageRequest, OpenAiClient, Provider,
    TextModel, TextRequest,
};
use crate::config::AiConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Standard,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub id: &'static str,
    pub provider: Provider,
    pub kind: ModelKind,
    /// Upper bound applied to `TextRequest::max_tokens`; zero for image models
    pub max_output_tokens: u32,
    pub tier: ModelTier,
}

pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        id: "claude-sonnet-4-20250514",
        provider: Provider::Anthropic,
        kind: ModelKind::Text,
        max_output_tokens: 8192,
        tier: ModelTier::Premium,
    },
    ModelSpec {
        id: "gpt-4o",
        provider: Provider::OpenAi,
        kind: ModelKind::Text,
        max_output_tokens: 4096,
        tier: ModelTier::Premium,
    },
    ModelSpec {
        id: "claude-3-5-haiku-latest",
        provider: Provider::Anthropic,
        kind: ModelKind::Text,
        max_output_tokens: 4096,
        tier: ModelTier::Fast,
    },
    ModelSpec {
        id: "gpt-4o-mini",
        provider: Provider::OpenAi,
        kind: ModelKind::Text,
        max_output_tokens: 4096,
        tier: ModelTier::Fast,
    },
    ModelSpec {
        id: "gpt-image-1",
        provider: Provider::OpenAi,
        kind: ModelKind::Image,
        max_output_tokens: 0,
        tier: ModelTier::Premium,
    },
    ModelSpec {
        id: "dall-e-3",
        provider: Provider::OpenAi,
        kind: ModelKind::Image,
        max_output_tokens: 0,
        tier: ModelTier::Standard,
    },
];

/// What a model is being asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTask {
    BlogPost,
    ServiceDescription,
    Seo,
    Excerpt,
    ImagePrompt,
    Image,
}

impl AiTask {
    pub const ALL: [AiTask; 6] = [
        AiTask::BlogPost,
        AiTask::ServiceDescription,
        AiTask::Seo,
        AiTask::Excerpt,
        AiTask::ImagePrompt,
        AiTask::Image,
    ];

    pub fn kind(&self) -> ModelKind {
        match self {
            AiTask::Image => ModelKind::Image,
            _ => ModelKind::Text,
        }
    }

    /// Model ids in order of preference
    pub fn preferences(&self) -> &'static [&'static str] {
        match self {
            // long-form writing goes to the stronger models first
            AiTask::BlogPost | AiTask::ServiceDescription => &[
                "claude-sonnet-4-20250514",
                "gpt-4o",
                "claude-3-5-haiku-latest",
                "gpt-4o-mini",
            ],
            AiTask::Seo | AiTask::Excerpt | AiTask::ImagePrompt => &[
                "gpt-4o-mini",
                "claude-3-5-haiku-latest",
                "gpt-4o",
                "claude-sonnet-4-20250514",
            ],
            AiTask::Image => &["gpt-image-1", "dall-e-3"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiTask::BlogPost => "blog_post",
            AiTask::ServiceDescription => "service_description",
            AiTask::Seo => "seo",
            AiTask::Excerpt => "excerpt",
            AiTask::ImagePrompt => "image_prompt",
            AiTask::Image => "image",
        }
    }
}

impl fmt::Display for AiTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn find_model(id: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.id == id)
}

/// Text produced by one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub model: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOutput {
    pub model: &'static str,
    pub image: GeneratedImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    #[serde(flatten)]
    pub spec: ModelSpec,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiStatus {
    pub providers: Vec<ProviderStatus>,
    pub models: Vec<ModelStatus>,
    /// First choice per task, if any model is available
    pub selected: HashMap<AiTask, &'static str>,
}

#[derive(Default, Clone)]
pub struct ModelManager {
    text: HashMap<Provider, Arc<dyn TextModel>>,
    image: HashMap<Provider, Arc<dyn ImageModel>>,
}

impl ModelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for every provider that has an API key
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let mut manager = Self::new();
        if let Some(openai) = OpenAiClient::from_config(config)? {
            let openai = Arc::new(openai);
            manager = manager
                .with_text_model(openai.clone())
                .with_image_model(openai);
        }
        if let Some(anthropic) = AnthropicClient::from_config(config)? {
            manager = manager.with_text_model(Arc::new(anthropic));
        }
        tracing::info!(
            "AI providers configured: {}",
            if manager.text.is_empty() {
                "none".to_string()
            } else {
                manager
                    .configured_providers()
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        );
        Ok(manager)
    }

    pub fn with_text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text.insert(model.provider(), model);
        self
    }

    pub fn with_image_model(mut self, model: Arc<dyn ImageModel>) -> Self {
        self.image.insert(model.provider(), model);
        self
    }

    fn configured_providers(&self) -> Vec<Provider> {
        [Provider::OpenAi, Provider::Anthropic]
            .into_iter()
            .filter(|p| self.text.contains_key(p) || self.image.contains_key(p))
            .collect()
    }

    fn is_available(&self, spec: &ModelSpec) -> bool {
        match spec.kind {
            ModelKind::Text => self.text.contains_key(&spec.provider),
            ModelKind::Image => self.image.contains_key(&spec.provider),
        }
    }

    /// Available models for `task`, best first
    pub fn candidates(&self, task: AiTask) -> Vec<&'static ModelSpec> {
        task.preferences()
            .iter()
            .filter_map(|id| find_model(id))
            .filter(|spec| spec.kind == task.kind() && self.is_available(spec))
            .collect()
    }

    pub fn select(&self, task: AiTask) -> Option<&'static ModelSpec> {
        self.candidates(task).into_iter().next()
    }

    pub fn status(&self) -> AiStatus {
        let configured = self.configured_providers();
        AiStatus {
            providers: [Provider::OpenAi, Provider::Anthropic]
                .into_iter()
                .map(|provider| ProviderStatus {
                    provider,
                    configured: configured.contains(&provider),
                })
                .collect(),
            models: MODELS
                .iter()
                .map(|spec| ModelStatus {
                    spec: spec.clone(),
                    available: self.is_available(spec),
                })
                .collect(),
            selected: AiTask::ALL
                .into_iter()
                .filter_map(|task| self.select(task).map(|spec| (task, spec.id)))
                .collect(),
        }
    }

    /// Run a text task, falling back through the candidates
    pub async fn complete(&self, task: AiTask, request: &TextRequest) -> Result<Completion, AiError> {
        let mut last_error = None;
        for spec in self.candidates(task) {
            let Some(client) = self.text.get(&spec.provider) else {
                continue;
            };
            let mut request = request.clone();
            request.max_tokens = request.max_tokens.min(spec.max_output_tokens);

            match client.complete(spec.id, &request).await {
                Ok(text) => {
                    tracing::debug!("{} completed by {}", task, spec.id);
                    return Ok(Completion {
                        model: spec.id,
                        text,
                    });
                }
                Err(e) => {
                    tracing::warn!("{} failed on {}, trying next model: {}", task, spec.id, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AiError::NoModelAvailable(task.to_string())))
    }

    pub async fn generate_image(&self, request: &ImageRequest) -> Result<ImageOutput, AiError> {
        let task = AiTask::Image;
        let mut last_error = None;
        for spec in self.candidates(task) {
            let Some(client) = self.image.get(&spec.provider) else {
                continue;
            };
            match client.generate_image(spec.id, request).await {
                Ok(image) => {
                    return Ok(ImageOutput {
                        model: spec.id,
                        image,
                    })
                }
                Err(e) => {
                    tracing::warn!("Image generation failed on {}, trying next model: {}", spec.id, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AiError::NoModelAvailable(task.to_string())))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Scripted text model: replies from a queue, fails for listed model ids
    pub struct MockTextModel {
        pub provider: Provider,
        pub replies: Mutex<Vec<String>>,
        pub failing: Vec<&'static str>,
        pub calls: Mutex<Vec<(String, TextRequest)>>,
    }

    impl MockTextModel {
        pub fn new(provider: Provider, replies: &[&str]) -> Self {
            Self {
                provider,
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                failing: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_on(mut self, model: &'static str) -> Self {
            self.failing.push(model);
            self
        }
    }

    #[async_trait]
    impl TextModel for MockTextModel {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn complete(&self, model: &str, request: &TextRequest) -> Result<String, AiError> {
            self.calls
                .lock()
                .await
                .push((model.to_string(), request.clone()));
            if self.failing.iter().any(|m| *m == model) {
                return Err(AiError::Http {
                    status: 503,
                    body: "overloaded".to_string(),
                });
            }
            self.replies
                .lock()
                .await
                .pop()
                .ok_or_else(|| AiError::InvalidResponse("no scripted reply".to_string()))
        }
    }

    pub struct MockImageModel {
        pub prompts: Mutex<Vec<String>>,
    }

    impl MockImageModel {
        pub fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageModel for MockImageModel {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate_image(
            &self,
            _model: &str,
            request: &ImageRequest,
        ) -> Result<GeneratedImage, AiError> {
            self.prompts.lock().await.push(request.prompt.clone());
            Ok(GeneratedImage {
                url: Some("https://img.test/generated.png".to_string()),
                b64_json: None,
                revised_prompt: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_preferences_reference_known_models() {
        for task in AiTask::ALL {
            for id in task.preferences() {
                let spec = find_model(id).unwrap();
                assert_eq!(spec.kind, task.kind(), "{} listed for {}", id, task);
            }
        }
    }

    #[test]
    fn test_candidates_follow_configured_providers() {
        let manager = ModelManager::new();
        assert!(manager.select(AiTask::BlogPost).is_none());

        let manager = manager.with_text_model(Arc::new(MockTextModel::new(Provider::OpenAi, &[])));
        let ids: Vec<_> = manager
            .candidates(AiTask::BlogPost)
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["gpt-4o", "gpt-4o-mini"]);
        // text client alone does not enable image models
        assert!(manager.candidates(AiTask::Image).is_empty());

        let manager =
            manager.with_text_model(Arc::new(MockTextModel::new(Provider::Anthropic, &[])));
        assert_eq!(
            manager.select(AiTask::BlogPost).unwrap().id,
            "claude-sonnet-4-20250514"
        );
        assert_eq!(manager.select(AiTask::Seo).unwrap().id, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_complete_falls_back_to_next_model() {
        let anthropic = Arc::new(
            MockTextModel::new(Provider::Anthropic, &[]).failing_on("claude-sonnet-4-20250514"),
        );
        let openai = Arc::new(MockTextModel::new(Provider::OpenAi, &["from gpt"]));
        let manager = ModelManager::new()
            .with_text_model(anthropic.clone())
            .with_text_model(openai.clone());

        let completion = manager
            .complete(AiTask::BlogPost, &TextRequest::new("Write").with_max_tokens(100_000))
            .await
            .unwrap();
        assert_eq!(completion.model, "gpt-4o");
        assert_eq!(completion.text, "from gpt");

        let calls = openai.calls.lock().await;
        assert_eq!(calls[0].1.max_tokens, 4096);
        assert_eq!(anthropic.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_reports_last_error_or_unavailable() {
        let manager = ModelManager::new();
        assert!(matches!(
            manager.complete(AiTask::Excerpt, &TextRequest::new("x")).await,
            Err(AiError::NoModelAvailable(_))
        ));
        assert!(matches!(
            manager
                .generate_image(&ImageRequest {
                    prompt: "x".into(),
                    size: "1024x1024".into()
                })
                .await,
            Err(AiError::NoModelAvailable(_))
        ));

        let manager = ModelManager::new().with_text_model(Arc::new(
            MockTextModel::new(Provider::OpenAi, &[])
                .failing_on("gpt-4o-mini")
                .failing_on("gpt-4o"),
        ));
        assert!(matches!(
            manager.complete(AiTask::Excerpt, &TextRequest::new("x")).await,
            Err(AiError::Http { status: 503, .. })
        ));
    }

    #[test]
    fn test_status() {
        let manager = ModelManager::new()
            .with_text_model(Arc::new(MockTextModel::new(Provider::Anthropic, &[])));
        let status = manager.status();
        assert!(status
            .providers
            .iter()
            .any(|p| p.provider == Provider::Anthropic && p.configured));
        assert!(status
            .models
            .iter()
            .all(|m| m.available == (m.spec.provider == Provider::Anthropic)));
        assert_eq!(status.selected.get(&AiTask::Image), None);
        assert_eq!(
            status.selected.get(&AiTask::Excerpt),
            Some(&"claude-3-5-haiku-latest")
        );
    }
}
