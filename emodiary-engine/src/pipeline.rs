//! Diary analysis pipeline
//!
//! [`InferenceContext`] is built once at startup and shared read-only.
//! A request is classified synchronously, then the feedback and illustration
//! calls run concurrently; their failures only blank the affected fields.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Settings;
use crate::emotion::{
    Backend, Emotion, EmotionClassifier, EmotionResult, ModelError, SequenceTransform, Vocab,
    select_device, weights,
};
use crate::feedback::{self, FeedbackResult};
use crate::generative::{
    Disabled, GeminiClient, Gender, Generation, ImageGenerator, ImagePrompt, TextGenerator,
    Weather,
};
use crate::persona::{self, PersonaResolution};

/// Errors that end a request before any generative call
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no content to analyze")]
    EmptyContent,

    #[error("emotion model is not loaded")]
    ModelUnavailable(String),

    #[error("processing failed")]
    Classification(#[source] ModelError),
}

impl PipelineError {
    pub fn payload(&self) -> ErrorPayload {
        let detail = match self {
            PipelineError::EmptyContent => "content is required".to_string(),
            PipelineError::ModelUnavailable(reason) => reason.clone(),
            PipelineError::Classification(source) => error_chain(source),
        };
        ErrorPayload {
            error: self.to_string(),
            detail,
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// `{error, detail}` body returned for failed requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub detail: String,
}

/// A null or missing text reads as the empty string.
pub fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Diary analysis request
#[derive(Debug, Clone, Deserialize)]
pub struct DiaryRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub weather: Option<Weather>,
    /// Persona identifier; unknown identifiers skip the feedback call
    pub persona: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecommendedFood {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryResponse {
    pub emotion: Emotion,
    pub ai_comment: String,
    pub recommended_food: RecommendedFood,
    /// Base64-encoded illustration
    pub image: Option<String>,
}

enum ModelState {
    Ready {
        classifier: EmotionClassifier,
        vocab: Vocab,
    },
    Unavailable(String),
}

/// Everything a request needs, loaded once
pub struct InferenceContext {
    model: ModelState,
    transform: SequenceTransform,
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
}

impl InferenceContext {
    pub fn new(
        classifier: EmotionClassifier,
        vocab: Vocab,
        transform: SequenceTransform,
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            model: ModelState::Ready { classifier, vocab },
            transform,
            text,
            image,
        }
    }

    /// A context whose classifier failed to load. Every request reports the reason.
    pub fn unavailable(
        reason: impl Into<String>,
        transform: SequenceTransform,
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            model: ModelState::Unavailable(reason.into()),
            transform,
            text,
            image,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.model, ModelState::Ready { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.model {
            ModelState::Ready { .. } => None,
            ModelState::Unavailable(reason) => Some(reason),
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        match &self.model {
            ModelState::Ready { classifier, .. } => Some(classifier.model_display_name()),
            ModelState::Unavailable(_) => None,
        }
    }

    pub fn vocab(&self) -> Option<&Vocab> {
        match &self.model {
            ModelState::Ready { vocab, .. } => Some(vocab),
            ModelState::Unavailable(_) => None,
        }
    }

    pub fn transform(&self) -> &SequenceTransform {
        &self.transform
    }

    /// Validate and classify diary content. CPU-bound; run it on a blocking thread
    /// inside async servers.
    pub fn classify(&self, content: &str) -> Result<EmotionResult, PipelineError> {
        let (classifier, vocab) = match &self.model {
            ModelState::Ready { classifier, vocab } => (classifier, vocab),
            ModelState::Unavailable(reason) => {
                return Err(PipelineError::ModelUnavailable(reason.clone()));
            }
        };
        let content = content.trim();
        if content.is_empty() {
            return Err(PipelineError::EmptyContent);
        }
        let encoded = self
            .transform
            .encode(vocab, Some(content), None)
            .map_err(PipelineError::Classification)?;
        let result = classifier
            .classify(&encoded)
            .map_err(PipelineError::Classification)?;
        tracing::debug!(
            "Classified diary: emotion={} confidence={:.2} valid_length={}",
            result.emotion,
            result.confidence,
            encoded.valid_length
        );
        Ok(result)
    }

    /// Request feedback and an illustration for a classified diary.
    pub async fn enrich(&self, request: &DiaryRequest, emotion: Emotion) -> DiaryResponse {
        let content = request.content.trim();
        let prompt = ImagePrompt {
            diary: content.to_string(),
            gender: request.gender,
            weather: request.weather,
        };
        let (feedback, image) = tokio::join!(
            self.feedback(&request.persona, emotion, content),
            self.image.generate_image(&prompt),
        );

        let image = match image {
            Generation::Produced(bytes) => Some(BASE64.encode(bytes)),
            Generation::Empty => {
                tracing::warn!("Image generation returned no image");
                None
            }
            Generation::Failed(reason) => {
                tracing::warn!("Image generation failed: {reason}");
                None
            }
        };

        DiaryResponse {
            emotion,
            ai_comment: feedback.advice,
            recommended_food: RecommendedFood {
                name: feedback.food_name,
                reason: feedback.food_reason,
            },
            image,
        }
    }

    async fn feedback(&self, persona_id: &str, emotion: Emotion, content: &str) -> FeedbackResult {
        let instruction = match persona::resolve(persona_id) {
            PersonaResolution::Instruction(_, instruction) => instruction,
            PersonaResolution::Invalid => return FeedbackResult::default(),
        };
        let input = serde_json::json!({ "감정": emotion.label(), "일기": content }).to_string();
        match self.text.generate_text(instruction, &input).await {
            Generation::Produced(text) => feedback::parse(&text),
            Generation::Empty => {
                tracing::warn!("Feedback generation returned no text");
                FeedbackResult::default()
            }
            Generation::Failed(reason) => {
                tracing::warn!("Feedback generation failed: {reason}");
                FeedbackResult::default()
            }
        }
    }

    /// Build a context from settings.
    ///
    /// Classifier load failures do not abort startup: the context is built in
    /// the unavailable state and every request reports the reason. Only
    /// invalid settings are returned as errors.
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> anyhow::Result<Self> {
        let transform = SequenceTransform::single(settings.model.max_len)
            .context("invalid [model].max_len")?;
        let (text, image) = generators(settings)?;

        let candidates = settings.model.weights_candidates(base_dir);
        let Some(weights_path) = weights::discover(&candidates) else {
            let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            let reason = format!("weights file not found (searched: {})", searched.join(", "));
            tracing::error!("{reason}");
            return Ok(Self::unavailable(reason, transform, text, image));
        };

        match load_classifier(settings, base_dir, &weights_path) {
            Ok((classifier, vocab)) => {
                tracing::info!("Emotion classifier ready: {}", classifier.model_display_name());
                Ok(Self::new(classifier, vocab, transform, text, image))
            }
            Err(e) => {
                let reason = error_chain(&e);
                tracing::error!("Failed to load emotion classifier: {reason}");
                Ok(Self::unavailable(reason, transform, text, image))
            }
        }
    }

    /// Classify and enrich in one call, classifying on the current thread.
    pub async fn analyze(&self, request: &DiaryRequest) -> Result<DiaryResponse, PipelineError> {
        let result = self.classify(&request.content)?;
        Ok(self.enrich(request, result.emotion).await)
    }
}

fn load_classifier(
    settings: &Settings,
    base_dir: &Path,
    weights_path: &Path,
) -> Result<(EmotionClassifier, Vocab), ModelError> {
    let mut backend = Backend::from_family_id(&settings.model.family, weights_path)?;
    if let Some(path) = settings.model.tokenizer_file(base_dir) {
        backend = backend.with_tokenizer_path(path);
    }
    if let Some(path) = settings.model.config_file(base_dir) {
        backend = backend.with_config_path(path);
    }
    backend.load(&select_device())
}

type Generators = (Arc<dyn TextGenerator>, Arc<dyn ImageGenerator>);

fn generators(settings: &Settings) -> anyhow::Result<Generators> {
    let generation = &settings.generation;
    if !generation.text_enabled && !generation.image_enabled {
        tracing::info!("Generative calls disabled");
        return Ok((Arc::new(Disabled), Arc::new(Disabled)));
    }
    let client = Arc::new(GeminiClient::new(settings.gemini_config())?);
    let text: Arc<dyn TextGenerator> = if generation.text_enabled {
        client.clone()
    } else {
        Arc::new(Disabled)
    };
    let image: Arc<dyn ImageGenerator> = if generation.image_enabled {
        client
    } else {
        Arc::new(Disabled)
    };
    Ok((text, image))
}
