pub mod config;
pub mod emotion;
pub mod feedback;
pub mod generative;
pub mod persona;
pub mod pipeline;
pub mod text;

pub use config::Settings;
pub use emotion::{Emotion, EmotionClassifier, EmotionResult, SequenceTransform, Vocab};
pub use feedback::FeedbackResult;
pub use generative::{Gender, Generation, ImageGenerator, ImagePrompt, TextGenerator, Weather};
pub use persona::{Persona, PersonaResolution};
pub use pipeline::{DiaryRequest, DiaryResponse, ErrorPayload, InferenceContext, PipelineError};
pub use text::normalize_nfkc;
