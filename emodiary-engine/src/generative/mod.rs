//! Generative text and image collaborators
//!
//! Calls are best effort: every call returns a [`Generation`] and never an
//! error, so the pipeline can degrade to empty advice or a missing image.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::{GeminiClient, GeminiConfig};

/// Outcome of one generative call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation<T> {
    Produced(T),
    /// The model answered but returned nothing usable
    Empty,
    /// Transport, status or decoding failure
    Failed(String),
}

/// Text generation with a system instruction
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, instruction: &str, input: &str) -> Generation<String>;
}

/// Image generation from a diary prompt
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &ImagePrompt) -> Generation<Vec<u8>>;
}

/// Collaborator used when a generation kind is switched off in the settings
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

#[async_trait]
impl TextGenerator for Disabled {
    async fn generate_text(&self, _instruction: &str, _input: &str) -> Generation<String> {
        Generation::Empty
    }
}

#[async_trait]
impl ImageGenerator for Disabled {
    async fn generate_image(&self, _prompt: &ImagePrompt) -> Generation<Vec<u8>> {
        Generation::Empty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

/// Weather recorded with a diary entry; serialized with its Korean name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    #[serde(rename = "맑음")]
    Clear,
    #[serde(rename = "흐림")]
    Cloudy,
    #[serde(rename = "비")]
    Rain,
    #[serde(rename = "눈")]
    Snow,
    #[serde(rename = "천둥")]
    Thunder,
    #[serde(rename = "안개")]
    Fog,
}

impl Weather {
    pub fn label(self) -> &'static str {
        match self {
            Weather::Clear => "맑음",
            Weather::Cloudy => "흐림",
            Weather::Rain => "비",
            Weather::Snow => "눈",
            Weather::Thunder => "천둥",
            Weather::Fog => "안개",
        }
    }
}

/// Illustration request for one diary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePrompt {
    pub diary: String,
    pub gender: Gender,
    pub weather: Option<Weather>,
}

impl ImagePrompt {
    /// System instruction for the image model
    pub fn system_instruction() -> &'static str {
        include_str!("../../prompts/illustration.txt")
    }

    /// Full prompt text; the weather line is omitted when unknown.
    pub fn render(&self) -> String {
        let system = Self::system_instruction();
        let gender = self.gender.as_str();
        match self.weather {
            Some(weather) => format!(
                "{system}\n\n성별: \"{gender}\"\n\n날씨: \"{}\"\n\n일기 내용: \"{}\"",
                weather.label(),
                self.diary
            ),
            None => format!("{system}\n\n성별: \"{gender}\"\n\n일기 내용: \"{}\"", self.diary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_weather() {
        let prompt = ImagePrompt {
            diary: "비 오는 날 산책".to_string(),
            gender: Gender::Female,
            weather: Some(Weather::Rain),
        };
        let text = prompt.render();
        assert!(text.starts_with(ImagePrompt::system_instruction()));
        assert!(text.ends_with("\n\n성별: \"FEMALE\"\n\n날씨: \"비\"\n\n일기 내용: \"비 오는 날 산책\""));
    }

    #[test]
    fn test_render_without_weather() {
        let prompt = ImagePrompt {
            diary: "산책".to_string(),
            gender: Gender::Male,
            weather: None,
        };
        let text = prompt.render();
        let tail = &text[ImagePrompt::system_instruction().len()..];
        assert!(!tail.contains("날씨"));
        assert!(text.ends_with("\n\n성별: \"MALE\"\n\n일기 내용: \"산책\""));
    }

    #[test]
    fn test_weather_wire_names() {
        let parsed: Weather = serde_json::from_str("\"안개\"").unwrap();
        assert_eq!(parsed, Weather::Fog);
        assert_eq!(serde_json::to_string(&Weather::Thunder).unwrap(), "\"천둥\"");
        assert!(serde_json::from_str::<Weather>("\"Sunny\"").is_err());
    }

    #[test]
    fn test_gender_wire_names() {
        let parsed: Gender = serde_json::from_str("\"FEMALE\"").unwrap();
        assert_eq!(parsed, Gender::Female);
        assert!(serde_json::from_str::<Gender>("\"female\"").is_err());
    }

    #[test]
    fn test_disabled_collaborators_are_empty() {
        let prompt = ImagePrompt {
            diary: "x".into(),
            gender: Gender::Male,
            weather: None,
        };
        assert_eq!(
            tokio_test::block_on(Disabled.generate_text("i", "x")),
            Generation::Empty
        );
        assert_eq!(
            tokio_test::block_on(Disabled.generate_image(&prompt)),
            Generation::Empty
        );
    }
}
