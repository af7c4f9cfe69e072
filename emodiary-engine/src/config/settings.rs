//! Settings configuration
//!
//! Default values are defined in `config/default.toml`; a user file is merged
//! on top of them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generative::GeminiConfig;

/// Default configuration TOML embedded from config/default.toml
const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub generation: GenerationSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum request body size in bytes
    pub body_limit_bytes: usize,
}

/// Emotion classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Family id in models.toml
    pub family: String,
    pub max_len: usize,
    /// Candidate weight files, first existing wins
    pub weights_search_paths: Vec<PathBuf>,
    /// Local tokenizer.json (skips the HuggingFace download)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
    /// Local encoder config.json (skips the HuggingFace download)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
}

/// Generative API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub retry_backoff_ms: u64,
    pub text_enabled: bool,
    pub image_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("embedded default.toml must be valid")
    }
}

/// Recursively merge `overlay` TOML values on top of `base`.
fn merge_toml(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(key) {
                    merge_toml(base_value, value);
                } else {
                    base_table.insert(key.clone(), value.clone());
                }
            }
        }
        (base, _) => {
            *base = overlay.clone();
        }
    }
}

/// Parse user TOML content merged on top of default.toml.
fn parse_with_defaults(user_content: &str) -> Result<Settings> {
    let mut base: toml::Value = toml::from_str(DEFAULT_CONFIG_TOML)?;
    let user: toml::Value = toml::from_str(user_content).context("invalid settings TOML")?;
    merge_toml(&mut base, &user);
    let settings: Settings = base.try_into()?;
    Ok(settings)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "emodiary", "emodiary")
}

impl Settings {
    pub fn config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load settings from the user configuration file.
    /// Falls back to embedded default.toml if the config file does not exist.
    pub fn load() -> Result<Self> {
        let Some(config_file) = Self::config_file() else {
            warn!("Could not determine config directory, using defaults");
            return Ok(Self::default());
        };

        if !config_file.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&config_file)
    }

    /// Load settings from a specific file, merged on top of defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_with_defaults(&content)
    }

    /// Gemini client settings, with API key and base overrides from the environment.
    pub fn gemini_config(&self) -> GeminiConfig {
        let generation = &self.generation;
        GeminiConfig {
            api_base: generation.api_base.clone(),
            api_key: None,
            text_model: generation.text_model.clone(),
            image_model: generation.image_model.clone(),
            timeout: Duration::from_secs(generation.timeout_secs),
            max_retries: generation.max_retries,
            retry_backoff: Duration::from_millis(generation.retry_backoff_ms),
        }
        .with_env()
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

impl ModelSettings {
    /// Weight search paths with relative entries resolved against `base_dir`.
    pub fn weights_candidates(&self, base_dir: &Path) -> Vec<PathBuf> {
        self.weights_search_paths
            .iter()
            .map(|p| resolve(base_dir, p))
            .collect()
    }

    /// Local tokenizer override, resolved against `base_dir`.
    pub fn tokenizer_file(&self, base_dir: &Path) -> Option<PathBuf> {
        self.tokenizer_path.as_deref().map(|p| resolve(base_dir, p))
    }

    /// Local encoder config override, resolved against `base_dir`.
    pub fn config_file(&self, base_dir: &Path) -> Option<PathBuf> {
        self.config_path.as_deref().map(|p| resolve(base_dir, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.model.family, "kobert-diary-7");
        assert_eq!(settings.model.max_len, 128);
        assert_eq!(settings.model.weights_search_paths.len(), 4);
        assert_eq!(
            settings.model.tokenizer_path.as_deref(),
            Some(Path::new("model/tokenizer.json"))
        );
        assert!(settings.model.config_path.is_none());
        assert_eq!(settings.generation.text_model, "gemini-2.5-flash");
        assert_eq!(settings.generation.image_model, "gemini-2.5-flash-image");
        assert!(settings.generation.text_enabled && settings.generation.image_enabled);
    }

    #[test]
    fn test_serialize_deserialize() {
        let settings = Settings::default();
        let toml_str = toml::to_string(&settings).unwrap();
        let loaded: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.model.max_len, settings.model.max_len);
        assert_eq!(
            loaded.model.weights_search_paths,
            settings.model.weights_search_paths
        );
    }

    #[test]
    fn test_load_from_file_merges_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[model]
max_len = 64
tokenizer_path = "/opt/kobert/tokenizer.json"

[generation]
image_enabled = false
"#
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.model.max_len, 64);
        assert_eq!(settings.model.family, "kobert-diary-7");
        assert_eq!(
            settings.model.tokenizer_path.as_deref(),
            Some(Path::new("/opt/kobert/tokenizer.json"))
        );
        assert!(!settings.generation.image_enabled);
        assert!(settings.generation.text_enabled);
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_local_paths_resolve_against_base_dir() {
        let mut model = Settings::default().model;
        let base = Path::new("/srv/emodiary");
        assert_eq!(
            model.tokenizer_file(base),
            Some(PathBuf::from("/srv/emodiary/model/tokenizer.json"))
        );
        assert_eq!(model.config_file(base), None);

        model.config_path = Some(PathBuf::from("/opt/kobert/config.json"));
        assert_eq!(
            model.config_file(base),
            Some(PathBuf::from("/opt/kobert/config.json"))
        );
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model\nmax_len = ").unwrap();
        assert!(Settings::load_from(file.path()).is_err());
    }

    #[test]
    fn test_wrong_type_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"eighty\"").unwrap();
        assert!(Settings::load_from(file.path()).is_err());
    }

    #[test]
    fn test_weights_candidates_resolution() {
        let mut settings = Settings::default();
        settings.model.weights_search_paths =
            vec![PathBuf::from("best_model.pt"), PathBuf::from("/abs/best_model.pt")];
        let candidates = settings.model.weights_candidates(Path::new("/srv/app"));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/srv/app/best_model.pt"),
                PathBuf::from("/abs/best_model.pt")
            ]
        );
    }

    #[test]
    fn test_config_file_name() {
        if let Some(path) = Settings::config_file() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
