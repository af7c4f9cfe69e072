//! HuggingFace download utilities
//!
//! Fetches the pretrained encoder config and tokenizer for a classifier family
//! and caches them locally. Families are defined in `models.toml` via
//! [`super::model_config`].

use super::error::ModelError;
use super::model_config::{ModelFamily, registry};
type Result<T> = super::error::Result<T>;
use hf_hub::{Repo, RepoType, api::sync::ApiBuilder};
use std::path::PathBuf;

/// Download a file from a HuggingFace model repository.
///
/// Returns the local path to the downloaded file.
/// The file is cached in the HuggingFace cache directory (~/.cache/huggingface/hub/).
///
/// # Environment Variables
/// * `HF_TOKEN` - HuggingFace API token (required for private repositories)
pub fn download_file(repo_id: &str, filename: &str) -> Result<PathBuf> {
    let mut builder = ApiBuilder::new();
    if let Ok(token) = std::env::var("HF_TOKEN") {
        builder = builder.with_token(Some(token));
    }
    let api = builder
        .build()
        .map_err(|e| ModelError::Download(e.into()))?;

    let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

    tracing::info!("Downloading {} from {}...", filename, repo_id);

    let path = repo
        .get(filename)
        .map_err(|e| ModelError::Download(e.into()))?;

    tracing::info!("Downloaded to {:?}", path);

    Ok(path)
}

/// Get the local path to the tokenizer of a model family, downloading if necessary.
///
/// Families whose repository has no `tokenizer.json` fail without touching the network.
pub fn get_tokenizer_path(family: &ModelFamily) -> Result<PathBuf> {
    let filename = family
        .tokenizer_file
        .as_deref()
        .ok_or_else(|| ModelError::NoHubTokenizer(family.repo_id.clone()))?;
    download_file(&family.repo_id, filename)
}

/// Get the local path to the encoder config of a model family, downloading if necessary.
pub fn get_config_path(family: &ModelFamily) -> Result<PathBuf> {
    download_file(&family.repo_id, &family.config_file)
}

/// Convenience: look up a family id in the global registry and return its tokenizer path.
pub fn get_tokenizer_path_by_id(model_id: &str) -> Result<PathBuf> {
    let family = registry()
        .find(model_id)
        .ok_or_else(|| ModelError::UnknownModel(model_id.to_string()))?;
    get_tokenizer_path(family)
}

/// Convenience: look up a family id and return the encoder config path.
pub fn get_config_path_by_id(model_id: &str) -> Result<PathBuf> {
    let family = registry()
        .find(model_id)
        .ok_or_else(|| ModelError::UnknownModel(model_id.to_string()))?;
    get_config_path(family)
}
