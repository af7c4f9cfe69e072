//! Classifier weight file discovery and validation
//!
//! Weights are the fine-tuned state dict of the full classifier (encoder,
//! pooler, layer norm and head). Both safetensors and PyTorch pickles are
//! accepted; tensors are matched by structural name, not by position.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;

use super::error::ModelError;
type Result<T> = super::error::Result<T>;

/// Files smaller than this cannot hold a BERT state dict
pub const MIN_WEIGHTS_BYTES: u64 = 1000;

/// On-disk weight serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightFormat {
    SafeTensors,
    /// `torch.save(model.state_dict())` zip archive
    PyTorch,
}

impl WeightFormat {
    /// Infer the format from the file extension (`.safetensors`, `.pt`, `.pth`, `.bin`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "safetensors" => Some(WeightFormat::SafeTensors),
            "pt" | "pth" | "bin" => Some(WeightFormat::PyTorch),
            _ => None,
        }
    }
}

/// A weights file that passed the size and format checks
#[derive(Debug, Clone)]
pub struct WeightsFile {
    pub path: PathBuf,
    pub format: WeightFormat,
    pub size: u64,
}

/// Check that a weights file exists, is non-empty and plausibly complete.
pub fn inspect(path: impl AsRef<Path>) -> Result<WeightsFile> {
    let path = path.as_ref();
    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(ModelError::WeightsMissing(path.to_path_buf())),
    };
    let size = metadata.len();
    tracing::info!(
        "Weights file size: {:.2} MB ({})",
        size as f64 / (1024.0 * 1024.0),
        path.display()
    );
    if size == 0 {
        return Err(ModelError::WeightsEmpty(path.to_path_buf()));
    }
    if size < MIN_WEIGHTS_BYTES {
        return Err(ModelError::WeightsTruncated {
            path: path.to_path_buf(),
            size,
        });
    }
    let format = WeightFormat::from_path(path).ok_or_else(|| ModelError::WeightsCorrupted {
        path: path.to_path_buf(),
        source: "unrecognized weights extension (expected .safetensors, .pt, .pth or .bin)".into(),
    })?;
    Ok(WeightsFile {
        path: path.to_path_buf(),
        format,
        size,
    })
}

/// Return the first candidate path that exists as a file.
pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    for candidate in candidates {
        let path = candidate.as_ref();
        if path.is_file() {
            tracing::info!("Weights file found: {}", path.display());
            return Some(path.to_path_buf());
        }
        tracing::debug!("Weights candidate not present: {}", path.display());
    }
    None
}

/// Open a validated weights file as a candle `VarBuilder`.
pub fn var_builder(file: &WeightsFile, device: &Device) -> Result<VarBuilder<'static>> {
    let corrupted = |e: candle_core::Error| ModelError::WeightsCorrupted {
        path: file.path.clone(),
        source: e.into(),
    };
    match file.format {
        // SAFETY: mmap'd safetensors file; valid while the file is not modified
        // while the model is in use.
        WeightFormat::SafeTensors => unsafe {
            VarBuilder::from_mmaped_safetensors(&[&file.path], DType::F32, device)
                .map_err(corrupted)
        },
        WeightFormat::PyTorch => {
            VarBuilder::from_pth(&file.path, DType::F32, device).map_err(corrupted)
        }
    }
}
