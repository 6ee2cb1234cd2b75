//! Resolve a model identifier to the files the extractor needs.
//!
//! An identifier is either a local directory or a HuggingFace Hub repo id.
//! Hub files are fetched with `hf-hub`'s blocking API and cached under the
//! usual HF cache directory.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};

use crate::{Error, Result};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const SAFETENSORS_FILE: &str = "model.safetensors";
pub const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Weight file, by serialization format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsFile {
    Safetensors(PathBuf),
    Pytorch(PathBuf),
}

/// Local paths of everything needed to build an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: WeightsFile,
}

impl ModelFiles {
    /// Local directory if `model_id` names one, otherwise the Hub.
    pub fn resolve(model_id: &str, revision: &str) -> Result<Self> {
        let dir = Path::new(model_id);
        if dir.is_dir() {
            Self::from_dir(dir)
        } else {
            Self::from_hub(model_id, revision)
        }
    }

    /// Files from a local checkpoint directory. Safetensors wins over a
    /// PyTorch pickle when both are present.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let require = |name: &str| -> Result<PathBuf> {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(Error::WeightLoad(format!("{name} not found in {}", dir.display())))
            }
        };

        let config = require(CONFIG_FILE)?;
        let tokenizer = require(TOKENIZER_FILE)?;
        let weights = match require(SAFETENSORS_FILE) {
            Ok(path) => WeightsFile::Safetensors(path),
            Err(_) => WeightsFile::Pytorch(require(PYTORCH_FILE).map_err(|_| {
                Error::WeightLoad(format!(
                    "neither {SAFETENSORS_FILE} nor {PYTORCH_FILE} found in {}",
                    dir.display()
                ))
            })?),
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    /// Download (or reuse the cached copy of) a Hub repository's files.
    pub fn from_hub(model_id: &str, revision: &str) -> Result<Self> {
        tracing::info!("Resolving {} @ {} on the HuggingFace Hub", model_id, revision);
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let config = repo.get(CONFIG_FILE)?;
        let tokenizer = repo.get(TOKENIZER_FILE)?;
        let weights = match repo.get(SAFETENSORS_FILE) {
            Ok(path) => WeightsFile::Safetensors(path),
            Err(e) => {
                tracing::debug!("{} unavailable ({}), trying {}", SAFETENSORS_FILE, e, PYTORCH_FILE);
                WeightsFile::Pytorch(repo.get(PYTORCH_FILE)?)
            }
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    /// Read and return `config.json`.
    pub fn read_config(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.config)?)
    }

    /// Open the weights as a VarBuilder.
    pub fn var_builder(&self, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
        match &self.weights {
            WeightsFile::Safetensors(path) => {
                tracing::info!("Loading weights from {:?}", path);
                // SAFETY: the file is mapped read-only and not modified while loaded.
                unsafe { VarBuilder::from_mmaped_safetensors(&[path], dtype, device) }
                    .map_err(|e| Error::WeightLoad(format!("{}: {e}", path.display())))
            }
            WeightsFile::Pytorch(path) => {
                tracing::info!("Loading PyTorch weights from {:?}", path);
                VarBuilder::from_pth(path, dtype, device)
                    .map_err(|e| Error::WeightLoad(format!("{}: {e}", path.display())))
            }
        }
    }
}
