//! LoRA adapter metadata.
//!
//! The adapter weights are merged by the inference runtime; tunerx only needs
//! to know what is being served. A PEFT checkpoint directory carries an
//! `adapter_config.json` describing the low-rank adaptation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ModelId;

/// File name of the PEFT adapter configuration inside a checkpoint directory.
pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";

/// Configuration of a LoRA adapter, as written by PEFT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Adapter method (`LORA` for the checkpoints we serve).
    #[serde(default = "default_peft_type")]
    pub peft_type: String,
    /// Task the adapter was trained for.
    #[serde(default)]
    pub task_type: Option<String>,
    /// Rank of adaptation matrices.
    #[serde(default = "default_rank")]
    pub r: u32,
    /// Scaling factor (alpha).
    #[serde(default = "default_alpha")]
    pub lora_alpha: f32,
    /// Dropout probability.
    #[serde(default = "default_dropout")]
    pub lora_dropout: f32,
    /// Target modules to adapt.
    #[serde(default = "default_target_modules")]
    pub target_modules: Vec<String>,
    /// Base model the adapter was trained on.
    #[serde(default)]
    pub base_model_name_or_path: Option<String>,
}

fn default_peft_type() -> String {
    "LORA".to_string()
}

fn default_rank() -> u32 {
    8
}

fn default_alpha() -> f32 {
    16.0
}

fn default_dropout() -> f32 {
    0.05
}

fn default_target_modules() -> Vec<String> {
    vec!["q_proj".to_string(), "v_proj".to_string()]
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            peft_type: default_peft_type(),
            task_type: None,
            r: default_rank(),
            lora_alpha: default_alpha(),
            lora_dropout: default_dropout(),
            target_modules: default_target_modules(),
            base_model_name_or_path: None,
        }
    }
}

impl AdapterConfig {
    /// Reads `adapter_config.json` from a checkpoint directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_checkpoint(checkpoint_dir: &Path) -> Result<Self> {
        let path = checkpoint_dir.join(ADAPTER_CONFIG_FILE);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::model_load(&path, e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| Error::model_load(&path, e.to_string()))
    }

    /// Scaling applied to the low-rank update (alpha / r).
    #[must_use]
    pub fn scaling(&self) -> f32 {
        if self.r == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let r = self.r as f32;
        self.lora_alpha / r
    }

    /// Trainable parameters added to one adapted projection.
    #[must_use]
    pub fn num_parameters(&self, in_features: u32, out_features: u32) -> u64 {
        // A is (in_features x r), B is (r x out_features)
        u64::from(self.r) * (u64::from(in_features) + u64::from(out_features))
    }
}

/// The base model plus adapter checkpoint being served.
#[derive(Debug, Clone)]
pub struct ServedModel {
    /// Served model identifier.
    pub id: ModelId,
    /// Directory of the pretrained base model.
    pub base_model_dir: Option<PathBuf>,
    /// Directory of the adapter checkpoint.
    pub checkpoint_dir: Option<PathBuf>,
    /// Adapter configuration, when the checkpoint carries one.
    pub adapter: Option<AdapterConfig>,
}

impl ServedModel {
    /// Describes a model known only by name (for example a runtime-side alias).
    #[must_use]
    pub fn named(id: impl Into<ModelId>) -> Self {
        Self {
            id: id.into(),
            base_model_dir: None,
            checkpoint_dir: None,
            adapter: None,
        }
    }

    /// Inspects the base model and checkpoint directories.
    ///
    /// The checkpoint's adapter configuration is read when present; its
    /// absence is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory does not exist or the adapter
    /// configuration is malformed.
    pub fn load(base_model_dir: &Path, checkpoint_dir: &Path) -> Result<Self> {
        for dir in [base_model_dir, checkpoint_dir] {
            if !dir.is_dir() {
                return Err(Error::model_load(dir, "not a directory"));
            }
        }

        let adapter = if checkpoint_dir.join(ADAPTER_CONFIG_FILE).is_file() {
            Some(AdapterConfig::from_checkpoint(checkpoint_dir)?)
        } else {
            tracing::warn!(
                checkpoint = %checkpoint_dir.display(),
                "No adapter_config.json in checkpoint, serving without adapter metadata"
            );
            None
        };

        let id = ModelId::new(format!(
            "{}+{}",
            dir_name(base_model_dir),
            dir_name(checkpoint_dir)
        ));

        if let Some(adapter) = &adapter {
            tracing::info!(
                model = %id,
                rank = adapter.r,
                alpha = adapter.lora_alpha,
                scaling = adapter.scaling(),
                targets = ?adapter.target_modules,
                "Adapter configuration loaded"
            );
        }

        Ok(Self {
            id,
            base_model_dir: Some(base_model_dir.to_path_buf()),
            checkpoint_dir: Some(checkpoint_dir.to_path_buf()),
            adapter,
        })
    }

    /// Overrides the served model identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ModelId>) -> Self {
        self.id = id.into();
        self
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("model")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_adapter_config_from_peft_json() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(ADAPTER_CONFIG_FILE),
            r#"{
                "peft_type": "LORA",
                "task_type": "CAUSAL_LM",
                "r": 16,
                "lora_alpha": 32,
                "lora_dropout": 0.1,
                "target_modules": ["q_proj", "k_proj", "v_proj", "o_proj"],
                "base_model_name_or_path": "/data/llms/llama2-7b",
                "inference_mode": true
            }"#,
        )
        .unwrap();

        let config = AdapterConfig::from_checkpoint(dir.path()).unwrap();
        assert_eq!(config.r, 16);
        assert_eq!(config.target_modules.len(), 4);
        assert!((config.scaling() - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.num_parameters(4096, 4096), 16 * 8192);
    }

    #[test]
    fn test_adapter_config_defaults() {
        let config: AdapterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AdapterConfig::default());
        assert!((config.scaling() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_served_model_load() {
        let root = tempdir().unwrap();
        let base = root.path().join("llama2-7b");
        let ckpt = root.path().join("checkpoint-42");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::create_dir_all(&ckpt).unwrap();
        std::fs::write(ckpt.join(ADAPTER_CONFIG_FILE), r#"{"r": 4}"#).unwrap();

        let served = ServedModel::load(&base, &ckpt).unwrap();
        assert_eq!(served.id.as_str(), "llama2-7b+checkpoint-42");
        assert_eq!(served.adapter.map(|a| a.r), Some(4));
    }

    #[test]
    fn test_served_model_without_adapter_config() {
        let root = tempdir().unwrap();
        let served = ServedModel::load(root.path(), root.path()).unwrap();
        assert!(served.adapter.is_none());
    }

    #[test]
    fn test_served_model_missing_dir() {
        let root = tempdir().unwrap();
        let missing = root.path().join("nope");
        let err = ServedModel::load(root.path(), &missing).unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
    }
}
