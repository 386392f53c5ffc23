//! Configuration management for the tunerx CLI.
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Command-line arguments
//! 2. Deployment environment variables (`BASE_MODEL_DIR`, `CHECKPOINT_DIR`,
//!    `INFERENCE_SERVICE`, `EVALUATION_LANGUAGE`, `COMPLETE_NOTIFY_URL`)
//! 3. Environment variables (`TUNERX_*`, nested with `__`)
//! 4. Config file (`~/.config/tunerx/config.toml`)
//! 5. Default values

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use tunerx_eval::EvalConfig;

/// Legacy deployment environment variables and the keys they set.
const DEPLOYMENT_ENV: [(&str, &str); 5] = [
    ("BASE_MODEL_DIR", "serve.base_model_dir"),
    ("CHECKPOINT_DIR", "serve.checkpoint_dir"),
    ("INFERENCE_SERVICE", "evaluate.inference_service"),
    ("EVALUATION_LANGUAGE", "evaluate.language"),
    ("COMPLETE_NOTIFY_URL", "evaluate.notify_url"),
];

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Inference server settings.
    #[serde(default)]
    pub serve: ServeConfig,

    /// Scoring job settings.
    #[serde(default)]
    pub evaluate: EvalConfig,
}

/// Settings of `tunerx serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Base URL of the completion runtime hosting the weights.
    pub runtime_url: String,
    /// Model name known to the runtime.
    pub runtime_model: Option<String>,
    /// Served model id; derived from the directories when unset.
    pub model_id: Option<String>,
    /// Pretrained base model directory.
    pub base_model_dir: Option<PathBuf>,
    /// LoRA checkpoint directory.
    pub checkpoint_dir: Option<PathBuf>,
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Default temperature.
    pub temperature: f32,
    /// Default top-p.
    pub top_p: f32,
    /// Default maximum tokens.
    pub max_tokens: u32,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Timeout of runtime requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            runtime_url: "http://127.0.0.1:8000".to_string(),
            runtime_model: None,
            model_id: None,
            base_model_dir: None,
            checkpoint_dir: None,
            system_prompt: None,
            temperature: 0.1,
            top_p: 0.1,
            max_tokens: 1024,
            cors: true,
            request_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Loads configuration from all sources.
    ///
    /// Reports warnings for configuration errors but falls back to defaults.
    pub fn load() -> Self {
        let config_path = Self::config_path();

        match Self::figment(&config_path).extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("\x1b[33mWarning:\x1b[0m Configuration error, using defaults");
                eprintln!("  Config file: {}", config_path.display());
                eprintln!("  Error: {e}");
                eprintln!();
                eprintln!("  To fix, edit or delete the config file:");
                eprintln!("    rm {}", config_path.display());
                eprintln!();
                Config::default()
            },
        }
    }

    /// Layered configuration sources, lowest precedence first.
    pub fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TUNERX_").split("__"))
            .merge(deployment_env())
    }

    /// Returns the path to the config file.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Returns the path to the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tunerx")
    }
}

fn deployment_env() -> Env {
    let names = DEPLOYMENT_ENV.map(|(name, _)| name);
    Env::raw().only(&names).map(|key| {
        DEPLOYMENT_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map_or_else(|| key.as_str().to_owned().into(), |(_, path)| (*path).into())
    })
}

/// Prints the effective configuration and its sources.
pub fn show_config() -> color_eyre::Result<()> {
    let config = Config::load();
    let config_path = Config::config_path();

    println!("tunerx Configuration");
    println!("====================\n");

    println!("Config file: {}", config_path.display());
    if config_path.exists() {
        println!("Status: Found\n");
    } else {
        println!("Status: Not found (using defaults)\n");
    }

    println!("Effective settings:\n");
    println!("{}", toml::to_string_pretty(&config)?);

    println!("Environment variables:");
    println!("  TUNERX_SERVE__<KEY>, TUNERX_EVALUATE__<KEY>");
    for (name, path) in DEPLOYMENT_ENV {
        println!("  {name} -> {path}");
    }

    Ok(())
}
