//! # tunerx CLI
//!
//! Serves a LoRA fine-tuned model behind an OpenAI-compatible API and scores
//! it against a bilingual question/answer benchmark.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;

use tunerx_eval::{EvalConfig, Language};

mod commands;
mod config;

use config::ServeConfig;

#[derive(Parser)]
#[command(name = "tunerx")]
#[command(author = "Daemoniorum Engineering")]
#[command(version)]
#[command(about = "Serve and score LoRA fine-tuned language models", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the inference server
    Serve(ServeArgs),

    /// Score the served model against the benchmark
    Evaluate(EvaluateArgs),

    /// Score stored predictions offline
    Score {
        /// JSON array of {"prediction", "references"} records
        file: PathBuf,

        /// Print the callback payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version and build info
    Version,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the completion runtime
    #[arg(short, long)]
    runtime_url: Option<String>,

    /// Model name known to the runtime
    #[arg(long)]
    runtime_model: Option<String>,

    /// Served model id
    #[arg(short, long)]
    model_id: Option<String>,

    /// Pretrained base model directory
    #[arg(long)]
    base_model_dir: Option<PathBuf>,

    /// LoRA checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

impl ServeArgs {
    fn apply(self, cfg: &mut ServeConfig) {
        if let Some(host) = self.host {
            cfg.host = host;
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(url) = self.runtime_url {
            cfg.runtime_url = url;
        }
        cfg.runtime_model = self.runtime_model.or(cfg.runtime_model.take());
        cfg.model_id = self.model_id.or(cfg.model_id.take());
        cfg.base_model_dir = self.base_model_dir.or(cfg.base_model_dir.take());
        cfg.checkpoint_dir = self.checkpoint_dir.or(cfg.checkpoint_dir.take());
    }
}

#[derive(Args, Debug, Default)]
struct EvaluateArgs {
    /// URL of the inference route
    #[arg(short, long)]
    inference_service: Option<String>,

    /// Benchmark half to run (en, zh, all)
    #[arg(short = 'L', long)]
    language: Option<String>,

    /// Paired samples drawn with --language all
    #[arg(short = 'n', long)]
    sample_size: Option<usize>,

    /// Seed for the sample draw
    #[arg(long)]
    seed: Option<u64>,

    /// English dataset file
    #[arg(long)]
    dataset_en: Option<PathBuf>,

    /// Chinese dataset file
    #[arg(long)]
    dataset_zh: Option<PathBuf>,

    /// Completion callback URL
    #[arg(long)]
    notify_url: Option<String>,

    /// Do not post the result to the completion callback
    #[arg(long)]
    no_notify: bool,
}

impl EvaluateArgs {
    fn apply(self, cfg: &mut EvalConfig) -> bool {
        if let Some(url) = self.inference_service {
            cfg.inference_service = url;
        }
        if let Some(language) = self.language {
            cfg.language = Language::parse(&language);
        }
        if let Some(size) = self.sample_size {
            cfg.sample_size = size;
        }
        if let Some(path) = self.dataset_en {
            cfg.dataset_en = path;
        }
        if let Some(path) = self.dataset_zh {
            cfg.dataset_zh = path;
        }
        cfg.seed = self.seed.or(cfg.seed);
        cfg.notify_url = self.notify_url.or(cfg.notify_url.take());
        !self.no_notify
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Initialize logging
    let telemetry_config =
        tunerx_telemetry::TelemetryConfig::new("tunerx").with_log_level(&cli.log_level);

    let telemetry_config = if cli.json_logs {
        telemetry_config.with_json_logs()
    } else {
        telemetry_config
    };

    tunerx_telemetry::init_logging(&telemetry_config);

    let mut cfg = config::Config::load();

    match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut cfg.serve);
            commands::serve(cfg.serve).await?;
        },

        Commands::Evaluate(args) => {
            let notify = args.apply(&mut cfg.evaluate);
            commands::evaluate(cfg.evaluate, notify).await?;
        },

        Commands::Score { file, json } => {
            commands::score(&file, &cfg.evaluate.weights, json)?;
        },

        Commands::Version => {
            commands::version();
        },

        Commands::Config { action } => match action {
            ConfigAction::Show => config::show_config()?,
            ConfigAction::Path => {
                println!("{}", config::Config::config_path().display());
            },
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serve_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tunerx",
            "serve",
            "--port",
            "9001",
            "--runtime-url",
            "http://vllm:8000",
            "--checkpoint-dir",
            "/ckpt",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let mut cfg = ServeConfig {
            base_model_dir: Some("/base".into()),
            ..ServeConfig::default()
        };
        args.apply(&mut cfg);

        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.runtime_url, "http://vllm:8000");
        assert_eq!(cfg.base_model_dir, Some(PathBuf::from("/base")));
        assert_eq!(cfg.checkpoint_dir, Some(PathBuf::from("/ckpt")));
    }

    #[test]
    fn test_evaluate_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tunerx",
            "--log-level",
            "debug",
            "evaluate",
            "-L",
            "all",
            "-n",
            "10",
            "--seed",
            "7",
            "--no-notify",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");

        let Commands::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        let mut cfg = EvalConfig {
            notify_url: Some("http://callback".to_string()),
            ..EvalConfig::default()
        };
        let notify = args.apply(&mut cfg);

        assert!(!notify);
        assert_eq!(cfg.language, Language::All);
        assert_eq!(cfg.sample_size, 10);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.notify_url.as_deref(), Some("http://callback"));
    }

    #[test]
    fn test_evaluate_defaults_notify() {
        let mut cfg = EvalConfig::default();
        assert!(EvaluateArgs::default().apply(&mut cfg));
        assert_eq!(cfg, EvalConfig::default());
    }
}
