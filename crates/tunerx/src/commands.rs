//! CLI command implementations.

use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{bail, eyre, Result};
use indicatif::{ProgressBar, ProgressStyle};

use tunerx_core::{SamplingParams, ServedModel};
use tunerx_eval::dataset::load_predictions;
use tunerx_eval::{EvalConfig, Evaluator, Notification, QuestionOutcome, Report, ScoreCard, ScoreWeights};
use tunerx_server::{RemoteEngine, RemoteEngineConfig, Server, ServerConfig};

use crate::config::ServeConfig;

/// Start the inference server.
pub async fn serve(cfg: ServeConfig) -> Result<()> {
    tracing::info!("Starting tunerx server...");

    let served = served_model(&cfg)?;

    let mut engine_config = RemoteEngineConfig::builder()
        .base_url(&cfg.runtime_url)
        .timeout(Duration::from_secs(cfg.request_timeout_secs));
    if let Some(model) = &cfg.runtime_model {
        engine_config = engine_config.runtime_model(model);
    }
    if let Some(prompt) = &cfg.system_prompt {
        engine_config = engine_config.system_prompt(prompt);
    }
    let engine = RemoteEngine::new(engine_config.build()?, served)?;

    let addr = (cfg.host.as_str(), cfg.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| eyre!("could not resolve {}:{}", cfg.host, cfg.port))?;

    let sampling = SamplingParams::default()
        .with_temperature(cfg.temperature)
        .with_top_p(cfg.top_p)
        .with_max_tokens(cfg.max_tokens);

    let config = ServerConfig::builder()
        .addr(addr)
        .cors(cfg.cors)
        .sampling(sampling)
        .build()?;

    Server::new(config, Arc::new(engine)).run().await?;

    Ok(())
}

/// Resolves the model being served from the configured directories.
pub(crate) fn served_model(cfg: &ServeConfig) -> Result<ServedModel> {
    let served = match (&cfg.base_model_dir, &cfg.checkpoint_dir) {
        (Some(base), Some(checkpoint)) => ServedModel::load(base, checkpoint)?,
        (None, None) => ServedModel::named(
            cfg.model_id
                .clone()
                .or_else(|| cfg.runtime_model.clone())
                .unwrap_or_else(|| "tunerx".to_string()),
        ),
        _ => bail!("base_model_dir and checkpoint_dir must be set together"),
    };

    Ok(match &cfg.model_id {
        Some(id) => served.with_id(id.as_str()),
        None => served,
    })
}

/// Run the scoring job against the inference service.
pub async fn evaluate(cfg: EvalConfig, notify: bool) -> Result<()> {
    let evaluator = Evaluator::new(cfg)?;
    let samples = evaluator.load_samples()?;

    println!("Evaluating {} questions", samples.len());
    println!("Inference service: {}", evaluator.config().inference_service);
    println!("Language: {}\n", evaluator.config().language);

    let progress = ProgressBar::new(samples.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let report = evaluator
        .run(&samples, |event| {
            match &event.outcome {
                QuestionOutcome::Answered { request_secs, .. } => {
                    progress.set_message(format!("{request_secs:.2}s"));
                },
                QuestionOutcome::Skipped { error } => {
                    progress.println(format!("Skipped question {}: {error}", event.index));
                },
            }
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    print_report(&report);

    if notify {
        match evaluator.notify(&report).await? {
            Some(body) => println!("\nNotification sent: {body}"),
            None => println!("\nNo notify_url configured; notification skipped."),
        }
    }

    Ok(())
}

/// Score stored predictions without calling the model.
pub fn score(path: &Path, weights: &ScoreWeights, json: bool) -> Result<()> {
    weights.validate()?;
    let (predictions, references) = load_predictions(path)?;
    let card = ScoreCard::from_pairs(&predictions, &references, weights);

    if json {
        println!("{}", serde_json::to_string_pretty(&Notification::from(&card))?);
    } else {
        println!("Scored {} predictions from {}\n", predictions.len(), path.display());
        print_card(&card);
    }

    Ok(())
}

fn print_report(report: &Report) {
    println!("Evaluation complete");
    println!("===================\n");
    println!("Language:  {}", report.language);
    println!("Evaluated: {}", report.evaluated);
    println!("Skipped:   {}\n", report.skipped);
    print_card(&report.card);
}

fn print_card(card: &ScoreCard) {
    println!("Score: {}", card.score_string());
    println!("  ROUGE (weighted): {:.2}", card.composite.rouge);
    println!("  BLEU:             {:.2}", card.composite.bleu);
    println!("\nDetails:");
    for (key, value) in card.details() {
        println!("  {key:<20} {value}");
    }
}

/// Display version and build info.
pub fn version() {
    println!("tunerx {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Components:");
    println!("  tunerx-server    - OpenAI-compatible inference server");
    println!("  tunerx-eval      - ROUGE/BLEU scoring job");
    println!("  tunerx-telemetry - Logging and request metrics");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_served_model_by_name() {
        let cfg = ServeConfig {
            runtime_model: Some("llama-2-7b-lora".to_string()),
            ..ServeConfig::default()
        };
        assert_eq!(served_model(&cfg).unwrap().id.as_str(), "llama-2-7b-lora");

        let cfg = ServeConfig {
            model_id: Some("custom".to_string()),
            runtime_model: Some("ignored".to_string()),
            ..ServeConfig::default()
        };
        assert_eq!(served_model(&cfg).unwrap().id.as_str(), "custom");

        assert_eq!(
            served_model(&ServeConfig::default()).unwrap().id.as_str(),
            "tunerx"
        );
    }

    #[test]
    fn test_served_model_from_directories() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("Llama-2-7b-chat-hf");
        let checkpoint = dir.path().join("checkpoint-500");
        std::fs::create_dir(&base).unwrap();
        std::fs::create_dir(&checkpoint).unwrap();

        let cfg = ServeConfig {
            base_model_dir: Some(base),
            checkpoint_dir: Some(checkpoint),
            ..ServeConfig::default()
        };
        let served = served_model(&cfg).unwrap();
        assert_eq!(served.id.as_str(), "Llama-2-7b-chat-hf+checkpoint-500");
        assert!(served.adapter.is_none());
    }

    #[test]
    fn test_served_model_requires_both_directories() {
        let cfg = ServeConfig {
            base_model_dir: Some("/models/base".into()),
            ..ServeConfig::default()
        };
        assert!(served_model(&cfg).is_err());
    }

    #[test]
    fn test_score_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predictions.json");
        std::fs::write(
            &path,
            r#"[{"prediction": "a low rank adapter", "references": "a low rank adapter"}]"#,
        )
        .unwrap();

        assert!(score(&path, &ScoreWeights::default(), true).is_ok());
        assert!(score(&dir.path().join("missing.json"), &ScoreWeights::default(), false).is_err());
    }
}
