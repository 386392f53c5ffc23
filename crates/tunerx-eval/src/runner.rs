//! The scoring job: ask every question, score the answers, report.

use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::client::{InferenceClient, RetryPolicy};
use crate::dataset::{Dataset, Language, Sample};
use crate::error::{EvalError, Result};
use crate::notify::{self, Notification};
use crate::score::{ScoreCard, ScoreWeights};

/// Scoring job configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// URL of the inference route.
    pub inference_service: String,
    /// Completion callback URL; no notification when unset.
    pub notify_url: Option<String>,
    /// Benchmark half to run.
    pub language: Language,
    /// English dataset file.
    pub dataset_en: PathBuf,
    /// Chinese dataset file.
    pub dataset_zh: PathBuf,
    /// Paired samples drawn when running both languages.
    pub sample_size: usize,
    /// Attempts per question.
    pub max_retries: u32,
    /// Pause between attempts, in seconds.
    pub retry_interval_secs: u64,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Seed for the paired sample draw; random when unset.
    pub seed: Option<u64>,
    /// Composite score weights.
    pub weights: ScoreWeights,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            inference_service: "http://127.0.0.1:8080/inference".to_string(),
            notify_url: None,
            language: Language::default(),
            dataset_en: PathBuf::from("datasets/questions_references_en.json"),
            dataset_zh: PathBuf::from("datasets/questions_references_zh.json"),
            sample_size: 50,
            max_retries: 3,
            retry_interval_secs: 1,
            request_timeout_secs: 300,
            seed: None,
            weights: ScoreWeights::default(),
        }
    }
}

impl EvalConfig {
    /// Retry policy derived from the configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            interval: Duration::from_secs(self.retry_interval_secs),
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Result of one question.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionOutcome {
    /// The service answered.
    Answered {
        /// Duration of the successful request in seconds.
        request_secs: f64,
        /// Attempts used.
        attempts: u32,
    },
    /// Every attempt failed; the question and its references were dropped.
    Skipped {
        /// Final error.
        error: String,
    },
}

/// Progress event emitted after each question.
#[derive(Debug, Clone)]
pub struct QuestionEvent<'a> {
    /// 1-based position.
    pub index: usize,
    /// Number of questions in the run.
    pub total: usize,
    /// The question asked.
    pub question: &'a str,
    /// What happened.
    pub outcome: QuestionOutcome,
}

/// Summary of a scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Benchmark half that was run.
    pub language: Language,
    /// Questions answered and scored.
    pub evaluated: usize,
    /// Questions dropped after exhausting retries.
    pub skipped: usize,
    /// Metric results.
    pub card: ScoreCard,
}

impl Report {
    /// Callback payload for this report.
    #[must_use]
    pub fn notification(&self) -> Notification {
        Notification::from(&self.card)
    }
}

/// Runs the scoring job against an inference service.
pub struct Evaluator {
    config: EvalConfig,
    client: InferenceClient,
}

impl Evaluator {
    /// Creates an evaluator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EvalConfig) -> Result<Self> {
        config.weights.validate()?;
        let client = InferenceClient::new(
            config.inference_service.clone(),
            config.retry_policy(),
            config.request_timeout(),
        )?;
        Ok(Self { config, client })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Loads the datasets and selects this run's samples.
    ///
    /// # Errors
    ///
    /// Returns an error if a dataset file cannot be loaded.
    pub fn load_samples(&self) -> Result<Vec<Sample>> {
        let dataset = Dataset::load(&self.config.dataset_en, &self.config.dataset_zh)?;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let samples = dataset.select(self.config.language, self.config.sample_size, &mut rng);

        tracing::info!(
            language = %self.config.language,
            samples = samples.len(),
            "Samples selected"
        );
        Ok(samples)
    }

    /// Asks every question and scores the answers.
    ///
    /// A question whose retries are exhausted is dropped together with its
    /// references so the scored pairs stay aligned.
    pub async fn run<F>(&self, samples: &[Sample], mut on_event: F) -> Report
    where
        F: FnMut(&QuestionEvent<'_>),
    {
        let total = samples.len();
        let mut predictions = Vec::with_capacity(total);
        let mut references = Vec::with_capacity(total);
        let mut skipped = 0;

        tracing::info!(total, url = self.client.url(), "Starting evaluation");

        for (index, sample) in samples.iter().enumerate() {
            let index = index + 1;
            let outcome = match self.client.ask(&sample.question).await {
                Ok(answer) => {
                    tracing::info!(
                        "Question {index}/{total} | Request Time: {:.2} seconds",
                        answer.request_secs
                    );
                    predictions.push(answer.output);
                    references.push(sample.references.clone());
                    QuestionOutcome::Answered {
                        request_secs: answer.request_secs,
                        attempts: answer.attempts,
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        index,
                        question = %sample.question,
                        error = %e,
                        "Max retries reached, skipping question"
                    );
                    skipped += 1;
                    QuestionOutcome::Skipped {
                        error: e.to_string(),
                    }
                },
            };

            on_event(&QuestionEvent {
                index,
                total,
                question: &sample.question,
                outcome,
            });
        }

        if predictions.is_empty() {
            tracing::warn!(skipped, "No question was answered; reporting zero scores");
        }

        let card = ScoreCard::from_pairs(&predictions, &references, &self.config.weights);
        tracing::info!(
            score = card.composite.score,
            rouge = card.composite.rouge,
            bleu = card.composite.bleu,
            evaluated = predictions.len(),
            skipped,
            "Evaluation finished"
        );

        Report {
            language: self.config.language,
            evaluated: predictions.len(),
            skipped,
            card,
        }
    }

    /// Posts the report to the completion callback, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback request fails.
    pub async fn notify(&self, report: &Report) -> Result<Option<String>> {
        let Some(url) = self.config.notify_url.as_deref() else {
            tracing::info!("No completion callback configured, skipping notification");
            return Ok(None);
        };
        if url.trim().is_empty() {
            return Err(EvalError::invalid_config("notify_url is empty"));
        }

        notify::send(url, &report.notification(), self.config.request_timeout())
            .await
            .map(Some)
    }
}
