//! # tunerx Eval
//!
//! Offline scoring of a served fine-tuned model.
//!
//! The job sends benchmark questions to the model's `/inference` route,
//! scores the answers against reference answers with ROUGE and BLEU, folds
//! them into a weighted composite score, and posts the result to a
//! completion callback.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod runner;
pub mod score;

pub use client::{Answer, InferenceClient, RetryPolicy};
pub use dataset::{Dataset, Language, Prediction, Sample};
pub use error::{EvalError, Result};
pub use notify::Notification;
pub use runner::{EvalConfig, Evaluator, QuestionEvent, QuestionOutcome, Report};
pub use score::{CompositeScore, ScoreCard, ScoreWeights};
