//! # tunerx Server
//!
//! HTTP API server with OpenAI-compatible endpoints for a fine-tuned model,
//! plus the single-input `/inference` route consumed by the scoring job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod handlers;
pub mod openai;
pub mod server;

pub use engine::{InferenceEngine, RemoteEngine, RemoteEngineConfig};
pub use server::{AppState, Server, ServerConfig};
