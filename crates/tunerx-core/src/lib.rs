//! # tunerx Core
//!
//! Core types shared by the tunerx serving and scoring components.
//!
//! This crate provides:
//! - The common error type
//! - Conversation messages, roles and token usage
//! - Generation request/response structures and sampling parameters
//! - The Llama-2 chat prompt template
//! - Metadata for the LoRA adapter stacked on the base model

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
pub mod error;
pub mod request;
pub mod response;
pub mod sampling;
pub mod template;
pub mod types;

pub use adapter::{AdapterConfig, ServedModel};
pub use error::{Error, Result};
pub use request::{GenerateRequest, PromptInput};
pub use response::{Choice, GenerateResponse};
pub use sampling::SamplingParams;
pub use types::*;
