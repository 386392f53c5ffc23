//! Sampling parameters forwarded to the completion runtime.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Most stop sequences a single request may carry.
pub const MAX_STOP_SEQUENCES: usize = 4;

/// Generation settings of the fine-tuned model.
///
/// The defaults are the low-temperature, narrow-nucleus settings the model was
/// evaluated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Temperature (0.0 = greedy).
    pub temperature: f32,
    /// Nucleus sampling threshold, in (0.0, 1.0].
    pub top_p: f32,
    /// Presence penalty (-2.0 to 2.0).
    pub presence_penalty: f32,
    /// Frequency penalty (-2.0 to 2.0).
    pub frequency_penalty: f32,
    /// Stop sequences that halt generation.
    pub stop_sequences: Vec<String>,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Seed for reproducible sampling.
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.1,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            stop_sequences: Vec::new(),
            max_tokens: 1024,
            seed: None,
        }
    }
}

impl SamplingParams {
    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the top-p value.
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Sets the maximum tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Adds a stop sequence.
    #[must_use]
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequences.push(stop.into());
        self
    }

    /// Sets the presence penalty.
    #[must_use]
    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = penalty;
        self
    }

    /// Sets the frequency penalty.
    #[must_use]
    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks every parameter against the range the runtime accepts.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first offending parameter and its value.
    pub fn validate(&self) -> Result<(), String> {
        let ranged: [(&str, f32, RangeInclusive<f32>); 3] = [
            ("temperature", self.temperature, 0.0..=2.0),
            ("presence_penalty", self.presence_penalty, -2.0..=2.0),
            ("frequency_penalty", self.frequency_penalty, -2.0..=2.0),
        ];
        for (name, value, range) in ranged {
            if !range.contains(&value) {
                return Err(format!(
                    "{name} must be between {:.1} and {:.1}, got {value}",
                    range.start(),
                    range.end()
                ));
            }
        }

        // Zero would leave the runtime an empty nucleus.
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(format!("top_p must be in (0.0, 1.0], got {}", self.top_p));
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }
        if self.stop_sequences.len() > MAX_STOP_SEQUENCES {
            return Err(format!(
                "at most {MAX_STOP_SEQUENCES} stop sequences are allowed, got {}",
                self.stop_sequences.len()
            ));
        }
        Ok(())
    }
}
