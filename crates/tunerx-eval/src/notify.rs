//! Completion callback carrying the final score.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::score::ScoreCard;

/// Payload posted to the completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Final score as a string.
    pub score: String,
    /// Metric families that went into the score.
    pub metrics: Vec<String>,
    /// Every metric field as a string.
    pub details: BTreeMap<String, String>,
}

impl From<&ScoreCard> for Notification {
    fn from(card: &ScoreCard) -> Self {
        Self {
            score: card.score_string(),
            metrics: vec!["ROUGE".to_string(), "BLEU".to_string()],
            details: card.details(),
        }
    }
}

/// Posts the notification and returns the callback's response body.
///
/// # Errors
///
/// Returns an error if the request fails or the callback answers with a
/// non-success status.
pub async fn send(url: &str, notification: &Notification, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    tracing::info!(url, score = %notification.score, "Sending completion notification");
    let response = client.post(url).json(notification).send().await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(EvalError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    tracing::info!(status = status.as_u16(), body = %body, "Notification acknowledged");
    Ok(body)
}
