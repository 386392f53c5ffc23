//! Weighted composite of ROUGE and BLEU.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::metrics::{bleu, rouge, BleuScore, RougeScores};

/// Weights of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of ROUGE-1 within the ROUGE score.
    pub rouge1: f64,
    /// Weight of ROUGE-2 within the ROUGE score.
    pub rouge2: f64,
    /// Weight of ROUGE-L within the ROUGE score.
    pub rouge_l: f64,
    /// Weight of ROUGE-Lsum within the ROUGE score.
    pub rouge_lsum: f64,
    /// Weight of the ROUGE score within the final score.
    pub rouge: f64,
    /// Weight of the BLEU score within the final score.
    pub bleu: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rouge1: 0.35,
            rouge2: 0.4,
            rouge_l: 0.15,
            rouge_lsum: 0.1,
            rouge: 0.75,
            bleu: 0.25,
        }
    }
}

impl ScoreWeights {
    /// Checks that no weight is negative or non-finite.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfig`] naming the offending weight.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("rouge1", self.rouge1),
            ("rouge2", self.rouge2),
            ("rouge_l", self.rouge_l),
            ("rouge_lsum", self.rouge_lsum),
            ("rouge", self.rouge),
            ("bleu", self.bleu),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(EvalError::invalid_config(format!(
                    "weight {name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Composite score on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Weighted ROUGE, scaled by 100.
    pub rouge: f64,
    /// BLEU, scaled by 100.
    pub bleu: f64,
    /// Final score, rounded to two decimals.
    pub score: f64,
}

impl CompositeScore {
    /// Combines metric results with the given weights.
    #[must_use]
    pub fn compute(rouge: &RougeScores, bleu: &BleuScore, weights: &ScoreWeights) -> Self {
        let rouge_score = 100.0
            * (weights.rouge1 * rouge.rouge1
                + weights.rouge2 * rouge.rouge2
                + weights.rouge_l * rouge.rouge_l
                + weights.rouge_lsum * rouge.rouge_lsum);
        let bleu_score = 100.0 * bleu.bleu;
        let score = round2(weights.rouge * rouge_score + weights.bleu * bleu_score);

        Self {
            rouge: rouge_score,
            bleu: bleu_score,
            score,
        }
    }
}

/// Rounds to two decimals on the exact binary value, ties to even.
///
/// `2.675` is stored just below the tie and rounds to `2.67`.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// Formats a float the way the score callback expects.
///
/// Shortest round-trip digits, `1.0` rather than `1`, and exponent form
/// (`5e-05`, `1e+16`) outside `[1e-4, 1e16)`.
#[must_use]
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs();
    if value != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
            },
            None => formatted,
        };
    }

    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Metric results for one evaluated corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// ROUGE F-measures.
    pub rouge: RougeScores,
    /// BLEU and its components.
    pub bleu: BleuScore,
    /// Weighted composite.
    pub composite: CompositeScore,
}

impl ScoreCard {
    /// Scores aligned predictions and references.
    #[must_use]
    pub fn from_pairs(
        predictions: &[String],
        references: &[Vec<String>],
        weights: &ScoreWeights,
    ) -> Self {
        tracing::info!(pairs = predictions.len(), "Computing ROUGE metrics");
        let rouge = rouge::compute(predictions, references);
        tracing::info!(?rouge, "ROUGE metrics finished");

        tracing::info!(pairs = predictions.len(), "Computing BLEU metrics");
        let bleu = bleu::compute(predictions, references);
        tracing::info!(bleu = bleu.bleu, precisions = ?bleu.precisions, "BLEU metrics finished");

        let composite = CompositeScore::compute(&rouge, &bleu, weights);
        Self {
            rouge,
            bleu,
            composite,
        }
    }

    /// The final score as reported to the callback.
    #[must_use]
    pub fn score_string(&self) -> String {
        format_float(self.composite.score)
    }

    /// Every ROUGE and BLEU field rendered as a string.
    #[must_use]
    pub fn details(&self) -> BTreeMap<String, String> {
        let precisions = self
            .bleu
            .precisions
            .iter()
            .map(|p| format_float(*p))
            .collect::<Vec<_>>()
            .join(", ");

        [
            ("rouge1", format_float(self.rouge.rouge1)),
            ("rouge2", format_float(self.rouge.rouge2)),
            ("rougeL", format_float(self.rouge.rouge_l)),
            ("rougeLsum", format_float(self.rouge.rouge_lsum)),
            ("bleu", format_float(self.bleu.bleu)),
            ("precisions", format!("[{precisions}]")),
            ("brevity_penalty", format_float(self.bleu.brevity_penalty)),
            ("length_ratio", format_float(self.bleu.length_ratio)),
            ("translation_length", self.bleu.translation_length.to_string()),
            ("reference_length", self.bleu.reference_length.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_composite_weights() {
        let rouge = RougeScores {
            rouge1: 0.6,
            rouge2: 0.25,
            rouge_l: 0.4,
            rouge_lsum: 0.4,
        };
        let bleu = BleuScore {
            bleu: 0.2,
            ..BleuScore::default()
        };
        let composite = CompositeScore::compute(&rouge, &bleu, &ScoreWeights::default());

        // 100 * (0.21 + 0.1 + 0.06 + 0.04)
        assert!((composite.rouge - 41.0).abs() < 1e-9);
        assert!((composite.bleu - 20.0).abs() < 1e-9);
        // 0.75 * 41 + 0.25 * 20
        assert!((composite.score - 35.75).abs() < 1e-9);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(45.67), "45.67");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(0.0001), "0.0001");
    }

    #[test]
    fn test_format_float_exponent_form() {
        assert_eq!(format_float(0.00005), "5e-05");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(-2.5e-5), "-2.5e-05");
    }

    #[test]
    fn test_round2_uses_exact_value() {
        assert_eq!(round2(2.675), 2.67);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(35.755_000_1), 35.76);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn test_empty_card_reports_zero() {
        let card = ScoreCard::from_pairs(&[], &[], &ScoreWeights::default());
        assert_eq!(card.score_string(), "0.0");

        let details = card.details();
        assert_eq!(details.len(), 10);
        assert_eq!(details["rouge1"], "0.0");
        assert_eq!(details["precisions"], "[0.0, 0.0, 0.0, 0.0]");
        assert_eq!(details["translation_length"], "0");
    }

    #[test]
    fn test_perfect_card() {
        let predictions = vec!["the model answers exactly as expected".to_string()];
        let references = vec![vec!["the model answers exactly as expected".to_string()]];
        let card = ScoreCard::from_pairs(&predictions, &references, &ScoreWeights::default());
        assert_eq!(card.score_string(), "100.0");
        assert_eq!(card.details()["bleu"], "1.0");
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoreWeights::default().validate().is_ok());
        let bad = ScoreWeights {
            bleu: -0.1,
            ..ScoreWeights::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_weights_partial_override() {
        let weights: ScoreWeights = serde_json::from_str(r#"{"bleu": 0.5}"#).unwrap();
        assert!((weights.bleu - 0.5).abs() < f64::EPSILON);
        assert!((weights.rouge2 - 0.4).abs() < f64::EPSILON);
    }
}
