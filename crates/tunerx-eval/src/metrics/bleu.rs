//! Corpus-level BLEU with brevity penalty.
//!
//! Up to 4-gram precision, no smoothing. N-gram counts are clipped against
//! the per-n-gram maximum over all references of a prediction; the effective
//! reference length is the shortest reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tokenize::bleu_tokens;

/// Highest n-gram order.
pub const MAX_ORDER: usize = 4;

/// Corpus BLEU and its components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BleuScore {
    /// Geometric mean of the precisions times the brevity penalty.
    pub bleu: f64,
    /// Modified precision per n-gram order.
    pub precisions: Vec<f64>,
    /// Penalty for predictions shorter than the references.
    pub brevity_penalty: f64,
    /// Prediction length over reference length.
    pub length_ratio: f64,
    /// Total prediction tokens.
    pub translation_length: usize,
    /// Total effective reference tokens.
    pub reference_length: usize,
}

fn ngram_counts(tokens: &[String], max_order: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    for order in 1..=max_order {
        for window in tokens.windows(order) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// Computes corpus BLEU.
///
/// Returns all zeros (with `MAX_ORDER` zero precisions) for an empty corpus.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute(predictions: &[String], references: &[Vec<String>]) -> BleuScore {
    let mut matches = [0usize; MAX_ORDER];
    let mut possible = [0usize; MAX_ORDER];
    let mut translation_length = 0;
    let mut reference_length = 0;

    for (prediction, refs) in predictions.iter().zip(references) {
        let pred = bleu_tokens(prediction);
        let ref_tokens: Vec<Vec<String>> = refs.iter().map(|r| bleu_tokens(r)).collect();

        translation_length += pred.len();
        reference_length += ref_tokens.iter().map(Vec::len).min().unwrap_or(0);

        let mut max_ref_counts: HashMap<&[String], usize> = HashMap::new();
        for tokens in &ref_tokens {
            for (gram, count) in ngram_counts(tokens, MAX_ORDER) {
                let slot = max_ref_counts.entry(gram).or_insert(0);
                *slot = (*slot).max(count);
            }
        }

        for (gram, count) in ngram_counts(&pred, MAX_ORDER) {
            let clipped = count.min(max_ref_counts.get(gram).copied().unwrap_or(0));
            matches[gram.len() - 1] += clipped;
        }

        for order in 1..=MAX_ORDER {
            if pred.len() >= order {
                possible[order - 1] += pred.len() - order + 1;
            }
        }
    }

    let precisions: Vec<f64> = matches
        .iter()
        .zip(&possible)
        .map(|(&m, &p)| if p > 0 { m as f64 / p as f64 } else { 0.0 })
        .collect();

    let geo_mean = if precisions.iter().all(|&p| p > 0.0) {
        (precisions.iter().map(|p| p.ln()).sum::<f64>() / MAX_ORDER as f64).exp()
    } else {
        0.0
    };

    let length_ratio = if reference_length > 0 {
        translation_length as f64 / reference_length as f64
    } else {
        0.0
    };

    let brevity_penalty = if length_ratio > 1.0 {
        1.0
    } else if length_ratio > 0.0 {
        (1.0 - 1.0 / length_ratio).exp()
    } else {
        0.0
    };

    BleuScore {
        bleu: geo_mean * brevity_penalty,
        precisions,
        brevity_penalty,
        length_ratio,
        translation_length,
        reference_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn corpus(pairs: &[(&str, &[&str])]) -> (Vec<String>, Vec<Vec<String>>) {
        let predictions = pairs.iter().map(|(p, _)| (*p).to_string()).collect();
        let references = pairs
            .iter()
            .map(|(_, refs)| refs.iter().map(|r| (*r).to_string()).collect())
            .collect();
        (predictions, references)
    }

    #[test]
    fn test_exact_match_is_one() {
        let (p, r) = corpus(&[("the quick brown fox jumps", &["the quick brown fox jumps"])]);
        let score = compute(&p, &r);
        assert!(close(score.bleu, 1.0));
        assert!(close(score.brevity_penalty, 1.0));
        assert_eq!(score.translation_length, 5);
        assert_eq!(score.reference_length, 5);
    }

    #[test]
    fn test_clipping_against_max_reference_count() {
        let (p, r) = corpus(&[("the the the the", &["the cat", "the the dog"])]);
        let score = compute(&p, &r);
        // unigram "the" clipped to 2 (max over references)
        assert!(close(score.precisions[0], 0.5));
        // bigram "the the" clipped to 1 of 3
        assert!(close(score.precisions[1], 1.0 / 3.0));
        // shortest reference has 2 tokens
        assert_eq!(score.reference_length, 2);
    }

    #[test]
    fn test_brevity_penalty_for_short_prediction() {
        let (p, r) = corpus(&[(
            "a b c d",
            &["a b c d e f g h"],
        )]);
        let score = compute(&p, &r);
        assert!(close(score.length_ratio, 0.5));
        assert!(close(score.brevity_penalty, (-1.0f64).exp()));
        assert!(close(score.bleu, (-1.0f64).exp()));
    }

    #[test]
    fn test_zero_without_four_gram_match() {
        let (p, r) = corpus(&[("a b c", &["a b c"])]);
        let score = compute(&p, &r);
        assert_eq!(score.bleu, 0.0);
        assert_eq!(score.precisions[3], 0.0);
    }

    #[test]
    fn test_empty_corpus() {
        let score = compute(&[], &[]);
        assert_eq!(score.bleu, 0.0);
        assert_eq!(score.precisions, vec![0.0; MAX_ORDER]);
        assert_eq!(score.translation_length, 0);
    }
}
