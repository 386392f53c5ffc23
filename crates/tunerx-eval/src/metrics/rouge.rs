//! ROUGE-1/2/L/Lsum F-measures.
//!
//! Each prediction is scored against every reference and keeps the best
//! F-measure per variant; the corpus score is the mean over predictions.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::tokenize::{rouge_tokens, sentences};

/// Mean ROUGE F-measures over a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeScores {
    /// Unigram overlap.
    pub rouge1: f64,
    /// Bigram overlap.
    pub rouge2: f64,
    /// Longest common subsequence over the whole text.
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    /// Summary-level LCS over newline-separated sentences.
    #[serde(rename = "rougeLsum")]
    pub rouge_lsum: f64,
}

impl RougeScores {
    fn max(self, other: Self) -> Self {
        Self {
            rouge1: self.rouge1.max(other.rouge1),
            rouge2: self.rouge2.max(other.rouge2),
            rouge_l: self.rouge_l.max(other.rouge_l),
            rouge_lsum: self.rouge_lsum.max(other.rouge_lsum),
        }
    }
}

/// Scores predictions against their references.
///
/// Returns all zeros for an empty corpus.
#[must_use]
pub fn compute(predictions: &[String], references: &[Vec<String>]) -> RougeScores {
    let pairs = predictions.len().min(references.len());
    if pairs == 0 {
        return RougeScores::default();
    }

    let mut total = RougeScores::default();
    for (prediction, refs) in predictions.iter().zip(references) {
        let best = refs
            .iter()
            .map(|reference| score_pair(prediction, reference))
            .fold(RougeScores::default(), RougeScores::max);
        total.rouge1 += best.rouge1;
        total.rouge2 += best.rouge2;
        total.rouge_l += best.rouge_l;
        total.rouge_lsum += best.rouge_lsum;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = pairs as f64;
    RougeScores {
        rouge1: total.rouge1 / n,
        rouge2: total.rouge2 / n,
        rouge_l: total.rouge_l / n,
        rouge_lsum: total.rouge_lsum / n,
    }
}

/// Scores one prediction against one reference.
#[must_use]
pub fn score_pair(prediction: &str, reference: &str) -> RougeScores {
    let pred = rouge_tokens(prediction);
    let refr = rouge_tokens(reference);

    RougeScores {
        rouge1: rouge_n(&pred, &refr, 1),
        rouge2: rouge_n(&pred, &refr, 2),
        rouge_l: rouge_l(&pred, &refr),
        rouge_lsum: rouge_lsum(&sentences(prediction), &sentences(reference)),
    }
}

fn ngrams(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

#[allow(clippy::cast_precision_loss)]
fn fmeasure(hits: usize, pred_total: usize, ref_total: usize) -> f64 {
    if hits == 0 || pred_total == 0 || ref_total == 0 {
        return 0.0;
    }
    let precision = hits as f64 / pred_total as f64;
    let recall = hits as f64 / ref_total as f64;
    2.0 * precision * recall / (precision + recall)
}

fn rouge_n(pred: &[String], refr: &[String], n: usize) -> f64 {
    let pred_counts = ngrams(pred, n);
    let ref_counts = ngrams(refr, n);

    let hits = pred_counts
        .iter()
        .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    fmeasure(
        hits,
        pred_counts.values().sum(),
        ref_counts.values().sum(),
    )
}

fn lcs_table(a: &[String], b: &[String]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table
}

fn rouge_l(pred: &[String], refr: &[String]) -> f64 {
    let lcs = lcs_table(refr, pred)[refr.len()][pred.len()];
    fmeasure(lcs, pred.len(), refr.len())
}

/// Indices into `refr` of one longest common subsequence with `cand`.
fn lcs_indices(refr: &[String], cand: &[String]) -> Vec<usize> {
    let table = lcs_table(refr, cand);
    let (mut i, mut j) = (refr.len(), cand.len());
    let mut indices = Vec::new();
    while i > 0 && j > 0 {
        if refr[i - 1] == cand[j - 1] {
            indices.push(i - 1);
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] > table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    indices.reverse();
    indices
}

fn rouge_lsum(pred_sents: &[Vec<String>], ref_sents: &[Vec<String>]) -> f64 {
    let pred_total: usize = pred_sents.iter().map(Vec::len).sum();
    let ref_total: usize = ref_sents.iter().map(Vec::len).sum();
    if pred_total == 0 || ref_total == 0 {
        return 0.0;
    }

    let mut pred_budget: HashMap<&str, usize> = HashMap::new();
    for token in pred_sents.iter().flatten() {
        *pred_budget.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut ref_budget: HashMap<&str, usize> = HashMap::new();
    for token in ref_sents.iter().flatten() {
        *ref_budget.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut hits = 0;
    for refr in ref_sents {
        let union: BTreeSet<usize> = pred_sents
            .iter()
            .flat_map(|cand| lcs_indices(refr, cand))
            .collect();

        for token in union.into_iter().map(|i| refr[i].as_str()) {
            let in_pred = pred_budget.get_mut(token);
            let in_ref = ref_budget.get_mut(token);
            if let (Some(p), Some(r)) = (in_pred, in_ref) {
                if *p > 0 && *r > 0 {
                    *p -= 1;
                    *r -= 1;
                    hits += 1;
                }
            }
        }
    }

    fmeasure(hits, pred_total, ref_total)
}
