//! Benchmark questions and their reference answers.

use std::fmt;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// A benchmark question with one or more acceptable answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Question sent to the model.
    pub question: String,
    /// Reference answers.
    #[serde(with = "one_or_many")]
    pub references: Vec<String>,
}

mod one_or_many {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(value: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        })
    }
}

/// Which half of the benchmark to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// English questions only.
    En,
    /// Chinese questions only.
    #[default]
    Zh,
    /// A random sample of paired English and Chinese questions.
    All,
}

impl Language {
    /// Parses a language selector.
    ///
    /// Anything other than `en` or `all` selects the Chinese set.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Self::En,
            "all" => Self::All,
            _ => Self::Zh,
        }
    }

    /// Returns the selector string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
            Self::All => "all",
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bilingual benchmark.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// English samples.
    pub en: Vec<Sample>,
    /// Chinese samples, index-aligned with the English ones.
    pub zh: Vec<Sample>,
}

impl Dataset {
    /// Loads both halves of the benchmark.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or parsed.
    pub fn load(en_path: &Path, zh_path: &Path) -> Result<Self> {
        Ok(Self {
            en: load_samples(en_path)?,
            zh: load_samples(zh_path)?,
        })
    }

    /// Selects the samples to evaluate.
    ///
    /// `en` and `zh` take their whole list. `all` draws `sample_size`
    /// distinct indices and takes the English then the Chinese sample at each;
    /// the draw is clamped to the shorter list.
    pub fn select<R: Rng + ?Sized>(
        &self,
        language: Language,
        sample_size: usize,
        rng: &mut R,
    ) -> Vec<Sample> {
        match language {
            Language::En => self.en.clone(),
            Language::Zh => self.zh.clone(),
            Language::All => {
                let available = self.en.len().min(self.zh.len());
                let amount = sample_size.min(available);
                if amount < sample_size {
                    tracing::warn!(
                        requested = sample_size,
                        available,
                        "Sample size clamped to the shorter language list"
                    );
                }

                let indices = rand::seq::index::sample(rng, available, amount).into_vec();
                indices
                    .iter()
                    .map(|&i| self.en[i].clone())
                    .chain(indices.iter().map(|&i| self.zh[i].clone()))
                    .collect()
            },
        }
    }
}

/// Reads a JSON array of samples.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or holds a
/// sample without any reference.
pub fn load_samples(path: &Path) -> Result<Vec<Sample>> {
    let raw = std::fs::read_to_string(path).map_err(|e| EvalError::dataset(path, e.to_string()))?;
    let samples: Vec<Sample> =
        serde_json::from_str(&raw).map_err(|e| EvalError::dataset(path, e.to_string()))?;

    if let Some(pos) = samples.iter().position(|s| s.references.is_empty()) {
        return Err(EvalError::dataset(
            path,
            format!("sample {pos} has no references"),
        ));
    }

    tracing::debug!(path = %path.display(), samples = samples.len(), "Dataset loaded");
    Ok(samples)
}

/// A stored model answer with its references, for offline scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Model answer.
    pub prediction: String,
    /// Reference answers.
    #[serde(with = "one_or_many")]
    pub references: Vec<String>,
}

/// Reads a JSON array of predictions and splits it into aligned lists.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a prediction
/// has no reference.
pub fn load_predictions(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let raw = std::fs::read_to_string(path).map_err(|e| EvalError::dataset(path, e.to_string()))?;
    let records: Vec<Prediction> =
        serde_json::from_str(&raw).map_err(|e| EvalError::dataset(path, e.to_string()))?;

    if let Some(pos) = records.iter().position(|r| r.references.is_empty()) {
        return Err(EvalError::dataset(
            path,
            format!("prediction {pos} has no references"),
        ));
    }

    Ok(records
        .into_iter()
        .map(|r| (r.prediction, r.references))
        .unzip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn sample(q: &str) -> Sample {
        Sample {
            question: q.to_string(),
            references: vec![format!("answer to {q}")],
        }
    }

    fn dataset(en: usize, zh: usize) -> Dataset {
        Dataset {
            en: (0..en).map(|i| sample(&format!("en-{i}"))).collect(),
            zh: (0..zh).map(|i| sample(&format!("zh-{i}"))).collect(),
        }
    }

    #[test]
    fn test_references_string_or_list() {
        let samples: Vec<Sample> = serde_json::from_str(
            r#"[
                {"question": "q1", "references": "a1"},
                {"question": "q2", "references": ["a2", "b2"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(samples[0].references, vec!["a1".to_string()]);
        assert_eq!(samples[1].references.len(), 2);
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("en"), Language::En);
        assert_eq!(Language::parse("ALL"), Language::All);
        assert_eq!(Language::parse("zh"), Language::Zh);
        assert_eq!(Language::parse("fr"), Language::Zh);

        let lang: Language = serde_json::from_str(r#""en""#).unwrap();
        assert_eq!(lang, Language::En);
        assert_eq!(serde_json::to_string(&Language::All).unwrap(), r#""all""#);
    }

    #[test]
    fn test_select_single_language_takes_everything() {
        let data = dataset(5, 3);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(data.select(Language::En, 50, &mut rng).len(), 5);
        assert_eq!(data.select(Language::Zh, 50, &mut rng).len(), 3);
    }

    #[test]
    fn test_select_all_pairs_indices() {
        let data = dataset(100, 100);
        let mut rng = StdRng::seed_from_u64(42);
        let selected = data.select(Language::All, 50, &mut rng);

        assert_eq!(selected.len(), 100);
        let (en, zh) = selected.split_at(50);
        for (e, z) in en.iter().zip(zh) {
            assert!(e.question.starts_with("en-"));
            assert_eq!(e.question[3..], z.question[3..]);
        }

        let mut unique: Vec<_> = en.iter().map(|s| s.question.clone()).collect();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn test_select_all_clamps_to_shorter_list() {
        let data = dataset(30, 20);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(data.select(Language::All, 50, &mut rng).len(), 40);
    }

    #[test]
    fn test_load_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("en.json");
        std::fs::write(&path, r#"[{"question": "What is LoRA?", "references": "A low-rank adapter."}]"#)
            .unwrap();
        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.len(), 1);

        std::fs::write(&path, r#"[{"question": "q", "references": []}]"#).unwrap();
        assert!(matches!(load_samples(&path), Err(EvalError::Dataset { .. })));

        assert!(load_samples(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_predictions_aligns_lists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predictions.json");
        std::fs::write(
            &path,
            r#"[
                {"prediction": "p1", "references": "r1"},
                {"prediction": "p2", "references": ["r2", "r2b"]}
            ]"#,
        )
        .unwrap();

        let (predictions, references) = load_predictions(&path).unwrap();
        assert_eq!(predictions, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(references[1], vec!["r2".to_string(), "r2b".to_string()]);

        std::fs::write(&path, r#"[{"prediction": "p", "references": []}]"#).unwrap();
        assert!(load_predictions(&path).is_err());
    }
}
