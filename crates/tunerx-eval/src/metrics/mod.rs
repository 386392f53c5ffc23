//! Overlap metrics between model answers and reference answers.

pub mod bleu;
pub mod rouge;
pub mod tokenize;

pub use bleu::BleuScore;
pub use rouge::RougeScores;
