pub mod fingerprint;
pub mod oracle;
pub mod passage;
pub mod tokenize;

pub use oracle::{DecompositionResult, EvaluationResult, QueryType};
pub use passage::ScoredPassage;
