/// Keyword classification of observed writes
pub mod classifier;

pub use classifier::KeywordClassifier;
