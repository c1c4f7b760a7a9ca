//! AI integration: model client, verdict cache, classifier.

pub mod cache;
pub mod classifier;
pub mod gemini;

pub use cache::VerdictCache;
pub use classifier::Classifier;
pub use gemini::{GeminiClient, LlmError, TextModel};
