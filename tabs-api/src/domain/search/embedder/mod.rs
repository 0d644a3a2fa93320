//! Embedding generation implementations.

mod gemini;
#[cfg(test)]
mod mock;

pub use gemini::{GeminiEmbedder, GEMINI_MODEL};
#[cfg(test)]
pub use mock::MockEmbedder;
