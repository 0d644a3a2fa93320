//! Concrete providers for the enrichment ports.

mod gemini;
#[cfg(test)]
mod mock;
mod page;

pub use gemini::{GeminiAssistant, GEMINI_CHAT_MODEL};
#[cfg(test)]
pub use mock::{MockAssistant, MockContentExtractor, MockScreenshotProvider};
