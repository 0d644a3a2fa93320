//! HTTP clients for the page side of tab enrichment: fetching a page and
//! reducing it to a title plus readable text, and asking a screenshot service
//! to render it.

mod client;
mod error;
mod extract;
mod screenshot;

pub use client::*;
pub use error::FetchError;
pub use extract::{extract_text, extract_title, truncate_chars};
pub use screenshot::*;
