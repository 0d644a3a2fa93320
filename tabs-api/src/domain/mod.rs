mod error;
pub mod enrichment;
pub mod models;
pub mod resilience;
pub mod search;

pub use error::ProviderError;
