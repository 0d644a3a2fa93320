pub(crate) mod batch;
pub(crate) mod error;
pub(crate) mod search;

pub(crate) use error::ApiError;
