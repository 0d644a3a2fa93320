mod memory_repo;
mod repo_error;
mod tab_repo;

pub use memory_repo::*;
pub use repo_error::RepositoryError;
pub use tab_repo::*;
