//! Search repository implementations.

mod postgres;

pub use postgres::PgSearchRepository;
