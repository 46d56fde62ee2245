//! Data ingestion module - functional pipeline from election table to geocoded CSV

pub mod enrich;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod parse;
pub mod types;
pub mod utils;
pub mod write;

#[cfg(test)]
pub(crate) mod test_server;

pub use error::{IngestionError, Result};
pub use types::*;
