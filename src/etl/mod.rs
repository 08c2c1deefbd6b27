//! Rental ETL module - extract raw collections, normalize them into eight
//! relational tables, and load the tables into PostgreSQL

pub mod calendar;
pub mod config;
pub mod error;
pub mod fetch;
pub mod listings;
pub mod parse;
pub mod report;
pub mod reviews;
pub mod schema;
pub mod transform;
pub mod types;
pub mod utils;
pub mod write;

pub use error::{EtlError, EtlResult};
pub use types::*;
