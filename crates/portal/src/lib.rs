//! Portal API Library
//!
//! Translates the portal's flattened filter/search/sort parameters into
//! Elasticsearch queries, drains large result sets, and renders CSV exports.
//! The main entry point for running the server is the `portal-api` binary.

pub mod aggregation;
pub mod config;
pub mod domain;
pub mod drain;
pub mod error;
pub mod export;
pub mod gateway;
pub mod query;
pub mod routes;
pub mod search;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
