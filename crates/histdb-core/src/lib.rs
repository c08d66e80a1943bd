//! # histdb-core
//!
//! Foundation crate for the histdb temporal ingestion engine.
//! Defines the value model, table schemas, versioned rows, audit entries,
//! delta/partition policies, errors, config, and the transform registry.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod models;
pub mod time;
pub mod traits;
pub mod transform;

pub use config::HistConfig;
pub use errors::{HistError, HistResult};
pub use models::{Row, RowKey, Value};
