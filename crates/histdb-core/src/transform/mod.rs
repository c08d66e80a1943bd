//! Row transforms applied between fetch and partitioning.
//!
//! The registry is an explicit value built once at startup and handed to the
//! coordinator; there is no process-wide registry.

pub mod builtins;
mod registry;

use serde::{Deserialize, Serialize};

use crate::errors::HistResult;
use crate::models::Row;

pub use registry::{TransformFactory, TransformRegistry};

/// A configured transform: registry name plus positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl TransformSpec {
    pub fn new(name: &str, args: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// A batch-level row rewrite.
pub trait RowTransform: Send + Sync {
    /// Columns the transform reads; checked against the batch before `apply`.
    fn dependencies(&self) -> Vec<String>;
    fn apply(&self, rows: Vec<Row>) -> HistResult<Vec<Row>>;
}
