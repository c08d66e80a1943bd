use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{HistError, HistResult};
use crate::models::Row;

use super::builtins;
use super::{RowTransform, TransformSpec};

/// Builds a transform from its configured arguments.
pub type TransformFactory =
    Arc<dyn Fn(&[serde_json::Value]) -> HistResult<Box<dyn RowTransform>> + Send + Sync>;

/// Named transform factories.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    factories: BTreeMap<String, TransformFactory>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `null_if_gte`, `combine_columns`, `apply_type_casts`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            builtins::NULL_IF_GTE.to_string(),
            Arc::new(builtins::NullIfGte::from_args),
        );
        registry.factories.insert(
            builtins::COMBINE_COLUMNS.to_string(),
            Arc::new(builtins::CombineColumns::from_args),
        );
        registry.factories.insert(
            builtins::APPLY_TYPE_CASTS.to_string(),
            Arc::new(builtins::ApplyTypeCasts::from_args),
        );
        registry
    }

    /// Register a factory under a new name. Names are never silently replaced.
    pub fn register(&mut self, name: &str, factory: TransformFactory) -> HistResult<()> {
        if self.factories.contains_key(name) {
            return Err(HistError::ConfigError(format!(
                "a transform named '{name}' is already registered"
            )));
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn build(&self, spec: &TransformSpec) -> HistResult<Box<dyn RowTransform>> {
        let factory = self.factories.get(&spec.name).ok_or_else(|| {
            HistError::ValidationFailure(format!("no transform registered as '{}'", spec.name))
        })?;
        factory(&spec.args)
    }

    /// Apply `specs` in order.
    pub fn apply_all(&self, specs: &[TransformSpec], mut rows: Vec<Row>) -> HistResult<Vec<Row>> {
        for spec in specs {
            let transform = self.build(spec)?;
            if !rows.is_empty() {
                for dep in transform.dependencies() {
                    if !rows.iter().any(|r| r.contains_key(&dep)) {
                        return Err(HistError::ValidationFailure(format!(
                            "transform '{}' depends on missing column '{dep}'",
                            spec.name
                        )));
                    }
                }
            }
            info!(transform = %spec.name, rows = rows.len(), "applying transform");
            rows = transform.apply(rows)?;
            debug!(transform = %spec.name, rows = rows.len(), "transform applied");
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.names())
            .finish()
    }
}
