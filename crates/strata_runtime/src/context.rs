//! Request context handed to every resolver.

use crate::batch::BatchLoaderRegistry;
use crate::config::StrataConfig;
use crate::error_handler::ErrorPool;
use crate::store::{DataStore, MemoryStore, ModelCatalog};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Long-lived collaborators shared by every request of a schema.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn DataStore>,
    pub catalog: Arc<ModelCatalog>,
    pub config: Arc<StrataConfig>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            catalog: Arc::new(ModelCatalog::new()),
            config: Arc::new(StrataConfig::default()),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Execution context.
///
/// Cloning is cheap; clones share the batch loader registry and error pool
/// of the request they were created for.
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: Arc<HashMap<String, Value>>,
    variables: Arc<Map<String, Value>>,
    services: Arc<Services>,
    loaders: BatchLoaderRegistry,
    errors: ErrorPool,
}

impl Context {
    /// Creates a context for one request.
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            data: Arc::default(),
            variables: Arc::default(),
            services,
            loaders: BatchLoaderRegistry::new(),
            errors: ErrorPool::new(),
        }
    }

    /// Replaces the request-scoped data.
    pub fn with_data(mut self, data: HashMap<String, Value>) -> Self {
        self.data = Arc::new(data);
        self
    }

    /// Replaces the coerced variables.
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Arc::new(variables);
        self
    }

    /// Sets a value in the context.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            Arc::make_mut(&mut self.data).insert(key.into(), v);
        }
    }

    /// Gets a value from the context.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Looks up request data by a dotted path such as `user.id`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.data.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Gets a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn store(&self) -> Arc<dyn DataStore> {
        Arc::clone(&self.services.store)
    }

    pub fn catalog(&self) -> Arc<ModelCatalog> {
        Arc::clone(&self.services.catalog)
    }

    pub fn config(&self) -> &StrataConfig {
        &self.services.config
    }

    /// Batch loaders of the current request.
    pub fn loaders(&self) -> &BatchLoaderRegistry {
        &self.loaders
    }

    /// Deferred errors of the current request.
    pub fn errors(&self) -> &ErrorPool {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_data() {
        let mut ctx = Context::default();
        ctx.set("user", json!({"id": 7, "roles": ["admin"]}));

        assert_eq!(ctx.lookup("user.id"), Some(&json!(7)));
        assert_eq!(ctx.lookup("user.roles.0"), Some(&json!("admin")));
        assert_eq!(ctx.lookup("user.missing"), None);
        assert_eq!(ctx.get::<serde_json::Value>("user").map(|u| u["id"].clone()), Some(json!(7)));
    }

    #[test]
    fn test_clones_share_request_state() {
        let ctx = Context::default();
        let clone = ctx.clone();
        clone
            .errors()
            .record(crate::error::GraphQLError::new("deferred"));
        assert_eq!(ctx.errors().len(), 1);
    }
}
