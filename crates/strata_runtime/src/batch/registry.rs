use crate::error::{PathSegment, ResolverError};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type AnyLoader = Arc<dyn Any + Send + Sync>;

/// Batch loader instances of one request, keyed by normalized field path.
///
/// The orchestrator clears the registry after every operation so cached
/// results never outlive the request that produced them.
#[derive(Clone, Default)]
pub struct BatchLoaderRegistry {
    loaders: Arc<Mutex<HashMap<String, AnyLoader>>>,
}

impl BatchLoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the loader registered under `key`, creating it on first use.
    pub fn instance<L, F>(&self, key: impl Into<String>, create: F) -> Result<Arc<L>, ResolverError>
    where
        L: Any + Send + Sync,
        F: FnOnce() -> L,
    {
        let key = key.into();
        let mut loaders = self.loaders.lock();
        let loader = loaders.entry(key.clone()).or_insert_with(|| {
            tracing::trace!(key = %key, "creating batch loader");
            Arc::new(create()) as AnyLoader
        });
        Arc::clone(loader).downcast::<L>().map_err(|_| {
            ResolverError::internal(format!(
                "batch loader `{key}` was registered with a different type"
            ))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.loaders.lock().contains_key(key)
    }

    /// Drops the loader registered under `key`.
    pub fn forget(&self, key: &str) {
        self.loaders.lock().remove(key);
    }

    /// Drops every loader.
    pub fn clear(&self) {
        self.loaders.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.loaders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.lock().is_empty()
    }
}

impl std::fmt::Debug for BatchLoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoaderRegistry")
            .field("loaders", &self.len())
            .finish()
    }
}

/// Joins the field names of a path, dropping list indices:
/// `users.0.posts` and `users.1.posts` both become `users.posts`.
pub fn normalize_path(path: &[PathSegment]) -> String {
    path.iter()
        .filter_map(|segment| match segment {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Index(_) => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let path = vec![
            PathSegment::Field("users".into()),
            PathSegment::Index(3),
            PathSegment::Field("posts".into()),
        ];
        assert_eq!(normalize_path(&path), "users.posts");
    }

    #[test]
    fn test_instance_is_shared_per_key() {
        let registry = BatchLoaderRegistry::new();
        let a = registry.instance("users.posts", || 1_u32).unwrap();
        let b = registry.instance("users.posts", || 2_u32).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 1);

        assert!(registry.instance::<String, _>("users.posts", String::new).is_err());

        registry.clear();
        assert!(registry.is_empty());
        let c = registry.instance("users.posts", || 3_u32).unwrap();
        assert_eq!(*c, 3);
    }
}
