//! Error handler pipeline and the deferred error pool.
//!
//! Every error of a response passes through the configured handlers in
//! order. A handler receives the error and a `next` continuation; it may
//! rewrite the error, swallow it by returning `None`, or pass it on. The
//! pipeline ends in the formatter, which masks internal messages unless the
//! configuration enables debug output.

use crate::error::{ErrorCategory, GraphQLError, SchemaError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Continuation passed to an [`ErrorHandler`].
pub type ErrorNext<'a> = &'a dyn Fn(GraphQLError) -> Option<GraphQLError>;

/// A step of the error pipeline.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: GraphQLError, next: ErrorNext<'_>) -> Option<GraphQLError>;
}

/// Adds `extensions.category`.
#[derive(Debug, Default)]
pub struct ExtensionsErrorHandler;

impl ErrorHandler for ExtensionsErrorHandler {
    fn handle(&self, mut error: GraphQLError, next: ErrorNext<'_>) -> Option<GraphQLError> {
        error.set_extension("category", Value::from(error.category.as_str()));
        next(error)
    }
}

/// Reports internal errors through `tracing`.
#[derive(Debug, Default)]
pub struct ReportingErrorHandler;

impl ErrorHandler for ReportingErrorHandler {
    fn handle(&self, error: GraphQLError, next: ErrorNext<'_>) -> Option<GraphQLError> {
        if error.category == ErrorCategory::Internal {
            tracing::error!(
                message = %error.message,
                path = ?error.path,
                "internal error during execution"
            );
        }
        next(error)
    }
}

/// Attaches structured validation detail as `extensions.validation`.
#[derive(Debug, Default)]
pub struct ValidationErrorHandler;

impl ErrorHandler for ValidationErrorHandler {
    fn handle(&self, mut error: GraphQLError, next: ErrorNext<'_>) -> Option<GraphQLError> {
        if let Some(violations) = error.validation.take() {
            let detail: serde_json::Map<String, Value> = violations
                .into_iter()
                .map(|(key, messages)| {
                    (key, Value::Array(messages.into_iter().map(Value::String).collect()))
                })
                .collect();
            error.set_extension("validation", Value::Object(detail));
        }
        next(error)
    }
}

/// Looks up a built-in handler by its configuration name.
pub fn builtin_handler(name: &str) -> Option<Arc<dyn ErrorHandler>> {
    match name {
        "extensions" => Some(Arc::new(ExtensionsErrorHandler)),
        "reporting" => Some(Arc::new(ReportingErrorHandler)),
        "validation" => Some(Arc::new(ValidationErrorHandler)),
        _ => None,
    }
}

/// The ordered handler chain plus the final formatter.
#[derive(Clone, Default)]
pub struct ErrorPipeline {
    handlers: Vec<Arc<dyn ErrorHandler>>,
    debug: bool,
}

impl ErrorPipeline {
    pub fn new(debug: bool) -> Self {
        Self {
            handlers: Vec::new(),
            debug,
        }
    }

    /// Builds the pipeline from handler names.
    pub fn from_names<S: AsRef<str>>(names: &[S], debug: bool) -> Result<Self, SchemaError> {
        let mut pipeline = Self::new(debug);
        for name in names {
            let handler = builtin_handler(name.as_ref()).ok_or_else(|| {
                SchemaError::InvalidConfiguration {
                    message: format!("unknown error handler `{}`", name.as_ref()),
                }
            })?;
            pipeline.handlers.push(handler);
        }
        Ok(pipeline)
    }

    /// Appends a handler.
    pub fn push(&mut self, handler: Arc<dyn ErrorHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs an error through the pipeline; `None` means it was swallowed.
    pub fn process(&self, error: GraphQLError) -> Option<GraphQLError> {
        self.run(0, error)
    }

    fn run(&self, index: usize, error: GraphQLError) -> Option<GraphQLError> {
        match self.handlers.get(index) {
            Some(handler) => handler.handle(error, &|error: GraphQLError| self.run(index + 1, error)),
            None => Some(self.format(error)),
        }
    }

    fn format(&self, mut error: GraphQLError) -> GraphQLError {
        if !self.debug && !error.category.is_client_safe() {
            error.message = "Internal server error".to_string();
        }
        error
    }
}

impl std::fmt::Debug for ErrorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPipeline")
            .field("handlers", &self.handlers.len())
            .field("debug", &self.debug)
            .finish()
    }
}

/// Request-scoped buffer of errors that did not abort their field.
#[derive(Debug, Clone, Default)]
pub struct ErrorPool {
    errors: Arc<Mutex<Vec<GraphQLError>>>,
}

impl ErrorPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, error: GraphQLError) {
        self.errors.lock().push(error);
    }

    /// Snapshot of the recorded errors.
    pub fn errors(&self) -> Vec<GraphQLError> {
        self.errors.lock().clone()
    }

    /// Removes and returns the recorded errors.
    pub fn take(&self) -> Vec<GraphQLError> {
        std::mem::take(&mut *self.errors.lock())
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolverError;
    use indexmap::IndexMap;
    use serde_json::json;

    struct Swallow;

    impl ErrorHandler for Swallow {
        fn handle(&self, error: GraphQLError, next: ErrorNext<'_>) -> Option<GraphQLError> {
            if error.message.contains("ignore") {
                None
            } else {
                next(error)
            }
        }
    }

    #[test]
    fn test_internal_messages_are_masked() {
        let pipeline = ErrorPipeline::from_names(&["extensions"], false).unwrap();
        let error = GraphQLError::from_resolver(&ResolverError::internal("db password wrong"), vec![]);
        let processed = pipeline.process(error).unwrap();
        assert_eq!(processed.message, "Internal server error");
        assert_eq!(processed.extensions.unwrap()["category"], json!("internal"));

        let debug = ErrorPipeline::from_names(&["extensions"], true).unwrap();
        let error = GraphQLError::from_resolver(&ResolverError::internal("db password wrong"), vec![]);
        assert_eq!(
            debug.process(error).unwrap().message,
            "Internal error: db password wrong"
        );
    }

    #[test]
    fn test_handlers_can_swallow() {
        let mut pipeline = ErrorPipeline::new(false);
        pipeline.push(Arc::new(Swallow));
        assert!(pipeline.process(GraphQLError::new("please ignore")).is_none());
        assert!(pipeline.process(GraphQLError::new("keep")).is_some());
    }

    #[test]
    fn test_validation_extension() {
        let pipeline = ErrorPipeline::from_names(&["validation"], false).unwrap();
        let mut violations = IndexMap::new();
        violations.insert("emails.1".to_string(), vec!["must be an email".to_string()]);
        let error = GraphQLError::from_resolver(
            &ResolverError::Validation {
                path: "createUsers".into(),
                violations,
            },
            vec![],
        );
        let processed = pipeline.process(error).unwrap();
        assert_eq!(
            processed.extensions.unwrap()["validation"],
            json!({"emails.1": ["must be an email"]})
        );
    }

    #[test]
    fn test_unknown_handler_name() {
        assert!(matches!(
            ErrorPipeline::from_names(&["telemetry"], false),
            Err(SchemaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_error_pool() {
        let pool = ErrorPool::new();
        pool.record(GraphQLError::new("a"));
        pool.record(GraphQLError::new("b"));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.take().len(), 2);
        assert!(pool.is_empty());
    }
}
