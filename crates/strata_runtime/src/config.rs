//! Runtime configuration.
//!
//! Loading the configuration from files or the environment is left to the
//! host; every section deserializes with defaults so partial documents work.

use serde::{Deserialize, Serialize};
use strata_syntax::OperationType;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Namespaces searched for classes, in priority order.
    pub namespaces: Namespaces,

    /// Pagination defaults and limits.
    pub pagination: PaginationConfig,

    /// Query validation limits.
    pub security: SecurityConfig,

    /// Expose internal error messages to clients.
    pub debug: bool,

    /// Built-in error handlers, in pipeline order.
    pub error_handlers: Vec<String>,

    /// Directives applied to every field, before per-field middleware.
    pub global_field_middleware: Vec<String>,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            namespaces: Namespaces::default(),
            pagination: PaginationConfig::default(),
            security: SecurityConfig::default(),
            debug: false,
            error_handlers: vec![
                "extensions".to_string(),
                "reporting".to_string(),
                "validation".to_string(),
            ],
            global_field_middleware: Vec::new(),
        }
    }
}

impl StrataConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables debug error messages.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the maximum query depth.
    pub fn with_max_query_depth(mut self, depth: usize) -> Self {
        self.security.max_query_depth = Some(depth);
        self
    }

    /// Sets the maximum query complexity.
    pub fn with_max_query_complexity(mut self, complexity: usize) -> Self {
        self.security.max_query_complexity = Some(complexity);
        self
    }

    /// Disables `__schema` and `__type`.
    pub fn disable_introspection(mut self) -> Self {
        self.security.disable_introspection = true;
        self
    }

    /// Sets the default page size for paginated relations.
    pub fn with_default_count(mut self, count: u64) -> Self {
        self.pagination.default_count = Some(count);
        self
    }

    /// Sets the maximum page size for paginated relations.
    pub fn with_max_count(mut self, count: u64) -> Self {
        self.pagination.max_count = Some(count);
        self
    }

    /// Replaces the error handler pipeline.
    pub fn with_error_handlers<I, S>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error_handlers = handlers.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a directive applied to every field.
    pub fn with_global_field_middleware(mut self, directive: impl Into<String>) -> Self {
        self.global_field_middleware.push(directive.into());
        self
    }
}

/// Namespaces searched for user classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespaces {
    pub models: Vec<String>,
    pub queries: Vec<String>,
    pub mutations: Vec<String>,
    pub subscriptions: Vec<String>,
    pub interfaces: Vec<String>,
    pub unions: Vec<String>,
    pub scalars: Vec<String>,
    pub directives: Vec<String>,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            models: vec!["App.Models".to_string()],
            queries: vec!["App.GraphQL.Queries".to_string()],
            mutations: vec!["App.GraphQL.Mutations".to_string()],
            subscriptions: vec!["App.GraphQL.Subscriptions".to_string()],
            interfaces: vec!["App.GraphQL.Interfaces".to_string()],
            unions: vec!["App.GraphQL.Unions".to_string()],
            scalars: vec!["App.GraphQL.Scalars".to_string()],
            directives: vec!["App.GraphQL.Directives".to_string()],
        }
    }
}

impl Namespaces {
    /// Resolver namespaces for a root operation type.
    pub fn for_operation(&self, operation: OperationType) -> &[String] {
        match operation {
            OperationType::Query => &self.queries,
            OperationType::Mutation => &self.mutations,
            OperationType::Subscription => &self.subscriptions,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when a paginated field does not set one.
    pub default_count: Option<u64>,
    /// Largest page size a client may request.
    pub max_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub max_query_depth: Option<usize>,
    pub max_query_complexity: Option<usize>,
    pub disable_introspection: bool,
}
