//! Error types.
//!
//! [`SchemaError`] covers configuration errors raised while building the
//! schema; [`ResolverError`] covers failures of a single field at query time.
//! Both end up as [`GraphQLError`] entries in the response.

use crate::store::StoreError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_core::{Location, Span};

/// Configuration error raised during schema construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error, miette::Diagnostic)]
pub enum SchemaError {
    #[error("Syntax Error: {message}")]
    #[diagnostic(code(strata::parse))]
    Parse {
        message: String,
        #[label("here")]
        span: Span,
    },

    #[error("Type {name} not found.")]
    #[diagnostic(
        code(strata::unknown_type),
        help("Check the spelling of the type name or define it in the schema.")
    )]
    UnknownType { name: String },

    #[error("Tried to register a type named {name}, but a type with that name already exists.")]
    #[diagnostic(code(strata::duplicate_type))]
    DuplicateType { name: String },

    #[error("No directive found for `{name}`: no `{class}` in the namespaces [{namespaces}].")]
    #[diagnostic(
        code(strata::unknown_directive),
        help("Register an implementation in one of the directive namespaces.")
    )]
    UnknownDirective {
        name: String,
        class: String,
        namespaces: String,
    },

    #[error("Node {node} can only have one directive of type {capability} but found [{directives}].")]
    #[diagnostic(code(strata::multiple_exclusive_directives))]
    MultipleExclusiveDirectives {
        node: String,
        capability: String,
        directives: String,
    },

    #[error("Could not locate a resolver for the field {type_name}.{field}.")]
    #[diagnostic(code(strata::missing_resolver))]
    MissingResolver {
        type_name: String,
        field: String,
        #[help]
        help: String,
    },

    #[error("Failed to find a scalar implementation `{class}` for the scalar {name} in the namespaces [{namespaces}].")]
    #[diagnostic(
        code(strata::unresolvable_scalar),
        help("Use @scalar(class: \"...\") to point at the implementation.")
    )]
    UnresolvableScalar {
        name: String,
        class: String,
        namespaces: String,
    },

    #[error("Value of abstract type {abstract_type} matches multiple possible types: [{candidates}].")]
    #[diagnostic(code(strata::ambiguous_abstract_type))]
    AmbiguousAbstractType {
        abstract_type: String,
        candidates: String,
    },

    #[error("Invalid arguments for @{directive}: {message}")]
    #[diagnostic(code(strata::invalid_directive_arguments))]
    InvalidDirectiveArguments { directive: String, message: String },

    #[error("Invalid use of @{directive} on {node}: {message}")]
    #[diagnostic(code(strata::invalid_directive_usage))]
    InvalidDirectiveUsage {
        directive: String,
        node: String,
        message: String,
    },

    #[error("Cannot extend {name}: {message}")]
    #[diagnostic(code(strata::invalid_extension))]
    InvalidExtension { name: String, message: String },

    #[error("Model {name} is not registered in the model catalog.")]
    #[diagnostic(code(strata::unknown_model))]
    UnknownModel { name: String },

    #[error("Model {model} has no relation named {relation}.")]
    #[diagnostic(code(strata::unknown_relation))]
    UnknownRelation { model: String, relation: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(strata::invalid_configuration))]
    InvalidConfiguration { message: String },

    #[error("Internal schema error: {0}")]
    #[diagnostic(code(strata::internal))]
    Internal(String),
}

impl SchemaError {
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Failure of a single field resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolverError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Failed to parse argument '{0}': {1}")]
    ArgumentParseError(String, String),

    #[error("Cannot return null for non-nullable field {0}.")]
    NullValue(String),

    /// Error whose message is safe to show to clients.
    #[error("{0}")]
    Custom(String),

    #[error("Validation failed for the field [{path}].")]
    Validation {
        path: String,
        violations: IndexMap<String, Vec<String>>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ResolverError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The category reported in `extensions.category`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Internal(_) | Self::Store(_) | Self::Schema(_) => ErrorCategory::Internal,
            Self::Validation { .. } => ErrorCategory::Validation,
            _ => ErrorCategory::Graphql,
        }
    }
}

/// Coarse classification of an error, used by the error handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Client errors: bad query, bad arguments.
    #[default]
    Graphql,
    /// Input validation failures.
    Validation,
    /// Server-side failures whose message must not leak to clients.
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Graphql => "graphql",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub const fn is_client_safe(self) -> bool {
        !matches!(self, Self::Internal)
    }
}

/// A response path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Renders a path as `users.0.posts`.
#[must_use]
pub fn path_to_string(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// An entry of the `errors` list of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<IndexMap<String, Value>>,
    #[serde(skip)]
    pub category: ErrorCategory,
    /// Structured validation detail, attached by the validation handler.
    #[serde(skip)]
    pub validation: Option<IndexMap<String, Vec<String>>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
            category: ErrorCategory::Graphql,
            validation: None,
        }
    }

    /// Converts a resolver failure at `path`.
    #[must_use]
    pub fn from_resolver(error: &ResolverError, path: Vec<PathSegment>) -> Self {
        let mut converted = Self::new(error.to_string()).with_path(path);
        converted.category = error.category();
        if let ResolverError::Validation { violations, .. } = error {
            converted.validation = Some(violations.clone());
        }
        converted
    }

    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.get_or_insert_with(Vec::new).push(location);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn set_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
    }
}

impl From<SchemaError> for GraphQLError {
    fn from(error: SchemaError) -> Self {
        Self::new(error.to_string()).with_category(ErrorCategory::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_serialization() {
        let error = GraphQLError::new("boom")
            .with_path(vec![
                PathSegment::Field("users".into()),
                PathSegment::Index(0),
                PathSegment::Field("posts".into()),
            ])
            .with_location(Location { line: 1, column: 3 })
            .with_extension("code", Value::from("E"));
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "message": "boom",
                "locations": [{"line": 1, "column": 3}],
                "path": ["users", 0, "posts"],
                "extensions": {"code": "E"}
            })
        );
    }

    #[test]
    fn test_resolver_error_categories() {
        assert_eq!(
            ResolverError::custom("nope").category(),
            ErrorCategory::Graphql
        );
        assert_eq!(
            ResolverError::internal("db down").category(),
            ErrorCategory::Internal
        );
        let error = ResolverError::Validation {
            path: "ids".into(),
            violations: IndexMap::new(),
        };
        let converted = GraphQLError::from_resolver(&error, vec![]);
        assert_eq!(converted.category, ErrorCategory::Validation);
        assert!(converted.validation.is_some());
    }

    #[test]
    fn test_schema_error_messages() {
        let error = SchemaError::MultipleExclusiveDirectives {
            node: "Query.users".into(),
            capability: "FieldResolver".into(),
            directives: "@all, @field".into(),
        };
        assert_eq!(
            error.to_string(),
            "Node Query.users can only have one directive of type FieldResolver but found [@all, @field]."
        );
    }

    #[test]
    fn test_path_to_string() {
        let path = vec![PathSegment::Field("users".into()), PathSegment::Index(1)];
        assert_eq!(path_to_string(&path), "users.1");
    }
}
