//! The execution entry point.
//!
//! [`GraphQL`] takes a request through parsing, operation selection,
//! validation and execution, then passes every error through the error
//! pipeline. Listeners observe each execution and may contribute
//! response extensions.

use crate::context::Context;
use crate::error::{GraphQLError, SchemaError};
use crate::error_handler::{ErrorHandler, ErrorPipeline};
use crate::executor::{select_operation, Executor};
use crate::schema::Schema;
use crate::validation::validate;
use crate::values::coerce_variables;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use strata_core::LineIndex;
use strata_syntax as ast;

/// A GraphQL request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub query: String,
    #[serde(default, rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// The response of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Absent when execution did not start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ExecutionResult {
    fn failed(errors: Vec<GraphQLError>) -> Self {
        Self {
            data: None,
            errors,
            extensions: Map::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Observes executions.
pub trait ExecutionListener: Send + Sync {
    fn start_execution(&self, _request: &Request) {}

    fn end_execution(&self, _request: &Request, _result: &ExecutionResult) {}

    /// An entry for the `extensions` map of the response.
    fn extension(&self) -> Option<(String, Value)> {
        None
    }
}

/// Executes requests against a [`Schema`].
#[derive(Clone)]
pub struct GraphQL {
    schema: Schema,
    pipeline: ErrorPipeline,
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

impl GraphQL {
    /// Creates the executor with the error handlers named in the schema's
    /// configuration.
    pub fn new(schema: Schema) -> Result<Self, SchemaError> {
        let config = schema.config();
        let pipeline = ErrorPipeline::from_names(&config.error_handlers, config.debug)?;
        Ok(Self {
            schema,
            pipeline,
            listeners: Vec::new(),
        })
    }

    /// Appends a custom error handler after the configured ones.
    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.pipeline.push(handler);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Executes a request with a fresh context.
    pub async fn execute(&self, request: Request) -> ExecutionResult {
        self.execute_with_context(request, self.schema.context()).await
    }

    /// Executes a request with `context`.
    ///
    /// Batch loaders and deferred errors of the context are cleared when
    /// the request completes.
    pub async fn execute_with_context(&self, request: Request, context: Context) -> ExecutionResult {
        for listener in &self.listeners {
            listener.start_execution(&request);
        }

        let mut result = self.run(&request, context.clone()).await;
        context.loaders().clear();
        context.errors().clear();

        result.errors = result
            .errors
            .into_iter()
            .filter_map(|error| self.pipeline.process(error))
            .collect();
        for listener in &self.listeners {
            if let Some((key, value)) = listener.extension() {
                result.extensions.insert(key, value);
            }
        }
        for listener in &self.listeners {
            listener.end_execution(&request, &result);
        }
        result
    }

    /// Executes several requests in order, sharing one context.
    pub async fn execute_batch(&self, requests: Vec<Request>) -> Vec<ExecutionResult> {
        let context = self.schema.context();
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute_with_context(request, context.clone()).await);
        }
        results
    }

    async fn run(&self, request: &Request, context: Context) -> ExecutionResult {
        let lines = LineIndex::new(&request.query);
        let parsed = ast::parse(&request.query);
        if let Some(diagnostic) = parsed.diagnostics.first_error() {
            tracing::debug!(message = %diagnostic.message, "query failed to parse");
            let error = GraphQLError::new(format!("Syntax Error: {}", diagnostic.message))
                .with_location(diagnostic.location(&lines));
            return ExecutionResult::failed(vec![error]);
        }
        let document = parsed.document;

        let operation = match select_operation(&document, request.operation_name.as_deref()) {
            Ok(operation) => operation,
            Err(error) => return ExecutionResult::failed(vec![error]),
        };

        let registry = self.schema.registry();
        let errors = validate(registry, &document, operation, &request.variables, &lines);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "query failed validation");
            return ExecutionResult::failed(errors);
        }

        let variables = match coerce_variables(&operation.variables, &request.variables, registry) {
            Ok(variables) => variables,
            Err(error) => {
                return ExecutionResult::failed(vec![GraphQLError::from_resolver(&error, Vec::new())]);
            }
        };

        let name = operation.name.as_ref().map(|name| name.as_str());
        tracing::debug!(operation = ?name, kind = ?operation.operation, "executing operation");
        let context = context.with_variables(variables);
        let executor = Executor::new(registry, &document, &request.query, context.clone());
        let (data, mut errors) = executor.execute(operation).await;
        errors.extend(context.errors().take());

        ExecutionResult {
            data,
            errors,
            extensions: Map::new(),
        }
    }
}

impl std::fmt::Debug for GraphQL {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQL")
            .field("schema", &self.schema)
            .field("error_handlers", &self.pipeline.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserialization() {
        let request: Request = serde_json::from_value(json!({
            "query": "query Q { a }",
            "operationName": "Q",
        }))
        .unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert!(request.variables.is_empty());
    }

    #[test]
    fn test_result_serialization_skips_empty_entries() {
        let result = ExecutionResult {
            data: Some(json!({"a": 1})),
            ..ExecutionResult::default()
        };
        assert_eq!(result.to_json(), json!({"data": {"a": 1}}));
        assert_eq!(
            ExecutionResult::failed(vec![GraphQLError::new("boom")]).to_json(),
            json!({"errors": [{"message": "boom"}]})
        );
    }
}
