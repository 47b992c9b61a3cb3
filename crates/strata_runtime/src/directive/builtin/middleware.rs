//! Field middleware directives.

use crate::directive::{DefinedDirective, Directive, DirectiveNode, FieldMiddleware};
use crate::error::{path_to_string, GraphQLError, ResolverError, SchemaError};
use crate::node::FieldValue;
use crate::resolver::{FieldResolverFn, ResolveParams, ResolvedValue};
use crate::schema::BuildContext;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Applies `transform` to every string nested in the arguments before
/// calling `next`.
fn map_string_arguments(next: FieldResolverFn, transform: fn(&str) -> Value) -> FieldResolverFn {
    fn walk(value: &mut Value, transform: fn(&str) -> Value) {
        match value {
            Value::String(s) => *value = transform(s),
            Value::Array(items) => items.iter_mut().for_each(|item| walk(item, transform)),
            Value::Object(fields) => fields.values_mut().for_each(|field| walk(field, transform)),
            _ => {}
        }
    }

    Arc::new(move |mut params: ResolveParams| {
        for value in params.args.all_mut().values_mut() {
            walk(value, transform);
        }
        next(params)
    })
}

// =============================================================================
// @trim
// =============================================================================

/// `@trim`: strips surrounding whitespace from every string argument.
pub struct TrimDirective {
    node: DirectiveNode,
}

impl DefinedDirective for TrimDirective {
    const DEFINITION: &'static str = r#"
"""
Remove whitespace from the beginning and end of every string argument.
"""
directive @trim on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        Ok(Self { node })
    }
}

impl Directive for TrimDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_middleware(&self) -> Option<&dyn FieldMiddleware> {
        Some(self)
    }
}

impl FieldMiddleware for TrimDirective {
    fn wrap(
        &self,
        _field: &FieldValue,
        next: FieldResolverFn,
        _cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        Ok(map_string_arguments(next, |s| Value::String(s.trim().to_string())))
    }
}

// =============================================================================
// @convertEmptyStringsToNull
// =============================================================================

/// `@convertEmptyStringsToNull`: replaces `""` arguments with `null`.
pub struct ConvertEmptyStringsToNullDirective {
    node: DirectiveNode,
}

impl DefinedDirective for ConvertEmptyStringsToNullDirective {
    const DEFINITION: &'static str = r#"
"""
Replace `""` with `null` in every string argument.
"""
directive @convertEmptyStringsToNull on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        Ok(Self { node })
    }
}

impl Directive for ConvertEmptyStringsToNullDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_middleware(&self) -> Option<&dyn FieldMiddleware> {
        Some(self)
    }
}

impl FieldMiddleware for ConvertEmptyStringsToNullDirective {
    fn wrap(
        &self,
        _field: &FieldValue,
        next: FieldResolverFn,
        _cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        Ok(map_string_arguments(next, |s| {
            if s.is_empty() {
                Value::Null
            } else {
                Value::String(s.to_string())
            }
        }))
    }
}

// =============================================================================
// @inject
// =============================================================================

#[derive(Debug, Deserialize)]
struct InjectArgs {
    context: String,
    name: String,
}

/// `@inject(context: "user.id", name: "user_id")`: copies a value of the
/// request context into the arguments.
pub struct InjectDirective {
    node: DirectiveNode,
    args: InjectArgs,
}

impl DefinedDirective for InjectDirective {
    const DEFINITION: &'static str = r#"
"""
Inject a value from the context object into the arguments.
"""
directive @inject(
  """
  A dotted path into the context data, e.g. `user.id`.
  """
  context: String!
  """
  The argument name the value is stored under.
  """
  name: String!
) repeatable on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for InjectDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_middleware(&self) -> Option<&dyn FieldMiddleware> {
        Some(self)
    }
}

impl FieldMiddleware for InjectDirective {
    fn wrap(
        &self,
        _field: &FieldValue,
        next: FieldResolverFn,
        _cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let source = self.args.context.clone();
        let target = self.args.name.clone();
        Ok(Arc::new(move |mut params: ResolveParams| {
            let value = params.context.lookup(&source).cloned().unwrap_or(Value::Null);
            params.args.set(target.clone(), value);
            next(params)
        }))
    }
}

// =============================================================================
// @validateEach
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Required,
    Email,
    Min(f64),
    Max(f64),
}

impl Rule {
    fn parse(rule: &str) -> Option<Self> {
        let (name, parameter) = match rule.split_once(':') {
            Some((name, parameter)) => (name.trim(), Some(parameter.trim())),
            None => (rule.trim(), None),
        };
        let bound = || parameter.and_then(|p| p.parse::<f64>().ok());
        match name {
            "required" => Some(Self::Required),
            "email" => Some(Self::Email),
            "min" => bound().map(Self::Min),
            "max" => bound().map(Self::Max),
            _ => None,
        }
    }

    /// The violation message for `value` under `attribute`, if any.
    fn check(&self, attribute: &str, value: &Value) -> Option<String> {
        let present = !matches!(value, Value::Null) && value.as_str() != Some("");
        match self {
            Self::Required if !present => Some(format!("The {attribute} field is required.")),
            Self::Required => None,
            // Other rules only apply to present values.
            _ if !present => None,
            Self::Email => {
                let valid = value.as_str().is_some_and(|s| {
                    s.split_once('@').is_some_and(|(local, domain)| {
                        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                    })
                });
                (!valid).then(|| format!("The {attribute} must be a valid email address."))
            }
            Self::Min(min) => match measure(value) {
                Some((size, unit)) if size < *min => Some(format!(
                    "The {attribute} must be at least {min}{unit}."
                )),
                _ => None,
            },
            Self::Max(max) => match measure(value) {
                Some((size, unit)) if size > *max => Some(format!(
                    "The {attribute} may not be greater than {max}{unit}."
                )),
                _ => None,
            },
        }
    }
}

/// Size of a value for `min`/`max`: numbers by value, strings by length,
/// lists by item count.
fn measure(value: &Value) -> Option<(f64, &'static str)> {
    match value {
        Value::Number(n) => n.as_f64().map(|n| (n, "")),
        Value::String(s) => Some((s.chars().count() as f64, " characters")),
        Value::Array(items) => Some((items.len() as f64, " items")),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ValidateEachArgs {
    argument: String,
    rules: Vec<String>,
}

/// `@validateEach(argument: "emails", rules: ["required", "email"])`.
///
/// Validates every element of a list argument and reports all violations
/// of the field as one validation error; the field then resolves to null
/// without running the rest of the chain.
pub struct ValidateEachDirective {
    node: DirectiveNode,
    argument: String,
    rules: Vec<Rule>,
}

impl ValidateEachDirective {
    fn violations(&self, value: Option<&Value>) -> IndexMap<String, Vec<String>> {
        let mut violations = IndexMap::new();
        let mut validate = |attribute: String, value: &Value| {
            let messages: Vec<String> = self
                .rules
                .iter()
                .filter_map(|rule| rule.check(&attribute, value))
                .collect();
            if !messages.is_empty() {
                violations.insert(attribute, messages);
            }
        };
        match value {
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    validate(format!("{}.{index}", self.argument), item);
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => validate(self.argument.clone(), other),
        }
        violations
    }
}

impl DefinedDirective for ValidateEachDirective {
    const DEFINITION: &'static str = r#"
"""
Validate every element of a list argument, reporting all violations at once.
"""
directive @validateEach(
  """
  The list argument to validate.
  """
  argument: String!
  """
  Rules applied to each element: `required`, `email`, `min:N`, `max:N`.
  """
  rules: [String!]!
) repeatable on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args: ValidateEachArgs = node.parse_args()?;
        let rules = args
            .rules
            .iter()
            .map(|rule| {
                Rule::parse(rule).ok_or_else(|| SchemaError::InvalidDirectiveArguments {
                    directive: node.name.clone(),
                    message: format!("unknown validation rule `{rule}`"),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            node,
            argument: args.argument,
            rules,
        })
    }
}

impl Directive for ValidateEachDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_middleware(&self) -> Option<&dyn FieldMiddleware> {
        Some(self)
    }
}

impl FieldMiddleware for ValidateEachDirective {
    fn wrap(
        &self,
        field: &FieldValue,
        next: FieldResolverFn,
        _cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        if !field.definition().arguments.iter().any(|arg| arg.name.value == self.argument) {
            return Err(SchemaError::InvalidDirectiveUsage {
                directive: self.node.name.clone(),
                node: field.node_name(),
                message: format!("the field has no argument `{}`", self.argument),
            });
        }

        let directive = Arc::new(Self {
            node: self.node.clone(),
            argument: self.argument.clone(),
            rules: self.rules.clone(),
        });
        Ok(Arc::new(move |params: ResolveParams| {
            let violations = directive.violations(params.args.get(&directive.argument));
            if violations.is_empty() {
                return next(params);
            }

            tracing::debug!(
                field = %params.info.field_name,
                violations = violations.len(),
                "argument validation failed"
            );
            let error = ResolverError::Validation {
                path: path_to_string(&params.info.path),
                violations,
            };
            params
                .context
                .errors()
                .record(GraphQLError::from_resolver(&error, params.info.path.clone()));
            Box::pin(async { Ok(ResolvedValue::Value(Value::Null)) })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate_each(rules: Value) -> ValidateEachDirective {
        ValidateEachDirective::from_node(
            DirectiveNode::new("validateEach")
                .with_argument("argument", json!("emails"))
                .with_argument("rules", rules),
        )
        .unwrap()
    }

    #[test]
    fn test_collects_every_violation() {
        let directive = validate_each(json!(["required", "email"]));
        let value = json!(["ada@example.com", "nope", "", "bob@example.org"]);
        let violations = directive.violations(Some(&value));
        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations["emails.1"],
            vec!["The emails.1 must be a valid email address."]
        );
        assert_eq!(violations["emails.2"], vec!["The emails.2 field is required."]);
    }

    #[test]
    fn test_min_max() {
        let directive = validate_each(json!(["min:3", "max:5"]));
        let value = json!(["ab", "abcd", "abcdef"]);
        let violations = directive.violations(Some(&value));
        assert_eq!(
            violations["emails.0"],
            vec!["The emails.0 must be at least 3 characters."]
        );
        assert_eq!(
            violations["emails.2"],
            vec!["The emails.2 may not be greater than 5 characters."]
        );
        assert!(!violations.contains_key("emails.1"));
    }

    #[test]
    fn test_unknown_rule() {
        let result = ValidateEachDirective::from_node(
            DirectiveNode::new("validateEach")
                .with_argument("argument", json!("emails"))
                .with_argument("rules", json!(["uuid"])),
        );
        assert!(matches!(
            result,
            Err(SchemaError::InvalidDirectiveArguments { .. })
        ));
    }
}
