//! Introspection.
//!
//! The introspection types are ordinary schema types appended to the
//! document as a prelude. Their values are JSON objects; `__Type` values
//! only carry a name (or a wrapper kind and `ofType`), and the `__Type`
//! fields look the named type up in the registry when they are resolved.

use crate::error::ResolverError;
use crate::registry::{TypeRegistry, WeakRegistry};
use crate::resolver::{FieldResolverFn, ResolveParams, ResolvedValue, ResolverArgs};
use crate::types::{ExecutableField, ExecutableType, InputValue, TypeHandle};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;
use strata_syntax as ast;

/// Introspection types and the directives every schema supports.
pub const PRELUDE: &str = r#"
type __Schema {
  description: String
  types: [__Type!]!
  queryType: __Type!
  mutationType: __Type
  subscriptionType: __Type
  directives: [__Directive!]!
}

type __Type {
  kind: __TypeKind!
  name: String
  description: String
  specifiedByURL: String
  fields(includeDeprecated: Boolean = false): [__Field!]
  interfaces: [__Type!]
  possibleTypes: [__Type!]
  enumValues(includeDeprecated: Boolean = false): [__EnumValue!]
  inputFields(includeDeprecated: Boolean = false): [__InputValue!]
  ofType: __Type
}

enum __TypeKind {
  SCALAR
  OBJECT
  INTERFACE
  UNION
  ENUM
  INPUT_OBJECT
  LIST
  NON_NULL
}

type __Field {
  name: String!
  description: String
  args(includeDeprecated: Boolean = false): [__InputValue!]!
  type: __Type!
  isDeprecated: Boolean!
  deprecationReason: String
}

type __InputValue {
  name: String!
  description: String
  type: __Type!
  defaultValue: String
  isDeprecated: Boolean!
  deprecationReason: String
}

type __EnumValue {
  name: String!
  description: String
  isDeprecated: Boolean!
  deprecationReason: String
}

type __Directive {
  name: String!
  description: String
  isRepeatable: Boolean!
  locations: [__DirectiveLocation!]!
  args(includeDeprecated: Boolean = false): [__InputValue!]!
}

enum __DirectiveLocation {
  QUERY
  MUTATION
  SUBSCRIPTION
  FIELD
  FRAGMENT_DEFINITION
  FRAGMENT_SPREAD
  INLINE_FRAGMENT
  VARIABLE_DEFINITION
  SCHEMA
  SCALAR
  OBJECT
  FIELD_DEFINITION
  ARGUMENT_DEFINITION
  INTERFACE
  UNION
  ENUM
  ENUM_VALUE
  INPUT_OBJECT
  INPUT_FIELD_DEFINITION
}

"Directs the executor to include this field or fragment only when the `if` argument is true."
directive @include(
  "Included when true."
  if: Boolean!
) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT

"Directs the executor to skip this field or fragment when the `if` argument is true."
directive @skip(
  "Skipped when true."
  if: Boolean!
) on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT

"Marks an element of a GraphQL schema as no longer supported."
directive @deprecated(
  "Explains why this element was deprecated."
  reason: String = "No longer supported"
) on FIELD_DEFINITION | ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION | ENUM_VALUE

"Exposes a URL that specifies the behavior of this scalar."
directive @specifiedBy(
  "The URL that specifies the behavior of this scalar."
  url: String!
) on SCALAR
"#;

// =============================================================================
// Values
// =============================================================================

/// The `__Type` value of a type reference.
pub fn type_ref(ty: &TypeHandle) -> Value {
    match ty {
        TypeHandle::Named(name) => json!({ "name": name }),
        TypeHandle::List(inner) => json!({ "kind": "LIST", "ofType": type_ref(inner) }),
        TypeHandle::NonNull(inner) => json!({ "kind": "NON_NULL", "ofType": type_ref(inner) }),
    }
}

fn ast_type_ref(ty: &ast::Type) -> Value {
    match ty {
        ast::Type::Named(name) => json!({ "name": name.value }),
        ast::Type::List(inner, _) => json!({ "kind": "LIST", "ofType": ast_type_ref(inner) }),
        ast::Type::NonNull(inner, _) => json!({ "kind": "NON_NULL", "ofType": ast_type_ref(inner) }),
    }
}

/// Renders a JSON value as a GraphQL literal.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(name, value)| format!("{name}: {}", literal(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}

fn input_value(value: &InputValue) -> Value {
    json!({
        "name": value.name,
        "description": value.description,
        "type": type_ref(&value.ty),
        "defaultValue": value.default_value.as_ref().map(literal),
        "isDeprecated": false,
        "deprecationReason": null,
    })
}

fn field(field: &ExecutableField) -> Value {
    json!({
        "name": field.name,
        "description": field.description,
        "args": field.arguments.values().map(input_value).collect::<Vec<_>>(),
        "type": type_ref(&field.ty),
        "isDeprecated": field.deprecation_reason.is_some(),
        "deprecationReason": field.deprecation_reason,
    })
}

fn directive(definition: &ast::DirectiveDefinition) -> Value {
    let args: Vec<Value> = definition
        .arguments
        .iter()
        .map(|argument| {
            json!({
                "name": argument.name.value,
                "description": argument.description,
                "type": ast_type_ref(&argument.ty),
                "defaultValue": argument.default_value.as_ref().map(ToString::to_string),
                "isDeprecated": false,
                "deprecationReason": null,
            })
        })
        .collect();
    json!({
        "name": definition.name.value,
        "description": definition.description,
        "isRepeatable": definition.repeatable,
        "locations": definition
            .locations
            .iter()
            .map(|location| location.as_str())
            .collect::<Vec<_>>(),
        "args": args,
    })
}

fn named(name: &str) -> Value {
    json!({ "name": name })
}

// =============================================================================
// Resolvers
// =============================================================================

fn resolver<F>(registry: WeakRegistry, resolve: F) -> FieldResolverFn
where
    F: Fn(&TypeRegistry, &Value, &ResolverArgs) -> Result<Value, ResolverError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(move |params: ResolveParams| {
        let result = registry
            .upgrade()
            .map_err(ResolverError::from)
            .and_then(|registry| resolve(&registry, &params.parent, &params.args))
            .map(ResolvedValue::Value);
        Box::pin(async move { result })
    })
}

/// The named type behind a `__Type` value; `None` for list and non-null
/// wrappers.
fn named_type(
    registry: &TypeRegistry,
    value: &Value,
) -> Result<Option<Arc<ExecutableType>>, ResolverError> {
    if value.get("kind").is_some() {
        return Ok(None);
    }
    match value.get("name").and_then(Value::as_str) {
        Some(name) => Ok(Some(registry.get(name)?)),
        None => Ok(None),
    }
}

fn include_deprecated(args: &ResolverArgs) -> bool {
    args.get("includeDeprecated")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resolver of a field of `__Schema` or `__Type`; `None` for fields the
/// default resolver reads from the value.
pub(crate) fn field_resolver(
    parent: &str,
    field_name: &str,
    registry: &TypeRegistry,
) -> Option<FieldResolverFn> {
    let weak = registry.downgrade();
    let resolver = match (parent, field_name) {
        ("__Schema", "types") => resolver(weak, |registry, _, _| {
            Ok(Value::Array(
                registry.possible_types()?.keys().map(|name| named(name)).collect(),
            ))
        }),
        ("__Schema", "queryType") => resolver(weak, |registry, _, _| {
            Ok(named(&registry.context().roots.query))
        }),
        ("__Schema", "mutationType") => resolver(weak, |registry, _, _| {
            Ok(root_type(registry, registry.context().roots.mutation.as_deref()))
        }),
        ("__Schema", "subscriptionType") => resolver(weak, |registry, _, _| {
            Ok(root_type(registry, registry.context().roots.subscription.as_deref()))
        }),
        ("__Schema", "directives") => resolver(weak, |registry, _, _| {
            Ok(Value::Array(
                registry
                    .context()
                    .document
                    .directive_definitions()
                    .map(directive)
                    .collect(),
            ))
        }),
        ("__Type", "kind") => resolver(weak, |registry, value, _| {
            if let Some(kind) = value.get("kind") {
                return Ok(kind.clone());
            }
            Ok(named_type(registry, value)?
                .map_or(Value::Null, |ty| Value::from(ty.kind().as_str())))
        }),
        ("__Type", "description") => resolver(weak, |registry, value, _| {
            Ok(named_type(registry, value)?
                .and_then(|ty| ty.description().map(Value::from))
                .unwrap_or(Value::Null))
        }),
        ("__Type", "fields") => resolver(weak, |registry, value, args| {
            let Some(ty) = named_type(registry, value)? else {
                return Ok(Value::Null);
            };
            let Some(fields) = ty.fields()? else {
                return Ok(Value::Null);
            };
            let all = include_deprecated(args);
            let mut values = Vec::with_capacity(fields.len());
            for thunk in fields.values() {
                let built = thunk.get()?;
                if all || built.deprecation_reason.is_none() {
                    values.push(field(built));
                }
            }
            Ok(Value::Array(values))
        }),
        ("__Type", "interfaces") => resolver(weak, |registry, value, _| {
            Ok(match named_type(registry, value)?.as_deref() {
                Some(ty @ (ExecutableType::Object(_) | ExecutableType::Interface(_))) => {
                    Value::Array(ty.interfaces().iter().map(|name| named(name)).collect())
                }
                _ => Value::Null,
            })
        }),
        ("__Type", "possibleTypes") => resolver(weak, |registry, value, _| {
            let Some(ty) = named_type(registry, value)?.filter(|ty| ty.is_abstract()) else {
                return Ok(Value::Null);
            };
            Ok(Value::Array(
                registry
                    .members(&ty)?
                    .iter()
                    .map(|member| named(member.name()))
                    .collect(),
            ))
        }),
        ("__Type", "enumValues") => resolver(weak, |registry, value, args| {
            let ty = named_type(registry, value)?;
            let Some(ExecutableType::Enum(enum_type)) = ty.as_deref() else {
                return Ok(Value::Null);
            };
            let all = include_deprecated(args);
            Ok(Value::Array(
                enum_type
                    .values
                    .values()
                    .filter(|value| all || value.deprecation_reason.is_none())
                    .map(|value| {
                        json!({
                            "name": value.name,
                            "description": value.description,
                            "isDeprecated": value.deprecation_reason.is_some(),
                            "deprecationReason": value.deprecation_reason,
                        })
                    })
                    .collect(),
            ))
        }),
        ("__Type", "inputFields") => resolver(weak, |registry, value, _| {
            Ok(match named_type(registry, value)?.as_deref() {
                Some(ExecutableType::InputObject(input)) => {
                    Value::Array(input.fields.values().map(input_value).collect())
                }
                _ => Value::Null,
            })
        }),
        _ => return None,
    };
    Some(resolver)
}

fn root_type(registry: &TypeRegistry, name: Option<&str>) -> Value {
    name.filter(|name| registry.has_type(name))
        .map_or(Value::Null, named)
}

/// The `__schema` meta field of the query root.
pub(crate) fn schema_field() -> ExecutableField {
    ExecutableField {
        name: "__schema".to_string(),
        description: Some("Access the current type schema of this server.".to_string()),
        ty: TypeHandle::non_null(TypeHandle::named("__Schema")),
        arguments: IndexMap::new(),
        resolver: Arc::new(|_params: ResolveParams| {
            Box::pin(async { Ok(ResolvedValue::Value(json!({}))) })
        }),
        deprecation_reason: None,
    }
}

/// The `__type(name:)` meta field of the query root.
pub(crate) fn type_field(registry: &TypeRegistry) -> ExecutableField {
    let mut arguments = IndexMap::new();
    arguments.insert(
        "name".to_string(),
        InputValue {
            name: "name".to_string(),
            description: None,
            ty: TypeHandle::non_null(TypeHandle::named("String")),
            default_value: None,
        },
    );
    ExecutableField {
        name: "__type".to_string(),
        description: Some("Request the type information of a single type.".to_string()),
        ty: TypeHandle::named("__Type"),
        arguments,
        resolver: resolver(registry.downgrade(), |registry, _, args| {
            let name: String = args.require("name")?;
            Ok(if registry.search(&name)?.is_some() {
                named(&name)
            } else {
                Value::Null
            })
        }),
        deprecation_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_parses() {
        let parsed = strata_syntax::parse(PRELUDE);
        assert!(!parsed.diagnostics.has_errors());
        assert_eq!(parsed.document.type_definitions().count(), 8);
        assert_eq!(parsed.document.directive_definitions().count(), 4);
    }

    #[test]
    fn test_type_ref() {
        let handle = TypeHandle::non_null(TypeHandle::list(TypeHandle::named("User")));
        assert_eq!(
            type_ref(&handle),
            json!({"kind": "NON_NULL", "ofType": {"kind": "LIST", "ofType": {"name": "User"}}})
        );
    }

    #[test]
    fn test_literal() {
        assert_eq!(literal(&json!("a\"b")), "\"a\\\"b\"");
        assert_eq!(literal(&json!({"first": 10, "tags": ["x"]})), "{first: 10, tags: [\"x\"]}");
        assert_eq!(literal(&json!(null)), "null");
    }
}
