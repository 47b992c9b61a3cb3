//! Literal conversion and input coercion.

use crate::ast_convert::convert_type;
use crate::error::ResolverError;
use crate::registry::TypeRegistry;
use crate::resolver::ResolverArgs;
use crate::types::{ExecutableType, InputObjectType, InputValue, TypeHandle};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use strata_syntax as ast;

/// Converts a constant literal. Variables become `null`.
pub fn const_to_json(value: &ast::Value) -> Value {
    value_to_json(value, &Map::new())
}

/// Converts a literal, substituting variables. Unknown variables become
/// `null`.
pub fn value_to_json(value: &ast::Value, variables: &Map<String, Value>) -> Value {
    match value {
        ast::Value::Variable(name) => variables.get(&name.value).cloned().unwrap_or(Value::Null),
        ast::Value::Int(i) => Value::from(*i),
        ast::Value::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        ast::Value::String(s) | ast::Value::Enum(s) => Value::String(s.clone()),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::Null => Value::Null,
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| value_to_json(item, variables))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.value.clone(), value_to_json(value, variables)))
                .collect(),
        ),
    }
}

/// Coerces an input value against an input type: scalars are parsed, enum
/// names are mapped to their internal values, input objects get their
/// defaults and single values given for a list type are wrapped.
pub fn coerce_input(
    value: &Value,
    ty: &TypeHandle,
    registry: &TypeRegistry,
    path: &str,
) -> Result<Value, ResolverError> {
    match ty {
        TypeHandle::NonNull(inner) => {
            if value.is_null() {
                return Err(ResolverError::custom(format!(
                    "Expected non-nullable type {ty} not to be null at {path}."
                )));
            }
            coerce_input(value, inner, registry, path)
        }
        TypeHandle::List(inner) => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| coerce_input(item, inner, registry, &format!("{path}.{index}")))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_input(single, inner, registry, path)?])),
        },
        TypeHandle::Named(name) => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            let named = registry.get(name)?;
            match named.as_ref() {
                ExecutableType::Scalar(scalar) => scalar.implementation.parse_value(value),
                ExecutableType::Enum(enum_type) => value
                    .as_str()
                    .and_then(|name| enum_type.parse(name))
                    .cloned()
                    .ok_or_else(|| {
                        ResolverError::custom(format!(
                            "Value {value} does not exist in \"{name}\" enum."
                        ))
                    }),
                ExecutableType::InputObject(input) => coerce_object(value, input, registry, path),
                other => Err(ResolverError::custom(format!(
                    "Type {} is not an input type.",
                    other.name()
                ))),
            }
        }
    }
}

fn coerce_object(
    value: &Value,
    input: &InputObjectType,
    registry: &TypeRegistry,
    path: &str,
) -> Result<Value, ResolverError> {
    let Value::Object(provided) = value else {
        return Err(ResolverError::custom(format!(
            "Expected type {} to be an object at {path}.",
            input.name
        )));
    };
    if let Some(unknown) = provided.keys().find(|key| !input.fields.contains_key(*key)) {
        return Err(ResolverError::custom(format!(
            "Field \"{unknown}\" is not defined by type {}.",
            input.name
        )));
    }

    let mut coerced = Map::new();
    for (name, field) in &input.fields {
        let field_path = format!("{path}.{name}");
        match provided.get(name).or(field.default_value.as_ref()) {
            Some(value) => {
                coerced.insert(name.clone(), coerce_input(value, &field.ty, registry, &field_path)?);
            }
            None if field.ty.is_non_null() => {
                return Err(ResolverError::custom(format!(
                    "Field {}.{name} of required type {} was not provided.",
                    input.name, field.ty
                )));
            }
            None => {}
        }
    }
    Ok(Value::Object(coerced))
}

/// Coerces the arguments of a field selection.
///
/// An argument bound to a variable that was not provided counts as absent,
/// so the argument default applies.
pub fn coerce_arguments(
    definitions: &IndexMap<String, InputValue>,
    arguments: &[ast::Argument],
    variables: &Map<String, Value>,
    registry: &TypeRegistry,
) -> Result<ResolverArgs, ResolverError> {
    let mut args = ResolverArgs::new();
    for (name, definition) in definitions {
        let provided = arguments
            .iter()
            .find(|argument| argument.name.value == *name)
            .and_then(|argument| match &argument.value {
                ast::Value::Variable(variable) => variables.get(&variable.value).cloned(),
                literal => Some(value_to_json(literal, variables)),
            });
        let value = match (provided, &definition.default_value) {
            (Some(value), _) => value,
            (None, Some(default)) => default.clone(),
            (None, None) if definition.ty.is_non_null() => {
                return Err(ResolverError::custom(format!(
                    "Argument {name} of required type {} was not provided.",
                    definition.ty
                )));
            }
            (None, None) => continue,
        };
        args.set(name.clone(), coerce_input(&value, &definition.ty, registry, name)?);
    }
    Ok(args)
}

/// Checks the provided variables and applies the declared defaults.
///
/// Values are returned as provided; they are coerced where they are used
/// as arguments.
pub fn coerce_variables(
    definitions: &[ast::VariableDefinition],
    provided: &Map<String, Value>,
    registry: &TypeRegistry,
) -> Result<Map<String, Value>, ResolverError> {
    let mut variables = Map::new();
    for definition in definitions {
        let name = &definition.name.value;
        let ty = convert_type(&definition.ty, &|type_name: &str| registry.has_type(type_name))?;
        match provided.get(name) {
            Some(value) => {
                coerce_input(value, &ty, registry, name).map_err(|error| {
                    ResolverError::custom(format!(
                        "Variable \"${name}\" got invalid value {value}; {error}"
                    ))
                })?;
                variables.insert(name.clone(), value.clone());
            }
            None => {
                if let Some(default) = &definition.default_value {
                    variables.insert(name.clone(), const_to_json(default));
                } else if ty.is_non_null() {
                    return Err(ResolverError::custom(format!(
                        "Variable \"${name}\" of required type \"{ty}\" was not provided."
                    )));
                }
            }
        }
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_conversion() {
        let parsed = strata_syntax::parse(
            "query { a(x: [1, 2.5, \"s\", ACTIVE, null, {k: $v}, true]) }",
        );
        let operation = parsed.document.operations().next().unwrap();
        let ast::Selection::Field(field) = &operation.selection_set.selections[0] else {
            panic!("expected a field");
        };
        let mut variables = Map::new();
        variables.insert("v".into(), json!(9));
        assert_eq!(
            value_to_json(&field.arguments[0].value, &variables),
            json!([1, 2.5, "s", "ACTIVE", null, {"k": 9}, true])
        );
        assert_eq!(
            const_to_json(&field.arguments[0].value),
            json!([1, 2.5, "s", "ACTIVE", null, {"k": null}, true])
        );
    }
}
