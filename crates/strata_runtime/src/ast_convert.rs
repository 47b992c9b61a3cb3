//! Conversion of SDL type references and input values.

use crate::error::SchemaError;
use crate::types::{InputValue, TypeHandle};
use crate::values::const_to_json;
use indexmap::IndexMap;
use strata_syntax as ast;

/// Answers whether a type name exists, without materializing the type.
pub trait TypeLookup {
    fn has_type(&self, name: &str) -> bool;
}

impl<F: Fn(&str) -> bool> TypeLookup for F {
    fn has_type(&self, name: &str) -> bool {
        self(name)
    }
}

/// Converts a type reference, checking that the named type exists.
pub fn convert_type(ty: &ast::Type, lookup: &dyn TypeLookup) -> Result<TypeHandle, SchemaError> {
    Ok(match ty {
        ast::Type::Named(name) => {
            if !lookup.has_type(name.as_str()) {
                return Err(SchemaError::unknown_type(name.as_str()));
            }
            TypeHandle::named(name.as_str())
        }
        ast::Type::List(inner, _) => TypeHandle::list(convert_type(inner, lookup)?),
        ast::Type::NonNull(inner, _) => TypeHandle::non_null(convert_type(inner, lookup)?),
    })
}

pub fn convert_input_value(
    definition: &ast::InputValueDefinition,
    lookup: &dyn TypeLookup,
) -> Result<InputValue, SchemaError> {
    Ok(InputValue {
        name: definition.name.value.clone(),
        description: definition.description.clone(),
        ty: convert_type(&definition.ty, lookup)?,
        default_value: definition.default_value.as_ref().map(const_to_json),
    })
}

pub fn convert_arguments(
    definitions: &[ast::InputValueDefinition],
    lookup: &dyn TypeLookup,
) -> Result<IndexMap<String, InputValue>, SchemaError> {
    definitions
        .iter()
        .map(|definition| {
            convert_input_value(definition, lookup).map(|value| (value.name.clone(), value))
        })
        .collect()
}

/// The reason given by `@deprecated`, or "No longer supported" when it has none.
pub fn deprecation_reason(directives: &[ast::Directive]) -> Option<String> {
    directives
        .iter()
        .find(|directive| directive.name.value == "deprecated")
        .map(|directive| {
            directive
                .argument("reason")
                .and_then(ast::Value::as_str)
                .unwrap_or("No longer supported")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "User" | "String")
    }

    fn field_type(sdl: &str) -> ast::Type {
        let parsed = strata_syntax::parse(sdl);
        let document = parsed.document;
        let ty = document.type_definitions().next().unwrap().fields().unwrap()[0]
            .ty
            .clone();
        ty
    }

    #[test]
    fn test_convert_wrapped_type() {
        let ty = field_type("type Q { users: [User!]! }");
        let handle = convert_type(&ty, &known).unwrap();
        assert_eq!(handle.to_string(), "[User!]!");
    }

    #[test]
    fn test_unknown_named_type() {
        let ty = field_type("type Q { users: [Nope] }");
        assert_eq!(
            convert_type(&ty, &known).unwrap_err(),
            SchemaError::unknown_type("Nope")
        );
    }

    #[test]
    fn test_arguments_with_defaults() {
        let parsed = strata_syntax::parse("type Q { users(name: String = \"ada\"): User }");
        let field = &parsed.document.type_definitions().next().unwrap().fields().unwrap()[0];
        let arguments = convert_arguments(&field.arguments, &known).unwrap();
        assert_eq!(
            arguments["name"].default_value,
            Some(serde_json::json!("ada"))
        );
    }

    #[test]
    fn test_deprecation_reason() {
        let parsed = strata_syntax::parse(
            "type Q { a: String @deprecated b: String @deprecated(reason: \"use a\") }",
        );
        let fields = parsed.document.type_definitions().next().unwrap().fields().unwrap();
        assert_eq!(
            deprecation_reason(&fields[0].directives).as_deref(),
            Some("No longer supported")
        );
        assert_eq!(deprecation_reason(&fields[1].directives).as_deref(), Some("use a"));
    }
}
