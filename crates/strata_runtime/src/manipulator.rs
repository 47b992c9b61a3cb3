//! Schema document preparation.
//!
//! Before any type is built the schema document is rewritten: type
//! extensions are merged into their base types, field manipulators run,
//! and the definitions of the directives in use, the types their arguments
//! refer to and the introspection prelude are appended.

use crate::config::StrataConfig;
use crate::directive::{Capability, DirectiveLocator, NATIVE_DIRECTIVES};
use crate::error::SchemaError;
use crate::introspection::PRELUDE;
use rustc_hash::FxHashSet;
use strata_syntax as ast;

/// Parses a schema document, failing on the first syntax error.
pub fn parse_sdl(source: &str) -> Result<ast::Document, SchemaError> {
    let parsed = strata_syntax::parse(source);
    if let Some(error) = parsed.diagnostics.first_error() {
        return Err(SchemaError::Parse {
            message: error.message.clone(),
            span: error.span,
        });
    }
    Ok(parsed.document)
}

/// What a field manipulator may touch besides the field itself.
pub struct ManipulationContext<'a> {
    config: &'a StrataConfig,
    parent_type: &'a str,
    known: &'a mut FxHashSet<String>,
    additions: &'a mut Vec<ast::Definition>,
}

impl<'a> ManipulationContext<'a> {
    pub fn config(&self) -> &StrataConfig {
        self.config
    }

    /// Name of the type declaring the field being manipulated.
    pub fn parent_type(&self) -> &str {
        self.parent_type
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Adds a type unless one of the same name exists. Returns whether it
    /// was added.
    pub fn add_type(&mut self, definition: ast::TypeDefinition) -> bool {
        if !self.known.insert(definition.name().to_string()) {
            return false;
        }
        self.additions.push(ast::Definition::Type(definition));
        true
    }

    /// Adds every type defined by an SDL snippet that does not exist yet.
    pub fn add_sdl(&mut self, source: &str) -> Result<(), SchemaError> {
        for definition in parse_sdl(source)?.definitions {
            if let ast::Definition::Type(ty) = definition {
                self.add_type(ty);
            }
        }
        Ok(())
    }
}

/// Rewrites a parsed schema document into the document types are built
/// from.
pub struct AstBuilder<'a> {
    locator: &'a DirectiveLocator,
    config: &'a StrataConfig,
}

impl<'a> AstBuilder<'a> {
    pub fn new(locator: &'a DirectiveLocator, config: &'a StrataConfig) -> Self {
        Self { locator, config }
    }

    pub fn build(&self, document: ast::Document) -> Result<ast::Document, SchemaError> {
        let mut document = merge_extensions(document)?;
        let mut known: FxHashSet<String> = document
            .type_definitions()
            .map(|ty| ty.name().to_string())
            .collect();

        self.manipulate_fields(&mut document, &mut known)?;
        self.add_directive_definitions(&mut document, &mut known)?;
        add_prelude(&mut document, &mut known)?;

        tracing::debug!(
            types = known.len(),
            directives = document.directive_definitions().count(),
            "schema document prepared"
        );
        Ok(document)
    }

    fn manipulate_fields(
        &self,
        document: &mut ast::Document,
        known: &mut FxHashSet<String>,
    ) -> Result<(), SchemaError> {
        let mut additions = Vec::new();
        for definition in &mut document.definitions {
            let ast::Definition::Type(ty) = definition else {
                continue;
            };
            let parent = ty.name().to_string();
            let Some(fields) = ty.fields_mut() else {
                continue;
            };
            for field in fields.iter_mut() {
                let manipulators = self
                    .locator
                    .associated_of_type(&field.directives, Capability::FieldManipulator)?;
                for directive in manipulators {
                    let Some(manipulator) = directive.as_field_manipulator() else {
                        continue;
                    };
                    let mut cx = ManipulationContext {
                        config: self.config,
                        parent_type: &parent,
                        known: &mut *known,
                        additions: &mut additions,
                    };
                    manipulator.manipulate_field(field, &mut cx)?;
                }
            }
        }
        document.definitions.extend(additions);
        Ok(())
    }

    /// Appends the definitions of every non-native directive used in the
    /// document, along with the types their arguments need. Directives the
    /// document defines itself are left alone.
    fn add_directive_definitions(
        &self,
        document: &mut ast::Document,
        known: &mut FxHashSet<String>,
    ) -> Result<(), SchemaError> {
        let mut defined: FxHashSet<String> = document
            .directive_definitions()
            .map(|definition| definition.name.value.clone())
            .collect();

        let mut used: Vec<String> = self.config.global_field_middleware.clone();
        for ty in document.type_definitions() {
            collect_used(ty, &mut used);
        }

        let mut additions = Vec::new();
        for name in used {
            if NATIVE_DIRECTIVES.contains(&name.as_str()) || defined.contains(&name) {
                continue;
            }
            for definition in self.locator.resolve(&name)?.parsed()?.definitions {
                match definition {
                    ast::Definition::Directive(directive) => {
                        if defined.insert(directive.name.value.clone()) {
                            additions.push(ast::Definition::Directive(directive));
                        }
                    }
                    ast::Definition::Type(ty) => {
                        if known.insert(ty.name().to_string()) {
                            additions.push(ast::Definition::Type(ty));
                        }
                    }
                    _ => {}
                }
            }
        }
        document.definitions.extend(additions);
        Ok(())
    }
}

fn collect_used(ty: &ast::TypeDefinition, used: &mut Vec<String>) {
    let mut push = |directives: &[ast::Directive]| {
        for directive in directives {
            if !used.contains(&directive.name.value) {
                used.push(directive.name.value.clone());
            }
        }
    };

    push(ty.directives());
    match ty {
        ast::TypeDefinition::Object(ast::ObjectTypeDefinition { fields, .. })
        | ast::TypeDefinition::Interface(ast::InterfaceTypeDefinition { fields, .. }) => {
            for field in fields {
                push(&field.directives);
                for argument in &field.arguments {
                    push(&argument.directives);
                }
            }
        }
        ast::TypeDefinition::Enum(enum_type) => {
            for value in &enum_type.values {
                push(&value.directives);
            }
        }
        ast::TypeDefinition::InputObject(input) => {
            for field in &input.fields {
                push(&field.directives);
            }
        }
        ast::TypeDefinition::Union(_) | ast::TypeDefinition::Scalar(_) => {}
    }
}

fn add_prelude(
    document: &mut ast::Document,
    known: &mut FxHashSet<String>,
) -> Result<(), SchemaError> {
    let defined: FxHashSet<String> = document
        .directive_definitions()
        .map(|definition| definition.name.value.clone())
        .collect();
    for definition in parse_sdl(PRELUDE)?.definitions {
        match definition {
            ast::Definition::Type(ty) if known.insert(ty.name().to_string()) => {
                document.definitions.push(ast::Definition::Type(ty));
            }
            ast::Definition::Directive(directive) if !defined.contains(&directive.name.value) => {
                document.definitions.push(ast::Definition::Directive(directive));
            }
            _ => {}
        }
    }
    Ok(())
}

// =============================================================================
// Extensions
// =============================================================================

/// Merges every `extend` definition into the base type of the same name.
fn merge_extensions(document: ast::Document) -> Result<ast::Document, SchemaError> {
    let mut definitions = Vec::with_capacity(document.definitions.len());
    let mut extensions = Vec::new();
    for definition in document.definitions {
        match definition {
            ast::Definition::TypeExtension(extension) => extensions.push(extension),
            other => definitions.push(other),
        }
    }

    for extension in extensions {
        let base = definitions.iter_mut().find_map(|definition| match definition {
            ast::Definition::Type(ty) if ty.name() == extension.name() => Some(ty),
            _ => None,
        });
        let base = base.ok_or_else(|| SchemaError::unknown_type(extension.name()))?;
        merge(base, extension)?;
    }

    Ok(ast::Document {
        definitions,
        span: document.span,
    })
}

fn merge(base: &mut ast::TypeDefinition, extension: ast::TypeDefinition) -> Result<(), SchemaError> {
    let name = base.name().to_string();
    let invalid = |message: String| SchemaError::InvalidExtension {
        name: name.clone(),
        message,
    };

    match (base, extension) {
        (ast::TypeDefinition::Object(base), ast::TypeDefinition::Object(extension)) => {
            append_named(&mut base.fields, extension.fields, |f| &f.name, &invalid)?;
            union_names(&mut base.implements, extension.implements);
            base.directives.extend(extension.directives);
        }
        (ast::TypeDefinition::Interface(base), ast::TypeDefinition::Interface(extension)) => {
            append_named(&mut base.fields, extension.fields, |f| &f.name, &invalid)?;
            union_names(&mut base.implements, extension.implements);
            base.directives.extend(extension.directives);
        }
        (ast::TypeDefinition::Union(base), ast::TypeDefinition::Union(extension)) => {
            union_names(&mut base.members, extension.members);
            base.directives.extend(extension.directives);
        }
        (ast::TypeDefinition::Enum(base), ast::TypeDefinition::Enum(extension)) => {
            append_named(&mut base.values, extension.values, |v| &v.name, &invalid)?;
            base.directives.extend(extension.directives);
        }
        (ast::TypeDefinition::InputObject(base), ast::TypeDefinition::InputObject(extension)) => {
            append_named(&mut base.fields, extension.fields, |f| &f.name, &invalid)?;
            base.directives.extend(extension.directives);
        }
        (ast::TypeDefinition::Scalar(base), ast::TypeDefinition::Scalar(extension)) => {
            base.directives.extend(extension.directives);
        }
        (base, extension) => {
            return Err(invalid(format!(
                "{name} is declared with `{}` and cannot be extended with `extend {}`",
                base.kind(),
                extension.kind()
            )));
        }
    }
    Ok(())
}

fn append_named<T>(
    base: &mut Vec<T>,
    additions: Vec<T>,
    name: impl Fn(&T) -> &ast::Name,
    invalid: &dyn Fn(String) -> SchemaError,
) -> Result<(), SchemaError> {
    for addition in additions {
        let added = name(&addition).as_str();
        if base.iter().any(|existing| name(existing).as_str() == added) {
            return Err(invalid(format!("`{added}` is already defined")));
        }
        base.push(addition);
    }
    Ok(())
}

fn union_names(base: &mut Vec<ast::Name>, additions: Vec<ast::Name>) {
    for addition in additions {
        if !base.iter().any(|existing| existing.value == addition.value) {
            base.push(addition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::builtin::register_builtin_directives;
    use crate::namespace::ClassRegistry;

    fn locator() -> DirectiveLocator {
        let mut classes = ClassRegistry::new();
        register_builtin_directives(&mut classes);
        DirectiveLocator::new(classes, &[] as &[&str], &[])
    }

    fn build(sdl: &str) -> Result<ast::Document, SchemaError> {
        let config = StrataConfig::default();
        AstBuilder::new(&locator(), &config).build(parse_sdl(sdl)?)
    }

    fn field_names(document: &ast::Document, ty: &str) -> Vec<String> {
        document
            .type_definition(ty)
            .and_then(ast::TypeDefinition::fields)
            .unwrap_or_default()
            .iter()
            .map(|field| field.name.value.clone())
            .collect()
    }

    #[test]
    fn test_extensions_are_merged() {
        let document = build(
            "type Query { a: Int }
             extend type Query { b: Int }
             union U = Query
             extend union U = Query",
        )
        .unwrap();
        assert_eq!(field_names(&document, "Query"), vec!["a", "b"]);
        let Some(ast::TypeDefinition::Union(union)) = document.type_definition("U") else {
            panic!("expected a union");
        };
        assert_eq!(union.members.len(), 1);
    }

    #[test]
    fn test_invalid_extensions() {
        let missing = build("type Query { a: Int } extend type Missing { b: Int }");
        assert_eq!(missing.unwrap_err(), SchemaError::unknown_type("Missing"));

        let duplicate = build("type Query { a: Int } extend type Query { a: Int }");
        assert!(matches!(
            duplicate.unwrap_err(),
            SchemaError::InvalidExtension { ref name, .. } if name == "Query"
        ));

        let mismatch = build("type Query { a: Int } extend interface Query { b: Int }");
        assert!(matches!(mismatch.unwrap_err(), SchemaError::InvalidExtension { .. }));
    }

    #[test]
    fn test_paginated_relation_is_rewritten() {
        let document = build(
            "type Query { users: [User!]! @all }
             type User { id: ID! posts: [Post!]! @hasMany(type: PAGINATOR, defaultCount: 5) }
             type Post { id: ID! }",
        )
        .unwrap();

        let user = document.type_definition("User").unwrap();
        let posts = &user.fields().unwrap()[1];
        assert_eq!(posts.ty.to_string(), "PostPaginator!");
        let arguments: Vec<&str> = posts.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(arguments, vec!["first", "page"]);
        assert_eq!(posts.arguments[0].default_value, Some(ast::Value::Int(5)));

        assert_eq!(field_names(&document, "PostPaginator"), vec!["paginatorInfo", "data"]);
        assert!(document.type_definition("PaginatorInfo").is_some());
    }

    #[test]
    fn test_used_directives_and_prelude_are_added() {
        let document = build(
            "type Query { users: [User!]! @all }
             type User { status: Status }
             enum Status { ACTIVE @enum(value: 1) }",
        )
        .unwrap();
        let directives: Vec<&str> = document
            .directive_definitions()
            .map(|definition| definition.name.as_str())
            .collect();
        assert!(directives.contains(&"all"));
        assert!(directives.contains(&"enum"));
        assert!(directives.contains(&"skip"));
        assert!(!directives.contains(&"hasMany"));
        assert!(document.type_definition("JSON").is_some());
        assert!(document.type_definition("__Schema").is_some());
    }

    #[test]
    fn test_unknown_directive_fails() {
        let error = build("type Query { a: Int @nope }").unwrap_err();
        assert!(matches!(error, SchemaError::UnknownDirective { ref name, .. } if name == "nope"));
    }
}
