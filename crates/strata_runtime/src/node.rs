//! Values passed to directives while a type or field is being built.

use crate::directive::Directive;
use crate::error::SchemaError;
use crate::relation::QueryDecorator;
use crate::resolver::ResolverArgs;
use crate::store::{Model, ModelCatalog, Select};
use crate::types::TypeHandle;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use strata_syntax::{self as ast, OperationType};

/// A type definition on its way to becoming an executable type.
#[derive(Debug, Clone)]
pub struct TypeValue {
    definition: ast::TypeDefinition,
    model: Option<String>,
}

impl TypeValue {
    pub fn new(definition: ast::TypeDefinition) -> Self {
        Self {
            definition,
            model: None,
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &ast::TypeDefinition {
        &self.definition
    }

    pub fn directives(&self) -> &[ast::Directive] {
        self.definition.directives()
    }

    /// The model explicitly mapped onto this type.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// The model whose rows back this type: the explicit mapping, else a
    /// model named like the type.
    pub fn backing_model<'a>(&self, catalog: &'a ModelCatalog) -> Result<&'a Model, SchemaError> {
        catalog.model(self.model.as_deref().unwrap_or(self.name()))
    }
}

/// An argument bound to the arg builder directives attached to it.
#[derive(Clone)]
struct ArgBuilderEntry {
    argument: String,
    directive: Arc<dyn Directive>,
}

/// The arg builder directives of a field's arguments.
#[derive(Clone, Default)]
pub struct ArgBuilders {
    entries: Vec<ArgBuilderEntry>,
}

impl ArgBuilders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, argument: impl Into<String>, directive: Arc<dyn Directive>) {
        self.entries.push(ArgBuilderEntry {
            argument: argument.into(),
            directive,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the builders of every argument that has a non-null value.
    pub fn apply(&self, select: &mut Select, args: &ResolverArgs) {
        for entry in &self.entries {
            let Some(value) = args.get(&entry.argument).filter(|v| !v.is_null()) else {
                continue;
            };
            if let Some(builder) = entry.directive.as_arg_builder() {
                builder.apply_to_query(select, &entry.argument, value);
            }
        }
    }

    /// A query decorator capturing the given argument values.
    pub fn decorator(&self, args: &ResolverArgs) -> Option<QueryDecorator> {
        let applied: Vec<(ArgBuilderEntry, Value)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let value = args.get(&entry.argument).filter(|v| !v.is_null())?;
                Some((entry.clone(), value.clone()))
            })
            .collect();
        if applied.is_empty() {
            return None;
        }
        Some(Arc::new(move |select: &mut Select| {
            for (entry, value) in &applied {
                if let Some(builder) = entry.directive.as_arg_builder() {
                    builder.apply_to_query(select, &entry.argument, value);
                }
            }
        }))
    }
}

impl fmt::Debug for ArgBuilders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| format!("{} @{}", entry.argument, entry.directive.name())),
            )
            .finish()
    }
}

/// A field definition on its way to becoming an executable field.
#[derive(Debug, Clone)]
pub struct FieldValue {
    parent: Arc<TypeValue>,
    definition: ast::FieldDefinition,
    ty: TypeHandle,
    root: Option<OperationType>,
    arg_builders: ArgBuilders,
}

impl FieldValue {
    pub fn new(
        parent: Arc<TypeValue>,
        definition: ast::FieldDefinition,
        ty: TypeHandle,
        root: Option<OperationType>,
    ) -> Self {
        Self {
            parent,
            definition,
            ty,
            root,
            arg_builders: ArgBuilders::new(),
        }
    }

    #[must_use]
    pub fn with_arg_builders(mut self, arg_builders: ArgBuilders) -> Self {
        self.arg_builders = arg_builders;
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name.value
    }

    pub fn parent(&self) -> &TypeValue {
        &self.parent
    }

    pub fn parent_name(&self) -> &str {
        self.parent.name()
    }

    pub fn definition(&self) -> &ast::FieldDefinition {
        &self.definition
    }

    pub fn directives(&self) -> &[ast::Directive] {
        &self.definition.directives
    }

    pub fn return_type(&self) -> &TypeHandle {
        &self.ty
    }

    /// Name of the innermost return type.
    pub fn return_type_name(&self) -> &str {
        self.ty.name()
    }

    /// The operation this field is a root field of.
    pub fn root_operation(&self) -> Option<OperationType> {
        self.root
    }

    pub fn is_root(&self) -> bool {
        self.root.is_some()
    }

    pub fn arg_builders(&self) -> &ArgBuilders {
        &self.arg_builders
    }

    /// `Parent.field`, for messages.
    pub fn node_name(&self) -> String {
        format!("{}.{}", self.parent_name(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::builtin::EqDirective;
    use crate::directive::{DefinedDirective, DirectiveNode};
    use crate::store::Operator;
    use serde_json::json;

    fn type_value(sdl: &str) -> TypeValue {
        let parsed = strata_syntax::parse(sdl);
        let value = TypeValue::new(parsed.document.type_definitions().next().unwrap().clone());
        value
    }

    #[test]
    fn test_backing_model() {
        let catalog = ModelCatalog::new()
            .with_model(Model::new("User", "users"))
            .with_model(Model::new("Account", "accounts"));
        let mut ty = type_value("type User { id: ID }");
        assert_eq!(ty.backing_model(&catalog).unwrap().table, "users");
        ty.set_model("Account");
        assert_eq!(ty.backing_model(&catalog).unwrap().table, "accounts");

        let unknown = type_value("type Ghost { id: ID }");
        assert!(unknown.backing_model(&catalog).is_err());
    }

    #[test]
    fn test_decorator_skips_absent_arguments() {
        let mut builders = ArgBuilders::new();
        let eq = EqDirective::from_node(DirectiveNode::new("eq")).unwrap();
        builders.push("name", Arc::new(eq));
        builders.push("email", Arc::new(EqDirective::from_node(DirectiveNode::new("eq")).unwrap()));

        assert!(builders.decorator(&ResolverArgs::new()).is_none());

        let mut args = ResolverArgs::new();
        args.set("name", json!("ada"));
        args.set("email", Value::Null);
        let decorate = builders.decorator(&args).unwrap();
        let mut select = Select::new("users");
        decorate(&mut select);
        assert_eq!(select.conditions.len(), 1);
        assert_eq!(select.conditions[0].column, "name");
        assert_eq!(select.conditions[0].operator, Operator::Eq);
    }
}
