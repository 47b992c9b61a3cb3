//! Directive framework.
//!
//! A directive class is registered under a qualified name such as
//! `Strata.Directives.HasManyDirective` together with its SDL definition and
//! a factory. The [`DirectiveLocator`] resolves directive usages in the
//! schema to instances; each instance declares the capabilities it
//! implements through the `as_*` accessors of [`Directive`].

pub mod builtin;
mod locator;

pub use locator::{DirectiveLocator, BUILTIN_DIRECTIVE_NAMESPACE, NATIVE_DIRECTIVES};

use crate::error::SchemaError;
use crate::manipulator::ManipulationContext;
use crate::node::{FieldValue, TypeValue};
use crate::registry::TypeRegistry;
use crate::resolver::FieldResolverFn;
use crate::schema::BuildContext;
use crate::store::Select;
use crate::types::ExecutableType;
use crate::values::const_to_json;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use strata_core::Span;
use strata_syntax as ast;

/// A directive usage with its arguments converted to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveNode {
    pub name: String,
    pub arguments: Map<String, Value>,
    pub span: Span,
}

impl DirectiveNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
            span: Span::default(),
        }
    }

    pub fn from_ast(directive: &ast::Directive) -> Self {
        Self {
            name: directive.name.value.clone(),
            arguments: directive
                .arguments
                .iter()
                .map(|arg| (arg.name.value.clone(), const_to_json(&arg.value)))
                .collect(),
            span: directive.span,
        }
    }

    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn string_argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }

    /// Deserializes the arguments into a typed struct.
    pub fn parse_args<T: DeserializeOwned>(&self) -> Result<T, SchemaError> {
        serde_json::from_value(Value::Object(self.arguments.clone())).map_err(|e| {
            SchemaError::InvalidDirectiveArguments {
                directive: self.name.clone(),
                message: e.to_string(),
            }
        })
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// A kind of behavior a directive can contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Provides the base resolver of a field. Exclusive.
    FieldResolver,
    /// Wraps the resolver of a field.
    FieldMiddleware,
    /// Adjusts a type before it is built.
    TypeMiddleware,
    /// Builds an interface or union itself. Exclusive.
    TypeResolver,
    /// Turns an argument value into a query constraint.
    ArgBuilder,
    /// Overrides the internal value of an enum value.
    EnumValue,
    /// Names the implementation class of a scalar. Exclusive.
    Scalar,
    /// Rewrites the schema document before types are built.
    FieldManipulator,
}

impl Capability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FieldResolver => "FieldResolver",
            Self::FieldMiddleware => "FieldMiddleware",
            Self::TypeMiddleware => "TypeMiddleware",
            Self::TypeResolver => "TypeResolver",
            Self::ArgBuilder => "ArgBuilder",
            Self::EnumValue => "EnumValue",
            Self::Scalar => "Scalar",
            Self::FieldManipulator => "FieldManipulator",
        }
    }

    pub fn implemented_by(self, directive: &dyn Directive) -> bool {
        match self {
            Self::FieldResolver => directive.as_field_resolver().is_some(),
            Self::FieldMiddleware => directive.as_field_middleware().is_some(),
            Self::TypeMiddleware => directive.as_type_middleware().is_some(),
            Self::TypeResolver => directive.as_type_resolver().is_some(),
            Self::ArgBuilder => directive.as_arg_builder().is_some(),
            Self::EnumValue => directive.as_enum_value().is_some(),
            Self::Scalar => directive.as_scalar().is_some(),
            Self::FieldManipulator => directive.as_field_manipulator().is_some(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directive instance, bound to one usage in the schema.
pub trait Directive: Send + Sync {
    fn node(&self) -> &DirectiveNode;

    fn name(&self) -> &str {
        &self.node().name
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        None
    }

    fn as_field_middleware(&self) -> Option<&dyn FieldMiddleware> {
        None
    }

    fn as_type_middleware(&self) -> Option<&dyn TypeMiddleware> {
        None
    }

    fn as_type_resolver(&self) -> Option<&dyn TypeResolverDirective> {
        None
    }

    fn as_arg_builder(&self) -> Option<&dyn ArgBuilder> {
        None
    }

    fn as_enum_value(&self) -> Option<&dyn EnumValueDirective> {
        None
    }

    fn as_scalar(&self) -> Option<&dyn ScalarDirective> {
        None
    }

    fn as_field_manipulator(&self) -> Option<&dyn FieldManipulator> {
        None
    }
}

impl fmt::Debug for dyn Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name())
    }
}

pub trait FieldResolverDirective: Send + Sync {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError>;
}

pub trait FieldMiddleware: Send + Sync {
    /// Wraps `next`; the returned closure decides whether and how `next`
    /// runs.
    fn wrap(
        &self,
        field: &FieldValue,
        next: FieldResolverFn,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError>;
}

pub trait TypeMiddleware: Send + Sync {
    fn handle_type(&self, ty: &mut TypeValue, cx: &BuildContext) -> Result<(), SchemaError>;
}

pub trait TypeResolverDirective: Send + Sync {
    fn resolve_type(
        &self,
        ty: &TypeValue,
        registry: &TypeRegistry,
    ) -> Result<ExecutableType, SchemaError>;
}

pub trait ArgBuilder: Send + Sync {
    fn apply_to_query(&self, select: &mut Select, argument: &str, value: &Value);
}

pub trait EnumValueDirective: Send + Sync {
    fn value(&self) -> Value;
}

pub trait ScalarDirective: Send + Sync {
    fn implementation_class(&self) -> &str;
}

pub trait FieldManipulator: Send + Sync {
    fn manipulate_field(
        &self,
        field: &mut ast::FieldDefinition,
        cx: &mut ManipulationContext<'_>,
    ) -> Result<(), SchemaError>;
}

// =============================================================================
// Classes
// =============================================================================

/// Creates a directive instance from a usage.
pub type DirectiveFactory =
    Arc<dyn Fn(DirectiveNode) -> Result<Arc<dyn Directive>, SchemaError> + Send + Sync>;

/// A directive type with a static SDL definition.
pub trait DefinedDirective: Directive + Sized + 'static {
    /// `directive @name(...) on ...`
    const DEFINITION: &'static str;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError>;
}

/// A registered directive implementation.
#[derive(Clone)]
pub struct DirectiveClass {
    definition: Arc<str>,
    factory: DirectiveFactory,
}

impl DirectiveClass {
    pub fn new<F>(definition: &str, factory: F) -> Self
    where
        F: Fn(DirectiveNode) -> Result<Arc<dyn Directive>, SchemaError> + Send + Sync + 'static,
    {
        Self {
            definition: Arc::from(definition),
            factory: Arc::new(factory),
        }
    }

    /// The class of a [`DefinedDirective`].
    pub fn of<D: DefinedDirective>() -> Self {
        Self::new(D::DEFINITION, |node| {
            D::from_node(node).map(|directive| Arc::new(directive) as Arc<dyn Directive>)
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn instantiate(&self, node: DirectiveNode) -> Result<Arc<dyn Directive>, SchemaError> {
        (self.factory)(node)
    }

    /// Parses the SDL snippet, which may declare types the directive's
    /// arguments refer to next to the directive itself.
    pub fn parsed(&self) -> Result<ast::Document, SchemaError> {
        let parsed = strata_syntax::parse(&self.definition);
        if let Some(error) = parsed.diagnostics.first_error() {
            return Err(SchemaError::Parse {
                message: error.message.clone(),
                span: error.span,
            });
        }
        Ok(parsed.document)
    }

    pub fn parsed_definition(&self) -> Result<ast::DirectiveDefinition, SchemaError> {
        self.parsed()?
            .directive_definitions()
            .next()
            .cloned()
            .ok_or_else(|| SchemaError::internal("directive class without a definition"))
    }
}

impl fmt::Debug for DirectiveClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveClass")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        relation: Option<String>,
        #[serde(rename = "maxCount")]
        max_count: Option<u64>,
    }

    #[test]
    fn test_node_from_ast() {
        let parsed =
            strata_syntax::parse("type Q { a: Int @hasMany(relation: \"posts\", maxCount: 5) }");
        let field = &parsed.document.type_definitions().next().unwrap().fields().unwrap()[0];
        let node = DirectiveNode::from_ast(&field.directives[0]);
        assert_eq!(node.name, "hasMany");
        assert_eq!(node.argument("maxCount"), Some(&json!(5)));

        let args: Args = node.parse_args().unwrap();
        assert_eq!(args.relation.as_deref(), Some("posts"));
        assert_eq!(args.max_count, Some(5));
    }

    #[test]
    fn test_invalid_arguments() {
        let node = DirectiveNode::new("hasMany").with_argument("maxCount", json!("five"));
        let error = node.parse_args::<Args>().unwrap_err();
        assert!(matches!(
            error,
            SchemaError::InvalidDirectiveArguments { ref directive, .. } if directive == "hasMany"
        ));
    }
}
