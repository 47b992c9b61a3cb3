use crate::directive::{
    DefinedDirective, Directive, DirectiveNode, EnumValueDirective, ScalarDirective,
    TypeMiddleware, TypeResolverDirective,
};
use crate::error::SchemaError;
use crate::node::TypeValue;
use crate::registry::TypeRegistry;
use crate::schema::BuildContext;
use crate::types::{AbstractResolver, ExecutableType};
use serde::Deserialize;
use serde_json::Value;

// =============================================================================
// @model
// =============================================================================

#[derive(Debug, Deserialize)]
struct ModelArgs {
    class: String,
}

/// `@model(class: "User")`: maps an object type onto a model of another
/// name.
pub struct ModelDirective {
    node: DirectiveNode,
    args: ModelArgs,
}

impl DefinedDirective for ModelDirective {
    const DEFINITION: &'static str = r#"
"""
Map a type to a model when the names differ.
"""
directive @model(
  """
  The model name or qualified class.
  """
  class: String!
) on OBJECT
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for ModelDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_type_middleware(&self) -> Option<&dyn TypeMiddleware> {
        Some(self)
    }
}

impl TypeMiddleware for ModelDirective {
    fn handle_type(&self, ty: &mut TypeValue, cx: &BuildContext) -> Result<(), SchemaError> {
        let model = cx.catalog.model(&self.args.class)?;
        ty.set_model(model.name.clone());
        Ok(())
    }
}

// =============================================================================
// @union / @interface
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveTypeArgs {
    resolve_type: String,
}

/// Builds an abstract type whose concrete type is picked by a registered
/// [`TypeResolver`](crate::types::TypeResolver) class.
fn with_custom_resolver(
    directive: &DirectiveNode,
    class: &str,
    namespaces: &[String],
    ty: &TypeValue,
    registry: &TypeRegistry,
) -> Result<ExecutableType, SchemaError> {
    let cx = registry.context();
    let resolver = if class.contains('.') {
        cx.type_resolvers.get(class).cloned()
    } else {
        cx.type_resolvers
            .find(namespaces, class)
            .map(|(_, resolver)| resolver.clone())
    };
    let resolver = resolver.ok_or_else(|| SchemaError::InvalidDirectiveUsage {
        directive: directive.name.clone(),
        node: ty.name().to_string(),
        message: format!(
            "no type resolver `{class}` in the namespaces [{}]",
            namespaces.join(", ")
        ),
    })?;
    Ok(registry
        .build_default(ty)?
        .with_abstract_resolver(AbstractResolver::Custom(resolver)))
}

/// `@union(resolveType: "SearchResultResolver")`.
pub struct UnionDirective {
    node: DirectiveNode,
    args: ResolveTypeArgs,
}

impl DefinedDirective for UnionDirective {
    const DEFINITION: &'static str = r#"
"""
Use a custom function to determine the concrete type of unions.
"""
directive @union(
  """
  Reference a type resolver class.
  """
  resolveType: String!
) on UNION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for UnionDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_type_resolver(&self) -> Option<&dyn TypeResolverDirective> {
        Some(self)
    }
}

impl TypeResolverDirective for UnionDirective {
    fn resolve_type(
        &self,
        ty: &TypeValue,
        registry: &TypeRegistry,
    ) -> Result<ExecutableType, SchemaError> {
        let namespaces = &registry.context().config.namespaces.unions;
        with_custom_resolver(&self.node, &self.args.resolve_type, namespaces, ty, registry)
    }
}

/// `@interface(resolveType: "NodeResolver")`.
pub struct InterfaceDirective {
    node: DirectiveNode,
    args: ResolveTypeArgs,
}

impl DefinedDirective for InterfaceDirective {
    const DEFINITION: &'static str = r#"
"""
Use a custom resolver to determine the concrete type of an interface.
"""
directive @interface(
  """
  Reference a type resolver class.
  """
  resolveType: String!
) on INTERFACE
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for InterfaceDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_type_resolver(&self) -> Option<&dyn TypeResolverDirective> {
        Some(self)
    }
}

impl TypeResolverDirective for InterfaceDirective {
    fn resolve_type(
        &self,
        ty: &TypeValue,
        registry: &TypeRegistry,
    ) -> Result<ExecutableType, SchemaError> {
        let namespaces = &registry.context().config.namespaces.interfaces;
        with_custom_resolver(&self.node, &self.args.resolve_type, namespaces, ty, registry)
    }
}

// =============================================================================
// @enum
// =============================================================================

#[derive(Debug, Deserialize)]
struct EnumArgs {
    value: Value,
}

/// `@enum(value: 1)`: the internal value of an enum value.
pub struct EnumDirective {
    node: DirectiveNode,
    args: EnumArgs,
}

impl DefinedDirective for EnumDirective {
    const DEFINITION: &'static str = r#"
"""
Assign an internal value to an enum key.
"""
directive @enum(
  """
  The internal value of the enum key.
  """
  value: JSON!
) on ENUM_VALUE

"""
Arbitrary JSON.
"""
scalar JSON
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for EnumDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_enum_value(&self) -> Option<&dyn EnumValueDirective> {
        Some(self)
    }
}

impl EnumValueDirective for EnumDirective {
    fn value(&self) -> Value {
        self.args.value.clone()
    }
}

// =============================================================================
// @scalar
// =============================================================================

#[derive(Debug, Deserialize)]
struct ScalarArgs {
    class: String,
}

/// `@scalar(class: "App.Scalars.Email")`: the implementation class of a
/// scalar.
pub struct ScalarClassDirective {
    node: DirectiveNode,
    args: ScalarArgs,
}

impl DefinedDirective for ScalarClassDirective {
    const DEFINITION: &'static str = r#"
"""
Reference a class implementing a scalar definition.
"""
directive @scalar(
  """
  Reference to a class implementing the scalar.
  """
  class: String!
) on SCALAR
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for ScalarClassDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_scalar(&self) -> Option<&dyn ScalarDirective> {
        Some(self)
    }
}

impl ScalarDirective for ScalarClassDirective {
    fn implementation_class(&self) -> &str {
        &self.args.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enum_value_keeps_json() {
        let node = DirectiveNode::new("enum").with_argument("value", json!({"level": 3}));
        let directive = EnumDirective::from_node(node).unwrap();
        assert_eq!(directive.value(), json!({"level": 3}));
    }

    #[test]
    fn test_resolve_type_argument_is_camel_case() {
        let node = DirectiveNode::new("union").with_argument("resolveType", json!("Search"));
        let directive = UnionDirective::from_node(node).unwrap();
        assert_eq!(directive.args.resolve_type, "Search");
        assert!(directive.as_type_resolver().is_some());
    }
}
