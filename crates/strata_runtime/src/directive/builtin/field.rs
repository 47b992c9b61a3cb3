use crate::directive::{DefinedDirective, Directive, DirectiveNode, FieldResolverDirective};
use crate::error::SchemaError;
use crate::node::FieldValue;
use crate::resolver::{attribute_resolver, into_field_resolver, FieldResolverFn};
use crate::schema::BuildContext;
use serde::Deserialize;
use strata_syntax::OperationType;

#[derive(Debug, Deserialize)]
struct FieldArgs {
    resolver: String,
}

/// `@field(resolver: "Users@active")`: resolves a field with a resolver
/// class.
///
/// A qualified class name is looked up as is. A bare one is searched in the
/// namespaces of the field's operation, or in every operation namespace for
/// fields of non-root types. `Class@method` prefers a class registered under
/// that exact name and falls back to `Class`.
pub struct FieldDirective {
    node: DirectiveNode,
    args: FieldArgs,
}

impl DefinedDirective for FieldDirective {
    const DEFINITION: &'static str = r#"
"""
Resolve a field with a resolver class.
"""
directive @field(
  """
  A reference to the resolver: `Class` or `Class@method`.
  """
  resolver: String!
) on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for FieldDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }
}

impl FieldResolverDirective for FieldDirective {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let reference = self.args.resolver.as_str();
        let class = reference.split_once('@').map_or(reference, |(class, _)| class);

        let namespaces: Vec<String> = match field.root_operation() {
            Some(operation) => cx.config.namespaces.for_operation(operation).to_vec(),
            None => [
                OperationType::Query,
                OperationType::Mutation,
                OperationType::Subscription,
            ]
            .into_iter()
            .flat_map(|operation| cx.config.namespaces.for_operation(operation).to_vec())
            .collect(),
        };

        let lookup = |name: &str| {
            if name.contains('.') {
                cx.resolvers.get(name).cloned()
            } else {
                cx.resolvers
                    .find(&namespaces, name)
                    .map(|(_, resolver)| resolver.clone())
            }
        };

        let resolver = lookup(reference).or_else(|| lookup(class)).ok_or_else(|| {
            SchemaError::MissingResolver {
                type_name: field.parent_name().to_string(),
                field: field.name().to_string(),
                help: format!(
                    "@field references `{reference}`, which is not registered in [{}]",
                    namespaces.join(", ")
                ),
            }
        })?;
        Ok(into_field_resolver(resolver))
    }
}

#[derive(Debug, Deserialize)]
struct RenameArgs {
    attribute: String,
}

/// `@rename(attribute: "created_at")`: reads another attribute of the
/// parent.
pub struct RenameDirective {
    node: DirectiveNode,
    args: RenameArgs,
}

impl DefinedDirective for RenameDirective {
    const DEFINITION: &'static str = r#"
"""
Change the internally used name of a field.
"""
directive @rename(
  """
  The attribute of the parent that holds the value.
  """
  attribute: String!
) on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for RenameDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }
}

impl FieldResolverDirective for RenameDirective {
    fn resolve_field(
        &self,
        _field: &FieldValue,
        _cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        Ok(attribute_resolver(self.args.attribute.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rename_requires_attribute() {
        assert!(RenameDirective::from_node(DirectiveNode::new("rename")).is_err());
        let directive = RenameDirective::from_node(
            DirectiveNode::new("rename").with_argument("attribute", json!("created_at")),
        )
        .unwrap();
        assert_eq!(directive.args.attribute, "created_at");
        assert!(directive.as_field_resolver().is_some());
        assert!(directive.as_field_middleware().is_none());
    }
}
