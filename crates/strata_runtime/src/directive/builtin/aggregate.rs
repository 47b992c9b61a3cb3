use super::relation::defer;
use crate::directive::{DefinedDirective, Directive, DirectiveNode, FieldResolverDirective};
use crate::error::SchemaError;
use crate::node::FieldValue;
use crate::relation::{
    aggregate_alias, count_alias, AggregateModelsLoader, CountModelsLoader, RelationMeta,
};
use crate::resolver::{FieldResolverFn, ResolveParams};
use crate::schema::BuildContext;
use crate::store::{AggregateFunction, Model};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Parent model of the field, checked to declare `relation`.
fn related_parent(
    field: &FieldValue,
    relation: &str,
    cx: &BuildContext,
) -> Result<Model, SchemaError> {
    let model = field.parent().backing_model(&cx.catalog)?;
    cx.catalog.relation(&model.name, relation)?;
    Ok(model.clone())
}

#[derive(Debug, Deserialize)]
struct CountArgs {
    relation: String,
}

/// `@count(relation: "posts")`: number of related rows per parent.
pub struct CountDirective {
    node: DirectiveNode,
    args: CountArgs,
}

impl DefinedDirective for CountDirective {
    const DEFINITION: &'static str = r#"
"""
Returns the count of a relation of the parent model.
"""
directive @count(
  """
  The relation to count.
  """
  relation: String!
) on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for CountDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }
}

impl FieldResolverDirective for CountDirective {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let relation = self.args.relation.clone();
        let model = Arc::new(related_parent(field, &relation, cx)?);
        let arg_builders = field.arg_builders().clone();
        let alias = count_alias(&relation);

        Ok(Arc::new(move |params: ResolveParams| {
            let model = Arc::clone(&model);
            let relation = relation.clone();
            let alias = alias.clone();
            let decorate = arg_builders.decorator(&params.args);
            Box::pin(async move {
                let Value::Object(parent) = &params.parent else {
                    return Ok(Value::Null.into());
                };
                if decorate.is_none() {
                    if let Some(count) = parent.get(&alias) {
                        return Ok(count.clone().into());
                    }
                }
                let parent = parent.clone();
                let loader = CountModelsLoader::new(relation, RelationMeta::decorated(decorate));
                defer(&params, &model, parent, || loader).await
            })
        }))
    }
}

#[derive(Debug, Deserialize)]
struct AggregateArgs {
    relation: String,
    column: String,
    function: AggregateFunction,
}

/// `@aggregate(relation: "posts", column: "votes", function: SUM)`.
pub struct AggregateDirective {
    node: DirectiveNode,
    args: AggregateArgs,
}

impl DefinedDirective for AggregateDirective {
    const DEFINITION: &'static str = r#"
"""
Returns an aggregate of a column over a relation of the parent model.
"""
directive @aggregate(
  """
  The relation to aggregate.
  """
  relation: String!
  """
  The column of the related model to aggregate.
  """
  column: String!
  """
  The aggregate function to apply.
  """
  function: AggregateFunction!
) on FIELD_DEFINITION

"""
Aggregate functions of `@aggregate`.
"""
enum AggregateFunction {
  "Average."
  AVG
  "Count."
  COUNT
  "Minimum."
  MIN
  "Maximum."
  MAX
  "Sum."
  SUM
}
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for AggregateDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }
}

impl FieldResolverDirective for AggregateDirective {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let AggregateArgs {
            relation,
            column,
            function,
        } = &self.args;
        let model = Arc::new(related_parent(field, relation, cx)?);
        let arg_builders = field.arg_builders().clone();
        let alias = aggregate_alias(relation, *function, column);
        let (relation, column, function) = (relation.clone(), column.clone(), *function);

        Ok(Arc::new(move |params: ResolveParams| {
            let model = Arc::clone(&model);
            let loader = AggregateModelsLoader::new(
                relation.clone(),
                function,
                column.clone(),
                RelationMeta::decorated(arg_builders.decorator(&params.args)),
            );
            let preloaded = arg_builders.is_empty().then(|| alias.clone());
            Box::pin(async move {
                let Value::Object(parent) = &params.parent else {
                    return Ok(Value::Null.into());
                };
                if let Some(value) = preloaded.and_then(|alias| parent.get(&alias).cloned()) {
                    return Ok(value.into());
                }
                let parent = parent.clone();
                defer(&params, &model, parent, || loader).await
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregate_function_is_parsed() {
        let node = DirectiveNode::new("aggregate")
            .with_argument("relation", json!("posts"))
            .with_argument("column", json!("votes"))
            .with_argument("function", json!("MAX"));
        let directive = AggregateDirective::from_node(node).unwrap();
        assert_eq!(directive.args.function, AggregateFunction::Max);

        let node = DirectiveNode::new("aggregate")
            .with_argument("relation", json!("posts"))
            .with_argument("column", json!("votes"))
            .with_argument("function", json!("MEDIAN"));
        assert!(AggregateDirective::from_node(node).is_err());
    }

    #[test]
    fn test_count_requires_relation() {
        assert!(CountDirective::from_node(DirectiveNode::new("count")).is_err());
    }
}
