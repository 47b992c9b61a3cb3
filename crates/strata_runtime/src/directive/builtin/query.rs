use crate::directive::{DefinedDirective, Directive, DirectiveNode, FieldResolverDirective};
use crate::error::{ResolverError, SchemaError};
use crate::node::{ArgBuilders, FieldValue};
use crate::relation::load_default_relations;
use crate::resolver::{FieldResolverFn, ResolveParams, ResolvedValue};
use crate::schema::BuildContext;
use crate::store::{tag_rows, Model, Row, Select};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelArgs {
    model: Option<String>,
}

/// The model a root query field reads: the `model` argument, else the
/// return type's name.
fn target_model(
    args: &ModelArgs,
    field: &FieldValue,
    cx: &BuildContext,
) -> Result<Model, SchemaError> {
    let name = args.model.as_deref().unwrap_or(field.return_type_name());
    cx.catalog.model(name).cloned()
}

/// Runs a filtered select over the model's table and loads its default
/// relations.
async fn fetch(
    params: &ResolveParams,
    model: &Model,
    arg_builders: &ArgBuilders,
) -> Result<Vec<Row>, ResolverError> {
    let store = params.context.store();
    let catalog = params.context.catalog();
    let mut select = Select::new(&model.table);
    arg_builders.apply(&mut select, &params.args);
    let mut rows = store.execute(&select.into()).await?;
    tag_rows(&mut rows, &model.name);
    load_default_relations(store.as_ref(), &catalog, model, &mut rows, None).await?;
    tracing::debug!(model = %model.name, rows = rows.len(), "fetched root rows");
    Ok(rows)
}

fn query_resolver<F>(model: Model, arg_builders: ArgBuilders, finish: F) -> FieldResolverFn
where
    F: Fn(Vec<Row>) -> Result<Value, ResolverError> + Send + Sync + 'static,
{
    let shared = Arc::new((model, arg_builders, finish));
    Arc::new(move |params: ResolveParams| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let (model, arg_builders, finish) = &*shared;
            let rows = fetch(&params, model, arg_builders).await?;
            finish(rows).map(ResolvedValue::Value)
        })
    })
}

// =============================================================================
// @all
// =============================================================================

/// `@all`: every row of a model, filtered by the field's argument
/// directives.
pub struct AllDirective {
    node: DirectiveNode,
    args: ModelArgs,
}

impl DefinedDirective for AllDirective {
    const DEFINITION: &'static str = r#"
"""
Fetch all rows of a model, filtered by the arguments' query directives.
"""
directive @all(
  """
  The model to query, if it differs from the return type.
  """
  model: String
) on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for AllDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }
}

impl FieldResolverDirective for AllDirective {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let model = target_model(&self.args, field, cx)?;
        Ok(query_resolver(model, field.arg_builders().clone(), |rows| {
            Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
        }))
    }
}

// =============================================================================
// @find
// =============================================================================

/// `@find`: the single row matching the field's argument directives.
pub struct FindDirective {
    node: DirectiveNode,
    args: ModelArgs,
}

impl DefinedDirective for FindDirective {
    const DEFINITION: &'static str = r#"
"""
Find a single row of a model by the arguments' query directives.
"""
directive @find(
  """
  The model to query, if it differs from the return type.
  """
  model: String
) on FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args = node.parse_args()?;
        Ok(Self { node, args })
    }
}

impl Directive for FindDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }
}

impl FieldResolverDirective for FindDirective {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let model = target_model(&self.args, field, cx)?;
        Ok(query_resolver(model, field.arg_builders().clone(), single_row))
    }
}

fn single_row(mut rows: Vec<Row>) -> Result<Value, ResolverError> {
    if rows.len() > 1 {
        return Err(ResolverError::custom(
            "The query returned more than one result.",
        ));
    }
    Ok(rows.pop().map_or(Value::Null, Value::Object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_row() {
        assert_eq!(single_row(Vec::new()).unwrap(), Value::Null);

        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        assert_eq!(single_row(vec![row.clone()]).unwrap(), json!({"id": 1}));

        let error = single_row(vec![row.clone(), row]).unwrap_err();
        assert_eq!(error.to_string(), "The query returned more than one result.");
    }
}
