use super::{ModelsLoader, RelationMeta};
use crate::error::ResolverError;
use crate::namespace::snake_case;
use crate::store::{
    key_string, AggregateFunction, Condition, DataStore, Model, ModelCatalog, Operator,
    RelationAggregate, Row, Select,
};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Attribute name of an aggregate: `{relation}_{function}_{column}`.
pub fn aggregate_alias(relation: &str, function: AggregateFunction, column: &str) -> String {
    format!(
        "{}_{}_{}",
        snake_case(relation),
        function.as_str(),
        snake_case(column)
    )
}

/// Loads an aggregate over `relation` onto every parent.
///
/// The parents' table is re-read selecting only the primary key and the
/// aggregate; the aggregate is then copied onto the original rows so their
/// other attributes are preserved.
pub(crate) async fn load_aggregate(
    store: &dyn DataStore,
    catalog: &ModelCatalog,
    model: &Model,
    parents: &mut [Row],
    relation: &str,
    function: AggregateFunction,
    column: Option<&str>,
    alias: &str,
    meta: &RelationMeta,
) -> Result<(), ResolverError> {
    let keys = super::distinct_values(parents, &model.primary_key);
    if keys.is_empty() {
        return Ok(());
    }
    let (rel, related) = catalog.relation(&model.name, relation)?;

    let mut constraints = Select::new(&related.table);
    meta.apply(&mut constraints);

    let select = Select::new(&model.table)
        .columns([model.primary_key.as_str()])
        .filter(Condition::new(
            &model.primary_key,
            Operator::In,
            Value::Array(keys),
        ))
        .aggregate(RelationAggregate {
            alias: alias.to_string(),
            function,
            column: column.map(str::to_string),
            related_table: related.table.clone(),
            link: rel.link.clone(),
            conditions: constraints.conditions,
        });

    tracing::debug!(parents = parents.len(), alias, "loading relation aggregate");
    let reloaded = store.execute(&select.into()).await?;
    let values: FxHashMap<String, Value> = reloaded
        .into_iter()
        .filter_map(|mut row| {
            let key = model.key_of(&row).map(key_string)?;
            Some((key, row.remove(alias).unwrap_or(Value::Null)))
        })
        .collect();

    for parent in parents.iter_mut() {
        let value = model
            .key_of(parent)
            .and_then(|key| values.get(&key_string(key)))
            .cloned()
            .unwrap_or(Value::Null);
        parent.insert(alias.to_string(), value);
    }
    Ok(())
}

/// Loads `min`, `max`, `avg` or `sum` of a related column.
#[derive(Debug, Clone)]
pub struct AggregateModelsLoader {
    relation: String,
    function: AggregateFunction,
    column: String,
    alias: String,
    meta: RelationMeta,
}

impl AggregateModelsLoader {
    pub fn new(
        relation: impl Into<String>,
        function: AggregateFunction,
        column: impl Into<String>,
        meta: RelationMeta,
    ) -> Self {
        let relation = relation.into();
        let column = column.into();
        Self {
            alias: aggregate_alias(&relation, function, &column),
            relation,
            function,
            column,
            meta,
        }
    }
}

#[async_trait]
impl ModelsLoader for AggregateModelsLoader {
    async fn load(
        &self,
        store: &dyn DataStore,
        catalog: &ModelCatalog,
        model: &Model,
        parents: &mut [Row],
    ) -> Result<(), ResolverError> {
        load_aggregate(
            store,
            catalog,
            model,
            parents,
            &self.relation,
            self.function,
            Some(&self.column),
            &self.alias,
            &self.meta,
        )
        .await
    }

    fn extract(&self, parent: &Row) -> Value {
        parent.get(&self.alias).cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{blog, rows};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_convention() {
        assert_eq!(
            aggregate_alias("blogPosts", AggregateFunction::Avg, "readTime"),
            "blog_posts_avg_read_time"
        );
    }

    #[tokio::test]
    async fn test_sum_and_max() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![
            json!({"id": 1, "name": "ada"}),
            json!({"id": 2, "name": "bob"}),
            json!({"id": 3, "name": "cyd"}),
        ]);

        let meta = RelationMeta::default();
        let sum = AggregateModelsLoader::new("posts", AggregateFunction::Sum, "votes", meta.clone());
        sum.load(&store, &catalog, &model, &mut users).await.unwrap();
        let max = AggregateModelsLoader::new("posts", AggregateFunction::Max, "votes", meta);
        max.load(&store, &catalog, &model, &mut users).await.unwrap();

        assert_eq!(sum.extract(&users[0]), json!(9));
        assert_eq!(sum.extract(&users[1]), json!(7));
        assert_eq!(sum.extract(&users[2]), Value::Null);
        assert_eq!(max.extract(&users[0]), json!(5));
        assert_eq!(max.extract(&users[2]), Value::Null);
        assert_eq!(users[0]["name"], json!("ada"));
        assert_eq!(store.statement_count().await, 2);
    }
}
