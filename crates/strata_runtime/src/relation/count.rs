use super::aggregate::load_aggregate;
use super::{ModelsLoader, RelationMeta};
use crate::error::ResolverError;
use crate::namespace::snake_case;
use crate::store::{AggregateFunction, DataStore, Model, ModelCatalog, Row};
use async_trait::async_trait;
use serde_json::Value;

/// Attribute name of a relation count: `{relation}_count`.
pub fn count_alias(relation: &str) -> String {
    format!("{}_count", snake_case(relation))
}

/// Counts related models per parent with one aggregate select.
#[derive(Debug, Clone)]
pub struct CountModelsLoader {
    relation: String,
    alias: String,
    meta: RelationMeta,
}

impl CountModelsLoader {
    pub fn new(relation: impl Into<String>, meta: RelationMeta) -> Self {
        let relation = relation.into();
        Self {
            alias: count_alias(&relation),
            relation,
            meta,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

#[async_trait]
impl ModelsLoader for CountModelsLoader {
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
            AggregateFunction::Count,
            None,
            &self.alias,
            &self.meta,
        )
        .await?;
        for parent in parents.iter_mut() {
            if let Some(count) = parent.get_mut(&self.alias).filter(|v| v.is_null()) {
                *count = Value::from(0);
            }
        }
        Ok(())
    }

    fn extract(&self, parent: &Row) -> Value {
        parent
            .get(&self.alias)
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{blog, rows};
    use super::super::QueryDecorator;
    use super::*;
    use crate::store::{Condition, Operator, Select};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counts_every_parent_in_one_statement() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);

        let loader = CountModelsLoader::new("posts", RelationMeta::default());
        loader.load(&store, &catalog, &model, &mut users).await.unwrap();

        let counts: Vec<Value> = users.iter().map(|u| loader.extract(u)).collect();
        assert_eq!(counts, vec![json!(3), json!(1), json!(0)]);
        assert_eq!(users[0]["posts_count"], json!(3));
        assert_eq!(store.statement_count().await, 1);
    }

    #[tokio::test]
    async fn test_decorator_constrains_the_count() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![json!({"id": 1})]);

        let decorate: QueryDecorator = Arc::new(|select: &mut Select| {
            select.push_condition(Condition::new("votes", Operator::Gte, json!(3)));
        });
        let loader = CountModelsLoader::new("posts", RelationMeta::decorated(Some(decorate)));
        loader.load(&store, &catalog, &model, &mut users).await.unwrap();
        assert_eq!(loader.extract(&users[0]), json!(2));
    }

    #[test]
    fn test_extract_defaults_to_zero() {
        let loader = CountModelsLoader::new("blogPosts", RelationMeta::default());
        assert_eq!(loader.alias(), "blog_posts_count");
        assert_eq!(loader.extract(&Row::new()), json!(0));
    }
}
