use super::{eager_load, ModelsLoader, RelationMeta};
use crate::error::ResolverError;
use crate::store::{DataStore, Model, ModelCatalog, Row};
use async_trait::async_trait;
use serde_json::Value;

/// Eager loads a relation across all parents in one select.
///
/// Dotted names load nested relations; the value extracted per parent is the
/// first segment.
#[derive(Debug, Clone)]
pub struct SimpleModelsLoader {
    relation: String,
    meta: RelationMeta,
}

impl SimpleModelsLoader {
    pub fn new(relation: impl Into<String>, meta: RelationMeta) -> Self {
        Self {
            relation: relation.into(),
            meta,
        }
    }

    fn attribute(&self) -> &str {
        self.relation
            .split('.')
            .next()
            .unwrap_or(self.relation.as_str())
    }
}

#[async_trait]
impl ModelsLoader for SimpleModelsLoader {
    async fn load(
        &self,
        store: &dyn DataStore,
        catalog: &ModelCatalog,
        model: &Model,
        parents: &mut [Row],
    ) -> Result<(), ResolverError> {
        if parents.is_empty() {
            return Ok(());
        }
        eager_load(
            store,
            catalog,
            model,
            parents,
            &self.relation,
            self.meta.decorate.as_ref(),
            true,
        )
        .await
    }

    fn extract(&self, parent: &Row) -> Value {
        parent.get(self.attribute()).cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{blog, rows};
    use super::*;
    use crate::store::{Condition, Operator, Select};
    use serde_json::json;
    use std::sync::Arc;

    fn ids(value: &Value) -> Vec<i64> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(|i| i["id"].as_i64()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_one_select_for_all_parents() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);

        let loader = SimpleModelsLoader::new("posts", RelationMeta::default());
        loader.load(&store, &catalog, &model, &mut users).await.unwrap();

        assert_eq!(ids(&loader.extract(&users[0])), vec![10, 11, 12]);
        assert_eq!(ids(&loader.extract(&users[1])), vec![13]);
        assert_eq!(ids(&loader.extract(&users[2])), Vec::<i64>::new());
        assert_eq!(store.statement_count().await, 1);
        assert_eq!(users[0]["posts"][0]["__model"], json!("Post"));
    }

    #[tokio::test]
    async fn test_nested_relation_and_decorator() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![json!({"id": 1}), json!({"id": 2})]);

        let decorate: super::super::QueryDecorator = Arc::new(|select: &mut Select| {
            select.push_condition(Condition::new("body", Operator::Neq, json!("meh")));
        });
        let loader = SimpleModelsLoader::new("posts.comments", RelationMeta::decorated(Some(decorate)));
        loader.load(&store, &catalog, &model, &mut users).await.unwrap();

        let posts = loader.extract(&users[0]);
        assert_eq!(ids(&posts[0]["comments"]), vec![100]);
        let posts = loader.extract(&users[1]);
        assert_eq!(ids(&posts[0]["comments"]), Vec::<i64>::new());
        assert_eq!(store.statement_count().await, 2);
    }

    #[tokio::test]
    async fn test_belongs_to_relation() {
        let (store, catalog) = blog();
        let model = catalog.model("Post").unwrap().clone();
        let mut posts = rows(vec![json!({"id": 10, "user_id": 1}), json!({"id": 13, "user_id": 2})]);

        let loader = SimpleModelsLoader::new("author", RelationMeta::default());
        loader.load(&store, &catalog, &model, &mut posts).await.unwrap();
        assert_eq!(loader.extract(&posts[0])["name"], json!("ada"));
        assert_eq!(loader.extract(&posts[1])["name"], json!("bob"));
    }

    #[tokio::test]
    async fn test_empty_parent_set_is_a_no_op() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let loader = SimpleModelsLoader::new("posts", RelationMeta::default());
        loader.load(&store, &catalog, &model, &mut []).await.unwrap();
        assert_eq!(store.statement_count().await, 0);
    }
}
