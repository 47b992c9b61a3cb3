//! Relation fetchers.
//!
//! Each fetcher receives every parent row collected by a batch loader,
//! performs one consolidated fetch against the [`DataStore`] and writes the
//! result back onto the parent rows, from which it is extracted per parent.

mod aggregate;
mod count;
mod paginated;
mod simple;

pub use aggregate::{aggregate_alias, AggregateModelsLoader};
pub use count::{count_alias, CountModelsLoader};
pub use paginated::{PaginatedModelsLoader, PaginationArgs};
pub use simple::SimpleModelsLoader;

use crate::batch::BatchResolve;
use crate::error::ResolverError;
use crate::store::{
    key_string, tag_rows, Constraint, DataStore, Link, Model, ModelCatalog, Row, Select,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Customizes the select built for a relation, e.g. with argument filters.
pub type QueryDecorator = Arc<dyn Fn(&mut Select) + Send + Sync>;

/// Per-field information a relation fetch needs besides the parents.
#[derive(Clone, Default)]
pub struct RelationMeta {
    pub decorate: Option<QueryDecorator>,
    pub pagination: Option<PaginationArgs>,
}

impl RelationMeta {
    pub fn decorated(decorate: Option<QueryDecorator>) -> Self {
        Self {
            decorate,
            pagination: None,
        }
    }

    pub(crate) fn apply(&self, select: &mut Select) {
        apply_decorator(self.decorate.as_ref(), select);
    }
}

impl std::fmt::Debug for RelationMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationMeta")
            .field("decorated", &self.decorate.is_some())
            .field("pagination", &self.pagination)
            .finish()
    }
}

pub(crate) fn apply_decorator(decorate: Option<&QueryDecorator>, select: &mut Select) {
    if let Some(decorate) = decorate {
        decorate(select);
    }
}

/// Loads something onto a set of parent rows, then extracts it per parent.
#[async_trait]
pub trait ModelsLoader: Send + Sync + 'static {
    async fn load(
        &self,
        store: &dyn DataStore,
        catalog: &ModelCatalog,
        model: &Model,
        parents: &mut [Row],
    ) -> Result<(), ResolverError>;

    fn extract(&self, parent: &Row) -> Value;
}

/// Adapts a [`ModelsLoader`] to the batch loader: keys are parent primary
/// keys, metas are the parent rows.
pub struct RelationBatchLoader<L> {
    loader: L,
    store: Arc<dyn DataStore>,
    catalog: Arc<ModelCatalog>,
    model: String,
}

impl<L: ModelsLoader> RelationBatchLoader<L> {
    pub fn new(
        loader: L,
        store: Arc<dyn DataStore>,
        catalog: Arc<ModelCatalog>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            store,
            catalog,
            model: model.into(),
        }
    }
}

#[async_trait]
impl<L: ModelsLoader> BatchResolve for RelationBatchLoader<L> {
    type Key = String;
    type Meta = Row;

    async fn resolve(
        &self,
        entries: IndexMap<String, Row>,
    ) -> Result<HashMap<String, Value>, ResolverError> {
        let model = self.catalog.model(&self.model)?;
        let (keys, mut parents): (Vec<String>, Vec<Row>) = entries.into_iter().unzip();
        self.loader
            .load(self.store.as_ref(), &self.catalog, model, &mut parents)
            .await?;
        Ok(keys
            .into_iter()
            .zip(parents.iter())
            .map(|(key, parent)| (key, self.loader.extract(parent)))
            .collect())
    }
}

/// Identity of a parent row inside a batch.
pub fn parent_key(model: &Model, parent: &Row) -> String {
    match model.key_of(parent) {
        Some(key) => key_string(key),
        None => Value::Object(parent.clone()).to_string(),
    }
}

/// Distinct non-null values of `column` across `rows`.
pub(crate) fn distinct_values(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = FxHashSet::default();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null() && seen.insert(key_string(value)))
        .cloned()
        .collect()
}

type EagerLoad<'a> = Pin<Box<dyn Future<Output = Result<(), ResolverError>> + Send + 'a>>;

/// Eager loads `relation` (dotted for nested relations) onto `parents` with
/// one select per relation segment.
///
/// With `load_defaults`, the related model's own default relations are
/// loaded as well, without recursing into their defaults.
pub(crate) fn eager_load<'a>(
    store: &'a dyn DataStore,
    catalog: &'a ModelCatalog,
    model: &'a Model,
    parents: &'a mut [Row],
    relation: &'a str,
    decorate: Option<&'a QueryDecorator>,
    load_defaults: bool,
) -> EagerLoad<'a> {
    Box::pin(async move {
        let (head, tail) = match relation.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (relation, None),
        };
        let (rel, related) = catalog.relation(&model.name, head)?;

        let parent_values = distinct_values(parents, rel.link.parent_column());
        let mut rows = if parent_values.is_empty() {
            Vec::new()
        } else {
            let mut select = Select::new(&related.table).constrain(Constraint {
                link: rel.link.clone(),
                parent_values,
            });
            if tail.is_none() {
                apply_decorator(decorate, &mut select);
            }
            tracing::debug!(relation = head, table = %related.table, "eager loading relation");
            let mut rows = store.execute(&select.into()).await?;
            tag_rows(&mut rows, &related.name);
            rows
        };

        if !rows.is_empty() {
            if let Some(tail) = tail {
                eager_load(store, catalog, related, &mut rows, tail, decorate, load_defaults).await?;
            }
            if load_defaults {
                load_default_relations(store, catalog, related, &mut rows, tail).await?;
            }
        }

        attach(parents, rows, head, rel.kind.is_many(), &rel.link);
        Ok(())
    })
}

/// Loads `model.with` onto freshly fetched rows, skipping relations that
/// are already present.
pub(crate) async fn load_default_relations(
    store: &dyn DataStore,
    catalog: &ModelCatalog,
    model: &Model,
    rows: &mut [Row],
    already_loaded: Option<&str>,
) -> Result<(), ResolverError> {
    for default in &model.with {
        let loaded = already_loaded
            .is_some_and(|path| path.split('.').next() == Some(default.as_str()));
        if !loaded {
            eager_load(store, catalog, model, rows, default, None, false).await?;
        }
    }
    Ok(())
}

/// Distributes related rows onto their parents by the link's key columns.
pub(crate) fn attach(
    parents: &mut [Row],
    rows: Vec<Row>,
    attribute: &str,
    many: bool,
    link: &Link,
) {
    let related_column = link.related_column();
    let mut groups: IndexMap<String, Vec<Row>> = IndexMap::new();
    for mut row in rows {
        let key = row.get(&related_column).map(key_string);
        if related_column.starts_with("pivot_") {
            row.remove(&related_column);
        }
        if let Some(key) = key {
            groups.entry(key).or_default().push(row);
        }
    }

    for parent in parents.iter_mut() {
        let matched = parent
            .get(link.parent_column())
            .filter(|v| !v.is_null())
            .and_then(|v| groups.get(&key_string(v)));
        let value = if many {
            Value::Array(
                matched
                    .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default(),
            )
        } else {
            matched
                .and_then(|rows| rows.first())
                .cloned()
                .map_or(Value::Null, Value::Object)
        };
        parent.insert(attribute.to_string(), value);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::store::{MemoryStore, Model, ModelCatalog};
    use serde_json::json;

    /// User 1 has three posts, user 2 has one, user 3 has none.
    pub fn blog() -> (MemoryStore, ModelCatalog) {
        let store = MemoryStore::new()
            .with_table(
                "users",
                vec![
                    json!({"id": 1, "name": "ada"}),
                    json!({"id": 2, "name": "bob"}),
                    json!({"id": 3, "name": "cyd"}),
                ],
            )
            .with_table(
                "posts",
                vec![
                    json!({"id": 10, "user_id": 1, "title": "a", "votes": 3}),
                    json!({"id": 11, "user_id": 1, "title": "b", "votes": 5}),
                    json!({"id": 12, "user_id": 1, "title": "c", "votes": 1}),
                    json!({"id": 13, "user_id": 2, "title": "d", "votes": 7}),
                ],
            )
            .with_table(
                "comments",
                vec![
                    json!({"id": 100, "post_id": 10, "body": "nice"}),
                    json!({"id": 101, "post_id": 13, "body": "meh"}),
                ],
            );
        let catalog = ModelCatalog::new()
            .with_model(Model::new("User", "users").has_many("posts", "Post", "user_id"))
            .with_model(
                Model::new("Post", "posts")
                    .belongs_to("author", "User", "user_id")
                    .has_many("comments", "Comment", "post_id"),
            )
            .with_model(Model::new("Comment", "comments"));
        (store, catalog)
    }

    pub fn rows(values: Vec<serde_json::Value>) -> Vec<crate::store::Row> {
        values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{blog, rows};
    use super::*;
    use crate::batch::BatchLoader;
    use serde_json::json;

    #[tokio::test]
    async fn test_relation_batch_loader_keys_by_primary_key() {
        let (store, catalog) = blog();
        let store: Arc<dyn DataStore> = Arc::new(store);
        let catalog = Arc::new(catalog);
        let loader = Arc::new(BatchLoader::new(RelationBatchLoader::new(
            SimpleModelsLoader::new("posts", RelationMeta::default()),
            Arc::clone(&store),
            Arc::clone(&catalog),
            "User",
        )));

        let users = rows(vec![json!({"id": 2}), json!({"id": 1})]);
        let model = catalog.model("User").unwrap();
        let mut deferred = Vec::new();
        for user in users {
            deferred.push(loader.load(parent_key(model, &user), user).await);
        }
        let mut titles = Vec::new();
        for value in deferred {
            let posts = value.force().await.unwrap();
            titles.push(
                posts
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|p| p["title"].clone())
                    .collect::<Vec<_>>(),
            );
        }
        assert_eq!(titles, vec![vec![json!("d")], vec![json!("a"), json!("b"), json!("c")]]);
        assert_eq!(loader.resolve_count(), 1);
    }

    #[tokio::test]
    async fn test_attach_single_and_missing() {
        let mut parents = rows(vec![json!({"id": 1, "user_id": 2}), json!({"id": 2, "user_id": null})]);
        let link = Link::Owner {
            owner_key: "id".into(),
            foreign_key: "user_id".into(),
        };
        attach(&mut parents, rows(vec![json!({"id": 2, "name": "bob"})]), "author", false, &link);
        assert_eq!(parents[0]["author"]["name"], json!("bob"));
        assert_eq!(parents[1]["author"], Value::Null);
    }
}
