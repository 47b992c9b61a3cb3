use super::aggregate::load_aggregate;
use super::{attach, count_alias, load_default_relations, ModelsLoader, RelationMeta};
use crate::error::ResolverError;
use crate::store::{
    tag_rows, AggregateFunction, Constraint, DataStore, Model, ModelCatalog, Row, Select,
    Statement,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Page size and 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationArgs {
    pub first: u64,
    pub page: u64,
}

impl PaginationArgs {
    pub fn new(first: u64, page: u64) -> Self {
        Self {
            first,
            page: page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.first)
    }

    /// Builds the paginator object for one parent.
    pub fn paginator(&self, data: Vec<Value>, total: u64) -> Value {
        let count = data.len() as u64;
        let offset = self.offset();
        let last_page = total.div_ceil(self.first.max(1)).max(1);
        let (first_item, last_item) = if count == 0 {
            (Value::Null, Value::Null)
        } else {
            (json!(offset + 1), json!(offset + count))
        };
        json!({
            "data": data,
            "paginatorInfo": {
                "count": count,
                "currentPage": self.page,
                "firstItem": first_item,
                "hasMorePages": self.page.saturating_mul(self.first) < total,
                "lastItem": last_item,
                "lastPage": last_page,
                "perPage": self.first,
                "total": total,
            }
        })
    }
}

/// Loads one page of a relation for every parent.
///
/// Totals come from one aggregate select; the pages themselves from one
/// `UNION ALL` of per-parent selects, so the whole batch costs two
/// statements plus whatever default relations the related model declares.
#[derive(Debug, Clone)]
pub struct PaginatedModelsLoader {
    relation: String,
    pagination: PaginationArgs,
    meta: RelationMeta,
}

impl PaginatedModelsLoader {
    pub fn new(relation: impl Into<String>, pagination: PaginationArgs, meta: RelationMeta) -> Self {
        Self {
            relation: relation.into(),
            pagination,
            meta,
        }
    }
}

#[async_trait]
impl ModelsLoader for PaginatedModelsLoader {
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
        let alias = count_alias(&self.relation);
        load_aggregate(
            store,
            catalog,
            model,
            parents,
            &self.relation,
            AggregateFunction::Count,
            None,
            &alias,
            &self.meta,
        )
        .await?;

        let (rel, related) = catalog.relation(&model.name, &self.relation)?;
        let selects: Vec<Select> = parents
            .iter()
            .filter_map(|parent| parent.get(rel.link.parent_column()))
            .filter(|value| !value.is_null())
            .map(|value| {
                let mut select = Select::new(&related.table)
                    .constrain(Constraint {
                        link: rel.link.clone(),
                        parent_values: vec![value.clone()],
                    })
                    .limit(self.pagination.first)
                    .offset(self.pagination.offset());
                self.meta.apply(&mut select);
                select
            })
            .collect();

        let mut rows = if selects.is_empty() {
            Vec::new()
        } else {
            tracing::debug!(pages = selects.len(), relation = %self.relation, "loading paginated relation");
            store.execute(&Statement::UnionAll(selects)).await?
        };
        tag_rows(&mut rows, &related.name);
        if !rows.is_empty() {
            load_default_relations(store, catalog, related, &mut rows, None).await?;
        }
        attach(parents, rows, &self.relation, true, &rel.link);

        for parent in parents.iter_mut() {
            let total = parent.get(&alias).and_then(Value::as_u64).unwrap_or(0);
            let data = match parent.remove(&self.relation) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            parent.insert(self.relation.clone(), self.pagination.paginator(data, total));
        }
        Ok(())
    }

    fn extract(&self, parent: &Row) -> Value {
        parent
            .get(&self.relation)
            .cloned()
            .unwrap_or_else(|| self.pagination.paginator(Vec::new(), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{blog, rows};
    use super::*;

    #[tokio::test]
    async fn test_pages_every_parent_in_two_statements() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);

        let loader = PaginatedModelsLoader::new(
            "posts",
            PaginationArgs::new(2, 1),
            RelationMeta::default(),
        );
        loader.load(&store, &catalog, &model, &mut users).await.unwrap();

        let first = loader.extract(&users[0]);
        assert_eq!(first["data"].as_array().unwrap().len(), 2);
        assert_eq!(first["data"][0]["id"], json!(10));
        assert_eq!(first["paginatorInfo"]["total"], json!(3));
        assert_eq!(first["paginatorInfo"]["hasMorePages"], json!(true));
        assert_eq!(first["paginatorInfo"]["lastPage"], json!(2));

        let second = loader.extract(&users[1]);
        assert_eq!(second["data"].as_array().unwrap().len(), 1);
        assert_eq!(second["paginatorInfo"]["total"], json!(1));
        assert_eq!(second["paginatorInfo"]["hasMorePages"], json!(false));

        let third = loader.extract(&users[2]);
        assert_eq!(third["data"], json!([]));
        assert_eq!(third["paginatorInfo"]["firstItem"], Value::Null);

        let statements = store.statements().await;
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].kind(), "union_all");
    }

    #[tokio::test]
    async fn test_second_page_offsets() {
        let (store, catalog) = blog();
        let model = catalog.model("User").unwrap().clone();
        let mut users = rows(vec![json!({"id": 1})]);

        let loader = PaginatedModelsLoader::new(
            "posts",
            PaginationArgs::new(2, 2),
            RelationMeta::default(),
        );
        loader.load(&store, &catalog, &model, &mut users).await.unwrap();

        let page = loader.extract(&users[0]);
        assert_eq!(page["data"][0]["id"], json!(12));
        assert_eq!(page["paginatorInfo"]["firstItem"], json!(3));
        assert_eq!(page["paginatorInfo"]["lastItem"], json!(3));
        assert_eq!(page["paginatorInfo"]["currentPage"], json!(2));
    }

    #[test]
    fn test_paginator_for_empty_total() {
        let info = PaginationArgs::new(10, 0).paginator(Vec::new(), 0);
        assert_eq!(info["paginatorInfo"]["currentPage"], json!(1));
        assert_eq!(info["paginatorInfo"]["lastPage"], json!(1));
        assert_eq!(info["paginatorInfo"]["total"], json!(0));
    }
}
