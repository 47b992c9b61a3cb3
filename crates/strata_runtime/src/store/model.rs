//! Model catalog: tables, primary keys and named relations.

use super::query::Link;
use super::{Row, MODEL_KEY};
use crate::error::SchemaError;
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
}

impl RelationKind {
    /// Whether the relation yields a list of rows.
    #[must_use]
    pub const fn is_many(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }
}

/// A named relation from one model to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    /// Name of the related model.
    pub related: String,
    pub link: Link,
}

/// A model backed by one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    /// Relations eager loaded whenever rows of this model are fetched.
    pub with: Vec<String>,
    pub relations: IndexMap<String, Relation>,
}

impl Model {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            with: Vec::new(),
            relations: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Relations to eager load by default.
    #[must_use]
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with = relations.into_iter().map(Into::into).collect();
        self
    }

    /// `related.foreign_key` points at this model's primary key.
    #[must_use]
    pub fn has_one(self, name: &str, related: &str, foreign_key: &str) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationKind::HasOne,
            related,
            Link::Foreign {
                foreign_key: foreign_key.to_string(),
                local_key,
            },
        )
    }

    #[must_use]
    pub fn has_many(self, name: &str, related: &str, foreign_key: &str) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationKind::HasMany,
            related,
            Link::Foreign {
                foreign_key: foreign_key.to_string(),
                local_key,
            },
        )
    }

    /// This model's `foreign_key` points at the related model's `id`.
    #[must_use]
    pub fn belongs_to(self, name: &str, related: &str, foreign_key: &str) -> Self {
        self.relation(
            name,
            RelationKind::BelongsTo,
            related,
            Link::Owner {
                owner_key: "id".to_string(),
                foreign_key: foreign_key.to_string(),
            },
        )
    }

    #[must_use]
    pub fn belongs_to_many(
        self,
        name: &str,
        related: &str,
        pivot_table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
    ) -> Self {
        let parent_key = self.primary_key.clone();
        self.relation(
            name,
            RelationKind::BelongsToMany,
            related,
            Link::Pivot {
                table: pivot_table.to_string(),
                foreign_pivot_key: foreign_pivot_key.to_string(),
                related_pivot_key: related_pivot_key.to_string(),
                parent_key,
                related_key: "id".to_string(),
            },
        )
    }

    /// Adds a relation with an explicit link.
    #[must_use]
    pub fn relation(mut self, name: &str, kind: RelationKind, related: &str, link: Link) -> Self {
        self.relations.insert(
            name.to_string(),
            Relation {
                name: name.to_string(),
                kind,
                related: related.to_string(),
                link,
            },
        );
        self
    }

    #[must_use]
    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Primary key value of a row of this model.
    #[must_use]
    pub fn key_of<'a>(&self, row: &'a Row) -> Option<&'a Value> {
        row.get(&self.primary_key).filter(|v| !v.is_null())
    }
}

/// All models known to the runtime.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: IndexMap<String, Model>,
}

impl ModelCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_model(mut self, model: Model) -> Self {
        self.register(model);
        self
    }

    pub fn register(&mut self, model: Model) {
        self.models.insert(model.name.clone(), model);
    }

    /// Finds a model by name. Qualified names (`App.Models.User`) match on
    /// their basename.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models
            .get(name)
            .or_else(|| self.models.get(basename(name)))
    }

    /// Like [`get`](Self::get), failing with a configuration error.
    pub fn model(&self, name: &str) -> Result<&Model, SchemaError> {
        self.get(name).ok_or_else(|| SchemaError::UnknownModel {
            name: name.to_string(),
        })
    }

    /// Resolves a relation together with the related model.
    pub fn relation(&self, model: &str, relation: &str) -> Result<(&Relation, &Model), SchemaError> {
        let parent = self.model(model)?;
        let rel = parent
            .get_relation(relation)
            .ok_or_else(|| SchemaError::UnknownRelation {
                model: parent.name.clone(),
                relation: relation.to_string(),
            })?;
        let related = self.model(&rel.related)?;
        Ok((rel, related))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Tags fetched rows with the model they belong to.
pub(crate) fn tag_rows(rows: &mut [Row], model: &str) {
    for row in rows {
        row.insert(MODEL_KEY.to_string(), Value::String(model.to_string()));
    }
}

/// Last segment of a `.` or `\` separated class name.
#[must_use]
pub fn basename(name: &str) -> &str {
    name.rsplit(['.', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModelCatalog {
        ModelCatalog::new()
            .with_model(
                Model::new("User", "users")
                    .has_many("posts", "Post", "user_id")
                    .belongs_to_many("roles", "Role", "role_user", "user_id", "role_id"),
            )
            .with_model(Model::new("Post", "posts").belongs_to("author", "User", "user_id"))
            .with_model(Model::new("Role", "roles"))
    }

    #[test]
    fn test_relation_lookup() {
        let catalog = catalog();
        let (relation, related) = catalog.relation("User", "posts").unwrap();
        assert_eq!(relation.kind, RelationKind::HasMany);
        assert_eq!(related.table, "posts");
        assert_eq!(relation.link.parent_column(), "id");
        assert_eq!(relation.link.related_column(), "user_id");

        let (roles, _) = catalog.relation("User", "roles").unwrap();
        assert_eq!(roles.link.related_column(), "pivot_user_id");
    }

    #[test]
    fn test_unknown_relation() {
        let error = catalog().relation("Post", "comments").unwrap_err();
        assert_eq!(
            error,
            SchemaError::UnknownRelation {
                model: "Post".into(),
                relation: "comments".into()
            }
        );
    }

    #[test]
    fn test_qualified_model_names() {
        let catalog = catalog();
        assert_eq!(catalog.get("App.Models.User").map(|m| m.table.as_str()), Some("users"));
        assert_eq!(basename("App\\Models\\Post"), "Post");
    }
}
