use crate::batch::{normalize_path, BatchLoader};
use crate::directive::{Directive, DirectiveNode, FieldManipulator, FieldResolverDirective};
use crate::error::{PathSegment, ResolverError, SchemaError};
use crate::manipulator::ManipulationContext;
use crate::node::{ArgBuilders, FieldValue};
use crate::relation::{
    parent_key, ModelsLoader, PaginatedModelsLoader, PaginationArgs, RelationBatchLoader,
    RelationMeta, SimpleModelsLoader,
};
use crate::resolver::{FieldResolverFn, ResolveParams, ResolvedValue, ResolverArgs};
use crate::schema::BuildContext;
use crate::store::{Model, RelationKind, Row};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use strata_syntax as ast;

/// How a to-many relation field is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginationType {
    /// A plain list.
    #[default]
    Simple,
    /// A `{Type}Paginator` object with `data` and `paginatorInfo`.
    Paginator,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RelationArgs {
    relation: Option<String>,
    #[serde(rename = "type")]
    pagination: PaginationType,
    default_count: Option<u64>,
    max_count: Option<u64>,
}

pub(super) const fn class_name(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::HasOne => "HasOneDirective",
        RelationKind::HasMany => "HasManyDirective",
        RelationKind::BelongsTo => "BelongsToDirective",
        RelationKind::BelongsToMany => "BelongsToManyDirective",
    }
}

pub(super) const fn definition(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::HasOne => {
            r#"
"""
Corresponds to a has-one relation of the parent model.
"""
directive @hasOne(
  """
  The relation name, if it differs from the field name.
  """
  relation: String
) on FIELD_DEFINITION
"#
        }
        RelationKind::BelongsTo => {
            r#"
"""
Corresponds to a belongs-to relation of the parent model.
"""
directive @belongsTo(
  """
  The relation name, if it differs from the field name.
  """
  relation: String
) on FIELD_DEFINITION
"#
        }
        RelationKind::HasMany => concat!(
            r#"
"""
Corresponds to a has-many relation of the parent model.
"""
directive @hasMany(
  """
  The relation name, if it differs from the field name.
  """
  relation: String
  """
  Expose the relation as a list or as a paginator.
  """
  type: RelationPaginationType = SIMPLE
  """
  Page size used when the client passes no `first`.
  """
  defaultCount: Int
  """
  Largest page size a client may request.
  """
  maxCount: Int
) on FIELD_DEFINITION
"#,
            r#"
"""
How a list relation is exposed.
"""
enum RelationPaginationType {
  SIMPLE
  PAGINATOR
}
"#
        ),
        RelationKind::BelongsToMany => concat!(
            r#"
"""
Corresponds to a many-to-many relation of the parent model.
"""
directive @belongsToMany(
  """
  The relation name, if it differs from the field name.
  """
  relation: String
  """
  Expose the relation as a list or as a paginator.
  """
  type: RelationPaginationType = SIMPLE
  """
  Page size used when the client passes no `first`.
  """
  defaultCount: Int
  """
  Largest page size a client may request.
  """
  maxCount: Int
) on FIELD_DEFINITION
"#,
            r#"
"""
How a list relation is exposed.
"""
enum RelationPaginationType {
  SIMPLE
  PAGINATOR
}
"#
        ),
    }
}

const PAGINATOR_INFO: &str = r#"
"""
Information about the current page of a paginated list.
"""
type PaginatorInfo {
  "Number of items in the current page."
  count: Int!
  "Index of the current page."
  currentPage: Int!
  "Index of the first item in the current page."
  firstItem: Int
  "Are there more pages after this one?"
  hasMorePages: Boolean!
  "Index of the last item in the current page."
  lastItem: Int
  "Index of the last available page."
  lastPage: Int!
  "Number of items per page."
  perPage: Int!
  "Number of total available items."
  total: Int!
}
"#;

/// `@hasOne`, `@hasMany`, `@belongsTo` and `@belongsToMany`.
///
/// Resolves a relation of the parent row through a batch loader keyed by
/// the field's path, so siblings in a list share one fetch. A relation that
/// was eager loaded onto the parent row is returned as is.
pub struct RelationDirective {
    node: DirectiveNode,
    kind: RelationKind,
    args: RelationArgs,
}

impl RelationDirective {
    pub fn new(kind: RelationKind, node: DirectiveNode) -> Result<Self, SchemaError> {
        let args: RelationArgs = node.parse_args()?;
        if args.pagination == PaginationType::Paginator && !kind.is_many() {
            return Err(SchemaError::InvalidDirectiveArguments {
                directive: node.name.clone(),
                message: "only list relations can be paginated".to_string(),
            });
        }
        Ok(Self { node, kind, args })
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    fn is_paginated(&self) -> bool {
        self.args.pagination == PaginationType::Paginator
    }

    fn relation_name<'a>(&'a self, field: &'a FieldValue) -> &'a str {
        self.args.relation.as_deref().unwrap_or(field.name())
    }
}

impl Directive for RelationDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
        Some(self)
    }

    fn as_field_manipulator(&self) -> Option<&dyn FieldManipulator> {
        if self.is_paginated() {
            Some(self)
        } else {
            None
        }
    }
}

impl FieldResolverDirective for RelationDirective {
    fn resolve_field(
        &self,
        field: &FieldValue,
        cx: &BuildContext,
    ) -> Result<FieldResolverFn, SchemaError> {
        let relation = self.relation_name(field).to_string();
        let model = field.parent().backing_model(&cx.catalog)?.clone();
        let (declared, _) = cx.catalog.relation(&model.name, &relation)?;
        if declared.kind.is_many() != self.kind.is_many() {
            return Err(SchemaError::InvalidDirectiveUsage {
                directive: self.node.name.clone(),
                node: field.node_name(),
                message: format!(
                    "relation `{relation}` of {} is a {:?} relation",
                    model.name, declared.kind
                ),
            });
        }

        let limits = self.is_paginated().then(|| PageLimits {
            default_count: self.args.default_count.or(cx.config.pagination.default_count),
            max_count: self.args.max_count.or(cx.config.pagination.max_count),
        });
        let relation = Arc::new(RelationField {
            relation,
            model,
            arg_builders: field.arg_builders().clone(),
            limits,
        });
        Ok(Arc::new(move |params: ResolveParams| {
            let relation = Arc::clone(&relation);
            Box::pin(async move { relation.resolve(params).await })
        }))
    }
}

impl FieldManipulator for RelationDirective {
    fn manipulate_field(
        &self,
        field: &mut ast::FieldDefinition,
        cx: &mut ManipulationContext<'_>,
    ) -> Result<(), SchemaError> {
        let item = field.ty.name().to_string();
        let paginator = format!("{item}Paginator");
        let default_count = self
            .args
            .default_count
            .or(cx.config().pagination.default_count);

        field.ty = ast::Type::non_null(ast::Type::named(paginator.as_str()));
        if !field.arguments.iter().any(|arg| arg.name.value == "first") {
            field.arguments.push(input_value(
                "first",
                "Limits number of fetched items.",
                ast::Type::non_null(ast::Type::named("Int")),
                default_count.and_then(|count| i64::try_from(count).ok()),
            ));
        }
        if !field.arguments.iter().any(|arg| arg.name.value == "page") {
            field.arguments.push(input_value(
                "page",
                "The offset from which items are returned.",
                ast::Type::named("Int"),
                None,
            ));
        }

        cx.add_sdl(PAGINATOR_INFO)?;
        cx.add_sdl(&format!(
            "\"A paginated list of {item} items.\"\n\
             type {paginator} {{\n  \
               \"Pagination information about the list of items.\"\n  \
               paginatorInfo: PaginatorInfo!\n  \
               \"A list of {item} items.\"\n  \
               data: [{item}!]!\n\
             }}\n"
        ))?;
        Ok(())
    }
}

fn input_value(
    name: &str,
    description: &str,
    ty: ast::Type,
    default: Option<i64>,
) -> ast::InputValueDefinition {
    ast::InputValueDefinition {
        description: Some(description.to_string()),
        name: ast::Name::synthetic(name),
        ty,
        default_value: default.map(ast::Value::Int),
        directives: Vec::new(),
        span: Default::default(),
    }
}

/// Page size bounds of a paginated relation field.
#[derive(Debug, Clone, Copy)]
struct PageLimits {
    default_count: Option<u64>,
    max_count: Option<u64>,
}

impl PageLimits {
    fn arguments(&self, args: &ResolverArgs) -> Result<PaginationArgs, ResolverError> {
        let first = match args.get("first").filter(|v| !v.is_null()) {
            Some(value) => value.as_i64().ok_or_else(|| {
                ResolverError::ArgumentParseError("first".into(), "expected an integer".into())
            })?,
            None => self
                .default_count
                .and_then(|count| i64::try_from(count).ok())
                .ok_or_else(|| ResolverError::MissingArgument("first".into()))?,
        };
        let first = u64::try_from(first)
            .ok()
            .filter(|first| *first > 0)
            .ok_or_else(|| {
                ResolverError::custom(format!(
                    "Requested pagination amount must be more than 0, got {first}."
                ))
            })?;
        if let Some(max) = self.max_count.filter(|max| first > *max) {
            return Err(ResolverError::custom(format!(
                "Maximum number of {max} requested items exceeded, got {first}. Fetch smaller chunks."
            )));
        }

        let page = args
            .get("page")
            .and_then(Value::as_i64)
            .and_then(|page| u64::try_from(page).ok())
            .unwrap_or(1);
        Ok(PaginationArgs::new(first, page))
    }
}

/// Everything the resolver of a relation field captures at build time.
struct RelationField {
    relation: String,
    model: Model,
    arg_builders: ArgBuilders,
    limits: Option<PageLimits>,
}

impl RelationField {
    async fn resolve(&self, params: ResolveParams) -> Result<ResolvedValue, ResolverError> {
        let parent = match &params.parent {
            Value::Object(row) => row.clone(),
            _ => return Ok(Value::Null.into()),
        };
        let decorate = self.arg_builders.decorator(&params.args);

        if let Some(limits) = &self.limits {
            let pagination = limits.arguments(&params.args)?;
            let meta = RelationMeta {
                decorate,
                pagination: Some(pagination),
            };
            let loader = PaginatedModelsLoader::new(self.relation.clone(), pagination, meta);
            return defer(&params, &self.model, parent, || loader).await;
        }

        if decorate.is_none() {
            if let Some(loaded) = parent.get(&self.relation) {
                return Ok(loaded.clone().into());
            }
        }
        let loader = SimpleModelsLoader::new(self.relation.clone(), RelationMeta::decorated(decorate));
        defer(&params, &self.model, parent, || loader).await
    }
}

/// Schedules `parent` on the batch loader of the field being resolved,
/// creating the loader on first use.
///
/// Loaders are keyed by field path and parent model: members of a union
/// list share the path of a same-named relation field but not its meaning.
pub(super) async fn defer<L, F>(
    params: &ResolveParams,
    model: &Model,
    parent: Row,
    create: F,
) -> Result<ResolvedValue, ResolverError>
where
    L: ModelsLoader,
    F: FnOnce() -> L,
{
    let context = &params.context;
    let loader = context
        .loaders()
        .instance(loader_key(&params.info.path, model), || {
            BatchLoader::new(RelationBatchLoader::new(
                create(),
                context.store(),
                context.catalog(),
                model.name.clone(),
            ))
        })?;
    Ok(loader.load(parent_key(model, &parent), parent).await.into())
}

fn loader_key(path: &[PathSegment], model: &Model) -> String {
    format!("{}@{}", normalize_path(path), model.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits(default_count: Option<u64>, max_count: Option<u64>) -> PageLimits {
        PageLimits {
            default_count,
            max_count,
        }
    }

    fn args(first: Value, page: Value) -> ResolverArgs {
        let mut args = ResolverArgs::new();
        args.set("first", first);
        args.set("page", page);
        args
    }

    #[test]
    fn test_page_arguments() {
        let pagination = limits(None, None).arguments(&args(json!(5), json!(3))).unwrap();
        assert_eq!(pagination, PaginationArgs::new(5, 3));
        assert_eq!(pagination.offset(), 10);

        let defaulted = limits(Some(10), None)
            .arguments(&ResolverArgs::new())
            .unwrap();
        assert_eq!(defaulted, PaginationArgs::new(10, 1));

        assert!(matches!(
            limits(None, None).arguments(&ResolverArgs::new()),
            Err(ResolverError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_page_size_bounds() {
        let error = limits(None, Some(10))
            .arguments(&args(json!(11), Value::Null))
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Maximum number of 10 requested items exceeded, got 11. Fetch smaller chunks."
        );

        let error = limits(None, None)
            .arguments(&args(json!(0), Value::Null))
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Requested pagination amount must be more than 0, got 0."
        );
    }

    #[test]
    fn test_loader_key_separates_parent_models() {
        let path = vec![
            PathSegment::Field("search".into()),
            PathSegment::Index(1),
            PathSegment::Field("posts".into()),
        ];
        assert_eq!(loader_key(&path, &Model::new("User", "users")), "search.posts@User");
        assert_eq!(
            loader_key(&path, &Model::new("Category", "categories")),
            "search.posts@Category"
        );
    }

    #[test]
    fn test_to_one_relations_cannot_paginate() {
        let node = DirectiveNode::new("hasOne").with_argument("type", json!("PAGINATOR"));
        assert!(RelationDirective::new(RelationKind::HasOne, node).is_err());

        let node = DirectiveNode::new("hasMany").with_argument("type", json!("PAGINATOR"));
        let directive = RelationDirective::new(RelationKind::HasMany, node).unwrap();
        assert!(directive.as_field_manipulator().is_some());

        let plain = RelationDirective::new(RelationKind::HasMany, DirectiveNode::new("hasMany"))
            .unwrap();
        assert!(plain.as_field_manipulator().is_none());
    }
}
