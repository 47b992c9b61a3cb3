//! Query validation.
//!
//! Runs before execution; any error means the operation is not executed.
//! Besides the structural checks (known fields, fragments and types, leaf
//! and composite selections) this enforces the security limits of the
//! configuration: query depth, query complexity and disabled
//! introspection.

use crate::error::GraphQLError;
use crate::registry::TypeRegistry;
use crate::types::{ExecutableType, TypeHandle};
use crate::values::value_to_json;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use strata_core::{LineIndex, Span};
use strata_syntax as ast;

/// Depth and complexity of a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMetrics {
    pub depth: usize,
    pub complexity: usize,
}

impl QueryMetrics {
    fn merge(self, other: Self) -> Self {
        Self {
            depth: self.depth.max(other.depth),
            complexity: self.complexity.saturating_add(other.complexity),
        }
    }
}

/// Validates `operation`; an empty result means it may be executed.
pub fn validate(
    registry: &TypeRegistry,
    document: &ast::Document,
    operation: &ast::OperationDefinition,
    variables: &Map<String, Value>,
    lines: &LineIndex,
) -> Vec<GraphQLError> {
    let mut validator = Validator {
        registry,
        fragments: document
            .fragments()
            .map(|fragment| (fragment.name.as_str(), fragment))
            .collect(),
        variables,
        lines,
        introspection: false,
        errors: Vec::new(),
    };

    validator.check_cycles(document);
    if !validator.errors.is_empty() {
        return validator.errors;
    }

    let cx = registry.context();
    let Some(root_name) = cx.roots.name_of(operation.operation) else {
        // reported by the executor
        return Vec::new();
    };
    let root = match registry.get(root_name) {
        Ok(root) => root,
        Err(error) => return vec![GraphQLError::from(error)],
    };
    let metrics = validator.check_set(&root, &operation.selection_set, &mut Vec::new());

    let security = &cx.config.security;
    if security.disable_introspection && validator.introspection {
        validator.error(
            "GraphQL introspection is not allowed, but the query contained __schema or __type"
                .to_string(),
            operation.span,
        );
    }
    if !validator.errors.is_empty() {
        return validator.errors;
    }

    tracing::trace!(depth = metrics.depth, complexity = metrics.complexity, "query metrics");
    if let Some(max) = security.max_query_depth.filter(|max| metrics.depth > *max) {
        validator.error(
            format!("Max query depth should be {max} but got {}.", metrics.depth),
            operation.span,
        );
    }
    if let Some(max) = security
        .max_query_complexity
        .filter(|max| metrics.complexity > *max)
    {
        validator.error(
            format!("Max query complexity should be {max} but got {}.", metrics.complexity),
            operation.span,
        );
    }
    validator.errors
}

struct Validator<'a> {
    registry: &'a TypeRegistry,
    fragments: FxHashMap<&'a str, &'a ast::FragmentDefinition>,
    variables: &'a Map<String, Value>,
    lines: &'a LineIndex,
    introspection: bool,
    errors: Vec<GraphQLError>,
}

impl<'a> Validator<'a> {
    fn error(&mut self, message: String, span: Span) {
        self.errors
            .push(GraphQLError::new(message).with_location(self.lines.span_location(span)));
    }

    fn check_cycles(&mut self, document: &'a ast::Document) {
        for fragment in document.fragments() {
            let name = fragment.name.as_str();
            let mut seen = FxHashSet::default();
            if self.reaches(name, &fragment.selection_set, &mut seen) {
                self.error(
                    format!("Cannot spread fragment \"{name}\" within itself."),
                    fragment.span,
                );
            }
        }
    }

    /// Whether `set` spreads `target`, directly or through other
    /// fragments.
    fn reaches(&self, target: &str, set: &'a ast::SelectionSet, seen: &mut FxHashSet<&'a str>) -> bool {
        let mut spreads = Vec::new();
        collect_spreads(set, &mut spreads);
        spreads.into_iter().any(|spread| {
            if spread == target {
                return true;
            }
            if !seen.insert(spread) {
                return false;
            }
            self.fragments
                .get(spread)
                .is_some_and(|fragment| self.reaches(target, &fragment.selection_set, seen))
        })
    }

    fn check_set(
        &mut self,
        parent: &ExecutableType,
        set: &'a ast::SelectionSet,
        visiting: &mut Vec<&'a str>,
    ) -> QueryMetrics {
        let mut metrics = QueryMetrics::default();
        for selection in &set.selections {
            let selected = match selection {
                ast::Selection::Field(field) => self.check_field(parent, field, visiting),
                ast::Selection::FragmentSpread(spread) => {
                    let name = spread.name.as_str();
                    let Some(&fragment) = self.fragments.get(name) else {
                        self.error(format!("Unknown fragment \"{name}\"."), spread.span);
                        continue;
                    };
                    if visiting.contains(&name) {
                        continue;
                    }
                    let Some(condition) =
                        self.condition(fragment.type_condition.as_str(), fragment.span)
                    else {
                        continue;
                    };
                    visiting.push(name);
                    let selected = self.check_set(&condition, &fragment.selection_set, visiting);
                    visiting.pop();
                    selected
                }
                ast::Selection::InlineFragment(inline) => match &inline.type_condition {
                    Some(condition) => {
                        let Some(condition) = self.condition(condition.as_str(), inline.span) else {
                            continue;
                        };
                        self.check_set(&condition, &inline.selection_set, visiting)
                    }
                    None => self.check_set(parent, &inline.selection_set, visiting),
                },
            };
            metrics = metrics.merge(selected);
        }
        metrics
    }

    fn condition(&mut self, name: &str, span: Span) -> Option<std::sync::Arc<ExecutableType>> {
        match self.registry.search(name) {
            Ok(Some(ty)) => Some(ty),
            Ok(None) => {
                self.error(format!("Unknown type \"{name}\"."), span);
                None
            }
            Err(error) => {
                self.errors.push(GraphQLError::from(error));
                None
            }
        }
    }

    fn check_field(
        &mut self,
        parent: &ExecutableType,
        field: &'a ast::Field,
        visiting: &mut Vec<&'a str>,
    ) -> QueryMetrics {
        let name = field.name.as_str();
        let is_query_root = self.registry.context().roots.query == parent.name();

        let (ty, multiplier) = match name {
            "__typename" => (TypeHandle::named("String"), 1),
            "__schema" | "__type" if is_query_root => {
                self.introspection = true;
                let ty = if name == "__schema" { "__Schema" } else { "__Type" };
                (TypeHandle::named(ty), 1)
            }
            _ => match parent.field(name) {
                Ok(Some(definition)) => {
                    let default = definition
                        .arguments
                        .get("first")
                        .and_then(|first| first.default_value.clone());
                    (definition.ty.clone(), self.page_size(field, default))
                }
                Ok(None) => {
                    self.error(
                        format!("Cannot query field \"{name}\" on type \"{}\".", parent.name()),
                        field.span,
                    );
                    return QueryMetrics::default();
                }
                Err(error) => {
                    self.errors.push(GraphQLError::from(error));
                    return QueryMetrics::default();
                }
            },
        };

        let named = match self.registry.get(ty.name()) {
            Ok(named) => named,
            Err(error) => {
                self.errors.push(GraphQLError::from(error));
                return QueryMetrics::default();
            }
        };

        let children = if named.is_leaf() {
            if !field.selection_set.is_empty() {
                self.error(
                    format!(
                        "Field \"{name}\" must not have a selection since type \"{ty}\" has no subfields."
                    ),
                    field.span,
                );
            }
            QueryMetrics::default()
        } else if field.selection_set.is_empty() {
            self.error(
                format!(
                    "Field \"{name}\" of type \"{ty}\" must have a selection of subfields. \
                     Did you mean \"{name} {{ ... }}\"?"
                ),
                field.span,
            );
            QueryMetrics::default()
        } else {
            self.check_set(&named, &field.selection_set, visiting)
        };

        // Introspection does not count towards the limits.
        if name.starts_with("__") {
            return QueryMetrics::default();
        }
        QueryMetrics {
            depth: children.depth + 1,
            complexity: children
                .complexity
                .saturating_mul(multiplier)
                .saturating_add(1),
        }
    }

    /// The `first` argument of a paginated field, from the query or the
    /// argument default.
    fn page_size(&self, field: &ast::Field, default: Option<Value>) -> usize {
        field
            .arguments
            .iter()
            .find(|argument| argument.name.as_str() == "first")
            .map(|argument| value_to_json(&argument.value, self.variables))
            .filter(|value| !value.is_null())
            .or(default)
            .and_then(|value| value.as_u64())
            .and_then(|first| usize::try_from(first).ok())
            .filter(|first| *first > 0)
            .unwrap_or(1)
    }
}

fn collect_spreads<'a>(set: &'a ast::SelectionSet, spreads: &mut Vec<&'a str>) {
    for selection in &set.selections {
        match selection {
            ast::Selection::Field(field) => collect_spreads(&field.selection_set, spreads),
            ast::Selection::FragmentSpread(spread) => spreads.push(spread.name.as_str()),
            ast::Selection::InlineFragment(inline) => {
                collect_spreads(&inline.selection_set, spreads);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrataConfig;
    use crate::schema::Schema;
    use crate::store::Model;

    const SDL: &str = r#"
        type Query { users: [User!]! @all }
        type User { id: ID! name: String posts: [Post!]! @hasMany(type: PAGINATOR, defaultCount: 10) }
        type Post { id: ID! title: String }
    "#;

    fn run(config: StrataConfig, query: &str) -> Vec<String> {
        let schema = Schema::builder()
            .sdl(SDL)
            .config(config)
            .model(Model::new("User", "users").has_many("posts", "Post", "user_id"))
            .model(Model::new("Post", "posts"))
            .build()
            .unwrap();
        let document = strata_syntax::parse(query).document;
        let operation = document.operations().next().unwrap();
        validate(
            schema.registry(),
            &document,
            operation,
            &Map::new(),
            &LineIndex::new(query),
        )
        .into_iter()
        .map(|error| error.message)
        .collect()
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            run(StrataConfig::default(), "{ users { email } }"),
            vec!["Cannot query field \"email\" on type \"User\"."]
        );
    }

    #[test]
    fn test_selection_shape() {
        let errors = run(StrataConfig::default(), "{ users { id { x } } }");
        assert_eq!(
            errors,
            vec!["Field \"id\" must not have a selection since type \"ID!\" has no subfields."]
        );
        let errors = run(StrataConfig::default(), "{ users }");
        assert!(errors[0].starts_with("Field \"users\" of type \"[User!]!\" must have a selection"));
    }

    #[test]
    fn test_fragments() {
        let errors = run(StrataConfig::default(), "{ users { ...Missing } }");
        assert_eq!(errors, vec!["Unknown fragment \"Missing\"."]);

        let errors = run(
            StrataConfig::default(),
            "{ users { ...A } } fragment A on User { ...B } fragment B on User { ...A }",
        );
        assert_eq!(
            errors,
            vec![
                "Cannot spread fragment \"A\" within itself.",
                "Cannot spread fragment \"B\" within itself."
            ]
        );

        let errors = run(StrataConfig::default(), "{ users { ... on Ghost { id } } }");
        assert_eq!(errors, vec!["Unknown type \"Ghost\"."]);
    }

    #[test]
    fn test_depth_limit() {
        let query = "{ users { posts { data { id } } } }";
        assert!(run(StrataConfig::new().with_max_query_depth(4), query).is_empty());
        assert_eq!(
            run(StrataConfig::new().with_max_query_depth(3), query),
            vec!["Max query depth should be 3 but got 4."]
        );
    }

    #[test]
    fn test_complexity_multiplies_pages() {
        // users(1) + posts(1 + 5 * (data(1) + id(1) + title(1)))
        let query = "{ users { posts(first: 5) { data { id title } } } }";
        assert_eq!(
            run(StrataConfig::new().with_max_query_complexity(10), query),
            vec!["Max query complexity should be 10 but got 17."]
        );
        assert!(run(StrataConfig::new().with_max_query_complexity(17), query).is_empty());
    }

    #[test]
    fn test_disabled_introspection() {
        let errors = run(
            StrataConfig::new().disable_introspection(),
            "{ __schema { queryType { name } } }",
        );
        assert_eq!(
            errors,
            vec!["GraphQL introspection is not allowed, but the query contained __schema or __type"]
        );
        assert!(run(StrataConfig::default(), "{ __type(name: \"User\") { name } }").is_empty());
    }
}
