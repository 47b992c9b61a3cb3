//! Statement model handed to a [`DataStore`](super::DataStore).
//!
//! `Display` renders SQL-like text; it is what gets logged and what tests
//! snapshot, not something a real database has to accept verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How related rows are linked to their parent rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// `related.foreign_key = parent.local_key` (has-one, has-many).
    Foreign {
        foreign_key: String,
        local_key: String,
    },
    /// `related.owner_key = parent.foreign_key` (belongs-to).
    Owner {
        owner_key: String,
        foreign_key: String,
    },
    /// Through a pivot table (belongs-to-many).
    Pivot {
        table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        parent_key: String,
        related_key: String,
    },
}

impl Link {
    /// Column of the parent row that identifies it for this link.
    #[must_use]
    pub fn parent_column(&self) -> &str {
        match self {
            Self::Foreign { local_key, .. } => local_key,
            Self::Owner { foreign_key, .. } => foreign_key,
            Self::Pivot { parent_key, .. } => parent_key,
        }
    }

    /// Column of a fetched related row holding the parent's identifier.
    #[must_use]
    pub fn related_column(&self) -> String {
        match self {
            Self::Foreign { foreign_key, .. } => foreign_key.clone(),
            Self::Owner { owner_key, .. } => owner_key.clone(),
            Self::Pivot {
                foreign_pivot_key, ..
            } => pivot_column(foreign_pivot_key),
        }
    }
}

/// Name under which a pivot key is exposed on joined rows.
#[must_use]
pub fn pivot_column(key: &str) -> String {
    format!("pivot_{key}")
}

/// Restricts a select to the rows related to a set of parents.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub link: Link,
    pub parent_values: Vec<Value>,
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl Operator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// Parses an operator as written in a directive argument.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Neq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "in" => Some(Self::In),
            "not in" => Some(Self::NotIn),
            _ => None,
        }
    }
}

/// `column <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Aggregate function over related rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Avg,
    Sum,
}

impl AggregateFunction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Sum => "sum",
        }
    }
}

/// A correlated aggregate over a relation, selected as `alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationAggregate {
    pub alias: String,
    pub function: AggregateFunction,
    /// `None` aggregates whole rows (`COUNT(*)`).
    pub column: Option<String>,
    pub related_table: String,
    pub link: Link,
    pub conditions: Vec<Condition>,
}

/// A select over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    /// Selected columns; empty selects every column.
    pub columns: Vec<String>,
    pub constraint: Option<Constraint>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub aggregates: Vec<RelationAggregate>,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            constraint: None,
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            aggregates: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn aggregate(mut self, aggregate: RelationAggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    /// Adds a condition in place, as used by argument builders.
    pub fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}

/// A statement executed by a data store.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    /// Concatenation of several selects in one round-trip.
    UnionAll(Vec<Select>),
}

impl Statement {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::UnionAll(_) => "union_all",
        }
    }
}

impl From<Select> for Statement {
    fn from(select: Select) -> Self {
        Self::Select(select)
    }
}

struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Array(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Literal(item))?;
                }
                f.write_str(")")
            }
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.column,
            self.operator.as_str(),
            Literal(&self.value)
        )
    }
}

fn write_conditions(
    f: &mut fmt::Formatter<'_>,
    mut first: bool,
    table: &str,
    conditions: &[Condition],
) -> fmt::Result {
    for condition in conditions {
        f.write_str(if first { " WHERE " } else { " AND " })?;
        first = false;
        write!(f, "{table}.{condition}")?;
    }
    Ok(())
}

fn write_aggregate(
    f: &mut fmt::Formatter<'_>,
    parent_table: &str,
    aggregate: &RelationAggregate,
) -> fmt::Result {
    let related = &aggregate.related_table;
    let target = match &aggregate.column {
        Some(column) => format!("{related}.{column}"),
        None => "*".to_string(),
    };
    write!(
        f,
        "(SELECT {}({target}) FROM {related}",
        aggregate.function.as_str().to_ascii_uppercase()
    )?;
    match &aggregate.link {
        Link::Foreign {
            foreign_key,
            local_key,
        } => write!(f, " WHERE {related}.{foreign_key} = {parent_table}.{local_key}")?,
        Link::Owner {
            owner_key,
            foreign_key,
        } => write!(f, " WHERE {related}.{owner_key} = {parent_table}.{foreign_key}")?,
        Link::Pivot {
            table,
            foreign_pivot_key,
            related_pivot_key,
            parent_key,
            related_key,
        } => write!(
            f,
            " INNER JOIN {table} ON {table}.{related_pivot_key} = {related}.{related_key} \
             WHERE {table}.{foreign_pivot_key} = {parent_table}.{parent_key}"
        )?,
    }
    write_conditions(f, false, related, &aggregate.conditions)?;
    write!(f, ") AS {}", aggregate.alias)
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = &self.table;
        f.write_str("SELECT ")?;

        let mut projections: Vec<String> = if self.columns.is_empty() {
            vec![format!("{table}.*")]
        } else {
            self.columns.iter().map(|c| format!("{table}.{c}")).collect()
        };
        if let Some(Constraint {
            link:
                Link::Pivot {
                    table: pivot,
                    foreign_pivot_key,
                    ..
                },
            ..
        }) = &self.constraint
        {
            projections.push(format!(
                "{pivot}.{foreign_pivot_key} AS {}",
                pivot_column(foreign_pivot_key)
            ));
        }
        f.write_str(&projections.join(", "))?;
        for aggregate in &self.aggregates {
            f.write_str(", ")?;
            write_aggregate(f, table, aggregate)?;
        }

        write!(f, " FROM {table}")?;

        let mut has_where = false;
        if let Some(constraint) = &self.constraint {
            let values = Value::Array(constraint.parent_values.clone());
            match &constraint.link {
                Link::Foreign { foreign_key, .. } => {
                    write!(f, " WHERE {table}.{foreign_key} IN {}", Literal(&values))?;
                }
                Link::Owner { owner_key, .. } => {
                    write!(f, " WHERE {table}.{owner_key} IN {}", Literal(&values))?;
                }
                Link::Pivot {
                    table: pivot,
                    foreign_pivot_key,
                    related_pivot_key,
                    related_key,
                    ..
                } => write!(
                    f,
                    " INNER JOIN {pivot} ON {pivot}.{related_pivot_key} = {table}.{related_key} \
                     WHERE {pivot}.{foreign_pivot_key} IN {}",
                    Literal(&values)
                )?,
            }
            has_where = true;
        }
        write_conditions(f, !has_where, table, &self.conditions)?;

        for (i, (column, direction)) in self.order_by.iter().enumerate() {
            f.write_str(if i == 0 { " ORDER BY " } else { ", " })?;
            write!(f, "{table}.{column} {}", direction.as_str())?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(select) => write!(f, "{select}"),
            Self::UnionAll(selects) => {
                for (i, select) in selects.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" UNION ALL ")?;
                    }
                    write!(f, "({select})")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_constrained_select() {
        let select = Select::new("posts")
            .constrain(Constraint {
                link: Link::Foreign {
                    foreign_key: "user_id".into(),
                    local_key: "id".into(),
                },
                parent_values: vec![json!(1), json!(2)],
            })
            .filter(Condition::new("title", Operator::Neq, json!("draft")))
            .order_by("id", Direction::Asc)
            .limit(2)
            .offset(0);
        insta::assert_snapshot!(
            select.to_string(),
            @"SELECT posts.* FROM posts WHERE posts.user_id IN (1, 2) AND posts.title != 'draft' ORDER BY posts.id ASC LIMIT 2 OFFSET 0"
        );
    }

    #[test]
    fn test_render_aggregate() {
        let select = Select::new("users")
            .columns(["id"])
            .filter(Condition::new("id", Operator::In, json!([1, 2])))
            .aggregate(RelationAggregate {
                alias: "posts_count".into(),
                function: AggregateFunction::Count,
                column: None,
                related_table: "posts".into(),
                link: Link::Foreign {
                    foreign_key: "user_id".into(),
                    local_key: "id".into(),
                },
                conditions: Vec::new(),
            });
        insta::assert_snapshot!(
            select.to_string(),
            @"SELECT users.id, (SELECT COUNT(*) FROM posts WHERE posts.user_id = users.id) AS posts_count FROM users WHERE users.id IN (1, 2)"
        );
    }

    #[test]
    fn test_render_union_with_pivot() {
        let pivot = Link::Pivot {
            table: "role_user".into(),
            foreign_pivot_key: "user_id".into(),
            related_pivot_key: "role_id".into(),
            parent_key: "id".into(),
            related_key: "id".into(),
        };
        let one = |id: i64| {
            Select::new("roles")
                .constrain(Constraint {
                    link: pivot.clone(),
                    parent_values: vec![json!(id)],
                })
                .limit(1)
        };
        let statement = Statement::UnionAll(vec![one(1), one(2)]);
        assert_eq!(statement.kind(), "union_all");
        insta::assert_snapshot!(
            statement.to_string(),
            @"(SELECT roles.*, role_user.user_id AS pivot_user_id FROM roles INNER JOIN role_user ON role_user.role_id = roles.id WHERE role_user.user_id IN (1) LIMIT 1) UNION ALL (SELECT roles.*, role_user.user_id AS pivot_user_id FROM roles INNER JOIN role_user ON role_user.role_id = roles.id WHERE role_user.user_id IN (2) LIMIT 1)"
        );
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse(">="), Some(Operator::Gte));
        assert_eq!(Operator::parse("NOT IN"), Some(Operator::NotIn));
        assert_eq!(Operator::parse("~"), None);
    }
}
