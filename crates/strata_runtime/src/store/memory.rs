//! Table-backed in-memory data store.

use super::query::{
    pivot_column, AggregateFunction, Condition, Constraint, Direction, Link, Operator,
    RelationAggregate, Select, Statement,
};
use super::{key_string, DataStore, Row, StoreError};
use async_trait::async_trait;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use tokio::sync::{Mutex, RwLock};

/// In-memory tables plus a log of every executed statement.
///
/// The log is the instrumentation used to count round-trips.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<IndexMap<String, Vec<Row>>>,
    log: Mutex<Vec<Statement>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert) for setup code.
    ///
    /// Non-object values are ignored.
    #[must_use]
    pub fn with_table(self, table: &str, rows: Vec<Value>) -> Self {
        {
            let tables = self.tables.try_write();
            if let Ok(mut tables) = tables {
                tables
                    .entry(table.to_string())
                    .or_default()
                    .extend(rows.into_iter().filter_map(into_row));
            }
        }
        self
    }

    /// Appends rows to a table, creating it if needed.
    pub async fn insert(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.into_iter().filter_map(into_row));
    }

    /// Statements executed so far.
    pub async fn statements(&self) -> Vec<Statement> {
        self.log.lock().await.clone()
    }

    pub async fn statement_count(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn clear_log(&self) {
        self.log.lock().await.clear();
    }

    fn run_select(
        tables: &IndexMap<String, Vec<Row>>,
        select: &Select,
    ) -> Result<Vec<Row>, StoreError> {
        let source = table(tables, &select.table)?;

        let mut rows: Vec<Row> = match &select.constraint {
            None => source.to_vec(),
            Some(Constraint {
                link,
                parent_values,
            }) => {
                let wanted: FxHashSet<String> = parent_values.iter().map(key_string).collect();
                match link {
                    Link::Foreign { foreign_key, .. } => filter_in(source, foreign_key, &wanted),
                    Link::Owner { owner_key, .. } => filter_in(source, owner_key, &wanted),
                    Link::Pivot {
                        table: pivot,
                        foreign_pivot_key,
                        related_pivot_key,
                        related_key,
                        ..
                    } => {
                        let mut joined = Vec::new();
                        for link_row in table(tables, pivot)? {
                            let Some(owner) = link_row.get(foreign_pivot_key) else {
                                continue;
                            };
                            if !wanted.contains(&key_string(owner)) {
                                continue;
                            }
                            let target = link_row.get(related_pivot_key).map(key_string);
                            for row in source {
                                if row.get(related_key).map(key_string) == target {
                                    let mut row = row.clone();
                                    row.insert(pivot_column(foreign_pivot_key), owner.clone());
                                    joined.push(row);
                                }
                            }
                        }
                        joined
                    }
                }
            }
        };

        rows.retain(|row| select.conditions.iter().all(|c| matches(row, c)));

        if !select.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in &select.order_by {
                    let ordering = compare(
                        a.get(column).unwrap_or(&Value::Null),
                        b.get(column).unwrap_or(&Value::Null),
                    );
                    let ordering = match direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = select.offset.unwrap_or(0) as usize;
        let limit = select.limit.map_or(usize::MAX, |l| l as usize);
        let mut rows: Vec<Row> = rows.into_iter().skip(offset).take(limit).collect();

        for aggregate in &select.aggregates {
            for row in &mut rows {
                let value = evaluate_aggregate(tables, row, aggregate)?;
                row.insert(aggregate.alias.clone(), value);
            }
        }

        if !select.columns.is_empty() {
            for row in &mut rows {
                row.retain(|key, _| {
                    select.columns.iter().any(|c| c == key)
                        || select.aggregates.iter().any(|a| &a.alias == key)
                        || key.starts_with("pivot_")
                });
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.log.lock().await.push(statement.clone());
        tracing::trace!(%statement, "memory store execute");

        let tables = self.tables.read().await;
        match statement {
            Statement::Select(select) => Self::run_select(&tables, select),
            Statement::UnionAll(selects) => {
                let mut rows = Vec::new();
                for select in selects {
                    rows.extend(Self::run_select(&tables, select)?);
                }
                Ok(rows)
            }
        }
    }
}

fn into_row(value: Value) -> Option<Row> {
    match value {
        Value::Object(row) => Some(row),
        _ => None,
    }
}

fn table<'a>(tables: &'a IndexMap<String, Vec<Row>>, name: &str) -> Result<&'a [Row], StoreError> {
    tables
        .get(name)
        .map(Vec::as_slice)
        .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
}

fn filter_in(rows: &[Row], column: &str, wanted: &FxHashSet<String>) -> Vec<Row> {
    rows.iter()
        .filter(|row| {
            row.get(column)
                .is_some_and(|v| !v.is_null() && wanted.contains(&key_string(v)))
        })
        .cloned()
        .collect()
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b || (!a.is_null() && !b.is_null() && key_string(a) == key_string(b)),
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => key_string(a).cmp(&key_string(b)),
        },
    }
}

fn like(value: &str, pattern: &str) -> bool {
    fn go(v: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => v.is_empty(),
            Some(('%', rest)) => (0..=v.len()).any(|i| go(&v[i..], rest)),
            Some(('_', rest)) => !v.is_empty() && go(&v[1..], rest),
            Some((c, rest)) => v
                .split_first()
                .is_some_and(|(h, t)| h.eq_ignore_ascii_case(c) && go(t, rest)),
        }
    }
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    go(&v, &p)
}

fn matches(row: &Row, condition: &Condition) -> bool {
    let actual = row.get(&condition.column).unwrap_or(&Value::Null);
    let expected = &condition.value;
    match condition.operator {
        Operator::Eq => loosely_equal(actual, expected),
        Operator::Neq => !loosely_equal(actual, expected),
        Operator::Gt => !actual.is_null() && compare(actual, expected) == Ordering::Greater,
        Operator::Gte => !actual.is_null() && compare(actual, expected) != Ordering::Less,
        Operator::Lt => !actual.is_null() && compare(actual, expected) == Ordering::Less,
        Operator::Lte => !actual.is_null() && compare(actual, expected) != Ordering::Greater,
        Operator::Like => match (actual.as_str(), expected.as_str()) {
            (Some(value), Some(pattern)) => like(value, pattern),
            _ => false,
        },
        Operator::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| loosely_equal(actual, item))),
        Operator::NotIn => expected
            .as_array()
            .map_or(true, |items| !items.iter().any(|item| loosely_equal(actual, item))),
    }
}

fn related_rows<'a>(
    tables: &'a IndexMap<String, Vec<Row>>,
    parent: &Row,
    aggregate: &RelationAggregate,
) -> Result<Vec<&'a Row>, StoreError> {
    let related = table(tables, &aggregate.related_table)?;
    let rows: Vec<&Row> = match &aggregate.link {
        Link::Foreign {
            foreign_key,
            local_key,
        } => {
            let key = parent.get(local_key).unwrap_or(&Value::Null);
            related
                .iter()
                .filter(|row| !key.is_null() && row.get(foreign_key).is_some_and(|v| loosely_equal(v, key)))
                .collect()
        }
        Link::Owner {
            owner_key,
            foreign_key,
        } => {
            let key = parent.get(foreign_key).unwrap_or(&Value::Null);
            related
                .iter()
                .filter(|row| !key.is_null() && row.get(owner_key).is_some_and(|v| loosely_equal(v, key)))
                .collect()
        }
        Link::Pivot {
            table: pivot,
            foreign_pivot_key,
            related_pivot_key,
            parent_key,
            related_key,
        } => {
            let key = parent.get(parent_key).unwrap_or(&Value::Null);
            let targets: Vec<&Value> = table(tables, pivot)?
                .iter()
                .filter(|p| p.get(foreign_pivot_key).is_some_and(|v| loosely_equal(v, key)))
                .filter_map(|p| p.get(related_pivot_key))
                .collect();
            related
                .iter()
                .filter(|row| {
                    row.get(related_key)
                        .is_some_and(|v| targets.iter().any(|t| loosely_equal(v, t)))
                })
                .collect()
        }
    };
    Ok(rows
        .into_iter()
        .filter(|row| aggregate.conditions.iter().all(|c| matches(row, c)))
        .collect())
}

fn evaluate_aggregate(
    tables: &IndexMap<String, Vec<Row>>,
    parent: &Row,
    aggregate: &RelationAggregate,
) -> Result<Value, StoreError> {
    let rows = related_rows(tables, parent, aggregate)?;
    let values: Vec<&Value> = match &aggregate.column {
        Some(column) => rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .collect(),
        None => Vec::new(),
    };

    let value = match aggregate.function {
        AggregateFunction::Count => {
            let count = if aggregate.column.is_some() {
                values.len()
            } else {
                rows.len()
            };
            Value::from(count as u64)
        }
        AggregateFunction::Min => values
            .iter()
            .min_by(|a, b| compare(a, b))
            .map_or(Value::Null, |v| (*v).clone()),
        AggregateFunction::Max => values
            .iter()
            .max_by(|a, b| compare(a, b))
            .map_or(Value::Null, |v| (*v).clone()),
        AggregateFunction::Sum => sum(&values),
        AggregateFunction::Avg => {
            if values.is_empty() {
                Value::Null
            } else {
                let sum: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
                float(sum / values.len() as f64)
            }
        }
    };
    Ok(value)
}

/// Null over no values. Integer sums that overflow `i64` become floats.
fn sum(values: &[&Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    let integer = values.iter().try_fold(0_i64, |total, value| {
        value.as_i64().and_then(|v| total.checked_add(v))
    });
    match integer {
        Some(total) => Value::from(total),
        None => float(values.iter().filter_map(|v| v.as_f64()).sum()),
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_table(
                "users",
                vec![json!({"id": 1, "name": "ada"}), json!({"id": 2, "name": "bob"})],
            )
            .with_table(
                "posts",
                vec![
                    json!({"id": 10, "user_id": 1, "votes": 3, "title": "Hello"}),
                    json!({"id": 11, "user_id": 1, "votes": 5, "title": "Help"}),
                    json!({"id": 12, "user_id": 2, "votes": 1, "title": "Other"}),
                ],
            )
            .with_table("roles", vec![json!({"id": 7, "name": "admin"})])
            .with_table("role_user", vec![json!({"user_id": 2, "role_id": 7})])
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[tokio::test]
    async fn test_constraint_conditions_and_paging() {
        let store = store();
        let select = Select::new("posts")
            .constrain(Constraint {
                link: Link::Foreign {
                    foreign_key: "user_id".into(),
                    local_key: "id".into(),
                },
                parent_values: vec![json!(1)],
            })
            .filter(Condition::new("title", Operator::Like, json!("hel%")))
            .order_by("votes", Direction::Desc)
            .limit(1);
        let rows = store.execute(&select.into()).await.unwrap();
        assert_eq!(ids(&rows), vec![11]);
        assert_eq!(store.statement_count().await, 1);
    }

    #[tokio::test]
    async fn test_pivot_join_exposes_pivot_key() {
        let store = store();
        let select = Select::new("roles").constrain(Constraint {
            link: Link::Pivot {
                table: "role_user".into(),
                foreign_pivot_key: "user_id".into(),
                related_pivot_key: "role_id".into(),
                parent_key: "id".into(),
                related_key: "id".into(),
            },
            parent_values: vec![json!(1), json!(2)],
        });
        let rows = store.execute(&select.into()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["pivot_user_id"], json!(2));
    }

    #[tokio::test]
    async fn test_aggregates() {
        let store = store();
        let link = Link::Foreign {
            foreign_key: "user_id".into(),
            local_key: "id".into(),
        };
        let select = Select::new("users")
            .columns(["id"])
            .aggregate(RelationAggregate {
                alias: "posts_count".into(),
                function: AggregateFunction::Count,
                column: None,
                related_table: "posts".into(),
                link: link.clone(),
                conditions: Vec::new(),
            })
            .aggregate(RelationAggregate {
                alias: "posts_sum_votes".into(),
                function: AggregateFunction::Sum,
                column: Some("votes".into()),
                related_table: "posts".into(),
                link,
                conditions: Vec::new(),
            });
        let rows = store.execute(&select.into()).await.unwrap();
        assert_eq!(
            Value::Array(rows.into_iter().map(Value::Object).collect()),
            json!([
                {"id": 1, "posts_count": 2, "posts_sum_votes": 8},
                {"id": 2, "posts_count": 1, "posts_sum_votes": 1}
            ])
        );
    }

    #[tokio::test]
    async fn test_sum_of_nothing_is_null() {
        let store = MemoryStore::new()
            .with_table("users", vec![json!({"id": 1}), json!({"id": 3})])
            .with_table(
                "posts",
                vec![
                    json!({"id": 10, "user_id": 1, "votes": i64::MAX}),
                    json!({"id": 11, "user_id": 1, "votes": 1}),
                ],
            );
        let select = Select::new("users").aggregate(RelationAggregate {
            alias: "votes".into(),
            function: AggregateFunction::Sum,
            column: Some("votes".into()),
            related_table: "posts".into(),
            link: Link::Foreign {
                foreign_key: "user_id".into(),
                local_key: "id".into(),
            },
            conditions: Vec::new(),
        });
        let rows = store.execute(&select.into()).await.unwrap();
        assert_eq!(rows[0]["votes"].as_f64(), Some(i64::MAX as f64 + 1.0));
        assert!(!rows[0]["votes"].is_i64());
        assert_eq!(rows[1]["votes"], Value::Null);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = store();
        let error = store
            .execute(&Select::new("comments").into())
            .await
            .unwrap_err();
        assert_eq!(error, StoreError::UnknownTable("comments".into()));
    }
}
