//! Fluent builders.
//!
//! A chain starts at [`Client::from`](crate::Client::from), which returns a
//! [`QueryBuilder`]. Picking an operation turns it into one of the concrete
//! builders; each chained call consumes the builder and returns a new one.
//!
//! ```ignore
//! use fluentql::prelude::*;
//!
//! // SELECT with an embedded resource
//! let res = client
//!     .from("invoices")
//!     .select("id, total, customers(name)")
//!     .gte("total", 100)
//!     .order("due_date", Direction::Desc)
//!     .limit(20)
//!     .await;
//!
//! // INSERT (missing ids are generated)
//! let res = client
//!     .from("customers")
//!     .insert(json!({"name": "Acme"}))
//!     .single()
//!     .await;
//!
//! // UPDATE / DELETE require a filter, or an explicit `.all()`
//! client.from("invoices").update(json!({"status": "paid"})).eq("id", id).await;
//! client.from("drafts").delete().all().await;
//! ```

mod delete;
mod insert;
mod select;
mod single;
mod traits;
mod update;
mod upsert;

#[cfg(test)]
mod tests;

pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use select::SelectBuilder;
pub use single::SingleBuilder;
pub use traits::{Executable, Filterable};
pub use update::UpdateBuilder;
pub use upsert::UpsertBuilder;

use crate::client::{Client, GenericClient};
use crate::eager::{add_relation_keys, resolve_relations, strip_columns};
use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use crate::row::Row;
use crate::select::parse_select;
use serde::Serialize;
use serde_json::Value;

/// Sort direction for [`SelectBuilder::order`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub direction: Direction,
}

/// A chain bound to a table, before an operation has been chosen.
pub struct QueryBuilder<'a, C> {
    client: &'a Client<C>,
    table: String,
}

impl<'a, C: GenericClient> QueryBuilder<'a, C> {
    pub(crate) fn new(client: &'a Client<C>, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `SELECT columns FROM table`; `columns` may embed related tables.
    pub fn select(self, columns: &str) -> SelectBuilder<'a, C> {
        SelectBuilder::new(self.client, self.table, columns)
    }

    /// Insert one object or an array of objects.
    pub fn insert(self, payload: impl Serialize) -> InsertBuilder<'a, C> {
        InsertBuilder::new(self.client, self.table, payload_rows(payload))
    }

    /// Insert, or update on primary-key (or `.on_conflict`) collision.
    pub fn upsert(self, payload: impl Serialize) -> UpsertBuilder<'a, C> {
        UpsertBuilder::new(self.client, self.table, payload_rows(payload))
    }

    /// Update the rows matched by the filters that follow.
    pub fn update(self, values: impl Serialize) -> UpdateBuilder<'a, C> {
        let values = serde_json::to_value(values)
            .map_err(DbError::from)
            .and_then(|value| match value {
                Value::Object(map) => Ok(map),
                other => Err(DbError::validation(format!(
                    "update() expects an object, got {}",
                    json_kind(&other)
                ))),
            });
        UpdateBuilder::new(self.client, self.table, values)
    }

    /// Delete the rows matched by the filters that follow.
    pub fn delete(self) -> DeleteBuilder<'a, C> {
        DeleteBuilder::new(self.client, self.table)
    }
}

// ==================== Shared compile helpers ====================

/// Normalize an insert/upsert payload into rows.
fn payload_rows(payload: impl Serialize) -> DbResult<Vec<Row>> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(DbError::validation(format!(
                    "payload item {i} must be an object, got {}",
                    json_kind(&other)
                ))),
            })
            .collect(),
        other => Err(DbError::validation(format!(
            "payload must be an object or an array of objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Give every row without a primary key (or with a null one) a UUID v4 string.
///
/// The generated key is placed first so it leads the column list.
fn fill_primary_keys(rows: &mut [Row], primary_key: &str) {
    for row in rows.iter_mut() {
        match row.get_mut(primary_key) {
            Some(value) if !value.is_null() => {}
            Some(value) => *value = Value::String(uuid::Uuid::new_v4().to_string()),
            None => {
                let mut keyed = Row::with_capacity(row.len() + 1);
                keyed.insert(
                    primary_key.to_string(),
                    Value::String(uuid::Uuid::new_v4().to_string()),
                );
                keyed.extend(std::mem::take(row));
                *row = keyed;
            }
        }
    }
}

/// Union of row keys in first-seen order.
fn column_union(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// `INSERT INTO t (cols) VALUES (?, ...), (...)` plus its parameters.
///
/// Cells missing from a row bind `NULL`.
fn insert_values_sql(table: &str, rows: &[Row]) -> DbResult<(String, Vec<String>, Vec<Value>)> {
    let columns = column_union(rows);
    let column_sql = columns
        .iter()
        .map(|c| sql_ident(c))
        .collect::<DbResult<Vec<_>>>()?
        .join(", ");

    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values_sql = vec![placeholders.as_str(); rows.len()].join(", ");

    let mut params = Vec::with_capacity(columns.len() * rows.len());
    for row in rows {
        for column in &columns {
            params.push(row.get(column).cloned().unwrap_or(Value::Null));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({column_sql}) VALUES {values_sql}",
        sql_ident(table)?
    );
    Ok((sql, columns, params))
}

/// A compiled `RETURNING`/select list plus the relations to resolve afterwards.
struct Projection {
    columns_sql: String,
    relations: Vec<crate::select::RelationRequest>,
    /// Key columns appended for relation matching, removed from the output.
    added: Vec<String>,
}

impl Projection {
    fn compile<C: GenericClient>(client: &Client<C>, table: &str, columns: &str) -> DbResult<Self> {
        let mut parsed = parse_select(columns)?;
        let added = add_relation_keys(client, table, &mut parsed);
        Ok(Self {
            columns_sql: parsed.base_columns_sql()?,
            relations: parsed.relations,
            added,
        })
    }

    /// Resolve embedded resources, then drop helper key columns.
    async fn finish<C: GenericClient>(
        &self,
        client: &Client<C>,
        table: &str,
        rows: &mut Vec<Row>,
    ) -> DbResult<()> {
        if self.relations.is_empty() {
            return Ok(());
        }
        resolve_relations(client, table, rows, &self.relations).await?;
        if !self.added.is_empty() {
            for row in rows.iter_mut() {
                strip_columns(row, &self.added);
            }
        }
        Ok(())
    }
}

/// Debug-log a short-circuited chain.
fn log_short_circuit(operation: &str, table: &str, column: &str) {
    tracing::debug!(
        target: "fluentql.sql",
        operation,
        table,
        column,
        "empty IN list matches nothing; skipping query"
    );
}
