//! UPSERT builder (`INSERT ... ON CONFLICT`).

use super::traits::{Executable, impl_into_future};
use super::{Projection, SingleBuilder, fill_primary_keys, insert_values_sql};
use crate::client::{Client, GenericClient};
use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use crate::response::Response;
use crate::row::Row;

/// `INSERT ... ON CONFLICT (<target>) DO UPDATE SET c = excluded.c, ... RETURNING <select>`.
///
/// The conflict target defaults to the primary key. Conflict columns and the
/// primary key are never overwritten; when no other column remains (or with
/// `ignore_duplicates(true)`) the action becomes `DO NOTHING`, and
/// conflicting rows are then absent from the returned data.
pub struct UpsertBuilder<'a, C> {
    client: &'a Client<C>,
    table: String,
    rows: DbResult<Vec<Row>>,
    on_conflict: Option<String>,
    ignore_duplicates: bool,
    returning: String,
}

impl<'a, C: GenericClient> UpsertBuilder<'a, C> {
    pub(crate) fn new(client: &'a Client<C>, table: String, rows: DbResult<Vec<Row>>) -> Self {
        Self {
            client,
            table,
            rows,
            on_conflict: None,
            ignore_duplicates: false,
            returning: "*".to_string(),
        }
    }

    /// Conflict target: one column or a comma-separated list (`"org_id, code"`).
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    /// Keep existing rows untouched on conflict.
    pub fn ignore_duplicates(mut self, ignore: bool) -> Self {
        self.ignore_duplicates = ignore;
        self
    }

    /// Narrow the returned columns; may embed related tables.
    pub fn select(mut self, columns: &str) -> Self {
        self.returning = columns.to_string();
        self
    }

    /// Return the first affected row instead of a list.
    pub fn single(self) -> SingleBuilder<'a, Self> {
        SingleBuilder::new(self)
    }

    fn conflict_columns(&self) -> DbResult<Vec<String>> {
        let target = self
            .on_conflict
            .as_deref()
            .unwrap_or(&self.client.config().primary_key);
        let columns: Vec<String> = target
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Err(DbError::validation("on_conflict() needs at least one column"));
        }
        Ok(columns)
    }

    async fn run(self) -> DbResult<Vec<Row>> {
        let conflict = self.conflict_columns()?;
        let mut rows = self.rows?;
        if rows.is_empty() {
            tracing::debug!(target: "fluentql.sql", table = %self.table, "empty upsert payload; skipping query");
            return Ok(Vec::new());
        }
        if self.client.config().generate_ids {
            fill_primary_keys(&mut rows, &self.client.config().primary_key);
        }

        let conflict_sql = conflict
            .iter()
            .map(|c| sql_ident(c))
            .collect::<DbResult<Vec<_>>>()?
            .join(", ");

        let (insert_sql, columns, params) = insert_values_sql(&self.table, &rows)?;
        let pk = &self.client.config().primary_key;
        let updates = columns
            .iter()
            .filter(|c| !conflict.contains(*c) && *c != pk)
            .map(|c| -> DbResult<String> {
                let col = sql_ident(c)?;
                Ok(format!("{col} = excluded.{col}"))
            })
            .collect::<DbResult<Vec<String>>>()?;

        let action = if self.ignore_duplicates || updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        let projection = Projection::compile(self.client, &self.table, &self.returning)?;
        let sql = format!(
            "{insert_sql} ON CONFLICT ({conflict_sql}) {action} RETURNING {}",
            projection.columns_sql
        );

        let tag = format!("upsert {}", self.table);
        let mut returned = self.client.query(&tag, &sql, &params).await?;
        projection.finish(self.client, &self.table, &mut returned).await?;
        Ok(returned)
    }
}

impl<C: GenericClient> Executable for UpsertBuilder<'_, C> {
    type Data = Vec<Row>;

    fn execute(self) -> impl std::future::Future<Output = Response<Vec<Row>>> + Send {
        async move { Response::from(self.run().await) }
    }
}

impl_into_future!(UpsertBuilder);
