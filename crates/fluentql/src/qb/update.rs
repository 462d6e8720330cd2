//! UPDATE builder.

use super::traits::{Executable, Filterable, impl_into_future};
use super::{Projection, SingleBuilder, log_short_circuit};
use crate::client::{Client, GenericClient};
use crate::condition::FilterSet;
use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use crate::response::Response;
use crate::row::Row;
use serde_json::Value;

/// `UPDATE <table> SET a = ?, ... WHERE ... RETURNING <select>`.
///
/// Refuses to run without a filter unless [`all`](Self::all) is called.
pub struct UpdateBuilder<'a, C> {
    client: &'a Client<C>,
    table: String,
    values: DbResult<Row>,
    filters: FilterSet,
    allow_all: bool,
    returning: String,
}

impl<'a, C: GenericClient> UpdateBuilder<'a, C> {
    pub(crate) fn new(client: &'a Client<C>, table: String, values: DbResult<Row>) -> Self {
        Self {
            client,
            table,
            values,
            filters: FilterSet::new(),
            allow_all: false,
            returning: "*".to_string(),
        }
    }

    /// Allow the update to run without any filter (every row is updated).
    pub fn all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    /// Narrow the returned columns; may embed related tables.
    pub fn select(mut self, columns: &str) -> Self {
        self.returning = columns.to_string();
        self
    }

    /// Return the first updated row instead of a list.
    pub fn single(self) -> SingleBuilder<'a, Self> {
        SingleBuilder::new(self)
    }

    async fn run(self) -> DbResult<Vec<Row>> {
        let values = self.values?;
        self.filters.validate()?;
        if self.filters.is_empty() {
            if !self.allow_all {
                return Err(DbError::MissingFilter {
                    operation: "UPDATE",
                    table: self.table,
                });
            }
            tracing::warn!(target: "fluentql.sql", table = %self.table, "UPDATE without filter: every row is affected");
        }
        if let Some(column) = self.filters.unsatisfiable_column() {
            log_short_circuit("update", &self.table, column);
            return Ok(Vec::new());
        }

        let projection = Projection::compile(self.client, &self.table, &self.returning)?;
        let (sql, params) = build_update(&self.table, &values, &self.filters, &projection)?;

        let tag = format!("update {}", self.table);
        let mut rows = self.client.query(&tag, &sql, &params).await?;
        projection.finish(self.client, &self.table, &mut rows).await?;
        Ok(rows)
    }
}

fn build_update(
    table: &str,
    values: &Row,
    filters: &FilterSet,
    projection: &Projection,
) -> DbResult<(String, Vec<Value>)> {
    if values.is_empty() {
        return Err(DbError::validation(format!(
            "update on '{table}' has no columns to set"
        )));
    }

    let clause = filters.compile()?;
    let mut assignments = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len() + clause.params.len());
    for (column, value) in values {
        assignments.push(format!("{} = ?", sql_ident(column)?));
        params.push(value.clone());
    }
    params.extend(clause.params);

    let mut sql = format!("UPDATE {} SET {}", sql_ident(table)?, assignments.join(", "));
    if !clause.sql.is_empty() {
        sql.push(' ');
        sql.push_str(&clause.sql);
    }
    sql.push_str(" RETURNING ");
    sql.push_str(&projection.columns_sql);
    Ok((sql, params))
}

impl<C> Filterable for UpdateBuilder<'_, C> {
    fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }
}

impl<C: GenericClient> Executable for UpdateBuilder<'_, C> {
    type Data = Vec<Row>;

    fn execute(self) -> impl std::future::Future<Output = Response<Vec<Row>>> + Send {
        async move { Response::from(self.run().await) }
    }
}

impl_into_future!(UpdateBuilder);
