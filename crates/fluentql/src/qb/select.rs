//! SELECT builder.

use super::traits::{Executable, Filterable, impl_into_future};
use super::{Direction, OrderSpec, Projection, SingleBuilder, log_short_circuit};
use crate::client::{Client, GenericClient};
use crate::condition::FilterSet;
use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use crate::response::Response;
use crate::row::Row;
use serde_json::Value;

/// Largest LIMIT/OFFSET the engine accepts (`i64::MAX`).
const MAX_WINDOW: u64 = i64::MAX as u64;

/// `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n [OFFSET m]]`,
/// followed by one query per embedded resource.
pub struct SelectBuilder<'a, C> {
    client: &'a Client<C>,
    table: String,
    columns: String,
    filters: FilterSet,
    order: Vec<OrderSpec>,
    limit: Option<u64>,
    offset: Option<u64>,
    build_error: Option<String>,
}

impl<C> Clone for SelectBuilder<'_, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            table: self.table.clone(),
            columns: self.columns.clone(),
            filters: self.filters.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            build_error: self.build_error.clone(),
        }
    }
}

impl<'a, C: GenericClient> SelectBuilder<'a, C> {
    pub(crate) fn new(client: &'a Client<C>, table: String, columns: &str) -> Self {
        Self {
            client,
            table,
            columns: columns.to_string(),
            filters: FilterSet::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            build_error: None,
        }
    }

    // ==================== ORDER / LIMIT ====================

    /// Append an `ORDER BY` term; earlier calls take precedence.
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(OrderSpec {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// At most `n` rows; `n` must fit the engine's signed 64-bit LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        if n > MAX_WINDOW {
            self.fail(format!("limit({n}) exceeds {MAX_WINDOW}"));
            return self;
        }
        self.limit = Some(n);
        self
    }

    /// Inclusive row window: `range(0, 9)` is the first ten rows.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        if to < from {
            self.fail(format!("range({from}, {to}): end precedes start"));
            return self;
        }
        match (to - from).checked_add(1) {
            Some(count) if count <= MAX_WINDOW && from <= MAX_WINDOW => {
                self.offset = Some(from);
                self.limit = Some(count);
            }
            _ => self.fail(format!("range({from}, {to}) exceeds {MAX_WINDOW} rows")),
        }
        self
    }

    /// Return the first row (or `None`) instead of a list; forces `LIMIT 1`.
    ///
    /// The limit applies to the base query, before any `!inner` relation
    /// filters parents out: if the first base row is dropped the result is
    /// `None` even when later rows would match.
    pub fn single(mut self) -> SingleBuilder<'a, Self> {
        self.limit = Some(1);
        SingleBuilder::new(self)
    }

    /// Keep the first build error; it is reported on execution.
    fn fail(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    // ==================== Build ====================

    fn validate(&self) -> DbResult<()> {
        if let Some(err) = &self.build_error {
            return Err(DbError::Validation(err.clone()));
        }
        self.filters.validate()
    }

    fn build(&self, projection: &Projection) -> DbResult<(String, Vec<Value>)> {
        let clause = self.filters.compile()?;

        let mut sql = format!(
            "SELECT {} FROM {}",
            projection.columns_sql,
            sql_ident(&self.table)?
        );
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause.sql);
        }
        if !self.order.is_empty() {
            let terms = self
                .order
                .iter()
                .map(|o| -> DbResult<String> {
                    Ok(format!("{} {}", sql_ident(&o.column)?, o.direction.as_sql()))
                })
                .collect::<DbResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        Ok((sql, clause.params))
    }

    /// SQL and parameters of the base query, without executing anything.
    pub fn to_sql(&self) -> DbResult<(String, Vec<Value>)> {
        self.validate()?;
        let projection = Projection::compile(self.client, &self.table, &self.columns)?;
        self.build(&projection)
    }

    async fn run(self) -> DbResult<Vec<Row>> {
        self.validate()?;
        if let Some(column) = self.filters.unsatisfiable_column() {
            log_short_circuit("select", &self.table, column);
            return Ok(Vec::new());
        }

        let projection = Projection::compile(self.client, &self.table, &self.columns)?;
        let (sql, params) = self.build(&projection)?;
        let tag = format!("select {}", self.table);
        let mut rows = self.client.query(&tag, &sql, &params).await?;
        projection.finish(self.client, &self.table, &mut rows).await?;
        Ok(rows)
    }
}

impl<C> Filterable for SelectBuilder<'_, C> {
    fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }
}

impl<C: GenericClient> Executable for SelectBuilder<'_, C> {
    type Data = Vec<Row>;

    fn execute(self) -> impl std::future::Future<Output = Response<Vec<Row>>> + Send {
        async move { Response::from(self.run().await) }
    }
}

impl_into_future!(SelectBuilder);
