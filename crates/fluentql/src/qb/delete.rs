//! DELETE builder.

use super::traits::{Executable, Filterable, impl_into_future};
use super::{Projection, SingleBuilder, log_short_circuit};
use crate::client::{Client, GenericClient};
use crate::condition::FilterSet;
use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use crate::response::Response;
use crate::row::Row;

/// `DELETE FROM <table> WHERE ... [RETURNING <select>]`.
///
/// Data is `[]` unless [`select`](Self::select) asks for the deleted rows.
pub struct DeleteBuilder<'a, C> {
    client: &'a Client<C>,
    table: String,
    filters: FilterSet,
    allow_all: bool,
    returning: Option<String>,
}

impl<C> Clone for DeleteBuilder<'_, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            table: self.table.clone(),
            filters: self.filters.clone(),
            allow_all: self.allow_all,
            returning: self.returning.clone(),
        }
    }
}

impl<'a, C: GenericClient> DeleteBuilder<'a, C> {
    pub(crate) fn new(client: &'a Client<C>, table: String) -> Self {
        Self {
            client,
            table,
            filters: FilterSet::new(),
            allow_all: false,
            returning: None,
        }
    }

    /// Allow the delete to run without any filter (every row is removed).
    pub fn all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    /// Return the deleted rows (`RETURNING <columns>`).
    pub fn select(mut self, columns: &str) -> Self {
        self.returning = Some(columns.to_string());
        self
    }

    /// Return the first deleted row instead of a list.
    pub fn single(self) -> SingleBuilder<'a, Self> {
        SingleBuilder::new(self)
    }

    async fn run(self) -> DbResult<Vec<Row>> {
        self.filters.validate()?;
        if self.filters.is_empty() {
            if !self.allow_all {
                return Err(DbError::MissingFilter {
                    operation: "DELETE",
                    table: self.table,
                });
            }
            tracing::warn!(target: "fluentql.sql", table = %self.table, "DELETE without filter: every row is removed");
        }
        if let Some(column) = self.filters.unsatisfiable_column() {
            log_short_circuit("delete", &self.table, column);
            return Ok(Vec::new());
        }

        let clause = self.filters.compile()?;
        let mut sql = format!("DELETE FROM {}", sql_ident(&self.table)?);
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause.sql);
        }

        let projection = match &self.returning {
            Some(columns) => {
                let projection = Projection::compile(self.client, &self.table, columns)?;
                sql.push_str(" RETURNING ");
                sql.push_str(&projection.columns_sql);
                Some(projection)
            }
            None => None,
        };

        let tag = format!("delete {}", self.table);
        let mut rows = self.client.query(&tag, &sql, &clause.params).await?;
        match projection {
            Some(projection) => {
                projection
                    .finish(self.client, &self.table, &mut rows)
                    .await?
            }
            None => rows.clear(),
        }
        Ok(rows)
    }
}

impl<C> Filterable for DeleteBuilder<'_, C> {
    fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }
}

impl<C: GenericClient> Executable for DeleteBuilder<'_, C> {
    type Data = Vec<Row>;

    fn execute(self) -> impl std::future::Future<Output = Response<Vec<Row>>> + Send {
        async move { Response::from(self.run().await) }
    }
}

impl_into_future!(DeleteBuilder);
