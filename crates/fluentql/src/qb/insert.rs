//! INSERT builder.

use super::traits::{Executable, impl_into_future};
use super::{Projection, SingleBuilder, fill_primary_keys, insert_values_sql};
use crate::client::{Client, GenericClient};
use crate::error::DbResult;
use crate::response::Response;
use crate::row::Row;

/// `INSERT INTO <table> (<cols>) VALUES (...), (...) RETURNING <select>`.
///
/// Rows without a primary key get a generated UUID v4 string (see
/// [`ClientConfig::generate_ids`](crate::ClientConfig)).
pub struct InsertBuilder<'a, C> {
    client: &'a Client<C>,
    table: String,
    rows: DbResult<Vec<Row>>,
    returning: String,
}

impl<'a, C: GenericClient> InsertBuilder<'a, C> {
    pub(crate) fn new(client: &'a Client<C>, table: String, rows: DbResult<Vec<Row>>) -> Self {
        Self {
            client,
            table,
            rows,
            returning: "*".to_string(),
        }
    }

    /// Narrow the returned columns; may embed related tables.
    pub fn select(mut self, columns: &str) -> Self {
        self.returning = columns.to_string();
        self
    }

    /// Return the first inserted row instead of a list.
    pub fn single(self) -> SingleBuilder<'a, Self> {
        SingleBuilder::new(self)
    }

    async fn run(self) -> DbResult<Vec<Row>> {
        let mut rows = self.rows?;
        if rows.is_empty() {
            tracing::debug!(target: "fluentql.sql", table = %self.table, "empty insert payload; skipping query");
            return Ok(Vec::new());
        }
        if self.client.config().generate_ids {
            fill_primary_keys(&mut rows, &self.client.config().primary_key);
        }

        let projection = Projection::compile(self.client, &self.table, &self.returning)?;
        let (sql, params) = {
            let (insert_sql, _, params) = insert_values_sql(&self.table, &rows)?;
            (
                format!("{insert_sql} RETURNING {}", projection.columns_sql),
                params,
            )
        };

        let tag = format!("insert {}", self.table);
        let mut returned = self.client.query(&tag, &sql, &params).await?;
        projection.finish(self.client, &self.table, &mut returned).await?;
        Ok(returned)
    }
}

impl<C: GenericClient> Executable for InsertBuilder<'_, C> {
    type Data = Vec<Row>;

    fn execute(self) -> impl std::future::Future<Output = Response<Vec<Row>>> + Send {
        async move { Response::from(self.run().await) }
    }
}

impl_into_future!(InsertBuilder);
