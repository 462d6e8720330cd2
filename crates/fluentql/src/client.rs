//! Execution primitive and the client facade.

use crate::config::ClientConfig;
use crate::error::DbResult;
use crate::qb::QueryBuilder;
use crate::relation::Relations;
use crate::row::Row;
use serde_json::Value;
use std::sync::Arc;

/// The single capability the builders need from a SQL engine: run a
/// statement with positional `?` parameters and return every result row.
///
/// Statements without a result set (e.g. `DELETE` without `RETURNING`)
/// return an empty vector.
pub trait GenericClient: Send + Sync {
    /// Execute a statement and return all rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send;

    /// Execute a statement, associating a tag for monitoring/observability.
    ///
    /// The default implementation ignores `tag` and calls [`GenericClient::execute`].
    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        let _ = tag;
        self.execute(sql, params)
    }
}

impl<C: GenericClient> GenericClient for &C {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        (**self).execute(sql, params)
    }

    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        (**self).execute_tagged(tag, sql, params)
    }
}

impl<C: GenericClient> GenericClient for Arc<C> {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        (**self).execute(sql, params)
    }

    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        (**self).execute_tagged(tag, sql, params)
    }
}

/// Entry point of the fluent API.
///
/// ```ignore
/// let client = Client::new(SqliteClient::open_in_memory()?)
///     .with_relations(Relations::new().foreign_key("invoices", "customer_id", "customers"));
///
/// let res = client
///     .from("invoices")
///     .select("id, total, customers(name)")
///     .eq("status", "open")
///     .order("due_date", Direction::Asc)
///     .await;
/// ```
///
/// There is no global instance: construct one and pass it (or a reference)
/// to whatever needs database access.
#[derive(Clone)]
pub struct Client<C> {
    executor: C,
    relations: Arc<Relations>,
    config: ClientConfig,
}

impl<C: GenericClient> Client<C> {
    pub fn new(executor: C) -> Self {
        Self {
            executor,
            relations: Arc::new(Relations::default()),
            config: ClientConfig::default(),
        }
    }

    /// Set the relation table used to resolve embedded resources.
    pub fn with_relations(mut self, relations: Relations) -> Self {
        self.relations = Arc::new(relations);
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a chain against `table`.
    pub fn from(&self, table: &str) -> QueryBuilder<'_, C> {
        QueryBuilder::new(self, table)
    }

    pub fn executor(&self) -> &C {
        &self.executor
    }

    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) async fn query(&self, tag: &str, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        tracing::debug!(target: "fluentql.qb", tag, params = params.len(), "dispatching statement");
        self.executor.execute_tagged(tag, sql, params).await
    }
}
