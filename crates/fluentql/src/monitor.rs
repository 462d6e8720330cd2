//! Statement logging and slow-query detection.
//!
//! [`InstrumentedClient`] wraps any [`GenericClient`] and emits one `tracing`
//! event per statement under the `fluentql.sql` target:
//!
//! ```ignore
//! let client = Client::new(
//!     InstrumentedClient::new(SqliteClient::open_in_memory()?).with_config(
//!         MonitorConfig::new().with_slow_query_threshold(Duration::from_millis(50)),
//!     ),
//! );
//! ```

use crate::client::GenericClient;
use crate::error::DbResult;
use crate::row::Row;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Kind of statement, derived from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl QueryType {
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default();
        if keyword.eq_ignore_ascii_case("SELECT") {
            QueryType::Select
        } else if keyword.eq_ignore_ascii_case("INSERT") {
            QueryType::Insert
        } else if keyword.eq_ignore_ascii_case("UPDATE") {
            QueryType::Update
        } else if keyword.eq_ignore_ascii_case("DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

/// Configuration for statement logging.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Statements slower than this are logged at WARN.
    pub slow_query_threshold: Option<Duration>,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Log every statement at DEBUG; when off only slow and failed ones are logged.
    pub log_statements: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold: None,
            max_sql_length: Some(200),
            log_statements: true,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }
}

/// Counters collected by an [`InstrumentedClient`].
#[derive(Debug, Default)]
pub struct QueryStats {
    total: AtomicU64,
    failed: AtomicU64,
    slow: AtomicU64,
}

/// Point-in-time copy of [`QueryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStatsSnapshot {
    pub total: u64,
    pub failed: u64,
    pub slow: u64,
}

impl QueryStats {
    pub fn snapshot(&self) -> QueryStatsSnapshot {
        QueryStatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            slow: self.slow.load(Ordering::Relaxed),
        }
    }
}

/// A [`GenericClient`] wrapper that logs and counts every statement.
pub struct InstrumentedClient<C> {
    client: C,
    config: MonitorConfig,
    stats: QueryStats,
}

impl<C: GenericClient> InstrumentedClient<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            config: MonitorConfig::default(),
            stats: QueryStats::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn stats(&self) -> QueryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.client
    }

    /// Get the inner client, consuming this wrapper.
    pub fn into_inner(self) -> C {
        self.client
    }

    fn display_sql(&self, sql: &str) -> String {
        match self.config.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    async fn run(&self, tag: Option<&str>, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let query_type = QueryType::from_sql(sql);
        let start = Instant::now();
        let result = match tag {
            Some(tag) => self.client.execute_tagged(tag, sql, params).await,
            None => self.client.execute(sql, params).await,
        };
        let duration = start.elapsed();
        self.report(query_type, tag.unwrap_or("-"), sql, params.len(), duration, &result);
        result
    }

    fn report(
        &self,
        query_type: QueryType,
        tag: &str,
        sql: &str,
        param_count: usize,
        duration: Duration,
        result: &DbResult<Vec<Row>>,
    ) {
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        let elapsed_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        match result {
            Ok(rows) => {
                if self.config.log_statements {
                    tracing::debug!(
                        target: "fluentql.sql",
                        query_type = ?query_type,
                        tag,
                        params = param_count,
                        rows = rows.len(),
                        elapsed_us,
                        sql = %self.display_sql(sql),
                        "statement executed"
                    );
                }
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "fluentql.sql",
                    query_type = ?query_type,
                    tag,
                    params = param_count,
                    elapsed_us,
                    sql = %self.display_sql(sql),
                    error = %err,
                    "statement failed"
                );
            }
        }

        if let Some(threshold) = self.config.slow_query_threshold {
            if duration > threshold {
                self.stats.slow.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "fluentql.sql",
                    query_type = ?query_type,
                    tag,
                    elapsed_us,
                    threshold_us = u64::try_from(threshold.as_micros()).unwrap_or(u64::MAX),
                    sql = %self.display_sql(sql),
                    "slow query"
                );
            }
        }
    }
}

impl<C: GenericClient> GenericClient for InstrumentedClient<C> {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        self.run(None, sql, params)
    }

    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send {
        self.run(Some(tag), sql, params)
    }
}

/// Truncate at a char boundary no later than `max_bytes`.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
