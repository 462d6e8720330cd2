//! # fluentql
//!
//! A fluent, hosted-Postgres-style query builder that compiles to
//! parameterized SQL for an embedded engine.
//!
//! ## Features
//!
//! - **Familiar chains**: `.from(t).select(..).eq(..).order(..)`, `.insert()`, `.update()`,
//!   `.upsert()`, `.delete()`
//! - **Parameterized only**: every value is bound through a positional `?`; names are validated
//! - **Embedded resources**: `select("id, customers(name), invoice_items!inner(*)")` resolves
//!   related rows with one batched query per relation
//! - **Safe defaults**: UPDATE/DELETE require a filter unless `.all()` is called
//! - **`{ data, error }` results**: awaiting a chain never panics and never returns `Err`
//! - **Pluggable engine**: anything implementing [`GenericClient`]; SQLite ships behind the
//!   `sqlite` feature
//!
//! ## Example
//!
//! ```ignore
//! use fluentql::prelude::*;
//!
//! let db = SqliteClient::open_in_memory()?;
//! let client = Client::new(InstrumentedClient::new(db))
//!     .with_relations(Relations::load("relations.toml")?);
//!
//! let res = client
//!     .from("invoices")
//!     .select("id, number, total, customers(name, email), invoice_items(*)")
//!     .eq("status", "open")
//!     .order("due_date", Direction::Asc)
//!     .range(0, 24)
//!     .await;
//!
//! match res.error {
//!     None => println!("{} invoices", res.data.unwrap_or_default().len()),
//!     Some(err) => eprintln!("query failed: {err}"),
//! }
//! ```

pub mod client;
pub mod condition;
pub mod config;
pub mod eager;
pub mod error;
pub mod ident;
pub mod monitor;
pub mod prelude;
pub mod qb;
pub mod relation;
pub mod response;
pub mod row;
pub mod select;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use client::{Client, GenericClient};
pub use condition::{FilterCondition, FilterSet, Operator, WhereClause, compile_where};
pub use config::{ClientConfig, RelationInference};
pub use error::{DbError, DbResult};
pub use ident::{Ident, IdentPart};
pub use monitor::{InstrumentedClient, MonitorConfig, QueryStatsSnapshot, QueryType};
pub use qb::{
    DeleteBuilder, Direction, Executable, Filterable, InsertBuilder, OrderSpec, QueryBuilder,
    SelectBuilder, SingleBuilder, UpdateBuilder, UpsertBuilder,
};
pub use relation::{Relation, RelationKind, Relations};
pub use response::Response;
pub use row::{Row, RowExt, from_row, from_rows};
pub use select::{ParsedSelect, RelationRequest, parse_select};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteClient;
