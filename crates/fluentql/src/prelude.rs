//! Convenient imports for typical `fluentql` usage.
//!
//! ```ignore
//! use fluentql::prelude::*;
//! ```

pub use crate::{
    Client, ClientConfig, DbError, DbResult, Direction, Executable, Filterable, GenericClient,
    InstrumentedClient, MonitorConfig, Relations, Response, Row, RowExt,
};

#[cfg(feature = "sqlite")]
pub use crate::SqliteClient;
