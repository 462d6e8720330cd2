//! The `{ data, error }` result returned by every awaited builder.

use crate::error::{DbError, DbResult};
use crate::row::{Row, from_row, from_rows};
use serde::de::DeserializeOwned;

/// Outcome of an executed chain.
///
/// Exactly one of the following holds:
/// - success: `error` is `None`; `data` is `Some` (or `None` for a
///   [`single`](crate::qb::SelectBuilder::single) that matched nothing)
/// - failure: `data` is `None` and `error` carries the cause
#[derive(Debug)]
pub struct Response<T> {
    pub data: Option<T>,
    pub error: Option<DbError>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: DbError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert to a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> DbResult<Option<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            data: self.data.map(f),
            error: self.error,
        }
    }
}

impl Response<Vec<Row>> {
    /// Decode every row into `T`.
    pub fn rows_as<T: DeserializeOwned>(self) -> DbResult<Vec<T>> {
        match self.into_result()? {
            Some(rows) => from_rows(rows),
            None => Ok(Vec::new()),
        }
    }
}

impl Response<Row> {
    /// Decode the single row into `T`, if there is one.
    pub fn row_as<T: DeserializeOwned>(self) -> DbResult<Option<T>> {
        self.into_result()?.map(from_row).transpose()
    }
}

impl<T> From<DbResult<T>> for Response<T> {
    fn from(result: DbResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(err),
        }
    }
}
