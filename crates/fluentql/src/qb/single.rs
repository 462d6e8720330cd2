use super::traits::Executable;
use crate::response::Response;
use crate::row::Row;
use std::marker::PhantomData;

/// Wraps a row-returning builder and keeps only the first row.
///
/// Zero rows is not an error: the response is `{ data: None, error: None }`.
/// A failed inner builder keeps its error.
pub struct SingleBuilder<'a, B> {
    inner: B,
    _marker: PhantomData<&'a ()>,
}

impl<B: Clone> Clone for SingleBuilder<'_, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<'a, B> SingleBuilder<'a, B>
where
    B: Executable<Data = Vec<Row>> + 'a,
{
    pub(crate) fn new(inner: B) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// The wrapped builder.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<'a, B> Executable for SingleBuilder<'a, B>
where
    B: Executable<Data = Vec<Row>> + 'a,
{
    type Data = Row;

    fn execute(self) -> impl std::future::Future<Output = Response<Row>> + Send {
        async move {
            let response = self.inner.execute().await;
            Response {
                data: response.data.and_then(|rows| rows.into_iter().next()),
                error: response.error,
            }
        }
    }
}

impl<'a, B> std::future::IntoFuture for SingleBuilder<'a, B>
where
    B: Executable<Data = Vec<Row>> + 'a,
{
    type Output = Response<Row>;
    type IntoFuture = futures_util::future::BoxFuture<'a, Response<Row>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(Executable::execute(self))
    }
}
