//! Trait definitions shared by the builders.

use crate::condition::{FilterCondition, FilterSet, Operator};
use crate::response::Response;
use serde_json::Value;

/// Filter methods for builders that carry a WHERE clause.
///
/// Every call appends one condition; conditions are ANDed in call order.
pub trait Filterable: Sized {
    /// Access the accumulated filters.
    fn filters_mut(&mut self) -> &mut FilterSet;

    /// Append a prebuilt condition.
    fn where_condition(mut self, condition: FilterCondition) -> Self {
        self.filters_mut().push(condition);
        self
    }

    /// `column = value`
    fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Eq, value.into()))
    }

    /// `column != value`
    fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Neq, value.into()))
    }

    /// `column > value`
    fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Gt, value.into()))
    }

    /// `column >= value`
    fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Gte, value.into()))
    }

    /// `column < value`
    fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Lt, value.into()))
    }

    /// `column <= value`
    fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Lte, value.into()))
    }

    /// `column LIKE pattern`
    fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Like, pattern.into()))
    }

    /// Case-insensitive `LIKE`.
    fn ilike(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::ILike, pattern.into()))
    }

    /// Nullity test: `IS NULL` for a null value, `IS NOT NULL` otherwise.
    fn is(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(FilterCondition::new(column, Operator::Is, value.into()))
    }

    /// `column IN (values...)`.
    ///
    /// An empty list matches nothing: the builder returns an empty result
    /// without executing a query.
    fn in_<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.where_condition(FilterCondition::new(
            column,
            Operator::In,
            Value::Array(values),
        ))
    }

    /// Negated filter: `.not("status", "eq", "void")`.
    fn not(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.filters_mut()
            .push_parsed(column, operator, value.into(), true);
        self
    }

    /// Filter with an operator given by name: `.filter("total", "gte", 100)`.
    fn filter(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.filters_mut()
            .push_parsed(column, operator, value.into(), false);
        self
    }
}

/// A builder that can be run to completion.
///
/// Execution consumes the builder. Failures never escape as `Err`: they are
/// carried in [`Response::error`].
pub trait Executable: Sized + Send {
    type Data: Send;

    fn execute(self) -> impl std::future::Future<Output = Response<Self::Data>> + Send;
}

/// Implement `IntoFuture` for a builder so the chain can be `.await`ed directly.
macro_rules! impl_into_future {
    ($builder:ident) => {
        impl<'a, C: $crate::client::GenericClient + 'a> std::future::IntoFuture
            for $builder<'a, C>
        {
            type Output = $crate::response::Response<Vec<$crate::row::Row>>;
            type IntoFuture = futures_util::future::BoxFuture<'a, Self::Output>;

            fn into_future(self) -> Self::IntoFuture {
                Box::pin($crate::qb::Executable::execute(self))
            }
        }
    };
}

pub(crate) use impl_into_future;
