//! Filter conditions and the WHERE-clause compiler.
//!
//! Filters are an ordered list of [`FilterCondition`]s joined with `AND`.
//! There is no `OR` and no parenthesized grouping: a chain of `.eq()`/`.gt()`/...
//! calls always narrows the result set.
//!
//! Placeholders are positional `?` markers; [`WhereClause::params`] holds the
//! bound values in the same left-to-right order.

use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`FilterCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `LIKE`
    Like,
    /// Case-insensitive `LIKE`
    ILike,
    /// `IN (...)`
    In,
    /// Nullity test: `IS NULL` when the value is null, `IS NOT NULL` otherwise
    Is,
}

impl Operator {
    /// The SQL spelling used by the compiler.
    ///
    /// `ILIKE` compiles to `LIKE`: the targeted engine already matches ASCII
    /// case-insensitively.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like | Operator::ILike => "LIKE",
            Operator::In => "IN",
            Operator::Is => "IS",
        }
    }
}

impl FromStr for Operator {
    type Err = DbError;

    /// Accepts both the client names (`eq`, `neq`, `ilike`, ...) and SQL symbols (`=`, `<>`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" => Operator::Eq,
            "neq" | "!=" | "<>" => Operator::Neq,
            "gt" | ">" => Operator::Gt,
            "gte" | ">=" => Operator::Gte,
            "lt" | "<" => Operator::Lt,
            "lte" | "<=" => Operator::Lte,
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            "in" => Operator::In,
            "is" => Operator::Is,
            other => {
                return Err(DbError::validation(format!(
                    "Unsupported filter operator '{other}'"
                )));
            }
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One `column <op> value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
    /// `NOT <op>`
    pub negated: bool,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
            negated: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// A positive `IN` over an empty list: no row can ever match.
    pub fn is_unsatisfiable(&self) -> bool {
        self.operator == Operator::In
            && !self.negated
            && matches!(&self.value, Value::Array(values) if values.is_empty())
    }
}

/// Compiled WHERE clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    /// `WHERE ...`, or empty when there are no conditions
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Compile an ordered list of conditions into a parameterized `WHERE` clause.
pub fn compile_where(conditions: &[FilterCondition]) -> DbResult<WhereClause> {
    if conditions.is_empty() {
        return Ok(WhereClause::default());
    }

    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();

    for cond in conditions {
        let col = sql_ident(&cond.column)?;
        match cond.operator {
            Operator::Is => {
                let is_null = cond.value.is_null() != cond.negated;
                let test = if is_null { "IS NULL" } else { "IS NOT NULL" };
                parts.push(format!("{col} {test}"));
            }
            Operator::In => {
                let Value::Array(values) = &cond.value else {
                    return Err(DbError::validation(format!(
                        "IN filter on '{}' expects an array value",
                        cond.column
                    )));
                };
                if values.is_empty() {
                    if cond.negated {
                        parts.push("1 = 1".to_string());
                        continue;
                    }
                    return Err(DbError::EmptyInList {
                        column: cond.column.clone(),
                    });
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                let not = if cond.negated { "NOT " } else { "" };
                parts.push(format!("{col} {not}IN ({placeholders})"));
                params.extend(values.iter().cloned());
            }
            Operator::Like | Operator::ILike if cond.negated => {
                parts.push(format!("{col} NOT LIKE ?"));
                params.push(cond.value.clone());
            }
            op if cond.negated => {
                parts.push(format!("NOT ({col} {op} ?)"));
                params.push(cond.value.clone());
            }
            op => {
                parts.push(format!("{col} {op} ?"));
                params.push(cond.value.clone());
            }
        }
    }

    Ok(WhereClause {
        sql: format!("WHERE {}", parts.join(" AND ")),
        params,
    })
}

/// The filter list accumulated by a builder.
///
/// Operator strings that fail to parse are remembered and reported when the
/// builder executes, so chaining never fails midway.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    conditions: Vec<FilterCondition>,
    error: Option<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: FilterCondition) {
        self.conditions.push(condition);
    }

    /// Append a condition whose operator is given as a string (`"eq"`, `">="`, ...).
    pub fn push_parsed(&mut self, column: &str, operator: &str, value: Value, negated: bool) {
        match operator.parse::<Operator>() {
            Ok(op) => {
                let mut cond = FilterCondition::new(column, op, value);
                cond.negated = negated;
                self.conditions.push(cond);
            }
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err.to_string());
                }
            }
        }
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Column of the first positive empty `IN`, if any.
    pub fn unsatisfiable_column(&self) -> Option<&str> {
        self.conditions
            .iter()
            .find(|c| c.is_unsatisfiable())
            .map(|c| c.column.as_str())
    }

    /// Report the first operator string that failed to parse.
    pub fn validate(&self) -> DbResult<()> {
        match &self.error {
            Some(err) => Err(DbError::Validation(err.clone())),
            None => Ok(()),
        }
    }

    /// Compile to a WHERE clause, surfacing any deferred operator error first.
    pub fn compile(&self) -> DbResult<WhereClause> {
        self.validate()?;
        compile_where(&self.conditions)
    }
}
