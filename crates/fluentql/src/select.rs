//! Parser for select expressions with embedded resources.
//!
//! ```text
//! "id, number, total, customers(name, email), items:invoice_items!inner(*)"
//! ```
//!
//! Top-level items of the form `[alias:]table[!hint](columns)` are relation
//! requests; everything else is a base column. `columns` is kept verbatim and
//! may itself contain nested relations.

use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;

/// One embedded resource requested in a select expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRequest {
    pub related_table: String,
    /// Field name override (`alias:table(...)`)
    pub alias: Option<String>,
    /// Raw column expression inside the parentheses
    pub columns: String,
    pub is_inner_join: bool,
}

impl RelationRequest {
    /// Key under which resolved rows are spliced onto the parent.
    pub fn field_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.related_table)
    }
}

/// Result of [`parse_select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelect {
    /// Comma-separated base columns, or `*`
    pub base_columns: String,
    pub relations: Vec<RelationRequest>,
}

impl ParsedSelect {
    pub fn is_star(&self) -> bool {
        self.base_columns == "*"
    }

    /// Base column list for SQL, with `alias:col` rewritten to `col AS alias`
    /// and every name validated.
    pub fn base_columns_sql(&self) -> DbResult<String> {
        compile_columns(&self.base_columns)
    }

    /// Whether the base list already selects `column` (by source name).
    pub fn selects(&self, column: &str) -> bool {
        self.is_star()
            || self.base_columns.split(',').any(|item| {
                let item = item.trim();
                let source = item.split_once(':').map_or(item, |(_, source)| source);
                source.trim() == column
            })
    }

    /// Append `column` to the base list unless it is already selected.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.selects(column) {
            self.base_columns.push_str(", ");
            self.base_columns.push_str(column);
        }
    }
}

/// Parse a select expression into base columns and relation requests.
pub fn parse_select(expr: &str) -> DbResult<ParsedSelect> {
    let mut base = Vec::new();
    let mut relations = Vec::new();

    for item in split_top_level(expr)? {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        match item.find('(') {
            Some(open) => relations.push(parse_relation(item, open)?),
            None => base.push(item.to_string()),
        }
    }

    let base_columns = if base.is_empty() {
        "*".to_string()
    } else {
        base.join(", ")
    };

    Ok(ParsedSelect {
        base_columns,
        relations,
    })
}

/// Split on commas that are not nested inside parentheses.
fn split_top_level(expr: &str) -> DbResult<Vec<&str>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    DbError::validation(format!("Unbalanced ')' in select expression '{expr}'"))
                })?;
            }
            ',' if depth == 0 => {
                items.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(DbError::validation(format!(
            "Unbalanced '(' in select expression '{expr}'"
        )));
    }
    items.push(&expr[start..]);
    Ok(items)
}

fn parse_relation(item: &str, open: usize) -> DbResult<RelationRequest> {
    if !item.ends_with(')') {
        return Err(DbError::validation(format!(
            "Unexpected text after relation in select expression: '{item}'"
        )));
    }
    let head = item[..open].trim();
    let columns = item[open + 1..item.len() - 1].trim();

    let (alias, target) = match head.split_once(':') {
        Some((alias, target)) => (Some(alias.trim().to_string()), target.trim()),
        None => (None, head),
    };
    let (table, hint) = match target.split_once('!') {
        Some((table, hint)) => (table.trim(), Some(hint.trim())),
        None => (target, None),
    };
    let is_inner_join = match hint {
        None | Some("left") => false,
        Some("inner") => true,
        Some(other) => {
            return Err(DbError::validation(format!(
                "Unsupported relation hint '!{other}' on '{table}'"
            )));
        }
    };

    sql_ident(table)?;
    if let Some(alias) = &alias {
        sql_ident(alias)?;
    }

    Ok(RelationRequest {
        related_table: table.to_string(),
        alias,
        columns: if columns.is_empty() {
            "*".to_string()
        } else {
            columns.to_string()
        },
        is_inner_join,
    })
}

/// Validate a plain column list and render it as SQL.
fn compile_columns(columns: &str) -> DbResult<String> {
    let mut out = Vec::new();
    for item in columns.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if item == "*" {
            out.push("*".to_string());
            continue;
        }
        match item.split_once(':') {
            Some((alias, source)) => {
                out.push(format!("{} AS {}", sql_ident(source)?, sql_ident(alias)?));
            }
            None => out.push(sql_ident(item)?),
        }
    }
    if out.is_empty() {
        return Ok("*".to_string());
    }
    Ok(out.join(", "))
}
