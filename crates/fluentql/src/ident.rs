//! SQL identifier validation.
//!
//! Table names, column names and relation keys are interpolated into the
//! generated SQL, so every name that reaches a builder goes through [`Ident`].
//!
//! - Bare segments must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted segments (`"Mixed Case"`) allow anything except NUL; `"` is escaped as `""`
//! - Segments may be dotted: `main.invoices`, `invoices.total`

use crate::error::{DbError, DbResult};

/// One dot-separated segment of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Unquoted(String),
    Quoted(String),
}

impl IdentPart {
    fn render(&self) -> String {
        match self {
            IdentPart::Unquoted(name) => name.clone(),
            IdentPart::Quoted(name) => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

/// A validated SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    pub fn parse(raw: &str) -> DbResult<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DbError::validation("Identifier cannot be empty"));
        }
        if name.contains('\0') {
            return Err(DbError::validation("Identifier cannot contain NUL character"));
        }

        let parts = split_segments(name)?
            .into_iter()
            .map(|segment| parse_segment(name, segment))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Self { parts })
    }

    pub fn to_sql(&self) -> String {
        self.parts
            .iter()
            .map(IdentPart::render)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Split on dots outside of double quotes.
fn split_segments(name: &str) -> DbResult<Vec<&str>> {
    let mut segments = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in name.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => {
                segments.push(&name[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return Err(DbError::validation(format!(
            "Unclosed quoted identifier in '{name}'"
        )));
    }
    segments.push(&name[start..]);
    Ok(segments)
}

fn parse_segment(name: &str, segment: &str) -> DbResult<IdentPart> {
    if segment.is_empty() {
        return Err(DbError::validation(format!("Empty segment in identifier '{name}'")));
    }

    if let Some(inner) = segment.strip_prefix('"') {
        let body = inner.strip_suffix('"').ok_or_else(|| {
            DbError::validation(format!("Unexpected text after quotes in '{name}'"))
        })?;
        // A doubled quote is the only legal quote inside the body.
        if body.is_empty() || body.replace("\"\"", "").contains('"') {
            return Err(DbError::validation(format!("Malformed quoted identifier '{name}'")));
        }
        return Ok(IdentPart::Quoted(body.replace("\"\"", "\"")));
    }

    let mut chars = segment.chars();
    let leads_ok = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
    let bad = if leads_ok {
        chars.find(|&c| !(c == '_' || c == '$' || c.is_ascii_alphanumeric()))
    } else {
        segment.chars().next()
    };
    match bad {
        Some(c) => Err(DbError::validation(format!(
            "Invalid character in identifier '{name}': '{c}'"
        ))),
        None => Ok(IdentPart::Unquoted(segment.to_string())),
    }
}

/// Validate `name` and return its SQL rendering.
pub(crate) fn sql_ident(name: &str) -> DbResult<String> {
    Ident::parse(name).map(|ident| ident.to_sql())
}
