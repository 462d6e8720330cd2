//! Relationship configuration for embedded resources.
//!
//! A [`Relations`] table maps `(owner_table, related_table)` to the foreign key
//! that links them and the direction of the link:
//!
//! - [`RelationKind::BelongsTo`]: the FK lives on the owner row and points at
//!   the related table's primary key (`invoices.customer_id -> customers.id`).
//! - [`RelationKind::HasMany`]: the FK lives on the related rows and points at
//!   the owner's primary key (`invoice_items.invoice_id -> invoices.id`).
//!
//! Pairs missing from the table can fall back to naming-convention inference
//! (see [`RelationInference`]). Inference is a heuristic: irregular plurals
//! (`statuses`, `people`) do not singularize correctly, so production schemas
//! should register every pair they embed. Inference only sees columns the
//! owner rows actually carry: with an explicit column list that leaves out
//! `<singular>_id`, the pair is guessed as has-many, and a guess the engine
//! rejects is reported as a relation error.

use crate::config::RelationInference;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Direction of a relationship, seen from the owner table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasMany,
}

/// How an owner table reaches a related table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub foreign_key: String,
    pub kind: RelationKind,
}

impl Relation {
    pub fn belongs_to(foreign_key: impl Into<String>) -> Self {
        Self {
            foreign_key: foreign_key.into(),
            kind: RelationKind::BelongsTo,
        }
    }

    pub fn has_many(foreign_key: impl Into<String>) -> Self {
        Self {
            foreign_key: foreign_key.into(),
            kind: RelationKind::HasMany,
        }
    }
}

/// Static `(owner, related) -> Relation` table.
#[derive(Debug, Clone, Default)]
pub struct Relations {
    entries: HashMap<(String, String), Relation>,
}

#[derive(Debug, Deserialize)]
struct RelationFile {
    #[serde(default, rename = "relation")]
    relations: Vec<RelationEntry>,
}

#[derive(Debug, Deserialize)]
struct RelationEntry {
    table: String,
    related: String,
    foreign_key: String,
    kind: RelationKind,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation for `(owner, related)`, replacing any previous entry.
    pub fn insert(&mut self, owner: &str, related: &str, relation: Relation) {
        self.entries
            .insert((owner.to_string(), related.to_string()), relation);
    }

    /// `owner.foreign_key` references `related.<pk>`.
    pub fn belongs_to(mut self, owner: &str, related: &str, foreign_key: &str) -> Self {
        self.insert(owner, related, Relation::belongs_to(foreign_key));
        self
    }

    /// `related.foreign_key` references `owner.<pk>`.
    pub fn has_many(mut self, owner: &str, related: &str, foreign_key: &str) -> Self {
        self.insert(owner, related, Relation::has_many(foreign_key));
        self
    }

    /// Register both directions of `child.foreign_key -> parent.<pk>`.
    pub fn foreign_key(self, child: &str, foreign_key: &str, parent: &str) -> Self {
        self.belongs_to(child, parent, foreign_key)
            .has_many(parent, child, foreign_key)
    }

    pub fn get(&self, owner: &str, related: &str) -> Option<&Relation> {
        self.entries
            .get(&(owner.to_string(), related.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a TOML relation table:
    ///
    /// ```toml
    /// [[relation]]
    /// table = "invoices"
    /// related = "customers"
    /// foreign_key = "customer_id"
    /// kind = "belongs_to"
    /// ```
    pub fn from_toml_str(raw: &str) -> DbResult<Self> {
        let file: RelationFile = toml::from_str(raw)?;
        let mut relations = Self::new();
        for entry in file.relations {
            relations.insert(
                &entry.table,
                &entry.related,
                Relation {
                    foreign_key: entry.foreign_key,
                    kind: entry.kind,
                },
            );
        }
        Ok(relations)
    }

    /// Load a TOML relation table from disk.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DbError::Config(format!(
                "failed to read relation config {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Find the relation for `(owner, related)`: explicit entry first, then
    /// inference from the already-fetched owner rows when `policy` allows it.
    pub fn resolve(
        &self,
        owner: &str,
        related: &str,
        owner_rows: &[Row],
        policy: RelationInference,
    ) -> DbResult<Relation> {
        if let Some(relation) = self.get(owner, related) {
            return Ok(relation.clone());
        }
        match policy {
            RelationInference::NamingConvention => infer(owner, related, owner_rows),
            RelationInference::Disabled => Err(DbError::relation(format!(
                "no relation configured between '{owner}' and '{related}'"
            ))),
        }
    }
}

/// Naming-convention inference.
///
/// Belongs-to when an owner row carries `<singular(related)>_id` (or
/// `<related>_id`); otherwise has-many through `<singular(owner)>_id` on the
/// related table. Two distinct candidate columns present at once is an error.
pub fn infer(owner: &str, related: &str, owner_rows: &[Row]) -> DbResult<Relation> {
    let mut candidates = vec![format!("{}_id", singularize(related))];
    let exact = format!("{related}_id");
    if !candidates.contains(&exact) {
        candidates.push(exact);
    }

    let present: Vec<&String> = candidates
        .iter()
        .filter(|col| owner_rows.iter().any(|row| row.contains_key(col.as_str())))
        .collect();

    match present.as_slice() {
        [fk] => Ok(Relation::belongs_to(fk.as_str())),
        [] => {
            let fk = format!("{}_id", singularize(owner));
            if fk == format!("{owner}_id") && !owner.ends_with('s') {
                tracing::debug!(
                    target: "fluentql.relation",
                    owner,
                    related,
                    "owner table name does not look plural; inferring '{fk}'"
                );
            }
            Ok(Relation::has_many(fk))
        }
        _ => Err(DbError::relation(format!(
            "ambiguous relation between '{owner}' and '{related}': rows carry both {}; \
             register the pair explicitly",
            present
                .iter()
                .map(|c| format!("'{c}'"))
                .collect::<Vec<_>>()
                .join(" and ")
        ))),
    }
}

/// English singularization for snake_case table names.
///
/// Only the last segment changes: `invoice_items` -> `invoice_item`.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "xes", "ches", "shes", "zzes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}
