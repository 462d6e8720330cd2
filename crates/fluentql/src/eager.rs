//! Embedded resource resolution.
//!
//! Every relation in a select expression costs exactly one extra query per
//! nesting level, however many parent rows there are:
//! - belongs-to: `SELECT ... FROM related WHERE <pk> IN (<distinct fks>)`
//! - has-many: `SELECT ... FROM related WHERE <fk> IN (<distinct parent pks>)`
//!
//! Results are spliced onto the parent rows in place; parent order is never
//! changed except by `!inner` filtering.

use crate::client::{Client, GenericClient};
use crate::condition::{FilterCondition, FilterSet, Operator};
use crate::error::{DbError, DbResult};
use crate::ident::sql_ident;
use crate::relation::{RelationKind, singularize};
use crate::row::{Row, value_key};
use crate::select::{ParsedSelect, RelationRequest, parse_select};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Resolve every relation of a select expression on `rows`, in order.
pub(crate) fn resolve_relations<'a, C: GenericClient>(
    client: &'a Client<C>,
    owner: &'a str,
    rows: &'a mut Vec<Row>,
    requests: &'a [RelationRequest],
) -> BoxFuture<'a, DbResult<()>> {
    Box::pin(async move {
        for request in requests {
            resolve_relation(client, owner, rows, request).await?;
        }
        Ok(())
    })
}

/// Resolve one relation on `rows` (rows of `owner`).
pub async fn resolve_relation<C: GenericClient>(
    client: &Client<C>,
    owner: &str,
    rows: &mut Vec<Row>,
    request: &RelationRequest,
) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let relation = client.relations().resolve(
        owner,
        &request.related_table,
        rows,
        client.config().relation_inference,
    )?;

    let inferred = client
        .relations()
        .get(owner, &request.related_table)
        .is_none();

    match relation.kind {
        RelationKind::BelongsTo => {
            load_belongs_to(client, rows, request, &relation.foreign_key).await?
        }
        RelationKind::HasMany => {
            match load_has_many(client, rows, request, &relation.foreign_key).await {
                // A guessed has-many link that the engine rejects is a relation problem.
                Err(DbError::Backend(message)) if inferred => {
                    return Err(DbError::relation(format!(
                        "inferred has-many '{related}.{fk}' -> '{owner}' failed: {message}; \
                         select '{candidate}' on '{owner}' for a belongs-to link, \
                         or register the pair",
                        related = request.related_table,
                        fk = relation.foreign_key,
                        candidate = format!("{}_id", singularize(&request.related_table)),
                    )));
                }
                other => other?,
            }
        }
    }

    if request.is_inner_join {
        let field = request.field_name();
        let before = rows.len();
        rows.retain(|row| match row.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        });
        tracing::trace!(
            target: "fluentql.relation",
            owner,
            related = %request.related_table,
            dropped = before - rows.len(),
            "inner join filtered parents"
        );
    }

    Ok(())
}

async fn load_belongs_to<C: GenericClient>(
    client: &Client<C>,
    rows: &mut [Row],
    request: &RelationRequest,
    foreign_key: &str,
) -> DbResult<()> {
    let field = request.field_name().to_string();
    let pk = client.config().primary_key.clone();

    let ids = distinct_keys(rows.iter().map(|row| row.get(foreign_key)));
    if ids.is_empty() {
        for row in rows.iter_mut() {
            row.insert(field.clone(), Value::Null);
        }
        return Ok(());
    }

    let fetched = fetch_related(client, request, &pk, ids).await?;

    let mut by_id: HashMap<String, Value> = HashMap::with_capacity(fetched.rows.len());
    for mut related in fetched.rows {
        let Some(key) = related.get(&pk).and_then(value_key) else {
            continue;
        };
        strip_columns(&mut related, &fetched.added);
        by_id.entry(key).or_insert(Value::Object(related));
    }

    for row in rows.iter_mut() {
        let value = row
            .get(foreign_key)
            .and_then(value_key)
            .and_then(|key| by_id.get(&key).cloned())
            .unwrap_or(Value::Null);
        row.insert(field.clone(), value);
    }
    Ok(())
}

async fn load_has_many<C: GenericClient>(
    client: &Client<C>,
    rows: &mut [Row],
    request: &RelationRequest,
    foreign_key: &str,
) -> DbResult<()> {
    let field = request.field_name().to_string();
    let pk = client.config().primary_key.clone();

    let parent_ids = distinct_keys(rows.iter().map(|row| row.get(&pk)));
    if parent_ids.is_empty() {
        for row in rows.iter_mut() {
            row.insert(field.clone(), Value::Array(Vec::new()));
        }
        return Ok(());
    }

    let fetched = fetch_related(client, request, foreign_key, parent_ids).await?;

    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
    for mut child in fetched.rows {
        let Some(key) = child.get(foreign_key).and_then(value_key) else {
            continue;
        };
        strip_columns(&mut child, &fetched.added);
        groups.entry(key).or_default().push(Value::Object(child));
    }

    for row in rows.iter_mut() {
        let children = row
            .get(&pk)
            .and_then(value_key)
            .and_then(|key| groups.get(&key).cloned())
            .unwrap_or_default();
        row.insert(field.clone(), Value::Array(children));
    }
    Ok(())
}

struct Fetched {
    rows: Vec<Row>,
    /// Columns selected only for key matching; removed before splicing.
    added: Vec<String>,
}

async fn fetch_related<C: GenericClient>(
    client: &Client<C>,
    request: &RelationRequest,
    key_column: &str,
    keys: Vec<Value>,
) -> DbResult<Fetched> {
    let mut parsed = parse_select(&request.columns)?;
    let mut added = Vec::new();
    if !parsed.selects(key_column) {
        parsed.ensure_column(key_column);
        added.push(key_column.to_string());
    }
    added.extend(add_relation_keys(client, &request.related_table, &mut parsed));

    let mut filters = FilterSet::new();
    filters.push(FilterCondition::new(
        key_column,
        Operator::In,
        Value::Array(keys),
    ));
    let clause = filters.compile()?;

    let sql = format!(
        "SELECT {} FROM {} {}",
        parsed.base_columns_sql()?,
        sql_ident(&request.related_table)?,
        clause.sql
    );
    let tag = format!("embed {}", request.related_table);
    let mut rows = client.query(&tag, &sql, &clause.params).await?;

    resolve_relations(client, &request.related_table, &mut rows, &parsed.relations).await?;

    Ok(Fetched { rows, added })
}

/// Make sure an explicit column list carries the keys its relations need:
/// the table's primary key plus any configured belongs-to FK.
///
/// Returns the columns that were appended.
pub(crate) fn add_relation_keys<C: GenericClient>(
    client: &Client<C>,
    table: &str,
    parsed: &mut ParsedSelect,
) -> Vec<String> {
    let mut added = Vec::new();
    if parsed.relations.is_empty() || parsed.is_star() {
        return added;
    }

    let mut wanted = vec![client.config().primary_key.clone()];
    for request in &parsed.relations {
        if let Some(relation) = client.relations().get(table, &request.related_table) {
            if relation.kind == RelationKind::BelongsTo {
                wanted.push(relation.foreign_key.clone());
            }
        }
    }

    for column in wanted {
        if !parsed.selects(&column) {
            parsed.ensure_column(&column);
            added.push(column);
        }
    }
    added
}

pub(crate) fn strip_columns(row: &mut Row, columns: &[String]) {
    for column in columns {
        row.shift_remove(column);
    }
}

/// Distinct non-null values in first-seen order.
fn distinct_keys<'r>(values: impl Iterator<Item = Option<&'r Value>>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.flatten() {
        if let Some(key) = value_key(value) {
            if seen.insert(key) {
                out.push(value.clone());
            }
        }
    }
    out
}
