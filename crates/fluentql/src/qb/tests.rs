use super::*;
use crate::config::{ClientConfig, RelationInference};
use crate::relation::Relations;
use crate::response::Response;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
struct Call {
    tag: String,
    sql: String,
    params: Vec<Value>,
}

/// Records every statement and answers from a queue (empty result once drained).
#[derive(Default)]
struct RecordingClient {
    responses: Mutex<VecDeque<DbResult<Vec<Row>>>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingClient {
    fn with_rows(batches: Vec<Value>) -> Self {
        let client = Self::default();
        for batch in batches {
            client.push_rows(batch);
        }
        client
    }

    fn push_rows(&self, rows: Value) {
        let rows: Vec<Row> = serde_json::from_value(rows).unwrap();
        self.responses.lock().unwrap().push_back(Ok(rows));
    }

    fn push_error(&self, err: DbError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    fn answer(&self, tag: &str, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.calls.lock().unwrap().push(Call {
            tag: tag.to_string(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl GenericClient for RecordingClient {
    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.answer("-", sql, params)
    }

    async fn execute_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.answer(tag, sql, params)
    }
}

fn client(db: RecordingClient) -> Client<RecordingClient> {
    Client::new(db)
}

fn as_json(response: Response<Vec<Row>>) -> Value {
    assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
    Value::Array(
        response
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Value::Object)
            .collect(),
    )
}

// ==================== SELECT ====================

#[tokio::test]
async fn select_compiles_filters_order_and_range() {
    let client = client(RecordingClient::default());
    let res = client
        .from("invoices")
        .select("id, total")
        .eq("status", "open")
        .gte("total", 100)
        .in_("customer_id", ["c1", "c2"])
        .order("due_date", Direction::Desc)
        .order("id", Direction::Asc)
        .range(10, 19)
        .await;
    assert!(res.is_ok());

    let calls = client.executor().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].sql,
        "SELECT id, total FROM invoices WHERE status = ? AND total >= ? AND customer_id IN (?, ?) \
         ORDER BY due_date DESC, id ASC LIMIT 10 OFFSET 10"
    );
    assert_eq!(calls[0].params, vec![json!("open"), json!(100), json!("c1"), json!("c2")]);
    assert_eq!(calls[0].tag, "select invoices");
}

#[tokio::test]
async fn to_sql_does_not_execute() {
    let client = client(RecordingClient::default());
    let (sql, params) = client
        .from("bills")
        .select("*")
        .is("paid_at", Value::Null)
        .not("status", "eq", "void")
        .ilike("memo", "%rent%")
        .limit(5)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM bills WHERE paid_at IS NULL AND NOT (status = ?) AND memo LIKE ? LIMIT 5"
    );
    assert_eq!(params, vec![json!("void"), json!("%rent%")]);
    assert!(client.executor().calls().is_empty());
}

#[tokio::test]
async fn empty_in_list_short_circuits() {
    let client = client(RecordingClient::default());

    let res = client
        .from("invoices")
        .select("*")
        .eq("status", "open")
        .in_("id", Vec::<String>::new())
        .await;
    assert_eq!(as_json(res), json!([]));

    let single = client
        .from("invoices")
        .select("*")
        .in_("id", Vec::<i64>::new())
        .single()
        .await;
    assert!(single.data.is_none());
    assert!(single.error.is_none());

    let updated = client
        .from("invoices")
        .update(json!({"status": "void"}))
        .in_("id", Vec::<i64>::new())
        .await;
    assert_eq!(as_json(updated), json!([]));

    assert!(client.executor().calls().is_empty());
}

#[tokio::test]
async fn single_unwraps_first_row_and_keeps_errors() {
    let db = RecordingClient::with_rows(vec![json!([{"id": 1}])]);
    db.push_error(DbError::backend("disk I/O error"));
    let client = client(db);

    let first = client.from("invoices").select("id").eq("id", 1).single().await;
    assert_eq!(first.data.map(Value::Object), Some(json!({"id": 1})));
    assert!(client.executor().sql()[0].ends_with("LIMIT 1"));

    let failed = client.from("invoices").select("id").single().await;
    assert!(failed.data.is_none());
    assert!(failed.error.is_some_and(|e| e.is_backend_error()));

    let none = client.from("invoices").select("id").eq("id", 404).single().await;
    assert!(none.data.is_none());
    assert!(none.error.is_none());
}

#[tokio::test]
async fn invalid_builder_state_is_reported_not_executed() {
    let client = client(RecordingClient::default());

    let bad_op = client.from("invoices").select("*").filter("total", "between", 1).await;
    assert!(bad_op.error.is_some_and(|e| e.is_contract_violation()));

    let bad_range = client.from("invoices").select("*").range(5, 1).await;
    assert!(bad_range.error.is_some_and(|e| e.is_contract_violation()));

    let bad_column = client.from("invoices").select("id; DROP TABLE invoices").await;
    assert!(bad_column.error.is_some_and(|e| e.is_contract_violation()));

    assert!(client.executor().calls().is_empty());
}

#[tokio::test]
async fn oversized_windows_are_rejected_not_wrapped() {
    let client = client(RecordingClient::default());

    let full = client.from("invoices").select("id").range(0, u64::MAX).await;
    assert!(full.error.is_some_and(|e| e.is_contract_violation()));

    let far = client.from("invoices").select("id").range(u64::MAX - 1, u64::MAX).await;
    assert!(far.error.is_some_and(|e| e.is_contract_violation()));

    let huge = client.from("invoices").select("id").limit(u64::MAX).await;
    assert!(huge.error.is_some_and(|e| e.is_contract_violation()));
    assert!(client.executor().calls().is_empty());

    let max = i64::MAX as u64;
    let (sql, _) = client.from("invoices").select("id").range(0, max - 1).to_sql().unwrap();
    assert_eq!(sql, format!("SELECT id FROM invoices LIMIT {max} OFFSET 0"));
}

// ==================== Relations ====================

#[tokio::test]
async fn belongs_to_is_batched_and_null_safe() {
    let db = RecordingClient::with_rows(vec![
        json!([
            {"id": 1, "customer_id": "c1"},
            {"id": 2, "customer_id": null},
            {"id": 3, "customer_id": "c1"}
        ]),
        json!([{"name": "Acme", "id": "c1"}]),
    ]);
    let client = client(db);

    let res = client.from("invoices").select("*, customers(name)").await;
    assert_eq!(
        as_json(res),
        json!([
            {"id": 1, "customer_id": "c1", "customers": {"name": "Acme"}},
            {"id": 2, "customer_id": null, "customers": null},
            {"id": 3, "customer_id": "c1", "customers": {"name": "Acme"}}
        ])
    );

    let calls = client.executor().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].sql, "SELECT name, id FROM customers WHERE id IN (?)");
    assert_eq!(calls[1].params, vec![json!("c1")]);
    assert_eq!(calls[1].tag, "embed customers");
}

#[tokio::test]
async fn has_many_groups_children_and_defaults_to_empty() {
    let db = RecordingClient::with_rows(vec![
        json!([{"id": "a", "number": 1}, {"id": "b", "number": 2}]),
        json!([
            {"sku": "x", "invoice_id": "a"},
            {"sku": "y", "invoice_id": "a"}
        ]),
    ]);
    let client = client(db).with_relations(Relations::new().has_many(
        "invoices",
        "invoice_items",
        "invoice_id",
    ));

    let res = client
        .from("invoices")
        .select("id, number, lines:invoice_items(sku)")
        .await;
    assert_eq!(
        as_json(res),
        json!([
            {"id": "a", "number": 1, "lines": [{"sku": "x"}, {"sku": "y"}]},
            {"id": "b", "number": 2, "lines": []}
        ])
    );
    assert_eq!(
        client.executor().sql()[1],
        "SELECT sku, invoice_id FROM invoice_items WHERE invoice_id IN (?, ?)"
    );
}

#[tokio::test]
async fn inner_join_drops_unmatched_parents_in_order() {
    let db = RecordingClient::with_rows(vec![
        json!([
            {"id": 1, "customer_id": "c1"},
            {"id": 2, "customer_id": null},
            {"id": 3, "customer_id": "c2"},
            {"id": 4, "customer_id": "c1"}
        ]),
        json!([{"id": "c1", "name": "Acme"}]),
    ]);
    let client = client(db);

    let res = client.from("invoices").select("id, customer_id, customers!inner(*)").await;
    let ids: Vec<Value> = as_json(res)
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(1), json!(4)]);
}

#[tokio::test]
async fn base_select_gains_and_loses_relation_keys() {
    let db = RecordingClient::with_rows(vec![
        json!([{"number": 7, "id": "inv1", "customer_id": "c1"}]),
        json!([{"id": "c1", "name": "Acme"}]),
    ]);
    let client = client(db).with_relations(Relations::new().belongs_to(
        "invoices",
        "customers",
        "customer_id",
    ));

    let res = client.from("invoices").select("number, customers(id, name)").await;
    assert_eq!(
        as_json(res),
        json!([{"number": 7, "customers": {"id": "c1", "name": "Acme"}}])
    );
    assert_eq!(
        client.executor().sql()[0],
        "SELECT number, id, customer_id FROM invoices"
    );
}

#[tokio::test]
async fn nested_relations_resolve_recursively() {
    let db = RecordingClient::with_rows(vec![
        json!([{"id": "inv1"}]),
        json!([{"qty": 2, "invoice_id": "inv1", "id": "it1", "product_id": "p1"}]),
        json!([{"name": "Widget", "id": "p1"}]),
    ]);
    let client = client(db).with_relations(
        Relations::new()
            .foreign_key("invoice_items", "invoice_id", "invoices")
            .foreign_key("invoice_items", "product_id", "products"),
    );

    let res = client
        .from("invoices")
        .select("id, invoice_items(qty, products(name))")
        .await;
    assert_eq!(
        as_json(res),
        json!([{"id": "inv1", "invoice_items": [{"qty": 2, "products": {"name": "Widget"}}]}])
    );

    let sql = client.executor().sql();
    assert_eq!(
        sql[1],
        "SELECT qty, invoice_id, id, product_id FROM invoice_items WHERE invoice_id IN (?)"
    );
    assert_eq!(sql[2], "SELECT name, id FROM products WHERE id IN (?)");
}

#[tokio::test]
async fn relations_are_skipped_for_empty_results() {
    let client = client(RecordingClient::default());
    let res = client.from("invoices").select("*, customers(*)").eq("id", 0).await;
    assert_eq!(as_json(res), json!([]));
    assert_eq!(client.executor().calls().len(), 1);
}

#[tokio::test]
async fn disabled_inference_surfaces_relation_error() {
    let db = RecordingClient::with_rows(vec![json!([{"id": 1, "customer_id": "c1"}])]);
    let client = client(db).with_config(
        ClientConfig::new().relation_inference(RelationInference::Disabled),
    );

    let res = client.from("invoices").select("*, customers(*)").await;
    assert!(res.data.is_none());
    assert!(res.error.is_some_and(|e| e.is_relation_error()));
}

#[tokio::test]
async fn ambiguous_inference_surfaces_relation_error() {
    let db = RecordingClient::with_rows(vec![json!([
        {"id": 1, "customer_id": "c1", "customers_id": "c2"}
    ])]);
    let client = client(db);

    let res = client.from("invoices").select("*, customers(*)").await;
    assert!(res.data.is_none());
    assert!(res.error.is_some_and(|e| e.is_relation_error()));
    assert_eq!(client.executor().calls().len(), 1);
}

#[tokio::test]
async fn rejected_has_many_guess_is_a_relation_error() {
    let db = RecordingClient::with_rows(vec![json!([{"number": 1, "id": "inv1"}])]);
    db.push_error(DbError::backend("no such column: invoice_id"));
    let client = client(db);

    let res = client.from("invoices").select("number, customers(name)").await;
    let err = res.error.unwrap();
    assert!(err.is_relation_error(), "{err:?}");
    assert!(err.to_string().contains("customer_id"));

    let sql = client.executor().sql();
    assert_eq!(sql[1], "SELECT name, invoice_id FROM customers WHERE invoice_id IN (?)");
}

#[tokio::test]
async fn configured_has_many_keeps_backend_errors() {
    let db = RecordingClient::with_rows(vec![json!([{"id": "inv1"}])]);
    db.push_error(DbError::backend("disk I/O error"));
    let client = client(db)
        .with_relations(Relations::new().has_many("invoices", "invoice_items", "invoice_id"));

    let res = client.from("invoices").select("id, invoice_items(*)").await;
    assert!(res.error.is_some_and(|e| e.is_backend_error()));
}

#[tokio::test]
async fn single_limits_before_inner_filtering() {
    let db = RecordingClient::with_rows(vec![
        json!([{"id": "i1", "customer_id": null}]),
    ]);
    let client = client(db);

    let res = client
        .from("invoices")
        .select("id, customer_id, customers!inner(name)")
        .order("id", Direction::Asc)
        .single()
        .await;
    assert!(res.data.is_none());
    assert!(res.error.is_none());
    assert!(client.executor().sql()[0].ends_with("LIMIT 1"));
}

// ==================== INSERT / UPSERT ====================

#[tokio::test]
async fn insert_generates_missing_ids() {
    let client = client(RecordingClient::default());
    client
        .from("customers")
        .insert(json!([{"name": "Acme"}, {"name": "Globex", "email": "g@x"}]))
        .await;

    let call = &client.executor().calls()[0];
    assert_eq!(
        call.sql,
        "INSERT INTO customers (id, name, email) VALUES (?, ?, ?), (?, ?, ?) RETURNING *"
    );
    assert!(call.params[0].as_str().is_some_and(|id| id.len() == 36));
    assert_eq!(call.params[2], Value::Null);
    assert_ne!(call.params[0], call.params[3]);
}

#[tokio::test]
async fn insert_respects_config_and_projection() {
    let db = RecordingClient::with_rows(vec![json!([{"id": 10, "name": "Acme"}])]);
    let client = client(db).with_config(ClientConfig::new().generate_ids(false));

    let res = client
        .from("customers")
        .insert(json!({"name": "Acme"}))
        .select("id, name")
        .single()
        .await;
    assert_eq!(res.data.map(Value::Object), Some(json!({"id": 10, "name": "Acme"})));
    assert_eq!(
        client.executor().sql()[0],
        "INSERT INTO customers (name) VALUES (?) RETURNING id, name"
    );
}

#[tokio::test]
async fn insert_edge_payloads() {
    let client = client(RecordingClient::default());

    let empty = client.from("customers").insert(json!([])).await;
    assert_eq!(as_json(empty), json!([]));

    let scalar = client.from("customers").insert(json!(5)).await;
    assert!(scalar.error.is_some_and(|e| e.is_contract_violation()));

    assert!(client.executor().calls().is_empty());
}

#[tokio::test]
async fn upsert_compiles_on_conflict() {
    let client = client(RecordingClient::default());

    client
        .from("customers")
        .upsert(json!({"id": "c1", "name": "Acme", "email": "a@x"}))
        .await;
    client
        .from("customers")
        .upsert(json!({"id": "c1", "name": "Acme"}))
        .ignore_duplicates(true)
        .await;
    client
        .from("settings")
        .upsert(json!({"org_id": 1, "code": "tz", "value": "UTC"}))
        .on_conflict("org_id, code")
        .await;

    let sql = client.executor().sql();
    assert_eq!(
        sql[0],
        "INSERT INTO customers (id, name, email) VALUES (?, ?, ?) \
         ON CONFLICT (id) DO UPDATE SET name = excluded.name, email = excluded.email RETURNING *"
    );
    assert_eq!(
        sql[1],
        "INSERT INTO customers (id, name) VALUES (?, ?) ON CONFLICT (id) DO NOTHING RETURNING *"
    );
    assert_eq!(
        sql[2],
        "INSERT INTO settings (id, org_id, code, value) VALUES (?, ?, ?, ?) \
         ON CONFLICT (org_id, code) DO UPDATE SET value = excluded.value RETURNING *"
    );
}

#[tokio::test]
async fn upsert_with_only_key_columns_does_nothing_on_conflict() {
    let client = client(RecordingClient::default());
    client.from("tags").upsert(json!({"id": "t1"})).await;
    assert_eq!(
        client.executor().sql()[0],
        "INSERT INTO tags (id) VALUES (?) ON CONFLICT (id) DO NOTHING RETURNING *"
    );
}

// ==================== UPDATE / DELETE ====================

#[tokio::test]
async fn update_and_delete_require_a_filter() {
    let client = client(RecordingClient::default());

    let update = client.from("invoices").update(json!({"status": "void"})).await;
    assert!(matches!(
        update.error,
        Some(DbError::MissingFilter { operation: "UPDATE", .. })
    ));

    let delete = client.from("invoices").delete().await;
    assert!(matches!(
        delete.error,
        Some(DbError::MissingFilter { operation: "DELETE", .. })
    ));
    assert!(client.executor().calls().is_empty());

    client.from("drafts").update(json!({"stale": true})).all().await;
    client.from("drafts").delete().all().await;
    assert_eq!(
        client.executor().sql(),
        vec![
            "UPDATE drafts SET stale = ? RETURNING *".to_string(),
            "DELETE FROM drafts".to_string(),
        ]
    );
}

#[tokio::test]
async fn update_binds_set_values_before_filters() {
    let client = client(RecordingClient::default());
    client
        .from("invoices")
        .update(json!({"status": "paid", "paid_at": null}))
        .eq("id", 7)
        .select("id")
        .await;

    let call = &client.executor().calls()[0];
    assert_eq!(
        call.sql,
        "UPDATE invoices SET status = ?, paid_at = ? WHERE id = ? RETURNING id"
    );
    assert_eq!(call.params, vec![json!("paid"), Value::Null, json!(7)]);
}

#[tokio::test]
async fn update_rejects_empty_or_non_object_values() {
    let client = client(RecordingClient::default());

    let empty = client.from("invoices").update(json!({})).eq("id", 1).await;
    assert!(empty.error.is_some_and(|e| e.is_contract_violation()));

    let list = client.from("invoices").update(json!([1, 2])).eq("id", 1).await;
    assert!(list.error.is_some_and(|e| e.is_contract_violation()));

    assert!(client.executor().calls().is_empty());
}

#[tokio::test]
async fn delete_returns_rows_only_when_selected() {
    let db = RecordingClient::with_rows(vec![json!([{"id": 1}]), json!([{"id": 2}])]);
    let client = client(db);

    let plain = client.from("invoices").delete().eq("id", 1).await;
    assert_eq!(as_json(plain), json!([]));

    let returning = client.from("invoices").delete().eq("id", 2).select("id").await;
    assert_eq!(as_json(returning), json!([{"id": 2}]));

    assert_eq!(
        client.executor().sql(),
        vec![
            "DELETE FROM invoices WHERE id = ?".to_string(),
            "DELETE FROM invoices WHERE id = ? RETURNING id".to_string(),
        ]
    );
}

#[tokio::test]
async fn backend_errors_land_in_response() {
    let db = RecordingClient::default();
    db.push_error(DbError::UniqueViolation("customers.id".into()));
    let client = client(db);

    let res = client.from("customers").insert(json!({"id": "c1"})).await;
    assert!(res.data.is_none());
    assert!(res.error.is_some_and(|e| e.is_unique_violation()));
}
