mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{extract_id, TestApp};

#[tokio::test]
async fn create_and_fetch_delivery_order_starts_fully_pending() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Harbor Freight Co").await;
    let item_a = app.seed_item("Steel pallet", "PLT-STL-01").await;
    let item_b = app.seed_item("Wooden crate", "CRT-WD-01").await;

    let (status, body) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "address": "12 Dockside Road",
                "internal_notes": "call ahead",
                "lines": [
                    {"item_id": item_a, "quantity": 10},
                    {"item_id": item_b, "quantity": 3}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    let order_id = extract_id(&body);

    let (status, body) = app
        .get(&format!("/api/v1/delivery-orders/{order_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["customer"]["name"], "Harbor Freight Co");

    let lines = data["lines"].as_array().expect("lines expected");
    assert_eq!(lines.len(), 2);
    for line in lines {
        assert_eq!(line["pending"], line["ordered"]);
        assert_eq!(line["completed"], 0);
        assert_eq!(line["processing"], 0);
    }
}

#[tokio::test]
async fn create_rejects_unknown_references_and_bad_quantities() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Customer A").await;
    let item = app.seed_item("Item A", "SKU-A").await;

    // Unknown customer
    let (status, _) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": Uuid::new_v4(),
                "lines": [{"item_id": item, "quantity": 1}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unknown item
    let (status, _) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [{"item_id": Uuid::new_v4(), "quantity": 1}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Zero quantity
    let (status, _) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [{"item_id": item, "quantity": 0}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Duplicate item in lines
    let (status, _) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [
                    {"item_id": item, "quantity": 1},
                    {"item_id": item, "quantity": 2}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No lines at all
    let (status, _) = app
        .post(
            "/api/v1/delivery-orders",
            json!({"customer_id": customer, "lines": []}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resubmitting_identical_lines_is_a_conflict() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Customer B").await;
    let item = app.seed_item("Item B", "SKU-B").await;

    let (_, body) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [{"item_id": item, "quantity": 5}]
            }),
        )
        .await;
    let order_id = extract_id(&body);

    let (status, body) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"lines": [{"item_id": item, "quantity": 5}]}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "expected conflict: {body}");
}

#[tokio::test]
async fn line_edits_create_update_and_remove() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Customer C").await;
    let keep = app.seed_item("Keep", "SKU-KEEP").await;
    let drop = app.seed_item("Drop", "SKU-DROP").await;
    let add = app.seed_item("Add", "SKU-ADD").await;

    let (_, body) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [
                    {"item_id": keep, "quantity": 5},
                    {"item_id": drop, "quantity": 2}
                ]
            }),
        )
        .await;
    let order_id = extract_id(&body);

    // Grow `keep`, drop `drop`, introduce `add`
    let (status, body) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({
                "lines": [
                    {"item_id": keep, "quantity": 8},
                    {"item_id": add, "quantity": 4}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "update failed: {body}");

    let lines = body["data"]["lines"].as_array().expect("lines expected");
    assert_eq!(lines.len(), 2);

    let find = |item: Uuid| {
        lines
            .iter()
            .find(|l| l["item_id"] == json!(item))
            .unwrap_or_else(|| panic!("line for {item} missing"))
    };
    assert_eq!(find(keep)["ordered"], 8);
    assert_eq!(find(add)["ordered"], 4);
    assert_eq!(body["data"]["status"], "PENDING");
}

#[tokio::test]
async fn header_only_update_changes_address() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Customer D").await;
    let item = app.seed_item("Item D", "SKU-D").await;

    let (_, body) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "address": "old depot",
                "lines": [{"item_id": item, "quantity": 5}]
            }),
        )
        .await;
    let order_id = extract_id(&body);

    let (status, body) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"address": "new depot"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["address"], "new depot");

    // Same address again: nothing changes
    let (status, _) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"address": "new depot"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_filters_by_status_and_excludes_deleted() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Customer E").await;
    let item = app.seed_item("Item E", "SKU-E").await;

    let mut order_ids = Vec::new();
    for _ in 0..2 {
        let (_, body) = app
            .post(
                "/api/v1/delivery-orders",
                json!({
                    "customer_id": customer,
                    "lines": [{"item_id": item, "quantity": 1}]
                }),
            )
            .await;
        order_ids.push(extract_id(&body));
    }

    let (status, body) = app.get("/api/v1/delivery-orders?status=PENDING").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let (status, _) = app.get("/api/v1/delivery-orders?status=NONSENSE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Delete one order and observe the default listing shrink
    let (status, _) = app
        .delete(&format!("/api/v1/delivery-orders/{}", order_ids[0]))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/delivery-orders").await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = app.get("/api/v1/delivery-orders?include_deleted=true").await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn audit_trail_records_order_lifecycle() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Customer F").await;
    let item = app.seed_item("Item F", "SKU-F").await;

    let (_, body) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [{"item_id": item, "quantity": 5}]
            }),
        )
        .await;
    let order_id = extract_id(&body);

    let (status, body) = app
        .get(&format!(
            "/api/v1/audit-logs?entity_type=delivery_order&entity_id={order_id}"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let rows = body["data"]["items"].as_array().expect("rows expected");
    // One row for the order, one per line
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["change_type"], "CREATE");
        assert_eq!(row["actor_id"], json!(app.actor));
    }
}
