mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{extract_id, TestApp};

/// Creates a customer, an item, and an order with one line of the given
/// quantity; returns (customer, order, line).
async fn seed_order(app: &TestApp, ordered: i64) -> (Uuid, Uuid, Uuid) {
    let customer = app.seed_customer(&format!("Customer {}", Uuid::new_v4())).await;
    let item = app
        .seed_item(
            &format!("Item {}", Uuid::new_v4()),
            &format!("SKU-{}", Uuid::new_v4()),
        )
        .await;

    let (status, body) = app
        .post(
            "/api/v1/delivery-orders",
            json!({
                "customer_id": customer,
                "lines": [{"item_id": item, "quantity": ordered}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "order seed failed: {body}");
    let order_id = extract_id(&body);

    let (_, body) = app
        .get(&format!("/api/v1/delivery-orders/{order_id}"))
        .await;
    let line_id = body["data"]["lines"][0]["line_id"]
        .as_str()
        .expect("line id expected")
        .parse()
        .expect("line id should be a UUID");

    (customer, order_id, line_id)
}

async fn order_snapshot(app: &TestApp, order_id: Uuid) -> Value {
    let (status, body) = app
        .get(&format!("/api/v1/delivery-orders/{order_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

async fn ship(app: &TestApp, customer: Uuid, line_id: Uuid, quantity: i64) -> (StatusCode, Value) {
    app.post(
        "/api/v1/shipments",
        json!({
            "customer_id": customer,
            "allocations": [{"delivery_order_line_id": line_id, "quantity": quantity}]
        }),
    )
    .await
}

#[tokio::test]
async fn partial_allocation_moves_order_to_proses() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 10).await;

    let (status, body) = ship(&app, customer, line_id, 6).await;
    assert_eq!(status, StatusCode::OK, "shipment failed: {body}");

    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["status"], "PROSES");
    let line = &order["lines"][0];
    assert_eq!(line["ordered"], 10);
    assert_eq!(line["pending"], 4);
    assert_eq!(line["processing"], 6);
    assert_eq!(line["completed"], 0);
}

#[tokio::test]
async fn allocation_cannot_exceed_pending_quantity() {
    let app = TestApp::new().await;
    let (customer, _order_id, line_id) = seed_order(&app, 10).await;

    let (status, _) = ship(&app, customer, line_id, 6).await;
    assert_eq!(status, StatusCode::OK);

    // Only 4 pending remain
    let (status, body) = ship(&app, customer, line_id, 5).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected refusal: {body}");

    let (status, _) = ship(&app, customer, line_id, 4).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn completing_shipments_walks_the_order_to_selesai() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 10).await;

    let (_, body) = ship(&app, customer, line_id, 6).await;
    let first = extract_id(&body);
    let (_, body) = ship(&app, customer, line_id, 4).await;
    let second = extract_id(&body);

    // Fully allocated but nothing completed yet
    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["status"], "PROSES");
    assert_eq!(order["lines"][0]["pending"], 0);
    assert_eq!(order["lines"][0]["processing"], 10);

    let (status, _) = app
        .post(
            &format!("/api/v1/shipments/{first}/complete"),
            json!({"proof_of_pickup": "pickups/first.jpg"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["status"], "PROSES");
    assert_eq!(order["lines"][0]["completed"], 6);
    assert_eq!(order["lines"][0]["processing"], 4);

    let (status, _) = app
        .post(
            &format!("/api/v1/shipments/{second}/complete"),
            json!({"proof_of_pickup": "pickups/second.jpg"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["status"], "SELESAI");
    assert_eq!(order["lines"][0]["completed"], 10);

    // Completing twice is a conflict
    let (status, _) = app
        .post(
            &format!("/api/v1/shipments/{second}/complete"),
            json!({"proof_of_pickup": "pickups/second-again.jpg"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn completed_shipment_refuses_edits() {
    let app = TestApp::new().await;
    let (customer, _order_id, line_id) = seed_order(&app, 10).await;

    let (_, body) = ship(&app, customer, line_id, 6).await;
    let shipment_id = extract_id(&body);

    let (status, _) = app
        .post(
            &format!("/api/v1/shipments/{shipment_id}/complete"),
            json!({"proof_of_pickup": "pickups/done.jpg"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(
            &format!("/api/v1/shipments/{shipment_id}"),
            json!({"allocations": [{"delivery_order_line_id": line_id, "quantity": 3}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected refusal: {body}");
}

#[tokio::test]
async fn deleting_a_shipment_returns_its_quantity_to_pending() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 10).await;

    let (_, body) = ship(&app, customer, line_id, 10).await;
    let shipment_id = extract_id(&body);

    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["status"], "PROSES");

    let (status, _) = app
        .delete(&format!("/api/v1/shipments/{shipment_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["lines"][0]["pending"], 10);
    assert_eq!(order["lines"][0]["processing"], 0);

    // The freed quantity can be allocated again
    let (status, _) = ship(&app, customer, line_id, 10).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn shipment_update_rebalances_allocations() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 10).await;

    let (_, body) = ship(&app, customer, line_id, 4).await;
    let shipment_id = extract_id(&body);

    // Growing within pending headroom is fine: 4 -> 10 consumes the 6 left
    let (status, body) = app
        .put(
            &format!("/api/v1/shipments/{shipment_id}"),
            json!({"allocations": [{"delivery_order_line_id": line_id, "quantity": 10}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "update failed: {body}");

    let order = order_snapshot(&app, order_id).await;
    assert_eq!(order["lines"][0]["pending"], 0);
    assert_eq!(order["lines"][0]["processing"], 10);

    // Growing past the ordered quantity is refused
    let (status, _) = app
        .put(
            &format!("/api/v1/shipments/{shipment_id}"),
            json!({"allocations": [{"delivery_order_line_id": line_id, "quantity": 11}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Identical payload changes nothing
    let (status, _) = app
        .put(
            &format!("/api/v1/shipments/{shipment_id}"),
            json!({"allocations": [{"delivery_order_line_id": line_id, "quantity": 10}]}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn order_edits_respect_existing_allocations() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 10).await;
    let (_, body) = ship(&app, customer, line_id, 6).await;
    let shipment_id = extract_id(&body);
    let (status, _) = app
        .post(
            &format!("/api/v1/shipments/{shipment_id}/complete"),
            json!({"proof_of_pickup": "pickups/partial.jpg"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let order = order_snapshot(&app, order_id).await;
    let item_id: Uuid = order["lines"][0]["item_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // Shrinking below the 6 already completed is refused
    let (status, _) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"lines": [{"item_id": item_id, "quantity": 5}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Removing the allocated line is refused
    let other_item = app.seed_item("Other", "SKU-OTHER").await;
    let (status, _) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"lines": [{"item_id": other_item, "quantity": 1}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Deleting the order while allocations exist is refused
    let (status, _) = app
        .delete(&format!("/api/v1/delivery-orders/{order_id}"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Round-trip: growing the ordered quantity leaves allocations untouched
    let (status, body) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"lines": [{"item_id": item_id, "quantity": 12}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "grow failed: {body}");
    let line = &body["data"]["lines"][0];
    assert_eq!(line["ordered"], 12);
    assert_eq!(line["completed"], 6);
    assert_eq!(line["pending"], 6);
    assert_eq!(line["processing"], 0);
}

#[tokio::test]
async fn shrinking_to_the_completed_quantity_finishes_the_order() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 10).await;
    let (_, body) = ship(&app, customer, line_id, 6).await;
    let shipment_id = extract_id(&body);
    app.post(
        &format!("/api/v1/shipments/{shipment_id}/complete"),
        json!({"proof_of_pickup": "pickups/full.jpg"}),
    )
    .await;

    let order = order_snapshot(&app, order_id).await;
    let item_id: Uuid = order["lines"][0]["item_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // Shrinking 10 -> 6 matches the completed quantity exactly
    let (status, body) = app
        .put(
            &format!("/api/v1/delivery-orders/{order_id}"),
            json!({"lines": [{"item_id": item_id, "quantity": 6}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "shrink failed: {body}");
    assert_eq!(body["data"]["status"], "SELESAI");
}

#[tokio::test]
async fn shipping_against_unknown_or_deleted_targets_fails() {
    let app = TestApp::new().await;
    let (customer, order_id, line_id) = seed_order(&app, 5).await;

    // Unknown line
    let (status, _) = ship(&app, customer, Uuid::new_v4(), 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleted order cannot receive shipments
    let (status, _) = app
        .delete(&format!("/api/v1/delivery-orders/{order_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ship(&app, customer, line_id, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
