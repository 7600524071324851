mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{extract_id, TestApp};

#[tokio::test]
async fn health_and_status_endpoints_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    let (status, body) = app.get("/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "dispatch-api");
}

#[tokio::test]
async fn customer_lifecycle_with_duplicate_and_conflict_checks() {
    let app = TestApp::new().await;

    let id = app.seed_customer("Acme Logistics").await;

    // Duplicate name is refused
    let (status, _) = app
        .post(
            "/api/v1/customers",
            json!({"name": "Acme Logistics", "initials": "AL"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // No-op update is a conflict
    let (status, _) = app
        .put(&format!("/api/v1/customers/{id}"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Real update sticks
    let (status, body) = app
        .put(
            &format!("/api/v1/customers/{id}"),
            json!({"phone": "+62 812 0000 1111"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "+62 812 0000 1111");

    // Soft delete hides from the default listing but get still resolves
    let (status, _) = app.delete(&format!("/api/v1/customers/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/customers").await;
    assert_eq!(body["data"]["total"], 0);
    let (_, body) = app.get("/api/v1/customers?include_deleted=true").await;
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = app.get(&format!("/api/v1/customers/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["deleted_at"].is_null());

    // Deleting twice is NotFound
    let (status, _) = app.delete(&format!("/api/v1/customers/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The freed name can be reused
    let (status, _) = app
        .post(
            "/api/v1/customers",
            json!({"name": "Acme Logistics", "initials": "AL"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn item_sku_uniqueness_and_filtering() {
    let app = TestApp::new().await;

    app.seed_item("Steel pallet", "PLT-STL-01").await;
    app.seed_item("Plastic pallet", "PLT-PLS-01").await;

    let (status, _) = app
        .post(
            "/api/v1/items",
            json!({"name": "Another pallet", "stock_keeping_unit": "PLT-STL-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.get("/api/v1/items?name=Steel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = app.get("/api/v1/items?sku=PLT").await;
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn fleet_lifecycle_and_plate_uniqueness() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/v1/fleets",
            json!({"license_plate": "B 9301 KQJ", "vehicle_type": "box truck"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = extract_id(&body);

    let (status, _) = app
        .post("/api/v1/fleets", json!({"license_plate": "B 9301 KQJ"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .put(
            &format!("/api/v1/fleets/{id}"),
            json!({"vehicle_type": "flatbed"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vehicle_type"], "flatbed");

    let (status, _) = app.delete(&format!("/api/v1/fleets/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/v1/fleets").await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn unknown_ids_return_not_found() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();

    for path in [
        format!("/api/v1/customers/{missing}"),
        format!("/api/v1/items/{missing}"),
        format!("/api/v1/fleets/{missing}"),
        format!("/api/v1/delivery-orders/{missing}"),
        format!("/api/v1/shipments/{missing}"),
    ] {
        let (status, _) = app.get(&path).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "expected 404 for {path}");
    }
}

#[tokio::test]
async fn audit_logs_filter_by_type_and_reject_bad_filters() {
    let app = TestApp::new().await;

    let customer = app.seed_customer("Audited Co").await;
    app.put(
        &format!("/api/v1/customers/{customer}"),
        json!({"initials": "AC"}),
    )
    .await;
    app.seed_item("Audited item", "SKU-AUD").await;

    let (status, body) = app.get("/api/v1/audit-logs?entity_type=customer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = app
        .get("/api/v1/audit-logs?entity_type=customer&change_type=UPDATE")
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["entity_id"], json!(customer));

    let (status, _) = app.get("/api/v1/audit-logs?entity_type=starship").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/v1/audit-logs?change_type=EXPLODE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Date filters must come in ordered pairs
    let (status, _) = app
        .get("/api/v1/audit-logs?start_date=2025-03-02&end_date=2025-03-01")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/v1/audit-logs?start_date=2025-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn requests_without_actor_header_attribute_to_system() {
    let app = TestApp::new().await;

    // Bypass the helper to omit the actor header
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let router = axum::Router::new()
        .nest("/api/v1", dispatch_api::api_v1_routes())
        .layer(axum::middleware::from_fn(
            dispatch_api::middleware::actor_id::actor_id_middleware,
        ))
        .with_state(app.state.clone());

    let response = router
        .oneshot(
            Request::post("/api/v1/customers")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"name": "Anonymous Co", "initials": "AN"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = app.get("/api/v1/audit-logs?entity_type=customer").await;
    assert_eq!(
        body["data"]["items"][0]["actor_id"],
        json!(Uuid::nil().to_string())
    );
}
