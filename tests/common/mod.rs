use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use dispatch_api::{
    config::AppConfig,
    db::{establish_connection_with_config, run_migrations, DbConfig},
    events::{self, EventSender},
    middleware::actor_id::ACTOR_ID_HEADER,
    services::AppServices,
    AppState,
};

/// Helper harness spinning up the full router against an in-memory SQLite
/// database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub actor: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // A single connection so every request shares the same in-memory
        // database.
        let db_config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        run_migrations(&pool).await.expect("migrations should apply");

        let cfg = AppConfig::new(
            db_config.url.clone(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let db_arc = Arc::new(pool);
        let services = AppServices::new(db_arc.clone(), event_sender.clone());
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", dispatch_api::api_v1_routes())
            .layer(axum::middleware::from_fn(
                dispatch_api::middleware::actor_id::actor_id_middleware,
            ))
            .layer(axum::middleware::from_fn(
                dispatch_api::middleware::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            actor: Uuid::new_v4(),
            _event_task: event_task,
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(ACTOR_ID_HEADER, self.actor.to_string());

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request should build"),
            None => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::empty()).expect("request should build")
            }
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not fail at the transport level");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };

        (status, value)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, None).await
    }

    /// Creates a customer through the API and returns its id.
    pub async fn seed_customer(&self, name: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/api/v1/customers",
                serde_json::json!({
                    "name": name,
                    "initials": "TC",
                    "address": "1 Test Street"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "seed customer failed: {body}");
        extract_id(&body)
    }

    /// Creates an item through the API and returns its id.
    pub async fn seed_item(&self, name: &str, sku: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/api/v1/items",
                serde_json::json!({
                    "name": name,
                    "stock_keeping_unit": sku
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "seed item failed: {body}");
        extract_id(&body)
    }
}

/// Pulls `data.id` out of a success envelope.
pub fn extract_id(body: &Value) -> Uuid {
    body["data"]["id"]
        .as_str()
        .expect("response data should carry an id")
        .parse()
        .expect("id should be a UUID")
}
