use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

/// Header carrying the acting user's id for audit attribution. Full
/// authentication is out of scope; replacing this middleware is the seam
/// where a real identity layer would plug in.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// The audit actor resolved for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Requests without an actor header are attributed to the system actor.
    pub fn system() -> Self {
        ActorId(Uuid::nil())
    }
}

/// Middleware resolving `x-actor-id` into request extensions.
pub async fn actor_id_middleware(mut request: Request, next: Next) -> Response {
    let actor = request
        .headers()
        .get(ACTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .map(ActorId)
        .unwrap_or_else(ActorId::system);

    request.extensions_mut().insert(actor);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body, http::Request as HttpRequest, middleware, routing::get, Extension, Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(actor): Extension<ActorId>| async move { actor.0.to_string() }),
            )
            .layer(middleware::from_fn(actor_id_middleware))
    }

    #[tokio::test]
    async fn missing_header_resolves_to_system_actor() {
        let response = app()
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, Uuid::nil().to_string().as_bytes());
    }

    #[tokio::test]
    async fn valid_header_is_resolved() {
        let actor = Uuid::new_v4();
        let response = app()
            .oneshot(
                HttpRequest::get("/")
                    .header(ACTOR_ID_HEADER, actor.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, actor.to_string().as_bytes());
    }

    #[tokio::test]
    async fn malformed_header_falls_back_to_system_actor() {
        let response = app()
            .oneshot(
                HttpRequest::get("/")
                    .header(ACTOR_ID_HEADER, "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, Uuid::nil().to_string().as_bytes());
    }
}
