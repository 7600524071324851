use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::fleet,
    errors::ServiceError,
    middleware::actor_id::ActorId,
    services::fleets::{CreateFleet, FleetFilter, UpdateFleet},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FleetListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Free-text license plate filter
    pub license_plate: Option<String>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FleetResponse {
    pub id: Uuid,
    pub license_plate: String,
    pub vehicle_type: Option<String>,
    pub description: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<fleet::Model> for FleetResponse {
    fn from(model: fleet::Model) -> Self {
        Self {
            id: model.id,
            license_plate: model.license_plate,
            vehicle_type: model.vehicle_type,
            description: model.description,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "license_plate": "B 9301 KQJ",
    "vehicle_type": "box truck",
    "description": "6-wheel box truck, 4t capacity"
}))]
pub struct CreateFleetRequest {
    #[validate(length(min = 1, max = 32))]
    pub license_plate: String,
    pub vehicle_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFleetRequest {
    #[validate(length(min = 1, max = 32))]
    pub license_plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub description: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fleets).post(create_fleet))
        .route(
            "/:id",
            get(get_fleet).put(update_fleet).delete(delete_fleet),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/fleets",
    params(FleetListQuery),
    responses(
        (status = 200, description = "Fleet vehicles listed", body = ApiResponse<PaginatedResponse<FleetResponse>>)
    ),
    tag = "fleets"
)]
pub async fn list_fleets(
    State(state): State<AppState>,
    Query(query): Query<FleetListQuery>,
) -> ApiResult<PaginatedResponse<FleetResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let filter = FleetFilter {
        license_plate: query.license_plate,
        include_deleted: query.include_deleted.unwrap_or(false),
    };
    let (records, total) = state.services.fleets.list(filter, page, per_page).await?;

    let items: Vec<FleetResponse> = records.into_iter().map(FleetResponse::from).collect();
    let total_pages = (total + per_page - 1) / per_page;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit: per_page,
        total_pages,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/fleets",
    request_body = CreateFleetRequest,
    responses(
        (status = 200, description = "Fleet vehicle created", body = ApiResponse<FleetResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "License plate already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "fleets"
)]
pub async fn create_fleet(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<CreateFleetRequest>,
) -> ApiResult<FleetResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = CreateFleet {
        license_plate: payload.license_plate,
        vehicle_type: payload.vehicle_type,
        description: payload.description,
    };
    let fleet_id = state.services.fleets.create(input, actor.0).await?;
    let created = state.services.fleets.get(fleet_id).await?;

    Ok(Json(ApiResponse::success(FleetResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/fleets/{id}",
    params(("id" = Uuid, Path, description = "Fleet ID")),
    responses(
        (status = 200, description = "Fleet vehicle fetched", body = ApiResponse<FleetResponse>),
        (status = 404, description = "Fleet not found", body = crate::errors::ErrorResponse)
    ),
    tag = "fleets"
)]
pub async fn get_fleet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<FleetResponse> {
    let record = state.services.fleets.get(id).await?;
    Ok(Json(ApiResponse::success(FleetResponse::from(record))))
}

#[utoipa::path(
    put,
    path = "/api/v1/fleets/{id}",
    params(("id" = Uuid, Path, description = "Fleet ID")),
    request_body = UpdateFleetRequest,
    responses(
        (status = 200, description = "Fleet vehicle updated", body = ApiResponse<FleetResponse>),
        (status = 404, description = "Fleet not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "No changes detected", body = crate::errors::ErrorResponse)
    ),
    tag = "fleets"
)]
pub async fn update_fleet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<UpdateFleetRequest>,
) -> ApiResult<FleetResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = UpdateFleet {
        license_plate: payload.license_plate,
        vehicle_type: payload.vehicle_type,
        description: payload.description,
    };
    state.services.fleets.update(id, input, actor.0).await?;
    let updated = state.services.fleets.get(id).await?;

    Ok(Json(ApiResponse::success(FleetResponse::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/fleets/{id}",
    params(("id" = Uuid, Path, description = "Fleet ID")),
    responses(
        (status = 200, description = "Fleet vehicle deleted", body = ApiResponse<Value>),
        (status = 404, description = "Fleet not found", body = crate::errors::ErrorResponse)
    ),
    tag = "fleets"
)]
pub async fn delete_fleet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
) -> ApiResult<Value> {
    state.services.fleets.delete(id, actor.0).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted": true
    }))))
}
