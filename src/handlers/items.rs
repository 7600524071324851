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
    entities::item,
    errors::ServiceError,
    middleware::actor_id::ActorId,
    services::items::{CreateItem, ItemFilter, UpdateItem},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Free-text name filter
    pub name: Option<String>,
    /// Free-text SKU filter
    pub sku: Option<String>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub stock_keeping_unit: String,
    pub description: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<item::Model> for ItemResponse {
    fn from(model: item::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            stock_keeping_unit: model.stock_keeping_unit,
            description: model.description,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Steel pallet",
    "stock_keeping_unit": "PLT-STL-01",
    "description": "Reinforced steel pallet, 1200x800"
}))]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub stock_keeping_unit: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub stock_keeping_unit: Option<String>,
    pub description: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
}

#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ItemListQuery),
    responses(
        (status = 200, description = "Items listed", body = ApiResponse<PaginatedResponse<ItemResponse>>)
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> ApiResult<PaginatedResponse<ItemResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let filter = ItemFilter {
        name: query.name,
        stock_keeping_unit: query.sku,
        include_deleted: query.include_deleted.unwrap_or(false),
    };
    let (records, total) = state.services.items.list(filter, page, per_page).await?;

    let items: Vec<ItemResponse> = records.into_iter().map(ItemResponse::from).collect();
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
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 200, description = "Item created", body = ApiResponse<ItemResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<CreateItemRequest>,
) -> ApiResult<ItemResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = CreateItem {
        name: payload.name,
        stock_keeping_unit: payload.stock_keeping_unit,
        description: payload.description,
    };
    let item_id = state.services.items.create(input, actor.0).await?;
    let created = state.services.items.get(item_id).await?;

    Ok(Json(ApiResponse::success(ItemResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item fetched", body = ApiResponse<ItemResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ItemResponse> {
    let record = state.services.items.get(id).await?;
    Ok(Json(ApiResponse::success(ItemResponse::from(record))))
}

#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<ItemResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "No changes detected", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<UpdateItemRequest>,
) -> ApiResult<ItemResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = UpdateItem {
        name: payload.name,
        stock_keeping_unit: payload.stock_keeping_unit,
        description: payload.description,
    };
    state.services.items.update(id, input, actor.0).await?;
    let updated = state.services.items.get(id).await?;

    Ok(Json(ApiResponse::success(ItemResponse::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item deleted", body = ApiResponse<Value>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
) -> ApiResult<Value> {
    state.services.items.delete(id, actor.0).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted": true
    }))))
}
