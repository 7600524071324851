use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    fulfillment::FulfillmentStatus,
    middleware::actor_id::ActorId,
    services::delivery_orders::{
        CreateDeliveryOrder, DeliveryOrderDetail, DeliveryOrderFilter, LineInput,
        UpdateDeliveryOrder,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeliveryOrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub customer_id: Option<Uuid>,
    /// Status wire value: PENDING, PROSES or SELESAI
    pub status: Option<String>,
    /// Free-text customer name filter
    pub customer_name: Option<String>,
    /// Inclusive date range over the creation timestamp (both required)
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineStatusResponse {
    pub line_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub ordered: i64,
    pub pending: i64,
    pub completed: i64,
    pub processing: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "550e8400-e29b-41d4-a716-446655440000",
    "customer": {"id": "b9a3f2aa-1f0e-4f0a-9672-38a0de2cbc2b", "name": "Harbor Freight Co"},
    "address": "12 Dockside Road",
    "internal_notes": "call ahead",
    "status": "PROSES",
    "lines": [{
        "line_id": "8f0c4a4e-7f2b-4d8e-9a4a-111111111111",
        "item_id": "4d1531f1-a6a3-4f06-a9a3-222222222222",
        "item_name": "Steel pallet",
        "ordered": 10,
        "pending": 4,
        "completed": 6,
        "processing": 0
    }]
}))]
pub struct DeliveryOrderResponse {
    pub id: Uuid,
    pub customer: CustomerRef,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// Derived status wire value (PENDING, PROSES, SELESAI)
    pub status: FulfillmentStatus,
    pub lines: Vec<LineStatusResponse>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DeliveryOrderDetail> for DeliveryOrderResponse {
    fn from(detail: DeliveryOrderDetail) -> Self {
        Self {
            id: detail.order.id,
            customer: CustomerRef {
                id: detail.customer.id,
                name: detail.customer.name,
            },
            address: detail.order.address,
            internal_notes: detail.order.internal_notes,
            status: detail.status,
            lines: detail
                .lines
                .into_iter()
                .map(|line| LineStatusResponse {
                    line_id: line.status.line_id,
                    item_id: line.status.item_id,
                    item_name: line.item_name,
                    ordered: line.status.ordered,
                    pending: line.status.pending,
                    completed: line.status.completed,
                    processing: line.status.processing,
                })
                .collect(),
            deleted_at: detail.order.deleted_at,
            created_at: detail.order.created_at,
            updated_at: detail.order.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryOrderSummary {
    pub id: Uuid,
    pub customer: Option<CustomerRef>,
    pub status: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LineRequest {
    pub item_id: Uuid,
    /// Ordered quantity, a positive integer
    #[validate(range(min = 1))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "customer_id": "b9a3f2aa-1f0e-4f0a-9672-38a0de2cbc2b",
    "address": "12 Dockside Road",
    "internal_notes": "call ahead",
    "lines": [{"item_id": "4d1531f1-a6a3-4f06-a9a3-222222222222", "quantity": 10}]
}))]
pub struct CreateDeliveryOrderRequest {
    pub customer_id: Uuid,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// At least one line; enforced with the rest of the line rules
    #[validate]
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDeliveryOrderRequest {
    pub customer_id: Option<Uuid>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// Full replacement set of lines; omit to leave lines untouched
    #[validate]
    pub lines: Option<Vec<LineRequest>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_delivery_orders).post(create_delivery_order))
        .route(
            "/:id",
            get(get_delivery_order)
                .put(update_delivery_order)
                .delete(delete_delivery_order),
        )
}

fn parse_status(value: &str) -> Result<FulfillmentStatus, ServiceError> {
    value.parse::<FulfillmentStatus>().map_err(|_| {
        ServiceError::ValidationError(format!(
            "unsupported status '{}': expected PENDING, PROSES or SELESAI",
            value
        ))
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-orders",
    params(DeliveryOrderListQuery),
    responses(
        (status = 200, description = "Delivery orders listed", body = ApiResponse<PaginatedResponse<DeliveryOrderSummary>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn list_delivery_orders(
    State(state): State<AppState>,
    Query(query): Query<DeliveryOrderListQuery>,
) -> ApiResult<PaginatedResponse<DeliveryOrderSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = DeliveryOrderFilter {
        customer_id: query.customer_id,
        status,
        customer_name: query.customer_name,
        start_date: query.start_date,
        end_date: query.end_date,
        include_deleted: query.include_deleted.unwrap_or(false),
    };

    let (records, total) = state
        .services
        .delivery_orders
        .list(filter, page, per_page)
        .await?;

    let items: Vec<DeliveryOrderSummary> = records
        .into_iter()
        .map(|(order, customer)| DeliveryOrderSummary {
            id: order.id,
            customer: customer.map(|c| CustomerRef {
                id: c.id,
                name: c.name,
            }),
            status: order.status,
            deleted_at: order.deleted_at,
            created_at: order.created_at,
        })
        .collect();
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
    path = "/api/v1/delivery-orders",
    request_body = CreateDeliveryOrderRequest,
    responses(
        (status = 200, description = "Delivery order created", body = ApiResponse<DeliveryOrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer or item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn create_delivery_order(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<CreateDeliveryOrderRequest>,
) -> ApiResult<DeliveryOrderResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = CreateDeliveryOrder {
        customer_id: payload.customer_id,
        address: payload.address,
        internal_notes: payload.internal_notes,
        lines: payload
            .lines
            .iter()
            .map(|l| LineInput {
                item_id: l.item_id,
                quantity: l.quantity,
            })
            .collect(),
    };

    let order_id = state
        .services
        .delivery_orders
        .create(input, actor.0)
        .await?;
    let created = state.services.delivery_orders.get(order_id).await?;

    Ok(Json(ApiResponse::success(DeliveryOrderResponse::from(
        created,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/delivery-orders/{id}",
    params(("id" = Uuid, Path, description = "Delivery order ID")),
    responses(
        (status = 200, description = "Delivery order with derived line quantities", body = ApiResponse<DeliveryOrderResponse>),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn get_delivery_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeliveryOrderResponse> {
    let detail = state.services.delivery_orders.get(id).await?;
    Ok(Json(ApiResponse::success(DeliveryOrderResponse::from(
        detail,
    ))))
}

#[utoipa::path(
    put,
    path = "/api/v1/delivery-orders/{id}",
    params(("id" = Uuid, Path, description = "Delivery order ID")),
    request_body = UpdateDeliveryOrderRequest,
    responses(
        (status = 200, description = "Delivery order updated", body = ApiResponse<DeliveryOrderResponse>),
        (status = 400, description = "Invalid request or line edit violates allocations", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "No changes detected", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn update_delivery_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<UpdateDeliveryOrderRequest>,
) -> ApiResult<DeliveryOrderResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = UpdateDeliveryOrder {
        customer_id: payload.customer_id,
        address: payload.address,
        internal_notes: payload.internal_notes,
        lines: payload.lines.map(|lines| {
            lines
                .iter()
                .map(|l| LineInput {
                    item_id: l.item_id,
                    quantity: l.quantity,
                })
                .collect()
        }),
    };

    state
        .services
        .delivery_orders
        .update(id, input, actor.0)
        .await?;
    let updated = state.services.delivery_orders.get(id).await?;

    Ok(Json(ApiResponse::success(DeliveryOrderResponse::from(
        updated,
    ))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/delivery-orders/{id}",
    params(("id" = Uuid, Path, description = "Delivery order ID")),
    responses(
        (status = 200, description = "Delivery order deleted", body = ApiResponse<Value>),
        (status = 400, description = "Order has active allocations", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-orders"
)]
pub async fn delete_delivery_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
) -> ApiResult<Value> {
    state.services.delivery_orders.delete(id, actor.0).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted": true
    }))))
}
