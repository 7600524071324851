use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{customer, shipment},
    errors::ServiceError,
    middleware::actor_id::ActorId,
    services::shipments::{
        AllocationInput, CreateShipment, ShipmentDetail, ShipmentFilter, UpdateShipment,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub customer_id: Option<Uuid>,
    pub fleet_id: Option<Uuid>,
    /// Free-text license plate filter
    pub license_plate: Option<String>,
    /// Free-text address filter
    pub address: Option<String>,
    /// Filter by completion state
    pub completed: Option<bool>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentCustomerRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentFleetRef {
    pub id: Uuid,
    pub license_plate: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationResponse {
    pub id: Uuid,
    pub delivery_order_id: Uuid,
    pub delivery_order_line_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "990e8400-e29b-41d4-a716-446655440000",
    "customer": {"id": "b9a3f2aa-1f0e-4f0a-9672-38a0de2cbc2b", "name": "Harbor Freight Co"},
    "fleet": {"id": "7c2b1c44-0b6e-4c6a-8a25-333333333333", "license_plate": "B 9301 KQJ"},
    "license_plate": "B 9301 KQJ",
    "address": "12 Dockside Road",
    "internal_notes": null,
    "completed": false,
    "proof_of_pickup": null,
    "allocations": [{
        "id": "0b0e8400-e29b-41d4-a716-444444444444",
        "delivery_order_id": "550e8400-e29b-41d4-a716-446655440000",
        "delivery_order_line_id": "8f0c4a4e-7f2b-4d8e-9a4a-111111111111",
        "item_id": "4d1531f1-a6a3-4f06-a9a3-222222222222",
        "item_name": "Steel pallet",
        "quantity": 6
    }]
}))]
pub struct ShipmentResponse {
    pub id: Uuid,
    pub customer: ShipmentCustomerRef,
    pub fleet: Option<ShipmentFleetRef>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// Present once proof of pickup is recorded
    pub proof_of_pickup: Option<String>,
    pub completed: bool,
    pub allocations: Vec<AllocationResponse>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ShipmentDetail> for ShipmentResponse {
    fn from(detail: ShipmentDetail) -> Self {
        let completed = detail.shipment.is_completed();
        Self {
            id: detail.shipment.id,
            customer: ShipmentCustomerRef {
                id: detail.customer.id,
                name: detail.customer.name,
            },
            fleet: detail.fleet.map(|f| ShipmentFleetRef {
                id: f.id,
                license_plate: f.license_plate,
            }),
            license_plate: detail.shipment.license_plate,
            address: detail.shipment.address,
            internal_notes: detail.shipment.internal_notes,
            proof_of_pickup: detail.shipment.proof_of_pickup,
            completed,
            allocations: detail
                .allocations
                .into_iter()
                .map(|a| AllocationResponse {
                    id: a.allocation.id,
                    delivery_order_id: a.delivery_order_id,
                    delivery_order_line_id: a.allocation.delivery_order_line_id,
                    item_id: a.item_id,
                    item_name: a.item_name,
                    quantity: a.allocation.quantity,
                })
                .collect(),
            deleted_at: detail.shipment.deleted_at,
            created_at: detail.shipment.created_at,
            updated_at: detail.shipment.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentSummary {
    pub id: Uuid,
    pub customer: Option<ShipmentCustomerRef>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub completed: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<(shipment::Model, Option<customer::Model>)> for ShipmentSummary {
    fn from((model, customer): (shipment::Model, Option<customer::Model>)) -> Self {
        let completed = model.is_completed();
        Self {
            id: model.id,
            customer: customer.map(|c| ShipmentCustomerRef {
                id: c.id,
                name: c.name,
            }),
            license_plate: model.license_plate,
            address: model.address,
            completed,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AllocationRequest {
    pub delivery_order_line_id: Uuid,
    /// Quantity to allocate, a positive integer within the line's pending
    /// quantity
    #[validate(range(min = 1))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "customer_id": "b9a3f2aa-1f0e-4f0a-9672-38a0de2cbc2b",
    "fleet_id": "7c2b1c44-0b6e-4c6a-8a25-333333333333",
    "license_plate": "B 9301 KQJ",
    "address": "12 Dockside Road",
    "allocations": [{
        "delivery_order_line_id": "8f0c4a4e-7f2b-4d8e-9a4a-111111111111",
        "quantity": 6
    }]
}))]
pub struct CreateShipmentRequest {
    pub customer_id: Uuid,
    pub fleet_id: Option<Uuid>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// At least one allocation; enforced with the rest of the allocation
    /// rules
    #[validate]
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateShipmentRequest {
    pub customer_id: Option<Uuid>,
    pub fleet_id: Option<Uuid>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// Full replacement set of allocations; omit to leave them untouched
    #[validate]
    pub allocations: Option<Vec<AllocationRequest>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"proof_of_pickup": "pickups/2025/06/990e8400.jpg"}))]
pub struct CompleteShipmentRequest {
    /// Reference to the recorded proof-of-pickup image
    #[validate(length(min = 1))]
    pub proof_of_pickup: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_shipments).post(create_shipment))
        .route(
            "/:id",
            get(get_shipment)
                .put(update_shipment)
                .delete(delete_shipment),
        )
        .route("/:id/complete", post(complete_shipment))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Shipments listed", body = ApiResponse<PaginatedResponse<ShipmentSummary>>)
    ),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let filter = ShipmentFilter {
        customer_id: query.customer_id,
        fleet_id: query.fleet_id,
        license_plate: query.license_plate,
        address: query.address,
        completed: query.completed,
        include_deleted: query.include_deleted.unwrap_or(false),
    };
    let (records, total) = state.services.shipments.list(filter, page, per_page).await?;

    let items: Vec<ShipmentSummary> = records.into_iter().map(ShipmentSummary::from).collect();
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
    path = "/api/v1/shipments",
    request_body = CreateShipmentRequest,
    responses(
        (status = 200, description = "Shipment created", body = ApiResponse<ShipmentResponse>),
        (status = 400, description = "Invalid request or allocation exceeds pending quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer, fleet or line not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<CreateShipmentRequest>,
) -> ApiResult<ShipmentResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = CreateShipment {
        customer_id: payload.customer_id,
        fleet_id: payload.fleet_id,
        license_plate: payload.license_plate,
        address: payload.address,
        internal_notes: payload.internal_notes,
        allocations: payload
            .allocations
            .iter()
            .map(|a| AllocationInput {
                delivery_order_line_id: a.delivery_order_line_id,
                quantity: a.quantity,
            })
            .collect(),
    };

    let shipment_id = state.services.shipments.create(input, actor.0).await?;
    let created = state.services.shipments.get(shipment_id).await?;

    Ok(Json(ApiResponse::success(ShipmentResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment fetched", body = ApiResponse<ShipmentResponse>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentResponse> {
    let detail = state.services.shipments.get(id).await?;
    Ok(Json(ApiResponse::success(ShipmentResponse::from(detail))))
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = UpdateShipmentRequest,
    responses(
        (status = 200, description = "Shipment updated", body = ApiResponse<ShipmentResponse>),
        (status = 400, description = "Invalid request, completed shipment, or allocation exceeds pending quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "No changes detected", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn update_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<UpdateShipmentRequest>,
) -> ApiResult<ShipmentResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = UpdateShipment {
        customer_id: payload.customer_id,
        fleet_id: payload.fleet_id,
        license_plate: payload.license_plate,
        address: payload.address,
        internal_notes: payload.internal_notes,
        allocations: payload.allocations.map(|allocations| {
            allocations
                .iter()
                .map(|a| AllocationInput {
                    delivery_order_line_id: a.delivery_order_line_id,
                    quantity: a.quantity,
                })
                .collect()
        }),
    };

    state.services.shipments.update(id, input, actor.0).await?;
    let updated = state.services.shipments.get(id).await?;

    Ok(Json(ApiResponse::success(ShipmentResponse::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/{id}/complete",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = CompleteShipmentRequest,
    responses(
        (status = 200, description = "Shipment completed", body = ApiResponse<ShipmentResponse>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Shipment already completed", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn complete_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<CompleteShipmentRequest>,
) -> ApiResult<ShipmentResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    state
        .services
        .shipments
        .complete(id, payload.proof_of_pickup, actor.0)
        .await?;
    let updated = state.services.shipments.get(id).await?;

    Ok(Json(ApiResponse::success(ShipmentResponse::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment deleted; affected orders recomputed", body = ApiResponse<Value>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
) -> ApiResult<Value> {
    state.services.shipments.delete(id, actor.0).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted": true
    }))))
}
