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
    entities::customer,
    errors::ServiceError,
    middleware::actor_id::ActorId,
    services::customers::{CreateCustomer, CustomerFilter, UpdateCustomer},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Free-text name filter
    pub name: Option<String>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub initials: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            initials: model.initials,
            address: model.address,
            phone: model.phone,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Harbor Freight Co",
    "initials": "HFC",
    "address": "12 Dockside Road",
    "phone": "+62 812 0000 1111"
}))]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 16))]
    pub initials: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub initials: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(CustomerListQuery),
    responses(
        (status = 200, description = "Customers listed", body = ApiResponse<PaginatedResponse<CustomerResponse>>)
    ),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
) -> ApiResult<PaginatedResponse<CustomerResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let filter = CustomerFilter {
        name: query.name,
        include_deleted: query.include_deleted.unwrap_or(false),
    };
    let (records, total) = state.services.customers.list(filter, page, per_page).await?;

    let items: Vec<CustomerResponse> = records.into_iter().map(CustomerResponse::from).collect();
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
    path = "/api/v1/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 200, description = "Customer created", body = ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<CreateCustomerRequest>,
) -> ApiResult<CustomerResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = CreateCustomer {
        name: payload.name,
        initials: payload.initials,
        address: payload.address,
        phone: payload.phone,
    };
    let customer_id = state.services.customers.create(input, actor.0).await?;
    let created = state.services.customers.get(customer_id).await?;

    Ok(Json(ApiResponse::success(CustomerResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer fetched", body = ApiResponse<CustomerResponse>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CustomerResponse> {
    let record = state.services.customers.get(id).await?;
    Ok(Json(ApiResponse::success(CustomerResponse::from(record))))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<CustomerResponse>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "No changes detected", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> ApiResult<CustomerResponse> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let input = UpdateCustomer {
        name: payload.name,
        initials: payload.initials,
        address: payload.address,
        phone: payload.phone,
    };
    state.services.customers.update(id, input, actor.0).await?;
    let updated = state.services.customers.get(id).await?;

    Ok(Json(ApiResponse::success(CustomerResponse::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer deleted", body = ApiResponse<Value>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(actor): Extension<ActorId>,
) -> ApiResult<Value> {
    state.services.customers.delete(id, actor.0).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted": true
    }))))
}
