use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::audit_log,
    errors::ServiceError,
    services::audit::{AuditLogFilter, ChangeType, EntityType},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Entity kind: customer, item, fleet, delivery_order or shipment
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    /// Change kind: CREATE, UPDATE, DELETE or STATUS
    pub change_type: Option<String>,
    /// Free-text details filter
    pub details: Option<String>,
    /// Inclusive date range over the log timestamp (both required)
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub actor_id: Uuid,
    pub change_type: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl From<audit_log::Model> for AuditLogResponse {
    fn from(model: audit_log::Model) -> Self {
        Self {
            id: model.id,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            actor_id: model.actor_id,
            change_type: model.change_type,
            details: model.details,
            created_at: model.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_audit_logs))
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(AuditLogListQuery),
    responses(
        (status = 200, description = "Audit logs listed", body = ApiResponse<PaginatedResponse<AuditLogResponse>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "audit-logs"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogListQuery>,
) -> ApiResult<PaginatedResponse<AuditLogResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let entity_type = query
        .entity_type
        .as_deref()
        .map(|value| {
            value.parse::<EntityType>().map_err(|_| {
                ServiceError::ValidationError(format!("unsupported entity type '{}'", value))
            })
        })
        .transpose()?;
    let change_type = query
        .change_type
        .as_deref()
        .map(|value| {
            value.parse::<ChangeType>().map_err(|_| {
                ServiceError::ValidationError(format!("unsupported change type '{}'", value))
            })
        })
        .transpose()?;

    let filter = AuditLogFilter {
        entity_type,
        entity_id: query.entity_id,
        change_type,
        details: query.details,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let (records, total) = state.services.audit_logs.list(filter, page, per_page).await?;

    let items: Vec<AuditLogResponse> = records.into_iter().map(AuditLogResponse::from).collect();
    let total_pages = (total + per_page - 1) / per_page;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit: per_page,
        total_pages,
    })))
}
