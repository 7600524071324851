use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::audit_log;
use crate::errors::ServiceError;
use crate::services::{clamp_paging, date_range_bounds};

/// Which table an audit row refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    Customer,
    Item,
    Fleet,
    DeliveryOrder,
    Shipment,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    Status,
}

/// One change record to append; written inside the caller's transaction so
/// a rolled-back edit never leaves an audit row behind.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub actor_id: Uuid,
    pub change_type: ChangeType,
    pub details: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub change_type: Option<ChangeType>,
    pub details: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct AuditLogService {
    db: Arc<DbPool>,
}

impl AuditLogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Appends one audit row using the given connection (usually an open
    /// transaction).
    pub async fn append<C: ConnectionTrait>(
        &self,
        db: &C,
        entry: NewAuditEntry,
    ) -> Result<(), ServiceError> {
        let active = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            entity_type: Set(entry.entity_type.to_string()),
            entity_id: Set(entry.entity_id),
            actor_id: Set(entry.actor_id),
            change_type: Set(entry.change_type.to_string()),
            details: Set(entry.details),
            ..Default::default()
        };

        active.insert(db).await.map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    /// Lists audit rows, newest first, with pagination
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AuditLogFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(page, per_page);
        let db = &*self.db;

        let mut query = audit_log::Entity::find();

        if let Some(entity_type) = filter.entity_type {
            query = query.filter(audit_log::Column::EntityType.eq(entity_type.to_string()));
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(audit_log::Column::EntityId.eq(entity_id));
        }
        if let Some(change_type) = filter.change_type {
            query = query.filter(audit_log::Column::ChangeType.eq(change_type.to_string()));
        }
        if let Some(details) = filter.details.as_deref() {
            query = query.filter(audit_log::Column::Details.contains(details));
        }
        if let Some((from, to)) = date_range_bounds(filter.start_date, filter.end_date)? {
            query = query
                .filter(audit_log::Column::CreatedAt.gte(from))
                .filter(audit_log::Column::CreatedAt.lt(to));
        }

        let paginator = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let rows = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(EntityType::Customer, "customer")]
    #[test_case(EntityType::DeliveryOrder, "delivery_order")]
    #[test_case(EntityType::Shipment, "shipment")]
    fn entity_type_wire_values(entity: EntityType, wire: &str) {
        assert_eq!(entity.to_string(), wire);
        assert_eq!(wire.parse::<EntityType>().unwrap(), entity);
    }

    #[test_case(ChangeType::Create, "CREATE")]
    #[test_case(ChangeType::Update, "UPDATE")]
    #[test_case(ChangeType::Delete, "DELETE")]
    #[test_case(ChangeType::Status, "STATUS")]
    fn change_type_wire_values(change: ChangeType, wire: &str) {
        assert_eq!(change.to_string(), wire);
        assert_eq!(wire.parse::<ChangeType>().unwrap(), change);
    }
}
