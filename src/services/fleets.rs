use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::fleet;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{AuditLogService, ChangeType, EntityType, NewAuditEntry};
use crate::services::{clamp_paging, found_or};

#[derive(Debug, Clone)]
pub struct CreateFleet {
    pub license_plate: String,
    pub vehicle_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateFleet {
    pub license_plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FleetFilter {
    pub license_plate: Option<String>,
    pub include_deleted: bool,
}

/// Looks up a live (non-deleted) fleet vehicle or fails with NotFound.
pub(crate) async fn find_live_fleet<C: ConnectionTrait>(
    db: &C,
    fleet_id: Uuid,
) -> Result<fleet::Model, ServiceError> {
    found_or(
        fleet::Entity::find_by_id(fleet_id)
            .filter(fleet::Column::DeletedAt.is_null())
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?,
        format!("Fleet {} not found", fleet_id),
    )
}

async fn ensure_plate_free<C: ConnectionTrait>(
    db: &C,
    license_plate: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = fleet::Entity::find()
        .filter(fleet::Column::LicensePlate.eq(license_plate))
        .filter(fleet::Column::DeletedAt.is_null());
    if let Some(id) = exclude {
        query = query.filter(fleet::Column::Id.ne(id));
    }

    let existing = query.one(db).await.map_err(ServiceError::DatabaseError)?;
    if existing.is_some() {
        return Err(ServiceError::Conflict(format!(
            "license plate '{}' already in use",
            license_plate
        )));
    }
    Ok(())
}

/// Service for managing fleet vehicles
#[derive(Clone)]
pub struct FleetService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<AuditLogService>,
}

impl FleetService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, audit: Arc<AuditLogService>) -> Self {
        Self {
            db,
            event_sender,
            audit,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateFleet, actor: Uuid) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        ensure_plate_free(&txn, &input.license_plate, None).await?;

        let fleet_id = Uuid::new_v4();
        let model = fleet::ActiveModel {
            id: Set(fleet_id),
            license_plate: Set(input.license_plate.clone()),
            vehicle_type: Set(input.vehicle_type.clone()),
            description: Set(input.description.clone()),
            deleted_at: Set(None),
            ..Default::default()
        };
        model
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.audit
            .append(
                &txn,
                NewAuditEntry {
                    entity_type: EntityType::Fleet,
                    entity_id: fleet_id,
                    actor_id: actor,
                    change_type: ChangeType::Create,
                    details: format!("Created fleet vehicle '{}'", input.license_plate),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::FleetCreated(fleet_id))
            .await;

        Ok(fleet_id)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, fleet_id: Uuid) -> Result<fleet::Model, ServiceError> {
        found_or(
            fleet::Entity::find_by_id(fleet_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Fleet {} not found", fleet_id),
        )
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: FleetFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<fleet::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(page, per_page);

        let mut query = fleet::Entity::find();
        if !filter.include_deleted {
            query = query.filter(fleet::Column::DeletedAt.is_null());
        }
        if let Some(license_plate) = filter.license_plate.as_deref() {
            query = query.filter(fleet::Column::LicensePlate.contains(license_plate));
        }

        let paginator = query
            .order_by_desc(fleet::Column::CreatedAt)
            .paginate(&*self.db, per_page);

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

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        fleet_id: Uuid,
        input: UpdateFleet,
        actor: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = find_live_fleet(&txn, fleet_id).await?;

        let new_plate = input
            .license_plate
            .clone()
            .filter(|p| *p != record.license_plate);
        if let Some(plate) = new_plate.as_deref() {
            ensure_plate_free(&txn, plate, Some(fleet_id)).await?;
        }
        let new_vehicle_type = input
            .vehicle_type
            .clone()
            .filter(|v| Some(v) != record.vehicle_type.as_ref());
        let new_description = input
            .description
            .clone()
            .filter(|d| Some(d) != record.description.as_ref());

        if new_plate.is_none() && new_vehicle_type.is_none() && new_description.is_none() {
            return Err(ServiceError::Conflict("no changes detected".to_string()));
        }

        let details = [
            new_plate.as_ref().map(|v| format!("license plate '{}'", v)),
            new_vehicle_type
                .as_ref()
                .map(|v| format!("vehicle type '{}'", v)),
            new_description
                .as_ref()
                .map(|v| format!("description '{}'", v)),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ");

        let mut active: fleet::ActiveModel = record.into();
        if let Some(plate) = new_plate {
            active.license_plate = Set(plate);
        }
        if let Some(vehicle_type) = new_vehicle_type {
            active.vehicle_type = Set(Some(vehicle_type));
        }
        if let Some(description) = new_description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Some(Utc::now()));
        active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.audit
            .append(
                &txn,
                NewAuditEntry {
                    entity_type: EntityType::Fleet,
                    entity_id: fleet_id,
                    actor_id: actor,
                    change_type: ChangeType::Update,
                    details: format!("Changed {}", details),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::FleetUpdated(fleet_id))
            .await;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, fleet_id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = find_live_fleet(&txn, fleet_id).await?;

        let mut active: fleet::ActiveModel = record.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Some(Utc::now()));
        active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.audit
            .append(
                &txn,
                NewAuditEntry {
                    entity_type: EntityType::Fleet,
                    entity_id: fleet_id,
                    actor_id: actor,
                    change_type: ChangeType::Delete,
                    details: "Deleted fleet vehicle".to_string(),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::FleetDeleted(fleet_id))
            .await;

        Ok(())
    }
}
