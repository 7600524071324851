use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::item;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{AuditLogService, ChangeType, EntityType, NewAuditEntry};
use crate::services::{clamp_paging, found_or};

#[derive(Debug, Clone)]
pub struct CreateItem {
    pub name: String,
    pub stock_keeping_unit: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub stock_keeping_unit: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub name: Option<String>,
    pub stock_keeping_unit: Option<String>,
    pub include_deleted: bool,
}

/// Looks up a live (non-deleted) item or fails with NotFound.
pub(crate) async fn find_live_item<C: ConnectionTrait>(
    db: &C,
    item_id: Uuid,
) -> Result<item::Model, ServiceError> {
    found_or(
        item::Entity::find_by_id(item_id)
            .filter(item::Column::DeletedAt.is_null())
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?,
        format!("Item {} not found", item_id),
    )
}

async fn ensure_sku_free<C: ConnectionTrait>(
    db: &C,
    sku: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = item::Entity::find()
        .filter(item::Column::StockKeepingUnit.eq(sku))
        .filter(item::Column::DeletedAt.is_null());
    if let Some(id) = exclude {
        query = query.filter(item::Column::Id.ne(id));
    }

    let existing = query.one(db).await.map_err(ServiceError::DatabaseError)?;
    if existing.is_some() {
        return Err(ServiceError::Conflict(format!(
            "stock keeping unit '{}' already in use",
            sku
        )));
    }
    Ok(())
}

/// Service for managing items
#[derive(Clone)]
pub struct ItemService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<AuditLogService>,
}

impl ItemService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, audit: Arc<AuditLogService>) -> Self {
        Self {
            db,
            event_sender,
            audit,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateItem, actor: Uuid) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        ensure_sku_free(&txn, &input.stock_keeping_unit, None).await?;

        let item_id = Uuid::new_v4();
        let model = item::ActiveModel {
            id: Set(item_id),
            name: Set(input.name.clone()),
            stock_keeping_unit: Set(input.stock_keeping_unit.clone()),
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
                    entity_type: EntityType::Item,
                    entity_id: item_id,
                    actor_id: actor,
                    change_type: ChangeType::Create,
                    details: format!(
                        "Created item '{}' (SKU {})",
                        input.name, input.stock_keeping_unit
                    ),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ItemCreated(item_id))
            .await;

        Ok(item_id)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, item_id: Uuid) -> Result<item::Model, ServiceError> {
        found_or(
            item::Entity::find_by_id(item_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Item {} not found", item_id),
        )
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ItemFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<item::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(page, per_page);

        let mut query = item::Entity::find();
        if !filter.include_deleted {
            query = query.filter(item::Column::DeletedAt.is_null());
        }
        if let Some(name) = filter.name.as_deref() {
            query = query.filter(item::Column::Name.contains(name));
        }
        if let Some(sku) = filter.stock_keeping_unit.as_deref() {
            query = query.filter(item::Column::StockKeepingUnit.contains(sku));
        }

        let paginator = query
            .order_by_desc(item::Column::CreatedAt)
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
        item_id: Uuid,
        input: UpdateItem,
        actor: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = find_live_item(&txn, item_id).await?;

        let new_name = input.name.clone().filter(|n| *n != record.name);
        let new_sku = input
            .stock_keeping_unit
            .clone()
            .filter(|s| *s != record.stock_keeping_unit);
        if let Some(sku) = new_sku.as_deref() {
            ensure_sku_free(&txn, sku, Some(item_id)).await?;
        }
        let new_description = input
            .description
            .clone()
            .filter(|d| Some(d) != record.description.as_ref());

        if new_name.is_none() && new_sku.is_none() && new_description.is_none() {
            return Err(ServiceError::Conflict("no changes detected".to_string()));
        }

        let details = [
            new_name.as_ref().map(|v| format!("name '{}'", v)),
            new_sku.as_ref().map(|v| format!("SKU '{}'", v)),
            new_description.as_ref().map(|v| format!("description '{}'", v)),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ");

        let mut active: item::ActiveModel = record.into();
        if let Some(name) = new_name {
            active.name = Set(name);
        }
        if let Some(sku) = new_sku {
            active.stock_keeping_unit = Set(sku);
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
                    entity_type: EntityType::Item,
                    entity_id: item_id,
                    actor_id: actor,
                    change_type: ChangeType::Update,
                    details: format!("Changed {}", details),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ItemUpdated(item_id))
            .await;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, item_id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = find_live_item(&txn, item_id).await?;

        let mut active: item::ActiveModel = record.into();
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
                    entity_type: EntityType::Item,
                    entity_id: item_id,
                    actor_id: actor,
                    change_type: ChangeType::Delete,
                    details: "Deleted item".to_string(),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ItemDeleted(item_id))
            .await;

        Ok(())
    }
}
