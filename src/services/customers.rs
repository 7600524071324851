use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::customer;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{AuditLogService, ChangeType, EntityType, NewAuditEntry};
use crate::services::{clamp_paging, found_or};

#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub name: String,
    pub initials: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub initials: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub name: Option<String>,
    pub include_deleted: bool,
}

/// Looks up a live (non-deleted) customer or fails with NotFound.
pub(crate) async fn find_live_customer<C: ConnectionTrait>(
    db: &C,
    customer_id: Uuid,
) -> Result<customer::Model, ServiceError> {
    found_or(
        customer::Entity::find_by_id(customer_id)
            .filter(customer::Column::DeletedAt.is_null())
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?,
        format!("Customer {} not found", customer_id),
    )
}

async fn ensure_name_free<C: ConnectionTrait>(
    db: &C,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = customer::Entity::find()
        .filter(customer::Column::Name.eq(name))
        .filter(customer::Column::DeletedAt.is_null());
    if let Some(id) = exclude {
        query = query.filter(customer::Column::Id.ne(id));
    }

    let existing = query.one(db).await.map_err(ServiceError::DatabaseError)?;
    if existing.is_some() {
        return Err(ServiceError::Conflict(format!(
            "customer name '{}' already in use",
            name
        )));
    }
    Ok(())
}

/// Service for managing customers
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<AuditLogService>,
}

impl CustomerService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, audit: Arc<AuditLogService>) -> Self {
        Self {
            db,
            event_sender,
            audit,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateCustomer, actor: Uuid) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        ensure_name_free(&txn, &input.name, None).await?;

        let customer_id = Uuid::new_v4();
        let model = customer::ActiveModel {
            id: Set(customer_id),
            name: Set(input.name.clone()),
            initials: Set(input.initials.clone()),
            address: Set(input.address.clone()),
            phone: Set(input.phone.clone()),
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
                    entity_type: EntityType::Customer,
                    entity_id: customer_id,
                    actor_id: actor,
                    change_type: ChangeType::Create,
                    details: format!("Created customer '{}' ({})", input.name, input.initials),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::CustomerCreated(customer_id))
            .await;

        Ok(customer_id)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        found_or(
            customer::Entity::find_by_id(customer_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Customer {} not found", customer_id),
        )
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: CustomerFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(page, per_page);

        let mut query = customer::Entity::find();
        if !filter.include_deleted {
            query = query.filter(customer::Column::DeletedAt.is_null());
        }
        if let Some(name) = filter.name.as_deref() {
            query = query.filter(customer::Column::Name.contains(name));
        }

        let paginator = query
            .order_by_desc(customer::Column::CreatedAt)
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
        customer_id: Uuid,
        input: UpdateCustomer,
        actor: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = find_live_customer(&txn, customer_id).await?;

        let new_name = input.name.clone().filter(|n| *n != record.name);
        if let Some(name) = new_name.as_deref() {
            ensure_name_free(&txn, name, Some(customer_id)).await?;
        }
        let new_initials = input.initials.clone().filter(|i| *i != record.initials);
        let new_address = input
            .address
            .clone()
            .filter(|a| Some(a) != record.address.as_ref());
        let new_phone = input
            .phone
            .clone()
            .filter(|p| Some(p) != record.phone.as_ref());

        if new_name.is_none()
            && new_initials.is_none()
            && new_address.is_none()
            && new_phone.is_none()
        {
            return Err(ServiceError::Conflict("no changes detected".to_string()));
        }

        let details = [
            new_name.as_ref().map(|v| format!("name '{}'", v)),
            new_initials.as_ref().map(|v| format!("initials '{}'", v)),
            new_address.as_ref().map(|v| format!("address '{}'", v)),
            new_phone.as_ref().map(|v| format!("phone '{}'", v)),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ");

        let mut active: customer::ActiveModel = record.into();
        if let Some(name) = new_name {
            active.name = Set(name);
        }
        if let Some(initials) = new_initials {
            active.initials = Set(initials);
        }
        if let Some(address) = new_address {
            active.address = Set(Some(address));
        }
        if let Some(phone) = new_phone {
            active.phone = Set(Some(phone));
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
                    entity_type: EntityType::Customer,
                    entity_id: customer_id,
                    actor_id: actor,
                    change_type: ChangeType::Update,
                    details: format!("Changed {}", details),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::CustomerUpdated(customer_id))
            .await;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, customer_id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = find_live_customer(&txn, customer_id).await?;

        let mut active: customer::ActiveModel = record.into();
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
                    entity_type: EntityType::Customer,
                    entity_id: customer_id,
                    actor_id: actor,
                    change_type: ChangeType::Delete,
                    details: "Deleted customer".to_string(),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::CustomerDeleted(customer_id))
            .await;

        Ok(())
    }
}
