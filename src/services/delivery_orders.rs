use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{allocation, customer, delivery_order, delivery_order_line, item, shipment};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::fulfillment::{
    compute_line_status, derive_order_status, plan_line_edits, AllocationRow, FulfillmentStatus,
    LineEdit, LineStatus, OrderedLine,
};
use crate::services::audit::{AuditLogService, ChangeType, EntityType, NewAuditEntry};
use crate::services::customers::find_live_customer;
use crate::services::{clamp_paging, date_range_bounds, found_or};

/// One requested line on a create/update payload
#[derive(Debug, Clone, Copy)]
pub struct LineInput {
    pub item_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateDeliveryOrder {
    pub customer_id: Uuid,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    pub lines: Vec<LineInput>,
}

#[derive(Debug, Clone)]
pub struct UpdateDeliveryOrder {
    pub customer_id: Option<Uuid>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// Full replacement set of lines; `None` leaves lines untouched.
    pub lines: Option<Vec<LineInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryOrderFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<FulfillmentStatus>,
    pub customer_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_deleted: bool,
}

/// A delivery order with its derived per-line fulfillment state
#[derive(Debug, Clone)]
pub struct DeliveryOrderDetail {
    pub order: delivery_order::Model,
    pub customer: customer::Model,
    pub lines: Vec<LineDetail>,
    pub status: FulfillmentStatus,
}

#[derive(Debug, Clone)]
pub struct LineDetail {
    pub status: LineStatus,
    pub item_name: String,
}

/// Loads the ordered lines of a delivery order and folds their allocation
/// rows into derived line statuses. Runs on the caller's connection so the
/// result is consistent with an open transaction.
pub(crate) async fn load_line_statuses<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
) -> Result<Vec<LineStatus>, ServiceError> {
    let lines = delivery_order_line::Entity::find()
        .filter(delivery_order_line::Column::DeliveryOrderId.eq(order_id))
        .order_by_asc(delivery_order_line::Column::CreatedAt)
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let line_ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
    let rows = allocation::Entity::find()
        .filter(allocation::Column::DeliveryOrderLineId.is_in(line_ids))
        .find_also_related(shipment::Entity)
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let mut allocations = Vec::with_capacity(rows.len());
    for (row, owner) in rows {
        let owner = owner.ok_or_else(|| {
            ServiceError::DataIntegrity(format!("allocation {} has no owning shipment", row.id))
        })?;
        allocations.push(AllocationRow {
            line_id: row.delivery_order_line_id,
            shipment_id: row.shipment_id,
            quantity: row.quantity,
            shipment_completed: owner.is_completed(),
            shipment_deleted: owner.is_deleted(),
        });
    }

    let ordered: Vec<OrderedLine> = lines
        .iter()
        .map(|l| OrderedLine {
            line_id: l.id,
            item_id: l.item_id,
            ordered: l.quantity,
        })
        .collect();

    compute_line_status(&ordered, &allocations).map_err(Into::into)
}

/// Rederives and persists the order's status after an allocation-affecting
/// event. Returns the old/new pair when the status actually changed.
pub(crate) async fn recompute_order_status<C: ConnectionTrait>(
    db: &C,
    audit: &AuditLogService,
    order_id: Uuid,
    actor: Uuid,
) -> Result<Option<(FulfillmentStatus, FulfillmentStatus)>, ServiceError> {
    let order = found_or(
        delivery_order::Entity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?,
        format!("Delivery order {} not found", order_id),
    )?;

    let statuses = load_line_statuses(db, order_id).await?;
    let new_status = derive_order_status(&statuses);
    let old_status: FulfillmentStatus = order.status.parse().map_err(|_| {
        ServiceError::DataIntegrity(format!(
            "delivery order {} has unknown status '{}'",
            order_id, order.status
        ))
    })?;

    if new_status == old_status {
        return Ok(None);
    }

    let mut active: delivery_order::ActiveModel = order.into();
    active.status = Set(new_status.to_string());
    active.updated_at = Set(Some(Utc::now()));
    active.update(db).await.map_err(ServiceError::DatabaseError)?;

    audit
        .append(
            db,
            NewAuditEntry {
                entity_type: EntityType::DeliveryOrder,
                entity_id: order_id,
                actor_id: actor,
                change_type: ChangeType::Status,
                details: format!("Status changed from {} to {}", old_status, new_status),
            },
        )
        .await?;

    Ok(Some((old_status, new_status)))
}

/// Rejects empty, non-positive, or duplicated line inputs before any write.
fn validate_line_inputs(lines: &[LineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "a delivery order needs at least one line".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "quantity for item {} must be a positive integer",
                line.item_id
            )));
        }
        if !seen.insert(line.item_id) {
            return Err(ServiceError::ValidationError(format!(
                "item {} appears more than once",
                line.item_id
            )));
        }
    }
    Ok(())
}

/// Fetches the referenced items and fails listing every id that does not
/// resolve to a live item.
async fn ensure_items_exist<C: ConnectionTrait>(
    db: &C,
    item_ids: &[Uuid],
) -> Result<HashMap<Uuid, item::Model>, ServiceError> {
    let found = item::Entity::find()
        .filter(item::Column::Id.is_in(item_ids.to_vec()))
        .filter(item::Column::DeletedAt.is_null())
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let by_id: HashMap<Uuid, item::Model> = found.into_iter().map(|m| (m.id, m)).collect();
    let missing: Vec<String> = item_ids
        .iter()
        .filter(|id| !by_id.contains_key(id))
        .map(|id| id.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "Items not found: {}",
            missing.join(", ")
        )));
    }
    Ok(by_id)
}

/// Service for managing delivery orders and their fulfillment state
#[derive(Clone)]
pub struct DeliveryOrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<AuditLogService>,
}

impl DeliveryOrderService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, audit: Arc<AuditLogService>) -> Self {
        Self {
            db,
            event_sender,
            audit,
        }
    }

    /// Creates a delivery order with its lines; initial status is PENDING
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateDeliveryOrder,
        actor: Uuid,
    ) -> Result<Uuid, ServiceError> {
        validate_line_inputs(&input.lines)?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        find_live_customer(&txn, input.customer_id).await?;
        let item_ids: Vec<Uuid> = input.lines.iter().map(|l| l.item_id).collect();
        ensure_items_exist(&txn, &item_ids).await?;

        let order_id = Uuid::new_v4();
        let order = delivery_order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(input.customer_id),
            address: Set(input.address.clone()),
            internal_notes: Set(input.internal_notes.clone()),
            status: Set(FulfillmentStatus::Pending.to_string()),
            deleted_at: Set(None),
            ..Default::default()
        };
        order
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        for l in &input.lines {
            let line = delivery_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                delivery_order_id: Set(order_id),
                item_id: Set(l.item_id),
                quantity: Set(l.quantity),
                ..Default::default()
            };
            line.insert(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
        }

        self.audit
            .append(
                &txn,
                NewAuditEntry {
                    entity_type: EntityType::DeliveryOrder,
                    entity_id: order_id,
                    actor_id: actor,
                    change_type: ChangeType::Create,
                    details: format!(
                        "Created delivery order for customer {}; address: {}; internal notes: {}",
                        input.customer_id,
                        input.address.as_deref().unwrap_or("none"),
                        input.internal_notes.as_deref().unwrap_or("none"),
                    ),
                },
            )
            .await?;

        for line in &input.lines {
            self.audit
                .append(
                    &txn,
                    NewAuditEntry {
                        entity_type: EntityType::DeliveryOrder,
                        entity_id: order_id,
                        actor_id: actor,
                        change_type: ChangeType::Create,
                        details: format!(
                            "Added item {} with quantity {}",
                            line.item_id, line.quantity
                        ),
                    },
                )
                .await?;
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::DeliveryOrderCreated(order_id))
            .await;

        Ok(order_id)
    }

    /// Fetches a delivery order with derived per-line quantities
    #[instrument(skip(self))]
    pub async fn get(&self, order_id: Uuid) -> Result<DeliveryOrderDetail, ServiceError> {
        let db = &*self.db;

        let (order, customer) = found_or(
            delivery_order::Entity::find_by_id(order_id)
                .find_also_related(customer::Entity)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Delivery order {} not found", order_id),
        )?;
        let customer = customer.ok_or_else(|| {
            ServiceError::DataIntegrity(format!("delivery order {} has no customer", order_id))
        })?;

        let statuses = load_line_statuses(db, order_id).await?;
        let status = derive_order_status(&statuses);

        let item_ids: Vec<Uuid> = statuses.iter().map(|s| s.item_id).collect();
        let items: HashMap<Uuid, item::Model> = item::Entity::find()
            .filter(item::Column::Id.is_in(item_ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let lines = statuses
            .into_iter()
            .map(|s| {
                let item_name = items
                    .get(&s.item_id)
                    .map(|i| i.name.clone())
                    .unwrap_or_default();
                LineDetail {
                    status: s,
                    item_name,
                }
            })
            .collect();

        Ok(DeliveryOrderDetail {
            order,
            customer,
            lines,
            status,
        })
    }

    /// Lists delivery orders with their customers, newest first
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: DeliveryOrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<(delivery_order::Model, Option<customer::Model>)>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(page, per_page);
        let db = &*self.db;

        let mut query = delivery_order::Entity::find();

        if !filter.include_deleted {
            query = query.filter(delivery_order::Column::DeletedAt.is_null());
        }
        if let Some(customer_id) = filter.customer_id {
            find_live_customer(db, customer_id).await?;
            query = query.filter(delivery_order::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(delivery_order::Column::Status.eq(status.to_string()));
        }
        if let Some(name) = filter.customer_name.as_deref() {
            let matching: Vec<Uuid> = customer::Entity::find()
                .filter(customer::Column::Name.contains(name))
                .all(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .into_iter()
                .map(|c| c.id)
                .collect();
            query = query.filter(delivery_order::Column::CustomerId.is_in(matching));
        }
        if let Some((from, to)) = date_range_bounds(filter.start_date, filter.end_date)? {
            query = query
                .filter(delivery_order::Column::CreatedAt.gte(from))
                .filter(delivery_order::Column::CreatedAt.lt(to));
        }

        let paginator = query
            .order_by_desc(delivery_order::Column::CreatedAt)
            .find_also_related(customer::Entity)
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

    /// Applies header and line edits in one transaction.
    ///
    /// Line edits are diffed against current fulfillment state; removing or
    /// shrinking below allocated quantity fails, and a payload that changes
    /// nothing is a conflict. Order status is recomputed before commit.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        order_id: Uuid,
        input: UpdateDeliveryOrder,
        actor: Uuid,
    ) -> Result<(), ServiceError> {
        if let Some(lines) = input.lines.as_deref() {
            validate_line_inputs(lines)?;
        }

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = found_or(
            delivery_order::Entity::find_by_id(order_id)
                .filter(delivery_order::Column::DeletedAt.is_null())
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Delivery order {} not found", order_id),
        )?;

        let statuses = load_line_statuses(&txn, order_id).await?;

        // Header diffs: a provided value that equals the current one is not
        // a change.
        let new_customer = input
            .customer_id
            .filter(|candidate| *candidate != order.customer_id);
        if let Some(customer_id) = new_customer {
            find_live_customer(&txn, customer_id).await?;
        }
        let new_address = input
            .address
            .clone()
            .filter(|candidate| Some(candidate) != order.address.as_ref());
        let new_notes = input
            .internal_notes
            .clone()
            .filter(|candidate| Some(candidate) != order.internal_notes.as_ref());

        let change_set = match input.lines.as_deref() {
            Some(lines) => {
                let item_ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
                ensure_items_exist(&txn, &item_ids).await?;

                let edits: Vec<LineEdit> = lines
                    .iter()
                    .map(|l| LineEdit {
                        item_id: l.item_id,
                        quantity: l.quantity,
                    })
                    .collect();
                plan_line_edits(&statuses, &edits)?
            }
            None => Default::default(),
        };

        let header_changed = new_customer.is_some() || new_address.is_some() || new_notes.is_some();
        if !header_changed && change_set.is_empty() {
            return Err(ServiceError::Conflict("no changes detected".to_string()));
        }

        if header_changed {
            let mut details = Vec::new();
            if let Some(customer_id) = new_customer {
                details.push(format!(
                    "customer {} -> {}",
                    order.customer_id, customer_id
                ));
            }
            if let Some(address) = new_address.as_deref() {
                details.push(format!(
                    "address '{}' -> '{}'",
                    order.address.as_deref().unwrap_or(""),
                    address
                ));
            }
            if let Some(notes) = new_notes.as_deref() {
                details.push(format!(
                    "internal notes '{}' -> '{}'",
                    order.internal_notes.as_deref().unwrap_or(""),
                    notes
                ));
            }

            let mut active: delivery_order::ActiveModel = order.clone().into();
            if let Some(customer_id) = new_customer {
                active.customer_id = Set(customer_id);
            }
            if let Some(address) = new_address {
                active.address = Set(Some(address));
            }
            if let Some(notes) = new_notes {
                active.internal_notes = Set(Some(notes));
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
                        entity_type: EntityType::DeliveryOrder,
                        entity_id: order_id,
                        actor_id: actor,
                        change_type: ChangeType::Update,
                        details: format!("Changed {}", details.join("; ")),
                    },
                )
                .await?;
        }

        // Persist the planned line change set
        if !change_set.created.is_empty() {
            for edit in &change_set.created {
                let line = delivery_order_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    delivery_order_id: Set(order_id),
                    item_id: Set(edit.item_id),
                    quantity: Set(edit.quantity),
                    ..Default::default()
                };
                line.insert(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }

            for edit in &change_set.created {
                self.audit
                    .append(
                        &txn,
                        NewAuditEntry {
                            entity_type: EntityType::DeliveryOrder,
                            entity_id: order_id,
                            actor_id: actor,
                            change_type: ChangeType::Create,
                            details: format!(
                                "Added item {} with quantity {}",
                                edit.item_id, edit.quantity
                            ),
                        },
                    )
                    .await?;
            }
        }

        if !change_set.updated.is_empty() {
            let line_by_item: HashMap<Uuid, Uuid> = statuses
                .iter()
                .map(|status| (status.item_id, status.line_id))
                .collect();

            for edit in &change_set.updated {
                let line_id = line_by_item.get(&edit.item_id).copied().ok_or_else(|| {
                    ServiceError::DataIntegrity(format!(
                        "planned update for item {} has no line",
                        edit.item_id
                    ))
                })?;

                let active = delivery_order_line::ActiveModel {
                    id: ActiveValue::Unchanged(line_id),
                    quantity: Set(edit.quantity),
                    updated_at: Set(Some(Utc::now())),
                    ..Default::default()
                };
                active
                    .update(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;

                self.audit
                    .append(
                        &txn,
                        NewAuditEntry {
                            entity_type: EntityType::DeliveryOrder,
                            entity_id: order_id,
                            actor_id: actor,
                            change_type: ChangeType::Update,
                            details: format!(
                                "Changed quantity of item {} to {}",
                                edit.item_id, edit.quantity
                            ),
                        },
                    )
                    .await?;
            }
        }

        if !change_set.removed.is_empty() {
            let removed_ids: Vec<Uuid> = change_set.removed.iter().map(|s| s.line_id).collect();
            delivery_order_line::Entity::delete_many()
                .filter(delivery_order_line::Column::Id.is_in(removed_ids))
                .exec(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            for removed in &change_set.removed {
                self.audit
                    .append(
                        &txn,
                        NewAuditEntry {
                            entity_type: EntityType::DeliveryOrder,
                            entity_id: order_id,
                            actor_id: actor,
                            change_type: ChangeType::Delete,
                            details: format!("Removed item {}", removed.item_id),
                        },
                    )
                    .await?;
            }
        }

        let status_change = recompute_order_status(&txn, &self.audit, order_id, actor).await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::DeliveryOrderUpdated(order_id))
            .await;
        if let Some((old_status, new_status)) = status_change {
            self.event_sender
                .send_or_log(Event::DeliveryOrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await;
        }

        Ok(())
    }

    /// Soft-deletes an order; refused while any line has allocated quantity
    /// on a non-deleted shipment
    #[instrument(skip(self))]
    pub async fn delete(&self, order_id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = found_or(
            delivery_order::Entity::find_by_id(order_id)
                .filter(delivery_order::Column::DeletedAt.is_null())
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Delivery order {} not found", order_id),
        )?;

        let statuses = load_line_statuses(&txn, order_id).await?;
        if statuses.iter().any(|s| s.allocated() > 0) {
            return Err(ServiceError::ValidationError(
                "delivery order has allocations on active shipments".to_string(),
            ));
        }

        let mut active: delivery_order::ActiveModel = order.into();
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
                    entity_type: EntityType::DeliveryOrder,
                    entity_id: order_id,
                    actor_id: actor,
                    change_type: ChangeType::Delete,
                    details: "Deleted delivery order".to_string(),
                },
            )
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::DeliveryOrderDeleted(order_id))
            .await;

        Ok(())
    }
}
