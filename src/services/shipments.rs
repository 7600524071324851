use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{allocation, customer, delivery_order, delivery_order_line, fleet, item, shipment};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::fulfillment::{FulfillmentStatus, LineStatus};
use crate::services::audit::{AuditLogService, ChangeType, EntityType, NewAuditEntry};
use crate::services::customers::find_live_customer;
use crate::services::delivery_orders::{load_line_statuses, recompute_order_status};
use crate::services::fleets::find_live_fleet;
use crate::services::{clamp_paging, found_or};

/// A requested allocation of a delivery-order line to this shipment
#[derive(Debug, Clone, Copy)]
pub struct AllocationInput {
    pub delivery_order_line_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateShipment {
    pub customer_id: Uuid,
    pub fleet_id: Option<Uuid>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    pub allocations: Vec<AllocationInput>,
}

#[derive(Debug, Clone)]
pub struct UpdateShipment {
    pub customer_id: Option<Uuid>,
    pub fleet_id: Option<Uuid>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub internal_notes: Option<String>,
    /// Full replacement set of allocations; `None` leaves them untouched.
    pub allocations: Option<Vec<AllocationInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub customer_id: Option<Uuid>,
    pub fleet_id: Option<Uuid>,
    pub license_plate: Option<String>,
    pub address: Option<String>,
    pub completed: Option<bool>,
    pub include_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct ShipmentDetail {
    pub shipment: shipment::Model,
    pub customer: customer::Model,
    pub fleet: Option<fleet::Model>,
    pub allocations: Vec<AllocationDetail>,
}

#[derive(Debug, Clone)]
pub struct AllocationDetail {
    pub allocation: allocation::Model,
    pub delivery_order_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
}

fn validate_allocation_inputs(allocations: &[AllocationInput]) -> Result<(), ServiceError> {
    if allocations.is_empty() {
        return Err(ServiceError::ValidationError(
            "a shipment needs at least one allocation".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for alloc in allocations {
        if alloc.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "allocation quantity for line {} must be a positive integer",
                alloc.delivery_order_line_id
            )));
        }
        if !seen.insert(alloc.delivery_order_line_id) {
            return Err(ServiceError::ValidationError(format!(
                "line {} appears more than once",
                alloc.delivery_order_line_id
            )));
        }
    }
    Ok(())
}

/// Loads the requested lines and fails listing every id that does not
/// resolve, or whose owning order is soft-deleted.
async fn ensure_lines_exist<C: ConnectionTrait>(
    db: &C,
    line_ids: &[Uuid],
) -> Result<HashMap<Uuid, delivery_order_line::Model>, ServiceError> {
    let found = delivery_order_line::Entity::find()
        .filter(delivery_order_line::Column::Id.is_in(line_ids.to_vec()))
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let by_id: HashMap<Uuid, delivery_order_line::Model> =
        found.into_iter().map(|m| (m.id, m)).collect();
    let missing: Vec<String> = line_ids
        .iter()
        .filter(|id| !by_id.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "Delivery order lines not found: {}",
            missing.join(", ")
        )));
    }

    let mut order_ids: Vec<Uuid> = by_id.values().map(|l| l.delivery_order_id).collect();
    order_ids.sort();
    order_ids.dedup();

    let live_orders: HashSet<Uuid> = delivery_order::Entity::find()
        .filter(delivery_order::Column::Id.is_in(order_ids.clone()))
        .filter(delivery_order::Column::DeletedAt.is_null())
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?
        .into_iter()
        .map(|o| o.id)
        .collect();

    for order_id in &order_ids {
        if !live_orders.contains(order_id) {
            return Err(ServiceError::ValidationError(format!(
                "delivery order {} is deleted and cannot receive shipments",
                order_id
            )));
        }
    }

    Ok(by_id)
}

/// The distinct delivery orders owning the given lines.
async fn orders_of_lines<C: ConnectionTrait>(
    db: &C,
    line_ids: &[Uuid],
) -> Result<Vec<Uuid>, ServiceError> {
    if line_ids.is_empty() {
        return Ok(Vec::new());
    }

    let lines = delivery_order_line::Entity::find()
        .filter(delivery_order_line::Column::Id.is_in(line_ids.to_vec()))
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let mut order_ids: Vec<Uuid> = lines.into_iter().map(|l| l.delivery_order_id).collect();
    order_ids.sort();
    order_ids.dedup();
    Ok(order_ids)
}

/// Per-line pending quantities across the given orders.
async fn pending_by_line<C: ConnectionTrait>(
    db: &C,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, LineStatus>, ServiceError> {
    let mut map = HashMap::new();
    for order_id in order_ids {
        for status in load_line_statuses(db, *order_id).await? {
            map.insert(status.line_id, status);
        }
    }
    Ok(map)
}

/// Service for managing shipments and their allocations
#[derive(Clone)]
pub struct ShipmentService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    audit: Arc<AuditLogService>,
}

impl ShipmentService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, audit: Arc<AuditLogService>) -> Self {
        Self {
            db,
            event_sender,
            audit,
        }
    }

    async fn emit_status_changes(
        &self,
        changes: Vec<(Uuid, FulfillmentStatus, FulfillmentStatus)>,
    ) {
        for (order_id, old_status, new_status) in changes {
            self.event_sender
                .send_or_log(Event::DeliveryOrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await;
        }
    }

    /// Creates a shipment consuming pending quantity of delivery-order
    /// lines. Every allocation is checked against the line's pending
    /// quantity inside the transaction, so concurrent shipments cannot race
    /// past the ordered quantity.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateShipment, actor: Uuid) -> Result<Uuid, ServiceError> {
        validate_allocation_inputs(&input.allocations)?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        find_live_customer(&txn, input.customer_id).await?;
        if let Some(fleet_id) = input.fleet_id {
            find_live_fleet(&txn, fleet_id).await?;
        }

        let line_ids: Vec<Uuid> = input
            .allocations
            .iter()
            .map(|a| a.delivery_order_line_id)
            .collect();
        ensure_lines_exist(&txn, &line_ids).await?;

        let affected_orders = orders_of_lines(&txn, &line_ids).await?;
        let pending = pending_by_line(&txn, &affected_orders).await?;

        for alloc in &input.allocations {
            let line_status = pending.get(&alloc.delivery_order_line_id).ok_or_else(|| {
                ServiceError::DataIntegrity(format!(
                    "line {} missing from fulfillment state",
                    alloc.delivery_order_line_id
                ))
            })?;
            if alloc.quantity > line_status.pending {
                return Err(ServiceError::ValidationError(format!(
                    "allocation exceeds pending quantity for line {}: pending {}, requested {}",
                    alloc.delivery_order_line_id, line_status.pending, alloc.quantity
                )));
            }
        }

        let shipment_id = Uuid::new_v4();
        let model = shipment::ActiveModel {
            id: Set(shipment_id),
            customer_id: Set(input.customer_id),
            fleet_id: Set(input.fleet_id),
            license_plate: Set(input.license_plate.clone()),
            address: Set(input.address.clone()),
            internal_notes: Set(input.internal_notes.clone()),
            proof_of_pickup: Set(None),
            deleted_at: Set(None),
            ..Default::default()
        };
        model
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        for a in &input.allocations {
            let row = allocation::ActiveModel {
                id: Set(Uuid::new_v4()),
                delivery_order_line_id: Set(a.delivery_order_line_id),
                shipment_id: Set(shipment_id),
                quantity: Set(a.quantity),
                ..Default::default()
            };
            row.insert(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
        }

        self.audit
            .append(
                &txn,
                NewAuditEntry {
                    entity_type: EntityType::Shipment,
                    entity_id: shipment_id,
                    actor_id: actor,
                    change_type: ChangeType::Create,
                    details: format!(
                        "Created shipment for customer {}; license plate: {}; address: {}",
                        input.customer_id,
                        input.license_plate.as_deref().unwrap_or("none"),
                        input.address.as_deref().unwrap_or("none"),
                    ),
                },
            )
            .await?;
        for alloc in &input.allocations {
            self.audit
                .append(
                    &txn,
                    NewAuditEntry {
                        entity_type: EntityType::Shipment,
                        entity_id: shipment_id,
                        actor_id: actor,
                        change_type: ChangeType::Create,
                        details: format!(
                            "Allocated quantity {} of line {}",
                            alloc.quantity, alloc.delivery_order_line_id
                        ),
                    },
                )
                .await?;
        }

        let mut status_changes = Vec::new();
        for order_id in &affected_orders {
            if let Some((old_status, new_status)) =
                recompute_order_status(&txn, &self.audit, *order_id, actor).await?
            {
                status_changes.push((*order_id, old_status, new_status));
            }
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ShipmentCreated(shipment_id))
            .await;
        self.emit_status_changes(status_changes).await;

        Ok(shipment_id)
    }

    /// Fetches a shipment with its allocations and item detail
    #[instrument(skip(self))]
    pub async fn get(&self, shipment_id: Uuid) -> Result<ShipmentDetail, ServiceError> {
        let db = &*self.db;

        let record = found_or(
            shipment::Entity::find_by_id(shipment_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Shipment {} not found", shipment_id),
        )?;

        let customer = found_or(
            customer::Entity::find_by_id(record.customer_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Customer {} not found", record.customer_id),
        )?;

        let fleet = match record.fleet_id {
            Some(fleet_id) => fleet::Entity::find_by_id(fleet_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?,
            None => None,
        };

        let rows = allocation::Entity::find()
            .filter(allocation::Column::ShipmentId.eq(shipment_id))
            .find_also_related(delivery_order_line::Entity)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let item_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|(_, line)| line.as_ref().map(|l| l.item_id))
            .collect();
        let items: HashMap<Uuid, item::Model> = item::Entity::find()
            .filter(item::Column::Id.is_in(item_ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut allocations = Vec::with_capacity(rows.len());
        for (row, line) in rows {
            let line = line.ok_or_else(|| {
                ServiceError::DataIntegrity(format!("allocation {} has no line", row.id))
            })?;
            let item_name = items
                .get(&line.item_id)
                .map(|i| i.name.clone())
                .unwrap_or_default();
            allocations.push(AllocationDetail {
                allocation: row,
                delivery_order_id: line.delivery_order_id,
                item_id: line.item_id,
                item_name,
            });
        }

        Ok(ShipmentDetail {
            shipment: record,
            customer,
            fleet,
            allocations,
        })
    }

    /// Lists shipments, newest first, with pagination
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ShipmentFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<(shipment::Model, Option<customer::Model>)>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(page, per_page);
        let db = &*self.db;

        let mut query = shipment::Entity::find();

        if !filter.include_deleted {
            query = query.filter(shipment::Column::DeletedAt.is_null());
        }
        if let Some(customer_id) = filter.customer_id {
            find_live_customer(db, customer_id).await?;
            query = query.filter(shipment::Column::CustomerId.eq(customer_id));
        }
        if let Some(fleet_id) = filter.fleet_id {
            find_live_fleet(db, fleet_id).await?;
            query = query.filter(shipment::Column::FleetId.eq(fleet_id));
        }
        if let Some(completed) = filter.completed {
            query = if completed {
                query.filter(shipment::Column::ProofOfPickup.is_not_null())
            } else {
                query.filter(shipment::Column::ProofOfPickup.is_null())
            };
        }

        // Free-text filters match either field, as one OR group
        let mut text = Condition::any();
        let mut has_text = false;
        if let Some(license_plate) = filter.license_plate.as_deref() {
            text = text.add(shipment::Column::LicensePlate.contains(license_plate));
            has_text = true;
        }
        if let Some(address) = filter.address.as_deref() {
            text = text.add(shipment::Column::Address.contains(address));
            has_text = true;
        }
        if has_text {
            query = query.filter(text);
        }

        let paginator = query
            .order_by_desc(shipment::Column::CreatedAt)
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

    /// Applies header and allocation edits in one transaction. Refused
    /// entirely once the shipment is completed; allocation changes are
    /// re-checked against pending quantities.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        shipment_id: Uuid,
        input: UpdateShipment,
        actor: Uuid,
    ) -> Result<(), ServiceError> {
        if let Some(allocations) = input.allocations.as_deref() {
            validate_allocation_inputs(allocations)?;
        }

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = found_or(
            shipment::Entity::find_by_id(shipment_id)
                .filter(shipment::Column::DeletedAt.is_null())
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Shipment {} not found", shipment_id),
        )?;
        if record.is_completed() {
            return Err(ServiceError::ValidationError(
                "completed shipment cannot be modified".to_string(),
            ));
        }

        // Header diffs
        let new_customer = input
            .customer_id
            .filter(|candidate| *candidate != record.customer_id);
        if let Some(customer_id) = new_customer {
            find_live_customer(&txn, customer_id).await?;
        }
        let new_fleet = input
            .fleet_id
            .filter(|candidate| Some(*candidate) != record.fleet_id);
        if let Some(fleet_id) = new_fleet {
            find_live_fleet(&txn, fleet_id).await?;
        }
        let new_license_plate = input
            .license_plate
            .clone()
            .filter(|candidate| Some(candidate) != record.license_plate.as_ref());
        let new_address = input
            .address
            .clone()
            .filter(|candidate| Some(candidate) != record.address.as_ref());
        let new_notes = input
            .internal_notes
            .clone()
            .filter(|candidate| Some(candidate) != record.internal_notes.as_ref());
        let header_changed = new_customer.is_some()
            || new_fleet.is_some()
            || new_license_plate.is_some()
            || new_address.is_some()
            || new_notes.is_some();

        // Allocation diffs keyed by line id
        let current_rows = allocation::Entity::find()
            .filter(allocation::Column::ShipmentId.eq(shipment_id))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let current_by_line: HashMap<Uuid, &allocation::Model> = current_rows
            .iter()
            .map(|row| (row.delivery_order_line_id, row))
            .collect();

        let mut added: Vec<AllocationInput> = Vec::new();
        let mut removed: Vec<allocation::Model> = Vec::new();
        let mut changed: Vec<(allocation::Model, i64)> = Vec::new();

        if let Some(requested) = input.allocations.as_deref() {
            let requested_lines: HashSet<Uuid> =
                requested.iter().map(|a| a.delivery_order_line_id).collect();

            for req in requested {
                match current_by_line.get(&req.delivery_order_line_id) {
                    None => added.push(*req),
                    Some(existing) if existing.quantity != req.quantity => {
                        changed.push(((*existing).clone(), req.quantity));
                    }
                    Some(_) => {}
                }
            }
            for row in &current_rows {
                if !requested_lines.contains(&row.delivery_order_line_id) {
                    removed.push(row.clone());
                }
            }

            let added_lines: Vec<Uuid> =
                added.iter().map(|a| a.delivery_order_line_id).collect();
            ensure_lines_exist(&txn, &added_lines).await?;

            // Headroom check: pending already counts this shipment's
            // current allocations, so a change of old -> new needs
            // new - old <= pending.
            let mut touched: Vec<Uuid> = added_lines.clone();
            touched.extend(changed.iter().map(|(row, _)| row.delivery_order_line_id));
            let affected = orders_of_lines(&txn, &touched).await?;
            let pending = pending_by_line(&txn, &affected).await?;

            for req in &added {
                let line_status =
                    pending.get(&req.delivery_order_line_id).ok_or_else(|| {
                        ServiceError::DataIntegrity(format!(
                            "line {} missing from fulfillment state",
                            req.delivery_order_line_id
                        ))
                    })?;
                if req.quantity > line_status.pending {
                    return Err(ServiceError::ValidationError(format!(
                        "allocation exceeds pending quantity for line {}: pending {}, requested {}",
                        req.delivery_order_line_id, line_status.pending, req.quantity
                    )));
                }
            }
            for (row, new_quantity) in &changed {
                let line_status =
                    pending.get(&row.delivery_order_line_id).ok_or_else(|| {
                        ServiceError::DataIntegrity(format!(
                            "line {} missing from fulfillment state",
                            row.delivery_order_line_id
                        ))
                    })?;
                if new_quantity - row.quantity > line_status.pending {
                    return Err(ServiceError::ValidationError(format!(
                        "allocation exceeds pending quantity for line {}: pending {}, requested {}",
                        row.delivery_order_line_id, line_status.pending, new_quantity
                    )));
                }
            }
        }

        let allocations_changed = !added.is_empty() || !removed.is_empty() || !changed.is_empty();
        if !header_changed && !allocations_changed {
            return Err(ServiceError::Conflict("no changes detected".to_string()));
        }

        if header_changed {
            let mut active: shipment::ActiveModel = record.clone().into();
            if let Some(customer_id) = new_customer {
                active.customer_id = Set(customer_id);
            }
            if let Some(fleet_id) = new_fleet {
                active.fleet_id = Set(Some(fleet_id));
            }
            if let Some(license_plate) = new_license_plate.clone() {
                active.license_plate = Set(Some(license_plate));
            }
            if let Some(address) = new_address.clone() {
                active.address = Set(Some(address));
            }
            if let Some(notes) = new_notes.clone() {
                active.internal_notes = Set(Some(notes));
            }
            active.updated_at = Set(Some(Utc::now()));
            active
                .update(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            let details = [
                new_customer.map(|id| format!("customer {}", id)),
                new_fleet.map(|id| format!("fleet {}", id)),
                new_license_plate.map(|value| format!("license plate '{}'", value)),
                new_address.map(|value| format!("address '{}'", value)),
                new_notes.map(|value| format!("internal notes '{}'", value)),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("; ");

            self.audit
                .append(
                    &txn,
                    NewAuditEntry {
                        entity_type: EntityType::Shipment,
                        entity_id: shipment_id,
                        actor_id: actor,
                        change_type: ChangeType::Update,
                        details: format!("Changed {}", details),
                    },
                )
                .await?;
        }

        let mut touched_lines: Vec<Uuid> = Vec::new();

        if !added.is_empty() {
            for a in &added {
                let row = allocation::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    delivery_order_line_id: Set(a.delivery_order_line_id),
                    shipment_id: Set(shipment_id),
                    quantity: Set(a.quantity),
                    ..Default::default()
                };
                row.insert(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }

            for a in &added {
                touched_lines.push(a.delivery_order_line_id);
                self.audit
                    .append(
                        &txn,
                        NewAuditEntry {
                            entity_type: EntityType::Shipment,
                            entity_id: shipment_id,
                            actor_id: actor,
                            change_type: ChangeType::Update,
                            details: format!(
                                "Allocated quantity {} of line {}",
                                a.quantity, a.delivery_order_line_id
                            ),
                        },
                    )
                    .await?;
            }
        }

        if !removed.is_empty() {
            let removed_ids: Vec<Uuid> = removed.iter().map(|row| row.id).collect();
            allocation::Entity::delete_many()
                .filter(allocation::Column::Id.is_in(removed_ids))
                .exec(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            for row in &removed {
                touched_lines.push(row.delivery_order_line_id);
                self.audit
                    .append(
                        &txn,
                        NewAuditEntry {
                            entity_type: EntityType::Shipment,
                            entity_id: shipment_id,
                            actor_id: actor,
                            change_type: ChangeType::Update,
                            details: format!(
                                "Released allocation of line {}",
                                row.delivery_order_line_id
                            ),
                        },
                    )
                    .await?;
            }
        }

        for (row, new_quantity) in &changed {
            touched_lines.push(row.delivery_order_line_id);
            let active = allocation::ActiveModel {
                id: ActiveValue::Unchanged(row.id),
                quantity: Set(*new_quantity),
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
                        entity_type: EntityType::Shipment,
                        entity_id: shipment_id,
                        actor_id: actor,
                        change_type: ChangeType::Update,
                        details: format!(
                            "Changed allocated quantity of line {} to {}",
                            row.delivery_order_line_id, new_quantity
                        ),
                    },
                )
                .await?;
        }

        let mut status_changes = Vec::new();
        for order_id in orders_of_lines(&txn, &touched_lines).await? {
            if let Some((old_status, new_status)) =
                recompute_order_status(&txn, &self.audit, order_id, actor).await?
            {
                status_changes.push((order_id, old_status, new_status));
            }
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ShipmentUpdated(shipment_id))
            .await;
        self.emit_status_changes(status_changes).await;

        Ok(())
    }

    /// Records the proof-of-pickup reference, marking the shipment
    /// completed; its allocations shift from processing to completed
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        shipment_id: Uuid,
        proof_of_pickup: String,
        actor: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = found_or(
            shipment::Entity::find_by_id(shipment_id)
                .filter(shipment::Column::DeletedAt.is_null())
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Shipment {} not found", shipment_id),
        )?;
        if record.is_completed() {
            return Err(ServiceError::Conflict(
                "shipment already completed".to_string(),
            ));
        }

        let mut active: shipment::ActiveModel = record.into();
        active.proof_of_pickup = Set(Some(proof_of_pickup.clone()));
        active.updated_at = Set(Some(Utc::now()));
        active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.audit
            .append(
                &txn,
                NewAuditEntry {
                    entity_type: EntityType::Shipment,
                    entity_id: shipment_id,
                    actor_id: actor,
                    change_type: ChangeType::Status,
                    details: format!("Completed shipment with proof of pickup {}", proof_of_pickup),
                },
            )
            .await?;

        let status_changes = self
            .recompute_orders_of_shipment(&txn, shipment_id, actor)
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ShipmentCompleted(shipment_id))
            .await;
        self.emit_status_changes(status_changes).await;

        Ok(())
    }

    /// Soft-deletes a shipment; its allocations stop counting and the
    /// affected orders are recomputed
    #[instrument(skip(self))]
    pub async fn delete(&self, shipment_id: Uuid, actor: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let record = found_or(
            shipment::Entity::find_by_id(shipment_id)
                .filter(shipment::Column::DeletedAt.is_null())
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?,
            format!("Shipment {} not found", shipment_id),
        )?;

        let mut active: shipment::ActiveModel = record.into();
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
                    entity_type: EntityType::Shipment,
                    entity_id: shipment_id,
                    actor_id: actor,
                    change_type: ChangeType::Delete,
                    details: "Deleted shipment".to_string(),
                },
            )
            .await?;

        let status_changes = self
            .recompute_orders_of_shipment(&txn, shipment_id, actor)
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ShipmentDeleted(shipment_id))
            .await;
        self.emit_status_changes(status_changes).await;

        Ok(())
    }

    async fn recompute_orders_of_shipment<C: ConnectionTrait>(
        &self,
        db: &C,
        shipment_id: Uuid,
        actor: Uuid,
    ) -> Result<Vec<(Uuid, FulfillmentStatus, FulfillmentStatus)>, ServiceError> {
        let rows = allocation::Entity::find()
            .filter(allocation::Column::ShipmentId.eq(shipment_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let line_ids: Vec<Uuid> = rows.iter().map(|r| r.delivery_order_line_id).collect();

        let mut status_changes = Vec::new();
        for order_id in orders_of_lines(db, &line_ids).await? {
            if let Some((old_status, new_status)) =
                recompute_order_status(db, &self.audit, order_id, actor).await?
            {
                status_changes.push((order_id, old_status, new_status));
            }
        }
        Ok(status_changes)
    }
}
