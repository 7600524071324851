//! Fulfillment reconciliation for delivery orders.
//!
//! Delivery-order lines hold ordered quantities; shipments consume those
//! quantities in partial batches through allocations. This module derives
//! the per-line pending/processing/completed split and the aggregate order
//! status from allocation rows, and plans line edits against quantities
//! already allocated. Everything here is pure and store-independent: the
//! services fetch rows, call in, and persist the result inside their own
//! transaction.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Aggregate delivery-order status, stored and serialized by wire value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum FulfillmentStatus {
    /// No quantity on any line has been allocated yet.
    #[serde(rename = "PENDING")]
    #[strum(serialize = "PENDING")]
    Pending,
    /// Some quantity is allocated or completed, but not everything is
    /// completed. Completion dominates pending: a single touched line
    /// among otherwise untouched lines is enough.
    #[serde(rename = "PROSES")]
    #[strum(serialize = "PROSES")]
    Processing,
    /// Every line is fully covered by completed shipments.
    #[serde(rename = "SELESAI")]
    #[strum(serialize = "SELESAI")]
    Completed,
}

/// An ordered line as persisted on the delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedLine {
    pub line_id: Uuid,
    pub item_id: Uuid,
    pub ordered: i64,
}

/// One allocation row joined with its owning shipment's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRow {
    pub line_id: Uuid,
    pub shipment_id: Uuid,
    pub quantity: i64,
    pub shipment_completed: bool,
    pub shipment_deleted: bool,
}

/// Derived three-way split of a line's ordered quantity. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LineStatus {
    pub line_id: Uuid,
    pub item_id: Uuid,
    pub ordered: i64,
    pub pending: i64,
    pub completed: i64,
    pub processing: i64,
}

impl LineStatus {
    /// Total quantity currently held by non-deleted shipments.
    pub fn allocated(&self) -> i64 {
        self.completed + self.processing
    }
}

/// A requested line in a create/update payload, keyed by item identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEdit {
    pub item_id: Uuid,
    pub quantity: i64,
}

/// Disjoint change sets produced by [`plan_line_edits`]. The caller
/// persists all three in one transaction and recomputes order status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineChangeSet {
    pub created: Vec<LineEdit>,
    pub removed: Vec<LineStatus>,
    pub updated: Vec<LineEdit>,
}

impl LineChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FulfillmentError {
    /// An allocation references a line that does not belong to the order.
    /// Upstream corruption, not user input.
    #[error("allocation references unknown delivery-order line {line_id}")]
    UnknownLine { line_id: Uuid },

    /// Allocated quantity exceeds the ordered quantity for a line.
    /// Upstream corruption, not user input.
    #[error("line {line_id} is over-allocated: pending quantity would be {pending}")]
    NegativePending { line_id: Uuid, pending: i64 },

    #[error("cannot remove line with existing allocations (item {item_id})")]
    RemovedLineAllocated { item_id: Uuid },

    #[error(
        "new quantity below allocated quantity (item {item_id}: allocated {allocated}, requested {requested})"
    )]
    QuantityBelowAllocated {
        item_id: Uuid,
        allocated: i64,
        requested: i64,
    },
}

impl From<FulfillmentError> for crate::errors::ServiceError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::UnknownLine { .. } | FulfillmentError::NegativePending { .. } => {
                crate::errors::ServiceError::DataIntegrity(err.to_string())
            }
            FulfillmentError::RemovedLineAllocated { .. }
            | FulfillmentError::QuantityBelowAllocated { .. } => {
                crate::errors::ServiceError::ValidationError(err.to_string())
            }
        }
    }
}

/// Computes the pending/completed/processing split for every line of an
/// order from its allocation rows.
///
/// Allocations whose owning shipment is soft-deleted do not count.
/// Guarantees `pending + completed + processing == ordered` per line; an
/// input that cannot satisfy that (negative pending, allocation against a
/// line the order does not have) is refused as an integrity failure, never
/// clamped.
pub fn compute_line_status(
    lines: &[OrderedLine],
    allocations: &[AllocationRow],
) -> Result<Vec<LineStatus>, FulfillmentError> {
    let known: HashSet<Uuid> = lines.iter().map(|l| l.line_id).collect();

    // (completed, processing) tallies per line
    let mut tallies: HashMap<Uuid, (i64, i64)> = HashMap::new();

    for alloc in allocations {
        if alloc.shipment_deleted {
            continue;
        }
        if !known.contains(&alloc.line_id) {
            return Err(FulfillmentError::UnknownLine {
                line_id: alloc.line_id,
            });
        }

        let entry = tallies.entry(alloc.line_id).or_insert((0, 0));
        if alloc.shipment_completed {
            entry.0 += alloc.quantity;
        } else {
            entry.1 += alloc.quantity;
        }
    }

    let mut statuses = Vec::with_capacity(lines.len());
    for line in lines {
        let (completed, processing) = tallies.get(&line.line_id).copied().unwrap_or((0, 0));
        let pending = line.ordered - completed - processing;
        if pending < 0 {
            return Err(FulfillmentError::NegativePending {
                line_id: line.line_id,
                pending,
            });
        }

        statuses.push(LineStatus {
            line_id: line.line_id,
            item_id: line.item_id,
            ordered: line.ordered,
            pending,
            completed,
            processing,
        });
    }

    Ok(statuses)
}

/// Derives the aggregate order status from its line statuses.
///
/// `SELESAI` iff every line is fully completed; else `PENDING` iff every
/// line is fully pending; anything else is `PROSES`.
pub fn derive_order_status(lines: &[LineStatus]) -> FulfillmentStatus {
    if lines.is_empty() {
        // An order with no lines has nothing fulfilled.
        return FulfillmentStatus::Pending;
    }

    if lines.iter().all(|l| l.completed == l.ordered) {
        return FulfillmentStatus::Completed;
    }

    if lines.iter().all(|l| l.pending == l.ordered) {
        return FulfillmentStatus::Pending;
    }

    FulfillmentStatus::Processing
}

/// Diffs the requested lines of an order edit against the current line
/// statuses, keyed by item identity.
///
/// Fails when a removed line still has allocated quantity, or when a
/// changed line's new quantity drops below what is already allocated.
/// Pure: the caller persists the change set transactionally. Submitting
/// the current lines unchanged yields an empty change set.
pub fn plan_line_edits(
    current: &[LineStatus],
    requested: &[LineEdit],
) -> Result<LineChangeSet, FulfillmentError> {
    let current_by_item: HashMap<Uuid, &LineStatus> =
        current.iter().map(|l| (l.item_id, l)).collect();
    let requested_items: HashSet<Uuid> = requested.iter().map(|e| e.item_id).collect();

    let mut change_set = LineChangeSet::default();

    for edit in requested {
        match current_by_item.get(&edit.item_id) {
            None => change_set.created.push(*edit),
            Some(existing) if existing.ordered != edit.quantity => {
                if existing.allocated() > edit.quantity {
                    return Err(FulfillmentError::QuantityBelowAllocated {
                        item_id: edit.item_id,
                        allocated: existing.allocated(),
                        requested: edit.quantity,
                    });
                }
                change_set.updated.push(*edit);
            }
            Some(_) => {}
        }
    }

    for existing in current {
        if !requested_items.contains(&existing.item_id) {
            if existing.completed > 0 || existing.processing > 0 {
                return Err(FulfillmentError::RemovedLineAllocated {
                    item_id: existing.item_id,
                });
            }
            change_set.removed.push(existing.clone());
        }
    }

    Ok(change_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    fn line(ordered: i64) -> OrderedLine {
        OrderedLine {
            line_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            ordered,
        }
    }

    fn alloc(line: &OrderedLine, quantity: i64, completed: bool, deleted: bool) -> AllocationRow {
        AllocationRow {
            line_id: line.line_id,
            shipment_id: Uuid::new_v4(),
            quantity,
            shipment_completed: completed,
            shipment_deleted: deleted,
        }
    }

    fn status(ordered: i64, pending: i64, completed: i64, processing: i64) -> LineStatus {
        LineStatus {
            line_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            ordered,
            pending,
            completed,
            processing,
        }
    }

    #[test]
    fn untouched_line_is_fully_pending() {
        let lines = vec![line(10)];
        let statuses = compute_line_status(&lines, &[]).unwrap();

        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].pending, 10);
        assert_eq!(statuses[0].completed, 0);
        assert_eq!(statuses[0].processing, 0);
        assert_eq!(derive_order_status(&statuses), FulfillmentStatus::Pending);
    }

    #[test]
    fn partial_completed_allocation_splits_quantities() {
        // One line ordered=10, one allocation of 6 on a completed shipment
        let lines = vec![line(10)];
        let allocations = vec![alloc(&lines[0], 6, true, false)];

        let statuses = compute_line_status(&lines, &allocations).unwrap();
        assert_eq!(statuses[0].completed, 6);
        assert_eq!(statuses[0].pending, 4);
        assert_eq!(statuses[0].processing, 0);
        assert_eq!(
            derive_order_status(&statuses),
            FulfillmentStatus::Processing
        );
    }

    #[test]
    fn sum_invariant_holds_across_mixed_allocations() {
        let lines = vec![line(20), line(7)];
        let allocations = vec![
            alloc(&lines[0], 5, true, false),
            alloc(&lines[0], 3, false, false),
            alloc(&lines[0], 2, true, false),
            alloc(&lines[1], 7, false, false),
        ];

        let statuses = compute_line_status(&lines, &allocations).unwrap();
        for s in &statuses {
            assert_eq!(s.pending + s.completed + s.processing, s.ordered);
        }
        assert_eq!(statuses[0].completed, 7);
        assert_eq!(statuses[0].processing, 3);
        assert_eq!(statuses[0].pending, 10);
        assert_eq!(statuses[1].pending, 0);
    }

    #[test]
    fn deleted_shipment_allocations_do_not_count() {
        let lines = vec![line(10)];
        let allocations = vec![
            alloc(&lines[0], 6, true, true),
            alloc(&lines[0], 4, false, true),
        ];

        let statuses = compute_line_status(&lines, &allocations).unwrap();
        assert_eq!(statuses[0].pending, 10);
        assert_eq!(statuses[0].completed, 0);
        assert_eq!(statuses[0].processing, 0);
        assert_eq!(derive_order_status(&statuses), FulfillmentStatus::Pending);
    }

    #[test]
    fn over_allocation_is_an_integrity_failure_not_clamped() {
        let lines = vec![line(5)];
        let allocations = vec![
            alloc(&lines[0], 4, true, false),
            alloc(&lines[0], 3, false, false),
        ];

        let err = compute_line_status(&lines, &allocations).unwrap_err();
        assert_matches!(err, FulfillmentError::NegativePending { pending: -2, .. });
    }

    #[test]
    fn allocation_against_unknown_line_is_an_integrity_failure() {
        let lines = vec![line(5)];
        let stray = AllocationRow {
            line_id: Uuid::new_v4(),
            shipment_id: Uuid::new_v4(),
            quantity: 1,
            shipment_completed: false,
            shipment_deleted: false,
        };

        let err = compute_line_status(&lines, &[stray]).unwrap_err();
        assert_matches!(err, FulfillmentError::UnknownLine { .. });
    }

    #[test]
    fn integrity_failures_map_to_data_integrity_service_error() {
        let err: crate::errors::ServiceError = FulfillmentError::NegativePending {
            line_id: Uuid::new_v4(),
            pending: -1,
        }
        .into();
        assert_matches!(err, crate::errors::ServiceError::DataIntegrity(_));

        let err: crate::errors::ServiceError = FulfillmentError::RemovedLineAllocated {
            item_id: Uuid::new_v4(),
        }
        .into();
        assert_matches!(err, crate::errors::ServiceError::ValidationError(_));
    }

    #[test]
    fn fully_completed_order_is_selesai() {
        let statuses = vec![status(10, 0, 10, 0), status(3, 0, 3, 0)];
        assert_eq!(derive_order_status(&statuses), FulfillmentStatus::Completed);
    }

    #[test]
    fn fully_processing_order_is_proses() {
        let statuses = vec![status(10, 0, 0, 10)];
        assert_eq!(
            derive_order_status(&statuses),
            FulfillmentStatus::Processing
        );
    }

    #[test]
    fn completion_dominates_pending_in_partial_states() {
        // A single fully-completed line among otherwise-pending lines
        let statuses = vec![status(4, 0, 4, 0), status(9, 9, 0, 0), status(2, 2, 0, 0)];
        assert_eq!(
            derive_order_status(&statuses),
            FulfillmentStatus::Processing
        );
    }

    #[test]
    fn empty_order_is_pending() {
        assert_eq!(derive_order_status(&[]), FulfillmentStatus::Pending);
    }

    #[test]
    fn derive_order_status_is_pure() {
        let statuses = vec![status(10, 4, 6, 0), status(5, 5, 0, 0)];
        let first = derive_order_status(&statuses);
        let second = derive_order_status(&statuses);
        assert_eq!(first, second);
    }

    #[test_case("PENDING", FulfillmentStatus::Pending)]
    #[test_case("PROSES", FulfillmentStatus::Processing)]
    #[test_case("SELESAI", FulfillmentStatus::Completed)]
    fn status_round_trips_through_wire_value(wire: &str, expected: FulfillmentStatus) {
        assert_eq!(wire.parse::<FulfillmentStatus>().unwrap(), expected);
        assert_eq!(expected.to_string(), wire);
    }

    #[test]
    fn plan_line_edits_is_idempotent_on_unchanged_input() {
        let current = vec![status(10, 4, 6, 0), status(5, 5, 0, 0)];
        let requested: Vec<LineEdit> = current
            .iter()
            .map(|l| LineEdit {
                item_id: l.item_id,
                quantity: l.ordered,
            })
            .collect();

        let change_set = plan_line_edits(&current, &requested).unwrap();
        assert!(change_set.is_empty());
    }

    #[test]
    fn plan_line_edits_partitions_created_removed_updated() {
        let keep = status(10, 10, 0, 0);
        let grow = status(5, 1, 2, 2);
        let drop = status(3, 3, 0, 0);
        let current = vec![keep.clone(), grow.clone(), drop.clone()];

        let new_item = Uuid::new_v4();
        let requested = vec![
            LineEdit {
                item_id: keep.item_id,
                quantity: 10,
            },
            LineEdit {
                item_id: grow.item_id,
                quantity: 8,
            },
            LineEdit {
                item_id: new_item,
                quantity: 2,
            },
        ];

        let change_set = plan_line_edits(&current, &requested).unwrap();
        assert_eq!(
            change_set.created,
            vec![LineEdit {
                item_id: new_item,
                quantity: 2
            }]
        );
        assert_eq!(
            change_set.updated,
            vec![LineEdit {
                item_id: grow.item_id,
                quantity: 8
            }]
        );
        assert_eq!(change_set.removed.len(), 1);
        assert_eq!(change_set.removed[0].item_id, drop.item_id);
    }

    #[test]
    fn removing_an_allocated_line_fails() {
        let allocated = status(5, 3, 2, 0);
        let err = plan_line_edits(&[allocated], &[]).unwrap_err();
        assert_matches!(err, FulfillmentError::RemovedLineAllocated { .. });
    }

    #[test]
    fn removing_an_untouched_line_succeeds() {
        let untouched = status(5, 5, 0, 0);
        let change_set = plan_line_edits(&[untouched.clone()], &[]).unwrap();
        assert_eq!(change_set.removed, vec![untouched]);
    }

    #[test]
    fn shrinking_below_allocated_quantity_fails() {
        // ordered=5, completed=2; requesting 1 drops below what shipments hold
        let current = status(5, 3, 2, 0);
        let requested = vec![LineEdit {
            item_id: current.item_id,
            quantity: 1,
        }];

        let err = plan_line_edits(&[current], &requested).unwrap_err();
        assert_matches!(
            err,
            FulfillmentError::QuantityBelowAllocated {
                allocated: 2,
                requested: 1,
                ..
            }
        );
    }

    #[test]
    fn shrinking_to_exactly_allocated_quantity_is_allowed() {
        let current = status(5, 1, 2, 2);
        let requested = vec![LineEdit {
            item_id: current.item_id,
            quantity: 4,
        }];

        let change_set = plan_line_edits(&[current], &requested).unwrap();
        assert_eq!(change_set.updated.len(), 1);
        assert_eq!(change_set.updated[0].quantity, 4);
    }
}
