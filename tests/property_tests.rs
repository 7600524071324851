//! Property-based tests for the fulfillment reconciler.
//!
//! These use proptest to verify the quantity-partition invariants across a
//! wide range of allocation shapes that example-based unit tests would not
//! reach.

use proptest::prelude::*;
use uuid::Uuid;

use dispatch_api::fulfillment::{
    compute_line_status, derive_order_status, plan_line_edits, AllocationRow, FulfillmentStatus,
    LineEdit, OrderedLine,
};

/// One line plus a set of allocation fractions that never exceed the
/// ordered quantity, with arbitrary completion/deletion flags.
fn line_with_allocations() -> impl Strategy<Value = (OrderedLine, Vec<AllocationRow>)> {
    (1i64..1_000, proptest::collection::vec((1i64..50, any::<bool>(), any::<bool>()), 0..8))
        .prop_map(|(ordered, chunks)| {
            let line = OrderedLine {
                line_id: Uuid::new_v4(),
                item_id: Uuid::new_v4(),
                ordered,
            };

            let mut remaining = ordered;
            let mut allocations = Vec::new();
            for (quantity, completed, deleted) in chunks {
                // Deleted-shipment allocations do not consume ordered quantity
                let take = if deleted {
                    quantity
                } else {
                    let take = quantity.min(remaining);
                    remaining -= take;
                    take
                };
                if take > 0 {
                    allocations.push(AllocationRow {
                        line_id: line.line_id,
                        shipment_id: Uuid::new_v4(),
                        quantity: take,
                        shipment_completed: completed,
                        shipment_deleted: deleted,
                    });
                }
            }

            (line, allocations)
        })
}

fn order_strategy() -> impl Strategy<Value = (Vec<OrderedLine>, Vec<AllocationRow>)> {
    proptest::collection::vec(line_with_allocations(), 1..6).prop_map(|pairs| {
        let mut lines = Vec::new();
        let mut allocations = Vec::new();
        for (line, mut allocs) in pairs {
            lines.push(line);
            allocations.append(&mut allocs);
        }
        (lines, allocations)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// pending + completed + processing == ordered, for every line, always.
    #[test]
    fn quantity_partition_invariant_holds((lines, allocations) in order_strategy()) {
        let statuses = compute_line_status(&lines, &allocations)
            .expect("bounded allocations must reconcile");

        prop_assert_eq!(statuses.len(), lines.len());
        for status in &statuses {
            prop_assert_eq!(
                status.pending + status.completed + status.processing,
                status.ordered
            );
            prop_assert!(status.pending >= 0);
            prop_assert!(status.completed >= 0);
            prop_assert!(status.processing >= 0);
        }
    }

    /// Deleted shipments never influence the outcome.
    #[test]
    fn deleted_allocations_are_invisible((lines, allocations) in order_strategy()) {
        let live_only: Vec<AllocationRow> = allocations
            .iter()
            .filter(|a| !a.shipment_deleted)
            .cloned()
            .collect();

        let with_deleted = compute_line_status(&lines, &allocations).unwrap();
        let without_deleted = compute_line_status(&lines, &live_only).unwrap();
        prop_assert_eq!(with_deleted, without_deleted);
    }

    /// Same input, same output, regardless of how often it runs.
    #[test]
    fn status_derivation_is_pure((lines, allocations) in order_strategy()) {
        let statuses = compute_line_status(&lines, &allocations).unwrap();
        let first = derive_order_status(&statuses);
        let second = derive_order_status(&statuses);
        prop_assert_eq!(first, second);
    }

    /// The derived status is consistent with the quantity totals.
    #[test]
    fn status_matches_quantity_totals((lines, allocations) in order_strategy()) {
        let statuses = compute_line_status(&lines, &allocations).unwrap();
        let status = derive_order_status(&statuses);

        let all_completed = statuses.iter().all(|s| s.completed == s.ordered);
        let all_pending = statuses.iter().all(|s| s.pending == s.ordered);

        match status {
            FulfillmentStatus::Completed => prop_assert!(all_completed),
            FulfillmentStatus::Pending => prop_assert!(all_pending && !all_completed),
            FulfillmentStatus::Processing => {
                prop_assert!(!all_completed && !all_pending);
            }
        }
    }

    /// Submitting the current lines unchanged plans no work.
    #[test]
    fn resubmitting_current_lines_is_a_no_op((lines, allocations) in order_strategy()) {
        let statuses = compute_line_status(&lines, &allocations).unwrap();
        let requested: Vec<LineEdit> = statuses
            .iter()
            .map(|s| LineEdit { item_id: s.item_id, quantity: s.ordered })
            .collect();

        let change_set = plan_line_edits(&statuses, &requested).unwrap();
        prop_assert!(change_set.is_empty());
    }

    /// Growing every line is always a valid edit, and every grown line
    /// appears in the update set.
    #[test]
    fn growing_every_line_is_always_valid(
        (lines, allocations) in order_strategy(),
        growth in 1i64..100
    ) {
        let statuses = compute_line_status(&lines, &allocations).unwrap();
        let requested: Vec<LineEdit> = statuses
            .iter()
            .map(|s| LineEdit { item_id: s.item_id, quantity: s.ordered + growth })
            .collect();

        let change_set = plan_line_edits(&statuses, &requested).unwrap();
        prop_assert_eq!(change_set.updated.len(), statuses.len());
        prop_assert!(change_set.created.is_empty());
        prop_assert!(change_set.removed.is_empty());
    }
}
