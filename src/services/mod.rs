// Core services
pub mod audit;
pub mod customers;
pub mod delivery_orders;
pub mod fleets;
pub mod items;
pub mod shipments;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub customers: Arc<customers::CustomerService>,
    pub items: Arc<items::ItemService>,
    pub fleets: Arc<fleets::FleetService>,
    pub delivery_orders: Arc<delivery_orders::DeliveryOrderService>,
    pub shipments: Arc<shipments::ShipmentService>,
    pub audit_logs: Arc<audit::AuditLogService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        let audit_logs = Arc::new(audit::AuditLogService::new(db.clone()));

        let customers = Arc::new(customers::CustomerService::new(
            db.clone(),
            event_sender.clone(),
            audit_logs.clone(),
        ));
        let items = Arc::new(items::ItemService::new(
            db.clone(),
            event_sender.clone(),
            audit_logs.clone(),
        ));
        let fleets = Arc::new(fleets::FleetService::new(
            db.clone(),
            event_sender.clone(),
            audit_logs.clone(),
        ));
        let delivery_orders = Arc::new(delivery_orders::DeliveryOrderService::new(
            db.clone(),
            event_sender.clone(),
            audit_logs.clone(),
        ));
        let shipments = Arc::new(shipments::ShipmentService::new(
            db,
            event_sender,
            audit_logs.clone(),
        ));

        Self {
            customers,
            items,
            fleets,
            delivery_orders,
            shipments,
            audit_logs,
        }
    }
}

/// Maps an optional lookup result to the entity or a NotFound with the
/// caller's message.
pub(crate) fn found_or<T>(found: Option<T>, message: impl Into<String>) -> Result<T, ServiceError> {
    found.ok_or_else(|| ServiceError::NotFound(message.into()))
}

/// Resolves an inclusive date filter into a half-open UTC instant range.
/// Both bounds are required together and must be ordered.
pub(crate) fn date_range_bounds(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ServiceError> {
    match (start_date, end_date) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            if start > end {
                return Err(ServiceError::ValidationError(
                    "start date must not be later than end date".to_string(),
                ));
            }
            let from = start.and_time(NaiveTime::MIN).and_utc();
            let to = end.and_time(NaiveTime::MIN).and_utc() + Duration::days(1);
            Ok(Some((from, to)))
        }
        _ => Err(ServiceError::ValidationError(
            "start date and end date are both required".to_string(),
        )),
    }
}

/// Clamps user-supplied pagination to sane bounds.
pub(crate) fn clamp_paging(page: u64, per_page: u64) -> (u64, u64) {
    (page.max(1), per_page.clamp(1, 100))
}
