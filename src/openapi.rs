use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dispatch API",
        version = "0.3.0",
        description = r#"
# Dispatch Logistics Back-Office API

A back-office API for managing customers, items, fleet vehicles, delivery
orders, and shipments.

## Fulfillment

Delivery-order lines hold ordered quantities; shipments consume those
quantities in partial batches through allocations. Every line exposes a
derived pending/processing/completed split, and the order status
(`PENDING`, `PROSES`, `SELESAI`) is recomputed after every
allocation-affecting event. Status is never set directly by a client.

## Audit

Every mutation writes audit rows in the same transaction; the trail is
queryable under `/audit-logs`. Mutating requests may carry an `x-actor-id`
header (UUID) for attribution; absent, changes are attributed to the
system actor.

## Error Handling

Errors use a consistent JSON shape with the appropriate HTTP status code:

```json
{
  "error": "Bad Request",
  "message": "Validation error: quantity must be a positive integer",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-06-09T10:30:00.000Z"
}
```
"#,
        contact(name = "Dispatch", email = "support@dispatchhq.dev")
    ),
    paths(
        handlers::customers::list_customers,
        handlers::customers::create_customer,
        handlers::customers::get_customer,
        handlers::customers::update_customer,
        handlers::customers::delete_customer,
        handlers::items::list_items,
        handlers::items::create_item,
        handlers::items::get_item,
        handlers::items::update_item,
        handlers::items::delete_item,
        handlers::fleets::list_fleets,
        handlers::fleets::create_fleet,
        handlers::fleets::get_fleet,
        handlers::fleets::update_fleet,
        handlers::fleets::delete_fleet,
        handlers::delivery_orders::list_delivery_orders,
        handlers::delivery_orders::create_delivery_order,
        handlers::delivery_orders::get_delivery_order,
        handlers::delivery_orders::update_delivery_order,
        handlers::delivery_orders::delete_delivery_order,
        handlers::shipments::list_shipments,
        handlers::shipments::create_shipment,
        handlers::shipments::get_shipment,
        handlers::shipments::update_shipment,
        handlers::shipments::complete_shipment,
        handlers::shipments::delete_shipment,
        handlers::audit_logs::list_audit_logs,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::fulfillment::FulfillmentStatus,
        crate::fulfillment::LineStatus,
        crate::services::audit::EntityType,
        crate::services::audit::ChangeType,
        handlers::customers::CustomerResponse,
        handlers::customers::CreateCustomerRequest,
        handlers::customers::UpdateCustomerRequest,
        handlers::items::ItemResponse,
        handlers::items::CreateItemRequest,
        handlers::items::UpdateItemRequest,
        handlers::fleets::FleetResponse,
        handlers::fleets::CreateFleetRequest,
        handlers::fleets::UpdateFleetRequest,
        handlers::delivery_orders::DeliveryOrderResponse,
        handlers::delivery_orders::DeliveryOrderSummary,
        handlers::delivery_orders::LineStatusResponse,
        handlers::delivery_orders::CustomerRef,
        handlers::delivery_orders::LineRequest,
        handlers::delivery_orders::CreateDeliveryOrderRequest,
        handlers::delivery_orders::UpdateDeliveryOrderRequest,
        handlers::shipments::ShipmentResponse,
        handlers::shipments::ShipmentSummary,
        handlers::shipments::ShipmentCustomerRef,
        handlers::shipments::ShipmentFleetRef,
        handlers::shipments::AllocationResponse,
        handlers::shipments::AllocationRequest,
        handlers::shipments::CreateShipmentRequest,
        handlers::shipments::UpdateShipmentRequest,
        handlers::shipments::CompleteShipmentRequest,
        handlers::audit_logs::AuditLogResponse,
    )),
    tags(
        (name = "customers", description = "Customer management"),
        (name = "items", description = "Item master data"),
        (name = "fleets", description = "Fleet vehicle management"),
        (name = "delivery-orders", description = "Delivery orders with derived fulfillment state"),
        (name = "shipments", description = "Shipments and allocations"),
        (name = "audit-logs", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds_and_covers_core_routes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).expect("document should serialize");
        assert!(json.contains("/api/v1/delivery-orders"));
        assert!(json.contains("/api/v1/shipments"));
        assert!(json.contains("/api/v1/audit-logs"));
    }
}
