pub mod audit_logs;
pub mod customers;
pub mod delivery_orders;
pub mod fleets;
pub mod items;
pub mod shipments;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
