// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory:
// - access:    principals and the authorization gate
// - inventory: products and the stock ledger
// - order:     aggregate state machine and the lifecycle service
// - catalog:   product administration
// - auth:      admin and OTP login
// - dashboard: admin KPIs
//
// Services take an `Arc<S: TransactionalStore>` and never talk to a
// concrete database.
//
// ============================================================================

pub mod access;
pub mod inventory;
pub mod order;
pub mod catalog;
pub mod auth;
pub mod dashboard;
