// ============================================================================
// Order Domain - lifecycle of a wholesale order
// ============================================================================
//
// - Value objects (OrderStatus, ItemStatus, OrderItem, LineRequest)
// - Errors (OrderError taxonomy)
// - Aggregate (state machine + item cascades)
// - Totals (read-side projection: OrderView with derived totals)
// - Lifecycle service (transactional orchestration)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod totals;
pub mod lifecycle;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use totals::*;
pub use lifecycle::*;
