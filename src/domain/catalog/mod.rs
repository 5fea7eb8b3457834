// ============================================================================
// Catalog Domain - product administration and the public catalog
// ============================================================================
//
// Stock counters are only ever moved by the inventory ledger during order
// placement and cancellation; the catalog sets them directly only when an
// admin edits a product.
//
// ============================================================================

pub mod errors;
pub mod service;

pub use errors::*;
pub use service::*;
