// ============================================================================
// Inventory Domain - products and their stock counters
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod ledger;

pub use value_objects::*;
pub use errors::*;
pub use ledger::*;
