// ============================================================================
// Access Domain - Principals and the role-scoped authorization gate
// ============================================================================
//
// The boundary layer decodes a token into a `Principal` and hands it to every
// service call. Services consult `AccessPolicy` at the start of each operation.
//
// ============================================================================

pub mod principal;
pub mod policy;

pub use principal::*;
pub use policy::*;
