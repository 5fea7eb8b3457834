// ============================================================================
// Auth Domain - admin password login and customer phone OTP login
// ============================================================================
//
// Password hashing and token encoding live behind the `CredentialVerifier`
// and `PrincipalIssuer` seams; this module only decides who gets a token.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod service;

pub use value_objects::*;
pub use errors::*;
pub use service::*;
