use uuid::Uuid;

use crate::domain::access::AccessDenied;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(Uuid),

    #[error("Product with SKU {0} already exists")]
    DuplicateSku(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Forbidden(#[from] AccessDenied),

    #[error(transparent)]
    Store(StoreError),
}

// A unique violation that slipped past the pre-check is still a duplicate SKU
impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => CatalogError::DuplicateSku(detail),
            other => CatalogError::Store(other),
        }
    }
}
