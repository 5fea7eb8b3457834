use uuid::Uuid;

use super::errors::InventoryError;
use super::value_objects::Product;
use crate::store::StoreTransaction;

// ============================================================================
// Inventory Ledger - stock reservation and restocking
// ============================================================================
//
// Both operations run inside the caller's transaction and take the product
// row lock first, so concurrent reservations against one product serialize
// and always see the stock left by the previous holder.
//
// ============================================================================

pub struct InventoryLedger;

impl InventoryLedger {
    /// Check-and-decrement. Returns the product as it stands after the
    /// reservation, so callers can snapshot its price and name.
    pub async fn reserve_stock<T: StoreTransaction>(
        tx: &mut T,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Product, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let mut product = tx
            .lock_product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;

        if product.stock < quantity {
            tracing::debug!(
                product_id = %product_id,
                requested = quantity,
                available = product.stock,
                "Reservation rejected"
            );
            return Err(InventoryError::InsufficientStock {
                product_id,
                product_name: product.name,
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        tx.set_product_stock(product_id, product.stock).await?;

        tracing::debug!(
            product_id = %product_id,
            quantity = quantity,
            remaining = product.stock,
            "Stock reserved"
        );

        Ok(product)
    }

    /// Return previously reserved quantity to the product. Unbounded above.
    pub async fn restock<T: StoreTransaction>(
        tx: &mut T,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Product, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let mut product = tx
            .lock_product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;

        product.stock = product.stock.saturating_add(quantity);
        tx.set_product_stock(product_id, product.stock).await?;

        tracing::debug!(
            product_id = %product_id,
            quantity = quantity,
            stock = product.stock,
            "Stock returned"
        );

        Ok(product)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, TransactionalStore};
    use crate::test_support::product;

    #[tokio::test]
    async fn test_reserve_decrements_on_commit() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1000, 5);
        store.seed_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let reserved = InventoryLedger::reserve_stock(&mut tx, p.id, 2).await.unwrap();
        assert_eq!(reserved.stock, 3);
        tx.commit().await.unwrap();

        assert_eq!(store.product(p.id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_reserve_rejects_overdraw() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1000, 1);
        store.seed_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::reserve_stock(&mut tx, p.id, 2).await.unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { requested: 2, available: 1, .. }));
        drop(tx);

        assert_eq!(store.product(p.id).await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::reserve_stock(&mut tx, Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_reserve_rejects_non_positive_quantity() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1000, 5);
        store.seed_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::reserve_stock(&mut tx, p.id, 0).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidQuantity(0)));
    }

    #[tokio::test]
    async fn test_rollback_discards_reservation() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1000, 5);
        store.seed_product(p.clone()).await;

        {
            let mut tx = store.begin().await.unwrap();
            InventoryLedger::reserve_stock(&mut tx, p.id, 4).await.unwrap();
            // dropped without commit
        }

        assert_eq!(store.product(p.id).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_restock_has_no_upper_bound() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1000, i32::MAX - 10);
        store.seed_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let restocked = InventoryLedger::restock(&mut tx, p.id, 10).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(restocked.stock, i32::MAX);
    }
}
