use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{ProductFilter, StoreError, StoreTransaction, TransactionalStore};
use crate::domain::access::Role;
use crate::domain::auth::User;
use crate::domain::inventory::Product;
use crate::domain::order::OrderAggregate;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Row locks are per-row async mutexes whose owned guards live in the
// transaction. Writes are staged in the transaction and applied to the shared
// state on commit, while the row locks are still held.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Product(Uuid),
    Order(Uuid),
}

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, OrderAggregate>,
    users: HashMap<Uuid, User>,
    order_sequence: i64,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<RowKey, Arc<Mutex<()>>>>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_product(&self, product: Product) {
        self.shared.state.lock().await.products.insert(product.id, product);
    }

    pub async fn seed_user(&self, user: User) {
        self.shared.state.lock().await.users.insert(user.id, user);
    }

    /// Committed view of a product
    pub async fn product(&self, id: Uuid) -> Option<Product> {
        self.shared.state.lock().await.products.get(&id).cloned()
    }

    /// Committed view of an order
    pub async fn order(&self, id: Uuid) -> Option<OrderAggregate> {
        self.shared.state.lock().await.orders.get(&id).cloned()
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryTransaction {
            shared: self.shared.clone(),
            held: HashMap::new(),
            products: HashMap::new(),
            orders: HashMap::new(),
            users: HashMap::new(),
        })
    }
}

pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, OrderAggregate>,
    users: HashMap<Uuid, User>,
}

impl InMemoryTransaction {
    /// Acquire a row lock for the rest of this transaction. Re-entrant.
    async fn acquire(&mut self, key: RowKey) {
        if self.held.contains_key(&key) {
            return;
        }

        let lock = {
            let mut locks = self.shared.row_locks.lock().await;
            locks.entry(key).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        self.held.insert(key, guard);
    }

    async fn read_product(&self, id: Uuid) -> Option<Product> {
        if let Some(staged) = self.products.get(&id) {
            return Some(staged.clone());
        }
        self.shared.state.lock().await.products.get(&id).cloned()
    }

    async fn read_order(&self, id: Uuid) -> Option<OrderAggregate> {
        if let Some(staged) = self.orders.get(&id) {
            return Some(staged.clone());
        }
        self.shared.state.lock().await.orders.get(&id).cloned()
    }

    async fn all_products(&self) -> Vec<Product> {
        let mut merged = self.shared.state.lock().await.products.clone();
        merged.extend(self.products.iter().map(|(id, p)| (*id, p.clone())));
        merged.into_values().collect()
    }

    async fn all_users(&self) -> Vec<User> {
        let mut merged = self.shared.state.lock().await.users.clone();
        merged.extend(self.users.iter().map(|(id, u)| (*id, u.clone())));
        merged.into_values().collect()
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        self.acquire(RowKey::Product(id)).await;
        Ok(self.read_product(id).await)
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.read_product(id).await)
    }

    async fn find_product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.all_products().await.into_iter().find(|p| p.sku == sku))
    }

    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self
            .all_products()
            .await
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = filter
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(0));

        Ok(products.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let duplicate = self
            .all_products()
            .await
            .iter()
            .any(|p| p.sku == product.sku || p.id == product.id);
        if duplicate {
            return Err(StoreError::Conflict(format!("product sku {}", product.sku)));
        }

        self.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let sku_taken = self
            .all_products()
            .await
            .iter()
            .any(|p| p.sku == product.sku && p.id != product.id);
        if sku_taken {
            return Err(StoreError::Conflict(format!("product sku {}", product.sku)));
        }

        self.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn set_product_stock(&mut self, id: Uuid, stock: i32) -> Result<(), StoreError> {
        let mut product = self
            .read_product(id)
            .await
            .ok_or_else(|| StoreError::Corrupt(format!("stock write for missing product {id}")))?;
        product.stock = stock;
        self.products.insert(id, product);
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        self.acquire(RowKey::Order(id)).await;
        Ok(self.read_order(id).await)
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        Ok(self.read_order(id).await)
    }

    async fn list_orders(&mut self, owner: Option<Uuid>) -> Result<Vec<OrderAggregate>, StoreError> {
        let mut merged = self.shared.state.lock().await.orders.clone();
        merged.extend(self.orders.iter().map(|(id, o)| (*id, o.clone())));

        let mut orders: Vec<OrderAggregate> = merged
            .into_values()
            .filter(|order| owner.map_or(true, |user_id| order.user_id == user_id))
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.readable_id.cmp(&a.readable_id))
        });

        Ok(orders)
    }

    async fn insert_order(&mut self, order: &OrderAggregate) -> Result<i64, StoreError> {
        let readable_id = {
            let mut state = self.shared.state.lock().await;
            if state.orders.contains_key(&order.id) {
                return Err(StoreError::Conflict(format!("order id {}", order.id)));
            }
            state.order_sequence += 1;
            state.order_sequence
        };

        let mut staged = order.clone();
        staged.readable_id = Some(readable_id);
        self.acquire(RowKey::Order(order.id)).await;
        self.orders.insert(order.id, staged);

        Ok(readable_id)
    }

    async fn save_order_status(&mut self, order: &OrderAggregate) -> Result<(), StoreError> {
        let mut stored = self
            .read_order(order.id)
            .await
            .ok_or_else(|| StoreError::Corrupt(format!("status write for missing order {}", order.id)))?;

        stored.status = order.status;
        for item in stored.items.iter_mut() {
            if let Some(updated) = order.item(item.id) {
                item.status = updated.status;
            }
        }

        self.orders.insert(order.id, stored);
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        if let Some(staged) = self.users.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.shared.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .all_users()
            .await
            .into_iter()
            .find(|u| u.email.as_deref() == Some(email)))
    }

    async fn find_user_by_phone(&mut self, phone: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .all_users()
            .await
            .into_iter()
            .find(|u| u.phone.as_deref() == Some(phone)))
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        let users = self.all_users().await;
        let clash = users.iter().any(|u| {
            u.id == user.id
                || (user.email.is_some() && u.email == user.email)
                || (user.phone.is_some() && u.phone == user.phone)
        });
        if clash {
            return Err(StoreError::Conflict(format!("user {}", user.id)));
        }

        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn count_users(&mut self, role: Role) -> Result<i64, StoreError> {
        let count = self.all_users().await.iter().filter(|u| u.role == role).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn commit(self) -> Result<(), StoreError> {
        let Self {
            shared,
            held,
            products,
            orders,
            users,
        } = self;

        {
            let mut state = shared.state.lock().await;
            // Another transaction may have committed a clashing row since these were staged
            check_unique(&state, &products, &users)?;
            state.products.extend(products);
            state.orders.extend(orders);
            state.users.extend(users);
        }

        // Row locks are released only after the writes are visible
        drop(held);
        Ok(())
    }
}

/// SKU, email and phone uniqueness of staged rows against committed state.
/// Staged rows replacing a committed row with the same id are not clashes.
fn check_unique(
    state: &State,
    products: &HashMap<Uuid, Product>,
    users: &HashMap<Uuid, User>,
) -> Result<(), StoreError> {
    for product in products.values() {
        let taken = state
            .products
            .values()
            .any(|p| p.id != product.id && p.sku == product.sku);
        if taken {
            return Err(StoreError::Conflict(format!("product sku {}", product.sku)));
        }
    }

    for user in users.values() {
        let taken = state.users.values().any(|u| {
            u.id != user.id
                && ((user.email.is_some() && u.email == user.email)
                    || (user.phone.is_some() && u.phone == user.phone))
        });
        if taken {
            return Err(StoreError::Conflict(format!("user {}", user.id)));
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::product;
    use std::time::Duration;

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 100, 10);

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&p).await.unwrap();
        assert!(tx.find_product(p.id).await.unwrap().is_some());
        assert!(store.product(p.id).await.is_none());

        tx.commit().await.unwrap();
        assert!(store.product(p.id).await.is_some());
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction_until_commit() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 100, 10);
        store.seed_product(p.clone()).await;

        let mut first = store.begin().await.unwrap();
        first.lock_product(p.id).await.unwrap();
        first.set_product_stock(p.id, 4).await.unwrap();

        let second_store = store.clone();
        let waiter = tokio::spawn(async move {
            let mut second = second_store.begin().await.unwrap();
            second.lock_product(p.id).await.unwrap().unwrap().stock
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.commit().await.unwrap();
        assert_eq!(waiter.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_lock_is_reentrant_within_transaction() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 100, 10);
        store.seed_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(p.id).await.unwrap();
        tx.set_product_stock(p.id, 7).await.unwrap();
        let again = tx.lock_product(p.id).await.unwrap().unwrap();
        assert_eq!(again.stock, 7);
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let store = InMemoryStore::new();
        store.seed_product(product("SKU-1", 100, 10)).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_product(&product("SKU-1", 200, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_overlapping_inserts_of_same_sku_conflict_on_commit() {
        let store = InMemoryStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_product(&product("DUP", 100, 1)).await.unwrap();
        second.insert_product(&product("DUP", 200, 2)).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let mut tx = store.begin().await.unwrap();
        let all = tx.list_products(&ProductFilter::all()).await.unwrap();
        assert_eq!(all.iter().filter(|p| p.sku == "DUP").count(), 1);
        assert_eq!(all[0].price, rust_decimal::Decimal::new(100, 2));
    }

    #[tokio::test]
    async fn test_overlapping_registrations_of_same_phone_conflict_on_commit() {
        let store = InMemoryStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_user(&User::customer_from_phone("+919800000002")).await.unwrap();
        second.insert_user(&User::customer_from_phone("+919800000002")).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(StoreError::Conflict(_))));

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.count_users(Role::Customer).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_commit_applies_nothing() {
        let store = InMemoryStore::new();
        store.seed_product(product("TAKEN", 100, 1)).await;

        let mut tx = store.begin().await.unwrap();
        let fresh = product("FRESH", 100, 1);
        let mut clash = product("TAKEN-LATER", 100, 1);
        tx.insert_product(&fresh).await.unwrap();
        tx.insert_product(&clash).await.unwrap();

        // Committed by someone else after staging
        clash.id = uuid::Uuid::new_v4();
        store.seed_product(clash).await;

        assert!(matches!(tx.commit().await, Err(StoreError::Conflict(_))));
        assert!(store.product(fresh.id).await.is_none());
    }

    #[tokio::test]
    async fn test_list_products_pages_and_filters() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            let mut p = product(&format!("SKU-{i}"), 100, 10);
            p.created_at = p.created_at + chrono::Duration::seconds(i);
            if i == 2 {
                p.status = crate::domain::inventory::ProductStatus::Inactive;
            }
            store.seed_product(p).await;
        }

        let mut tx = store.begin().await.unwrap();
        let active = tx.list_products(&ProductFilter::active()).await.unwrap();
        assert_eq!(active.len(), 4);

        let page = tx.list_products(&ProductFilter::all().page(1, 2)).await.unwrap();
        let skus: Vec<_> = page.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["SKU-1", "SKU-2"]);
    }
}
