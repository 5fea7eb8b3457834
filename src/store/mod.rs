// ============================================================================
// Transactional Store - persistence seam for the lifecycle engine
// ============================================================================
//
// A transaction is opened per service operation. `lock_*` reads take an
// exclusive row lock held until the transaction ends; plain reads do not.
// Dropping a transaction without calling `commit` rolls everything back.
//
// Implementations:
// - postgres: sqlx / PostgreSQL, `SELECT ... FOR UPDATE`
// - memory:   per-row async mutexes + staged writes, for tests and demos
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PgStore, PgTransaction};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::access::Role;
use crate::domain::auth::User;
use crate::domain::inventory::{Product, ProductStatus};
use crate::domain::order::OrderAggregate;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Stored row could not be decoded: {0}")]
    Corrupt(String),
}

/// Product listing filter. A `None` limit returns every row after `offset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl ProductFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self {
            status: Some(ProductStatus::Active),
            ..Self::default()
        }
    }

    pub fn page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset.max(0);
        self.limit = Some(limit.max(0));
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.status.map_or(true, |status| product.status == status)
    }
}

#[async_trait]
pub trait TransactionalStore: Send + Sync + 'static {
    type Tx: StoreTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send + Sized {
    // Products
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn find_product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, StoreError>;
    /// Ordered by creation time, oldest first
    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn set_product_stock(&mut self, id: Uuid, stock: i32) -> Result<(), StoreError>;

    // Orders, always loaded together with their items and product names
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError>;
    async fn find_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError>;
    /// Newest first; `owner` restricts the listing to one user's orders
    async fn list_orders(&mut self, owner: Option<Uuid>) -> Result<Vec<OrderAggregate>, StoreError>;
    /// Returns the readable order number assigned by the store
    async fn insert_order(&mut self, order: &OrderAggregate) -> Result<i64, StoreError>;
    /// Persists the order status and every item status
    async fn save_order_status(&mut self, order: &OrderAggregate) -> Result<(), StoreError>;

    // Users
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_phone(&mut self, phone: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn count_users(&mut self, role: Role) -> Result<i64, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
