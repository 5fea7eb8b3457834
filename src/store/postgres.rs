use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use super::{ProductFilter, StoreError, StoreTransaction, TransactionalStore};
use crate::domain::access::Role;
use crate::domain::auth::User;
use crate::domain::inventory::Product;
use crate::domain::order::{OrderAggregate, OrderError, OrderItem};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Row locks are `SELECT ... FOR UPDATE`, held by the sqlx transaction until
// commit or drop (which rolls back). Orders are read with their items and
// product names in one joined query.
//
// ============================================================================

const PRODUCT_COLUMNS: &str =
    "id, sku, name, description, category, price, stock, status, created_at";

const ORDER_SELECT: &str = "
    SELECT o.id AS order_id, o.readable_id, o.user_id, o.total, o.status AS order_status,
           o.created_at, i.id AS item_id, i.product_id, p.name AS product_name,
           i.quantity, i.price, i.status AS item_status
    FROM orders o
    JOIN order_items i ON i.order_id = o.id
    JOIN products p ON p.id = i.product_id";

const USER_COLUMNS: &str = "id, email, phone, name, password_hash, role, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(PgTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price: Decimal,
    stock: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            stock: row.stock,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    order_id: Uuid,
    readable_id: i64,
    user_id: Uuid,
    total: Decimal,
    order_status: String,
    created_at: DateTime<Utc>,
    item_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price: Decimal,
    item_status: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: Option<String>,
    phone: Option<String>,
    name: String,
    password_hash: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            phone: row.phone,
            name: row.name,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
        })
    }
}

/// Fold joined order/item rows (grouped by order, items in position order)
/// back into aggregates, preserving the row order of the orders.
fn assemble_orders(rows: Vec<OrderLineRow>) -> Result<Vec<OrderAggregate>, StoreError> {
    let mut orders: Vec<OrderAggregate> = Vec::new();

    for row in rows {
        let item = OrderItem {
            id: row.item_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price: row.price,
            status: row
                .item_status
                .parse()
                .map_err(|e: OrderError| StoreError::Corrupt(e.to_string()))?,
        };

        match orders.last_mut() {
            Some(current) if current.id == row.order_id => current.items.push(item),
            _ => orders.push(OrderAggregate {
                id: row.order_id,
                readable_id: Some(row.readable_id),
                user_id: row.user_id,
                total: row.total,
                status: row
                    .order_status
                    .parse()
                    .map_err(|e: OrderError| StoreError::Corrupt(e.to_string()))?,
                created_at: row.created_at,
                items: vec![item],
            }),
        }
    }

    Ok(orders)
}

fn map_write_error(err: sqlx::Error, what: String) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(what);
        }
    }
    StoreError::Database(err)
}

// ============================================================================
// Transaction Operations
// ============================================================================

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn find_product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(sku)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn list_products(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY created_at, id
             OFFSET $2 LIMIT $3"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.offset)
            .bind(filter.limit)
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (id, sku, name, description, category, price, stock, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.status.as_str())
        .bind(product.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, format!("product sku {}", product.sku)))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE products
             SET sku = $2, name = $3, description = $4, category = $5, price = $6, stock = $7, status = $8
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, format!("product sku {}", product.sku)))?;
        Ok(())
    }

    async fn set_product_stock(&mut self, id: Uuid, stock: i32) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id)
            .bind(stock)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        let sql = format!("{ORDER_SELECT} WHERE o.id = $1 ORDER BY i.position FOR UPDATE OF o, i");
        let rows = sqlx::query_as::<_, OrderLineRow>(&sql)
            .bind(id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(assemble_orders(rows)?.into_iter().next())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        let sql = format!("{ORDER_SELECT} WHERE o.id = $1 ORDER BY i.position");
        let rows = sqlx::query_as::<_, OrderLineRow>(&sql)
            .bind(id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(assemble_orders(rows)?.into_iter().next())
    }

    async fn list_orders(&mut self, owner: Option<Uuid>) -> Result<Vec<OrderAggregate>, StoreError> {
        let sql = format!(
            "{ORDER_SELECT}
             WHERE ($1::uuid IS NULL OR o.user_id = $1)
             ORDER BY o.created_at DESC, o.readable_id DESC, i.position"
        );
        let rows = sqlx::query_as::<_, OrderLineRow>(&sql)
            .bind(owner)
            .fetch_all(&mut *self.tx)
            .await?;
        assemble_orders(rows)
    }

    async fn insert_order(&mut self, order: &OrderAggregate) -> Result<i64, StoreError> {
        let readable_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (id, user_id, total, status, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING readable_id",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, format!("order id {}", order.id)))?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Corrupt(format!("order {} has too many items", order.id)))?;

            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, position, quantity, price, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(position)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.status.as_str())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(readable_id)
    }

    async fn save_order_status(&mut self, order: &OrderAggregate) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order.id)
            .bind(order.status.as_str())
            .execute(&mut *self.tx)
            .await?;

        for item in &order.items {
            sqlx::query("UPDATE order_items SET status = $2 WHERE id = $1 AND order_id = $3")
                .bind(item.id)
                .bind(item.status.as_str())
                .bind(order.id)
                .execute(&mut *self.tx)
                .await?;
        }

        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_phone(&mut self, phone: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(phone)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, phone, name, password_hash, role, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, format!("user {}", user.id)))?;
        Ok(())
    }

    async fn count_users(&mut self, role: Role) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries against a live database are exercised by running the service with
// DATABASE_URL set; here we cover the row assembly that does not need one.
//
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{ItemStatus, OrderStatus};

    fn line(order_id: Uuid, readable_id: i64, item: &str) -> OrderLineRow {
        OrderLineRow {
            order_id,
            readable_id,
            user_id: Uuid::nil(),
            total: Decimal::new(2000, 2),
            order_status: "processing".to_string(),
            created_at: Utc::now(),
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: item.to_string(),
            quantity: 1,
            price: Decimal::new(1000, 2),
            item_status: "active".to_string(),
        }
    }

    #[test]
    fn test_assemble_groups_consecutive_rows() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = vec![
            line(first, 2, "Flour"),
            line(first, 2, "Salt"),
            line(second, 1, "Lentils"),
        ];

        let orders = assemble_orders(rows).unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, first);
        assert_eq!(orders[0].status, OrderStatus::Processing);
        let names: Vec<_> = orders[0].items.iter().map(|i| i.product_name.as_str()).collect();
        assert_eq!(names, vec!["Flour", "Salt"]);
        assert_eq!(orders[1].items[0].status, ItemStatus::Active);
    }

    #[test]
    fn test_assemble_rejects_unknown_status() {
        let mut row = line(Uuid::new_v4(), 1, "Flour");
        row.item_status = "lost".to_string();
        assert!(matches!(assemble_orders(vec![row]), Err(StoreError::Corrupt(_))));
    }
}
