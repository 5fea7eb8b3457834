use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::access::{AccessDenied, AccessPolicy, Principal, Role};
use crate::domain::inventory::Product;
use crate::domain::order::OrderStatus;
use crate::store::{ProductFilter, StoreError, StoreTransaction, TransactionalStore};

// ============================================================================
// Dashboard - admin KPIs over orders, products and customers
// ============================================================================

pub const RECENT_ORDER_COUNT: usize = 5;
pub const TREND_DAYS: u64 = 7;

const ANONYMOUS_CUSTOMER: &str = "App User";

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Forbidden(#[from] AccessDenied),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_revenue: Decimal,
    pub pending_orders: usize,
    pub active_products: usize,
    pub total_customers: i64,
    pub low_stock_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: Uuid,
    pub readable_id: Option<i64>,
    pub customer: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub date: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub kpis: Kpis,
    pub recent_orders: Vec<RecentOrder>,
    pub low_stock_items: Vec<Product>,
    pub revenue_trend: Vec<RevenuePoint>,
}

pub struct DashboardService<S: TransactionalStore> {
    store: Arc<S>,
    low_stock_threshold: i32,
}

impl<S: TransactionalStore> DashboardService<S> {
    pub fn new(store: Arc<S>, low_stock_threshold: i32) -> Self {
        Self { store, low_stock_threshold }
    }

    pub async fn stats(&self, principal: &Principal) -> Result<DashboardStats, DashboardError> {
        self.stats_at(principal, Utc::now()).await
    }

    /// Stats with the revenue trend ending on the calendar day of `now`
    pub async fn stats_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<DashboardStats, DashboardError> {
        AccessPolicy::require_admin(principal, "view the dashboard")?;

        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders(None).await?;
        let products = tx.list_products(&ProductFilter::active()).await?;
        let total_customers = tx.count_users(Role::Customer).await?;

        let mut recent_orders = Vec::with_capacity(RECENT_ORDER_COUNT);
        for order in orders.iter().take(RECENT_ORDER_COUNT) {
            let customer = tx
                .find_user(order.user_id)
                .await?
                .and_then(|user| user.phone)
                .unwrap_or_else(|| ANONYMOUS_CUSTOMER.to_string());
            recent_orders.push(RecentOrder {
                id: order.id,
                readable_id: order.readable_id,
                customer,
                total: order.total,
                status: order.status,
                created_at: order.created_at,
            });
        }
        tx.commit().await?;

        let billable = || orders.iter().filter(|order| order.status != OrderStatus::Cancelled);

        let total_revenue: Decimal = billable().map(|order| order.total).sum();
        let pending_orders = orders.iter().filter(|order| order.status == OrderStatus::Pending).count();

        let low_stock_items: Vec<Product> = products
            .iter()
            .filter(|product| product.stock < self.low_stock_threshold)
            .cloned()
            .collect();

        let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for order in billable() {
            *daily.entry(order.created_at.date_naive()).or_default() += order.total;
        }
        let today = now.date_naive();
        let revenue_trend = (0..TREND_DAYS)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|day| RevenuePoint {
                date: day.format("%b %d").to_string(),
                revenue: daily.get(&day).copied().unwrap_or_default(),
            })
            .collect();

        tracing::debug!(
            orders = orders.len(),
            low_stock = low_stock_items.len(),
            "Dashboard stats computed"
        );

        Ok(DashboardStats {
            kpis: Kpis {
                total_revenue,
                pending_orders,
                active_products: products.len(),
                total_customers,
                low_stock_count: low_stock_items.len(),
            },
            recent_orders,
            low_stock_items,
            revenue_trend,
        })
    }
}
