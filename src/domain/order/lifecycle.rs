use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::aggregate::OrderAggregate;
use super::errors::OrderError;
use super::totals::OrderView;
use super::value_objects::{LineRequest, OrderItem, OrderStatus};
use crate::domain::access::{AccessPolicy, Principal};
use crate::domain::inventory::InventoryLedger;
use crate::metrics::Metrics;
use crate::notify::{self, Notifier};
use crate::store::{StoreTransaction, TransactionalStore};

// ============================================================================
// Order Lifecycle Service
// ============================================================================
//
// Orchestrates: Principal → AccessPolicy → Store transaction → Aggregate →
// InventoryLedger → commit → notification
//
// Every operation runs in exactly one store transaction. Any error returned
// before `commit` drops the transaction and rolls back every mutation,
// including stock already reserved for earlier lines.
//
// ============================================================================

pub struct OrderLifecycleService<S: TransactionalStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
}

impl<S: TransactionalStore> OrderLifecycleService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, metrics: Arc<Metrics>) -> Self {
        Self { store, notifier, metrics }
    }

    /// Reserve stock for every line, snapshot prices and persist a pending order
    pub async fn create_order(
        &self,
        principal: &Principal,
        lines: Vec<LineRequest>,
    ) -> Result<OrderView, OrderError> {
        let started = Instant::now();
        let result = self.create_order_tx(principal, lines).await;
        self.observe("create_order", started, &result);
        result
    }

    pub async fn list_orders(&self, principal: &Principal) -> Result<Vec<OrderView>, OrderError> {
        let started = Instant::now();
        let result = self.list_orders_tx(principal).await;
        self.observe("list_orders", started, &result);
        result
    }

    pub async fn get_order(&self, principal: &Principal, order_id: Uuid) -> Result<OrderView, OrderError> {
        let started = Instant::now();
        let result = self.get_order_tx(principal, order_id).await;
        self.observe("get_order", started, &result);
        result
    }

    /// Admin-only state transition. `Cancelled` goes through full cancellation
    /// in the same transaction, restocking every live item.
    pub async fn update_order_status(
        &self,
        principal: &Principal,
        order_id: Uuid,
        requested: OrderStatus,
    ) -> Result<OrderView, OrderError> {
        let started = Instant::now();
        let result = self.update_order_status_tx(principal, order_id, requested).await;
        self.observe("update_order_status", started, &result);
        result
    }

    pub async fn cancel_order(&self, principal: &Principal, order_id: Uuid) -> Result<OrderView, OrderError> {
        let started = Instant::now();
        let result = self.cancel_order_tx(principal, order_id).await;
        self.observe("cancel_order", started, &result);
        result
    }

    /// Write off individual items as warehouse loss. Stock is left untouched.
    pub async fn cancel_order_items(
        &self,
        principal: &Principal,
        order_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<OrderView, OrderError> {
        let started = Instant::now();
        let result = self.cancel_order_items_tx(principal, order_id, item_ids).await;
        self.observe("cancel_order_items", started, &result);
        result
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    async fn create_order_tx(
        &self,
        principal: &Principal,
        lines: Vec<LineRequest>,
    ) -> Result<OrderView, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::Validation("order must contain at least one item".to_string()));
        }
        if let Some(line) = lines.iter().find(|line| line.quantity <= 0) {
            return Err(OrderError::Validation(format!(
                "quantity must be positive, got {} for product {}",
                line.quantity, line.product_id
            )));
        }

        let mut tx = self.store.begin().await?;

        // Products are locked in id order so overlapping multi-line orders cannot deadlock;
        // items keep the order of the request.
        let mut lock_order: Vec<usize> = (0..lines.len()).collect();
        lock_order.sort_by_key(|&index| lines[index].product_id);

        let mut snapshots: Vec<Option<OrderItem>> = vec![None; lines.len()];
        for index in lock_order {
            let line = &lines[index];
            let product = InventoryLedger::reserve_stock(&mut tx, line.product_id, line.quantity).await?;
            snapshots[index] = Some(OrderItem::snapshot(&product, line.quantity));
        }
        let items: Vec<OrderItem> = snapshots.into_iter().flatten().collect();

        let mut order = OrderAggregate::place(principal.subject_id, items)?;
        let readable_id = tx.insert_order(&order).await?;
        order.readable_id = Some(readable_id);

        let recipient = owner_phone(&mut tx, order.user_id).await?;
        tx.commit().await?;

        let units: i64 = lines.iter().map(|line| i64::from(line.quantity)).sum();
        self.metrics.record_reserved(units);

        tracing::info!(
            order_id = %order.id,
            readable_id = readable_id,
            user_id = %order.user_id,
            item_count = order.items.len(),
            total = %order.total,
            "✅ Order created"
        );

        notify::dispatch(
            &self.notifier,
            &self.metrics,
            recipient,
            notify::order_created_message(readable_id, order.total),
        );

        Ok(OrderView::from(&order))
    }

    async fn list_orders_tx(&self, principal: &Principal) -> Result<Vec<OrderView>, OrderError> {
        let scope = AccessPolicy::order_scope(principal);

        let mut tx = self.store.begin().await?;
        let orders = tx.list_orders(scope).await?;
        tx.commit().await?;

        tracing::debug!(
            subject_id = %principal.subject_id,
            role = %principal.role,
            count = orders.len(),
            "Orders listed"
        );

        Ok(orders.iter().map(OrderView::from).collect())
    }

    async fn get_order_tx(&self, principal: &Principal, order_id: Uuid) -> Result<OrderView, OrderError> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;
        tx.commit().await?;

        AccessPolicy::authorize_view(principal, &order)?;

        Ok(OrderView::from(&order))
    }

    async fn update_order_status_tx(
        &self,
        principal: &Principal,
        order_id: Uuid,
        requested: OrderStatus,
    ) -> Result<OrderView, OrderError> {
        AccessPolicy::require_admin(principal, "update order status")?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;

        order.ensure_transition(requested)?;
        let previous = order.status;

        if requested == OrderStatus::Cancelled {
            self.cancel_locked(&mut tx, principal, &mut order).await?;
        } else {
            order.advance(requested)?;
            tx.save_order_status(&order).await?;
        }

        let recipient = owner_phone(&mut tx, order.user_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            from = %previous,
            to = %order.status,
            "🔄 Order status updated"
        );

        notify::dispatch(
            &self.notifier,
            &self.metrics,
            recipient,
            notify::status_update_message(order.readable_id.unwrap_or_default(), order.status),
        );

        Ok(OrderView::from(&order))
    }

    async fn cancel_order_tx(&self, principal: &Principal, order_id: Uuid) -> Result<OrderView, OrderError> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;

        self.cancel_locked(&mut tx, principal, &mut order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            cancelled_by = %principal.subject_id,
            role = %principal.role,
            "❌ Order cancelled"
        );

        Ok(OrderView::from(&order))
    }

    async fn cancel_order_items_tx(
        &self,
        principal: &Principal,
        order_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<OrderView, OrderError> {
        AccessPolicy::require_admin(principal, "cancel order items")?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;

        let cancelled = order.cancel_items(item_ids)?;
        tx.save_order_status(&order).await?;
        tx.commit().await?;

        let units: i64 = cancelled
            .iter()
            .filter_map(|id| order.item(*id))
            .map(|item| i64::from(item.quantity))
            .sum();
        self.metrics.record_written_off(units);

        tracing::info!(
            order_id = %order.id,
            items = cancelled.len(),
            units = units,
            status = %order.status,
            "Order items written off"
        );

        Ok(OrderView::from(&order))
    }

    /// Full cancellation on an order whose row lock is already held by `tx`
    async fn cancel_locked(
        &self,
        tx: &mut S::Tx,
        principal: &Principal,
        order: &mut OrderAggregate,
    ) -> Result<(), OrderError> {
        AccessPolicy::authorize_cancel(principal, order)?;

        let restocks = order.cancel()?;
        for restock in &restocks {
            InventoryLedger::restock(tx, restock.product_id, restock.quantity).await?;
        }
        tx.save_order_status(order).await?;

        let units: i64 = restocks.iter().map(|r| i64::from(r.quantity)).sum();
        self.metrics.record_restocked(units);

        Ok(())
    }

    fn observe<T>(&self, operation: &str, started: Instant, result: &Result<T, OrderError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => {
                match e {
                    OrderError::Store(_) => {
                        tracing::error!(operation = operation, error = %e, "Order operation failed")
                    }
                    _ => tracing::debug!(operation = operation, kind = e.kind(), error = %e, "Order operation rejected"),
                }
                e.kind()
            }
        };
        self.metrics.record_order_operation(operation, outcome, started.elapsed());
    }
}

async fn owner_phone<T: StoreTransaction>(tx: &mut T, user_id: Uuid) -> Result<Option<String>, OrderError> {
    Ok(tx.find_user(user_id).await?.and_then(|user| user.phone))
}

// ============================================================================
// Unit Tests
// ============================================================================
