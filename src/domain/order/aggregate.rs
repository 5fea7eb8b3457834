use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::totals::OrderTotals;
use super::value_objects::{ItemStatus, OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate - state machine and item cascades
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    /// Human-facing sequence number, assigned by the store on insert
    pub readable_id: Option<i64>,
    pub user_id: Uuid,

    // Snapshot taken at placement, never recomputed
    pub total: Decimal,

    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Quantity to hand back to a product's stock counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restock {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl OrderAggregate {
    /// Build a new pending order from already-reserved, price-snapshotted lines
    pub fn place(user_id: Uuid, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::Validation("order must contain at least one item".to_string()));
        }
        if let Some(item) = items.iter().find(|item| item.quantity <= 0) {
            return Err(OrderError::Validation(format!(
                "quantity must be positive, got {}",
                item.quantity
            )));
        }

        let total = items.iter().map(OrderItem::line_total).sum();

        Ok(Self {
            id: Uuid::new_v4(),
            readable_id: None,
            user_id,
            total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            items,
        })
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals::from_items(&self.items)
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Check a requested transition against the state machine without applying it
    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), OrderError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(OrderError::IllegalTransition {
                current: self.status,
                requested: Some(next),
                allowed: self.status.allowed_transitions().to_vec(),
            })
        }
    }

    /// Apply a forward transition and its item cascade.
    ///
    /// Cancellation is not a forward transition: it goes through [`Self::cancel`]
    /// so the restock list is never dropped.
    pub fn advance(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        self.ensure_transition(next)?;

        match next {
            OrderStatus::Cancelled => {
                return Err(OrderError::Validation(
                    "cancellation must go through the cancel operation".to_string(),
                ));
            }
            OrderStatus::Shipped => self.cascade(ItemStatus::Active, ItemStatus::Shipped),
            OrderStatus::Delivered => self.cascade(ItemStatus::Shipped, ItemStatus::Delivered),
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::PartiallyShipped => {}
        }

        self.status = next;
        Ok(())
    }

    /// Full cancellation: every item not already cancelled is cancelled and
    /// returned as a restock entry.
    pub fn cancel(&mut self) -> Result<Vec<Restock>, OrderError> {
        self.ensure_transition(OrderStatus::Cancelled)?;

        let mut restocks = Vec::new();
        for item in self.items.iter_mut().filter(|item| !item.is_cancelled()) {
            restocks.push(Restock {
                product_id: item.product_id,
                quantity: item.quantity,
            });
            item.status = ItemStatus::Cancelled;
        }

        self.status = OrderStatus::Cancelled;
        Ok(restocks)
    }

    /// Write off individual items (warehouse loss). Nothing is restocked.
    ///
    /// Every named item that belongs to this order is validated before any is
    /// touched; ids that do not belong to the order are ignored.
    /// Returns the ids that were cancelled.
    pub fn cancel_items(&mut self, item_ids: &[Uuid]) -> Result<Vec<Uuid>, OrderError> {
        if !self.status.accepts_item_cancellation() {
            return Err(OrderError::IllegalTransition {
                current: self.status,
                requested: None,
                allowed: self.status.allowed_transitions().to_vec(),
            });
        }

        let mut matched = Vec::new();
        for item in self.items.iter().filter(|item| item_ids.contains(&item.id)) {
            if item.status != ItemStatus::Active {
                return Err(OrderError::InvalidItemState {
                    item_id: item.id,
                    status: item.status,
                });
            }
            matched.push(item.id);
        }

        if matched.is_empty() {
            return Err(OrderError::NoMatchingItems);
        }

        for item in self.items.iter_mut().filter(|item| matched.contains(&item.id)) {
            item.status = ItemStatus::Cancelled;
        }

        if self.status == OrderStatus::Processing {
            self.status = OrderStatus::PartiallyShipped;
        }

        Ok(matched)
    }

    fn cascade(&mut self, from: ItemStatus, to: ItemStatus) {
        for item in self.items.iter_mut().filter(|item| item.status == from) {
            item.status = to;
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32, cents: i64) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Basmati Rice".to_string(),
            quantity,
            price: Decimal::new(cents, 2),
            status: ItemStatus::Active,
        }
    }

    fn pending_order() -> OrderAggregate {
        OrderAggregate::place(Uuid::new_v4(), vec![item(2, 1000), item(1, 550)]).unwrap()
    }

    fn order_in(status: OrderStatus) -> OrderAggregate {
        let mut order = pending_order();
        order.status = status;
        order
    }

    #[test]
    fn test_place_snapshots_total() {
        let order = pending_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Decimal::new(2550, 2));
        assert!(order.items.iter().all(|i| i.status == ItemStatus::Active));
    }

    #[test]
    fn test_place_rejects_empty_and_non_positive_lines() {
        let user = Uuid::new_v4();
        assert!(matches!(OrderAggregate::place(user, vec![]), Err(OrderError::Validation(_))));
        assert!(matches!(
            OrderAggregate::place(user, vec![item(0, 100)]),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            OrderAggregate::place(user, vec![item(-3, 100)]),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_transition_table_is_exhaustive() {
        use OrderStatus::*;
        let allowed: &[(OrderStatus, OrderStatus)] = &[
            (Pending, Processing),
            (Pending, Cancelled),
            (Processing, PartiallyShipped),
            (Processing, Shipped),
            (Processing, Cancelled),
            (PartiallyShipped, Shipped),
            (PartiallyShipped, Cancelled),
            (Shipped, Delivered),
        ];

        for current in OrderStatus::ALL {
            for requested in OrderStatus::ALL {
                let order = order_in(current);
                let result = order.ensure_transition(requested);
                if allowed.contains(&(current, requested)) {
                    assert!(result.is_ok(), "{current} -> {requested} should be allowed");
                } else {
                    match result {
                        Err(OrderError::IllegalTransition { current: c, requested: r, allowed: a }) => {
                            assert_eq!(c, current);
                            assert_eq!(r, Some(requested));
                            assert_eq!(a, current.allowed_transitions().to_vec());
                        }
                        other => panic!("{current} -> {requested} should be illegal, got {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_reject_every_transition() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for requested in OrderStatus::ALL {
                let mut order = order_in(terminal);
                assert!(matches!(
                    order.advance(requested),
                    Err(OrderError::IllegalTransition { .. })
                ));
                assert_eq!(order.status, terminal);
            }
        }
    }

    #[test]
    fn test_ship_cascades_only_active_items() {
        let mut order = order_in(OrderStatus::Processing);
        order.items[1].status = ItemStatus::Cancelled;

        order.advance(OrderStatus::Shipped).unwrap();

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.items[0].status, ItemStatus::Shipped);
        assert_eq!(order.items[1].status, ItemStatus::Cancelled);
    }

    #[test]
    fn test_deliver_cascades_shipped_items() {
        let mut order = order_in(OrderStatus::Processing);
        order.items[0].status = ItemStatus::Cancelled;
        order.advance(OrderStatus::Shipped).unwrap();
        order.advance(OrderStatus::Delivered).unwrap();

        assert_eq!(order.items[0].status, ItemStatus::Cancelled);
        assert_eq!(order.items[1].status, ItemStatus::Delivered);
    }

    #[test]
    fn test_advance_refuses_cancellation() {
        let mut order = pending_order();
        assert!(matches!(order.advance(OrderStatus::Cancelled), Err(OrderError::Validation(_))));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_cancel_returns_restocks_for_uncancelled_items() {
        let mut order = order_in(OrderStatus::PartiallyShipped);
        order.items[0].status = ItemStatus::Cancelled;

        let restocks = order.cancel().unwrap();

        assert_eq!(restocks.len(), 1);
        assert_eq!(restocks[0].product_id, order.items[1].product_id);
        assert_eq!(restocks[0].quantity, 1);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.items.iter().all(OrderItem::is_cancelled));
    }

    #[test]
    fn test_cancel_twice_fails_without_restocks() {
        let mut order = pending_order();
        order.cancel().unwrap();
        assert!(matches!(order.cancel(), Err(OrderError::IllegalTransition { .. })));
    }

    #[test]
    fn test_cancel_not_allowed_after_shipping() {
        let mut order = order_in(OrderStatus::Shipped);
        assert!(matches!(order.cancel(), Err(OrderError::IllegalTransition { .. })));
    }

    #[test]
    fn test_cancel_items_moves_processing_to_partially_shipped() {
        let mut order = order_in(OrderStatus::Processing);
        let target = order.items[0].id;

        let cancelled = order.cancel_items(&[target]).unwrap();

        assert_eq!(cancelled, vec![target]);
        assert_eq!(order.status, OrderStatus::PartiallyShipped);
        assert_eq!(order.items[0].status, ItemStatus::Cancelled);
        assert_eq!(order.items[1].status, ItemStatus::Active);
    }

    #[test]
    fn test_cancel_items_keeps_pending_status() {
        let mut order = pending_order();
        let target = order.items[1].id;
        order.cancel_items(&[target]).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_cancel_items_is_all_or_nothing() {
        let mut order = order_in(OrderStatus::Processing);
        order.items[1].status = ItemStatus::Cancelled;
        let ids = [order.items[0].id, order.items[1].id];
        let before = order.clone();

        let err = order.cancel_items(&ids).unwrap_err();

        assert!(matches!(err, OrderError::InvalidItemState { status: ItemStatus::Cancelled, .. }));
        assert_eq!(order, before);
    }

    #[test]
    fn test_cancel_items_unknown_ids() {
        let mut order = order_in(OrderStatus::Processing);
        assert!(matches!(
            order.cancel_items(&[Uuid::new_v4()]),
            Err(OrderError::NoMatchingItems)
        ));
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[test]
    fn test_cancel_items_rejected_for_late_states() {
        for status in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled] {
            let mut order = order_in(status);
            let ids = [order.items[0].id];
            assert!(matches!(
                order.cancel_items(&ids),
                Err(OrderError::IllegalTransition { requested: None, .. })
            ));
        }
    }
}
