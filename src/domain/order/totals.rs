use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::aggregate::OrderAggregate;
use super::value_objects::{ItemStatus, OrderItem, OrderStatus};

// ============================================================================
// Derived Totals & Read Projection
// ============================================================================
//
// Totals are recomputed from item statuses on every read. The stored
// aggregate is never mutated to carry them.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub total_original: Decimal,
    pub total_fulfilled: Decimal,
    pub total_refundable: Decimal,
}

impl OrderTotals {
    pub fn from_items(items: &[OrderItem]) -> Self {
        let mut total_original = Decimal::ZERO;
        let mut total_fulfilled = Decimal::ZERO;

        for item in items {
            let line = item.line_total();
            total_original += line;
            if !item.is_cancelled() {
                total_fulfilled += line;
            }
        }

        Self {
            total_original,
            total_fulfilled,
            total_refundable: (total_original - total_fulfilled).max(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub status: ItemStatus,
}

/// Display-ready order: stored fields plus freshly derived totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub readable_id: Option<i64>,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub total: Decimal,
    pub items: Vec<OrderItemView>,
    #[serde(flatten)]
    pub totals: OrderTotals,
}

impl From<&OrderAggregate> for OrderView {
    fn from(order: &OrderAggregate) -> Self {
        Self {
            id: order.id,
            readable_id: order.readable_id,
            user_id: order.user_id,
            status: order.status,
            created_at: order.created_at,
            total: order.total,
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    id: item.id,
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    price: item.price,
                    status: item.status,
                })
                .collect(),
            totals: order.totals(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(quantity: i32, cents: i64, status: ItemStatus) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Cooking Oil 15L".to_string(),
            quantity,
            price: Decimal::new(cents, 2),
            status,
        }
    }

    #[test]
    fn test_cancelled_items_become_refundable() {
        let items = vec![
            item(2, 1000, ItemStatus::Active),
            item(1, 500, ItemStatus::Cancelled),
        ];
        let totals = OrderTotals::from_items(&items);

        assert_eq!(totals.total_original, Decimal::new(2500, 2));
        assert_eq!(totals.total_fulfilled, Decimal::new(2000, 2));
        assert_eq!(totals.total_refundable, Decimal::new(500, 2));
    }

    #[test]
    fn test_view_serializes_flat_totals() {
        let order = OrderAggregate::place(Uuid::new_v4(), vec![item(2, 1000, ItemStatus::Active)]).unwrap();
        let json = serde_json::to_value(OrderView::from(&order)).unwrap();

        assert_eq!(json["status"], "pending");
        assert!(json.get("total_original").is_some());
        assert!(json.get("total_fulfilled").is_some());
        assert!(json.get("total_refundable").is_some());
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
    }

    fn status_strategy() -> impl Strategy<Value = ItemStatus> {
        prop_oneof![
            Just(ItemStatus::Active),
            Just(ItemStatus::Cancelled),
            Just(ItemStatus::Shipped),
            Just(ItemStatus::Delivered),
        ]
    }

    proptest! {
        #[test]
        fn prop_totals_partition_original(
            lines in prop::collection::vec((1i32..500, 0i64..1_000_000, status_strategy()), 0..20)
        ) {
            let items: Vec<OrderItem> = lines
                .into_iter()
                .map(|(quantity, cents, status)| item(quantity, cents, status))
                .collect();
            let totals = OrderTotals::from_items(&items);

            let expected: Decimal = items.iter().map(OrderItem::line_total).sum();
            prop_assert_eq!(totals.total_original, expected);
            prop_assert_eq!(totals.total_fulfilled + totals.total_refundable, totals.total_original);
            prop_assert!(totals.total_refundable >= Decimal::ZERO);
        }
    }
}
