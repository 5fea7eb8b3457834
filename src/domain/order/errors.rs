use uuid::Uuid;

use super::value_objects::{ItemStatus, OrderStatus};
use crate::domain::access::AccessDenied;
use crate::domain::inventory::InventoryError;
use crate::store::StoreError;

// ============================================================================
// Order Lifecycle Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error(transparent)]
    Forbidden(#[from] AccessDenied),

    #[error("{}", describe_illegal_transition(.current, .requested, .allowed))]
    IllegalTransition {
        current: OrderStatus,
        requested: Option<OrderStatus>,
        allowed: Vec<OrderStatus>,
    },

    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        requested: i32,
        available: i32,
    },

    #[error("Item {item_id} is {status} and cannot be cancelled")]
    InvalidItemState { item_id: Uuid, status: ItemStatus },

    #[error("No active items found with the provided ids")]
    NoMatchingItems,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn order_not_found(id: Uuid) -> Self {
        OrderError::NotFound { entity: "Order", id }
    }

    /// Stable label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NotFound { .. } => "not_found",
            OrderError::Forbidden(_) => "forbidden",
            OrderError::IllegalTransition { .. } => "illegal_transition",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidItemState { .. } => "invalid_item_state",
            OrderError::NoMatchingItems => "no_matching_items",
            OrderError::Validation(_) => "validation",
            OrderError::Store(_) => "store",
        }
    }
}

impl From<InventoryError> for OrderError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound(id) => OrderError::NotFound { entity: "Product", id },
            InventoryError::InsufficientStock { product_id, product_name, requested, available } => {
                OrderError::InsufficientStock { product_id, product_name, requested, available }
            }
            InventoryError::InvalidQuantity(quantity) => {
                OrderError::Validation(format!("quantity must be positive, got {quantity}"))
            }
            InventoryError::Store(e) => OrderError::Store(e),
        }
    }
}

fn describe_illegal_transition(
    current: &OrderStatus,
    requested: &Option<OrderStatus>,
    allowed: &[OrderStatus],
) -> String {
    let allowed = allowed.iter().map(OrderStatus::as_str).collect::<Vec<_>>().join(", ");
    match requested {
        Some(next) => format!("Illegal transition from {current} to {next}. Allowed: [{allowed}]"),
        None => format!("Operation not permitted for order in state {current}. Allowed: [{allowed}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transition_message_names_allowed_set() {
        let err = OrderError::IllegalTransition {
            current: OrderStatus::Pending,
            requested: Some(OrderStatus::Shipped),
            allowed: OrderStatus::Pending.allowed_transitions().to_vec(),
        };
        assert_eq!(
            err.to_string(),
            "Illegal transition from pending to shipped. Allowed: [processing, cancelled]"
        );
    }

    #[test]
    fn test_terminal_message_has_empty_allowed_set() {
        let err = OrderError::IllegalTransition {
            current: OrderStatus::Delivered,
            requested: None,
            allowed: vec![],
        };
        assert!(err.to_string().contains("state delivered"));
        assert!(err.to_string().ends_with("Allowed: []"));
    }

    #[test]
    fn test_inventory_errors_map_onto_order_taxonomy() {
        let id = Uuid::new_v4();
        let err: OrderError = InventoryError::ProductNotFound(id).into();
        assert!(matches!(err, OrderError::NotFound { entity: "Product", id: found } if found == id));

        let err: OrderError = InventoryError::InvalidQuantity(0).into();
        assert_eq!(err.kind(), "validation");
    }
}
