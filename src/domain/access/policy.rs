use uuid::Uuid;

use super::principal::{Principal, Role};
use crate::domain::order::{OrderAggregate, OrderError, OrderStatus};

// ============================================================================
// Access Policy - explicit capability checks
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
#[error("{role} is not allowed to {action}")]
pub struct AccessDenied {
    pub role: Role,
    pub action: &'static str,
}

pub struct AccessPolicy;

impl AccessPolicy {
    pub fn require_admin(principal: &Principal, action: &'static str) -> Result<(), AccessDenied> {
        if principal.is_admin() {
            Ok(())
        } else {
            Err(AccessDenied { role: principal.role, action })
        }
    }

    /// Owner filter for order listings. `None` means every order is visible.
    pub fn order_scope(principal: &Principal) -> Option<Uuid> {
        if principal.is_admin() {
            None
        } else {
            Some(principal.subject_id)
        }
    }

    pub fn authorize_view(principal: &Principal, order: &OrderAggregate) -> Result<(), AccessDenied> {
        if principal.is_admin() || order.is_owned_by(principal.subject_id) {
            Ok(())
        } else {
            Err(AccessDenied { role: principal.role, action: "view this order" })
        }
    }

    /// Full cancellation gate. Customers may only cancel their own orders and
    /// only while they are still pending; admins are limited by the state
    /// machine alone.
    pub fn authorize_cancel(principal: &Principal, order: &OrderAggregate) -> Result<(), OrderError> {
        if principal.is_admin() {
            return Ok(());
        }

        if !order.is_owned_by(principal.subject_id) {
            return Err(AccessDenied { role: principal.role, action: "cancel this order" }.into());
        }

        if order.status != OrderStatus::Pending {
            return Err(OrderError::IllegalTransition {
                current: order.status,
                requested: Some(OrderStatus::Cancelled),
                allowed: Vec::new(),
            });
        }

        Ok(())
    }
}
