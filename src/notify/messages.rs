use rust_decimal::Decimal;

use crate::domain::order::OrderStatus;

pub fn order_created_message(order_number: i64, total: Decimal) -> String {
    format!(
        "Order #{order_number} confirmed! Total: ₹{:.2}. Thank you for your purchase!",
        total.round_dp(2)
    )
}

pub fn status_update_message(order_number: i64, status: OrderStatus) -> String {
    match status {
        OrderStatus::Processing => {
            format!("Order #{order_number} has been confirmed and is being processed.")
        }
        OrderStatus::Shipped => format!("Order #{order_number} is on its way."),
        OrderStatus::Delivered => format!("Order #{order_number} has been delivered. Thank you!"),
        OrderStatus::Cancelled => format!("Order #{order_number} has been cancelled."),
        other => format!("Order #{order_number} status updated to: {other}"),
    }
}

pub fn otp_message(code: &str) -> String {
    format!("Your WholesaleMart OTP is: {code}. Valid for 10 minutes.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_created_message_formats_total() {
        let msg = order_created_message(42, Decimal::new(2000, 2));
        assert_eq!(msg, "Order #42 confirmed! Total: ₹20.00. Thank you for your purchase!");
    }

    #[test]
    fn test_status_messages() {
        assert!(status_update_message(7, OrderStatus::Delivered).contains("delivered"));
        assert_eq!(
            status_update_message(7, OrderStatus::PartiallyShipped),
            "Order #7 status updated to: partially_shipped"
        );
    }
}
