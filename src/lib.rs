pub mod config;
pub mod domain;
pub mod metrics;
pub mod notify;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::domain::access::Role;
    use crate::domain::auth::{CredentialVerifier, PrincipalIssuer};
    use crate::domain::inventory::{Product, ProductStatus};
    use crate::notify::Notifier;

    pub fn product(sku: &str, cents: i64, stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            name: format!("{sku} (test)"),
            description: None,
            category: Some("Staples".to_string()),
            price: Decimal::new(cents, 2),
            stock,
            status: ProductStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// Forwards every notification to a channel
    pub struct RecordingNotifier {
        tx: mpsc::UnboundedSender<(String, String)>,
    }

    impl RecordingNotifier {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
            self.tx.send((recipient.to_string(), message.to_string()))?;
            Ok(())
        }
    }

    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _recipient: &str, _message: &str) -> anyhow::Result<()> {
            anyhow::bail!("gateway unavailable")
        }
    }

    /// Treats the stored hash as the plaintext password
    pub struct PlainVerifier;

    impl CredentialVerifier for PlainVerifier {
        fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
            plaintext == stored_hash
        }
    }

    /// Issues `"{subject}:{role}"`
    pub struct StaticIssuer;

    impl PrincipalIssuer for StaticIssuer {
        fn issue(&self, subject_id: Uuid, role: Role) -> anyhow::Result<String> {
            Ok(format!("{subject_id}:{role}"))
        }
    }
}
