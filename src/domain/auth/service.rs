use std::sync::Arc;
use uuid::Uuid;

use super::errors::AuthError;
use super::value_objects::{IssuedToken, User};
use crate::domain::access::Role;
use crate::metrics::Metrics;
use crate::notify::{self, Notifier};
use crate::store::{StoreError, StoreTransaction, TransactionalStore};

/// Checks a plaintext password against a stored hash
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool;
}

/// Encodes a subject and role into an opaque bearer token
pub trait PrincipalIssuer: Send + Sync {
    fn issue(&self, subject_id: Uuid, role: Role) -> anyhow::Result<String>;
}

pub struct AuthService<S: TransactionalStore> {
    store: Arc<S>,
    verifier: Arc<dyn CredentialVerifier>,
    issuer: Arc<dyn PrincipalIssuer>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    otp_code: String,
}

impl<S: TransactionalStore> AuthService<S> {
    pub fn new(
        store: Arc<S>,
        verifier: Arc<dyn CredentialVerifier>,
        issuer: Arc<dyn PrincipalIssuer>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
        otp_code: impl Into<String>,
    ) -> Self {
        Self {
            store,
            verifier,
            issuer,
            notifier,
            metrics,
            otp_code: otp_code.into(),
        }
    }

    pub async fn admin_login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let result = self.admin_login_tx(email, password).await;
        self.observe("password", &result);
        result
    }

    /// Deliver the one-time code to `phone` through the notifier
    pub async fn send_otp(&self, phone: &str) -> Result<(), AuthError> {
        let phone = normalize_phone(phone)?;
        notify::dispatch(
            &self.notifier,
            &self.metrics,
            Some(phone.clone()),
            notify::otp_message(&self.otp_code),
        );
        tracing::info!(phone = %phone, "OTP dispatched");
        Ok(())
    }

    /// Verify the code and log the phone in, registering it on first use
    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<IssuedToken, AuthError> {
        let result = self.verify_otp_tx(phone, code).await;
        self.observe("otp", &result);
        result
    }

    async fn admin_login_tx(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let mut tx = self.store.begin().await?;
        let user = tx.find_user_by_email(email.trim()).await?;
        tx.commit().await?;

        let user = user.ok_or(AuthError::InvalidCredentials)?;
        let hash = user.password_hash.as_deref().ok_or(AuthError::InvalidCredentials)?;
        if !self.verifier.verify(password, hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if user.role != Role::Admin {
            return Err(AuthError::NotAdmin);
        }

        tracing::info!(user_id = %user.id, "🔐 Admin logged in");
        self.issue(&user)
    }

    async fn verify_otp_tx(&self, phone: &str, code: &str) -> Result<IssuedToken, AuthError> {
        let phone = normalize_phone(phone)?;
        if code.trim() != self.otp_code {
            return Err(AuthError::InvalidOtp);
        }

        let user = match self.find_or_register(&phone).await {
            // Lost a registration race with a concurrent login for the same phone
            Err(AuthError::Store(StoreError::Conflict(_))) => self.find_or_register(&phone).await?,
            other => other?,
        };

        tracing::info!(user_id = %user.id, role = %user.role, "📱 OTP login");
        self.issue(&user)
    }

    async fn find_or_register(&self, phone: &str) -> Result<User, AuthError> {
        let mut tx = self.store.begin().await?;
        if let Some(user) = tx.find_user_by_phone(phone).await? {
            tx.commit().await?;
            return Ok(user);
        }

        let user = User::customer_from_phone(phone);
        tx.insert_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, phone = %phone, "New customer registered");
        Ok(user)
    }

    fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        self.issuer
            .issue(user.id, user.role)
            .map(IssuedToken::bearer)
            .map_err(|e| AuthError::Issuer(e.to_string()))
    }

    fn observe<T>(&self, method: &str, result: &Result<T, AuthError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => {
                tracing::debug!(method = method, kind = e.kind(), "Login rejected");
                e.kind()
            }
        };
        self.metrics.record_auth_attempt(method, outcome);
    }
}

fn normalize_phone(phone: &str) -> Result<String, AuthError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(AuthError::MissingPhone);
    }
    Ok(phone.to_string())
}
