use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::access::Role;

pub const DEFAULT_CUSTOMER_NAME: &str = "Retail Customer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn admin(email: impl Into<String>, name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: Some(email.into()),
            phone: None,
            name: name.into(),
            password_hash: Some(password_hash.into()),
            role: Role::Admin,
            created_at: Utc::now(),
        }
    }

    /// Customer registered on first successful phone verification
    pub fn customer_from_phone(phone: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: None,
            phone: Some(phone.into()),
            name: DEFAULT_CUSTOMER_NAME.to_string(),
            password_hash: None,
            role: Role::Customer,
            created_at: Utc::now(),
        }
    }
}

/// Bearer token handed back to the client after login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
}

impl IssuedToken {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}
