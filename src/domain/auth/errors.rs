use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Not authorized as admin")]
    NotAdmin,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("Phone number must not be empty")]
    MissingPhone,

    #[error("Token issuance failed: {0}")]
    Issuer(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::NotAdmin => "not_admin",
            AuthError::InvalidOtp => "invalid_otp",
            AuthError::MissingPhone => "missing_phone",
            AuthError::Issuer(_) => "issuer",
            AuthError::Store(_) => "store",
        }
    }
}
