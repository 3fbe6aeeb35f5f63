/// Credential operation errors
///
/// Every failure a credential operation can produce is one of these variants.
/// Distinct causes share one variant (and therefore one message) whenever
/// telling them apart would leak whether an account, token or code exists.

use serde::Serialize;

use crate::auth::password::PasswordError;
use crate::store::StoreError;

/// Shown for an unknown email and for a wrong password alike
pub const LOGIN_FAILED_MESSAGE: &str = "Email or password is incorrect.";

/// Shown for unknown, used and expired reset tokens alike
pub const INVALID_RESET_TOKEN_MESSAGE: &str =
    "This reset link is invalid or has expired. Please request a new one.";

/// Shown for unknown, redeemed and expired activation codes alike
pub const INVALID_CODE_MESSAGE: &str =
    "The code is invalid, has already been used, or has expired.";

/// Returned by every forgot-password request
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent.";

pub const EMAIL_TAKEN_MESSAGE: &str = "This email is already registered.";

pub const AUTHORIZATION_FAILED_MESSAGE: &str = "You do not have access to this area.";

/// A single invalid input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as sent by the client
    pub field: String,

    /// Human-readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error type for credential and entitlement operations
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Input failed validation
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Email or password did not match
    #[error("{}", LOGIN_FAILED_MESSAGE)]
    AuthenticationFailure,

    /// Reset token unknown, used or expired
    #[error("{}", INVALID_RESET_TOKEN_MESSAGE)]
    InvalidOrExpiredToken,

    /// Activation code unknown, redeemed or expired
    #[error("{}", INVALID_CODE_MESSAGE)]
    InvalidOrExpiredCode,

    /// Caller lacks the required tier
    #[error("{}", AUTHORIZATION_FAILED_MESSAGE)]
    AuthorizationFailure,

    /// Registration for an email that already has an account
    #[error("{}", EMAIL_TAKEN_MESSAGE)]
    EmailTaken,

    /// Hashing failed
    #[error("Password hashing error: {0}")]
    Password(#[from] PasswordError),

    /// Store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CredentialError {
    /// Validation error for one field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        CredentialError::Validation(vec![FieldError::new(field, message)])
    }

    /// Infrastructure failures; everything else is the caller's fault
    pub fn is_internal(&self) -> bool {
        matches!(self, CredentialError::Password(_) | CredentialError::Store(_))
    }
}
