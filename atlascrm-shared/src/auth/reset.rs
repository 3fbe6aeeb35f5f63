/// Password reset flow
///
/// `request` issues a single-use token for a known email and hands it to a
/// [`ResetTokenSender`]; `consume` trades a valid token for a new password.
/// The request side answers identically whether or not the account exists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info, warn};

use super::password::{validate_password_strength, SecretHasher};
use super::token::{digest, generate_token};
use crate::clock::Clock;
use crate::error::{CredentialError, FORGOT_PASSWORD_MESSAGE};
use crate::models::user::normalize_email;
use crate::store::CredentialStore;

/// Default reset token lifetime
pub const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 30;

/// Tokens shorter than this are rejected without a lookup
pub const RESET_TOKEN_MIN_LENGTH: usize = 10;

/// Delivers reset links to users
///
/// Failures are logged by the flow and never reach the requester.
#[async_trait]
pub trait ResetTokenSender: Send + Sync {
    async fn send_reset_token(&self, email: &str, token: &str) -> anyhow::Result<()>;
}

/// Sender used when no email delivery is configured
///
/// Outside production it logs the reset link so the flow can be completed by
/// hand; in production it only logs that a link would have been sent.
#[derive(Debug, Clone)]
pub struct LogResetTokenSender {
    production: bool,
}

impl LogResetTokenSender {
    pub fn new(production: bool) -> Self {
        Self { production }
    }
}

#[async_trait]
impl ResetTokenSender for LogResetTokenSender {
    async fn send_reset_token(&self, email: &str, token: &str) -> anyhow::Result<()> {
        if self.production {
            info!(email = %email, "Password reset requested; no mail delivery configured");
        } else {
            let link = format!("/reset-password?token={token}");
            info!(email = %email, link = %link, "Password reset link");
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PasswordResetFlow {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    hasher: SecretHasher,
    sender: Arc<dyn ResetTokenSender>,
    ttl: Duration,
}

impl PasswordResetFlow {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        hasher: SecretHasher,
        sender: Arc<dyn ResetTokenSender>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            hasher,
            sender,
            ttl,
        }
    }

    /// Issues a reset token for `email` if it belongs to an account
    ///
    /// Always returns [`FORGOT_PASSWORD_MESSAGE`]: for known, unknown and
    /// malformed emails alike. Only store failures surface as errors.
    pub async fn request(&self, email: &str) -> Result<&'static str, CredentialError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Ok(FORGOT_PASSWORD_MESSAGE);
        }

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(FORGOT_PASSWORD_MESSAGE);
        };

        let now = self.clock.now();
        let token = generate_token();
        self.store
            .replace_reset_token(user.id, &digest(&token), now + self.ttl, now)
            .await?;

        if let Err(e) = self.sender.send_reset_token(&user.email, &token).await {
            warn!(user_id = %user.id, error = %e, "Failed to deliver password reset token");
        }

        info!(user_id = %user.id, "Password reset token issued");
        Ok(FORGOT_PASSWORD_MESSAGE)
    }

    /// Sets a new password using a reset token
    ///
    /// Marks the token used, rotates the password hash and ends every session
    /// of the user in one atomic step.
    ///
    /// # Errors
    ///
    /// - `Validation` if the new password fails the strength rule
    /// - `InvalidOrExpiredToken` if the token is unknown, used or expired
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<(), CredentialError> {
        if let Err(message) = validate_password_strength(new_password) {
            return Err(CredentialError::field("new_password", message));
        }

        let token = token.trim();
        if token.len() < RESET_TOKEN_MIN_LENGTH {
            return Err(CredentialError::InvalidOrExpiredToken);
        }

        let password_hash = self.hasher.hash_blocking(new_password.to_string()).await?;

        match self
            .store
            .consume_reset_token(&digest(token), &password_hash, self.clock.now())
            .await?
        {
            Some(user_id) => {
                info!(user_id = %user_id, "Password reset completed");
                Ok(())
            }
            None => {
                warn!("Password reset attempted with invalid or expired token");
                Err(CredentialError::InvalidOrExpiredToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashParams;
    use crate::clock::ManualClock;
    use crate::models::user::CreateUser;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    /// Captures delivered tokens
    #[derive(Default)]
    struct CapturingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ResetTokenSender for CapturingSender {
        async fn send_reset_token(&self, email: &str, token: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), token.to_string()));
            Ok(())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl ResetTokenSender for FailingSender {
        async fn send_reset_token(&self, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn hasher() -> SecretHasher {
        SecretHasher::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    async fn setup(
        sender: Arc<dyn ResetTokenSender>,
    ) -> (Arc<MemoryStore>, Arc<ManualClock>, PasswordResetFlow) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        store
            .register_user(
                CreateUser {
                    email: "known@x.com".into(),
                    password_hash: hasher().hash("oldpass123").unwrap(),
                    name: None,
                    is_super_admin: false,
                },
                "AtlasCRM",
                clock.now(),
            )
            .await
            .unwrap();
        let flow = PasswordResetFlow::new(
            store.clone(),
            clock.clone(),
            hasher(),
            sender,
            Duration::minutes(30),
        );
        (store, clock, flow)
    }

    #[tokio::test]
    async fn test_request_same_message_for_unknown_and_malformed() {
        let sender = Arc::new(CapturingSender::default());
        let (_store, _clock, flow) = setup(sender.clone()).await;

        let known = flow.request("Known@X.com").await.unwrap();
        let unknown = flow.request("nobody@x.com").await.unwrap();
        let malformed = flow.request("not-an-email").await.unwrap();

        assert_eq!(known, unknown);
        assert_eq!(unknown, malformed);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(sender.sent.lock().unwrap()[0].0, "known@x.com");
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_change_response() {
        let (_store, _clock, flow) = setup(Arc::new(FailingSender)).await;
        assert_eq!(
            flow.request("known@x.com").await.unwrap(),
            FORGOT_PASSWORD_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_consume_expired_token() {
        let sender = Arc::new(CapturingSender::default());
        let (_store, clock, flow) = setup(sender.clone()).await;

        flow.request("known@x.com").await.unwrap();
        let token = sender.sent.lock().unwrap()[0].1.clone();

        clock.advance(Duration::minutes(30));
        let err = flow.consume(&token, "newpass123").await.unwrap_err();
        assert!(matches!(err, CredentialError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_consume_rejects_weak_password_before_token() {
        let (_store, _clock, flow) = setup(Arc::new(CapturingSender::default())).await;
        let err = flow.consume("whatever-token", "short").await.unwrap_err();
        assert!(matches!(err, CredentialError::Validation(_)));
    }

    #[tokio::test]
    async fn test_consume_short_token_is_invalid() {
        let (_store, _clock, flow) = setup(Arc::new(CapturingSender::default())).await;
        let err = flow.consume("abc", "newpass123").await.unwrap_err();
        assert!(matches!(err, CredentialError::InvalidOrExpiredToken));
    }
}
