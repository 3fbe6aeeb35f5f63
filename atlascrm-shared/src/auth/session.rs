/// Cookie session store
///
/// Issues opaque session tokens and resolves them back to users. Only the
/// SHA-256 digest of a token is persisted; expired sessions are deleted
/// lazily on the first lookup after expiry.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use atlascrm_shared::auth::session::SessionStore;
/// use atlascrm_shared::clock::ManualClock;
/// use atlascrm_shared::models::user::CreateUser;
/// use atlascrm_shared::store::{CredentialStore, MemoryStore};
/// use chrono::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let clock = Arc::new(ManualClock::starting_now());
/// let sessions = SessionStore::new(store.clone(), clock.clone(), Duration::days(30));
///
/// let (user, _) = store
///     .register_user(
///         CreateUser {
///             email: "ada@example.com".into(),
///             password_hash: "x".into(),
///             name: None,
///             is_super_admin: false,
///         },
///         "AtlasCRM",
///         chrono::Utc::now(),
///     )
///     .await?;
///
/// let issued = sessions.create(user.id).await?;
/// assert!(sessions.resolve(&issued.token).await?.is_some());
///
/// clock.advance(Duration::days(31));
/// assert!(sessions.resolve(&issued.token).await?.is_none());
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::token::{digest, generate_token};
use crate::clock::Clock;
use crate::store::{CredentialStore, StoreResult};

/// Default session lifetime
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

/// A freshly issued session; `token` goes into the cookie and nowhere else
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The user behind a valid session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_super_admin: bool,
}

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Starts a session for `user_id`
    pub async fn create(&self, user_id: Uuid) -> StoreResult<IssuedSession> {
        let now = self.clock.now();
        let token = generate_token();
        let expires_at = now + self.ttl;

        self.store
            .insert_session(&digest(&token), user_id, expires_at, now)
            .await?;

        debug!(user_id = %user_id, expires_at = %expires_at, "Session created");
        Ok(IssuedSession { token, expires_at })
    }

    /// Resolves a cookie token to its user
    ///
    /// Unknown tokens and sessions whose user is gone give `None`. An expired
    /// session is deleted before returning `None`.
    pub async fn resolve(&self, token: &str) -> StoreResult<Option<SessionUser>> {
        if token.is_empty() {
            return Ok(None);
        }

        let token_hash = digest(token);
        let Some(session) = self.store.find_session(&token_hash).await? else {
            return Ok(None);
        };

        if session.is_expired(self.clock.now()) {
            self.store.delete_session(&token_hash).await?;
            debug!(user_id = %session.user_id, "Expired session removed");
            return Ok(None);
        }

        let user = self.store.find_user_by_id(session.user_id).await?;
        Ok(user.map(|user| SessionUser {
            user_id: user.id,
            email: user.email,
            name: user.name,
            is_super_admin: user.is_super_admin,
        }))
    }

    /// Deletes the session behind `token`; unknown tokens are ignored
    pub async fn revoke(&self, token: &str) -> StoreResult<()> {
        if token.is_empty() {
            return Ok(());
        }

        self.store.delete_session(&digest(token)).await?;
        Ok(())
    }

    /// Deletes every session of a user
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let revoked = self.store.delete_user_sessions(user_id).await?;
        debug!(user_id = %user_id, revoked, "Revoked all sessions");
        Ok(revoked)
    }
}
