/// Authentication service
///
/// One entry point per user-facing credential operation. Composes the secret
/// hasher, session store, reset flow, activation registry and access
/// resolver over a single [`CredentialStore`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use atlascrm_shared::auth::password::HashParams;
/// use atlascrm_shared::auth::reset::LogResetTokenSender;
/// use atlascrm_shared::auth::service::{AuthConfig, AuthService};
/// use atlascrm_shared::clock::SystemClock;
/// use atlascrm_shared::store::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AuthConfig {
///     hash_params: HashParams { memory_kib: 1024, iterations: 1, parallelism: 1 },
///     ..AuthConfig::default()
/// };
/// let auth = AuthService::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(SystemClock),
///     Arc::new(LogResetTokenSender::new(false)),
///     config,
/// )?;
///
/// let registered = auth.register("ada@example.com", "atlas2024", None).await?;
/// assert_eq!(registered.redirect_to, "/app/dashboard");
///
/// let signed_in = auth.login("ADA@example.com ", "atlas2024").await?;
/// let ctx = auth.authenticate(&signed_in.session.token).await?.expect("session");
/// assert_eq!(ctx.user.email, "ada@example.com");
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use super::activation::{
    ActivationCodeRegistry, DemoOutcome, DemoRequest, IssuedCode, PaidCodeRequest,
};
use super::authorization::{AccessContext, AccessResolver};
use super::password::{validate_password_strength, HashParams, PasswordError, SecretHasher};
use super::reset::{
    PasswordResetFlow, ResetTokenSender, DEFAULT_RESET_TOKEN_TTL_MINUTES,
};
use super::session::{IssuedSession, SessionStore, DEFAULT_SESSION_TTL_DAYS};
use crate::clock::Clock;
use crate::error::{CredentialError, FieldError};
use crate::models::membership::MembershipRole;
use crate::models::user::{normalize_email, CreateUser};
use crate::store::{CredentialStore, SeededUser, StoreError, StoreResult};

/// Minimum password length for administratively seeded accounts
pub const SEED_PASSWORD_MIN_LENGTH: usize = 12;

pub const DEFAULT_TENANT_NAME: &str = "AtlasCRM";

/// Compared against when the email is unknown, so that unknown emails cost
/// one verification like known ones do
const TIMING_DUMMY_SECRET: &str = "atlascrm-timing-equalizer";

/// Tunables of the credential subsystem
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub hash_params: HashParams,

    /// Name given to the default tenant when it is first created
    pub default_tenant_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            reset_token_ttl: Duration::minutes(DEFAULT_RESET_TOKEN_TTL_MINUTES),
            hash_params: HashParams::default(),
            default_tenant_name: DEFAULT_TENANT_NAME.to_string(),
        }
    }
}

/// Outcome of any operation that starts a session
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user_id: Uuid,
    pub session: IssuedSession,

    /// Role-dependent landing page
    pub redirect_to: &'static str,
}

/// Input for administrative seeding
#[derive(Debug, Clone)]
pub struct SeedUserRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: MembershipRole,
    pub organization_name: String,
    pub super_admin: bool,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    hasher: SecretHasher,
    sessions: SessionStore,
    resets: PasswordResetFlow,
    codes: ActivationCodeRegistry,
    access: AccessResolver,
    config: AuthConfig,
    dummy_hash: String,
}

fn email_errors(email: &str) -> Option<FieldError> {
    if email.len() > 254 || !email.validate_email() {
        Some(FieldError::new("email", "Enter a valid email address."))
    } else {
        None
    }
}

impl AuthService {
    /// Builds the service
    ///
    /// # Errors
    ///
    /// Fails if the configured hash parameters are rejected by Argon2.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn ResetTokenSender>,
        config: AuthConfig,
    ) -> Result<Self, PasswordError> {
        let hasher = SecretHasher::new(config.hash_params);
        hasher.validate_params()?;
        let dummy_hash = hasher.hash(TIMING_DUMMY_SECRET)?;

        Ok(Self {
            sessions: SessionStore::new(store.clone(), clock.clone(), config.session_ttl),
            resets: PasswordResetFlow::new(
                store.clone(),
                clock.clone(),
                hasher,
                sender,
                config.reset_token_ttl,
            ),
            codes: ActivationCodeRegistry::new(store.clone(), clock.clone(), hasher),
            access: AccessResolver::new(
                store.clone(),
                clock.clone(),
                config.default_tenant_name.clone(),
            ),
            store,
            clock,
            hasher,
            config,
            dummy_hash,
        })
    }

    async fn start_session(&self, user_id: Uuid) -> Result<SignedIn, CredentialError> {
        let session = self.sessions.create(user_id).await?;
        let redirect_to = self.access.post_auth_redirect(user_id).await?;
        Ok(SignedIn {
            user_id,
            session,
            redirect_to,
        })
    }

    /// Signs in with email and password
    ///
    /// # Errors
    ///
    /// `AuthenticationFailure` for an unknown email and for a wrong password;
    /// the two are indistinguishable by message and by timing.
    pub async fn login(&self, email: &str, password: &str) -> Result<SignedIn, CredentialError> {
        let email = normalize_email(email);
        let user = if email.is_empty() {
            None
        } else {
            self.store.find_user_by_email(&email).await?
        };

        let stored_hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |u| u.password_hash.clone());
        let verified = self
            .hasher
            .verify_blocking(password.to_string(), stored_hash)
            .await;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                warn!("Failed login attempt");
                return Err(CredentialError::AuthenticationFailure);
            }
        };

        self.store.record_login(user.id, self.clock.now()).await?;
        let signed_in = self.start_session(user.id).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(signed_in)
    }

    /// Creates an account in the default tenant and signs it in
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed email or a weak password
    /// - `EmailTaken` if the email is already registered
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<SignedIn, CredentialError> {
        let email = normalize_email(email);

        let mut errors: Vec<FieldError> = email_errors(&email).into_iter().collect();
        if let Err(message) = validate_password_strength(password) {
            errors.push(FieldError::new("password", message));
        }
        if !errors.is_empty() {
            return Err(CredentialError::Validation(errors));
        }

        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let (user, _membership) = self
            .store
            .register_user(
                CreateUser {
                    email,
                    password_hash,
                    name,
                    is_super_admin: false,
                },
                &self.config.default_tenant_name,
                self.clock.now(),
            )
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => CredentialError::EmailTaken,
                other => other.into(),
            })?;

        info!(user_id = %user.id, "User registered");
        self.start_session(user.id).await
    }

    /// Ends the session behind `token`, if any
    pub async fn logout(&self, token: Option<&str>) -> StoreResult<()> {
        if let Some(token) = token {
            self.sessions.revoke(token).await?;
        }
        Ok(())
    }

    /// Starts a password reset; always returns the same message
    pub async fn forgot_password(&self, email: &str) -> Result<&'static str, CredentialError> {
        self.resets.request(email).await
    }

    /// Completes a password reset
    ///
    /// # Errors
    ///
    /// - `Validation` if the passwords differ or are weak
    /// - `InvalidOrExpiredToken` for an unusable token
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), CredentialError> {
        if new_password != confirm_password {
            return Err(CredentialError::field(
                "confirm_password",
                "Passwords do not match.",
            ));
        }

        self.resets.consume(token, new_password).await
    }

    /// Redeems an activation code and signs its user in
    pub async fn redeem_code(&self, code: &str) -> Result<SignedIn, CredentialError> {
        let redeemed = self.codes.redeem(code).await?;
        self.start_session(redeemed.user.id).await
    }

    /// Resolves a session token to the caller's access context
    ///
    /// `None` means the caller is not authenticated.
    pub async fn authenticate(&self, token: &str) -> Result<Option<AccessContext>, CredentialError> {
        let Some(user) = self.sessions.resolve(token).await? else {
            return Ok(None);
        };

        Ok(Some(self.access.resolve(user).await?))
    }

    /// Issues a PAID code on behalf of an admin-tier caller
    pub async fn issue_paid_code(
        &self,
        ctx: &AccessContext,
        request: PaidCodeRequest,
    ) -> Result<IssuedCode, CredentialError> {
        self.codes.issue_paid(ctx, request).await
    }

    /// Handles a public demo request
    pub async fn request_demo(&self, request: DemoRequest) -> Result<DemoOutcome, CredentialError> {
        self.codes.issue_demo(request).await
    }

    /// Landing page for a user after authentication
    pub async fn post_auth_redirect(&self, user_id: Uuid) -> StoreResult<&'static str> {
        self.access.post_auth_redirect(user_id).await
    }

    /// Creates or overwrites an account from the command line
    ///
    /// Unlike registration, an existing account is updated in place: new
    /// password hash, super-admin flag, and role in the default tenant, which
    /// is renamed to `organization_name`.
    pub async fn seed_user(&self, request: SeedUserRequest) -> Result<SeededUser, CredentialError> {
        let email = normalize_email(&request.email);
        let organization_name = request.organization_name.trim().to_string();

        let mut errors: Vec<FieldError> = email_errors(&email).into_iter().collect();
        if request.password.chars().count() < SEED_PASSWORD_MIN_LENGTH {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 12 characters.",
            ));
        }
        if organization_name.chars().count() < 2 {
            errors.push(FieldError::new(
                "organization",
                "Organization name must be at least 2 characters.",
            ));
        }
        if !errors.is_empty() {
            return Err(CredentialError::Validation(errors));
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;
        let seeded = self
            .store
            .seed_user(
                CreateUser {
                    email,
                    password_hash,
                    name: request.name,
                    is_super_admin: request.super_admin,
                },
                request.role,
                &organization_name,
                self.clock.now(),
            )
            .await?;

        info!(
            user_id = %seeded.user.id,
            tenant_id = %seeded.tenant.id,
            role = %seeded.membership.role,
            super_admin = seeded.user.is_super_admin,
            "User seeded"
        );
        Ok(seeded)
    }

    /// Checks the backing store
    pub async fn health_check(&self) -> StoreResult<()> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::reset::LogResetTokenSender;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn service() -> (Arc<MemoryStore>, Arc<ManualClock>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let auth = AuthService::new(
            store.clone(),
            clock.clone(),
            Arc::new(LogResetTokenSender::new(false)),
            AuthConfig {
                hash_params: HashParams {
                    memory_kib: 1024,
                    iterations: 1,
                    parallelism: 1,
                },
                ..AuthConfig::default()
            },
        )
        .unwrap();
        (store, clock, auth)
    }

    #[tokio::test]
    async fn test_login_unknown_and_wrong_password_look_the_same() {
        let (_store, _clock, auth) = service();
        auth.register("ada@x.com", "atlas2024", None).await.unwrap();

        let unknown = auth.login("nobody@x.com", "atlas2024").await.unwrap_err();
        let wrong = auth.login("ada@x.com", "atlas2025").await.unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(unknown, CredentialError::AuthenticationFailure));
        assert!(matches!(wrong, CredentialError::AuthenticationFailure));
    }

    #[tokio::test]
    async fn test_login_records_last_login() {
        let (store, clock, auth) = service();
        let registered = auth.register("ada@x.com", "atlas2024", None).await.unwrap();

        auth.login("ada@x.com", "atlas2024").await.unwrap();

        let user = store
            .find_user_by_id(registered.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.last_login_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_register_validation_collects_fields() {
        let (_store, _clock, auth) = service();
        let err = auth.register("bad", "short", None).await.unwrap_err();

        match err {
            CredentialError::Validation(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_twice_is_email_taken() {
        let (_store, _clock, auth) = service();
        auth.register("ada@x.com", "atlas2024", None).await.unwrap();

        let err = auth
            .register(" ADA@x.com", "atlas2024", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::EmailTaken));
    }

    #[tokio::test]
    async fn test_reset_password_mismatch() {
        let (_store, _clock, auth) = service();
        let err = auth
            .reset_password("some-long-token", "atlas2024", "atlas2025")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Validation(_)));
    }

    #[tokio::test]
    async fn test_seed_user_requires_long_password() {
        let (_store, _clock, auth) = service();
        let err = auth
            .seed_user(SeedUserRequest {
                email: "root@x.com".into(),
                password: "atlas2024".into(),
                name: None,
                role: MembershipRole::Admin,
                organization_name: DEFAULT_TENANT_NAME.into(),
                super_admin: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Validation(_)));
    }

    #[tokio::test]
    async fn test_seed_user_overwrites_existing() {
        let (_store, _clock, auth) = service();
        auth.register("root@x.com", "atlas2024", None).await.unwrap();

        let seeded = auth
            .seed_user(SeedUserRequest {
                email: "root@x.com".into(),
                password: "a-much-longer-secret".into(),
                name: Some("Root".into()),
                role: MembershipRole::Admin,
                organization_name: "Atlas HQ".into(),
                super_admin: true,
            })
            .await
            .unwrap();

        assert!(seeded.user.is_super_admin);
        assert_eq!(seeded.tenant.name, "Atlas HQ");
        assert_eq!(seeded.membership.role, MembershipRole::Admin);

        let signed_in = auth.login("root@x.com", "a-much-longer-secret").await.unwrap();
        assert_eq!(signed_in.redirect_to, "/app/admin/dashboard");
        assert!(auth.login("root@x.com", "atlas2024").await.is_err());
    }
}
