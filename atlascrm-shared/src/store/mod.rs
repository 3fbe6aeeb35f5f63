//! Credential store
//!
//! Every persistent mutation of the credential subsystem goes through
//! [`CredentialStore`]. Methods that touch more than one row are atomic units:
//! the Postgres backend wraps each in a transaction and the memory backend
//! performs each under one lock. Single-use steps (reset token consumption,
//! code redemption) are conditional updates inside those units, so two
//! concurrent callers can never both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::activation_code::{ActivationCode, ActivationCodeKind};
use crate::models::audit_event::{AuditEvent, AuditEventKind};
use crate::models::membership::{Membership, MembershipRole};
use crate::models::password_reset_token::PasswordResetToken;
use crate::models::session::Session;
use crate::models::tenant::Tenant;
use crate::models::user::{CreateUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint was hit
    #[error("record already exists: {0}")]
    Conflict(&'static str),

    /// A row the operation depends on is missing
    #[error("record not found: {0}")]
    NotFound(&'static str),

    /// SQLx error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Input for issuing an activation code together with its tenant and audit event
#[derive(Debug, Clone)]
pub struct IssueActivationCode {
    pub kind: ActivationCodeKind,

    /// Digest of the normalized code
    pub code_hash: String,

    /// Normalized email the code is bound to
    pub email: String,

    /// Name of the tenant created for the code
    pub tenant_name: String,

    pub expires_at: DateTime<Utc>,

    pub audit_kind: AuditEventKind,
    pub audit_detail: String,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a code issuance
#[derive(Debug, Clone)]
pub struct IssuedCodeRecord {
    pub tenant: Tenant,
    pub code: ActivationCode,
}

/// Result of a successful redemption
#[derive(Debug, Clone)]
pub struct Redemption {
    pub user: User,
    pub code: ActivationCode,
    pub membership: Membership,

    /// The user did not exist before this redemption
    pub user_created: bool,
}

/// Result of administrative seeding
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub user: User,
    pub tenant: Tenant,
    pub membership: Membership,
}

/// Persistence for users, tenants, memberships, sessions, reset tokens,
/// activation codes and the issuance audit trail
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by ID
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Find a user by email (normalized by the store)
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Set `last_login_at`
    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Atomically create the user, ensure the default tenant and add an ACTIVE
    /// USER membership there
    ///
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn register_user(
        &self,
        user: CreateUser,
        default_tenant_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<(User, Membership)>;

    /// Atomically upsert the default tenant (renamed to `organization_name`),
    /// the user (with the given hash) and an ACTIVE membership with `role`
    async fn seed_user(
        &self,
        user: CreateUser,
        role: MembershipRole,
        organization_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<SeededUser>;

    /// First ACTIVE membership with role ADMIN or MANAGER
    async fn find_privileged_membership(&self, user_id: Uuid) -> StoreResult<Option<Membership>>;

    /// First ACTIVE membership of any role
    async fn find_active_membership(&self, user_id: Uuid) -> StoreResult<Option<Membership>>;

    /// Atomically ensure the default tenant and an ACTIVE USER membership in it
    ///
    /// An existing membership in the default tenant is returned unchanged.
    async fn ensure_default_membership(
        &self,
        user_id: Uuid,
        default_tenant_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Membership>;

    /// Find a tenant by ID
    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>>;

    /// Store a session digest
    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// Find a session by digest, expired or not
    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;

    /// Delete a session by digest; returns whether one existed
    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool>;

    /// Delete every session of a user
    async fn delete_user_sessions(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Atomically mark all outstanding reset tokens of the user used and
    /// insert a new one
    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<PasswordResetToken>;

    /// Atomically claim a usable reset token, set the user's password hash and
    /// delete all of the user's sessions
    ///
    /// Returns the user id, or `None` when the token is unknown, used or
    /// expired (in which case nothing changed).
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Uuid>>;

    /// Atomically create the tenant, the code and the audit event
    async fn issue_activation_code(
        &self,
        issue: IssueActivationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<IssuedCodeRecord>;

    /// Atomically claim a redeemable code, upsert its user (new users get
    /// `placeholder_hash`), upsert an ACTIVE membership with the role of the
    /// code kind and record `redeemed_by`
    ///
    /// Returns `None` when the code is unknown, redeemed or expired.
    async fn redeem_activation_code(
        &self,
        code_hash: &str,
        placeholder_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Redemption>>;

    /// Audit events recorded for a tenant, oldest first
    async fn audit_events_for_tenant(&self, tenant_id: Uuid) -> StoreResult<Vec<AuditEvent>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> StoreResult<()>;
}
