/// Authorization context resolution and tenant scoping
///
/// Every privileged operation receives an explicit [`AccessContext`] resolved
/// from the session user. The context decides two things: the caller's tier
/// and the tenant the caller is confined to.
///
/// # Tiers
///
/// 1. **Super-admin**: `users.is_super_admin`; global scope
/// 2. **Admin**: ACTIVE membership with role ADMIN or MANAGER; scoped to that tenant
/// 3. **User**: any other ACTIVE membership; scoped to that tenant
///
/// A user without any ACTIVE membership is onboarded into the default tenant
/// as USER on first resolution.
///
/// # Example
///
/// ```no_run
/// use atlascrm_shared::auth::authorization::{AccessResolver, TenantScope};
/// use atlascrm_shared::auth::session::SessionUser;
/// use uuid::Uuid;
///
/// # async fn example(resolver: AccessResolver, user: SessionUser, other: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = resolver.resolve(user).await?;
///
/// // Non-super-admins never escape their own tenant
/// match ctx.scope_for(Some(other))? {
///     TenantScope::Global => println!("unscoped"),
///     TenantScope::Tenant(id) => println!("confined to {}", id),
/// }
///
/// ctx.require_admin()?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::session::SessionUser;
use crate::clock::Clock;
use crate::error::{CredentialError, AUTHORIZATION_FAILED_MESSAGE};
use crate::models::membership::MembershipRole;
use crate::store::{CredentialStore, StoreError};

/// Landing page for super-admins and admin-tier members
pub const ADMIN_DASHBOARD_PATH: &str = "/app/admin/dashboard";

/// Landing page for everyone else
pub const USER_DASHBOARD_PATH: &str = "/app/dashboard";

pub const LOGIN_PATH: &str = "/login";

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller lacks the required tier, or has no usable membership
    #[error("{}", AUTHORIZATION_FAILED_MESSAGE)]
    AuthorizationFailure,

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<AuthzError> for CredentialError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::AuthorizationFailure => CredentialError::AuthorizationFailure,
            AuthzError::Store(e) => CredentialError::Store(e),
        }
    }
}

/// Caller tier, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    SuperAdmin,
    Admin,
    User,
}

/// The tenant an operation is confined to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tenant_id", rename_all = "snake_case")]
pub enum TenantScope {
    /// Every tenant (super-admins without a requested tenant)
    Global,

    /// Exactly one tenant
    Tenant(Uuid),
}

/// Resolved identity and entitlements of a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessContext {
    pub user: SessionUser,
    pub tier: AccessTier,

    /// Role in `tenant_id`; `None` for super-admins
    pub role: Option<MembershipRole>,

    /// Home tenant; `None` for super-admins
    pub tenant_id: Option<Uuid>,
}

impl AccessContext {
    pub fn is_super_admin(&self) -> bool {
        self.tier == AccessTier::SuperAdmin
    }

    /// Super-admins and ADMIN/MANAGER members
    pub fn is_admin_tier(&self) -> bool {
        matches!(self.tier, AccessTier::SuperAdmin | AccessTier::Admin)
    }

    /// The tenant an operation may touch
    ///
    /// Super-admins get what they ask for (global when nothing is asked).
    /// Everybody else gets their own tenant whatever they ask for.
    ///
    /// # Errors
    ///
    /// `AuthorizationFailure` for a non-super-admin context without a home
    /// tenant.
    pub fn scope_for(&self, requested: Option<Uuid>) -> Result<TenantScope, AuthzError> {
        match (self.tier, self.tenant_id) {
            (AccessTier::SuperAdmin, _) => {
                Ok(requested.map_or(TenantScope::Global, TenantScope::Tenant))
            }
            (AccessTier::Admin | AccessTier::User, Some(own)) => {
                if requested.is_some_and(|r| r != own) {
                    debug!(user_id = %self.user.user_id, "Requested tenant overridden by own tenant");
                }
                Ok(TenantScope::Tenant(own))
            }
            (AccessTier::Admin | AccessTier::User, None) => {
                warn!(user_id = %self.user.user_id, "Tenant scope denied: no home tenant");
                Err(AuthzError::AuthorizationFailure)
            }
        }
    }

    /// Fails unless the caller is admin-tier or super-admin
    pub fn require_admin(&self) -> Result<(), AuthzError> {
        if self.is_admin_tier() {
            Ok(())
        } else {
            warn!(user_id = %self.user.user_id, "Admin access denied");
            Err(AuthzError::AuthorizationFailure)
        }
    }

    /// Where this caller lands after signing in
    pub fn home_path(&self) -> &'static str {
        if self.is_admin_tier() {
            ADMIN_DASHBOARD_PATH
        } else {
            USER_DASHBOARD_PATH
        }
    }
}

/// Builds [`AccessContext`] values from session users
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    default_tenant_name: String,
}

impl AccessResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        default_tenant_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            default_tenant_name: default_tenant_name.into(),
        }
    }

    /// Resolves the caller's tier and home tenant
    ///
    /// Onboards users without an ACTIVE membership into the default tenant.
    ///
    /// # Errors
    ///
    /// `AuthorizationFailure` when the only membership available is a
    /// suspended one in the default tenant.
    pub async fn resolve(&self, user: SessionUser) -> Result<AccessContext, AuthzError> {
        if user.is_super_admin {
            return Ok(AccessContext {
                user,
                tier: AccessTier::SuperAdmin,
                role: None,
                tenant_id: None,
            });
        }

        if let Some(m) = self.store.find_privileged_membership(user.user_id).await? {
            return Ok(AccessContext {
                user,
                tier: AccessTier::Admin,
                role: Some(m.role),
                tenant_id: Some(m.tenant_id),
            });
        }

        let membership = match self.store.find_active_membership(user.user_id).await? {
            Some(m) => m,
            None => {
                let m = self
                    .store
                    .ensure_default_membership(
                        user.user_id,
                        &self.default_tenant_name,
                        self.clock.now(),
                    )
                    .await?;
                if !m.is_active() {
                    warn!(user_id = %user.user_id, "Suspended in default tenant; access denied");
                    return Err(AuthzError::AuthorizationFailure);
                }
                info!(user_id = %user.user_id, tenant_id = %m.tenant_id, "User onboarded into default tenant");
                m
            }
        };

        Ok(AccessContext {
            user,
            tier: if membership.role.is_admin_tier() {
                AccessTier::Admin
            } else {
                AccessTier::User
            },
            role: Some(membership.role),
            tenant_id: Some(membership.tenant_id),
        })
    }

    /// Landing page after login, registration or code redemption
    ///
    /// Read-only: never onboards. Unknown users land on the user dashboard.
    pub async fn post_auth_redirect(&self, user_id: Uuid) -> Result<&'static str, StoreError> {
        let Some(user) = self.store.find_user_by_id(user_id).await? else {
            return Ok(USER_DASHBOARD_PATH);
        };

        if user.is_super_admin || self.store.find_privileged_membership(user_id).await?.is_some() {
            Ok(ADMIN_DASHBOARD_PATH)
        } else {
            Ok(USER_DASHBOARD_PATH)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tier: AccessTier, tenant_id: Option<Uuid>) -> AccessContext {
        AccessContext {
            user: SessionUser {
                user_id: Uuid::new_v4(),
                email: "u@x.com".to_string(),
                name: None,
                is_super_admin: tier == AccessTier::SuperAdmin,
            },
            tier,
            role: match tier {
                AccessTier::SuperAdmin => None,
                AccessTier::Admin => Some(MembershipRole::Manager),
                AccessTier::User => Some(MembershipRole::User),
            },
            tenant_id,
        }
    }

    #[test]
    fn test_scope_for_confines_non_super_admins() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();

        for tier in [AccessTier::Admin, AccessTier::User] {
            let c = ctx(tier, Some(own));
            assert_eq!(c.scope_for(Some(other)).unwrap(), TenantScope::Tenant(own));
            assert_eq!(c.scope_for(None).unwrap(), TenantScope::Tenant(own));
            assert_eq!(c.scope_for(Some(own)).unwrap(), TenantScope::Tenant(own));
        }
    }

    #[test]
    fn test_scope_for_super_admin_not_confined() {
        let other = Uuid::new_v4();
        let c = ctx(AccessTier::SuperAdmin, None);

        assert_eq!(c.scope_for(Some(other)).unwrap(), TenantScope::Tenant(other));
        assert_eq!(c.scope_for(None).unwrap(), TenantScope::Global);
    }

    #[test]
    fn test_scope_for_without_home_tenant_is_denied() {
        let other = Uuid::new_v4();

        for tier in [AccessTier::Admin, AccessTier::User] {
            let c = ctx(tier, None);
            assert!(matches!(
                c.scope_for(Some(other)),
                Err(AuthzError::AuthorizationFailure)
            ));
            assert!(matches!(
                c.scope_for(None),
                Err(AuthzError::AuthorizationFailure)
            ));
        }
    }

    #[test]
    fn test_require_admin() {
        let t = Some(Uuid::new_v4());
        assert!(ctx(AccessTier::SuperAdmin, None).require_admin().is_ok());
        assert!(ctx(AccessTier::Admin, t).require_admin().is_ok());
        assert!(matches!(
            ctx(AccessTier::User, t).require_admin(),
            Err(AuthzError::AuthorizationFailure)
        ));
    }

    #[test]
    fn test_home_path() {
        let t = Some(Uuid::new_v4());
        assert_eq!(ctx(AccessTier::Admin, t).home_path(), ADMIN_DASHBOARD_PATH);
        assert_eq!(ctx(AccessTier::User, t).home_path(), USER_DASHBOARD_PATH);
    }

    #[test]
    fn test_scope_serializes_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(TenantScope::Tenant(id)).unwrap();
        assert_eq!(json["kind"], "tenant");
        assert_eq!(json["tenant_id"], id.to_string());

        let json = serde_json::to_value(TenantScope::Global).unwrap();
        assert_eq!(json["kind"], "global");
    }
}
