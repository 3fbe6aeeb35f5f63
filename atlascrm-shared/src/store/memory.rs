//! In-memory credential store
//!
//! All tables sit behind one async mutex and every trait method holds it for
//! its whole body, which gives each composite operation the same
//! all-or-nothing visibility a transaction gives the Postgres store. Used by
//! tests and for running the API without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CredentialStore, IssueActivationCode, IssuedCodeRecord, Redemption, SeededUser, StoreError,
    StoreResult,
};
use crate::models::activation_code::ActivationCode;
use crate::models::audit_event::AuditEvent;
use crate::models::membership::{Membership, MembershipRole, MembershipStatus};
use crate::models::password_reset_token::PasswordResetToken;
use crate::models::session::Session;
use crate::models::tenant::{Tenant, DEFAULT_TENANT_ID};
use crate::models::user::{normalize_email, CreateUser, User};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tenants: HashMap<Uuid, Tenant>,
    memberships: Vec<Membership>,
    sessions: HashMap<String, Session>,
    reset_tokens: Vec<PasswordResetToken>,
    activation_codes: Vec<ActivationCode>,
    audit_events: Vec<AuditEvent>,
}

impl Tables {
    fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = normalize_email(email);
        self.users.values().find(|u| u.email == email)
    }

    fn insert_user(&mut self, data: CreateUser, now: DateTime<Utc>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(&data.email),
            password_hash: data.password_hash,
            name: data.name,
            is_super_admin: data.is_super_admin,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        self.users.insert(user.id, user.clone());
        user
    }

    fn insert_tenant(&mut self, id: Uuid, name: &str, now: DateTime<Utc>) -> Tenant {
        let tenant = Tenant {
            id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tenants.insert(id, tenant.clone());
        tenant
    }

    fn ensure_default_tenant(&mut self, name: &str, now: DateTime<Utc>) -> Tenant {
        match self.tenants.get(&DEFAULT_TENANT_ID) {
            Some(tenant) => tenant.clone(),
            None => self.insert_tenant(DEFAULT_TENANT_ID, name, now),
        }
    }

    fn upsert_membership(
        &mut self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
        status: MembershipStatus,
        now: DateTime<Utc>,
    ) -> Membership {
        if let Some(existing) = self
            .memberships
            .iter_mut()
            .find(|m| m.tenant_id == tenant_id && m.user_id == user_id)
        {
            existing.role = role;
            existing.status = status;
            existing.updated_at = now;
            return existing.clone();
        }

        let membership = Membership {
            tenant_id,
            user_id,
            role,
            status,
            created_at: now,
            updated_at: now,
        };
        self.memberships.push(membership.clone());
        membership
    }

    /// Insertion order stands in for `ORDER BY created_at`
    fn first_membership(&self, user_id: Uuid, pred: impl Fn(&Membership) -> bool) -> Option<Membership> {
        self.memberships
            .iter()
            .find(|m| m.user_id == user_id && pred(m))
            .cloned()
    }
}

/// Credential store kept entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every audit event, oldest first
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.tables.lock().await.audit_events.clone()
    }

    /// Every reset token of a user, oldest first
    pub async fn reset_tokens_for_user(&self, user_id: Uuid) -> Vec<PasswordResetToken> {
        self.tables
            .lock()
            .await
            .reset_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Looks up a code by digest without changing it
    pub async fn activation_code(&self, code_hash: &str) -> Option<ActivationCode> {
        self.tables
            .lock()
            .await
            .activation_codes
            .iter()
            .find(|c| c.code_hash == code_hash)
            .cloned()
    }

    /// All memberships of a user
    pub async fn memberships_for_user(&self, user_id: Uuid) -> Vec<Membership> {
        self.tables
            .lock()
            .await
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Overwrites one membership directly
    pub async fn put_membership(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
        status: MembershipStatus,
    ) -> Membership {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        if !tables.tenants.contains_key(&tenant_id) {
            tables.insert_tenant(tenant_id, "Fixture", now);
        }
        tables.upsert_membership(tenant_id, user_id, role, status, now)
    }

    /// Number of stored sessions, expired ones included
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.user_by_email(email).cloned())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.tables.lock().await.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn register_user(
        &self,
        user: CreateUser,
        default_tenant_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<(User, Membership)> {
        let mut tables = self.tables.lock().await;

        if tables.user_by_email(&user.email).is_some() {
            return Err(StoreError::Conflict("user email"));
        }

        let user = tables.insert_user(user, now);
        tables.ensure_default_tenant(default_tenant_name, now);
        let membership = tables.upsert_membership(
            DEFAULT_TENANT_ID,
            user.id,
            MembershipRole::User,
            MembershipStatus::Active,
            now,
        );

        Ok((user, membership))
    }

    async fn seed_user(
        &self,
        user: CreateUser,
        role: MembershipRole,
        organization_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<SeededUser> {
        let mut tables = self.tables.lock().await;

        let tenant = match tables.tenants.get_mut(&DEFAULT_TENANT_ID) {
            Some(tenant) => {
                tenant.name = organization_name.to_string();
                tenant.updated_at = now;
                tenant.clone()
            }
            None => tables.insert_tenant(DEFAULT_TENANT_ID, organization_name, now),
        };

        let existing_id = tables.user_by_email(&user.email).map(|u| u.id);
        let user = match existing_id.and_then(|id| tables.users.get_mut(&id)) {
            Some(existing) => {
                existing.password_hash = user.password_hash;
                if user.name.is_some() {
                    existing.name = user.name;
                }
                existing.is_super_admin = user.is_super_admin;
                existing.updated_at = now;
                existing.clone()
            }
            None => tables.insert_user(user, now),
        };

        let membership =
            tables.upsert_membership(tenant.id, user.id, role, MembershipStatus::Active, now);

        Ok(SeededUser {
            user,
            tenant,
            membership,
        })
    }

    async fn find_privileged_membership(&self, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(self
            .tables
            .lock()
            .await
            .first_membership(user_id, |m| m.is_active() && m.role.is_admin_tier()))
    }

    async fn find_active_membership(&self, user_id: Uuid) -> StoreResult<Option<Membership>> {
        Ok(self
            .tables
            .lock()
            .await
            .first_membership(user_id, Membership::is_active))
    }

    async fn ensure_default_membership(
        &self,
        user_id: Uuid,
        default_tenant_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Membership> {
        let mut tables = self.tables.lock().await;

        tables.ensure_default_tenant(default_tenant_name, now);
        if let Some(existing) = tables.first_membership(user_id, |m| m.tenant_id == DEFAULT_TENANT_ID) {
            return Ok(existing);
        }

        Ok(tables.upsert_membership(
            DEFAULT_TENANT_ID,
            user_id,
            MembershipRole::User,
            MembershipStatus::Active,
            now,
        ))
    }

    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(self.tables.lock().await.tenants.get(&id).cloned())
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut tables = self.tables.lock().await;

        if tables.sessions.contains_key(token_hash) {
            return Err(StoreError::Conflict("session token"));
        }

        let session = Session {
            id: Uuid::new_v4(),
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            created_at: now,
        };
        tables.sessions.insert(token_hash.to_string(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.tables.lock().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.tables.lock().await.sessions.remove(token_hash).is_some())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<PasswordResetToken> {
        let mut tables = self.tables.lock().await;

        if tables.reset_tokens.iter().any(|t| t.token_hash == token_hash) {
            return Err(StoreError::Conflict("reset token"));
        }

        for token in tables
            .reset_tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && t.used_at.is_none())
        {
            token.used_at = Some(now);
        }

        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            used_at: None,
            created_at: now,
        };
        tables.reset_tokens.push(token.clone());
        Ok(token)
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Uuid>> {
        let mut tables = self.tables.lock().await;

        let Some(index) = tables
            .reset_tokens
            .iter()
            .position(|t| t.token_hash == token_hash && t.is_usable(now))
        else {
            return Ok(None);
        };
        let user_id = tables.reset_tokens[index].user_id;

        let Some(user) = tables.users.get_mut(&user_id) else {
            return Err(StoreError::NotFound("user"));
        };
        user.password_hash = new_password_hash.to_string();
        user.updated_at = now;

        tables.reset_tokens[index].used_at = Some(now);
        tables.sessions.retain(|_, s| s.user_id != user_id);

        Ok(Some(user_id))
    }

    async fn issue_activation_code(
        &self,
        issue: IssueActivationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<IssuedCodeRecord> {
        let mut tables = self.tables.lock().await;

        if tables
            .activation_codes
            .iter()
            .any(|c| c.code_hash == issue.code_hash)
        {
            return Err(StoreError::Conflict("activation code"));
        }

        let tenant = tables.insert_tenant(Uuid::new_v4(), &issue.tenant_name, now);
        let code = ActivationCode {
            id: Uuid::new_v4(),
            code_hash: issue.code_hash,
            kind: issue.kind,
            email: normalize_email(&issue.email),
            tenant_id: tenant.id,
            expires_at: issue.expires_at,
            redeemed_at: None,
            redeemed_by: None,
            created_at: now,
        };
        tables.activation_codes.push(code.clone());
        tables.audit_events.push(AuditEvent {
            id: Uuid::new_v4(),
            kind: issue.audit_kind,
            email: normalize_email(&issue.email),
            tenant_id: Some(tenant.id),
            detail: issue.audit_detail,
            ip_hash: issue.ip_hash,
            user_agent: issue.user_agent,
            created_at: now,
        });

        Ok(IssuedCodeRecord { tenant, code })
    }

    async fn redeem_activation_code(
        &self,
        code_hash: &str,
        placeholder_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Redemption>> {
        let mut tables = self.tables.lock().await;

        let Some(index) = tables
            .activation_codes
            .iter()
            .position(|c| c.code_hash == code_hash && c.is_redeemable(now))
        else {
            return Ok(None);
        };
        let email = tables.activation_codes[index].email.clone();

        let existing_id = tables.user_by_email(&email).map(|u| u.id);
        let user_created = existing_id.is_none();
        let user = match existing_id.and_then(|id| tables.users.get_mut(&id)) {
            Some(existing) => {
                existing.last_login_at = Some(now);
                existing.clone()
            }
            None => {
                let mut created = tables.insert_user(
                    CreateUser {
                        email,
                        password_hash: placeholder_hash.to_string(),
                        name: None,
                        is_super_admin: false,
                    },
                    now,
                );
                created.last_login_at = Some(now);
                tables.users.insert(created.id, created.clone());
                created
            }
        };

        let code = {
            let code = &mut tables.activation_codes[index];
            code.redeemed_at = Some(now);
            code.redeemed_by = Some(user.id);
            code.clone()
        };
        let membership = tables.upsert_membership(
            code.tenant_id,
            user.id,
            code.kind.granted_role(),
            MembershipStatus::Active,
            now,
        );

        Ok(Some(Redemption {
            user,
            code,
            membership,
            user_created,
        }))
    }

    async fn audit_events_for_tenant(&self, tenant_id: Uuid) -> StoreResult<Vec<AuditEvent>> {
        Ok(self
            .tables
            .lock()
            .await
            .audit_events
            .iter()
            .filter(|e| e.tenant_id == Some(tenant_id))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activation_code::ActivationCodeKind;
    use crate::models::audit_event::AuditEventKind;
    use chrono::Duration;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: None,
            is_super_admin: false,
        }
    }

    #[tokio::test]
    async fn test_register_conflict_is_case_insensitive() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .register_user(new_user("Ada@X.com"), "AtlasCRM", now)
            .await
            .unwrap();
        let err = store
            .register_user(new_user(" ada@x.COM "), "AtlasCRM", now)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_consume_reset_token_marks_used_and_rotates() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (user, _) = store
            .register_user(new_user("a@x.com"), "AtlasCRM", now)
            .await
            .unwrap();
        store
            .insert_session("s1", user.id, now + Duration::days(30), now)
            .await
            .unwrap();
        store
            .replace_reset_token(user.id, "t1", now + Duration::minutes(30), now)
            .await
            .unwrap();

        let consumed = store.consume_reset_token("t1", "new-hash", now).await.unwrap();
        assert_eq!(consumed, Some(user.id));
        assert_eq!(store.session_count().await, 0);
        assert_eq!(
            store.find_user_by_id(user.id).await.unwrap().unwrap().password_hash,
            "new-hash"
        );

        let again = store.consume_reset_token("t1", "other", now).await.unwrap();
        assert_eq!(again, None);
    }

    #[tokio::test]
    async fn test_redeem_touches_existing_user() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (user, _) = store
            .register_user(new_user("buyer@x.com"), "AtlasCRM", now)
            .await
            .unwrap();

        store
            .issue_activation_code(
                IssueActivationCode {
                    kind: ActivationCodeKind::Paid,
                    code_hash: "c1".to_string(),
                    email: "buyer@x.com".to_string(),
                    tenant_name: "Acme".to_string(),
                    expires_at: now + Duration::hours(72),
                    audit_kind: AuditEventKind::PaidCodeIssued,
                    audit_detail: "sale approved".to_string(),
                    ip_hash: None,
                    user_agent: None,
                },
                now,
            )
            .await
            .unwrap();

        let redemption = store
            .redeem_activation_code("c1", "placeholder", now)
            .await
            .unwrap()
            .unwrap();

        assert!(!redemption.user_created);
        assert_eq!(redemption.user.id, user.id);
        assert_eq!(redemption.user.password_hash, "hash");
        assert_eq!(redemption.user.last_login_at, Some(now));
        assert_eq!(redemption.membership.role, MembershipRole::Admin);
        assert_eq!(redemption.code.redeemed_by, Some(user.id));
    }
}
