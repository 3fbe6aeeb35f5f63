/// Activation code registry
///
/// Issues DEMO and PAID activation codes and redeems them. Each issued code
/// gets a dedicated tenant and an audit event in the same atomic step.
/// Redemption claims the code with a conditional update, so a code is
/// redeemed at most once even under concurrent attempts.
///
/// # Lifecycle
///
/// ```text
/// ISSUED ──redeem──▶ REDEEMED
///    └────time────▶ EXPIRED
/// ```
///
/// # Kinds
///
/// | Kind | Issued by                  | TTL                     | Role granted |
/// |------|----------------------------|-------------------------|--------------|
/// | PAID | admin-tier or super-admin  | 1..=720 h, default 72 h | ADMIN        |
/// | DEMO | public demo form           | 24 h                    | USER         |

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use super::authorization::AccessContext;
use super::password::SecretHasher;
use super::token::{digest, digest_code, generate_activation_code, generate_token, normalize_code};
use crate::clock::Clock;
use crate::error::{CredentialError, FieldError};
use crate::models::activation_code::ActivationCodeKind;
use crate::models::audit_event::AuditEventKind;
use crate::models::membership::Membership;
use crate::models::user::{normalize_email, User};
use crate::store::{CredentialStore, IssueActivationCode};

pub const DEFAULT_PAID_TTL_HOURS: i64 = 72;
pub const MAX_PAID_TTL_HOURS: i64 = 720;
pub const DEMO_TTL_HOURS: i64 = 24;
pub const MAX_DEMO_USER_COUNT: i64 = 10_000;

/// Accepted length of a code as typed, punctuation included
pub const CODE_INPUT_MIN_LENGTH: usize = 8;
pub const CODE_INPUT_MAX_LENGTH: usize = 64;

const EMAIL_MAX_LENGTH: usize = 254;
const ORGANIZATION_MIN_LENGTH: usize = 2;
const ORGANIZATION_MAX_LENGTH: usize = 160;
const NAME_MIN_LENGTH: usize = 2;
const NAME_MAX_LENGTH: usize = 120;

/// Requested PAID lifetime in whole hours
///
/// Any finite value in 1..=720 is accepted and truncated; anything else,
/// or nothing, gives the default.
pub fn paid_ttl_hours(requested: Option<f64>) -> i64 {
    match requested {
        Some(hours) if hours.is_finite() && (1.0..=MAX_PAID_TTL_HOURS as f64).contains(&hours) => {
            hours.trunc() as i64
        }
        _ => DEFAULT_PAID_TTL_HOURS,
    }
}

/// A code as handed to its recipient; the plaintext is never shown again
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    pub activation_code: String,
    pub expires_at: DateTime<Utc>,
    pub tenant_id: Uuid,
}

/// Administrator's request for a PAID code
#[derive(Debug, Clone)]
pub struct PaidCodeRequest {
    pub email: String,
    pub organization_name: String,
    pub expires_in_hours: Option<f64>,
}

/// Public demo form submission
#[derive(Debug, Clone, Default)]
pub struct DemoRequest {
    pub name: String,
    pub email: String,
    pub organization_name: String,

    /// `None` when the submitted value was not a whole number
    pub user_count: Option<i64>,

    pub accept_terms: bool,
    pub accept_kvkk: bool,
    pub message: Option<String>,

    /// Honeypot; humans leave it empty
    pub website: Option<String>,

    /// First address of `X-Forwarded-For`, if any
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a demo form submission
#[derive(Debug, Clone)]
pub enum DemoOutcome {
    Issued(IssuedCode),

    /// Honeypot was filled; nothing was stored
    Discarded,
}

/// A successful redemption
#[derive(Debug, Clone)]
pub struct RedeemedCode {
    pub user: User,
    pub membership: Membership,
    pub kind: ActivationCodeKind,
    pub user_created: bool,
}

/// Everything about a new code except the code itself
struct PendingCode {
    kind: ActivationCodeKind,
    email: String,
    tenant_name: String,
    expires_at: DateTime<Utc>,
    audit_kind: AuditEventKind,
    audit_detail: String,
    ip_hash: Option<String>,
    user_agent: Option<String>,
}

#[derive(Clone)]
pub struct ActivationCodeRegistry {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    hasher: SecretHasher,
}

fn check_length(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
    message: &str,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(FieldError::new(field, message));
    }
}

fn check_email(errors: &mut Vec<FieldError>, email: &str) {
    if email.len() > EMAIL_MAX_LENGTH || !email.validate_email() {
        errors.push(FieldError::new("email", "Enter a valid email address."));
    }
}

impl ActivationCodeRegistry {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, hasher: SecretHasher) -> Self {
        Self {
            store,
            clock,
            hasher,
        }
    }

    /// Issues a PAID code for a new tenant named `organization_name`
    ///
    /// # Errors
    ///
    /// - `AuthorizationFailure` if the caller is not admin-tier
    /// - `Validation` for a bad email or organization name
    pub async fn issue_paid(
        &self,
        ctx: &AccessContext,
        request: PaidCodeRequest,
    ) -> Result<IssuedCode, CredentialError> {
        ctx.require_admin()?;

        let email = normalize_email(&request.email);
        let organization_name = request.organization_name.trim().to_string();

        let mut errors = Vec::new();
        check_email(&mut errors, &email);
        check_length(
            &mut errors,
            "organization_name",
            &organization_name,
            ORGANIZATION_MIN_LENGTH,
            ORGANIZATION_MAX_LENGTH,
            "Organization name must be between 2 and 160 characters.",
        );
        if !errors.is_empty() {
            return Err(CredentialError::Validation(errors));
        }

        let now = self.clock.now();
        let expires_at = now + Duration::hours(paid_ttl_hours(request.expires_in_hours));
        let detail = [
            "[Sale: approved]".to_string(),
            format!("[Org: {organization_name}]"),
            "[Kind: PAID]".to_string(),
            format!("[ExpiresAt: {}]", expires_at.to_rfc3339()),
        ]
        .join("\n");

        let issued = self
            .issue(
                PendingCode {
                    kind: ActivationCodeKind::Paid,
                    email,
                    tenant_name: organization_name,
                    expires_at,
                    audit_kind: AuditEventKind::PaidCodeIssued,
                    audit_detail: detail,
                    ip_hash: None,
                    user_agent: None,
                },
                now,
            )
            .await?;

        info!(
            issued_by = %ctx.user.user_id,
            tenant_id = %issued.tenant_id,
            expires_at = %issued.expires_at,
            "PAID activation code issued"
        );
        Ok(issued)
    }

    /// Handles a public demo request
    ///
    /// A filled honeypot returns [`DemoOutcome::Discarded`] before any
    /// validation or storage.
    pub async fn issue_demo(&self, request: DemoRequest) -> Result<DemoOutcome, CredentialError> {
        if request
            .website
            .as_deref()
            .is_some_and(|w| !w.trim().is_empty())
        {
            warn!("Demo request discarded by honeypot");
            return Ok(DemoOutcome::Discarded);
        }

        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);
        let organization_name = request.organization_name.trim().to_string();

        let mut errors = Vec::new();
        check_length(
            &mut errors,
            "name",
            &name,
            NAME_MIN_LENGTH,
            NAME_MAX_LENGTH,
            "Name must be between 2 and 120 characters.",
        );
        check_email(&mut errors, &email);
        if !request.accept_terms {
            errors.push(FieldError::new(
                "accept_terms",
                "The terms of use must be accepted for a demo.",
            ));
        }
        if !request.accept_kvkk {
            errors.push(FieldError::new(
                "accept_kvkk",
                "The data protection notice must be accepted for a demo.",
            ));
        }
        check_length(
            &mut errors,
            "organization_name",
            &organization_name,
            ORGANIZATION_MIN_LENGTH,
            ORGANIZATION_MAX_LENGTH,
            "Organization name must be between 2 and 160 characters.",
        );
        let user_count = match request.user_count {
            Some(n) if (1..=MAX_DEMO_USER_COUNT).contains(&n) => n,
            _ => {
                errors.push(FieldError::new(
                    "user_count",
                    "User count must be a whole number between 1 and 10000.",
                ));
                0
            }
        };
        if !errors.is_empty() {
            return Err(CredentialError::Validation(errors));
        }

        let now = self.clock.now();
        let expires_at = now + Duration::hours(DEMO_TTL_HOURS);

        let mut detail = [
            "[Demo Request]".to_string(),
            format!("[Name: {name}]"),
            format!("[Org: {organization_name}]"),
            format!("[UserCount: {user_count}]"),
            "[Terms: accepted]".to_string(),
            "[KVKK: accepted]".to_string(),
        ]
        .join("\n");
        if let Some(message) = request.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            detail.push_str("\n\n");
            detail.push_str(message);
        }

        let ip_hash = request
            .client_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(digest);

        let issued = self
            .issue(
                PendingCode {
                    kind: ActivationCodeKind::Demo,
                    email,
                    tenant_name: format!("Demo - {organization_name}"),
                    expires_at,
                    audit_kind: AuditEventKind::DemoCodeIssued,
                    audit_detail: detail,
                    ip_hash,
                    user_agent: request.user_agent,
                },
                now,
            )
            .await?;

        info!(
            tenant_id = %issued.tenant_id,
            expires_at = %issued.expires_at,
            "DEMO activation code issued"
        );
        Ok(DemoOutcome::Issued(issued))
    }

    async fn issue(
        &self,
        pending: PendingCode,
        now: DateTime<Utc>,
    ) -> Result<IssuedCode, CredentialError> {
        let activation_code = generate_activation_code();

        let record = self
            .store
            .issue_activation_code(
                IssueActivationCode {
                    kind: pending.kind,
                    code_hash: digest_code(&activation_code),
                    email: pending.email,
                    tenant_name: pending.tenant_name,
                    expires_at: pending.expires_at,
                    audit_kind: pending.audit_kind,
                    audit_detail: pending.audit_detail,
                    ip_hash: pending.ip_hash,
                    user_agent: pending.user_agent,
                },
                now,
            )
            .await?;

        Ok(IssuedCode {
            activation_code,
            expires_at: record.code.expires_at,
            tenant_id: record.tenant.id,
        })
    }

    /// Redeems a code as typed by the user
    ///
    /// Case and punctuation are ignored. On success the bound user exists
    /// (created with an unusable password if new) and holds an ACTIVE
    /// membership in the code's tenant with the role of the code kind.
    ///
    /// # Errors
    ///
    /// `InvalidOrExpiredCode` for malformed, unknown, redeemed and expired
    /// codes alike.
    pub async fn redeem(&self, code: &str) -> Result<RedeemedCode, CredentialError> {
        let code = code.trim();
        let typed_len = code.chars().count();
        if !(CODE_INPUT_MIN_LENGTH..=CODE_INPUT_MAX_LENGTH).contains(&typed_len)
            || normalize_code(code).is_empty()
        {
            return Err(CredentialError::InvalidOrExpiredCode);
        }

        // New accounts get a password nobody knows
        let placeholder_hash = self.hasher.hash_blocking(generate_token()).await?;

        let redemption = self
            .store
            .redeem_activation_code(&digest_code(code), &placeholder_hash, self.clock.now())
            .await?;

        let Some(redemption) = redemption else {
            warn!("Activation code redemption failed");
            return Err(CredentialError::InvalidOrExpiredCode);
        };

        info!(
            user_id = %redemption.user.id,
            tenant_id = %redemption.code.tenant_id,
            kind = redemption.code.kind.as_str(),
            user_created = redemption.user_created,
            "Activation code redeemed"
        );

        Ok(RedeemedCode {
            user: redemption.user,
            membership: redemption.membership,
            kind: redemption.code.kind,
            user_created: redemption.user_created,
        })
    }
}
