/// Activation code endpoints
///
/// - `POST /v1/admin/activation-codes` - Issue a PAID code (admin-tier only)
/// - `POST /v1/demo-requests` - Public demo form; issues a DEMO code
///
/// Form-style inputs are accepted leniently: numbers may arrive as JSON
/// numbers or strings, checkboxes as booleans or `"on"`.

use crate::{app::AppState, error::ApiResult, extractors::AdminAccess};
use atlascrm_shared::auth::activation::{DemoOutcome, DemoRequest, IssuedCode, PaidCodeRequest};
use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// PAID code request
#[derive(Debug, Deserialize)]
pub struct IssueCodeRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub organization_name: String,

    /// Hours until expiry, fractions truncated; absent, malformed or
    /// out-of-range means 72
    #[serde(default)]
    pub expires_in_hours: Option<Value>,
}

/// Demo form submission
#[derive(Debug, Deserialize, Validate)]
pub struct DemoRequestBody {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub organization_name: String,

    #[serde(default)]
    pub user_count: Option<Value>,

    #[serde(default)]
    pub accept_terms: Option<Value>,

    #[serde(default)]
    pub accept_kvkk: Option<Value>,

    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub message: Option<String>,

    /// Honeypot
    pub website: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoStatus {
    Issued,
    Received,
}

#[derive(Debug, Serialize)]
pub struct DemoResponse {
    pub status: DemoStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Integer from a JSON number or a numeric string
fn whole_number(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Any number, from a JSON number or a numeric string
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Checkbox state from a boolean or an HTML form value
fn checked(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
        }
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// First address of `X-Forwarded-For`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Issues a PAID activation code
///
/// Non-admin callers are redirected (`303`) to the user dashboard; callers
/// without a session to the login page.
///
/// # Response
///
/// ```json
/// { "activation_code": "K7QM-3XRA-9PZT-W4HC", "expires_at": "...", "tenant_id": "..." }
/// ```
pub async fn issue_paid_code(
    State(state): State<AppState>,
    AdminAccess(ctx): AdminAccess,
    Json(req): Json<IssueCodeRequest>,
) -> ApiResult<Json<IssuedCode>> {
    let issued = state
        .auth
        .issue_paid_code(
            &ctx,
            PaidCodeRequest {
                email: req.email,
                organization_name: req.organization_name,
                expires_in_hours: number(req.expires_in_hours.as_ref()),
            },
        )
        .await?;

    Ok(Json(issued))
}

/// Handles the public demo form
///
/// A filled honeypot gets a `received` answer and nothing is stored.
pub async fn request_demo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DemoRequestBody>,
) -> ApiResult<Json<DemoResponse>> {
    body.validate()?;

    let outcome = state
        .auth
        .request_demo(DemoRequest {
            name: body.name,
            email: body.email,
            organization_name: body.organization_name,
            user_count: whole_number(body.user_count.as_ref()),
            accept_terms: checked(body.accept_terms.as_ref()),
            accept_kvkk: checked(body.accept_kvkk.as_ref()),
            message: body.message,
            website: body.website,
            client_ip: client_ip(&headers),
            user_agent: user_agent(&headers),
        })
        .await?;

    Ok(Json(match outcome {
        DemoOutcome::Issued(issued) => DemoResponse {
            status: DemoStatus::Issued,
            activation_code: Some(issued.activation_code),
            expires_at: Some(issued.expires_at),
        },
        DemoOutcome::Discarded => DemoResponse {
            status: DemoStatus::Received,
            activation_code: None,
            expires_at: None,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_whole_number() {
        assert_eq!(whole_number(Some(&json!(12))), Some(12));
        assert_eq!(whole_number(Some(&json!(" 48 "))), Some(48));
        assert_eq!(whole_number(Some(&json!(5.0))), Some(5));
        assert_eq!(whole_number(Some(&json!(5.5))), None);
        assert_eq!(whole_number(Some(&json!("twelve"))), None);
        assert_eq!(whole_number(Some(&Value::Null)), None);
        assert_eq!(whole_number(None), None);
    }

    #[test]
    fn test_number() {
        assert_eq!(number(Some(&json!(48))), Some(48.0));
        assert_eq!(number(Some(&json!(1.5))), Some(1.5));
        assert_eq!(number(Some(&json!(" 1.5 "))), Some(1.5));
        assert_eq!(number(Some(&json!("soon"))), None);
        assert_eq!(number(None), None);
    }

    #[test]
    fn test_checked() {
        assert!(checked(Some(&json!(true))));
        assert!(checked(Some(&json!("on"))));
        assert!(!checked(Some(&json!(false))));
        assert!(!checked(Some(&json!(""))));
        assert!(!checked(None));
    }

    #[test]
    fn test_client_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }
}
