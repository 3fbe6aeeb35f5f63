/// Session cookie handling
///
/// The session token travels in the `atlascrm_session` cookie:
/// `HttpOnly`, `SameSite=Lax`, `Path=/`, `Secure` in production, and
/// `Expires` at the session's expiry. Logout overwrites it with an empty,
/// already-expired cookie.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

pub const SESSION_COOKIE_NAME: &str = "atlascrm_session";

/// RFC 7231 IMF-fixdate
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

const CLEARED_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

fn with_attributes(pair: String, secure: bool) -> String {
    let mut cookie = format!("{pair}; HttpOnly; SameSite=Lax; Path=/");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    with_attributes(
        format!(
            "{}={}; Expires={}",
            SESSION_COOKIE_NAME,
            token,
            expires_at.format(HTTP_DATE_FORMAT)
        ),
        secure,
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn cleared_session_cookie(secure: bool) -> String {
    with_attributes(
        format!("{SESSION_COOKIE_NAME}=; Max-Age=0; Expires={CLEARED_EXPIRES}"),
        secure,
    )
}

/// Session token from the request's `Cookie` headers, if present and non-empty
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value: &HeaderValue| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE_NAME)?.strip_prefix('='))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_cookie_attributes() {
        let expires = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 0).unwrap();
        let cookie = session_cookie("tok", expires, false);

        assert_eq!(
            cookie,
            "atlascrm_session=tok; Expires=Sun, 09 Mar 2025 14:05:00 GMT; HttpOnly; SameSite=Lax; Path=/"
        );
        assert!(session_cookie("tok", expires, true).ends_with("; Secure"));
    }

    #[test]
    fn test_cleared_cookie() {
        let cookie = cleared_session_cookie(true);
        assert!(cookie.starts_with("atlascrm_session=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn test_session_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; atlascrm_session=abc123; lang=tr"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("atlascrm_session_old=zzz; atlascrm_session="),
        );
        assert_eq!(session_token(&headers), None);
    }
}
