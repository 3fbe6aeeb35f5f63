/// Common test utilities for HTTP tests
///
/// Builds the full router over an in-memory store and a manual clock, and
/// provides a small request helper that returns status, headers and JSON.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use atlascrm_api::app::{build_router, AppState};
use atlascrm_api::config::Config;
use atlascrm_shared::auth::reset::ResetTokenSender;
use atlascrm_shared::auth::service::{AuthService, SeedUserRequest};
use atlascrm_shared::clock::ManualClock;
use atlascrm_shared::models::membership::MembershipRole;
use atlascrm_shared::store::MemoryStore;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use tower::Service as _;

/// Reset tokens "sent" during a test
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    pub fn last_token(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl ResetTokenSender for Outbox {
    async fn send_reset_token(&self, email: &str, token: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), token.to_string()));
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// `name=value` pair of the session cookie set by this response
    pub fn session_cookie(&self) -> String {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("response sets a session cookie")
            .to_string()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Test context containing the router and its backing services
pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub outbox: Arc<Outbox>,
}

impl TestContext {
    pub fn new() -> Self {
        let config = Config::from_lookup(|key: &str| match key {
            "DATABASE_URL" => Some("postgresql://unused/atlascrm_test".to_string()),
            "PASSWORD_HASH_MEMORY_KIB" => Some("1024".to_string()),
            "PASSWORD_HASH_ITERATIONS" => Some("1".to_string()),
            "PASSWORD_HASH_PARALLELISM" => Some("1".to_string()),
            _ => None,
        })
        .expect("test config");

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let outbox = Arc::new(Outbox::default());

        let auth = AuthService::new(store.clone(), clock.clone(), outbox.clone(), config.auth_config())
            .expect("auth service");
        let state = AppState::new(auth, config);

        TestContext {
            app: build_router(state.clone()),
            state,
            store,
            clock,
            outbox,
        }
    }

    /// Sends a request; `cookie` is a `name=value` pair
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, None, cookie).await
    }

    /// Registers an account and returns its session cookie
    pub async fn register(&self, email: &str, password: &str) -> String {
        let response = self
            .post(
                "/v1/auth/register",
                serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.json);
        response.session_cookie()
    }

    /// Seeds an ADMIN of the default tenant and returns their session cookie
    pub async fn admin_session(&self, email: &str, super_admin: bool) -> String {
        self.state
            .auth
            .seed_user(SeedUserRequest {
                email: email.to_string(),
                password: "correct-horse-battery".to_string(),
                name: None,
                role: MembershipRole::Admin,
                organization_name: "AtlasCRM".to_string(),
                super_admin,
            })
            .await
            .expect("seed admin");

        let response = self
            .post(
                "/v1/auth/login",
                serde_json::json!({ "email": email, "password": "correct-horse-battery" }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        response.session_cookie()
    }
}
