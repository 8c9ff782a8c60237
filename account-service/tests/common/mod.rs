//! Test helpers for account-service integration tests.

#![allow(dead_code)]

use account_service::services::{AccountRepository, InMemoryAccountRepository, TokenSettings};
use account_service::startup::{build_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryAccountRepository>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let repo = Arc::new(InMemoryAccountRepository::new());
        let tokens = TokenSettings::new(
            Secret::new(TEST_SECRET.to_string()),
            chrono::Duration::minutes(15),
        );
        let state = AppState::new(repo.clone() as Arc<dyn AccountRepository>, tokens);

        Self {
            router: build_router(state),
            repo,
        }
    }

    /// Send a request through the router and decode the JSON body (Null when empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn create_account(&self, name: &str, email: &str, password: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/users",
                None,
                Some(serde_json::json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Creates an account and returns a bearer token for it.
    pub async fn token_for(&self, email: &str) -> String {
        self.create_account("Token Holder", email, "longpassword")
            .await;
        let (status, body) = self.login(email, "longpassword").await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}
