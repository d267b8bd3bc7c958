#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use mini_crm_api::config::{AppConfig, StorageBackend};
use mini_crm_api::database::{MemoryStore, Store};
use mini_crm_api::registry::{register_default_models, ModelRegistry};
use mini_crm_api::services::{ensure_admin, UserService};
use mini_crm_api::{app, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin123";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StorageBackend::Memory;
    config.database.url = None;
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.security.jwt_refresh_secret = String::new();
    config.bootstrap.admin_email = ADMIN_EMAIL.to_string();
    config.bootstrap.admin_password = ADMIN_PASSWORD.to_string();
    config.validate().expect("test config is valid")
}

/// An in-process server over a fresh `MemoryStore`, bound to an ephemeral port
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(test_config(), |_| {}).await
    }

    /// Spawn with extra models registered after the defaults
    pub async fn spawn_with(config: AppConfig, extra: impl FnOnce(&ModelRegistry)) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = Arc::new(ModelRegistry::new());
        register_default_models(&registry)?;
        extra(&registry);
        registry.initialize_tables(store.as_ref()).await?;
        ensure_admin(&UserService::new(store.clone()), &config.bootstrap).await?;

        let state = AppState::new(config, store, registry)?;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            state,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return the status with the parsed JSON body
    /// (`Value::Null` for an empty body)
    pub async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await?;
        let body = if text.is_empty() { Value::Null } else { serde_json::from_str(&text)? };
        Ok((status, body))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, Some(token), None).await
    }

    /// Register a fresh account and return (token, user id)
    pub async fn register(&self, username: &str) -> Result<(String, i64)> {
        let body = json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password1",
        });
        let (status, payload) = self.send(Method::POST, "/api/v1/auth/register", None, Some(body)).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {} {}", status, payload);
        Ok(token_and_id(&payload))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(String, i64)> {
        let body = json!({ "email": email, "password": password });
        let (status, payload) = self.send(Method::POST, "/api/v1/auth/login", None, Some(body)).await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {} {}", status, payload);
        Ok(token_and_id(&payload))
    }

    pub async fn admin(&self) -> Result<(String, i64)> {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create a record and return its id, failing the test on any non-201
    pub async fn create(&self, model: &str, token: &str, body: Value) -> Result<i64> {
        let (status, payload) = self.post(&format!("/api/v1/{}", model), token, body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create {} failed: {} {}", model, status, payload);
        payload["data"]["id"].as_i64().context("created record has no id")
    }
}

fn token_and_id(payload: &Value) -> (String, i64) {
    (
        payload["data"]["token"].as_str().unwrap_or_default().to_string(),
        payload["data"]["user"]["id"].as_i64().unwrap_or_default(),
    )
}
