use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::state::AppState;

static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

const CACHE_TTL: Duration = Duration::from_secs(10);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: HealthLevel,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthLevel,
    pub version: &'static str,
    pub environment: &'static str,
    pub uptime_secs: i64,
    pub start_time: DateTime<Utc>,
    pub services: BTreeMap<&'static str, ServiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_backend: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<&'static str>>,
}

/// Last non-detailed result, reused for `CACHE_TTL`
#[derive(Debug, Default)]
pub struct HealthCache {
    entry: RwLock<Option<(Instant, HealthStatus)>>,
}

impl HealthCache {
    fn fresh(&self) -> Option<HealthStatus> {
        let entry = self.entry.read().unwrap_or_else(|e| e.into_inner());
        entry
            .as_ref()
            .filter(|(at, _)| at.elapsed() < CACHE_TTL)
            .map(|(_, status)| status.clone())
    }

    fn store(&self, status: &HealthStatus) {
        let mut entry = self.entry.write().unwrap_or_else(|e| e.into_inner());
        *entry = Some((Instant::now(), status.clone()));
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    pub detailed: Option<String>,
}

/// Force the start time to be recorded at boot rather than on first request
pub fn mark_started() -> DateTime<Utc> {
    *START_TIME
}

async fn check_database(state: &AppState) -> ServiceStatus {
    let (status, description) = match tokio::time::timeout(PING_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => (HealthLevel::Ok, "Database connection established".to_string()),
        Ok(Err(e)) => (HealthLevel::Error, format!("Database unreachable: {}", e)),
        Err(_) => (HealthLevel::Error, "Database ping timed out".to_string()),
    };
    ServiceStatus { status, description, timestamp: Utc::now() }
}

async fn check_health(state: &AppState, detailed: bool) -> HealthStatus {
    if !detailed {
        if let Some(cached) = state.health.fresh() {
            return cached;
        }
    }

    let database = check_database(state).await;
    let mut status = HealthStatus {
        status: database.status,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.as_str(),
        uptime_secs: (Utc::now() - *START_TIME).num_seconds(),
        start_time: *START_TIME,
        services: BTreeMap::from([("database", database)]),
        storage_backend: None,
        models: None,
    };

    if detailed {
        status.storage_backend = Some(state.store.backend());
        status.models = Some(state.registry.get_models().iter().map(|m| m.name).collect());
    } else {
        state.health.store(&status);
    }
    status
}

/// GET /health?detailed=true
pub async fn health_get(State(state): State<AppState>, Query(query): Query<HealthQuery>) -> Response {
    let detailed = matches!(query.detailed.as_deref(), Some("true") | Some("1"));
    let status = check_health(&state, detailed).await;

    if status.status == HealthLevel::Error {
        tracing::warn!("Health check detected failing services");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }
    (StatusCode::OK, Json(status)).into_response()
}
