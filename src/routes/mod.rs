pub mod dynamic;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, rate_limit_middleware};
use crate::state::AppState;

pub use dynamic::bind_models;

/// The complete HTTP surface
pub fn app(state: AppState) -> Router {
    let (public_models, protected_models) = bind_models(&state.registry.get_models());

    let protected = protected_routes()
        .merge(protected_models)
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(public::health::health_get))
        .merge(auth_public_routes())
        .merge(schema_routes())
        .merge(public_models)
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.security.cors_origins))
                .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
                .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes)),
        )
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/v1/auth/register", post(auth::register_post))
        .route("/api/v1/auth/login", post(auth::login_post))
        .route("/api/v1/auth/refresh", post(auth::refresh_post))
}

fn schema_routes() -> Router<AppState> {
    use public::schema;

    Router::new()
        .route("/api/v1/schema", get(schema::schema_list))
        .route("/api/v1/schema/", get(schema::schema_list))
        .route("/api/v1/schema/:model", get(schema::schema_get))
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/auth/me",
            get(protected::me::me_get)
                .put(protected::me::me_put)
                .delete(protected::me::me_delete),
        )
        .route(
            "/api/v1/users/:id/settings",
            get(protected::settings::settings_get).put(protected::settings::settings_put),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(parsed)
}

async fn root() -> axum::response::Json<Value> {
    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health",
                "auth": "/api/v1/auth",
                "schema": "/api/v1/schema",
            }
        }
    }))
}
