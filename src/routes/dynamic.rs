//! Mounts every registered model under `/api/v1/<name>`.

use axum::{
    http::Method,
    middleware,
    routing::{get, post, MethodRouter},
    Extension, Router,
};
use std::collections::HashSet;

use crate::engine::CrudEngine;
use crate::handlers::crud;
use crate::middleware::require_admin;
use crate::registry::ModelDefinition;
use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Build routers for every model, split into (public, protected). The
/// protected router still needs the token guard applied by the caller.
pub fn bind_models(models: &[ModelDefinition]) -> (Router<AppState>, Router<AppState>) {
    let mut public = Router::new();
    let mut protected = Router::new();

    for model in models {
        let router = bind_model(model);
        if model.requires_auth {
            protected = protected.merge(router);
        } else {
            public = public.merge(router);
        }
        tracing::debug!(
            model = model.name,
            requires_auth = model.requires_auth,
            requires_admin = model.requires_admin,
            custom_endpoints = model.custom_endpoints.len(),
            "Bound model routes"
        );
    }
    (public, protected)
}

fn bind_model(model: &ModelDefinition) -> Router<AppState> {
    let base = format!("{}/{}", API_PREFIX, model.name);
    let item = format!("{}/:id", base);

    // Standard routes first; custom endpoints may not shadow them
    let mut taken: HashSet<(String, Method)> = HashSet::new();
    for path in [base.clone(), format!("{}/", base)] {
        taken.insert((path.clone(), Method::POST));
        taken.insert((path, Method::GET));
    }
    for method in [Method::GET, Method::PUT, Method::DELETE] {
        taken.insert((item.clone(), method));
    }

    let collection = || post(crud::create).get(crud::list);
    let mut router = Router::new()
        .route(&base, collection())
        .route(&format!("{}/", base), collection())
        .route(&item, get(crud::get).put(crud::update).delete(crud::delete));

    for endpoint in &model.custom_endpoints {
        let path = format!("{}{}", base, endpoint.path);
        let Ok(method) = endpoint.method.parse::<Method>() else {
            tracing::warn!(model = model.name, method = %endpoint.method, "Skipping endpoint with invalid method");
            continue;
        };
        if !taken.insert((path.clone(), method)) {
            tracing::warn!(model = model.name, path = %path, "Skipping endpoint that collides with an existing route");
            continue;
        }
        let handler: MethodRouter<AppState> = endpoint.handler.clone();
        router = router.route(&path, handler);
    }

    let router = router.route_layer(Extension(CrudEngine::new(model.clone())));
    if model.requires_admin {
        router.route_layer(middleware::from_fn(require_admin))
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{MemoryStore, Store};
    use crate::models::{Entity, FieldDefinition, Model};
    use crate::registry::{ModelOptions, ModelRegistry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Debug, Serialize, Deserialize)]
    struct Gadget {
        #[serde(flatten)]
        model: Model,
        label: String,
    }

    impl Entity for Gadget {
        const NAME: &'static str = "gadget";
        const TABLE: &'static str = "gadgets";

        fn fields() -> Vec<FieldDefinition> {
            vec![FieldDefinition::string("label").required()]
        }
    }

    async fn teapot() -> StatusCode {
        StatusCode::IM_A_TEAPOT
    }

    async fn gadget_state(options: ModelOptions) -> (AppState, Vec<ModelDefinition>) {
        let registry = Arc::new(ModelRegistry::new());
        registry.register::<Gadget>(options).unwrap();
        registry
            .register_custom_endpoint("gadget", "/:id", Method::GET, "shadows get", teapot)
            .unwrap();
        registry
            .register_custom_endpoint("gadget", "/:id/ping", Method::POST, "ping", teapot)
            .unwrap();

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        registry.initialize_tables(store.as_ref()).await.unwrap();
        let mut config = AppConfig::development();
        config.security.jwt_secret = "router-test-secret".to_string();
        let models = registry.get_models();
        let state = AppState::new(config.validate().unwrap(), store, registry).unwrap();
        (state, models)
    }

    async fn status(router: Router<AppState>, state: &AppState, method: Method, uri: &str) -> StatusCode {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        router.with_state(state.clone()).oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn colliding_custom_endpoint_is_skipped() {
        let (state, models) = gadget_state(ModelOptions::new().public()).await;
        let (public, _) = bind_models(&models);

        // Standard get wins: an unknown id is a 404, not the custom handler
        assert_eq!(status(public.clone(), &state, Method::GET, "/api/v1/gadget/1").await, StatusCode::NOT_FOUND);
        assert_eq!(status(public.clone(), &state, Method::POST, "/api/v1/gadget/1/ping").await, StatusCode::IM_A_TEAPOT);
        assert_eq!(status(public, &state, Method::GET, "/api/v1/gadget/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn models_land_in_the_router_matching_their_auth_flag() {
        let (state, models) = gadget_state(ModelOptions::new().public()).await;
        let (_, protected) = bind_models(&models);
        assert_eq!(status(protected, &state, Method::GET, "/api/v1/gadget").await, StatusCode::NOT_FOUND);

        let (state, models) = gadget_state(ModelOptions::new()).await;
        let (public, protected) = bind_models(&models);
        assert_eq!(status(public, &state, Method::GET, "/api/v1/gadget").await, StatusCode::NOT_FOUND);
        assert_eq!(status(protected, &state, Method::GET, "/api/v1/gadget").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_only_models_reject_requests_without_an_admin() {
        let (state, models) = gadget_state(ModelOptions::new().admin_only()).await;
        let (_, protected) = bind_models(&models);
        // No token guard here, so no user reaches require_admin
        assert_eq!(status(protected, &state, Method::GET, "/api/v1/gadget").await, StatusCode::UNAUTHORIZED);
    }
}
