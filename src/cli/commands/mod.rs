pub mod migrate;
pub mod seed;
pub mod serve;

use anyhow::Context;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{DatabaseManager, Store};
use crate::registry::{register_default_models, ModelRegistry};

/// Open the store, register every model and bring the tables up to date.
/// Any failure here aborts startup.
pub async fn prepare_storage(config: &AppConfig) -> anyhow::Result<(Arc<dyn Store>, Arc<ModelRegistry>)> {
    let store = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open storage")?;

    let registry = Arc::new(ModelRegistry::new());
    register_default_models(&registry).context("failed to register models")?;
    registry
        .initialize_tables(store.as_ref())
        .await
        .context("failed to initialize tables")?;

    tracing::info!(backend = store.backend(), models = registry.len(), "Storage ready");
    Ok((store, registry))
}
