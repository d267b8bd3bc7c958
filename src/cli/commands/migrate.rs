use crate::config::AppConfig;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    let (_store, registry) = super::prepare_storage(&config).await?;
    for model in registry.get_models() {
        println!("{:<10} -> {}", model.name, model.table);
    }
    Ok(())
}
