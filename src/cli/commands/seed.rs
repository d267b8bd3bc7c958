use crate::config::AppConfig;
use crate::services::seed_demo_data;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    let (store, _registry) = super::prepare_storage(&config).await?;
    if seed_demo_data(store, &config.bootstrap).await? {
        println!("Demo data created");
    } else {
        println!("Database already contains users, nothing seeded");
    }
    Ok(())
}
