use serde_json::{json, Value};
use std::sync::Arc;

use super::{UserError, UserService};
use crate::config::BootstrapConfig;
use crate::database::{row_id, DatabaseError, Row, Store};
use crate::engine::record::Record;
use crate::models::{Contact, Deal, Entity, Note, Task};
use crate::types::{Operation, Role};

/// Create the configured admin account when no users exist yet.
/// Returns the new admin row, or `None` when users were already present.
pub async fn ensure_admin(users: &UserService, config: &BootstrapConfig) -> Result<Option<Row>, UserError> {
    if users.count().await? > 0 {
        return Ok(None);
    }
    let admin = users
        .create_user(&config.admin_username, &config.admin_email, &config.admin_password, Role::Admin)
        .await?;
    tracing::info!(email = %config.admin_email, "Created default admin account");
    Ok(Some(admin))
}

/// Validate and insert one owned demo record
async fn insert_owned<E: Entity>(store: &dyn Store, owner: i64, body: Value) -> Result<i64, UserError> {
    let mut record = Record::bind_entity::<E>(body, Operation::Create)?;
    if let Some(owner_field) = E::OWNER_FIELD {
        record.set(owner_field, json!(owner));
    }
    let row = store.insert(&E::schema(), record.into_values()).await?;
    row_id(&row).ok_or_else(|| DatabaseError::QueryError(format!("{} insert returned no id", E::NAME)).into())
}

/// Populate a fresh install with a demo user and a small sample pipeline.
/// Skipped when any account other than the admin exists.
pub async fn seed_demo_data(store: Arc<dyn Store>, config: &BootstrapConfig) -> Result<bool, UserError> {
    let users = UserService::new(store.clone());
    let admin_id = match ensure_admin(&users, config).await? {
        Some(admin) => row_id(&admin),
        None => users.find_by_email(&config.admin_email).await?.as_ref().and_then(row_id),
    };
    if users.count().await? > 1 {
        tracing::info!("Demo data already present, skipping seed");
        return Ok(false);
    }
    let Some(admin_id) = admin_id else {
        tracing::warn!("Admin account missing, skipping seed");
        return Ok(false);
    };

    let demo = users.create_user("demo", "demo@example.com", "demo1234", Role::User).await?;
    let demo_id = row_id(&demo).ok_or(UserError::NotFound(0))?;
    let store = store.as_ref();

    let acme = insert_owned::<Contact>(
        store,
        admin_id,
        json!({
            "first_name": "Maria", "last_name": "Keller", "email": "maria@acme.example",
            "phone": "+49 30 1234567", "company": "Acme GmbH", "position": "CEO",
            "contact_stage": "Lead"
        }),
    )
    .await?;
    let globex = insert_owned::<Contact>(
        store,
        admin_id,
        json!({
            "first_name": "Tom", "last_name": "Becker", "email": "tom@globex.example",
            "company": "Globex AG", "position": "CTO", "contact_stage": "Customer"
        }),
    )
    .await?;
    let initech = insert_owned::<Contact>(
        store,
        demo_id,
        json!({
            "first_name": "Jane", "last_name": "Doe", "email": "jane@initech.example",
            "company": "Initech", "position": "Manager", "contact_stage": "Prospect"
        }),
    )
    .await?;

    let licences = insert_owned::<Deal>(
        store,
        admin_id,
        json!({
            "title": "Software licences", "description": "Ten seats, annual billing",
            "value": 10000.0, "status": "open", "contact_id": acme
        }),
    )
    .await?;
    let consulting = insert_owned::<Deal>(
        store,
        admin_id,
        json!({
            "title": "Consulting project", "description": "Three month engagement",
            "value": 25000.0, "status": "won", "contact_id": globex
        }),
    )
    .await?;
    let hardware = insert_owned::<Deal>(
        store,
        demo_id,
        json!({
            "title": "Laptop refresh", "description": "Twenty laptops",
            "value": 15000.0, "status": "open", "contact_id": initech
        }),
    )
    .await?;

    insert_owned::<Note>(store, admin_id, json!({ "content": "Interested in the premium tier", "contact_id": acme, "deal_id": licences })).await?;
    insert_owned::<Note>(store, admin_id, json!({ "content": "Contract draft sent", "contact_id": globex, "deal_id": consulting })).await?;
    insert_owned::<Note>(store, demo_id, json!({ "content": "Needs a quote by month end", "contact_id": initech, "deal_id": hardware })).await?;

    insert_owned::<Task>(store, admin_id, json!({ "title": "Send quote", "details": "Itemised licence quote", "deal_id": licences })).await?;
    insert_owned::<Task>(store, admin_id, json!({ "title": "Kick-off meeting", "deal_id": consulting, "completed": true })).await?;
    insert_owned::<Task>(store, demo_id, json!({ "title": "Collect hardware specs", "deal_id": hardware })).await?;

    tracing::info!(admin_id, demo_id, "Seeded demo data");
    Ok(true)
}
