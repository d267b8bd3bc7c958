mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use common::{test_config, TestServer};
use mini_crm_api::database::FieldType;
use mini_crm_api::models::{Entity, FieldDefinition, Model};
use mini_crm_api::registry::ModelOptions;

#[derive(Debug, Serialize, Deserialize)]
struct Widget {
    #[serde(flatten)]
    model: Model,
    name: String,
    status: String,
    other: Option<i64>,
}

impl Entity for Widget {
    const NAME: &'static str = "widget";
    const TABLE: &'static str = "widgets";

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::string("name").required(),
            FieldDefinition::string("status").options(&["open", "closed"]).default_value("open"),
            FieldDefinition::new("other", FieldType::Integer),
        ]
    }
}

async fn widget_server() -> Result<TestServer> {
    TestServer::spawn_with(test_config(), |registry| {
        registry
            .register::<Widget>(ModelOptions::new().filters(&["status"]))
            .expect("widget registers");
    })
    .await
}

#[tokio::test]
async fn only_allowed_filters_apply() -> Result<()> {
    let server = widget_server().await?;
    let (token, _) = server.register("tinker").await?;

    server.create("widget", &token, json!({ "name": "a", "status": "open", "other": 5 })).await?;
    server.create("widget", &token, json!({ "name": "b", "status": "open", "other": 7 })).await?;
    server.create("widget", &token, json!({ "name": "c", "status": "closed", "other": 5 })).await?;

    let (status, body) = server.get("/api/v1/widget/?status=open&other=5", &token).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["meta"]["total"], 2, "`other` must be ignored: {}", body);
    let names: Vec<_> = body["data"].as_array().into_iter().flatten().map(|w| w["name"].clone()).collect();
    assert_eq!(names, vec![json!("a"), json!("b")]);
    Ok(())
}

#[tokio::test]
async fn unowned_models_are_shared_between_users() -> Result<()> {
    let server = widget_server().await?;
    let (alice, _) = server.register("alice").await?;
    let (bob, _) = server.register("bob").await?;

    let id = server.create("widget", &alice, json!({ "name": "shared" })).await?;
    let (status, body) = server.get(&format!("/api/v1/widget/{}", id), &bob).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("user_id").is_none());
    Ok(())
}

#[tokio::test]
async fn typed_filters_parse_query_values() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (token, _) = server.register("doer").await?;
    let done = server.create("task", &token, json!({ "title": "done", "completed": true })).await?;
    server.create("task", &token, json!({ "title": "todo" })).await?;

    let (_, body) = server.get("/api/v1/task?completed=true", &token).await?;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["id"], done);

    let (_, body) = server.get("/api/v1/task?completed=false", &token).await?;
    assert_eq!(body["meta"]["total"], 1);

    let (status, body) = server.get("/api/v1/task?completed=maybe", &token).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["completed"].is_string());
    Ok(())
}

#[tokio::test]
async fn contacts_filter_by_stage_and_company() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (token, _) = server.register("seller").await?;
    server
        .create("contact", &token, json!({ "first_name": "A", "company": "Acme", "contact_stage": "Customer" }))
        .await?;
    server
        .create("contact", &token, json!({ "first_name": "B", "company": "Acme" }))
        .await?;
    server
        .create("contact", &token, json!({ "first_name": "C", "company": "Globex", "contact_stage": "Customer" }))
        .await?;

    let (_, body) = server.get("/api/v1/contact?company=Acme", &token).await?;
    assert_eq!(body["meta"]["total"], 2);
    let (_, body) = server.get("/api/v1/contact?company=Acme&contact_stage=Customer", &token).await?;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["first_name"], "A");
    Ok(())
}
