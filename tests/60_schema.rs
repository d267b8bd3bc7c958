mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};

use common::TestServer;

#[tokio::test]
async fn schema_lists_registered_models_publicly() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.send(Method::GET, "/api/v1/schema", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert_eq!(names, vec!["user", "settings", "contact", "deal", "task", "note"]);
    Ok(())
}

#[tokio::test]
async fn schema_describes_one_model() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.send(Method::GET, "/api/v1/schema/task", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let task = &body["data"];
    assert_eq!(task["owner_field"], "user_id");
    assert_eq!(task["requires_auth"], true);
    assert_eq!(task["requires_admin"], false);
    assert!(task["allowed_filters"].as_array().is_some_and(|f| f.contains(&"completed".into())));
    assert_eq!(task["custom_endpoints"][0]["path"], "/:id/toggle");
    assert_eq!(task["custom_endpoints"][0]["method"], "PATCH");

    let fields = task["fields"].as_array().cloned().unwrap_or_default();
    let title = fields.iter().find(|f| f["name"] == "title").cloned().unwrap_or_default();
    assert_eq!(title["type"], "string");
    assert_eq!(title["required"], true);

    let (_, user) = server.send(Method::GET, "/api/v1/schema/user", None, None).await?;
    assert_eq!(user["data"]["requires_admin"], true);
    Ok(())
}

#[tokio::test]
async fn unknown_model_is_not_found() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.send(Method::GET, "/api/v1/schema/invoice", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    Ok(())
}
