mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn deleting_a_contact_removes_notes_deals_and_their_tasks() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (token, _) = server.register("owner").await?;

    let contact = server.create("contact", &token, json!({ "first_name": "Ada" })).await?;
    server.create("note", &token, json!({ "content": "first", "contact_id": contact })).await?;
    server.create("note", &token, json!({ "content": "second", "contact_id": contact })).await?;
    let deal = server.create("deal", &token, json!({ "title": "Engines", "contact_id": contact })).await?;
    let task = server.create("task", &token, json!({ "title": "Follow up", "deal_id": deal })).await?;
    let unrelated = server.create("contact", &token, json!({ "first_name": "Bea" })).await?;
    server.create("note", &token, json!({ "content": "keep", "contact_id": unrelated })).await?;

    let (status, _) = server.delete(&format!("/api/v1/contact/{}", contact), &token).await?;
    assert_eq!(status, StatusCode::OK);

    let (_, notes) = server.get(&format!("/api/v1/note?contact_id={}", contact), &token).await?;
    assert_eq!(notes["meta"]["total"], 0);
    let (_, deals) = server.get(&format!("/api/v1/deal?contact_id={}", contact), &token).await?;
    assert_eq!(deals["meta"]["total"], 0);

    // The deal's own cascade reached its task
    let (status, _) = server.get(&format!("/api/v1/task/{}", task), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, kept) = server.get(&format!("/api/v1/note?contact_id={}", unrelated), &token).await?;
    assert_eq!(kept["meta"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn deleting_a_deal_removes_its_tasks_and_notes() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (token, _) = server.register("owner").await?;

    let deal = server.create("deal", &token, json!({ "title": "Engines" })).await?;
    server.create("task", &token, json!({ "title": "Call", "deal_id": deal })).await?;
    server.create("note", &token, json!({ "content": "Sent quote", "deal_id": deal })).await?;

    let (status, _) = server.delete(&format!("/api/v1/deal/{}", deal), &token).await?;
    assert_eq!(status, StatusCode::OK);

    let (_, tasks) = server.get("/api/v1/task", &token).await?;
    assert_eq!(tasks["meta"]["total"], 0);
    let (_, notes) = server.get("/api/v1/note", &token).await?;
    assert_eq!(notes["meta"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn admin_deleting_a_user_removes_everything_they_own() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (token, user_id) = server.register("leaver").await?;
    let (admin, _) = server.admin().await?;
    let contact = server.create("contact", &token, json!({ "first_name": "Ada" })).await?;
    server.create("task", &token, json!({ "title": "Orphan?" })).await?;

    let (status, _) = server.delete(&format!("/api/v1/user/{}", user_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.get(&format!("/api/v1/contact/{}", contact), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, tasks) = server.get("/api/v1/task", &admin).await?;
    assert_eq!(tasks["meta"]["total"], 0);
    let (_, settings) = server.get(&format!("/api/v1/settings?user_id={}", user_id), &admin).await?;
    assert_eq!(settings["meta"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn admin_cannot_delete_their_own_account_through_the_user_model() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, admin_id) = server.admin().await?;
    let (_, other) = server.register("bystander").await?;

    let (status, body) = server.delete(&format!("/api/v1/user/{}", admin_id), &admin).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = server.get("/api/v1/auth/me", &admin).await?;
    assert_eq!(status, StatusCode::OK);

    // Other accounts are still fair game
    let (status, _) = server.delete(&format!("/api/v1/user/{}", other), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
