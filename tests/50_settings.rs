mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn settings_default_and_update_partially() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (token, user_id) = server.register("sam").await?;
    let path = format!("/api/v1/users/{}/settings", user_id);

    let (status, body) = server.get(&path, &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["theme"], "light");
    assert_eq!(body["data"]["user_id"], user_id);

    let (status, body) = server.put(&path, &token, json!({ "theme": "dark", "user_id": 999 })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["theme"], "dark");
    assert_eq!(body["data"]["language"], "en");
    assert_eq!(body["data"]["user_id"], user_id);

    let (status, body) = server.put(&path, &token, json!({ "theme": "neon" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["theme"].is_string());

    let (status, _) = server.put(&path, &token, json!({ "language": "x" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn settings_are_private_to_their_owner() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (_, alice_id) = server.register("alice").await?;
    let (bob, _) = server.register("bob").await?;
    let (admin, _) = server.admin().await?;
    let path = format!("/api/v1/users/{}/settings", alice_id);

    let (status, body) = server.get(&path, &bob).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = server.put(&path, &admin, json!({ "language": "de" })).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.get("/api/v1/users/424242/settings", &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.get("/api/v1/users/abc/settings", &admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn users_created_by_an_admin_get_default_settings() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, _) = server.admin().await?;

    let body = json!({ "username": "zed", "email": "zed@example.com", "password": "secret1" });
    let (status, created) = server.post("/api/v1/user", &admin, body).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["data"]["settings"]["theme"], "light");
    let id = created["data"]["id"].as_i64().unwrap_or_default();

    let (status, fetched) = server.get(&format!("/api/v1/user/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["settings"]["language"], "en");

    let (_, settings) = server.get(&format!("/api/v1/settings?user_id={}", id), &admin).await?;
    assert_eq!(settings["meta"]["total"], 1);

    // The new account can sign in and sees the same row
    let (token, _) = server.login("zed@example.com", "secret1").await?;
    let (_, me) = server.get("/api/v1/auth/me", &token).await?;
    assert_eq!(me["data"]["settings"]["id"], settings["data"][0]["id"]);
    Ok(())
}
