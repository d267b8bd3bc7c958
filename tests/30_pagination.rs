mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

async fn seeded(count: usize) -> Result<(TestServer, String)> {
    let server = TestServer::spawn().await?;
    let (token, _) = server.register("pager").await?;
    for i in 0..count {
        server.create("contact", &token, json!({ "first_name": format!("Contact {}", i) })).await?;
    }
    Ok((server, token))
}

#[tokio::test]
async fn second_page_of_twenty_five() -> Result<()> {
    let (server, token) = seeded(25).await?;

    let (status, body) = server.get("/api/v1/contact?page=2&limit=10", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(10));
    assert_eq!(body["meta"], json!({ "page": 2, "limit": 10, "total": 25, "pages": 3 }));
    assert_eq!(body["data"][0]["first_name"], "Contact 10");

    let (_, last) = server.get("/api/v1/contact?page=3&limit=10", &token).await?;
    assert_eq!(last["data"].as_array().map(Vec::len), Some(5));

    let (_, beyond) = server.get("/api/v1/contact?page=9&limit=10", &token).await?;
    assert_eq!(beyond["data"].as_array().map(Vec::len), Some(0));
    assert_eq!(beyond["meta"]["total"], 25);
    Ok(())
}

#[tokio::test]
async fn limits_are_clamped_and_defaulted() -> Result<()> {
    let (server, token) = seeded(12).await?;

    let (_, body) = server.get("/api/v1/contact?page=1&limit=200", &token).await?;
    assert_eq!(body["meta"]["limit"], 100);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(12));

    let (_, body) = server.get("/api/v1/contact", &token).await?;
    assert_eq!(body["meta"], json!({ "page": 1, "limit": 10, "total": 12, "pages": 2 }));

    let (_, body) = server.get("/api/v1/contact?page=0&limit=0", &token).await?;
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["limit"], 1);

    let (_, body) = server.get("/api/v1/contact?page=abc&limit=xyz", &token).await?;
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["limit"], 10);
    Ok(())
}

#[tokio::test]
async fn empty_collection_has_zero_pages() -> Result<()> {
    let (server, token) = seeded(0).await?;

    let (status, body) = server.get("/api/v1/contact/", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["total"], 0);
    assert_eq!(body["meta"]["pages"], 0);
    Ok(())
}
