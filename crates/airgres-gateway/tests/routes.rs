//! HTTP round trips through the gateway router.

use std::sync::Arc;

use airgres_core::{LinkMap, LinkTarget, PoolRegistry, SqliteConnector, SqliteDatabase};
use airgres_gateway::{create_router, AppState, GatewayConfig};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

const SCHEMA: &str = r#"
CREATE TABLE reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL UNIQUE,
    created_time TEXT,
    report_id TEXT,
    title TEXT,
    status TEXT
);

CREATE TABLE notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL UNIQUE,
    created_time TEXT,
    body TEXT,
    report_id TEXT
);
"#;

async fn server() -> TestServer {
    let db = SqliteDatabase::open_in_memory().unwrap();
    db.execute_batch(SCHEMA).await.unwrap();

    let registry = Arc::new(PoolRegistry::new(Arc::new(SqliteConnector::in_memory())));
    assert!(registry.register("main", Arc::new(db)));

    let links = LinkMap::new().with("report_id", LinkTarget::new("reports", "report_id"));
    let state = AppState::new(registry, links, GatewayConfig::default());
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_health_reports_open_bases() {
    let server = server().await;

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["bases"][0]["name"], "main");
    assert_eq!(body["bases"][0]["connected"], true);
}

#[tokio::test]
async fn test_record_crud() {
    let server = server().await;

    let created = server
        .post("/v0/main/reports")
        .json(&json!({"fields": {"title": "Q1", "status": "draft"}}))
        .await;
    assert_eq!(created.status_code(), StatusCode::OK);
    let created: Value = created.json();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("rec"));
    assert_eq!(created["fields"]["title"], "Q1");
    assert!(created["createdTime"].is_string());

    let fetched: Value = server.get(&format!("/v0/main/reports/{}", id)).await.json();
    assert_eq!(fetched["id"], id.as_str());
    assert_eq!(fetched["fields"]["status"], "draft");

    let updated = server
        .patch(&format!("/v0/main/reports/{}", id))
        .json(&json!({"fields": {"status": "final"}}))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    let updated: Value = updated.json();
    assert_eq!(updated["fields"]["status"], "final");
    assert_eq!(updated["fields"]["title"], "Q1");

    let deleted = server.delete(&format!("/v0/main/reports/{}", id)).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    let deleted: Value = deleted.json();
    assert_eq!(deleted["id"], id.as_str());
    assert_eq!(deleted["deleted"], true);

    let missing = server.get(&format!("/v0/main/reports/{}", id)).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    let missing: Value = missing.json();
    assert_eq!(missing["error"]["type"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_with_filter_and_offset() {
    let server = server().await;

    for i in 0..5 {
        let status = if i % 2 == 0 { "open" } else { "closed" };
        server
            .post("/v0/main/reports")
            .json(&json!({"fields": {"title": format!("r{}", i), "status": status}}))
            .await;
    }

    let first: Value = server
        .get("/v0/main/reports")
        .add_query_param("filterByFormula", r#"{status} = "open""#)
        .add_query_param("pageSize", "2")
        .await
        .json();
    assert_eq!(first["records"].as_array().unwrap().len(), 2);
    let offset = first["offset"].as_str().unwrap().to_string();

    let second: Value = server
        .get("/v0/main/reports")
        .add_query_param("filterByFormula", r#"{status} = "open""#)
        .add_query_param("pageSize", "2")
        .add_query_param("offset", &offset)
        .await
        .json();
    let records = second["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fields"]["title"], "r4");
    assert!(second.get("offset").is_none());
}

#[tokio::test]
async fn test_linked_filter_through_http() {
    let server = server().await;

    let report: Value = server
        .post("/v0/main/reports")
        .json(&json!({"fields": {"report_id": "R-7", "title": "linked"}}))
        .await
        .json();
    let report_id = report["id"].as_str().unwrap().to_string();

    server
        .post("/v0/main/notes")
        .json(&json!({"fields": {"body": "hit", "report_id": "R-7"}}))
        .await;
    server
        .post("/v0/main/notes")
        .json(&json!({"fields": {"body": "miss", "report_id": "R-8"}}))
        .await;

    let page: Value = server
        .get("/v0/main/notes")
        .add_query_param("filterByFormula", format!(r#"{{report_id}} = "{}""#, report_id))
        .await
        .json();
    let records = page["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fields"]["body"], "hit");
}

#[tokio::test]
async fn test_unknown_base_is_not_found() {
    let server = server().await;

    let response = server.get("/v0/elsewhere/reports").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_requests_are_rejected() {
    let server = server().await;

    let bad_json = server.post("/v0/main/reports").text("{not json").await;
    assert_eq!(bad_json.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let bad_offset = server
        .get("/v0/main/reports")
        .add_query_param("offset", "nonsense")
        .await;
    assert_eq!(bad_offset.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = bad_offset.json();
    assert_eq!(body["error"]["type"], "INVALID_REQUEST");

    let unknown_table = server.get("/v0/main/ghosts").await;
    assert_eq!(unknown_table.status_code(), StatusCode::OK);
    let body: Value = unknown_table.json();
    assert_eq!(body["records"], json!([]));
}

#[tokio::test]
async fn test_batch_create_and_destroy() {
    let server = server().await;

    let created: Value = server
        .post("/v0/main/reports")
        .json(&json!({"records": [
            {"fields": {"title": "a"}},
            {"fields": {"title": "b"}}
        ]}))
        .await
        .json();
    let ids: Vec<String> = created["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);

    let mut request = server.delete("/v0/main/reports");
    for id in &ids {
        request = request.add_query_param("records[]", id);
    }
    let deleted: Value = request.await.json();
    let acks = deleted["records"].as_array().unwrap();
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[0]["id"], ids[0].as_str());
    assert_eq!(acks[1]["deleted"], true);
}
