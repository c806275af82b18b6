//! Integration tests for the record service over SQLite.

use std::collections::HashSet;
use std::sync::Arc;

use airgres_core::{
    ApiRequest, Base, Error, FieldValue, Fields, FilterMode, LinkMap, LinkTarget, ListOptions,
    Method, RecordService, ServiceConfig, SortSpec, SqliteDatabase, Status,
};
use serde_json::json;

const SCHEMA: &str = r#"
CREATE TABLE reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL UNIQUE,
    created_time TEXT,
    report_id TEXT,
    title TEXT,
    status TEXT,
    published TEXT,
    tags TEXT,
    priority INTEGER
);

CREATE TABLE b (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL UNIQUE,
    created_time TEXT,
    name TEXT,
    report_id TEXT
);
"#;

struct TestContext {
    db: SqliteDatabase,
    links: Arc<LinkMap>,
}

impl TestContext {
    async fn new() -> Self {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(SCHEMA).await.unwrap();
        let links = LinkMap::new().with("report_id", LinkTarget::new("reports", "report_id"));
        Self {
            db,
            links: Arc::new(links),
        }
    }

    fn service(&self) -> RecordService {
        self.service_with(ServiceConfig::default())
    }

    fn service_with(&self, config: ServiceConfig) -> RecordService {
        RecordService::new(Arc::new(self.db.clone()), self.links.clone(), config)
    }

    async fn seed(&self, sql: &str) {
        self.db.execute_batch(sql).await.unwrap();
    }
}

/// A well-formed record id with a predictable suffix.
fn rid(n: u32) -> String {
    format!("rec{:014}", n)
}

async fn list_ids(service: &RecordService, table: &str, options: ListOptions) -> Vec<String> {
    service
        .list(table, &options)
        .await
        .unwrap()
        .records
        .into_iter()
        .map(|r| r.id)
        .collect()
}

async fn list_field(service: &RecordService, table: &str, formula: &str, field: &str) -> Vec<String> {
    service
        .list(table, &ListOptions::new().filter(formula))
        .await
        .unwrap()
        .records
        .into_iter()
        .filter_map(|r| r.fields.get_text(field).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_create_then_find_roundtrips_fields() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let fields = Fields::new()
        .with("title", "Quarterly")
        .with("tags", FieldValue::from(json!(["finance", "q3"])))
        .with("priority", 2i64)
        .with("published", true)
        .with("status", FieldValue::Null);

    let created = service.create("Reports", &fields).await.unwrap();
    assert!(airgres_core::is_record_id(&created.id));
    let created_time = created.created_time.clone().unwrap();
    assert!(created_time.ends_with('Z'), "{created_time}");

    let found = service.find("reports", &created.id).await.unwrap();
    assert_eq!(found, created);
    assert_eq!(found.fields.get_text("title"), Some("Quarterly"));
    assert_eq!(found.fields.get_list("tags").unwrap().len(), 2);
    assert_eq!(found.fields.get_i64("priority"), Some(2));
    assert_eq!(found.fields.get_bool("published"), Some(true));
    assert!(found.fields.get("status").unwrap().is_null());
    assert!(!found.fields.contains("record_id"));
    assert!(!found.fields.contains("id"));
}

#[tokio::test]
async fn test_update_is_partial_and_idempotent() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let created = service
        .create("reports", &Fields::new().with("title", "Draft").with("status", "open"))
        .await
        .unwrap();

    let patch = Fields::new().with("status", "closed");
    let first = service.update("reports", &created.id, &patch).await.unwrap();
    let second = service.update("reports", &created.id, &patch).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.fields.get_text("status"), Some("closed"));
    assert_eq!(second.fields.get_text("title"), Some("Draft"));
    assert_eq!(second.created_time, created.created_time);
}

#[tokio::test]
async fn test_update_errors() {
    let ctx = TestContext::new().await;
    let service = ctx.service();
    let patch = Fields::new().with("status", "x");

    let err = service.update("reports", &rid(999), &patch).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = service.update("reports", "", &patch).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = service.update("reports", &rid(1), &Fields::new()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = service
        .update("reports", &rid(1), &Fields::new().with("no_such_column", 1i64))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
}

#[tokio::test]
async fn test_pagination_visits_every_row_once() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let mut sql = String::new();
    for n in 1..=25 {
        sql.push_str(&format!(
            "INSERT INTO reports (record_id, title) VALUES ('{}', 'r{}');\n",
            rid(n),
            n
        ));
    }
    ctx.seed(&sql).await;

    let mut seen = Vec::new();
    let mut options = ListOptions::new().page_size(10);
    let mut pages = 0;
    loop {
        let page = service.list("reports", &options).await.unwrap();
        pages += 1;
        assert!(page.records.len() <= 10);
        seen.extend(page.records.into_iter().map(|r| r.id));
        match page.offset {
            Some(next) => options.offset = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 25);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), 25);
    assert_eq!(seen.first(), Some(&rid(1)));
    assert_eq!(seen.last(), Some(&rid(25)));
}

#[tokio::test]
async fn test_pagination_over_tied_sort_values() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let mut sql = String::new();
    for n in 1..=9 {
        sql.push_str(&format!(
            "INSERT INTO reports (record_id, priority) VALUES ('{}', {});\n",
            rid(n),
            n % 2
        ));
    }
    ctx.seed(&sql).await;

    let mut seen = Vec::new();
    let mut priorities = Vec::new();
    let mut options = ListOptions::new().sort(SortSpec::asc("priority")).page_size(2);
    let mut calls = 0;
    loop {
        let page = service.list("reports", &options).await.unwrap();
        calls += 1;
        for record in page.records {
            priorities.push(record.fields.get_i64("priority").unwrap());
            seen.push(record.id);
        }
        match page.offset {
            Some(next) => options.offset = Some(next),
            None => break,
        }
    }

    assert_eq!(calls, 5);
    assert_eq!(seen.len(), 9);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), 9);
    assert_eq!(priorities, vec![0, 0, 0, 0, 1, 1, 1, 1, 1]);
    // Ties fall back to insertion order.
    assert_eq!(seen[..4], [rid(2), rid(4), rid(6), rid(8)]);
}

#[tokio::test]
async fn test_exact_page_has_no_offset() {
    let ctx = TestContext::new().await;
    ctx.seed(&format!(
        "INSERT INTO reports (record_id) VALUES ('{}'), ('{}');",
        rid(1),
        rid(2)
    ))
    .await;

    let page = ctx
        .service()
        .list("reports", &ListOptions::new().max_records(2))
        .await
        .unwrap();
    assert_eq!(page.records.len(), 2);
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_invalid_offset_is_rejected() {
    let ctx = TestContext::new().await;
    let err = ctx
        .service()
        .list("reports", &ListOptions::new().offset("itr-nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Past the range SQL OFFSET accepts.
    let err = ctx
        .service()
        .list("reports", &ListOptions::new().offset("itrffffffffffffffff"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err}");
    assert_eq!(err.status(), Status::BadRequest);
}

#[tokio::test]
async fn test_status_filter() {
    let ctx = TestContext::new().await;
    ctx.seed(&format!(
        "INSERT INTO reports (record_id, title, status) VALUES
            ('{}', 'a', 'active'), ('{}', 'b', 'archived'), ('{}', 'c', 'active'), ('{}', 'd', NULL);",
        rid(1),
        rid(2),
        rid(3),
        rid(4)
    ))
    .await;

    let titles = list_field(&ctx.service(), "reports", r#"{Status} = "active""#, "title").await;
    assert_eq!(titles, vec!["a", "c"]);
}

#[tokio::test]
async fn test_true_matches_boolean_text_and_one() {
    let ctx = TestContext::new().await;
    ctx.seed(&format!(
        "INSERT INTO reports (record_id, title, published) VALUES
            ('{}', 'text-true', 'true'), ('{}', 'one', '1'), ('{}', 'text-false', 'false'), ('{}', 'null', NULL);",
        rid(1),
        rid(2),
        rid(3),
        rid(4)
    ))
    .await;
    let service = ctx.service();
    service
        .create("reports", &Fields::new().with("title", "native").with("published", true))
        .await
        .unwrap();

    let titles = list_field(&service, "reports", "{Published} = TRUE()", "title").await;
    assert_eq!(titles, vec!["text-true", "one", "native"]);
}

#[tokio::test]
async fn test_search_is_case_insensitive_over_lists() {
    let ctx = TestContext::new().await;
    ctx.seed(&format!(
        r#"INSERT INTO reports (record_id, title, tags) VALUES
            ('{}', 'a', '["Urgent","finance"]'), ('{}', 'b', '["ops"]');"#,
        rid(1),
        rid(2)
    ))
    .await;

    let titles = list_field(
        &ctx.service(),
        "reports",
        r#"SEARCH("urgent", ARRAYJOIN({Tags}))"#,
        "title",
    )
    .await;
    assert_eq!(titles, vec!["a"]);
}

async fn seed_links(ctx: &TestContext) {
    ctx.seed(&format!(
        r#"INSERT INTO reports (record_id, report_id, title) VALUES
            ('{r1}', 'R-001', 'first'), ('{r2}', 'R-002', 'second');
           INSERT INTO b (record_id, name, report_id) VALUES
            ('{b1}', 'finding a', '["{r1}"]'),
            ('{b2}', 'finding b', '["{r2}"]'),
            ('{b3}', 'finding c', NULL);"#,
        r1 = rid(1),
        r2 = rid(2),
        b1 = rid(101),
        b2 = rid(102),
        b3 = rid(103),
    ))
    .await;
}

#[tokio::test]
async fn test_linked_filter_resolves_natural_key() {
    let ctx = TestContext::new().await;
    seed_links(&ctx).await;
    let service = ctx.service();

    let names = list_field(&service, "b", r#"{report_id} = "R-001""#, "name").await;
    assert_eq!(names, vec!["finding a"]);

    let names = list_field(&service, "b", &format!(r#"{{report_id}} = "{}""#, rid(2)), "name").await;
    assert_eq!(names, vec!["finding b"]);

    let names = list_field(&service, "b", r#"{report_id} = "R-404""#, "name").await;
    assert!(names.is_empty());
}

#[tokio::test]
async fn test_link_to_own_table_compares_plain_values() {
    let ctx = TestContext::new().await;
    seed_links(&ctx).await;

    let titles = list_field(&ctx.service(), "reports", r#"{report_id} = "R-001""#, "title").await;
    assert_eq!(titles, vec!["first"]);
}

#[tokio::test]
async fn test_unsupported_syntax_degrades_or_rejects() {
    let ctx = TestContext::new().await;
    seed_links(&ctx).await;
    let formula = r#"OR({name} = "finding a", {name} = "nothing")"#;

    let ids = list_ids(&ctx.service(), "b", ListOptions::new().filter(formula)).await;
    assert_eq!(ids.len(), 3);

    let partial = list_field(
        &ctx.service(),
        "b",
        r#"AND({name} = "finding b", NOT({name} = "x"))"#,
        "name",
    )
    .await;
    assert_eq!(partial, vec!["finding b"]);

    let strict = ctx.service_with(ServiceConfig::new().with_filter_mode(FilterMode::Strict));
    let err = strict
        .list("b", &ListOptions::new().filter(formula))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_schema_misses() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let page = service.list("Missing Table", &ListOptions::new()).await.unwrap();
    assert!(page.records.is_empty());
    assert!(page.offset.is_none());

    let page = service
        .list("reports", &ListOptions::new().filter(r#"{Nope} = "x""#))
        .await
        .unwrap();
    assert!(page.records.is_empty());

    let err = service.find("missing", &rid(1)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = service
        .create("missing", &Fields::new().with("a", "b"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
}

#[tokio::test]
async fn test_sort_and_projection() {
    let ctx = TestContext::new().await;
    ctx.seed(&format!(
        "INSERT INTO reports (record_id, title, priority) VALUES
            ('{}', 'low', 1), ('{}', 'high', 3), ('{}', 'none', NULL), ('{}', 'mid', 2);",
        rid(1),
        rid(2),
        rid(3),
        rid(4)
    ))
    .await;

    let page = ctx
        .service()
        .list(
            "reports",
            &ListOptions::new()
                .sort(SortSpec::desc("Priority"))
                .sort(SortSpec::asc("does_not_exist"))
                .field("title"),
        )
        .await
        .unwrap();

    let titles: Vec<_> = page
        .records
        .iter()
        .map(|r| r.fields.get_text("title").unwrap())
        .collect();
    assert_eq!(titles, vec!["high", "mid", "low", "none"]);
    assert!(page.records.iter().all(|r| r.fields.len() == 1));
}

#[tokio::test]
async fn test_destroy_acknowledges_only_deleted_ids() {
    let ctx = TestContext::new().await;
    let service = ctx.service();
    let a = service.create("reports", &Fields::new().with("title", "a")).await.unwrap();
    let b = service.create("reports", &Fields::new().with("title", "b")).await.unwrap();

    let acks = service
        .destroy("reports", &[a.id.clone(), rid(404), b.id.clone()])
        .await
        .unwrap();
    let acked: Vec<_> = acks.iter().map(|ack| ack.id.clone()).collect();
    assert_eq!(acked, vec![a.id.clone(), b.id.clone()]);
    assert!(acks.iter().all(|ack| ack.deleted));

    assert!(matches!(service.find("reports", &a.id).await, Err(Error::NotFound(_))));
    assert!(matches!(service.destroy("reports", &[]).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_batch_writes() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let created = service
        .create_many(
            "reports",
            &[Fields::new().with("title", "one"), Fields::new().with("title", "two")],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let updated = service
        .update_many(
            "reports",
            &[
                (created[0].id.clone(), Fields::new().with("status", "done")),
                (created[1].id.clone(), Fields::new().with("status", "done")),
            ],
        )
        .await
        .unwrap();
    assert!(updated.iter().all(|r| r.fields.get_text("status") == Some("done")));
}

#[tokio::test]
async fn test_request_dispatch() {
    let ctx = TestContext::new().await;
    let service = ctx.service();

    let created = service
        .handle(
            ApiRequest::new(Method::Post, "reports")
                .with_body(json!({ "fields": { "title": "via api", "status": "active" } })),
        )
        .await;
    assert_eq!(created.status, Status::Ok);
    let id = created.body["id"].as_str().unwrap().to_string();

    let listed = service
        .handle(
            ApiRequest::new(Method::Get, "reports")
                .with_query("filterByFormula", r#"{status} = "active""#)
                .with_query("pageSize", "5"),
        )
        .await;
    assert_eq!(listed.status, Status::Ok);
    assert_eq!(listed.body["records"][0]["id"], id.as_str());
    assert!(listed.body.get("offset").is_none());

    let bad = service
        .handle(ApiRequest::new(Method::Get, "reports").with_query("offset", "garbage"))
        .await;
    assert_eq!(bad.status, Status::BadRequest);
    assert_eq!(bad.body["error"]["type"], "INVALID_REQUEST");

    let missing = service
        .handle(ApiRequest::new(Method::Get, "reports").with_record_id(rid(9)))
        .await;
    assert_eq!(missing.status, Status::NotFound);

    let deleted = service
        .handle(ApiRequest::new(Method::Delete, "reports").with_record_id(id.clone()))
        .await;
    assert_eq!(deleted.status, Status::Ok);
    assert_eq!(deleted.body, json!({ "id": id, "deleted": true }));
}

#[tokio::test]
async fn test_fluent_client_follows_cursor() {
    let ctx = TestContext::new().await;
    let mut sql = String::new();
    for n in 1..=7 {
        sql.push_str(&format!(
            "INSERT INTO reports (record_id, status) VALUES ('{}', '{}');\n",
            rid(n),
            if n % 2 == 0 { "even" } else { "odd" }
        ));
    }
    ctx.seed(&sql).await;

    let base = Base::new(ctx.service());
    let odd = base
        .table("Reports")
        .select(ListOptions::new().filter(r#"{Status} = "odd""#).page_size(2))
        .all()
        .await
        .unwrap();
    assert_eq!(odd.len(), 4);

    let first = base
        .table("Reports")
        .select(ListOptions::new().page_size(3))
        .first_page()
        .await
        .unwrap();
    assert_eq!(first.len(), 3);
}
