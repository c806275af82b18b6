//! Airtable record endpoints.

use airgres_core::{ApiRequest, Method};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http,
    response::Response,
    routing::get,
    Router,
};
use serde_json::Value;

use crate::error::{into_http, AppError};
use crate::AppState;

/// Record routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v0/:base/:table",
            get(handle_table)
                .post(handle_table)
                .patch(handle_table)
                .put(handle_table)
                .delete(handle_table),
        )
        .route(
            "/v0/:base/:table/:record_id",
            get(handle_record)
                .patch(handle_record)
                .put(handle_record)
                .delete(handle_record),
        )
}

/// Table-level requests: list, create, batch update and batch destroy.
async fn handle_table(
    State(state): State<AppState>,
    method: http::Method,
    Path((base, table)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, AppError> {
    dispatch(&state, &method, &base, table, None, query, &body).await
}

/// Record-level requests: fetch, update and destroy one record.
async fn handle_record(
    State(state): State<AppState>,
    method: http::Method,
    Path((base, table, record_id)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, AppError> {
    dispatch(&state, &method, &base, table, Some(record_id), query, &body).await
}

async fn dispatch(
    state: &AppState,
    method: &http::Method,
    base: &str,
    table: String,
    record_id: Option<String>,
    query: Vec<(String, String)>,
    body: &Bytes,
) -> Result<Response, AppError> {
    let method: Method = method.as_str().parse()?;
    let service = state.service(base).await?;

    let mut request = ApiRequest::new(method, table);
    request.record_id = record_id;
    request.query = query;
    request.body = parse_body(body)?;

    Ok(into_http(service.handle(request).await))
}

fn parse_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body() {
        assert!(parse_body(&Bytes::new()).unwrap().is_none());
        assert!(parse_body(&Bytes::from_static(b"  \n")).unwrap().is_none());
        assert_eq!(
            parse_body(&Bytes::from_static(br#"{"fields":{}}"#)).unwrap(),
            Some(serde_json::json!({"fields": {}}))
        );
        assert!(matches!(
            parse_body(&Bytes::from_static(b"{nope")),
            Err(AppError::BadRequest(_))
        ));
    }
}
