//! Transport-neutral request dispatch.
//!
//! Accepts Airtable REST-shaped requests (method, table, optional record id,
//! query pairs, JSON body) and produces a status class plus a JSON body. The
//! HTTP gateway maps the status class onto HTTP codes.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::query::{ListOptions, SortDirection, SortSpec};
use crate::service::RecordService;
use crate::value::Fields;

/// Outcome class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    NotFound,
    BadRequest,
    ServerError,
}

impl Status {
    /// Error type tag used in error bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::BadRequest => "INVALID_REQUEST",
            Status::ServerError => "SERVER_ERROR",
        }
    }
}

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::Validation(format!("unsupported method {}", other))),
        }
    }
}

/// A request addressed to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub table: String,
    pub record_id: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, table: impl Into<String>) -> Self {
        Self {
            method,
            table: table.into(),
            record_id: None,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A status class with a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: Status,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: Status::Ok,
            body,
        }
    }

    /// Error body: `{"error": {"type": ..., "message": ...}}`.
    pub fn from_error(err: &Error) -> Self {
        let status = err.status();
        Self {
            status,
            body: json!({
                "error": {
                    "type": status.error_type(),
                    "message": err.to_string(),
                }
            }),
        }
    }
}

impl RecordService {
    /// Dispatch one request.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        let method = request.method;
        let table = request.table.clone();
        match self.route(request).await {
            Ok(body) => ApiResponse::ok(body),
            Err(err) => {
                match err.status() {
                    Status::ServerError => {
                        warn!(?method, table = %table, error = %err, "request failed")
                    }
                    _ => debug!(?method, table = %table, error = %err, "request rejected"),
                }
                ApiResponse::from_error(&err)
            }
        }
    }

    async fn route(&self, request: ApiRequest) -> Result<Value> {
        let ApiRequest {
            method,
            table,
            record_id,
            query,
            body,
        } = request;

        match (method, record_id) {
            (Method::Get, Some(id)) => to_json(&self.find(&table, &id).await?),
            (Method::Get, None) => {
                let options = parse_list_options(&query)?;
                to_json(&self.list(&table, &options).await?)
            }
            (Method::Post, Some(_)) => Err(Error::Validation(
                "records are created on the table, not on a record id".into(),
            )),
            (Method::Post, None) => {
                let body = require_body(body)?;
                if let Some(records) = body.get("records") {
                    let batch = parse_batch(records, false)?
                        .into_iter()
                        .map(|(_, fields)| fields)
                        .collect::<Vec<_>>();
                    let created = self.create_many(&table, &batch).await?;
                    Ok(json!({ "records": created }))
                } else {
                    let fields = parse_fields(&body)?;
                    to_json(&self.create(&table, &fields).await?)
                }
            }
            (Method::Patch | Method::Put, Some(id)) => {
                let body = require_body(body)?;
                let fields = parse_fields(&body)?;
                to_json(&self.update(&table, &id, &fields).await?)
            }
            (Method::Patch | Method::Put, None) => {
                let body = require_body(body)?;
                let records = body
                    .get("records")
                    .ok_or_else(|| Error::Validation("body must contain 'records'".into()))?;
                let batch = parse_batch(records, true)?
                    .into_iter()
                    .map(|(id, fields)| (id.unwrap_or_default(), fields))
                    .collect::<Vec<_>>();
                let updated = self.update_many(&table, &batch).await?;
                Ok(json!({ "records": updated }))
            }
            (Method::Delete, Some(id)) => {
                let deleted = self.destroy(&table, std::slice::from_ref(&id)).await?;
                match deleted.into_iter().next() {
                    Some(ack) => to_json(&ack),
                    None => Err(Error::NotFound(format!("record {} not found in {}", id, table))),
                }
            }
            (Method::Delete, None) => {
                let ids = query_values(&query, &["records[]", "records"]);
                let deleted = self.destroy(&table, &ids).await?;
                Ok(json!({ "records": deleted }))
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Upstream(format!("cannot encode response: {}", e)))
}

fn require_body(body: Option<Value>) -> Result<Value> {
    body.ok_or_else(|| Error::Validation("request body is required".into()))
}

fn parse_fields(body: &Value) -> Result<Fields> {
    match body.get("fields") {
        Some(Value::Object(map)) => Ok(Fields::from(map.clone())),
        Some(_) => Err(Error::Validation("'fields' must be an object".into())),
        None => Err(Error::Validation("body must contain 'fields'".into())),
    }
}

fn parse_batch(records: &Value, with_ids: bool) -> Result<Vec<(Option<String>, Fields)>> {
    let items = records
        .as_array()
        .ok_or_else(|| Error::Validation("'records' must be an array".into()))?;
    if items.is_empty() {
        return Err(Error::Validation("'records' must not be empty".into()));
    }
    items
        .iter()
        .map(|item| {
            let id = if with_ids {
                match item.get("id").and_then(Value::as_str) {
                    Some(id) => Some(id.to_string()),
                    None => return Err(Error::Validation("every record needs an 'id'".into())),
                }
            } else {
                None
            };
            Ok((id, parse_fields(item)?))
        })
        .collect()
}

fn query_values(query: &[(String, String)], keys: &[&str]) -> Vec<String> {
    query
        .iter()
        .filter(|(k, _)| keys.contains(&k.as_str()))
        .map(|(_, v)| v.clone())
        .collect()
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("{} must be a non-negative integer", key)))
}

/// `sort[3][field]` → `(3, "field")`.
fn parse_sort_key(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix("sort[")?;
    let (index, attr) = rest.split_once("][")?;
    let attr = attr.strip_suffix(']')?;
    Some((index.parse().ok()?, attr))
}

/// Build list options from Airtable-style query parameters.
pub fn parse_list_options(query: &[(String, String)]) -> Result<ListOptions> {
    let mut options = ListOptions::new();
    let mut sorts: BTreeMap<usize, (Option<String>, Option<SortDirection>)> = BTreeMap::new();

    for (key, value) in query {
        match key.as_str() {
            "filterByFormula" => options.filter_by_formula = Some(value.clone()),
            "maxRecords" => options.max_records = Some(parse_usize(key, value)?),
            "pageSize" => options.page_size = Some(parse_usize(key, value)?),
            "offset" => options.offset = Some(value.clone()),
            "fields[]" | "fields" => options.fields.push(value.clone()),
            other => match parse_sort_key(other) {
                Some((index, "field")) => sorts.entry(index).or_default().0 = Some(value.clone()),
                Some((index, "direction")) => {
                    sorts.entry(index).or_default().1 = Some(value.parse()?)
                }
                _ => {}
            },
        }
    }

    for (index, (field, direction)) in sorts {
        let field = field.ok_or_else(|| {
            Error::Validation(format!("sort[{}] is missing a field", index))
        })?;
        options.sort.push(SortSpec {
            field,
            direction: direction.unwrap_or_default(),
        });
    }

    Ok(options)
}
