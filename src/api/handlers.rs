use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use log::{debug, info};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::encoding::{self, Render};
use crate::atomic::parsers::HrefParser;
use crate::atomic::{operation_parser, operations_parser, Href, OpCode, ParsedHref, Processor};
use crate::bus::{FetchManyQuery, FetchOneQuery, FetchRelatedQuery, FetchRelationshipQuery, Message};
use crate::error::ParseError;
use crate::model::{Error, ErrorList, QueryParams, RequestContext};
use crate::server::{JsonApiServer, Server};

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<JsonApiServer>,
    pub processor: Processor,
}

impl AppState {
    pub fn new(server: Arc<JsonApiServer>, processor: Processor) -> Self {
        Self { server, processor }
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Flat query string pairs to query parameters, nesting one level of
/// brackets: `filter[title]=x` becomes `{"filter": {"title": "x"}}`.
pub fn query_params(pairs: HashMap<String, String>) -> QueryParams {
    let mut params = Map::new();
    for (key, value) in pairs {
        match key.split_once('[') {
            Some((outer, inner)) if inner.ends_with(']') => {
                let inner = inner.trim_end_matches(']').to_string();
                let entry = params
                    .entry(outer.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(nested) = entry {
                    nested.insert(inner, Value::String(value));
                }
            }
            _ => {
                params.insert(key, Value::String(value));
            }
        }
    }
    QueryParams::from(params)
}

fn not_found(path: &str) -> Response {
    encoding::errors(&ErrorList::from(
        Error::not_found().with_detail(format!("No resource lives at {}.", path)),
    ))
}

fn bad_request(err: ParseError) -> Response {
    encoding::errors(&err.to_error_list())
}

fn resolve(state: &AppState, path: &str) -> Result<ParsedHref, Response> {
    HrefParser::new(state.server.as_ref())
        .safe(&Href::new(path))
        .ok_or_else(|| not_found(path))
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|err| bad_request(ParseError::new("/", format!("Malformed JSON: {}", err))))
}

pub async fn atomic(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    let document = match parse_body(&body) {
        Ok(document) => document,
        Err(response) => return response,
    };

    let operations = match operations_parser(state.server.as_ref()).parse_document(&document) {
        Ok(operations) => operations,
        Err(err) => {
            info!("Rejected atomic request: {}", err);
            return bad_request(err);
        }
    };

    debug!("Processing {} atomic operation(s)", operations.len());
    match state.processor.process(&context, operations).await {
        Ok(processed) => encoding::processed(processed),
        Err(err) => encoding::failure(err),
    }
}

pub async fn fetch_many(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
) -> Response {
    let target = match resolve(&state, uri.path()) {
        Ok(target) => target,
        Err(response) => return response,
    };

    let dispatcher = state.processor.dispatcher();
    let query = FetchManyQuery::new(context, target.resource_type).with_query(query_params(pairs));
    match dispatcher.dispatch(dispatcher.hooked(query)).await {
        Ok(outcome) => encoding::outcome(outcome, StatusCode::OK, Render::Resources),
        Err(err) => encoding::failure(err),
    }
}

pub async fn fetch_one(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
) -> Response {
    let (resource_type, id) = match resolve(&state, uri.path()) {
        Ok(ParsedHref {
            resource_type,
            id: Some(id),
            ..
        }) => (resource_type, id),
        Ok(_) => return not_found(uri.path()),
        Err(response) => return response,
    };

    let dispatcher = state.processor.dispatcher();
    let query = FetchOneQuery::new(context, resource_type, id).with_query(query_params(pairs));
    match dispatcher.dispatch(dispatcher.hooked(query)).await {
        Ok(outcome) => encoding::outcome(outcome, StatusCode::OK, Render::Resources),
        Err(err) => encoding::failure(err),
    }
}

pub async fn fetch_related(
    State(state): State<AppState>,
    Path((uri_type, id, related)): Path<(String, String, String)>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
) -> Response {
    let parent = uri
        .path()
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or_default();
    let (resource_type, id) = match resolve(&state, parent) {
        Ok(ParsedHref {
            resource_type,
            id: Some(id),
            ..
        }) => (resource_type, id),
        _ => return not_found(uri.path()),
    };

    let field = state
        .server
        .schemas()
        .schema_for(&resource_type)
        .and_then(|schema| schema.relationship_for_uri(&related))
        .map(|relation| relation.name.clone());
    let Some(field) = field else {
        debug!("{} has no relationship at '{}' ({})", uri_type, related, id);
        return not_found(uri.path());
    };

    let dispatcher = state.processor.dispatcher();
    let query = FetchRelatedQuery::new(context, resource_type, id, field)
        .with_query(query_params(pairs));
    match dispatcher.dispatch(dispatcher.hooked(query)).await {
        Ok(outcome) => encoding::outcome(outcome, StatusCode::OK, Render::Resources),
        Err(err) => encoding::failure(err),
    }
}

pub async fn fetch_relationship(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
) -> Response {
    let (resource_type, id, field) = match resolve(&state, uri.path()) {
        Ok(ParsedHref {
            resource_type,
            id: Some(id),
            relationship: Some(field),
            ..
        }) => (resource_type, id, field),
        Ok(_) => return not_found(uri.path()),
        Err(response) => return response,
    };

    let dispatcher = state.processor.dispatcher();
    let query = FetchRelationshipQuery::new(context, resource_type, id, field)
        .with_query(query_params(pairs));
    match dispatcher.dispatch(dispatcher.hooked(query)).await {
        Ok(outcome) => encoding::outcome(outcome, StatusCode::OK, Render::Identifiers),
        Err(err) => encoding::failure(err),
    }
}

/// Run a resource or relationship endpoint as the equivalent single atomic
/// operation, addressed by the request path.
#[allow(clippy::too_many_arguments)]
async fn mutate(
    state: &AppState,
    context: RequestContext,
    op: OpCode,
    path: &str,
    pairs: HashMap<String, String>,
    body: Bytes,
    success: StatusCode,
    render: Render,
) -> Response {
    if let Err(response) = resolve(state, path) {
        return response;
    }

    let document = match parse_body(&body) {
        Ok(document) => document,
        Err(response) => return response,
    };

    let mut raw = json!({ "op": op.as_str(), "href": path });
    if let Some(data) = document.get("data") {
        raw["data"] = data.clone();
    }
    if let Some(meta) = document.get("meta") {
        raw["meta"] = meta.clone();
    }

    let operation = match operation_parser(state.server.as_ref()).parse(&raw) {
        Ok(operation) => operation,
        Err(err) => return bad_request(err),
    };

    match state
        .processor
        .execute_atomically(&context, &query_params(pairs), operation)
        .await
    {
        Ok(outcome) => encoding::outcome(outcome, success, render),
        Err(err) => encoding::failure(err),
    }
}

pub async fn store(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    mutate(
        &state,
        context,
        OpCode::Add,
        uri.path(),
        pairs,
        body,
        StatusCode::CREATED,
        Render::Resources,
    )
    .await
}

pub async fn update(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    mutate(
        &state,
        context,
        OpCode::Update,
        uri.path(),
        pairs,
        body,
        StatusCode::OK,
        Render::Resources,
    )
    .await
}

pub async fn destroy(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
) -> Response {
    mutate(
        &state,
        context,
        OpCode::Remove,
        uri.path(),
        pairs,
        Bytes::new(),
        StatusCode::NO_CONTENT,
        Render::Resources,
    )
    .await
}

pub async fn update_relationship(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    mutate(
        &state,
        context,
        OpCode::Update,
        uri.path(),
        pairs,
        body,
        StatusCode::OK,
        Render::Identifiers,
    )
    .await
}

pub async fn attach_relationship(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    mutate(
        &state,
        context,
        OpCode::Add,
        uri.path(),
        pairs,
        body,
        StatusCode::OK,
        Render::Identifiers,
    )
    .await
}

pub async fn detach_relationship(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<HashMap<String, String>>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    mutate(
        &state,
        context,
        OpCode::Remove,
        uri.path(),
        pairs,
        body,
        StatusCode::OK,
        Render::Identifiers,
    )
    .await
}
