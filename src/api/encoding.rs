use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::{json, Map, Value};

use crate::atomic::Processed;
use crate::error::AuthorizationError;
use crate::model::{Error, ErrorList, HookResponse, Outcome};

pub const JSON_API: &str = "application/vnd.api+json";

/// How successful primary data is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    Resources,
    Identifiers,
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn document(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, JSON_API)], Json(body)).into_response()
}

pub fn errors(errors: &ErrorList) -> Response {
    let status = errors.status().map(status_of).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    document(status, json!({ "errors": errors }))
}

pub fn halted(response: HookResponse) -> Response {
    let status = status_of(response.status);
    match response.body {
        Value::Null => status.into_response(),
        body => document(status, body),
    }
}

/// Exceptional errors escaping the pipeline. Authorization errors keep their
/// status; anything else is logged and reported as a 500.
pub fn failure(err: anyhow::Error) -> Response {
    if let Some(auth) = err.downcast_ref::<AuthorizationError>() {
        let error = Error::new(auth.status()).with_detail(auth.to_string());
        return errors(&ErrorList::from(error));
    }

    error!("Request failed: {:#}", err);
    errors(&ErrorList::from(
        Error::new(500).with_title("Internal Server Error"),
    ))
}

pub fn outcome(outcome: Outcome, success: StatusCode, render: Render) -> Response {
    match outcome {
        Outcome::Succeeded(payload) => {
            let mut body = Map::new();
            if let Some(data) = &payload.data {
                let rendered = match render {
                    Render::Resources => data.to_resources(),
                    Render::Identifiers => data.to_identifiers(),
                };
                body.insert("data".into(), rendered);
            }
            if !payload.meta.is_empty() {
                body.insert("meta".into(), Value::Object(payload.meta));
            }

            if body.is_empty() {
                StatusCode::NO_CONTENT.into_response()
            } else if payload.data.is_none() {
                document(StatusCode::OK, Value::Object(body))
            } else {
                document(success, Value::Object(body))
            }
        }
        Outcome::Failed(list) => errors(&list),
        Outcome::Halted(response) => halted(response),
    }
}

pub fn processed(processed: Processed) -> Response {
    match processed {
        Processed::Succeeded(results) if results.all_empty() => {
            StatusCode::NO_CONTENT.into_response()
        }
        Processed::Succeeded(results) => document(StatusCode::OK, results.to_value()),
        Processed::Failed(list) => errors(&list),
        Processed::Halted(response) => halted(response),
    }
}
