//! The user-facing JSON web server

use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest, HttpResponse};
use anyhow::anyhow;
use serde_json::json;
use std::future::{ready, Ready};

pub mod protocol;
pub mod routes;

/// Header carrying the id of the signed-in user, set by the session layer
/// in front of this service
pub const USER_HEADER: &str = "X-User-Id";

#[derive(Debug)]
pub struct WebError {
    err: anyhow::Error,
    status: StatusCode,
}

impl WebError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        WebError { err, status }
    }

    pub fn unauthorized() -> Self {
        WebError {
            err: anyhow!("Login required"),
            status: StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        // internal details stay in the log, not the response
        let message = match self.status {
            StatusCode::INTERNAL_SERVER_ERROR => "Server error".to_string(),
            _ => self.to_string(),
        };

        // request faults answer like /api/predict does; the rest like the
        // session and storage routes
        let body = match self.status {
            StatusCode::UNAUTHORIZED | StatusCode::INTERNAL_SERVER_ERROR => {
                json!({ "success": false, "message": message })
            }
            _ => json!({ "success": false, "error": message }),
        };

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> WebError {
        tracing::error!("request failed: {err:#}");
        WebError {
            err,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<actix_web::error::BlockingError> for WebError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        WebError::from(anyhow!(err.to_string()))
    }
}

/// The signed-in user making the request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserId(pub i64);

impl FromRequest for UserId {
    type Error = WebError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let id = req
            .headers()
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .map(UserId);
        ready(id.ok_or_else(WebError::unauthorized))
    }
}

/// JSON body extraction with a size cap and JSON error replies
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let status = match err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                _ => StatusCode::BAD_REQUEST,
            };
            tracing::info!("rejected request body: {err}");
            WebError::new(status, anyhow!("Invalid request body: {err}")).into()
        })
}

/// Query string extraction with JSON error replies
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req| {
        WebError::new(StatusCode::BAD_REQUEST, anyhow!("Invalid query: {err}")).into()
    })
}

/// Fallback for unknown routes
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "Not found" }))
}
