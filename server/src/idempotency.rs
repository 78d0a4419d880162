//! Replay of keyed write requests.
//!
//! A request inside the configured scope that carries `Idempotency-Key` is
//! fingerprinted by key, method, path and a SHA-256 of path plus body. The
//! first execution's response is captured and recorded; later requests with
//! the same fingerprint get the recorded response without reaching the
//! handler. Requests without a key pass straight through.

use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use http_body_util::LengthLimitError;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    model::{Fingerprint, IdempotencyRecord},
    state::AppState,
    store::StoreError,
};

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";
pub const KEY_MAX_CHARS: usize = 200;
pub const PATH_MAX_CHARS: usize = 500;
const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// The single (method, path) pair whose requests are eligible for replay.
#[derive(Clone, Debug)]
pub struct IdempotencyScope {
    pub method: Method,
    pub path: String,
}

impl IdempotencyScope {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        *method == self.method && path.eq_ignore_ascii_case(&self.path)
    }
}

impl Default for IdempotencyScope {
    fn default() -> Self {
        Self::new(Method::POST, "/items")
    }
}

/// Upper-case hex SHA-256 of `path_and_query`, a newline, and the raw body.
pub fn request_hash(path_and_query: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path_and_query.as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    hex::encode_upper(hasher.finalize())
}

/// Reads the key header. Blank keys count as absent.
pub fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| AppError::validation("Idempotency-Key must be visible ASCII"))?
        .trim();
    if key.is_empty() {
        return Ok(None);
    }
    if key.chars().count() > KEY_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Idempotency-Key must not exceed {KEY_MAX_CHARS} characters"
        )));
    }
    Ok(Some(key.to_string()))
}

pub async fn intercept(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match replay_or_record(&state, request, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn replay_or_record(state: &AppState, request: Request, next: Next) -> AppResult<Response> {
    if !state
        .idempotency_scope
        .matches(request.method(), request.uri().path())
    {
        return Ok(next.run(request).await);
    }
    let Some(key) = idempotency_key(request.headers())? else {
        return Ok(next.run(request).await);
    };

    // Buffer the body once; the same bytes feed the hash and the handler.
    let (parts, body) = request.into_parts();
    let limit = state.max_body_bytes;
    let body = body::to_bytes(body, limit).await.map_err(|err| {
        if exceeds_limit(&err) {
            AppError::PayloadTooLarge { limit }
        } else {
            tracing::debug!(error = %err, "failed to read keyed request body");
            AppError::validation("request body could not be read")
        }
    })?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());
    if path_and_query.chars().count() > PATH_MAX_CHARS {
        return Err(AppError::validation(format!(
            "keyed request path must not exceed {PATH_MAX_CHARS} characters"
        )));
    }
    let fingerprint = Fingerprint {
        request_hash: request_hash(&path_and_query, &body),
        key,
        method: parts.method.to_string(),
        path_and_query,
    };

    let _claim = state.idempotency.claim(&fingerprint).await;

    if let Some(record) = state.idempotency.lookup(&fingerprint).await? {
        tracing::debug!(key = %fingerprint.key, status = record.status_code, "replaying recorded response");
        return Ok(replay(&record));
    }

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;
    if response.status().is_server_error() {
        tracing::warn!(key = %fingerprint.key, status = %response.status(), "keyed request failed, not recorded");
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let captured = body::to_bytes(body, usize::MAX)
        .await
        .map_err(|err| AppError::internal(format!("failed to capture response body: {err}")))?;
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let record = IdempotencyRecord {
        id: Uuid::new_v4(),
        fingerprint: fingerprint.clone(),
        status_code: parts.status.as_u16(),
        content_type,
        response_body: captured.to_vec(),
        created_at: Utc::now(),
    };

    match state.idempotency.insert(record).await {
        Ok(()) => {
            tracing::debug!(key = %fingerprint.key, status = %parts.status, "recorded keyed response");
        }
        Err(StoreError::DuplicateKey) => match state.idempotency.lookup(&fingerprint).await {
            Ok(Some(winner)) => {
                tracing::info!(key = %fingerprint.key, "concurrent keyed request won, serving its response");
                return Ok(replay(&winner));
            }
            Ok(None) => {
                tracing::warn!(key = %fingerprint.key, "duplicate fingerprint reported but no record found");
            }
            Err(err) => {
                tracing::error!(key = %fingerprint.key, error = %err, "re-lookup after duplicate failed");
            }
        },
        Err(err) => {
            tracing::error!(key = %fingerprint.key, error = %err, "failed to record keyed response");
        }
    }

    Ok(Response::from_parts(parts, Body::from(captured)))
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

fn replay(record: &IdempotencyRecord) -> Response {
    let status = StatusCode::from_u16(record.status_code).unwrap_or(StatusCode::OK);
    let mut response = (status, Body::from(record.response_body.clone())).into_response();
    if let Ok(content_type) = HeaderValue::from_str(&record.content_type) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    response
}
