//! Stateless HTTP request builder and response parser for the items API.
//!
//! # Design
//! `ItemClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The caller executes the actual HTTP round-trip, keeping the core
//! deterministic and free of I/O dependencies.
//!
//! The two write protocols are explicit in the signatures: creates take an
//! optional idempotency key (reuse it, with the same payload, when retrying),
//! and updates take the entity tag from a previous read.

use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{CreateItem, Item, Tagged, UpdateItem};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const IF_MATCH_HEADER: &str = "if-match";
pub const ETAG_HEADER: &str = "etag";

/// Synchronous, stateless client for the items API.
#[derive(Debug, Clone)]
pub struct ItemClient {
    base_url: String,
}

impl ItemClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_list_items(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/items", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_get_item(&self, id: Uuid) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/items/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_item(
        &self,
        input: &CreateItem,
        idempotency_key: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(key) = idempotency_key {
            headers.push((IDEMPOTENCY_KEY_HEADER.to_string(), key.to_string()));
        }
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/items", self.base_url),
            headers,
            body: Some(body),
        })
    }

    pub fn build_update_item(&self, id: Uuid, input: &UpdateItem, tag: i64) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            path: format!("{}/items/{id}", self.base_url),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                (IF_MATCH_HEADER.to_string(), format!("\"{tag}\"")),
            ],
            body: Some(body),
        })
    }

    pub fn parse_list_items(&self, response: HttpResponse) -> Result<Vec<Item>, ApiError> {
        check_status(&response, 200)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    pub fn parse_get_item(&self, response: HttpResponse) -> Result<Tagged<Item>, ApiError> {
        check_status(&response, 200)?;
        parse_tagged(&response)
    }

    pub fn parse_create_item(&self, response: HttpResponse) -> Result<Item, ApiError> {
        check_status(&response, 201)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    pub fn parse_update_item(&self, response: HttpResponse) -> Result<Tagged<Item>, ApiError> {
        check_status(&response, 200)?;
        parse_tagged(&response)
    }
}

/// Reads a version out of an `ETag` value such as `"3"` or `W/"3"`.
pub fn parse_etag(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw).trim();
    raw.trim_matches('"').trim().parse().ok()
}

fn parse_tagged(response: &HttpResponse) -> Result<Tagged<Item>, ApiError> {
    let tag = response
        .header(ETAG_HEADER)
        .and_then(parse_etag)
        .ok_or(ApiError::MissingTag)?;
    let value = serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))?;
    Ok(Tagged { value, tag })
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    match response.status {
        404 => Err(ApiError::NotFound),
        412 => Err(ApiError::PreconditionFailed),
        428 => Err(ApiError::PreconditionRequired),
        400 => {
            let message = serde_json::from_str::<serde_json::Value>(&response.body)
                .ok()
                .and_then(|body| body["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| response.body.clone());
            Err(ApiError::BadRequest(message))
        }
        status => Err(ApiError::HttpError {
            status,
            body: response.body.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM_JSON: &str = r#"{"id":"00000000-0000-0000-0000-000000000001","title":"Test","done":false,"createdAt":"2025-01-01T00:00:00Z","version":2}"#;

    fn client() -> ItemClient {
        ItemClient::new("http://localhost:3000")
    }

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_list_items_produces_correct_request() {
        let req = client().build_list_items();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/items");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_get_item_produces_correct_request() {
        let req = client().build_get_item(Uuid::nil());
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.path,
            "http://localhost:3000/items/00000000-0000-0000-0000-000000000000"
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn build_create_item_without_key() {
        let input = CreateItem {
            title: "Buy milk".to_string(),
        };
        let req = client().build_create_item(&input, None).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/items");
        assert!(req.header("Idempotency-Key").is_none());
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["title"], "Buy milk");
    }

    #[test]
    fn build_create_item_carries_idempotency_key() {
        let input = CreateItem {
            title: "Buy milk".to_string(),
        };
        let req = client().build_create_item(&input, Some("order-42")).unwrap();
        assert_eq!(req.header("Idempotency-Key"), Some("order-42"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn build_update_item_sends_quoted_tag() {
        let input = UpdateItem {
            title: Some("Updated".to_string()),
            done: None,
        };
        let req = client().build_update_item(Uuid::nil(), &input, 3).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.header("If-Match"), Some("\"3\""));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["title"], "Updated");
        assert!(body.get("done").is_none());
    }

    #[test]
    fn parse_get_item_reads_etag() {
        let tagged = client()
            .parse_get_item(response(200, &[("ETag", "\"2\"")], ITEM_JSON))
            .unwrap();
        assert_eq!(tagged.tag, 2);
        assert_eq!(tagged.value.title, "Test");
    }

    #[test]
    fn parse_get_item_without_etag_fails() {
        let err = client().parse_get_item(response(200, &[], ITEM_JSON)).unwrap_err();
        assert!(matches!(err, ApiError::MissingTag));
    }

    #[test]
    fn parse_get_item_not_found() {
        let err = client().parse_get_item(response(404, &[], "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_update_item_maps_precondition_statuses() {
        let err = client().parse_update_item(response(412, &[], "")).unwrap_err();
        assert!(matches!(err, ApiError::PreconditionFailed));
        let err = client().parse_update_item(response(428, &[], "")).unwrap_err();
        assert!(matches!(err, ApiError::PreconditionRequired));
    }

    #[test]
    fn parse_bad_request_extracts_message() {
        let err = client()
            .parse_update_item(response(400, &[], r#"{"message":"invalid tag format"}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "invalid tag format"));
    }

    #[test]
    fn parse_create_item_wrong_status() {
        let err = client()
            .parse_create_item(response(500, &[], "internal error"))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
    }

    #[test]
    fn parse_list_items_bad_json() {
        let err = client().parse_list_items(response(200, &[], "not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn etag_parsing_accepts_weak_and_strong() {
        assert_eq!(parse_etag("\"7\""), Some(7));
        assert_eq!(parse_etag("W/\"7\""), Some(7));
        assert_eq!(parse_etag("banana"), None);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = ItemClient::new("http://localhost:3000/");
        assert_eq!(client.build_list_items().path, "http://localhost:3000/items");
    }
}
