//! Optimistic concurrency for item updates.
//!
//! An item's `version` is published as a strong entity tag (`"3"`) on reads.
//! Updates must send it back in `If-Match`; the store then applies the change
//! only if the version is still current, bumping it by one.

use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    model::{Item, ItemChanges},
    store::ItemStore,
};

pub fn format_tag(version: i64) -> String {
    format!("\"{version}\"")
}

pub fn tag_header(version: i64) -> (header::HeaderName, HeaderValue) {
    // Digits and quotes only, always a valid header value.
    let value = HeaderValue::from_str(&format_tag(version))
        .unwrap_or_else(|_| HeaderValue::from_static("\"0\""));
    (header::ETAG, value)
}

/// Parses an `If-Match` value such as `"3"`, `W/"3"` or ` 3 ` into a version.
pub fn parse_tag(raw: &str) -> AppResult<i64> {
    let mut tag = raw.trim();
    if let Some(rest) = tag.strip_prefix("W/") {
        tag = rest.trim();
    }
    tag.trim_matches('"')
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("invalid tag format: {raw:?}")))
}

/// Extracts the expected version from `If-Match`. A missing or blank header
/// is a missing precondition, not a malformed one.
pub fn expected_version(headers: &HeaderMap) -> AppResult<i64> {
    let value = headers
        .get(header::IF_MATCH)
        .ok_or(AppError::PreconditionRequired)?;
    let raw = value
        .to_str()
        .map_err(|_| AppError::validation("invalid tag format: If-Match must be visible ASCII"))?;
    if raw.trim().is_empty() {
        return Err(AppError::PreconditionRequired);
    }
    parse_tag(raw)
}

/// Hands the compare-and-increment to the store and maps its outcome.
pub async fn conditional_update(
    store: &dyn ItemStore,
    id: Uuid,
    expected: i64,
    changes: &ItemChanges,
) -> AppResult<Item> {
    match store.update_if_version(id, expected, changes).await {
        Ok(item) => {
            tracing::debug!(%id, version = item.version, "conditional update applied");
            Ok(item)
        }
        Err(err) => {
            let err = AppError::from(err);
            if let AppError::PreconditionFailed { current } = &err {
                tracing::info!(%id, expected, current, "conditional update rejected");
            }
            Err(err)
        }
    }
}
