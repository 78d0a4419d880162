use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    concurrency,
    error::{AppError, AppResult},
    model::{CreateItem, Item, UpdateItem},
    state::AppState,
};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(state.items.list().await?))
}

/// Ids that are not UUIDs name no item, so they are a 404 like any unknown id.
fn item_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found("item not found"))
}

/// An empty body is a valid update that changes nothing but the version.
fn update_payload(body: &[u8]) -> AppResult<UpdateItem> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(UpdateItem::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::validation(format!("invalid update payload: {err}")))
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let id = item_id(&id)?;
    let item = state
        .items
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("item not found"))?;
    Ok(([concurrency::tag_header(item.version)], Json(item)).into_response())
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateItem>,
) -> AppResult<Response> {
    let title = input.into_title()?;
    let item = state.items.create(Item::new(title)).await?;
    tracing::info!(id = %item.id, "item created");
    let location = (header::LOCATION, format!("/items/{}", item.id));
    Ok((StatusCode::CREATED, [location], Json(item)).into_response())
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let id = item_id(&id)?;
    let expected = concurrency::expected_version(&headers)?;
    let changes = update_payload(&body)?.into_changes()?;
    let item =
        concurrency::conditional_update(state.items.as_ref(), id, expected, &changes).await?;
    Ok(([concurrency::tag_header(item.version)], Json(item)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_body_means_no_changes() {
        let payload = update_payload(b"").unwrap();
        assert!(payload.title.is_none() && payload.done.is_none());
        assert!(update_payload(b"  \n").unwrap().done.is_none());
    }

    #[test]
    fn malformed_update_body_is_a_validation_error() {
        assert!(matches!(update_payload(b"{"), Err(AppError::Validation(_))));
    }

    #[test]
    fn non_uuid_id_is_not_found() {
        assert!(matches!(item_id("42"), Err(AppError::NotFound(_))));
        assert!(item_id("00000000-0000-0000-0000-000000000000").is_ok());
    }
}
