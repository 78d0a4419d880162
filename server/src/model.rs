//! Records owned by the two stores, plus the request payloads that feed them.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const TITLE_MAX_CHARS: usize = 200;

/// A named, completable item. `version` starts at 1 and is bumped by exactly
/// one on every applied mutation; it is also the item's entity tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl Item {
    pub fn new(title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            done: false,
            // Microseconds are what the SQLite store keeps.
            created_at: Utc::now().trunc_subsecs(6),
            version: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateItem {
    pub title: String,
}

impl CreateItem {
    /// Returns the trimmed title, or a validation error when it is blank or too long.
    pub fn into_title(self) -> Result<String, AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title is required"));
        }
        check_title_length(title)?;
        Ok(title.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub done: Option<bool>,
}

impl UpdateItem {
    /// Normalizes the payload into the changes a store applies. A blank title
    /// leaves the stored one untouched.
    pub fn into_changes(self) -> Result<ItemChanges, AppError> {
        let title = match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => {
                check_title_length(title)?;
                Some(title.to_string())
            }
            _ => None,
        };
        Ok(ItemChanges {
            title,
            done: self.done,
        })
    }
}

/// Field mutations for a conditional update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub done: Option<bool>,
}

impl ItemChanges {
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title.clone_from(title);
        }
        if let Some(done) = self.done {
            item.done = done;
        }
    }
}

fn check_title_length(title: &str) -> Result<(), AppError> {
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(AppError::validation(format!(
            "title must not exceed {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

/// Identifies one execution of a keyed write request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub key: String,
    pub method: String,
    pub path_and_query: String,
    pub request_hash: String,
}

/// A completed keyed write and the response it produced the first time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub id: Uuid,
    pub fingerprint: Fingerprint,
    pub status_code: u16,
    pub content_type: String,
    pub response_body: Vec<u8>,
    pub created_at: DateTime<Utc>,
}
