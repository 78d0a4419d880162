//! Error types for the items API client.
//!
//! # Design
//! The statuses a caller has to react to differently get their own variant:
//! a missing item, a stale tag (re-read and retry), and a missing tag (a
//! programming error). Other non-2xx responses land in `HttpError` with the
//! raw status code and body for debugging.

use thiserror::Error;

/// Errors returned by `ItemClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404, the requested item does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned 412, the item changed since the tag was read.
    #[error("precondition failed: the item was modified concurrently")]
    PreconditionFailed,

    /// The server returned 428, the update carried no `If-Match` header.
    #[error("precondition required: send the item's entity tag")]
    PreconditionRequired,

    /// The server returned 400 with a `{"message": ...}` body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The server returned a non-2xx status not covered above.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// A successful response lacked a usable `ETag` header.
    #[error("missing or malformed ETag header")]
    MissingTag,

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}
