//! Gateway wire types.

use serde::{Deserialize, Serialize};

/// Header carrying the request id; echoed on every `/commands` response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body of `POST /commands`: `{ "message": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub message: String,
}
