use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// CurrentUser
///
/// The identity resolved from the refresh-token claim. This is what the admin UI
/// receives from `GET /session/me` and what the gate authorizes against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CurrentUser {
    // Backend user identifier, always carried as a string.
    pub id: String,
    pub email: String,
    // Raw role claim, e.g. "ADMIN". Mapped to `policy::Role` for authorization.
    pub role: String,
}

/// ErrorResponse
///
/// JSON body returned by the gate's own endpoints on failure.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail".to_string(),
            message: message.into(),
        }
    }
}
