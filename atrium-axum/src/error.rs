use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use atrium_core::AtriumError;

#[derive(Debug)]
pub struct AtriumAxumError(pub anyhow::Error);

impl From<anyhow::Error> for AtriumAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AtriumAxumError {
    fn into_response(self) -> Response {
        // A structured error keeps its status and field errors no matter how
        // many anyhow contexts wrap it; anything else surfaces as an opaque
        // GeneralError.
        let safe = match self.0.chain().find_map(|e| e.downcast_ref::<AtriumError>()) {
            Some(err) => err.sanitize_for_client(),
            None => AtriumError::general_error(self.0.to_string()).sanitize_for_client(),
        };

        let status =
            StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_json())).into_response()
    }
}
