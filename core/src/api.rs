//! Structured JSON bodies shared by both HTTP services.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// `{"code": .., "msg": ..}` acknowledgement and error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub code: u16,
    pub msg: String,
}

impl Ack {
    pub fn new(code: StatusCode, msg: impl Into<String>) -> Self {
        Self { code: code.as_u16(), msg: msg.into() }
    }
}

/// Handler error rendered as an [`Ack`] with the matching status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed,
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => msg,
            ApiError::MethodNotAllowed => "Method Not Allowed.".to_string(),
        };
        let body = serde_json::json!({ "code": status.as_u16(), "msg": msg }).to_string();
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Decode(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Serialize `payload` up front so an encoding failure becomes a structured 500
/// instead of axum's plain-text one.
pub fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response, ApiError> {
    match serde_json::to_vec(payload) {
        Ok(bytes) => {
            Ok((status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response())
        }
        Err(e) => {
            tracing::warn!("Unable to serialize response: {}", e);
            Err(ApiError::Internal("Error occurred while encoding the response.".into()))
        }
    }
}

/// Decode a JSON request body whatever `Content-Type` the client declared.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Unable to parse payload: {}", e);
        ApiError::BadRequest("Unable to parse payload.".into())
    })
}

/// Fallback for routes hit with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_body_or_reports_bad_request() {
        let terms: Vec<String> = decode_json(br#"["apple", "cake"]"#).unwrap();
        assert_eq!(terms, vec!["apple", "cake"]);

        let err = decode_json::<Vec<String>>(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(decode_json::<Vec<String>>(br#"{"url": "x"}"#).is_err());
    }
}
