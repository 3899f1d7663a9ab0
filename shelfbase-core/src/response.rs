//! Uniform result envelope returned by every collection operation
//!
//! ```json
//! { "data": {...} | null, "count": 1, "status": "ok" }
//! { "data": null, "status": "error", "errors": "not-found", "message": "..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ShelfError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
    Unauthorized,
    Unauthenticated,
}

/// Machine-readable failure code.
///
/// Collections only emit `NotFound` and `BadRequest`; the rest are reserved
/// for hosts layering network or auth concerns on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    NotFound,
    ServerError,
    NetworkError,
    ValidationError,
    BadRequest,
    DataExists,
    UnknownError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(data: T, count: usize) -> Self {
        Response {
            data: Some(data),
            count: Some(count),
            status: Status::Ok,
            errors: None,
            message: None,
        }
    }

    /// Error envelope carrying only a message
    pub fn error(message: impl Into<String>) -> Self {
        Response {
            data: None,
            count: None,
            status: Status::Error,
            errors: None,
            message: Some(message.into()),
        }
    }

    pub fn error_with(code: ErrorCode, message: impl Into<String>) -> Self {
        Response {
            errors: Some(code),
            ..Self::error(message)
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error_with(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error_with(ErrorCode::BadRequest, message)
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn is_not_found(&self) -> bool {
        self.errors == Some(ErrorCode::NotFound)
    }

    /// Payload on success, the message (or status) otherwise
    pub fn into_result(self) -> Result<T, String> {
        match (self.status, self.data) {
            (Status::Ok, Some(data)) => Ok(data),
            (status, _) => Err(self
                .message
                .unwrap_or_else(|| format!("operation finished with status {:?}", status))),
        }
    }
}

impl<T> From<ShelfError> for Response<T> {
    /// Malformed input becomes `bad-request`; validation and storage failures
    /// keep only their message.
    fn from(err: ShelfError) -> Self {
        match err {
            ShelfError::InvalidQuery(_) => Response::bad_request(err.to_string()),
            other => Response::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_wire_shape() {
        let resp = Response::ok(json!({"name": "Alice"}), 1);
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"data": {"name": "Alice"}, "count": 1, "status": "ok"})
        );
        assert!(resp.is_ok());
    }

    #[test]
    fn test_not_found_wire_shape() {
        let resp: Response<serde_json::Value> = Response::not_found("no match");
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"data": null, "status": "error", "errors": "not-found", "message": "no match"})
        );
        assert!(resp.is_not_found());
    }

    #[test]
    fn test_from_error_mapping() {
        let resp: Response<()> = ShelfError::InvalidQuery("Unknown operator: $x".into()).into();
        assert_eq!(resp.errors, Some(ErrorCode::BadRequest));

        let resp: Response<()> = ShelfError::validation(&["a".into(), "b".into()]).into();
        assert_eq!(resp.errors, None);
        assert_eq!(resp.message.as_deref(), Some("a; b"));

        let resp: Response<()> = ShelfError::Storage("quota exceeded".into()).into();
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.message.as_deref(), Some("Storage error: quota exceeded"));
    }

    #[test]
    fn test_reserved_codes_round_trip() {
        let raw = json!({"data": null, "status": "unauthenticated", "errors": "network-error"});
        let resp: Response<u8> = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.status, Status::Unauthenticated);
        assert_eq!(resp.errors, Some(ErrorCode::NetworkError));
        assert!(resp.into_result().is_err());
    }
}
