use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// Payload carried by `Error` reply frames.
///
/// `status` follows HTTP conventions for the well-known values (404 for an
/// unmatched path, 500 for an unexpected handler failure); handlers are free
/// to choose any other status via [`InvokeError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Status code reported to the invoking client.
    pub status: u16,
    /// Human-readable message.
    pub message: Cow<'static, str>,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ErrorBody {
    /// The reply for an invoke that matched no registered route.
    pub const fn not_found() -> Self {
        Self {
            status: 404,
            message: Cow::Borrowed("Not Found"),
            body: None,
        }
    }

    /// The reply for an unexpected handler or converter failure.
    pub const fn internal_error() -> Self {
        Self {
            status: 500,
            message: Cow::Borrowed("Internal Server Error"),
            body: None,
        }
    }

    /// Render as a JSON value for an `Error` frame body.
    pub fn into_value(self) -> Value {
        let mut map = serde_json::Map::with_capacity(3);
        map.insert("status".into(), self.status.into());
        map.insert("message".into(), Value::String(self.message.into_owned()));
        if let Some(body) = self.body {
            map.insert("body".into(), body);
        }
        Value::Object(map)
    }
}

/// A handler failure carrying an explicit status, passed through to the
/// invoking client verbatim.
///
/// This is the error handlers throw on purpose. Anything else that escapes
/// a handler is treated as unexpected and converted to a 500 (see
/// [`HandlerError`]).
#[derive(Debug, Clone, thiserror::Error)]
#[error("invoke error {status}: {message}")]
pub struct InvokeError {
    /// Status code reported to the client.
    pub status: u16,
    /// Message reported to the client.
    pub message: String,
    /// Optional structured detail reported to the client.
    pub body: Option<Value>,
}

impl InvokeError {
    /// An invoke error with the given status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Attach structured detail to the reply.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn into_error_body(self) -> ErrorBody {
        ErrorBody {
            status: self.status,
            message: Cow::Owned(self.message),
            body: self.body,
        }
    }
}

/// Failure of a route's middleware chain.
///
/// The two variants drive different reporting: an [`InvokeError`] is an
/// expected outcome and reaches the client as-is, while any other error is
/// sanitized to a 500 reply and additionally emitted on the server's
/// `invoke_error` signal so operators can tell the cases apart.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// An expected failure with an explicit status for the client.
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    /// Any other failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an unexpected failure. Accepts anything convertible to a boxed
    /// error, including plain strings.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }

    /// Whether this failure carries an explicit status.
    pub const fn is_invoke(&self) -> bool {
        matches!(self, Self::Invoke(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_body_renders_without_null_detail() {
        assert_eq!(
            ErrorBody::not_found().into_value(),
            json!({"status": 404, "message": "Not Found"})
        );
    }

    #[test]
    fn invoke_error_keeps_its_fields() {
        let body = InvokeError::new(527, "Custom Error")
            .with_body(json!({"hint": "x"}))
            .into_error_body()
            .into_value();
        assert_eq!(
            body,
            json!({"status": 527, "message": "Custom Error", "body": {"hint": "x"}})
        );
    }
}
