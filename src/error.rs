//! 错误工具模块
//!
//! - 统一的错误码与业务错误类型
//! - `ErrorBuilder` 以链式方式补充错误细节

use std::fmt;

/// 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigurationError,
    InvalidParameter,
    NotFound,
    OperationTimeout,
    OperationFailed,
    ServiceUnavailable,
    WebhookRejected,
    SerializationError,
    EncryptionError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "configuration_error",
            ErrorCode::InvalidParameter => "invalid_parameter",
            ErrorCode::NotFound => "not_found",
            ErrorCode::OperationTimeout => "operation_timeout",
            ErrorCode::OperationFailed => "operation_failed",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::WebhookRejected => "webhook_rejected",
            ErrorCode::SerializationError => "serialization_error",
            ErrorCode::EncryptionError => "encryption_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 业务错误
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// 错误构建器
#[derive(Debug)]
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    details: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn details<T: Into<String>>(mut self, details: T) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn build_error(self) -> BridgeError {
        BridgeError {
            code: self.code,
            message: self.message,
            details: self.details,
        }
    }
}

/// 便捷宏：构造错误并提前返回
#[macro_export]
macro_rules! bail_bridge {
    ($code:expr, $msg:expr) => {
        return Err($crate::error::ErrorBuilder::new($code, $msg).build_error())
    };
    ($code:expr, $msg:expr, $details:expr) => {
        return Err($crate::error::ErrorBuilder::new($code, $msg)
            .details($details)
            .build_error())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_details() {
        let err = ErrorBuilder::new(ErrorCode::NotFound, "room not found")
            .details("room_id=r1")
            .build_error();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.details(), Some("room_id=r1"));
        assert_eq!(err.to_string(), "[not_found] room not found");
    }

    #[test]
    fn codes_render_snake_case() {
        assert_eq!(ErrorCode::WebhookRejected.to_string(), "webhook_rejected");
        assert_eq!(ErrorCode::EncryptionError.as_str(), "encryption_error");
        assert_eq!(ErrorCode::OperationTimeout.as_str(), "operation_timeout");
    }

    fn fails() -> Result<()> {
        bail_bridge!(ErrorCode::InvalidParameter, "missing rid", "message_id=m1");
    }

    #[test]
    fn bail_macro_returns_error() {
        let err = fails().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
        assert_eq!(err.details(), Some("message_id=m1"));
    }
}
