//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use traffic_core::api::ErrorResponse;
use traffic_core::Handle;
use traffic_oracle::OracleError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Ledger(#[from] traffic_core::Error),

    #[error("Missing sender: set the {header} header to the caller's address")]
    MissingSender { header: &'static str },

    #[error("Invalid sender: {0}")]
    InvalidSender(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown handle: {0}")]
    UnknownHandle(Handle),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

impl ServerError {
    /// Get the error code for structured responses
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Ledger(e) => e.code(),
            ServerError::MissingSender { .. } => "MISSING_SENDER",
            ServerError::InvalidSender(_) => "INVALID_SENDER",
            ServerError::InvalidRequest(_) => "INVALID_REQUEST",
            ServerError::UnknownHandle(_) => "UNKNOWN_HANDLE",
            ServerError::Oracle(_) => "ORACLE_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        use traffic_core::Error as L;

        match self {
            ServerError::Ledger(e) => match e {
                L::DuplicateRecord { .. } | L::AlreadyVerified { .. } => StatusCode::CONFLICT,
                L::RecordNotFound { .. } => StatusCode::NOT_FOUND,
                L::InvalidCiphertext { .. }
                | L::InvalidDecryptionProof { .. }
                | L::MalformedPlaintext { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                L::FieldCountMismatch { .. } | L::InvalidRecordId(_) => StatusCode::BAD_REQUEST,
            },
            ServerError::MissingSender { .. } => StatusCode::UNAUTHORIZED,
            ServerError::InvalidSender(_) => StatusCode::BAD_REQUEST,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::UnknownHandle(_) => StatusCode::NOT_FOUND,
            ServerError::Oracle(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_core::RecordKind;

    #[test]
    fn test_ledger_error_status() {
        let cases = [
            (
                traffic_core::Error::DuplicateRecord {
                    kind: RecordKind::Telemetry,
                    id: "car1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                traffic_core::Error::RecordNotFound {
                    kind: RecordKind::Schedule,
                    id: "int1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                traffic_core::Error::AlreadyVerified {
                    kind: RecordKind::Telemetry,
                    id: "car1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                traffic_core::Error::InvalidCiphertext { field: "speed" },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                traffic_core::Error::InvalidDecryptionProof { field: "position" },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                traffic_core::Error::InvalidRecordId("empty".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            let code = err.code();
            let err = ServerError::from(err);
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_ledger_message_passthrough() {
        let err = ServerError::from(traffic_core::Error::InvalidCiphertext { field: "speed" });
        assert_eq!(err.to_string(), "Invalid ciphertext for field 'speed'");
    }

    #[test]
    fn test_sender_errors() {
        let err = ServerError::MissingSender { header: "x-sender" };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "MISSING_SENDER");
        assert_eq!(
            ServerError::InvalidSender("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_lookup_and_oracle_errors() {
        let handle = Handle([0x55u8; 32]);
        let err = ServerError::UnknownHandle(handle);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "UNKNOWN_HANDLE");

        let err = ServerError::from(OracleError::NotPubliclyDecryptable(handle));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "ORACLE_ERROR");

        let err = ServerError::InvalidRequest("unknown record kind 'bus'".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_REQUEST");
    }
}
