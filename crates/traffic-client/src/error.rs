//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Structured error body returned by the ledger server
    #[error("Server error: {status} {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Non-success response without a structured body
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No sender configured for a write request")]
    NoSender,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Oracle error: {0}")]
    Oracle(#[from] traffic_oracle::OracleError),
}

impl ClientError {
    /// Ledger error code, when the server returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
