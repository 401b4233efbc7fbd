//! traffic-client: HTTP client for the encrypted record ledger server
//!
//! Wraps every server route in a typed call. Writes carry the caller address
//! in the `x-sender` header. [`LedgerClient::relay_record`] lets a holder of
//! the oracle keys drive verification from outside the server.

pub mod client;
pub mod error;

pub use client::LedgerClient;
pub use error::{ClientError, Result};
