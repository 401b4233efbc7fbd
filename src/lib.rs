//! traffic-ledger: confidential traffic telemetry on an encrypted record ledger
//!
//! Umbrella crate re-exporting the workspace:
//!
//! - [`traffic_core`]: record model, ledger handlers, collaborator traits
//! - [`traffic_oracle`]: development ciphertext service, KMS verifier, decryption oracle
//! - [`traffic_server`]: axum server, relayer, snapshots
//! - [`traffic_client`]: reqwest client

pub use traffic_client;
pub use traffic_core;
pub use traffic_oracle;
pub use traffic_server;

pub use traffic_core::{
    Address, Error, Handle, Ledger, RecordKind, Result, ScheduleView, TelemetryView, TxContext,
};
