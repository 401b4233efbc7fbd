//! traffic-server: HTTP surface for the encrypted record ledger
//!
//! Serves submission, verification and queries over JSON, streams ledger
//! events over WebSocket, optionally relays oracle decryptions back into the
//! ledger and persists state to a snapshot file.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod metrics;
pub mod relayer;
pub mod routes;
pub mod server;
pub mod snapshot;
pub mod state;

pub use broadcast::EventBroadcast;
pub use config::ServerConfig;
pub use error::ServerError;
pub use metrics::init_prometheus_recorder;
pub use relayer::Relayer;
pub use routes::{
    create_admin_router, create_public_router, create_router, create_router_with_metrics,
};
pub use server::{LedgerServer, ServerBuilder};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{create_shared_state, AppState, DevLedger, SharedState};
