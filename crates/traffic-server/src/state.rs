//! Shared server state
//!
//! The ledger sits behind a single async mutex. Holding it for the whole write
//! (apply, persist, broadcast) serializes transactions and keeps the broadcast
//! in event-log order.
//!
//! Snapshots are full rewrites of the store and registry, run on the blocking
//! pool while the lock is held. Write latency grows with ledger size, so
//! `state_path` is meant for development-sized ledgers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, Mutex};
use traffic_core::{
    Address, EncryptedInput, EventRecord, Ledger, RecordKind, RevealedValue, TxContext,
};
use traffic_oracle::{InputVerifier, KmsSignerSet};

use crate::broadcast::EventBroadcast;
use crate::error::Result;
use crate::metrics;
use crate::snapshot::{self, Snapshot};

/// Ledger wired to the development backend
pub type DevLedger = Ledger<InputVerifier, KmsSignerSet>;

pub struct AppState {
    ledger: Mutex<DevLedger>,
    broadcast: EventBroadcast,
    snapshot_path: Option<PathBuf>,
}

pub type SharedState = Arc<AppState>;

pub fn create_shared_state(ledger: DevLedger, snapshot_path: Option<PathBuf>) -> SharedState {
    metrics::update_record_gauges(ledger.store());
    Arc::new(AppState {
        ledger: Mutex::new(ledger),
        broadcast: EventBroadcast::new(),
        snapshot_path,
    })
}

/// Host ledger timestamp: seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AppState {
    pub fn broadcast(&self) -> &EventBroadcast {
        &self.broadcast
    }

    /// Run a read-only closure against the ledger
    pub async fn read<R>(&self, f: impl FnOnce(&DevLedger) -> R) -> R {
        let ledger = self.ledger.lock().await;
        f(&ledger)
    }

    /// Subscribe to events together with the sequence number the first
    /// delivered event will carry
    pub async fn subscribe(&self) -> (broadcast::Receiver<Arc<EventRecord>>, u64) {
        let ledger = self.ledger.lock().await;
        let rx = self.broadcast.subscribe();
        (rx, ledger.events().next_seq())
    }

    pub async fn submit(
        &self,
        sender: Address,
        kind: RecordKind,
        id: &str,
        location: Option<String>,
        inputs: &[EncryptedInput],
    ) -> Result<EventRecord> {
        let start = Instant::now();
        let mut ledger = self.ledger.lock().await;
        let ctx = TxContext::new(sender, unix_now());

        let result = ledger.submit(&ctx, kind, id, location, inputs);
        self.finish_write("submit", kind, &ledger, result, start)
            .await
    }

    pub async fn verify(
        &self,
        sender: Address,
        kind: RecordKind,
        id: &str,
        reveals: &[RevealedValue],
    ) -> Result<EventRecord> {
        let start = Instant::now();
        let mut ledger = self.ledger.lock().await;
        let ctx = TxContext::new(sender, unix_now());

        let result = ledger.verify(&ctx, kind, id, reveals);
        self.finish_write("verify", kind, &ledger, result, start)
            .await
    }

    async fn finish_write(
        &self,
        op: &'static str,
        kind: RecordKind,
        ledger: &DevLedger,
        result: traffic_core::Result<EventRecord>,
        start: Instant,
    ) -> Result<EventRecord> {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                metrics::record_write(op, kind, e.code(), start.elapsed());
                return Err(e.into());
            }
        };

        // The write is committed in memory; a snapshot failure is logged,
        // not reported to the caller.
        self.persist(ledger).await;
        metrics::update_record_gauges(ledger.store());
        self.broadcast.broadcast(event.clone());
        metrics::record_write(op, kind, "OK", start.elapsed());
        Ok(event)
    }

    async fn persist(&self, ledger: &DevLedger) {
        let Some(path) = self.snapshot_path.clone() else {
            return;
        };
        let snapshot = Snapshot {
            ledger: ledger.address(),
            store: ledger.store().clone(),
            registry: ledger.ciphertext_service().registry().clone(),
        };
        let result = tokio::task::spawn_blocking({
            let path = path.clone();
            move || snapshot::save(&path, &snapshot)
        })
        .await;
        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        metrics::record_snapshot_failure();
        tracing::error!(path = %path.display(), error = %error, "Failed to write snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use traffic_oracle::DevNetwork;

    const LEDGER: Address = Address([0xeeu8; 20]);
    const ALICE: Address = Address([0xa1u8; 20]);

    fn state(network: &DevNetwork, snapshot_path: Option<PathBuf>) -> SharedState {
        let ledger = Ledger::new(
            LEDGER,
            network.input_verifier(),
            network.kms_signer_set().unwrap(),
        );
        create_shared_state(ledger, snapshot_path)
    }

    #[tokio::test]
    async fn test_write_broadcasts_in_order() {
        let network = DevNetwork::new("state", LEDGER);
        let state = state(&network, None);
        let (mut rx, next_seq) = state.subscribe().await;
        assert_eq!(next_seq, 0);

        let encryptor = network.encryptor();
        state
            .submit(
                ALICE,
                RecordKind::Schedule,
                "int1",
                Some("Main & 1st".into()),
                &[encryptor.encrypt(90, &ALICE)],
            )
            .await
            .unwrap();
        state
            .submit(
                ALICE,
                RecordKind::Telemetry,
                "car1",
                None,
                &[encryptor.encrypt(42, &ALICE), encryptor.encrypt(100, &ALICE)],
            )
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().seq, 0);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.seq, 1);
        assert_eq!(second.event.id(), "car1");
    }

    #[tokio::test]
    async fn test_failed_write_not_broadcast() {
        let network = DevNetwork::new("state", LEDGER);
        let state = state(&network, None);
        let mut rx = state.broadcast().subscribe();

        let err = state
            .verify(ALICE, RecordKind::Telemetry, "missing", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Ledger(traffic_core::Error::RecordNotFound { .. })
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(state.read(|l| l.events().len()).await, 0);
    }

    #[tokio::test]
    async fn test_write_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        let network = DevNetwork::new("state", LEDGER);
        let state = state(&network, Some(path.clone()));

        let input = network.encryptor().encrypt(90, &ALICE);
        state
            .submit(ALICE, RecordKind::Schedule, "int1", Some("x".into()), &[input])
            .await
            .unwrap();

        let snapshot = snapshot::load(&path, &LEDGER).unwrap().unwrap();
        assert_eq!(snapshot.store.ids(RecordKind::Schedule), ["int1"]);
        assert_eq!(snapshot.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_failure_keeps_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ledger.snap");
        let network = DevNetwork::new("state", LEDGER);
        let state = state(&network, Some(path.clone()));
        let (mut rx, _) = state.subscribe().await;

        let input = network.encryptor().encrypt(90, &ALICE);
        let event = state
            .submit(ALICE, RecordKind::Schedule, "int1", Some("x".into()), &[input])
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().seq, event.seq);
        assert!(!path.exists());
        let ids = state.read(|l| l.list_schedule_ids().to_vec()).await;
        assert_eq!(ids, ["int1"]);
    }
}
