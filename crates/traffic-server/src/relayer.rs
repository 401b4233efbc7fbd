//! Background relayer
//!
//! Watches the event broadcast and, for every submitted record, asks the
//! decryption oracle for each handle and submits the verification as an
//! ordinary caller. It sits off the write path: a failed relay is logged and
//! the record stays pending.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use traffic_core::{Address, EventRecord, LedgerEvent, RecordKind, RevealedValue};
use traffic_oracle::DecryptionOracle;

use crate::error::{Result, ServerError};
use crate::metrics;
use crate::state::SharedState;

pub struct Relayer {
    state: SharedState,
    oracle: Arc<DecryptionOracle>,
    sender: Address,
}

impl Relayer {
    pub fn new(state: SharedState, oracle: DecryptionOracle, sender: Address) -> Self {
        Self {
            state,
            oracle: Arc::new(oracle),
            sender,
        }
    }

    /// Start the relay loop on the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Relay every pending record, then follow the event stream until the
    /// broadcast closes
    pub async fn run(self) {
        let mut rx = self.state.broadcast().subscribe();
        tracing::info!(sender = %self.sender, epoch = self.oracle.epoch(), "Relayer started");

        self.catch_up().await;

        loop {
            match rx.recv().await {
                Ok(event) => self.on_event(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Relayer lagged, rescanning pending records");
                    self.catch_up().await;
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::info!("Relayer stopped");
    }

    async fn on_event(&self, record: &EventRecord) {
        if let LedgerEvent::Submitted { kind, id, .. } = &record.event {
            self.relay_logged(*kind, id).await;
        }
    }

    /// Relay all records still pending
    pub async fn catch_up(&self) {
        let pending: Vec<(RecordKind, String)> = self
            .state
            .read(|ledger| {
                RecordKind::ALL
                    .into_iter()
                    .flat_map(|kind| {
                        ledger
                            .store()
                            .records(kind)
                            .filter(|r| !r.verified())
                            .map(move |r| (kind, r.id().to_string()))
                    })
                    .collect()
            })
            .await;

        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Relaying pending records");
        }
        for (kind, id) in pending {
            self.relay_logged(kind, &id).await;
        }
    }

    async fn relay_logged(&self, kind: RecordKind, id: &str) {
        match self.relay(kind, id).await {
            Ok(event) => {
                metrics::record_relay("verified");
                tracing::info!(%kind, id, seq = event.seq, "Relayed verification");
            }
            Err(ServerError::Ledger(traffic_core::Error::AlreadyVerified { .. })) => {
                metrics::record_relay("already_verified");
                tracing::debug!(%kind, id, "Record verified by another caller");
            }
            Err(e) => {
                metrics::record_relay("failed");
                tracing::warn!(%kind, id, error = %e, "Relay failed, record stays pending");
            }
        }
    }

    /// Decrypt every field of one record through the oracle and verify it
    pub async fn relay(&self, kind: RecordKind, id: &str) -> Result<EventRecord> {
        let oracle = Arc::clone(&self.oracle);
        let reveals = self
            .state
            .read(|ledger| -> Result<Vec<RevealedValue>> {
                let record = ledger.get_record(kind, id)?;
                record
                    .encrypted_fields()
                    .iter()
                    .map(|handle| -> Result<RevealedValue> {
                        let response = oracle.public_decrypt(ledger.ciphertext_service(), handle)?;
                        Ok(response.into())
                    })
                    .collect()
            })
            .await?;

        self.state.verify(self.sender, kind, id, &reveals).await
    }
}
