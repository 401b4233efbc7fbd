//! Server assembly: ledger construction, snapshot restore, listeners

use anyhow::Context;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use traffic_core::Ledger;
use traffic_oracle::InputVerifier;

use crate::config::ServerConfig;
use crate::relayer::Relayer;
use crate::routes::{create_admin_router, create_public_router, create_router_with_metrics};
use crate::snapshot;
use crate::state::{create_shared_state, DevLedger, SharedState};

/// Builds a [`LedgerServer`] from configuration
pub struct ServerBuilder {
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this recorder handle
    pub fn metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Validate config, restore the snapshot if present and build the ledger
    pub fn build(self) -> anyhow::Result<LedgerServer> {
        self.config.validate()?;
        let ledger = build_ledger(&self.config)?;
        let state = create_shared_state(ledger, self.config.state_path.clone());
        Ok(LedgerServer {
            config: self.config,
            state,
            metrics: self.metrics,
        })
    }
}

fn build_ledger(config: &ServerConfig) -> anyhow::Result<DevLedger> {
    let address = config.ledger_address;
    let coprocessor = config.coprocessor_verifying_key()?;
    let signer_set = config.kms_signer_set()?;

    let restored = match &config.state_path {
        Some(path) => snapshot::load(path, &address)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?,
        None => None,
    };

    let ledger = match restored {
        Some(snapshot) => {
            let service = InputVerifier::with_registry(address, coprocessor, snapshot.registry);
            Ledger::restore(address, snapshot.store, service, signer_set)?
        }
        None => {
            tracing::info!(ledger = %address, "Starting with an empty ledger");
            Ledger::new(address, InputVerifier::new(address, coprocessor), signer_set)
        }
    };
    Ok(ledger)
}

pub struct LedgerServer {
    config: ServerConfig,
    state: SharedState,
    metrics: Option<PrometheusHandle>,
}

impl LedgerServer {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Router for the public listener. Includes `/metrics` unless a separate
    /// admin listener is configured.
    pub fn router(&self) -> Router {
        let limit = self.config.max_concurrent_requests;
        match (&self.metrics, &self.config.admin_listen_addr) {
            (Some(handle), None) => {
                create_router_with_metrics(self.state.clone(), handle.clone(), limit)
            }
            _ => create_public_router(self.state.clone(), limit),
        }
    }

    /// Start the relayer if enabled
    pub fn spawn_relayer(&self) -> Option<JoinHandle<()>> {
        if !self.config.relay {
            return None;
        }
        let oracle = self.config.network().oracle();
        let relayer = Relayer::new(self.state.clone(), oracle, self.config.relayer_address);
        Some(relayer.spawn())
    }

    /// Bind the configured listen address and serve until Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let relayer = self.spawn_relayer();

        if let (Some(handle), Some(addr)) = (&self.metrics, &self.config.admin_listen_addr) {
            let admin = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind admin listener {}", addr))?;
            tracing::info!(addr = %addr, "Admin listener ready");
            let app = create_admin_router(handle.clone());
            tokio::spawn(async move {
                if let Err(e) = axum::serve(admin, app).await {
                    tracing::error!(error = %e, "Admin listener failed");
                }
            });
        }

        let app = self.router();
        tracing::info!(
            addr = %listener.local_addr()?,
            ledger = %self.config.ledger_address,
            relay = self.config.relay,
            persistent = self.config.state_path.is_some(),
            "Ledger server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(relayer) = relayer {
            relayer.abort();
        }
        tracing::info!("Ledger server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_core::{Address, RecordKind};

    const ALICE: Address = Address([0xa1u8; 20]);

    #[tokio::test]
    async fn test_restart_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            state_path: Some(dir.path().join("ledger.snap")),
            ..Default::default()
        };
        let network = config.network();

        let server = ServerBuilder::new(config.clone()).build().unwrap();
        let encryptor = network.encryptor();
        let state = server.state();
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
        state
            .submit(
                ALICE,
                RecordKind::Telemetry,
                "car0",
                None,
                &[encryptor.encrypt(1, &ALICE), encryptor.encrypt(2, &ALICE)],
            )
            .await
            .unwrap();
        drop(server);

        let restarted = ServerBuilder::new(config.clone()).build().unwrap();
        let state = restarted.state();
        let ids = state.read(|l| l.list_telemetry_ids().to_vec()).await;
        assert_eq!(ids, ["car1", "car0"]);

        // Pending handles survive the restart and can still be relayed
        let relayer = Relayer::new(state.clone(), network.oracle(), ALICE);
        relayer.relay(RecordKind::Telemetry, "car1").await.unwrap();
        let view = state.read(|l| l.get_telemetry("car1")).await.unwrap();
        assert_eq!((view.decrypted_speed, view.decrypted_position), (42, 100));
    }

    #[test]
    fn test_build_rejects_foreign_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        let snapshot = snapshot::Snapshot {
            ledger: Address([0x01u8; 20]),
            store: Default::default(),
            registry: Default::default(),
        };
        snapshot::save(&path, &snapshot).unwrap();

        let config = ServerConfig {
            state_path: Some(path),
            ..Default::default()
        };
        assert!(ServerBuilder::new(config).build().is_err());
    }
}
