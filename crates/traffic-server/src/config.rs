//! Server configuration
//!
//! Loaded from a JSON file; every field has a development default so an empty
//! `{}` (or no file at all) starts a self-contained dev network. The binary
//! applies its CLI flags on top.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use traffic_core::Address;
use traffic_oracle::{parse_verifying_key, DevNetwork, KmsSignerSet, OracleError};

/// Address the relayer signs its verification calls as
pub const DEFAULT_RELAYER_ADDRESS: Address = Address([0x5e; 20]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Public API listen address
    pub listen_addr: String,
    /// Serve `/metrics` on a separate listener; merged into the public router when unset
    pub admin_listen_addr: Option<String>,
    pub metrics: bool,
    pub max_concurrent_requests: usize,

    pub ledger_address: Address,
    /// Seed every development key is derived from
    pub dev_seed: String,
    /// Hex ed25519 public key of the input-proof coprocessor; derived from the seed when unset
    pub coprocessor_key: Option<String>,

    pub kms_epoch: u64,
    pub kms_threshold: usize,
    /// Number of seed-derived KMS signers, used when `kms_keys` is empty
    pub kms_signers: u32,
    /// Hex ed25519 public keys of the KMS signer set, in signer-index order
    pub kms_keys: Vec<String>,

    /// Snapshot file; state is in-memory only when unset
    pub state_path: Option<PathBuf>,

    /// Run the background relayer against the seed-derived oracle
    pub relay: bool,
    pub relayer_address: Address,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            admin_listen_addr: None,
            metrics: true,
            max_concurrent_requests: 256,
            ledger_address: traffic_oracle::DEV_LEDGER_ADDRESS,
            dev_seed: traffic_oracle::DEV_SEED.to_string(),
            coprocessor_key: None,
            kms_epoch: traffic_oracle::DEFAULT_EPOCH,
            kms_threshold: traffic_oracle::DEFAULT_THRESHOLD,
            kms_signers: traffic_oracle::DEFAULT_KMS_SIGNERS,
            kms_keys: Vec::new(),
            state_path: None,
            relay: false,
            relayer_address: DEFAULT_RELAYER_ADDRESS,
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Check the parts that can fail before any listener is bound
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be at least 1");
        }
        self.coprocessor_verifying_key()
            .context("Invalid coprocessor key")?;
        self.kms_signer_set().context("Invalid KMS signer set")?;
        if self.relay && (!self.kms_keys.is_empty() || self.coprocessor_key.is_some()) {
            tracing::warn!(
                "Relayer signs with seed-derived KMS keys; proofs will fail against explicitly configured keys"
            );
        }
        Ok(())
    }

    /// Development network derived from `dev_seed`
    pub fn network(&self) -> DevNetwork {
        DevNetwork::new(self.dev_seed.as_bytes(), self.ledger_address)
            .with_kms(self.kms_signers, self.kms_threshold)
            .with_epoch(self.kms_epoch)
    }

    pub fn coprocessor_verifying_key(&self) -> Result<VerifyingKey, OracleError> {
        match &self.coprocessor_key {
            Some(key) => parse_verifying_key(key),
            None => Ok(self.network().coprocessor_key().verifying_key()),
        }
    }

    pub fn kms_signer_set(&self) -> Result<KmsSignerSet, OracleError> {
        if self.kms_keys.is_empty() {
            return self.network().kms_signer_set();
        }
        let keys = self
            .kms_keys
            .iter()
            .map(|key| parse_verifying_key(key))
            .collect::<Result<Vec<_>, _>>()?;
        KmsSignerSet::new(self.kms_epoch, self.kms_threshold, keys)
    }
}
