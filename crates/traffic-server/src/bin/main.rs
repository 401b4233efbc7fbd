//! Ledger server CLI

use std::path::PathBuf;

use clap::Parser;
use traffic_core::Address;
use traffic_server::{init_prometheus_recorder, ServerBuilder, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "traffic-server")]
#[command(about = "Encrypted traffic record ledger server")]
struct Args {
    /// JSON config file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Public listen address
    #[arg(long)]
    listen: Option<String>,

    /// Separate listen address for /metrics
    #[arg(long)]
    admin_listen: Option<String>,

    /// Address the ledger is deployed at
    #[arg(long)]
    ledger_address: Option<Address>,

    /// Seed for the development keys
    #[arg(long)]
    dev_seed: Option<String>,

    /// Snapshot file to load on start and write after each change
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Relay oracle decryptions for every submitted record
    #[arg(long)]
    relay: bool,

    #[arg(long)]
    kms_threshold: Option<usize>,

    #[arg(long)]
    kms_signers: Option<u32>,

    #[arg(long)]
    kms_epoch: Option<u64>,

    /// Disable the Prometheus recorder
    #[arg(long)]
    no_metrics: bool,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(addr) = self.admin_listen {
            config.admin_listen_addr = Some(addr);
        }
        if let Some(address) = self.ledger_address {
            config.ledger_address = address;
        }
        if let Some(seed) = self.dev_seed {
            config.dev_seed = seed;
        }
        if let Some(path) = self.state_path {
            config.state_path = Some(path);
        }
        if self.relay {
            config.relay = true;
        }
        if let Some(threshold) = self.kms_threshold {
            config.kms_threshold = threshold;
        }
        if let Some(signers) = self.kms_signers {
            config.kms_signers = signers;
        }
        if let Some(epoch) = self.kms_epoch {
            config.kms_epoch = epoch;
        }
        if self.no_metrics {
            config.metrics = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traffic_server=info,traffic_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config);

    let mut builder = ServerBuilder::new(config.clone());
    if config.metrics {
        builder = builder.metrics(init_prometheus_recorder()?);
    }

    let server = builder.build()?;
    server.run().await
}
