//! Ledger client CLI
//!
//! Encrypts with the development network derived from `--dev-seed`, so it
//! must match the server's seed and ledger address.

use clap::{Parser, Subcommand};
use serde::Serialize;
use traffic_client::LedgerClient;
use traffic_core::{Address, RecordKind};
use traffic_oracle::{DevNetwork, DEV_LEDGER_ADDRESS, DEV_SEED};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "traffic-client")]
#[command(about = "Submit, verify and query encrypted traffic records")]
struct Args {
    /// Ledger server URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Caller address sent with writes
    #[arg(long, default_value = "0x00000000000000000000000000000000000000a1")]
    sender: Address,

    /// Seed for the development keys
    #[arg(long, default_value = DEV_SEED)]
    dev_seed: String,

    /// Address the ledger is deployed at
    #[arg(long)]
    ledger_address: Option<Address>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Liveness and record counts
    Health,
    /// Encrypt and submit vehicle telemetry
    SubmitTelemetry {
        #[arg(long)]
        vehicle_id: String,
        #[arg(long)]
        speed: u32,
        #[arg(long)]
        position: u32,
    },
    /// Encrypt and submit a signal schedule
    SubmitSchedule {
        #[arg(long)]
        intersection_id: String,
        #[arg(long)]
        cycle_time: u32,
        #[arg(long)]
        location: String,
    },
    /// Decrypt a record with the dev oracle keys and submit the verification
    Verify {
        #[arg(long)]
        kind: RecordKind,
        #[arg(long)]
        id: String,
    },
    /// Show one record
    Get {
        #[arg(long)]
        kind: RecordKind,
        #[arg(long)]
        id: String,
    },
    /// List record ids in submission order
    List {
        #[arg(long)]
        kind: RecordKind,
    },
    /// Poll the event log
    Events {
        #[arg(long, default_value_t = 0)]
        since: u64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the public keys of the development network
    Keys,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let network = DevNetwork::new(
        args.dev_seed.as_bytes(),
        args.ledger_address.unwrap_or(DEV_LEDGER_ADDRESS),
    );
    let client = LedgerClient::new(&args.server)?.with_sender(args.sender);

    match args.command {
        Command::Health => print_json(&client.health().await?)?,
        Command::SubmitTelemetry {
            vehicle_id,
            speed,
            position,
        } => {
            let encryptor = network.encryptor();
            let event = client
                .submit_telemetry(
                    &vehicle_id,
                    encryptor.encrypt(speed, &args.sender),
                    encryptor.encrypt(position, &args.sender),
                )
                .await?;
            print_json(&event)?;
        }
        Command::SubmitSchedule {
            intersection_id,
            cycle_time,
            location,
        } => {
            let input = network.encryptor().encrypt(cycle_time, &args.sender);
            let event = client
                .submit_schedule(&intersection_id, input, &location)
                .await?;
            print_json(&event)?;
        }
        Command::Verify { kind, id } => {
            let event = client.relay_record(&network.oracle(), kind, &id).await?;
            print_json(&event)?;
        }
        Command::Get { kind, id } => match kind {
            RecordKind::Telemetry => print_json(&client.get_telemetry(&id).await?)?,
            RecordKind::Schedule => print_json(&client.get_schedule(&id).await?)?,
        },
        Command::List { kind } => {
            for id in client.list_ids(kind).await? {
                println!("{}", id);
            }
        }
        Command::Events { since, limit } => print_json(&client.events_since(since, limit).await?)?,
        Command::Keys => {
            println!("ledger       {}", network.ledger());
            println!(
                "coprocessor  0x{}",
                hex::encode(network.coprocessor_key().verifying_key().to_bytes())
            );
            let signers = network.kms_signer_set()?;
            println!(
                "kms epoch {} threshold {}/{}",
                signers.epoch(),
                signers.threshold(),
                signers.signers().len()
            );
            for (i, key) in signers.signers().iter().enumerate() {
                println!("kms[{}]       0x{}", i, hex::encode(key.to_bytes()));
            }
        }
    }

    Ok(())
}
