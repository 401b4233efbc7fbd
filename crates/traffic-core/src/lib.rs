//! traffic-core: Encrypted record ledger for confidential traffic telemetry
//!
//! Parties commit homomorphically-encrypted values (vehicle telemetry and
//! signal schedules) to an append-only ledger. An external decryption oracle
//! later publishes plaintext plus a proof, and the ledger only accepts the
//! plaintext after checking that the proof binds it to the exact handle that
//! was stored at submission time.
//!
//! # Components
//!
//! - [`RecordStore`]: keyed records plus insertion-ordered id lists per kind
//! - Submission handler: [`Ledger::submit`] and its typed wrappers
//! - Verification handler: [`Ledger::verify`] and its typed wrappers
//! - Query surface: [`Ledger::get_telemetry`], [`Ledger::list_telemetry_ids`], ...
//!
//! # Trust Boundary
//!
//! The ledger knows nothing about the encryption scheme. Both external
//! collaborators are reached through narrow traits:
//!
//! | Collaborator | Trait | Used by |
//! |--------------|-------|---------|
//! | Ciphertext service | [`CiphertextService`] | submission |
//! | Decryption proof check | [`DecryptionVerifier`] | verification |
//!
//! # Transactions
//!
//! Every write is all-or-nothing: all checks run before the first mutation,
//! so a failed call leaves the store and the event log untouched. The host
//! serializes calls; the ledger itself takes `&mut self` and never locks.

pub mod api;
mod error;
mod events;
mod ledger;
mod plaintext;
mod query;
mod record;
mod service;
mod store;
mod submission;
mod types;
mod verification;

pub use error::Error;
pub use events::{EventLog, EventRecord, LedgerEvent};
pub use ledger::Ledger;
pub use plaintext::{decode_u32_word, encode_u32_word, PLAINTEXT_WORD_SIZE};
pub use query::Health;
pub use record::{
    EncryptedRecord, PublicMetadata, RecordKind, ScheduleView, TelemetryView, VerificationState,
};
pub use service::{CiphertextService, DecryptionVerifier, EncryptedInput, RevealedValue};
pub use store::{InconsistentStore, RecordStore};
pub use types::{
    hex_bytes, keccak256, validate_record_id, Address, Handle, HexParseError, TxContext,
    MAX_RECORD_ID_LEN,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Handle type tags, stored in the last byte of every handle
pub mod constants {
    /// Type tag for an encrypted 32-bit unsigned integer
    pub const HANDLE_TYPE_EUINT32: u8 = 4;

    /// Number of encrypted fields in a telemetry record (speed, position)
    pub const TELEMETRY_FIELD_COUNT: usize = 2;

    /// Number of encrypted fields in a schedule record (cycle time)
    pub const SCHEDULE_FIELD_COUNT: usize = 1;
}
