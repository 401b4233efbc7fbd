//! Record model: kinds, metadata, and the one-shot verification state

use serde::{Deserialize, Serialize};

use crate::constants::{SCHEDULE_FIELD_COUNT, TELEMETRY_FIELD_COUNT};
use crate::{Address, Error, Handle, Result};

/// Record kind. Both kinds share the protocol and differ only in field count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Vehicle telemetry: encrypted speed and position
    Telemetry,
    /// Signal schedule: encrypted cycle time, public location
    Schedule,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Telemetry, RecordKind::Schedule];

    /// Number of encrypted fields carried by records of this kind
    pub const fn field_count(self) -> usize {
        match self {
            RecordKind::Telemetry => TELEMETRY_FIELD_COUNT,
            RecordKind::Schedule => SCHEDULE_FIELD_COUNT,
        }
    }

    /// Encrypted field names, in record order
    pub const fn field_names(self) -> &'static [&'static str] {
        match self {
            RecordKind::Telemetry => &["speed", "position"],
            RecordKind::Schedule => &["cycle_time"],
        }
    }

    /// Name of the field at `index`, for error reporting
    pub fn field_name(self, index: usize) -> &'static str {
        self.field_names().get(index).copied().unwrap_or("unknown")
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Telemetry => "telemetry",
            RecordKind::Schedule => "schedule",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "telemetry" => Ok(RecordKind::Telemetry),
            "schedule" => Ok(RecordKind::Schedule),
            other => Err(format!("unknown record kind: {}", other)),
        }
    }
}

/// Plain companion values recorded at submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetadata {
    /// Host ledger timestamp of the submitting transaction
    pub submitted_at: u64,
    /// Public location (schedule records)
    pub location: Option<String>,
}

/// Verification state machine: `Pending -> Verified`, terminal.
///
/// Decrypted values only exist inside `Verified`, so a record cannot be
/// verified without values or carry values while pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationState {
    Pending,
    Verified { values: Vec<u32>, verified_at: u64 },
}

impl VerificationState {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationState::Verified { .. })
    }
}

/// One submitted entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    id: String,
    kind: RecordKind,
    owner: Address,
    encrypted_fields: Vec<Handle>,
    metadata: PublicMetadata,
    state: VerificationState,
}

impl EncryptedRecord {
    pub(crate) fn new(
        kind: RecordKind,
        id: String,
        owner: Address,
        encrypted_fields: Vec<Handle>,
        metadata: PublicMetadata,
    ) -> Self {
        debug_assert_eq!(encrypted_fields.len(), kind.field_count());
        Self {
            id,
            kind,
            owner,
            encrypted_fields,
            metadata,
            state: VerificationState::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Handles stored at submission, in field order
    pub fn encrypted_fields(&self) -> &[Handle] {
        &self.encrypted_fields
    }

    pub fn metadata(&self) -> &PublicMetadata {
        &self.metadata
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn verified(&self) -> bool {
        self.state.is_verified()
    }

    /// Decrypted values in field order; all zero until verified
    pub fn decrypted_fields(&self) -> Vec<u32> {
        match &self.state {
            VerificationState::Pending => vec![0; self.encrypted_fields.len()],
            VerificationState::Verified { values, .. } => values.clone(),
        }
    }

    fn decrypted_field(&self, index: usize) -> u32 {
        match &self.state {
            VerificationState::Pending => 0,
            VerificationState::Verified { values, .. } => values.get(index).copied().unwrap_or(0),
        }
    }

    /// Apply the single `Pending -> Verified` transition
    pub(crate) fn mark_verified(&mut self, values: Vec<u32>, verified_at: u64) -> Result<()> {
        if self.state.is_verified() {
            return Err(Error::AlreadyVerified {
                kind: self.kind,
                id: self.id.clone(),
            });
        }
        debug_assert_eq!(values.len(), self.encrypted_fields.len());
        self.state = VerificationState::Verified {
            values,
            verified_at,
        };
        Ok(())
    }

    /// Structural check used when loading persisted state
    pub(crate) fn is_well_formed(&self) -> bool {
        let fields_ok = self.encrypted_fields.len() == self.kind.field_count()
            && self.encrypted_fields.iter().all(Handle::is_initialized);
        let state_ok = match &self.state {
            VerificationState::Pending => true,
            VerificationState::Verified { values, .. } => values.len() == self.kind.field_count(),
        };
        fields_ok && state_ok
    }
}

/// Snapshot of a telemetry record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryView {
    pub vehicle_id: String,
    pub owner: Address,
    pub encrypted_speed: Handle,
    pub encrypted_position: Handle,
    pub decrypted_speed: u32,
    pub decrypted_position: u32,
    pub verified: bool,
    pub timestamp: u64,
}

impl From<&EncryptedRecord> for TelemetryView {
    fn from(record: &EncryptedRecord) -> Self {
        let handle = |i: usize| record.encrypted_fields.get(i).copied().unwrap_or_default();
        Self {
            vehicle_id: record.id.clone(),
            owner: record.owner,
            encrypted_speed: handle(0),
            encrypted_position: handle(1),
            decrypted_speed: record.decrypted_field(0),
            decrypted_position: record.decrypted_field(1),
            verified: record.verified(),
            timestamp: record.metadata.submitted_at,
        }
    }
}

/// Snapshot of a signal schedule record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub intersection_id: String,
    pub owner: Address,
    pub encrypted_cycle_time: Handle,
    pub decrypted_cycle_time: u32,
    pub location: String,
    pub verified: bool,
    pub timestamp: u64,
}

impl From<&EncryptedRecord> for ScheduleView {
    fn from(record: &EncryptedRecord) -> Self {
        Self {
            intersection_id: record.id.clone(),
            owner: record.owner,
            encrypted_cycle_time: record.encrypted_fields.first().copied().unwrap_or_default(),
            decrypted_cycle_time: record.decrypted_field(0),
            location: record.metadata.location.clone().unwrap_or_default(),
            verified: record.verified(),
            timestamp: record.metadata.submitted_at,
        }
    }
}
