//! HTTP request and response bodies shared by the server and client

use serde::{Deserialize, Serialize};

use crate::{hex_bytes, EncryptedInput, EventRecord, Handle, RevealedValue};

/// Header carrying the caller's address
pub const SENDER_HEADER: &str = "x-sender";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTelemetryRequest {
    pub vehicle_id: String,
    pub speed: EncryptedInput,
    pub position: EncryptedInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitScheduleRequest {
    pub intersection_id: String,
    pub cycle_time: EncryptedInput,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTelemetryRequest {
    pub speed: RevealedValue,
    pub position: RevealedValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyScheduleRequest {
    pub cycle_time: RevealedValue,
}

/// Response to any successful write: the event it emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub event: EventRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsResponse {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    pub next_seq: u64,
}

/// Stored ciphertext behind a handle, for oracles and relayers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiphertextResponse {
    pub handle: Handle,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    pub publicly_decryptable: bool,
}

/// Structured error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
