//! Query surface: read-only accessors and enumeration

use serde::{Deserialize, Serialize};

use crate::{EncryptedRecord, Error, Ledger, RecordKind, Result, ScheduleView, TelemetryView};

/// Liveness probe response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Always true: the ledger is available whenever it can answer
    pub available: bool,
    pub telemetry_records: usize,
    pub schedule_records: usize,
    pub events: u64,
}

impl<C, V> Ledger<C, V> {
    /// Full record snapshot by kind and id
    pub fn get_record(&self, kind: RecordKind, id: &str) -> Result<&EncryptedRecord> {
        self.store.get(kind, id).ok_or_else(|| Error::RecordNotFound {
            kind,
            id: id.to_string(),
        })
    }

    pub fn get_telemetry(&self, vehicle_id: &str) -> Result<TelemetryView> {
        self.get_record(RecordKind::Telemetry, vehicle_id)
            .map(TelemetryView::from)
    }

    pub fn get_schedule(&self, intersection_id: &str) -> Result<ScheduleView> {
        self.get_record(RecordKind::Schedule, intersection_id)
            .map(ScheduleView::from)
    }

    /// All ids of one kind in submission order
    pub fn list_ids(&self, kind: RecordKind) -> &[String] {
        self.store.ids(kind)
    }

    pub fn list_telemetry_ids(&self) -> &[String] {
        self.list_ids(RecordKind::Telemetry)
    }

    pub fn list_schedule_ids(&self) -> &[String] {
        self.list_ids(RecordKind::Schedule)
    }

    pub fn health_check(&self) -> Health {
        Health {
            available: true,
            telemetry_records: self.store.len(RecordKind::Telemetry),
            schedule_records: self.store.len(RecordKind::Schedule),
            events: self.events.next_seq(),
        }
    }
}
