//! Append-only event log: one entry per successful write

use serde::{Deserialize, Serialize};

use crate::{Address, RecordKind};

/// Event emitted by a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A record was created
    Submitted {
        kind: RecordKind,
        id: String,
        submitter: Address,
    },
    /// A record's plaintext was accepted
    Verified {
        kind: RecordKind,
        id: String,
        values: Vec<u32>,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> RecordKind {
        match self {
            LedgerEvent::Submitted { kind, .. } | LedgerEvent::Verified { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LedgerEvent::Submitted { id, .. } | LedgerEvent::Verified { id, .. } => id,
        }
    }
}

/// Event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Zero-based position, strictly increasing
    pub seq: u64,
    pub event: LedgerEvent,
}

#[derive(Debug, Default, Clone)]
pub struct EventLog {
    entries: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return the stored entry
    pub(crate) fn emit(&mut self, event: LedgerEvent) -> EventRecord {
        let record = EventRecord {
            seq: self.entries.len() as u64,
            event,
        };
        self.entries.push(record.clone());
        record
    }

    /// Entries with `seq >= start`
    pub fn since(&self, start: u64) -> &[EventRecord] {
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(self.entries.len());
        &self.entries[start..]
    }

    /// Sequence number the next event will get
    pub fn next_seq(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(id: &str) -> LedgerEvent {
        LedgerEvent::Submitted {
            kind: RecordKind::Telemetry,
            id: id.into(),
            submitter: Address([0x11u8; 20]),
        }
    }

    #[test]
    fn test_sequence_numbers() {
        let mut log = EventLog::new();
        assert_eq!(log.next_seq(), 0);

        assert_eq!(log.emit(submitted("a")).seq, 0);
        assert_eq!(log.emit(submitted("b")).seq, 1);
        assert_eq!(log.next_seq(), 2);
        assert_eq!(log.last().unwrap().event.id(), "b");
    }

    #[test]
    fn test_since() {
        let mut log = EventLog::new();
        for id in ["a", "b", "c"] {
            log.emit(submitted(id));
        }
        assert_eq!(log.since(0).len(), 3);
        assert_eq!(log.since(2)[0].event.id(), "c");
        assert!(log.since(3).is_empty());
        assert!(log.since(u64::MAX).is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = LedgerEvent::Verified {
            kind: RecordKind::Schedule,
            id: "int1".into(),
            values: vec![90],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "verified");
        assert_eq!(json["kind"], "schedule");
        assert_eq!(json["values"][0], 90);

        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
