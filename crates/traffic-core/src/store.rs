//! Record store: two independent keyed tables plus insertion-ordered id lists
//!
//! The store is append-only. Records are inserted once and then only ever
//! transition `Pending -> Verified`; nothing is removed or reordered.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EncryptedRecord, Error, RecordKind, Result};

/// Persisted state failed a structural check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Inconsistent record store: {0}")]
pub struct InconsistentStore(pub String);

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct KindTable {
    records: HashMap<String, EncryptedRecord>,
    order: Vec<String>,
}

/// Keyed mapping from record id to record state, one table per kind
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStore {
    telemetry: KindTable,
    schedule: KindTable,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: RecordKind) -> &KindTable {
        match kind {
            RecordKind::Telemetry => &self.telemetry,
            RecordKind::Schedule => &self.schedule,
        }
    }

    fn table_mut(&mut self, kind: RecordKind) -> &mut KindTable {
        match kind {
            RecordKind::Telemetry => &mut self.telemetry,
            RecordKind::Schedule => &mut self.schedule,
        }
    }

    pub fn contains(&self, kind: RecordKind, id: &str) -> bool {
        self.table(kind).records.contains_key(id)
    }

    pub fn get(&self, kind: RecordKind, id: &str) -> Option<&EncryptedRecord> {
        self.table(kind).records.get(id)
    }

    pub(crate) fn get_mut(&mut self, kind: RecordKind, id: &str) -> Option<&mut EncryptedRecord> {
        self.table_mut(kind).records.get_mut(id)
    }

    /// Insert a new record and append its id to the enumeration list
    pub(crate) fn insert(&mut self, record: EncryptedRecord) -> Result<()> {
        let kind = record.kind();
        let table = self.table_mut(kind);
        if table.records.contains_key(record.id()) {
            return Err(Error::DuplicateRecord {
                kind,
                id: record.id().to_string(),
            });
        }
        table.order.push(record.id().to_string());
        table.records.insert(record.id().to_string(), record);
        Ok(())
    }

    /// Ids of one kind in submission order
    pub fn ids(&self, kind: RecordKind) -> &[String] {
        &self.table(kind).order
    }

    /// Records of one kind in submission order
    pub fn records(&self, kind: RecordKind) -> impl Iterator<Item = &EncryptedRecord> + '_ {
        let table = self.table(kind);
        table.order.iter().filter_map(|id| table.records.get(id))
    }

    pub fn len(&self, kind: RecordKind) -> usize {
        self.table(kind).order.len()
    }

    pub fn is_empty(&self) -> bool {
        RecordKind::ALL.iter().all(|&kind| self.len(kind) == 0)
    }

    /// Number of verified records of one kind
    pub fn verified_count(&self, kind: RecordKind) -> usize {
        self.table(kind)
            .records
            .values()
            .filter(|r| r.verified())
            .count()
    }

    /// Check the invariants a deserialized store must hold:
    /// each id list matches its table one-to-one and every record is well formed
    /// and filed under its own kind and id.
    pub fn validate(&self) -> std::result::Result<(), InconsistentStore> {
        for kind in RecordKind::ALL {
            let table = self.table(kind);
            if table.order.len() != table.records.len() {
                return Err(InconsistentStore(format!(
                    "{} table has {} records but {} ids",
                    kind,
                    table.records.len(),
                    table.order.len()
                )));
            }
            for id in &table.order {
                let record = table.records.get(id).ok_or_else(|| {
                    InconsistentStore(format!("{} id '{}' has no record", kind, id))
                })?;
                if record.kind() != kind || record.id() != id {
                    return Err(InconsistentStore(format!(
                        "{} '{}' is filed under the wrong key",
                        kind, id
                    )));
                }
                if !record.is_well_formed() {
                    return Err(InconsistentStore(format!(
                        "{} '{}' is malformed",
                        kind, id
                    )));
                }
            }
        }
        Ok(())
    }
}
