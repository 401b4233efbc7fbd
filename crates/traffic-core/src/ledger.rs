//! The ledger: record store, event log and the two collaborators

use crate::{
    Address, CiphertextService, DecryptionVerifier, EventLog, InconsistentStore, RecordKind,
    RecordStore,
};

/// Encrypted record ledger.
///
/// Owns the record store and event log and reaches the ciphertext service and
/// decryption verifier through their traits. The write handlers live in
/// `submission.rs` and `verification.rs`, the read accessors in `query.rs`.
pub struct Ledger<C, V> {
    address: Address,
    pub(crate) store: RecordStore,
    pub(crate) events: EventLog,
    pub(crate) ciphertexts: C,
    pub(crate) verifier: V,
}

impl<C, V> Ledger<C, V>
where
    C: CiphertextService,
    V: DecryptionVerifier,
{
    /// Create an empty ledger deployed at `address`
    pub fn new(address: Address, ciphertexts: C, verifier: V) -> Self {
        Self {
            address,
            store: RecordStore::new(),
            events: EventLog::new(),
            ciphertexts,
            verifier,
        }
    }

    /// Rebuild a ledger from a persisted store.
    ///
    /// The store is validated first. Every stored handle is then re-granted to
    /// the ledger and re-marked publicly decryptable, since the ciphertext
    /// service's access list is not part of the persisted state.
    pub fn restore(
        address: Address,
        store: RecordStore,
        mut ciphertexts: C,
        verifier: V,
    ) -> Result<Self, InconsistentStore> {
        store.validate()?;

        let mut handles = 0usize;
        for kind in RecordKind::ALL {
            for record in store.records(kind) {
                for handle in record.encrypted_fields() {
                    ciphertexts.allow(handle, &address);
                    ciphertexts.make_publicly_decryptable(handle);
                    handles += 1;
                }
            }
        }

        tracing::info!(
            telemetry = store.len(RecordKind::Telemetry),
            schedules = store.len(RecordKind::Schedule),
            handles,
            "Restored ledger state"
        );

        Ok(Self {
            address,
            store,
            events: EventLog::new(),
            ciphertexts,
            verifier,
        })
    }
}

impl<C, V> Ledger<C, V> {
    /// Address the ledger acts as when it is granted handle permissions
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn ciphertext_service(&self) -> &C {
        &self.ciphertexts
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_restore_replays_access() {
        let mut original = ledger();
        original
            .submit_telemetry(&ctx(ALICE), "car1", &encrypt(42), &encrypt(100))
            .unwrap();
        let handles = original
            .get_record(RecordKind::Telemetry, "car1")
            .unwrap()
            .encrypted_fields()
            .to_vec();

        let restored = Ledger::restore(
            LEDGER,
            original.store().clone(),
            MockCiphertexts::default(),
            MockVerifier,
        )
        .unwrap();

        for handle in &handles {
            assert!(restored.ciphertext_service().public.contains(handle));
            assert!(restored.ciphertext_service().allowed[handle].contains(&LEDGER));
        }
        assert_eq!(restored.list_telemetry_ids(), ["car1"]);
        assert!(restored.events().is_empty());
    }
}
