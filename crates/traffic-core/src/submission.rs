//! Submission handler: ingest new encrypted records

use crate::{
    validate_record_id, CiphertextService, DecryptionVerifier, EncryptedInput, EncryptedRecord,
    Error, EventRecord, Ledger, LedgerEvent, PublicMetadata, RecordKind, Result, TxContext,
};

impl<C, V> Ledger<C, V>
where
    C: CiphertextService,
    V: DecryptionVerifier,
{
    /// Create a record of `kind` under `id` from one encrypted input per field.
    ///
    /// All inputs are converted to handles before anything is written. On
    /// success the record is stored pending, each handle is granted to the
    /// ledger and marked publicly decryptable, the id is appended to the
    /// enumeration list and a `Submitted` event is emitted.
    pub fn submit(
        &mut self,
        ctx: &TxContext,
        kind: RecordKind,
        id: &str,
        location: Option<String>,
        inputs: &[EncryptedInput],
    ) -> Result<EventRecord> {
        validate_record_id(id)?;
        if inputs.len() != kind.field_count() {
            return Err(Error::FieldCountMismatch {
                kind,
                expected: kind.field_count(),
                actual: inputs.len(),
            });
        }
        if self.store.contains(kind, id) {
            return Err(Error::DuplicateRecord {
                kind,
                id: id.to_string(),
            });
        }

        let mut handles = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let handle = self
                .ciphertexts
                .verify_input(&input.ciphertext, &input.proof, &ctx.sender);
            if !handle.is_initialized() {
                tracing::debug!(%kind, id, field = kind.field_name(index), "Rejected ciphertext");
                return Err(Error::InvalidCiphertext {
                    field: kind.field_name(index),
                });
            }
            handles.push(handle);
        }

        let record = EncryptedRecord::new(
            kind,
            id.to_string(),
            ctx.sender,
            handles.clone(),
            PublicMetadata {
                submitted_at: ctx.timestamp,
                location,
            },
        );
        self.store.insert(record)?;

        let ledger = self.address();
        for (handle, input) in handles.iter().zip(inputs) {
            self.ciphertexts.register(handle, &input.ciphertext);
            self.ciphertexts.allow(handle, &ledger);
            self.ciphertexts.make_publicly_decryptable(handle);
        }

        tracing::info!(%kind, id, submitter = %ctx.sender, "Record submitted");

        Ok(self.events.emit(LedgerEvent::Submitted {
            kind,
            id: id.to_string(),
            submitter: ctx.sender,
        }))
    }

    /// Submit vehicle telemetry with encrypted speed and position
    pub fn submit_telemetry(
        &mut self,
        ctx: &TxContext,
        vehicle_id: &str,
        speed: &EncryptedInput,
        position: &EncryptedInput,
    ) -> Result<EventRecord> {
        self.submit(
            ctx,
            RecordKind::Telemetry,
            vehicle_id,
            None,
            &[speed.clone(), position.clone()],
        )
    }

    /// Submit a signal schedule with encrypted cycle time and public location
    pub fn submit_schedule(
        &mut self,
        ctx: &TxContext,
        intersection_id: &str,
        cycle_time: &EncryptedInput,
        location: impl Into<String>,
    ) -> Result<EventRecord> {
        self.submit(
            ctx,
            RecordKind::Schedule,
            intersection_id,
            Some(location.into()),
            std::slice::from_ref(cycle_time),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::testing::*;
    use crate::{EncryptedInput, Error, LedgerEvent, RecordKind};

    #[test]
    fn test_submit_telemetry_creates_pending_record() {
        let mut ledger = ledger();
        let event = ledger
            .submit_telemetry(&ctx(ALICE), "car1", &encrypt(42), &encrypt(100))
            .unwrap();

        assert_eq!(event.seq, 0);
        assert_eq!(
            event.event,
            LedgerEvent::Submitted {
                kind: RecordKind::Telemetry,
                id: "car1".into(),
                submitter: ALICE,
            }
        );

        let view = ledger.get_telemetry("car1").unwrap();
        assert_eq!(view.owner, ALICE);
        assert_eq!(view.decrypted_speed, 0);
        assert_eq!(view.decrypted_position, 0);
        assert!(!view.verified);
        assert_eq!(view.timestamp, 1_700_000_000);
        assert_ne!(view.encrypted_speed, view.encrypted_position);
    }

    #[test]
    fn test_submit_grants_ledger_and_public_decryption() {
        let mut ledger = ledger();
        ledger
            .submit_schedule(&ctx(ALICE), "int1", &encrypt(90), "Main St")
            .unwrap();

        let record = ledger.get_record(RecordKind::Schedule, "int1").unwrap();
        let handle = record.encrypted_fields()[0];
        let service = ledger.ciphertext_service();
        assert!(service.public.contains(&handle));
        assert!(service.allowed[&handle].contains(&LEDGER));
        assert_eq!(ledger.get_schedule("int1").unwrap().location, "Main St");
    }

    #[test]
    fn test_duplicate_rejected_regardless_of_content() {
        let mut ledger = ledger();
        ledger
            .submit_telemetry(&ctx(ALICE), "car1", &encrypt(1), &encrypt(2))
            .unwrap();

        let err = ledger
            .submit_telemetry(&ctx(BOB), "car1", &encrypt(3), &encrypt(4))
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateRecord {
                kind: RecordKind::Telemetry,
                id: "car1".into()
            }
        );

        // Original record and log untouched
        assert_eq!(ledger.get_telemetry("car1").unwrap().owner, ALICE);
        assert_eq!(ledger.list_telemetry_ids(), ["car1"]);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_same_id_allowed_across_kinds() {
        let mut ledger = ledger();
        ledger
            .submit_telemetry(&ctx(ALICE), "x", &encrypt(1), &encrypt(2))
            .unwrap();
        ledger
            .submit_schedule(&ctx(ALICE), "x", &encrypt(3), "here")
            .unwrap();
        assert_eq!(ledger.list_telemetry_ids(), ["x"]);
        assert_eq!(ledger.list_schedule_ids(), ["x"]);
    }

    #[test]
    fn test_invalid_second_ciphertext_creates_nothing() {
        let mut ledger = ledger();
        let mut bad = encrypt(100);
        bad.proof[0] ^= 0xff;

        let err = ledger
            .submit_telemetry(&ctx(ALICE), "car1", &encrypt(42), &bad)
            .unwrap_err();
        assert_eq!(err, Error::InvalidCiphertext { field: "position" });

        assert!(ledger.list_telemetry_ids().is_empty());
        assert!(ledger.events().is_empty());
        assert!(ledger.ciphertext_service().public.is_empty());
        assert!(ledger.ciphertext_service().values.is_empty());
        assert!(matches!(
            ledger.get_telemetry("car1"),
            Err(Error::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_garbage_input_rejected() {
        let mut ledger = ledger();
        let garbage = EncryptedInput::new(vec![1, 2, 3], vec![]);
        let err = ledger
            .submit_schedule(&ctx(ALICE), "int1", &garbage, "nowhere")
            .unwrap_err();
        assert_eq!(err, Error::InvalidCiphertext { field: "cycle_time" });
    }

    #[test]
    fn test_field_count_and_id_checks() {
        let mut ledger = ledger();
        let err = ledger
            .submit(&ctx(ALICE), RecordKind::Telemetry, "car1", None, &[encrypt(1)])
            .unwrap_err();
        assert_eq!(
            err,
            Error::FieldCountMismatch {
                kind: RecordKind::Telemetry,
                expected: 2,
                actual: 1
            }
        );

        let err = ledger
            .submit_telemetry(&ctx(ALICE), "", &encrypt(1), &encrypt(2))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecordId(_)));
        assert!(ledger.events().is_empty());
    }
}
