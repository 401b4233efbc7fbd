//! Verification handler: accept oracle output for a stored record
//!
//! Each supplied plaintext is checked against the handle stored for that field
//! at submission, never against a handle the caller names. A proof produced for
//! some other publicly decryptable value therefore cannot be replayed against
//! this record.

use crate::{
    decode_u32_word, CiphertextService, DecryptionVerifier, Error, EventRecord, Ledger,
    LedgerEvent, RecordKind, Result, RevealedValue, TxContext,
};

impl<C, V> Ledger<C, V>
where
    C: CiphertextService,
    V: DecryptionVerifier,
{
    /// Finalize the plaintext fields of record `id`.
    ///
    /// `reveals` holds one plaintext/proof pair per encrypted field, in record
    /// order. Every pair is verified and decoded before the record is touched;
    /// the first failure aborts the whole call. Verification is one-shot and
    /// open to any caller.
    pub fn verify(
        &mut self,
        ctx: &TxContext,
        kind: RecordKind,
        id: &str,
        reveals: &[RevealedValue],
    ) -> Result<EventRecord> {
        let record = self
            .store
            .get(kind, id)
            .ok_or_else(|| Error::RecordNotFound {
                kind,
                id: id.to_string(),
            })?;
        if record.verified() {
            return Err(Error::AlreadyVerified {
                kind,
                id: id.to_string(),
            });
        }
        if reveals.len() != record.encrypted_fields().len() {
            return Err(Error::FieldCountMismatch {
                kind,
                expected: record.encrypted_fields().len(),
                actual: reveals.len(),
            });
        }

        for (index, (handle, reveal)) in record.encrypted_fields().iter().zip(reveals).enumerate() {
            if let Err(e) = self.verifier.verify(handle, &reveal.plaintext, &reveal.proof) {
                tracing::debug!(
                    %kind,
                    id,
                    field = kind.field_name(index),
                    %handle,
                    error = %e,
                    "Rejected decryption proof"
                );
                return Err(Error::InvalidDecryptionProof {
                    field: kind.field_name(index),
                });
            }
        }

        let values = reveals
            .iter()
            .enumerate()
            .map(|(index, reveal)| {
                decode_u32_word(&reveal.plaintext).ok_or(Error::MalformedPlaintext {
                    field: kind.field_name(index),
                })
            })
            .collect::<Result<Vec<u32>>>()?;

        let record = self
            .store
            .get_mut(kind, id)
            .ok_or_else(|| Error::RecordNotFound {
                kind,
                id: id.to_string(),
            })?;
        record.mark_verified(values.clone(), ctx.timestamp)?;

        tracing::info!(%kind, id, caller = %ctx.sender, ?values, "Record verified");

        Ok(self.events.emit(LedgerEvent::Verified {
            kind,
            id: id.to_string(),
            values,
        }))
    }

    /// Verify telemetry speed and position plaintexts
    pub fn verify_telemetry(
        &mut self,
        ctx: &TxContext,
        vehicle_id: &str,
        speed: &RevealedValue,
        position: &RevealedValue,
    ) -> Result<EventRecord> {
        self.verify(
            ctx,
            RecordKind::Telemetry,
            vehicle_id,
            &[speed.clone(), position.clone()],
        )
    }

    /// Verify a schedule's cycle time plaintext
    pub fn verify_schedule(
        &mut self,
        ctx: &TxContext,
        intersection_id: &str,
        cycle_time: &RevealedValue,
    ) -> Result<EventRecord> {
        self.verify(
            ctx,
            RecordKind::Schedule,
            intersection_id,
            std::slice::from_ref(cycle_time),
        )
    }
}
