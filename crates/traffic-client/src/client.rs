//! Ledger HTTP client

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use traffic_core::api::{
    CiphertextResponse, ErrorResponse, EventsResponse, IdsResponse, SubmitScheduleRequest,
    SubmitTelemetryRequest, VerifyScheduleRequest, VerifyTelemetryRequest, WriteResponse,
    SENDER_HEADER,
};
use traffic_core::{
    Address, EncryptedInput, EncryptedRecord, EventRecord, Handle, Health, RecordKind,
    RevealedValue, ScheduleView, TelemetryView,
};
use traffic_oracle::DecryptionOracle;

use crate::error::{ClientError, Result};

pub struct LedgerClient {
    http: Client,
    base: Url,
    sender: Option<Address>,
}

impl LedgerClient {
    /// Create a client for the server at `server_url`
    pub fn new(server_url: &str) -> Result<Self> {
        let base = Url::parse(server_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(server_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base,
            sender: None,
        })
    }

    /// Address sent in the `x-sender` header on writes
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn write(&self, url: Url) -> Result<RequestBuilder> {
        let sender = self.sender.ok_or(ClientError::NoSender)?;
        Ok(self.http.post(url).header(SENDER_HEADER, sender.to_string()))
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => ClientError::Api {
                    status: status.as_u16(),
                    code: err.code,
                    message: err.error,
                },
                Err(_) => ClientError::Server {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }
        Ok(resp.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let resp = self.http.get(self.url(segments)?).send().await?;
        Self::decode(resp).await
    }

    pub async fn health(&self) -> Result<Health> {
        self.get(&["health"]).await
    }

    pub async fn submit_telemetry(
        &self,
        vehicle_id: &str,
        speed: EncryptedInput,
        position: EncryptedInput,
    ) -> Result<EventRecord> {
        let request = SubmitTelemetryRequest {
            vehicle_id: vehicle_id.to_string(),
            speed,
            position,
        };
        let resp = self
            .write(self.url(&["telemetry"])?)?
            .json(&request)
            .send()
            .await?;
        let written: WriteResponse = Self::decode(resp).await?;
        tracing::debug!(vehicle_id, seq = written.event.seq, "Submitted telemetry");
        Ok(written.event)
    }

    pub async fn submit_schedule(
        &self,
        intersection_id: &str,
        cycle_time: EncryptedInput,
        location: &str,
    ) -> Result<EventRecord> {
        let request = SubmitScheduleRequest {
            intersection_id: intersection_id.to_string(),
            cycle_time,
            location: location.to_string(),
        };
        let resp = self
            .write(self.url(&["schedules"])?)?
            .json(&request)
            .send()
            .await?;
        let written: WriteResponse = Self::decode(resp).await?;
        tracing::debug!(intersection_id, seq = written.event.seq, "Submitted schedule");
        Ok(written.event)
    }

    pub async fn verify_telemetry(
        &self,
        vehicle_id: &str,
        speed: RevealedValue,
        position: RevealedValue,
    ) -> Result<EventRecord> {
        let resp = self
            .write(self.url(&["telemetry", vehicle_id, "verify"])?)?
            .json(&VerifyTelemetryRequest { speed, position })
            .send()
            .await?;
        let written: WriteResponse = Self::decode(resp).await?;
        Ok(written.event)
    }

    pub async fn verify_schedule(
        &self,
        intersection_id: &str,
        cycle_time: RevealedValue,
    ) -> Result<EventRecord> {
        let resp = self
            .write(self.url(&["schedules", intersection_id, "verify"])?)?
            .json(&VerifyScheduleRequest { cycle_time })
            .send()
            .await?;
        let written: WriteResponse = Self::decode(resp).await?;
        Ok(written.event)
    }

    pub async fn get_telemetry(&self, vehicle_id: &str) -> Result<TelemetryView> {
        self.get(&["telemetry", vehicle_id]).await
    }

    pub async fn get_schedule(&self, intersection_id: &str) -> Result<ScheduleView> {
        self.get(&["schedules", intersection_id]).await
    }

    pub async fn get_record(&self, kind: RecordKind, id: &str) -> Result<EncryptedRecord> {
        self.get(&["records", kind.as_str(), id]).await
    }

    pub async fn get_ciphertext(&self, handle: &Handle) -> Result<CiphertextResponse> {
        self.get(&["ciphertexts", &handle.to_string()]).await
    }

    pub async fn list_telemetry_ids(&self) -> Result<Vec<String>> {
        let ids: IdsResponse = self.get(&["telemetry"]).await?;
        Ok(ids.ids)
    }

    pub async fn list_schedule_ids(&self) -> Result<Vec<String>> {
        let ids: IdsResponse = self.get(&["schedules"]).await?;
        Ok(ids.ids)
    }

    pub async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>> {
        match kind {
            RecordKind::Telemetry => self.list_telemetry_ids().await,
            RecordKind::Schedule => self.list_schedule_ids().await,
        }
    }

    /// Poll the event log from `since`
    pub async fn events_since(&self, since: u64, limit: Option<usize>) -> Result<EventsResponse> {
        let mut url = self.url(&["events"])?;
        url.query_pairs_mut().append_pair("since", &since.to_string());
        if let Some(limit) = limit {
            url.query_pairs_mut().append_pair("limit", &limit.to_string());
        }
        let resp = self.http.get(url).send().await?;
        Self::decode(resp).await
    }

    /// Act as the decryption oracle for one record: fetch each stored
    /// ciphertext, decrypt and sign it with `oracle`, then submit the
    /// verification.
    pub async fn relay_record(
        &self,
        oracle: &DecryptionOracle,
        kind: RecordKind,
        id: &str,
    ) -> Result<EventRecord> {
        let record = self.get_record(kind, id).await?;
        let mut reveals = Vec::with_capacity(record.encrypted_fields().len());
        for handle in record.encrypted_fields() {
            let stored = self.get_ciphertext(handle).await?;
            if !stored.publicly_decryptable {
                return Err(traffic_oracle::OracleError::NotPubliclyDecryptable(*handle).into());
            }
            let response = oracle.decrypt_and_sign(handle, &stored.ciphertext)?;
            reveals.push(RevealedValue::from(response));
        }

        match (kind, reveals.as_slice()) {
            (RecordKind::Telemetry, [speed, position]) => {
                self.verify_telemetry(id, speed.clone(), position.clone())
                    .await
            }
            (RecordKind::Schedule, [cycle_time]) => {
                self.verify_schedule(id, cycle_time.clone()).await
            }
            _ => Err(ClientError::InvalidResponse(format!(
                "{} '{}' has {} encrypted fields",
                kind,
                id,
                reveals.len()
            ))),
        }
    }
}
