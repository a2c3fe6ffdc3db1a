//! REST side of the records API.
//!
//! [`RecordBackend`] is the seam the loader and the mutation coordinator
//! talk to; [`ApiClient`] implements it over `reqwest` with a per-request
//! timeout. Every error is returned already classified.

use std::time::Duration;

use async_trait::async_trait;
use gate_config::BackendConfig;
use gate_core::{FailureKind, RecordId, RequestFailure};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::classify::{FailureSignal, classify_failure};
use crate::wire::{Envelope, WireRecord, error_text};

const GOOGLE_TOKEN_HEADER: &str = "X-Google-Token";

/// Image part of a new capture.
#[derive(Clone)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Raw user input for a new record: text, an image, or both.
#[derive(Debug, Clone, Default)]
pub struct NewInput {
    pub text: Option<String>,
    pub image: Option<ImageAttachment>,
}

impl NewInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    pub fn is_empty(&self) -> bool {
        let blank_text = self.text.as_deref().is_none_or(|text| text.trim().is_empty());
        blank_text && self.image.is_none()
    }
}

/// Body of `POST /records/{id}/upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadRequest {
    /// User-edited analysis fields; the stored analysis is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_data: Option<Map<String, Value>>,
}

/// Where an upload landed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// `calendar` or `notion`.
    pub destination: Option<String>,
    pub link: Option<String>,
    pub external_id: Option<String>,
}

impl UploadReceipt {
    pub fn from_value(data: &Value) -> Self {
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| data.get(*key).and_then(Value::as_str))
                .map(ToOwned::to_owned)
        };
        Self {
            destination: field(&["type"]),
            link: field(&["link", "url"]),
            external_id: field(&["event_id", "page_id"]),
        }
    }
}

/// Body of `PATCH /records/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordRevision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_data: Option<Map<String, Value>>,
}

impl RecordRevision {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.analysis_data.is_none()
    }
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub ai_available: bool,
}

/// `GET /notion/auth/status` response: whether the user's Notion workspace is
/// linked, so memo uploads can land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotionStatus {
    Connected {
        #[serde(default)]
        user: Option<String>,
    },
    NotConnected,
    /// Linked once, but the stored token no longer validates.
    Expired {
        #[serde(default)]
        message: Option<String>,
    },
    /// The server could not check the link.
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl NotionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Operations the sync engine needs from the records API.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Active records of `user_id`, newest first.
    async fn list_records(&self, user_id: &str) -> Result<Vec<WireRecord>, RequestFailure>;
    /// Submit raw input for classification; returns the created row.
    async fn submit_input(
        &self,
        user_id: &str,
        input: &NewInput,
    ) -> Result<WireRecord, RequestFailure>;
    /// Push an analyzed record to its destination integration.
    async fn upload_record(
        &self,
        id: &RecordId,
        request: &UploadRequest,
        calendar_token: Option<&str>,
    ) -> Result<UploadReceipt, RequestFailure>;
    async fn delete_record(&self, id: &RecordId) -> Result<(), RequestFailure>;
    /// Edit text or analysis fields. `None` when the server reported no change.
    async fn revise_record(
        &self,
        id: &RecordId,
        revision: &RecordRevision,
    ) -> Result<Option<WireRecord>, RequestFailure>;
    async fn health(&self) -> Result<HealthReport, RequestFailure>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            request_timeout,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.base_url.trim(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Underlying client, shared with the event stream transport.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn url_with_user(&self, path: &str, user_id: &str) -> Result<Url, RequestFailure> {
        Url::parse_with_params(&self.url(path), &[("user_id", user_id)]).map_err(|err| {
            RequestFailure::new(
                FailureKind::Unknown,
                None,
                format!("invalid backend URL '{}': {err}", self.base_url),
            )
        })
    }

    /// Send `request` and return the body of a 2xx response.
    async fn send(&self, request: RequestBuilder) -> Result<String, RequestFailure> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|err| transport_failure(&err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| transport_failure(&err))?;

        if status.is_success() {
            return Ok(body);
        }
        let kind = classify_failure(FailureSignal::Http {
            status: status.as_u16(),
            body: &body,
        });
        let failure = RequestFailure::new(kind, Some(status.as_u16()), error_text(&body));
        warn!(status = status.as_u16(), %failure, "backend request failed");
        Err(failure)
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, RequestFailure> {
        let body = self.send(request).await?;
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|err| {
            RequestFailure::new(
                FailureKind::Unknown,
                None,
                format!("unexpected response shape: {err}"),
            )
        })?;
        if envelope.is_error() {
            let message = envelope.message_or("request rejected");
            let kind = classify_failure(FailureSignal::Rejected { message: &message });
            return Err(RequestFailure::new(kind, None, message));
        }
        Ok(envelope)
    }
}

fn transport_failure(err: &reqwest::Error) -> RequestFailure {
    let kind = if err.is_decode() {
        FailureKind::Unknown
    } else {
        classify_failure(FailureSignal::NoResponse {
            timed_out: err.is_timeout(),
        })
    };
    RequestFailure::new(kind, err.status().map(|s| s.as_u16()), err.to_string())
}

fn missing_data(endpoint: &str) -> RequestFailure {
    RequestFailure::new(
        FailureKind::Unknown,
        None,
        format!("{endpoint} response carried no data"),
    )
}

#[async_trait]
impl RecordBackend for ApiClient {
    async fn list_records(&self, user_id: &str) -> Result<Vec<WireRecord>, RequestFailure> {
        let url = self.url_with_user("/records", user_id)?;
        let envelope: Envelope<Vec<WireRecord>> =
            self.send_envelope(self.client.get(url)).await?;
        let rows = envelope.data.unwrap_or_default();
        debug!(count = rows.len(), "listed records");
        Ok(rows)
    }

    async fn submit_input(
        &self,
        user_id: &str,
        input: &NewInput,
    ) -> Result<WireRecord, RequestFailure> {
        let mut form = Form::new().text("user_id", user_id.to_string());
        if let Some(text) = input.text.as_deref().filter(|text| !text.trim().is_empty()) {
            form = form.text("text", text.to_string());
        }
        if let Some(image) = &input.image {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime_type)
                .map_err(|err| {
                    RequestFailure::new(
                        FailureKind::Unknown,
                        None,
                        format!("invalid image type '{}': {err}", image.mime_type),
                    )
                })?;
            form = form.part("image", part);
        }

        let request = self.client.post(self.url("/records/analyze")).multipart(form);
        let envelope: Envelope<WireRecord> = self.send_envelope(request).await?;
        envelope.data.ok_or_else(|| missing_data("analyze"))
    }

    async fn upload_record(
        &self,
        id: &RecordId,
        request: &UploadRequest,
        calendar_token: Option<&str>,
    ) -> Result<UploadReceipt, RequestFailure> {
        let mut builder = self
            .client
            .post(self.url(&format!("/records/{id}/upload")))
            .json(request);
        if let Some(token) = calendar_token {
            builder = builder.header(GOOGLE_TOKEN_HEADER, token);
        }
        let envelope: Envelope<Value> = self.send_envelope(builder).await?;
        Ok(envelope
            .data
            .as_ref()
            .map(UploadReceipt::from_value)
            .unwrap_or_default())
    }

    async fn delete_record(&self, id: &RecordId) -> Result<(), RequestFailure> {
        let request = self.client.delete(self.url(&format!("/records/{id}")));
        let _: Envelope<Value> = self.send_envelope(request).await?;
        Ok(())
    }

    async fn revise_record(
        &self,
        id: &RecordId,
        revision: &RecordRevision,
    ) -> Result<Option<WireRecord>, RequestFailure> {
        let request = self
            .client
            .patch(self.url(&format!("/records/{id}")))
            .json(revision);
        let envelope: Envelope<WireRecord> = self.send_envelope(request).await?;
        Ok(envelope.data)
    }

    async fn health(&self) -> Result<HealthReport, RequestFailure> {
        let body = self.send(self.client.get(self.url("/health"))).await?;
        serde_json::from_str(&body).map_err(|err| {
            RequestFailure::new(
                FailureKind::Unknown,
                None,
                format!("unexpected health response: {err}"),
            )
        })
    }
}

impl ApiClient {
    /// Notion link state of `user_id`.
    pub async fn notion_status(&self, user_id: &str) -> Result<NotionStatus, RequestFailure> {
        let url = self.url_with_user("/notion/auth/status", user_id)?;
        let body = self.send(self.client.get(url)).await?;
        serde_json::from_str(&body).map_err(|err| {
            RequestFailure::new(
                FailureKind::Unknown,
                None,
                format!("unexpected notion status response: {err}"),
            )
        })
    }
}
