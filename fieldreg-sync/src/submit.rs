//! Submission client: registers one record with the remote authority.
//!
//! One record per call; no batching, so partial-failure accounting stays
//! per-record. The remote treats `idempotencyKey` as an idempotency token:
//! resubmitting an already-accepted record is a success-no-op, which is what
//! lets the coordinator resubmit safely after a lost accept response.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use fieldreg_core::types::PendingRegistration;

/// Transient submission failure; retry on a later drain pass is reasonable.
#[derive(Debug, Error)]
#[error("network error: {message}")]
pub struct NetworkError {
    pub message: String,
}

/// Definitive response from the remote authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The record was accepted (or had already been accepted, a no-op).
    Accepted,
    /// The server understood and declined the payload. Never retried
    /// automatically; surfaced to the operator instead.
    Rejected { reason: String },
}

/// Stateless per-record submission.
pub trait SubmissionClient {
    fn submit(&self, record: &PendingRegistration) -> Result<SubmitOutcome, NetworkError>;
}

impl<C: SubmissionClient + ?Sized> SubmissionClient for &C {
    fn submit(&self, record: &PendingRegistration) -> Result<SubmitOutcome, NetworkError> {
        (**self).submit(record)
    }
}

/// Wire payload for the registration endpoint.
pub(crate) fn build_payload(record: &PendingRegistration) -> Value {
    let mut payload = json!({
        "name": record.beneficiary.name,
        "phone": record.beneficiary.phone,
        "village": record.beneficiary.village,
        "role": record.beneficiary.role,
        "idempotencyKey": record.id.0,
    });
    if let Some(operator) = &record.registered_by {
        payload["registeredBy"] = json!(operator);
    }
    payload
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// HTTP submission client backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpSubmissionClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpSubmissionClient {
    /// `timeout` bounds each request, so a drain pass can never hang on one
    /// record; a timed-out submit is just a `NetworkError` outcome.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SubmissionClient for HttpSubmissionClient {
    fn submit(&self, record: &PendingRegistration) -> Result<SubmitOutcome, NetworkError> {
        let payload = build_payload(record);
        match self.agent.post(&self.endpoint).send_json(payload) {
            Ok(_) => Ok(SubmitOutcome::Accepted),
            Err(ureq::Error::Status(code, response)) if (400..500).contains(&code) => {
                let body = response
                    .into_string()
                    .unwrap_or_else(|_| String::from("<unreadable body>"));
                let reason = if body.trim().is_empty() {
                    format!("HTTP {code}")
                } else {
                    format!("HTTP {code}: {}", body.trim())
                };
                tracing::warn!("record {} rejected: {}", record.id, reason);
                Ok(SubmitOutcome::Rejected { reason })
            }
            Err(ureq::Error::Status(code, _)) => Err(NetworkError {
                message: format!("server error HTTP {code}"),
            }),
            Err(ureq::Error::Transport(transport)) => Err(NetworkError {
                message: transport.to_string(),
            }),
        }
    }
}
