//! Diagnosis Event Logger
//!
//! Structured pipeline events (requested, diagnosed, failed) emitted through
//! `tracing` on the `diagnosis_events` target, which lands in the rolling NDJSON logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::{redact_and_truncate, redact_secrets_and_truncate};

/// Longest free-text detail (error messages, raw model output) kept in an event.
const MAX_DETAIL_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosisEvent {
    Requested {
        image: String,
        mime_type: String,
    },
    Diagnosed {
        advisory_id: String,
        disease_name: String,
        defaulted_fields: Vec<String>,
        provider: String,
        latency_ms: u64,
    },
    Failed {
        kind: String,
        detail: String,
        raw_response: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: DiagnosisEvent,
}

impl EventLogEntry {
    /// Build a log entry, redacting free text before it can reach any sink.
    pub fn new(request_id: &str, mut event: DiagnosisEvent) -> Self {
        if let DiagnosisEvent::Failed { detail, raw_response, .. } = &mut event {
            *detail = redact_and_truncate(detail, MAX_DETAIL_CHARS);
            if let Some(raw) = raw_response {
                *raw = redact_secrets_and_truncate(raw, MAX_DETAIL_CHARS);
            }
        }

        Self {
            request_id: request_id.into(),
            timestamp: Utc::now(),
            event,
        }
    }
}

pub struct EventLogger;

impl EventLogger {
    /// Logs a pipeline event, immediately serializing it to the tracing system.
    pub fn log_event(request_id: &str, event: DiagnosisEvent) {
        let entry = EventLogEntry::new(request_id, event);
        let payload = serde_json::to_string(&entry).unwrap_or_default();

        match entry.event {
            DiagnosisEvent::Failed { .. } => {
                warn!(target: "diagnosis_events", event = %payload, "Diagnosis event")
            }
            _ => info!(target: "diagnosis_events", event = %payload, "Diagnosis event"),
        }
    }
}
