//! Telemetry and structured logging components for CropDoc.
//!
//! Handles log redaction, JSON output generation, file rotation, and diagnosis event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{DiagnosisEvent, EventLogEntry, EventLogger};
pub use logger::init_logger;
pub use redact::{
    redact_and_truncate, redact_secrets, redact_secrets_and_truncate, redact_sensitive_data,
};
