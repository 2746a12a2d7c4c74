use thiserror::Error;

/// Failures a diagnosis run can end with.
///
/// Detail strings are for logs only; callers get [`DiagnosisError::public_message`].
#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("image fetch failed: {0}")]
    Fetch(String),

    #[error("generation provider error ({provider}): {message}")]
    Generation { provider: String, message: String },

    #[error("generation returned an empty response")]
    EmptyResponse,

    #[error("generation returned malformed output: {reason}")]
    MalformedResponse { raw: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl DiagnosisError {
    /// HTTP-style status class: 400 for caller mistakes, 500 for everything downstream.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            _ => 500,
        }
    }

    /// Short machine-readable kind, used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_error",
            Self::Fetch(_) => "fetch_error",
            Self::Generation { .. } => "generation_error",
            Self::EmptyResponse => "empty_response_error",
            Self::MalformedResponse { .. } => "malformed_response_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Static message safe to hand back to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Input(_) => "No image file uploaded.",
            _ => "An internal server error occurred.",
        }
    }
}
