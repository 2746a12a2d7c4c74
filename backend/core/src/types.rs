use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback disease name used when the model omits one.
pub const UNKNOWN_DISEASE: &str = "Unknown Disease";

/// Fallback text for `causes` and `treatment`.
pub const INFORMATION_NOT_AVAILABLE: &str = "Information not available.";

/// Reference to an uploaded plant image plus its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    reference: String,
    mime_type: String,
}

impl ImageRef {
    pub fn new(reference: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            mime_type: mime_type.into(),
        }
    }

    /// URI or storage path of the image.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Image bytes after acquisition, ready to be inlined into a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64_payload: String,
    pub mime_type: String,
}

/// The advisory fields the model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvisoryField {
    DiseaseName,
    Causes,
    Treatment,
}

impl AdvisoryField {
    pub const ALL: [AdvisoryField; 3] = [Self::DiseaseName, Self::Causes, Self::Treatment];

    /// JSON key used on the wire and in the output schema.
    pub fn key(&self) -> &'static str {
        match self {
            Self::DiseaseName => "diseaseName",
            Self::Causes => "causes",
            Self::Treatment => "treatment",
        }
    }

    /// Text substituted when the model leaves the field out.
    pub fn fallback(&self) -> &'static str {
        match self {
            Self::DiseaseName => UNKNOWN_DISEASE,
            Self::Causes | Self::Treatment => INFORMATION_NOT_AVAILABLE,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DiseaseName => "The disease name",
            Self::Causes => "Description of the causes",
            Self::Treatment => "Practical advice for treatment and prevention",
        }
    }
}

impl fmt::Display for AdvisoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Provider-neutral description of the structured output we expect back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub required: Vec<AdvisoryField>,
}

impl OutputSchema {
    /// Render as a Gemini `responseSchema` (OpenAPI subset, upper-case types).
    pub fn to_gemini(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for field in &self.required {
            properties.insert(
                field.key().to_string(),
                serde_json::json!({ "type": "STRING", "description": field.description() }),
            );
        }
        let keys: Vec<&str> = self.required.iter().map(|f| f.key()).collect();
        serde_json::json!({
            "type": "OBJECT",
            "properties": properties,
            "required": keys,
            "propertyOrdering": keys,
        })
    }

    /// Render as a strict JSON Schema document.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for field in &self.required {
            properties.insert(
                field.key().to_string(),
                serde_json::json!({ "type": "string", "description": field.description() }),
            );
        }
        let keys: Vec<&str> = self.required.iter().map(|f| f.key()).collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": keys,
            "additionalProperties": false,
        })
    }
}

/// A single schema-constrained generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: EncodedImage,
    pub schema: OutputSchema,
}

/// Untrusted text returned by a generation client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}

impl RawResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Diagnosis with every field populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAdvisory {
    pub disease_name: String,
    pub causes: String,
    pub treatment: String,
}

/// A stored advisory. Created once per successful diagnosis, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAdvisory {
    pub id: Uuid,
    pub image: String,
    pub mime_type: String,
    pub disease_name: String,
    pub causes: String,
    pub treatment: String,
    pub created_at: DateTime<Utc>,
}

impl PersistedAdvisory {
    /// Stamp a normalized advisory with a fresh identity and timestamp.
    ///
    /// Timestamps are kept at microsecond precision, the resolution of the store.
    pub fn new(image: &ImageRef, advisory: NormalizedAdvisory) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: image.reference().to_string(),
            mime_type: image.mime_type().to_string(),
            disease_name: advisory.disease_name,
            causes: advisory.causes,
            treatment: advisory.treatment,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}
