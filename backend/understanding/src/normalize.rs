//! Response validation and normalization.
//!
//! Model output is untrusted even when schema-constrained. The checks run in a
//! fixed order:
//!
//! 1. empty or whitespace-only text is rejected outright;
//! 2. the text must parse as JSON, after light repair (code fences, or the
//!    first complete object embedded in leading or trailing chatter);
//! 3. each advisory field that is missing, null, non-string or blank is
//!    replaced by its fallback text, and the substitution is recorded.
//!
//! Steps 1 and 2 fail the run. Step 3 never does.

use serde_json::{Map, Value};

use cropdoc_core::{AdvisoryField, DiagnosisError, NormalizedAdvisory};

/// A normalized advisory plus the fields that had to be filled with fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub advisory: NormalizedAdvisory,
    pub defaulted: Vec<AdvisoryField>,
}

impl Normalized {
    pub fn is_complete(&self) -> bool {
        self.defaulted.is_empty()
    }
}

/// Turn raw model text into a fully-populated advisory.
pub fn normalize(raw: &str) -> Result<Normalized, DiagnosisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DiagnosisError::EmptyResponse);
    }

    let malformed = |reason: String| DiagnosisError::MalformedResponse {
        raw: raw.to_string(),
        reason,
    };

    let object = match parse_lenient(trimmed).map_err(malformed)? {
        Value::Object(map) => map,
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(map)) => map,
            _ => return Err(malformed("top-level array holds no object".to_string())),
        },
        other => {
            return Err(malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(fill_fields(&object))
}

fn fill_fields(object: &Map<String, Value>) -> Normalized {
    let mut defaulted = Vec::new();
    let mut take = |field: AdvisoryField| -> String {
        match object
            .get(field.key())
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        {
            Some(value) => value.to_string(),
            None => {
                defaulted.push(field);
                field.fallback().to_string()
            }
        }
    };

    let advisory = NormalizedAdvisory {
        disease_name: take(AdvisoryField::DiseaseName),
        causes: take(AdvisoryField::Causes),
        treatment: take(AdvisoryField::Treatment),
    };

    Normalized {
        advisory,
        defaulted,
    }
}

fn parse_lenient(text: &str) -> Result<Value, String> {
    let first_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    if let Some(inner) = strip_code_fence(text) {
        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            return Ok(value);
        }
    }

    if let Some(value) = first_embedded_object(text) {
        return Ok(value);
    }

    Err(first_error)
}

/// Body of a ```` ```json ... ``` ```` block, if the whole text is one.
fn strip_code_fence(text: &str) -> Option<&str> {
    let body = text.strip_prefix("```")?.strip_suffix("```")?;
    let body = match body.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest,
        _ => body,
    };
    Some(body.trim())
}

/// First complete JSON object embedded in `text`. Whatever follows it is ignored.
fn first_embedded_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        match serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
        {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
