//! Log Redaction Layer
//!
//! Scrubs provider API keys, access tokens, and phone numbers from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap());
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(sk-[a-zA-Z0-9\-_]{20,})|(AIza[0-9A-Za-z\-_]{35})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap());
static KEY_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([?&]key=)[^&\s]+").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // API keys first so digits inside them are not mistaken for phone numbers
    let redacted = redact_secrets(input);
    TELEPHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").to_string()
}

/// Redacts credentials only (API keys, bearer tokens, `key=` parameters).
///
/// Used for raw model output, where digit runs are part of the diagnosis.
pub fn redact_secrets(input: &str) -> String {
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    KEY_PARAM_RE
        .replace_all(&redacted, "${1}[REDACTED_TOKEN]")
        .to_string()
}

/// Redact, then cap the string at `max_chars` characters.
pub fn redact_and_truncate(input: &str, max_chars: usize) -> String {
    truncate_chars(redact_sensitive_data(input), max_chars)
}

/// Redact credentials only, then cap the string at `max_chars` characters.
pub fn redact_secrets_and_truncate(input: &str, max_chars: usize) -> String {
    truncate_chars(redact_secrets(input), max_chars)
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("…[truncated]");
    truncated
}
