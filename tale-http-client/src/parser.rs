//! Response decoding utilities

use crate::error::TaleError;
use crate::transport::RawResponse;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::warn;

/// A decoded response body
///
/// Decoding is best effort: a JSON content type with a body that does not
/// parse still yields `Text`, so callers must be ready for either shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Body parsed as JSON
    Json(Value),
    /// Body returned verbatim
    Text(String),
}

impl Decoded {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Decoded::Json(value) => Some(value),
            Decoded::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Decoded::Json(value) => Some(value),
            Decoded::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Decoded::Text(text) => Some(text),
            Decoded::Json(_) => None,
        }
    }

    /// The top-level `status` field of a JSON payload
    pub fn status(&self) -> Option<&str> {
        self.as_json()?.get("status")?.as_str()
    }

    /// The top-level `data` field of a JSON payload
    pub fn data(&self) -> Option<&Value> {
        self.as_json()?.get("data")
    }
}

/// Decoder with a cached content-type pattern
#[derive(Clone, Debug)]
pub(crate) struct ResponseParser {
    json_regex: OnceLock<Regex>,
}

impl ResponseParser {
    /// Create a new parser with an uninitialized cache
    pub fn new() -> Self {
        Self {
            json_regex: OnceLock::new(),
        }
    }

    /// Get or compile the JSON content-type regex
    fn json_regex(&self) -> &Regex {
        self.json_regex
            .get_or_init(|| Regex::new(r"(?i)json").unwrap())
    }

    pub fn is_json(&self, content_type: Option<&str>) -> bool {
        content_type.is_some_and(|ct| self.json_regex().is_match(ct))
    }

    /// Decode a body according to its content type
    pub fn decode(&self, content_type: Option<&str>, body: String) -> Decoded {
        if !self.is_json(content_type) {
            return Decoded::Text(body);
        }

        match serde_json::from_str(&body) {
            Ok(value) => Decoded::Json(value),
            Err(err) => {
                warn!(%err, "JSON content type with unparsable body, returning raw text");
                Decoded::Text(body)
            }
        }
    }

    /// Reject payloads that report `"status": "error"`
    pub fn check_api_status(&self, decoded: Decoded) -> Result<Decoded, TaleError> {
        if let Decoded::Json(payload) = &decoded
            && payload.get("status").and_then(Value::as_str) == Some("error")
        {
            return Err(TaleError::Api {
                code: payload.get("code").and_then(Value::as_str).map(str::to_owned),
                message: api_error_message(payload),
                payload: payload.clone(),
            });
        }
        Ok(decoded)
    }

    /// Decode a raw response and apply the application-error policy
    ///
    /// Structured error payloads win over the HTTP status, so a 4xx with
    /// `"status": "error"` surfaces as `TaleError::Api`.
    pub fn decode_response(&self, raw: &RawResponse) -> Result<Decoded, TaleError> {
        let decoded = self.decode(raw.content_type(), raw.body.clone());
        let decoded = self.check_api_status(decoded)?;

        if !raw.status.is_success() {
            return Err(TaleError::InvalidStatus { status: raw.status });
        }

        Ok(decoded)
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarize `error` or per-field `errors` from an error payload
fn api_error_message(payload: &Value) -> String {
    if let Some(message) = payload.get("error").and_then(Value::as_str) {
        return message.to_string();
    }

    if let Some(errors) = payload.get("errors").and_then(Value::as_object) {
        let parts: Vec<String> = errors
            .iter()
            .map(|(field, messages)| {
                let text = match messages {
                    Value::Array(items) => items
                        .iter()
                        .map(|m| m.as_str().map(str::to_owned).unwrap_or_else(|| m.to_string()))
                        .collect::<Vec<_>>()
                        .join(", "),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{field}: {text}")
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }

    "unknown error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_parsed() {
        let parser = ResponseParser::new();
        let decoded = parser.decode(Some("application/json"), r#"{"a":1}"#.to_string());
        assert_eq!(decoded, Decoded::Json(json!({"a": 1})));
    }

    #[test]
    fn test_malformed_json_falls_back_to_text() {
        let parser = ResponseParser::new();
        let decoded = parser.decode(Some("application/json"), "not json".to_string());
        assert_eq!(decoded, Decoded::Text("not json".to_string()));
    }

    #[test]
    fn test_non_json_content_type_left_alone() {
        let parser = ResponseParser::new();
        let decoded = parser.decode(Some("text/html; charset=utf-8"), r#"{"a":1}"#.to_string());
        assert_eq!(decoded, Decoded::Text(r#"{"a":1}"#.to_string()));

        let decoded = parser.decode(None, "plain".to_string());
        assert_eq!(decoded, Decoded::Text("plain".to_string()));
    }

    #[test]
    fn test_json_content_type_variants() {
        let parser = ResponseParser::new();
        assert!(parser.is_json(Some("application/json; charset=utf-8")));
        assert!(parser.is_json(Some("application/vnd.api+JSON")));
        assert!(parser.is_json(Some("text/json")));
        assert!(!parser.is_json(Some("text/plain")));
        assert!(!parser.is_json(None));
    }

    #[test]
    fn test_error_payload_with_message() {
        let parser = ResponseParser::new();
        let payload = json!({"status": "error", "code": "common.login_required", "error": "Login required"});
        let result = parser.check_api_status(Decoded::Json(payload.clone()));
        match result {
            Err(TaleError::Api { code, message, payload: kept }) => {
                assert_eq!(code.as_deref(), Some("common.login_required"));
                assert_eq!(message, "Login required");
                assert_eq!(kept, payload);
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_payload_with_field_errors() {
        let parser = ResponseParser::new();
        let payload = json!({
            "status": "error",
            "errors": {"application_name": ["This field is required"]}
        });
        match parser.check_api_status(Decoded::Json(payload)) {
            Err(TaleError::Api { code, message, .. }) => {
                assert!(code.is_none());
                assert_eq!(message, "application_name: This field is required");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_ok_and_text_payloads_pass() {
        let parser = ResponseParser::new();
        let ok = Decoded::Json(json!({"status": "ok", "data": {}}));
        assert_eq!(parser.check_api_status(ok.clone()).unwrap(), ok);

        let text = Decoded::Text("status: error".to_string());
        assert_eq!(parser.check_api_status(text.clone()).unwrap(), text);
    }

    #[test]
    fn test_accessors() {
        let decoded = Decoded::Json(json!({"status": "ok", "data": {"x": 1}}));
        assert_eq!(decoded.status(), Some("ok"));
        assert_eq!(decoded.data(), Some(&json!({"x": 1})));
        assert!(decoded.as_text().is_none());
        assert!(Decoded::Text("t".into()).data().is_none());
    }
}
