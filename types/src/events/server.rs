use serde_json::Value;

/// Field names probed, in order, for the text of a `response` payload.
pub const RESPONSE_TEXT_FIELDS: [&str; 4] = ["text", "answer", "response", "content"];

const DEFAULT_ERROR_MESSAGE: &str = "The server reported an error";

/// `response` event. The backend is loose about its shape: a bare string or
/// an object carrying one of [`RESPONSE_TEXT_FIELDS`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ResponsePayload(Value);

impl ResponsePayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Returns the first non-empty text found, or `None` when the payload
    /// carries nothing displayable.
    pub fn display_text(&self) -> Option<String> {
        if let Some(text) = self.0.as_str() {
            return non_empty(text);
        }
        RESPONSE_TEXT_FIELDS
            .iter()
            .filter_map(|field| self.0.get(field).and_then(Value::as_str))
            .find_map(non_empty)
    }
}

/// `error` event: either a bare string or `{ "message": ... }`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Text(String),
    Detailed { message: String },
    Other(Value),
}

impl ErrorPayload {
    pub fn message(&self) -> &str {
        let message = match self {
            ErrorPayload::Text(text) => text.as_str(),
            ErrorPayload::Detailed { message } => message.as_str(),
            ErrorPayload::Other(_) => "",
        };
        if message.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE
        } else {
            message
        }
    }
}

/// `bot_message` event, pushed by the backend outside of the request/response
/// exchange.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BotMessagePayload {
    message: String,
}

impl BotMessagePayload {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_text_probes_fields_in_order() {
        assert_eq!(ResponsePayload::new(json!("plain")).display_text().as_deref(), Some("plain"));
        assert_eq!(ResponsePayload::new(json!({"answer": "42"})).display_text().as_deref(), Some("42"));
        assert_eq!(
            ResponsePayload::new(json!({"content": "c", "text": "t"})).display_text().as_deref(),
            Some("t")
        );
        // Empty fields are skipped in favour of later ones.
        assert_eq!(
            ResponsePayload::new(json!({"text": "", "response": "r"})).display_text().as_deref(),
            Some("r")
        );
    }

    #[test]
    fn display_text_none_for_unknown_shapes() {
        assert_eq!(ResponsePayload::new(json!({"foo": "x"})).display_text(), None);
        assert_eq!(ResponsePayload::new(json!("   ")).display_text(), None);
        assert_eq!(ResponsePayload::new(json!({"text": 7})).display_text(), None);
        assert_eq!(ResponsePayload::new(Value::Null).display_text(), None);
    }

    #[test]
    fn error_message_falls_back() {
        let detailed: ErrorPayload = serde_json::from_value(json!({"message": "bad input"})).unwrap();
        assert_eq!(detailed.message(), "bad input");
        let other: ErrorPayload = serde_json::from_value(json!({"code": 500})).unwrap();
        assert_eq!(other.message(), DEFAULT_ERROR_MESSAGE);
    }
}
