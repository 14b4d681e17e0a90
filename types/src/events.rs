pub mod client;
pub mod server;

use client::*;
use server::*;

/// Events the session emits over the duplex channel.
///
/// Frames are adjacently tagged: `{"event": "user_message", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "user_message")]
    UserMessage(UserMessagePayload),
}

/// Events delivered to the session.
///
/// `Connected`, `Disconnected` and `ConnectError` never travel over the wire;
/// the connection manager synthesizes them from the socket lifecycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connect")]
    Connected,
    #[serde(rename = "disconnect")]
    Disconnected { reason: Option<String> },
    #[serde(rename = "connect_error")]
    ConnectError { message: String },
    #[serde(rename = "response")]
    Response(ResponsePayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
    #[serde(rename = "bot_message")]
    BotMessage(BotMessagePayload),
}

impl ServerEvent {
    /// Parses one text frame. A frame without `data` carries a null payload,
    /// so a bare `{"event": "response"}` still resolves the pending request.
    pub fn from_frame(text: &str) -> serde_json::Result<Self> {
        let mut frame: serde_json::Value = serde_json::from_str(text)?;
        if let serde_json::Value::Object(ref mut fields) = frame {
            fields.entry("data").or_insert(serde_json::Value::Null);
        }
        serde_json::from_value(frame)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected => "connect",
            ServerEvent::Disconnected { .. } => "disconnect",
            ServerEvent::ConnectError { .. } => "connect_error",
            ServerEvent::Response(_) => "response",
            ServerEvent::Error(_) => "error",
            ServerEvent::BotMessage(_) => "bot_message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_message_wire_shape() {
        let event = ClientEvent::UserMessage(UserMessagePayload::new("hello"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "user_message", "data": {"message": "hello", "avatar": false}})
        );
    }

    #[test]
    fn parses_heterogeneous_server_frames() {
        let frame = r#"{"event": "response", "data": {"answer": "42"}}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();
        match event {
            ServerEvent::Response(payload) => assert_eq!(payload.display_text().as_deref(), Some("42")),
            other => panic!("unexpected event: {:?}", other),
        }

        let frame = r#"{"event": "error", "data": "quota exceeded"}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();
        match event {
            ServerEvent::Error(payload) => assert_eq!(payload.message(), "quota exceeded"),
            other => panic!("unexpected event: {:?}", other),
        }

        let frame = r#"{"event": "bot_message", "data": {"message": "hi there"}}"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();
        assert_eq!(event.name(), "bot_message");
    }

    #[test]
    fn frame_without_data_gets_null_payload() {
        let event = ServerEvent::from_frame(r#"{"event": "response"}"#).unwrap();
        match event {
            ServerEvent::Response(payload) => {
                assert_eq!(payload.raw(), &serde_json::Value::Null);
                assert_eq!(payload.display_text(), None);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let event = ServerEvent::from_frame(r#"{"event": "error"}"#).unwrap();
        match event {
            ServerEvent::Error(payload) => assert_eq!(payload.message(), "The server reported an error"),
            other => panic!("unexpected event: {:?}", other),
        }

        let event = ServerEvent::from_frame(r#"{"event": "response", "data": "fine"}"#).unwrap();
        assert_eq!(event, ServerEvent::Response(ResponsePayload::new(json!("fine"))));
        assert!(ServerEvent::from_frame(r#"{"event": "unknown"}"#).is_err());
    }
}
