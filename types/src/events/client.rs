/// Payload of the outbound `user_message` event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserMessagePayload {
    message: String,
    /// Always `false`: the backend's own avatar renderer stays off because
    /// rendering is delegated to the external widget.
    avatar: bool,
}

impl UserMessagePayload {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            avatar: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn avatar(&self) -> bool {
        self.avatar
    }
}
