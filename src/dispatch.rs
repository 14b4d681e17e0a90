//! The single choke point between user text, the transcript and the wire.
//!
//! Requests carry no correlation id: the phase machine refuses a submit while
//! one is outstanding, so the next response always belongs to the one pending
//! request. Allowing concurrent requests would require an id echoed back by
//! the server.

use crate::client::Transport;
use crate::error::{SendError, SubmitError};
use crate::session::{InvalidTransition, SessionInput, SessionState};
use crate::transcript::Transcript;
use crate::types::events::client::UserMessagePayload;
use crate::types::{ClientEvent, Message, ServerEvent};
use uuid::Uuid;

pub const NOT_CONNECTED_MESSAGE: &str = "Not connected to the server. Please try again in a moment.";

pub struct Dispatcher<T> {
    transport: T,
    transcript: Transcript,
    state: SessionState,
    input: String,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            state: SessionState::default(),
            transcript: Transcript::new(),
            input: String::new(),
            transport,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Pending, not yet submitted input.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
    }

    /// Appends a user message and sends it. Blank input and a busy session
    /// are refused without side effects. A send failure still leaves the
    /// user message in the transcript, records an error and releases the
    /// session at once; nothing is retried.
    pub fn submit(&mut self, raw: &str) -> Result<Uuid, SubmitError> {
        let text = raw.trim();
        if text.is_empty() {
            tracing::debug!("ignoring blank submission");
            return Err(SubmitError::Blank);
        }
        if let Err(e) = self.state.apply(SessionInput::Submit) {
            tracing::debug!("submission refused: {}", e);
            return Err(e.into());
        }

        let id = self.transcript.append(Message::user(text)).id();
        self.input.clear();

        let event = ClientEvent::UserMessage(UserMessagePayload::new(text));
        match self.transport.send(event) {
            Ok(()) => {
                self.advance(SessionInput::Dispatched);
                tracing::debug!("dispatched message {}", id);
                Ok(id)
            }
            Err(e) => {
                tracing::warn!("failed to dispatch message {}: {}", id, e);
                let message = match e {
                    SendError::NotConnected => NOT_CONNECTED_MESSAGE.to_string(),
                    ref other => format!("Failed to send message: {}", other),
                };
                self.state.record_error(message);
                self.advance(SessionInput::SendFailed);
                Err(e.into())
            }
        }
    }

    /// Applies one inbound event. Returns text the avatar should speak.
    pub fn handle_event(&mut self, event: ServerEvent) -> Option<String> {
        match event {
            ServerEvent::Connected => {
                self.state.set_connected(true);
                self.state.clear_error();
                self.advance(SessionInput::Connected);
                None
            }
            ServerEvent::Disconnected { reason } => {
                tracing::debug!("disconnected: {:?}", reason);
                self.state.set_connected(false);
                None
            }
            ServerEvent::ConnectError { message } => {
                self.state.set_connected(false);
                self.state.record_error(format!("Connection error: {}", message));
                self.advance(SessionInput::ConnectionError);
                None
            }
            ServerEvent::Response(payload) => {
                match payload.display_text() {
                    Some(text) => {
                        self.transcript.append(Message::assistant(&text));
                    }
                    None => tracing::debug!("dropping response without text: {}", payload.raw()),
                }
                self.advance(SessionInput::ResponseArrived);
                None
            }
            ServerEvent::Error(payload) => {
                tracing::warn!("server reported an error: {}", payload.message());
                self.state.record_error(payload.message());
                self.advance(SessionInput::ServerError);
                None
            }
            ServerEvent::BotMessage(payload) => {
                let text = payload.message().trim();
                if text.is_empty() {
                    tracing::debug!("dropping empty bot message");
                    return None;
                }
                self.transcript.append(Message::assistant(text));
                Some(text.to_string())
            }
        }
    }

    pub fn start_listening(&mut self) -> Result<(), InvalidTransition> {
        self.state.apply(SessionInput::StartListening).map(|_| ())
    }

    pub fn stop_listening(&mut self) {
        self.advance(SessionInput::StopListening);
    }

    pub fn close(&self) {
        self.transport.close();
    }

    fn advance(&mut self, input: SessionInput) {
        if let Err(e) = self.state.apply(input) {
            tracing::warn!("unexpected transition: {}", e);
        }
    }
}
