//! Session phase machine.
//!
//! `awaiting_response` and `listening` are views over a single
//! [`SessionPhase`], so they cannot disagree.

/// Where the session is in its request/response and capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// A submit was accepted and is being handed to the transport.
    Sending,
    AwaitingResponse,
    Listening,
    /// The last exchange failed. Accepts new work like `Idle`.
    Error,
}

/// Inputs driving [`SessionPhase::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    Submit,
    Dispatched,
    SendFailed,
    ResponseArrived,
    ServerError,
    ConnectionError,
    Connected,
    StartListening,
    StopListening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {input:?} while {phase:?}")]
pub struct InvalidTransition {
    pub phase: SessionPhase,
    pub input: SessionInput,
}

impl SessionPhase {
    /// The single transition function. Only `Submit` and `StartListening`
    /// can be refused; every other input settles into some phase.
    pub fn transition(self, input: SessionInput) -> Result<SessionPhase, InvalidTransition> {
        use SessionInput as I;
        use SessionPhase as P;

        let next = match (self, input) {
            (P::Idle | P::Error, I::Submit) => P::Sending,
            (P::Sending, I::Dispatched) => P::AwaitingResponse,
            (P::Sending, I::SendFailed) => P::Error,
            (P::Sending | P::AwaitingResponse, I::ResponseArrived) => P::Idle,
            // An error while capturing voice is recorded but capture goes on.
            (P::Listening, I::ServerError | I::ConnectionError) => P::Listening,
            (_, I::ServerError | I::ConnectionError) => P::Error,
            (P::Error, I::Connected) => P::Idle,
            (P::Idle | P::Error | P::Listening, I::StartListening) => P::Listening,
            (P::Listening, I::StopListening) => P::Idle,
            (_, I::Submit | I::StartListening) => {
                return Err(InvalidTransition {
                    phase: self,
                    input,
                })
            }
            (phase, _) => phase,
        };
        Ok(next)
    }

    pub fn awaiting_response(self) -> bool {
        matches!(self, SessionPhase::Sending | SessionPhase::AwaitingResponse)
    }

    pub fn listening(self) -> bool {
        self == SessionPhase::Listening
    }

    pub fn accepts_submit(self) -> bool {
        matches!(self, SessionPhase::Idle | SessionPhase::Error)
    }
}

/// Flags the presentation layer reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    connected: bool,
    phase: SessionPhase,
    last_error: Option<String>,
}

impl SessionState {
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn awaiting_response(&self) -> bool {
        self.phase.awaiting_response()
    }

    pub fn listening(&self) -> bool {
        self.phase.listening()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn apply(&mut self, input: SessionInput) -> Result<SessionPhase, InvalidTransition> {
        let next = self.phase.transition(input)?;
        if next != self.phase {
            tracing::debug!("session phase {:?} -> {:?} on {:?}", self.phase, next, input);
        }
        self.phase = next;
        Ok(next)
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_only_from_idle_or_error() {
        assert_eq!(SessionPhase::Idle.transition(SessionInput::Submit), Ok(SessionPhase::Sending));
        assert_eq!(SessionPhase::Error.transition(SessionInput::Submit), Ok(SessionPhase::Sending));
        for phase in [SessionPhase::Sending, SessionPhase::AwaitingResponse, SessionPhase::Listening] {
            assert!(phase.transition(SessionInput::Submit).is_err(), "{:?} must refuse submit", phase);
        }
    }

    #[test]
    fn errors_release_awaiting() {
        let phase = SessionPhase::AwaitingResponse;
        assert_eq!(phase.transition(SessionInput::ConnectionError), Ok(SessionPhase::Error));
        assert_eq!(phase.transition(SessionInput::ServerError), Ok(SessionPhase::Error));
        assert!(!SessionPhase::Error.awaiting_response());
    }

    #[test]
    fn listening_excludes_pending_requests() {
        assert!(SessionPhase::AwaitingResponse.transition(SessionInput::StartListening).is_err());
        assert_eq!(
            SessionPhase::Listening.transition(SessionInput::ConnectionError),
            Ok(SessionPhase::Listening)
        );
        assert_eq!(SessionPhase::Listening.transition(SessionInput::StopListening), Ok(SessionPhase::Idle));
    }

    #[test]
    fn reconnect_clears_error_phase_only() {
        assert_eq!(SessionPhase::Error.transition(SessionInput::Connected), Ok(SessionPhase::Idle));
        assert_eq!(
            SessionPhase::AwaitingResponse.transition(SessionInput::Connected),
            Ok(SessionPhase::AwaitingResponse)
        );
    }
}
