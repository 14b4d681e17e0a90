use crate::session::InvalidTransition;

/// Local failure to hand an event to the transport. Never a transport error:
/// nothing reached the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("not connected to the server")]
    NotConnected,
    #[error("connection has been closed")]
    Closed,
    #[error("outbound queue is full")]
    Full,
}

/// Why a submission did not go out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("message is blank")]
    Blank,
    #[error(transparent)]
    Busy(#[from] InvalidTransition),
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Why a voice transcript was not staged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceRejected {
    #[error("transcript too short after normalization: {0:?}")]
    TooShort(String),
    #[error("another voice submission is still being dispatched")]
    Busy,
}
