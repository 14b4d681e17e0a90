pub mod avatar;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod dispatch;
mod error;
pub mod session;
pub mod transcript;
pub mod voice;

pub use assistant_session_types as types;
pub use assistant_session_utils as utils;

pub use client::{Client, ClientTx, ServerRx, Transport};
pub use coordinator::{connect, spawn, Command, SessionHandle, SessionView, SpeechEvent};
pub use error::{SendError, SubmitError, VoiceRejected};
