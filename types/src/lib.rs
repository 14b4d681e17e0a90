pub mod avatar;
pub mod events;
mod message;

pub use events::{ClientEvent, ServerEvent};
pub use message::Message;
