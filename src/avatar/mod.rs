//! Everything that talks to the externally hosted avatar widget.

pub mod host;
pub mod intent;
pub mod readiness;
pub mod widget;

pub use host::{HostDocument, HostError, StaticHost};
pub use intent::IntentSynchronizer;
pub use readiness::{ReadinessConfig, ReadinessHandle, ReadinessState, ReadinessStatus};
pub use widget::{AvatarWidget, WidgetError, WidgetHandle};
