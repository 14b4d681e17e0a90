//! Capability surface of the third-party avatar widget.
//!
//! The widget arrives late (after an out-of-band script load) and may expose
//! any subset of its methods, so each one is an optional boxed closure and
//! the whole object sits in a shared slot filled in when it shows up.

use crate::types::avatar::SpeakRequest;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    #[error("widget does not provide `{0}`")]
    Missing(&'static str),
    #[error("widget call failed: {0}")]
    Failed(String),
    #[error("widget call panicked: {0}")]
    Panicked(String),
}

pub type IsLoadedFn = Box<dyn Fn() -> bool + Send + Sync>;
pub type SpeakFn = Box<dyn Fn(&SpeakRequest) -> Result<(), WidgetError> + Send + Sync>;
pub type SetIntentFn = Box<dyn Fn(&str) -> Result<(), WidgetError> + Send + Sync>;
pub type SetVolumeFn = Box<dyn Fn(f32) -> Result<(), WidgetError> + Send + Sync>;

#[derive(Default)]
pub struct AvatarWidget {
    is_loaded: Option<IsLoadedFn>,
    speak: Option<SpeakFn>,
    set_intent: Option<SetIntentFn>,
    set_volume: Option<SetVolumeFn>,
}

impl fmt::Debug for AvatarWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarWidget")
            .field("is_loaded", &self.is_loaded.is_some())
            .field("speak", &self.speak.is_some())
            .field("set_intent", &self.set_intent.is_some())
            .field("set_volume", &self.set_volume.is_some())
            .finish()
    }
}

impl AvatarWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_is_loaded(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.is_loaded = Some(Box::new(f));
        self
    }

    pub fn with_speak(
        mut self,
        f: impl Fn(&SpeakRequest) -> Result<(), WidgetError> + Send + Sync + 'static,
    ) -> Self {
        self.speak = Some(Box::new(f));
        self
    }

    pub fn with_set_intent(
        mut self,
        f: impl Fn(&str) -> Result<(), WidgetError> + Send + Sync + 'static,
    ) -> Self {
        self.set_intent = Some(Box::new(f));
        self
    }

    pub fn with_set_volume(
        mut self,
        f: impl Fn(f32) -> Result<(), WidgetError> + Send + Sync + 'static,
    ) -> Self {
        self.set_volume = Some(Box::new(f));
        self
    }

    /// The widget's own load flag. A missing method or a failing call reads
    /// as "not loaded".
    pub fn is_loaded(&self) -> bool {
        let Some(is_loaded) = self.is_loaded.as_ref() else {
            return false;
        };
        guarded(|| Ok(is_loaded())).unwrap_or_else(|e| {
            tracing::warn!("avatar isLoaded check failed: {}", e);
            false
        })
    }

    pub fn speak(&self, request: &SpeakRequest) -> Result<(), WidgetError> {
        let speak = self.speak.as_ref().ok_or(WidgetError::Missing("speak"))?;
        guarded(|| speak(request))
    }

    pub fn set_intent(&self, intent: &str) -> Result<(), WidgetError> {
        let set_intent = self.set_intent.as_ref().ok_or(WidgetError::Missing("setIntent"))?;
        guarded(|| set_intent(intent))
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), WidgetError> {
        let set_volume = self.set_volume.as_ref().ok_or(WidgetError::Missing("setVolume"))?;
        guarded(|| set_volume(volume))
    }
}

/// Runs a widget call, turning a panic into a [`WidgetError`].
fn guarded<R>(call: impl FnOnce() -> Result<R, WidgetError>) -> Result<R, WidgetError> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(WidgetError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Shared slot the widget is installed into once its script has loaded.
#[derive(Debug, Clone, Default)]
pub struct WidgetHandle {
    slot: Arc<RwLock<Option<Arc<AvatarWidget>>>>,
}

impl WidgetHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, widget: AvatarWidget) {
        tracing::info!("avatar widget installed: {:?}", widget);
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(widget));
    }

    pub fn remove(&self) {
        self.slot.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn current(&self) -> Option<Arc<AvatarWidget>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some_and(|widget| widget.is_loaded())
    }
}
