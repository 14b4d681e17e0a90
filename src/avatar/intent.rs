use crate::avatar::widget::{AvatarWidget, WidgetError, WidgetHandle};
use crate::types::avatar::{AvatarIntent, Mood, SpeakRequest};

/// Mirrors local state onto the widget, best effort.
///
/// Every call checks the widget and method exist, contains any failure and
/// reports only whether the call went through. Session state is never
/// touched from here.
pub struct IntentSynchronizer {
    widget: WidgetHandle,
    applied: AvatarIntent,
    speak_provider: String,
    speak_config: serde_json::Value,
}

impl IntentSynchronizer {
    pub fn new(widget: WidgetHandle, speak_provider: &str, speak_config: serde_json::Value) -> Self {
        Self {
            widget,
            applied: AvatarIntent::default(),
            speak_provider: speak_provider.to_string(),
            speak_config,
        }
    }

    /// What was last successfully told to the widget.
    pub fn applied(&self) -> AvatarIntent {
        self.applied
    }

    pub fn set_listening(&mut self, listening: bool) -> bool {
        let intent = if listening {
            Mood::Listening.as_intent()
        } else {
            self.applied.mood.as_intent()
        };
        let applied = self.forward("setIntent", |widget| widget.set_intent(intent));
        if applied {
            self.applied.listening = listening;
        }
        applied
    }

    pub fn set_mood(&mut self, mood: Mood) -> bool {
        let applied = self.forward("setIntent", |widget| widget.set_intent(mood.as_intent()));
        if applied {
            self.applied.mood = mood;
        }
        applied
    }

    /// Mute is expressed through the widget's output volume.
    pub fn set_muted(&mut self, muted: bool) -> bool {
        let volume = if muted { 0.0 } else { 1.0 };
        let applied = self.forward("setVolume", |widget| widget.set_volume(volume));
        if applied {
            self.applied.muted = muted;
        }
        applied
    }

    /// Re-sends whatever part of `wanted` the widget has not yet applied.
    pub fn sync(&mut self, wanted: AvatarIntent) {
        let mood_changed = wanted.mood != self.applied.mood;
        if mood_changed {
            self.set_mood(wanted.mood);
        }
        // A mood intent replaces the listening intent on the widget.
        if wanted.listening != self.applied.listening || (mood_changed && wanted.listening) {
            self.set_listening(wanted.listening);
        }
        if wanted.muted != self.applied.muted {
            self.set_muted(wanted.muted);
        }
    }

    pub fn speak(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let request = SpeakRequest::new(text, &self.speak_provider, self.speak_config.clone());
        self.forward("speak", |widget| widget.speak(&request))
    }

    fn forward(
        &self,
        capability: &str,
        call: impl FnOnce(&AvatarWidget) -> Result<(), WidgetError>,
    ) -> bool {
        let Some(widget) = self.widget.current() else {
            tracing::debug!("avatar widget not loaded, skipping {}", capability);
            return false;
        };
        match call(&widget) {
            Ok(()) => true,
            Err(WidgetError::Missing(method)) => {
                tracing::debug!("avatar widget lacks {}, skipping", method);
                false
            }
            Err(e) => {
                tracing::warn!("avatar {} failed: {}", capability, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recording_widget(calls: &Calls) -> AvatarWidget {
        let intents = calls.clone();
        let volumes = calls.clone();
        let speeches = calls.clone();
        AvatarWidget::new()
            .with_set_intent(move |intent| {
                intents.lock().unwrap().push(format!("intent:{}", intent));
                Ok(())
            })
            .with_set_volume(move |volume| {
                volumes.lock().unwrap().push(format!("volume:{}", volume));
                Ok(())
            })
            .with_speak(move |request| {
                speeches
                    .lock()
                    .unwrap()
                    .push(format!("speak:{}:{}", request.provider(), request.text()));
                Ok(())
            })
    }

    #[test]
    fn forwards_to_available_methods() {
        let calls = Calls::default();
        let handle = WidgetHandle::new();
        handle.install(recording_widget(&calls));
        let mut sync = IntentSynchronizer::new(handle, "default", serde_json::Value::Null);

        assert!(sync.set_mood(Mood::Happy));
        assert!(sync.set_listening(true));
        assert!(sync.set_listening(false));
        assert!(sync.set_muted(true));
        assert!(sync.speak("hello"));
        assert!(!sync.speak("   "));

        assert_eq!(
            *calls.lock().unwrap(),
            [
                "intent:happy",
                "intent:listening",
                "intent:happy",
                "volume:0",
                "speak:default:hello"
            ]
        );
        assert_eq!(
            sync.applied(),
            AvatarIntent {
                mood: Mood::Happy,
                muted: true,
                listening: false
            }
        );
    }

    #[test]
    fn missing_widget_or_method_is_a_no_op() {
        let handle = WidgetHandle::new();
        let mut sync = IntentSynchronizer::new(handle.clone(), "default", serde_json::Value::Null);
        assert!(!sync.set_mood(Mood::Thinking));
        assert!(!sync.speak("anyone there?"));

        handle.install(AvatarWidget::new().with_is_loaded(|| true));
        assert!(!sync.set_mood(Mood::Thinking));
        assert!(!sync.set_muted(true));
        assert_eq!(sync.applied(), AvatarIntent::default());
    }

    #[test]
    fn sync_sends_only_what_is_missing() {
        let calls = Calls::default();
        let handle = WidgetHandle::new();
        let mut sync = IntentSynchronizer::new(handle.clone(), "default", serde_json::Value::Null);
        let wanted = AvatarIntent {
            mood: Mood::Happy,
            muted: true,
            listening: true,
        };

        sync.sync(wanted);
        assert_eq!(sync.applied(), AvatarIntent::default());

        handle.install(recording_widget(&calls));
        sync.sync(wanted);
        assert_eq!(sync.applied(), wanted);
        assert_eq!(
            *calls.lock().unwrap(),
            ["intent:happy", "intent:listening", "volume:0"]
        );

        sync.sync(wanted);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn failing_widget_is_swallowed() {
        let handle = WidgetHandle::new();
        handle.install(
            AvatarWidget::new()
                .with_set_intent(|_| Err(WidgetError::Failed("renderer crashed".to_string())))
                .with_speak(|_| panic!("tts exploded")),
        );
        let mut sync = IntentSynchronizer::new(handle, "default", serde_json::Value::Null);

        assert!(!sync.set_mood(Mood::Concerned));
        assert!(!sync.speak("hello"));
        assert_eq!(sync.applied().mood, Mood::Neutral);
    }
}
