use std::fmt;

/// Moods the external avatar understands through `setIntent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Thinking,
    Listening,
    Speaking,
    Concerned,
}

impl Mood {
    /// Intent string passed to the widget.
    pub fn as_intent(&self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Thinking => "thinking",
            Mood::Listening => "listening",
            Mood::Speaking => "speaking",
            Mood::Concerned => "concerned",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_intent())
    }
}

/// Argument of the widget's `speak({text, provider, config})` call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakRequest {
    text: String,
    provider: String,
    config: serde_json::Value,
}

impl SpeakRequest {
    pub fn new(text: &str, provider: &str, config: serde_json::Value) -> Self {
        Self {
            text: text.to_string(),
            provider: provider.to_string(),
            config,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }
}

/// What the session last told the avatar. Not the widget's real state, which
/// is not observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AvatarIntent {
    pub mood: Mood,
    pub muted: bool,
    pub listening: bool,
}
