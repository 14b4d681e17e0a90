//! Staging of recognized voice transcripts.
//!
//! A single owned permit is taken when a transcript is staged and released
//! only when the staged value is dropped, i.e. after the dispatch it fed has
//! run. A second transcript arriving meanwhile is refused.

use crate::error::VoiceRejected;
use crate::utils::normalize::{is_submittable, normalize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct VoiceGate {
    permit: Arc<Semaphore>,
}

impl Default for VoiceGate {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceGate {
    pub fn new() -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Normalizes `raw` and, if worth sending, takes the permit.
    pub fn stage(&self, raw: &str) -> Result<StagedVoice, VoiceRejected> {
        let text = normalize(raw);
        if !is_submittable(&text) {
            return Err(VoiceRejected::TooShort(text));
        }
        let permit = self
            .permit
            .clone()
            .try_acquire_owned()
            .map_err(|_| VoiceRejected::Busy)?;
        tracing::debug!("staged voice transcript: {:?}", text);
        Ok(StagedVoice {
            text,
            _permit: permit,
        })
    }

    pub fn is_processing(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

/// A normalized transcript holding the gate until dropped.
#[derive(Debug)]
pub struct StagedVoice {
    text: String,
    _permit: OwnedSemaphorePermit,
}

impl StagedVoice {
    pub fn text(&self) -> &str {
        &self.text
    }
}
