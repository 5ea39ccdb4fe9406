use std::sync::mpsc::Sender;
use tracing::debug;

/// BCP 47 tag handed to the speech engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LanguageTag {
    #[strum(serialize = "en-US")]
    English,
    #[strum(serialize = "ja-JP")]
    Japanese,
}

/// One-shot "playback is over" notification for a single utterance.
///
/// Fires exactly once: either through `complete`, or when dropped unfired
/// (playback failed or was abandoned).
#[derive(Debug)]
pub struct SpeechCompletion {
    tx: Option<Sender<u64>>,
    generation: u64,
}

impl SpeechCompletion {
    pub(crate) fn new(tx: Sender<u64>, generation: u64) -> Self {
        Self {
            tx: Some(tx),
            generation,
        }
    }

    /// Completion for an utterance nobody waits on
    pub fn detached() -> Self {
        Self {
            tx: None,
            generation: 0,
        }
    }

    pub fn complete(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(tx) = self.tx.take() {
            // The player may already be gone
            let _ = tx.send(self.generation);
        }
    }
}

impl Drop for SpeechCompletion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!(generation = self.generation, "speech completion dropped unfired");
        }
        self.fire();
    }
}

/// Text-to-speech backend
pub trait Speaker {
    /// Start speaking `text`; `completion` must be fired or dropped when done
    fn speak(&mut self, text: &str, language: LanguageTag, completion: SpeechCompletion);

    /// Stop any utterance in progress
    fn cancel(&mut self) {}
}

/// Speaker for environments without a voice: completes immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn speak(&mut self, text: &str, language: LanguageTag, completion: SpeechCompletion) {
        debug!(text, %language, "no voice available, skipping speech");
        completion.complete();
    }
}
