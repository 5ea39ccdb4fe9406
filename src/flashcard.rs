use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tracing::debug;

use crate::dictionary::Word;
use crate::error::FlashcardError;
use crate::speech::{LanguageTag, Speaker, SpeechCompletion};

pub const DEFAULT_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_LEAD_IN_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FlashcardMode {
    Silent,
    EnglishAudio,
    JapaneseAudio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    /// Silent mode countdown to the next card
    Showing(Duration),
    /// Pause before speaking the current card
    LeadIn(Duration),
    /// Waiting for the speech completion
    Speaking,
}

/// Steps through a deck on a timer, or in step with speech playback.
///
/// Each card shown gets a new generation number; speech completions carrying
/// an older generation are ignored.
pub struct FlashcardPlayer<S: Speaker> {
    deck: Vec<Word>,
    index: usize,
    mode: FlashcardMode,
    speaker: S,
    interval: Duration,
    lead_in: Duration,
    phase: Phase,
    generation: u64,
    completions_tx: Sender<u64>,
    completions_rx: Receiver<u64>,
}

impl<S: Speaker> FlashcardPlayer<S> {
    pub fn new(deck: Vec<Word>, mode: FlashcardMode, speaker: S) -> Result<Self, FlashcardError> {
        if deck.is_empty() {
            return Err(FlashcardError::EmptyDeck);
        }

        let (completions_tx, completions_rx) = mpsc::channel();
        Ok(Self {
            deck,
            index: 0,
            mode,
            speaker,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            lead_in: Duration::from_millis(DEFAULT_LEAD_IN_MS),
            phase: Phase::Stopped,
            generation: 0,
            completions_tx,
            completions_rx,
        })
    }

    pub fn with_timing(mut self, interval: Duration, lead_in: Duration) -> Self {
        self.interval = interval;
        self.lead_in = lead_in;
        self
    }

    pub fn current(&self) -> &Word {
        &self.deck[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.deck.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deck.is_empty()
    }

    pub fn mode(&self) -> FlashcardMode {
        self.mode
    }

    pub fn is_playing(&self) -> bool {
        self.phase != Phase::Stopped
    }

    pub fn speaker_mut(&mut self) -> &mut S {
        &mut self.speaker
    }

    /// Start auto-advancing from the current card
    pub fn play(&mut self) {
        self.generation += 1;
        self.schedule();
        debug!(mode = %self.mode, index = self.index, "flashcards playing");
    }

    pub fn stop(&mut self) {
        if self.phase == Phase::Speaking {
            self.speaker.cancel();
        }
        self.generation += 1;
        self.phase = Phase::Stopped;
        debug!(index = self.index, "flashcards stopped");
    }

    /// Switch modes; a playing deck restarts timing on the current card
    pub fn set_mode(&mut self, mode: FlashcardMode) {
        self.mode = mode;
        if self.is_playing() {
            self.stop();
            self.play();
        }
    }

    pub fn next(&mut self) {
        self.show((self.index + 1) % self.deck.len());
    }

    pub fn previous(&mut self) {
        let len = self.deck.len();
        self.show((self.index + len - 1) % len);
    }

    /// Advance timers and apply speech completions. Returns true when the
    /// current card changed.
    pub fn on_tick(&mut self, elapsed: Duration) -> bool {
        let mut advanced = false;

        match self.phase {
            Phase::Stopped | Phase::Speaking => {}
            Phase::Showing(remaining) => {
                let remaining = remaining.saturating_sub(elapsed);
                if remaining.is_zero() {
                    self.next();
                    advanced = true;
                } else {
                    self.phase = Phase::Showing(remaining);
                }
            }
            Phase::LeadIn(remaining) => {
                let remaining = remaining.saturating_sub(elapsed);
                if remaining.is_zero() {
                    self.speak_current();
                } else {
                    self.phase = Phase::LeadIn(remaining);
                }
            }
        }

        while let Ok(generation) = self.completions_rx.try_recv() {
            if generation == self.generation && self.phase == Phase::Speaking {
                self.next();
                advanced = true;
            } else {
                debug!(generation, current = self.generation, "ignoring stale speech completion");
            }
        }

        advanced
    }

    fn show(&mut self, index: usize) {
        self.index = index;
        if self.is_playing() {
            if self.phase == Phase::Speaking {
                self.speaker.cancel();
            }
            self.generation += 1;
            self.schedule();
        }
    }

    fn schedule(&mut self) {
        self.phase = match self.mode {
            FlashcardMode::Silent => Phase::Showing(self.interval),
            FlashcardMode::EnglishAudio | FlashcardMode::JapaneseAudio => {
                Phase::LeadIn(self.lead_in)
            }
        };
    }

    fn speak_current(&mut self) {
        let word = &self.deck[self.index];
        let (text, language) = match self.mode {
            FlashcardMode::JapaneseAudio => (word.japanese.as_str(), LanguageTag::Japanese),
            _ => (word.english.as_str(), LanguageTag::English),
        };

        self.phase = Phase::Speaking;
        let completion = SpeechCompletion::new(self.completions_tx.clone(), self.generation);
        self.speaker.speak(text, language, completion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::NullSpeaker;

    const INTERVAL: Duration = Duration::from_millis(DEFAULT_INTERVAL_MS);
    const LEAD_IN: Duration = Duration::from_millis(DEFAULT_LEAD_IN_MS);

    #[derive(Default)]
    struct HoldingSpeaker {
        spoken: Vec<(String, LanguageTag)>,
        held: Vec<SpeechCompletion>,
        cancels: usize,
    }

    impl Speaker for HoldingSpeaker {
        fn speak(&mut self, text: &str, language: LanguageTag, completion: SpeechCompletion) {
            self.spoken.push((text.to_string(), language));
            self.held.push(completion);
        }

        fn cancel(&mut self) {
            self.cancels += 1;
        }
    }

    fn create_deck() -> Vec<Word> {
        vec![
            Word::new("apple", "りんご"),
            Word::new("book", "本"),
            Word::new("cat", "猫"),
        ]
    }

    #[test]
    fn test_empty_deck_rejected() {
        assert_eq!(
            FlashcardPlayer::new(vec![], FlashcardMode::Silent, NullSpeaker).err(),
            Some(FlashcardError::EmptyDeck)
        );
    }

    #[test]
    fn test_silent_mode_advances_on_interval() {
        let mut player = FlashcardPlayer::new(create_deck(), FlashcardMode::Silent, NullSpeaker).unwrap();
        player.play();

        assert!(!player.on_tick(Duration::from_millis(2900)));
        assert_eq!(player.index(), 0);
        assert!(player.on_tick(Duration::from_millis(100)));
        assert_eq!(player.current().english, "book");
    }

    #[test]
    fn test_wraps_around() {
        let mut player = FlashcardPlayer::new(create_deck(), FlashcardMode::Silent, NullSpeaker).unwrap();
        player.play();

        for _ in 0..3 {
            assert!(player.on_tick(INTERVAL));
        }
        assert_eq!(player.index(), 0);

        player.previous();
        assert_eq!(player.current().english, "cat");
    }

    #[test]
    fn test_stopped_player_does_not_advance() {
        let mut player = FlashcardPlayer::new(create_deck(), FlashcardMode::Silent, NullSpeaker).unwrap();
        assert!(!player.on_tick(INTERVAL));

        player.play();
        player.stop();
        assert!(!player.on_tick(INTERVAL));
        assert_eq!(player.index(), 0);
    }

    #[test]
    fn test_audio_mode_waits_for_completion() {
        let mut player = FlashcardPlayer::new(
            create_deck(),
            FlashcardMode::JapaneseAudio,
            HoldingSpeaker::default(),
        )
        .unwrap();
        player.play();

        assert!(!player.on_tick(Duration::from_millis(400)));
        assert!(player.speaker_mut().spoken.is_empty());

        assert!(!player.on_tick(Duration::from_millis(100)));
        assert_eq!(
            player.speaker_mut().spoken,
            vec![("りんご".to_string(), LanguageTag::Japanese)]
        );

        // Long silence from the speaker never advances on its own
        assert!(!player.on_tick(INTERVAL * 10));

        let completion = player.speaker_mut().held.pop().unwrap();
        completion.complete();
        assert!(player.on_tick(Duration::ZERO));
        assert_eq!(player.current().english, "book");
    }

    #[test]
    fn test_null_speaker_chains_through_deck() {
        let mut player =
            FlashcardPlayer::new(create_deck(), FlashcardMode::EnglishAudio, NullSpeaker).unwrap();
        player.play();

        assert!(player.on_tick(LEAD_IN));
        assert_eq!(player.index(), 1);
        assert!(player.on_tick(LEAD_IN));
        assert_eq!(player.index(), 2);
    }

    #[test]
    fn test_dropped_completion_still_advances() {
        let mut player = FlashcardPlayer::new(
            create_deck(),
            FlashcardMode::EnglishAudio,
            HoldingSpeaker::default(),
        )
        .unwrap();
        player.play();
        player.on_tick(LEAD_IN);

        player.speaker_mut().held.clear();
        assert!(player.on_tick(Duration::ZERO));
        assert_eq!(player.index(), 1);
        assert!(!player.on_tick(Duration::ZERO));
    }

    #[test]
    fn test_stale_completion_ignored() {
        let mut player = FlashcardPlayer::new(
            create_deck(),
            FlashcardMode::EnglishAudio,
            HoldingSpeaker::default(),
        )
        .unwrap();
        player.play();
        player.on_tick(LEAD_IN);
        let stale = player.speaker_mut().held.pop().unwrap();

        player.stop();
        assert_eq!(player.speaker_mut().cancels, 1);
        stale.complete();
        assert!(!player.on_tick(Duration::ZERO));
        assert_eq!(player.index(), 0);
    }

    #[test]
    fn test_manual_skip_drops_pending_speech() {
        let mut player = FlashcardPlayer::new(
            create_deck(),
            FlashcardMode::EnglishAudio,
            HoldingSpeaker::default(),
        )
        .unwrap();
        player.play();
        player.on_tick(LEAD_IN);
        let stale = player.speaker_mut().held.pop().unwrap();

        player.next();
        stale.complete();
        assert!(!player.on_tick(Duration::ZERO));
        assert_eq!(player.index(), 1);

        player.on_tick(LEAD_IN);
        assert_eq!(player.speaker_mut().spoken.last().unwrap().0, "book");
    }

    #[test]
    fn test_set_mode_restarts_timing() {
        let mut player = FlashcardPlayer::new(create_deck(), FlashcardMode::Silent, NullSpeaker)
            .unwrap()
            .with_timing(Duration::from_millis(1000), Duration::from_millis(200));
        player.play();
        player.on_tick(Duration::from_millis(900));

        player.set_mode(FlashcardMode::Silent);
        assert!(!player.on_tick(Duration::from_millis(900)));
        assert!(player.on_tick(Duration::from_millis(100)));
        assert_eq!(player.mode(), FlashcardMode::Silent);
    }
}
