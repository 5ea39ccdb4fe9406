use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dictionary::Word;
use crate::error::{SessionError, StoreError};
use crate::selection::QuestionPicker;
use crate::session::{answer_matches, Feedback, Session};
use crate::store::{NewHistoryEntry, ProgressStore, QuizHistoryEntry};

pub const DEFAULT_DWELL_MS: u64 = 1500;
pub const DEFAULT_SESSION_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum QuizState {
    Idle,
    AwaitingAnswer,
    ShowingFeedback,
    Finished,
}

/// Outcome of a completed session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub dictionary_name: String,
    pub score: u32,
    pub total: u32,
    pub best_streak: u32,
    /// The stored history entry, or `None` when it could not be persisted
    pub history: Option<QuizHistoryEntry>,
}

/// What an expired dwell did
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    NextQuestion,
    Finished(SessionSummary),
}

/// Drives one spelling quiz at a time:
/// `Idle -> AwaitingAnswer <-> ShowingFeedback -> Finished`.
///
/// The feedback dwell is a countdown owned by the engine and advanced by
/// `on_tick`, so cancelling or restarting drops it with the session.
pub struct QuizEngine {
    store: Arc<dyn ProgressStore>,
    picker: QuestionPicker,
    dwell: Duration,
    state: QuizState,
    session: Option<Session>,
    dwell_remaining: Option<Duration>,
    summary: Option<SessionSummary>,
    write_errors: Vec<StoreError>,
}

impl QuizEngine {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            picker: QuestionPicker::from_entropy(),
            dwell: Duration::from_millis(DEFAULT_DWELL_MS),
            state: QuizState::Idle,
            session: None,
            dwell_remaining: None,
            summary: None,
            write_errors: Vec::new(),
        }
    }

    pub fn with_picker(mut self, picker: QuestionPicker) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    /// The running session, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Summary of the last finished session, while in `Finished`
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn dwell_remaining(&self) -> Option<Duration> {
        self.dwell_remaining
    }

    /// Begin a new session over `pool`, replacing whatever was running.
    pub fn start(
        &mut self,
        dictionary_name: &str,
        pool: &[Word],
        session_size: usize,
    ) -> Result<(), SessionError> {
        if session_size == 0 {
            return Err(SessionError::ZeroSessionSize);
        }

        let questions = self.picker.pick(pool, session_size);
        if questions.is_empty() {
            return Err(SessionError::EmptyPool);
        }

        if self.session.is_some() {
            debug!(state = %self.state, "start replaces running session");
        }

        info!(
            dictionary = dictionary_name,
            questions = questions.len(),
            "quiz started"
        );
        self.session = Some(Session::new(dictionary_name, questions));
        self.dwell_remaining = None;
        self.summary = None;
        self.state = QuizState::AwaitingAnswer;
        Ok(())
    }

    /// Evaluate `raw_input` against the current question and show feedback
    pub fn submit_answer(&mut self, raw_input: &str) -> Result<Feedback, SessionError> {
        let session = match (self.state, self.session.as_mut()) {
            (QuizState::AwaitingAnswer, Some(session)) => session,
            (state, _) => {
                return Err(SessionError::InvalidStateTransition {
                    operation: "submit_answer",
                    state,
                })
            }
        };

        let word = match session.current() {
            Some(word) => word.clone(),
            None => {
                return Err(SessionError::InvalidStateTransition {
                    operation: "submit_answer",
                    state: self.state,
                })
            }
        };
        let correct = answer_matches(raw_input, &word.english);

        if let Err(e) = self.store.record_attempt(&word.english, correct) {
            warn!(word = %word.english, error = %e, "failed to record attempt");
            self.write_errors.push(e);
        }

        let feedback = Feedback {
            word,
            answer: raw_input.to_string(),
            correct,
        };
        session.input = raw_input.to_string();
        session.record(feedback.clone());
        debug!(
            word = %feedback.word.english,
            correct,
            position = session.position,
            "answer submitted"
        );

        self.dwell_remaining = Some(self.dwell);
        self.state = QuizState::ShowingFeedback;
        Ok(feedback)
    }

    pub fn push_char(&mut self, c: char) -> Result<(), SessionError> {
        self.awaiting_session("push_char")?.input.push(c);
        Ok(())
    }

    pub fn backspace(&mut self) -> Result<(), SessionError> {
        self.awaiting_session("backspace")?.input.pop();
        Ok(())
    }

    /// Submit the typed input buffer
    pub fn submit(&mut self) -> Result<Feedback, SessionError> {
        let input = self.awaiting_session("submit")?.input.clone();
        self.submit_answer(&input)
    }

    /// Count down the feedback dwell; on expiry move to the next question or
    /// finish the session.
    pub fn on_tick(&mut self, elapsed: Duration) -> Option<Progress> {
        if self.state != QuizState::ShowingFeedback {
            return None;
        }

        let remaining = self.dwell_remaining?.saturating_sub(elapsed);
        if !remaining.is_zero() {
            self.dwell_remaining = Some(remaining);
            return None;
        }
        self.dwell_remaining = None;

        let session = self.session.as_mut()?;
        if session.is_last_question() {
            return Some(Progress::Finished(self.finish()));
        }

        session.advance();
        self.state = QuizState::AwaitingAnswer;
        Some(Progress::NextQuestion)
    }

    /// Abandon the running session without writing history
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        match self.state {
            QuizState::Idle => Ok(()),
            QuizState::Finished => Err(SessionError::InvalidStateTransition {
                operation: "cancel",
                state: self.state,
            }),
            QuizState::AwaitingAnswer | QuizState::ShowingFeedback => {
                if let Some(session) = self.session.take() {
                    info!(
                        dictionary = %session.dictionary_name,
                        answered = session.position,
                        "quiz cancelled"
                    );
                }
                self.dwell_remaining = None;
                self.state = QuizState::Idle;
                Ok(())
            }
        }
    }

    /// Return to `Idle` from any state, discarding session and summary
    pub fn reset(&mut self) {
        self.session = None;
        self.summary = None;
        self.dwell_remaining = None;
        self.state = QuizState::Idle;
    }

    /// Persistence failures swallowed since the last call
    pub fn take_write_errors(&mut self) -> Vec<StoreError> {
        std::mem::take(&mut self.write_errors)
    }

    fn awaiting_session(&mut self, operation: &'static str) -> Result<&mut Session, SessionError> {
        match (self.state, self.session.as_mut()) {
            (QuizState::AwaitingAnswer, Some(session)) => Ok(session),
            (state, _) => Err(SessionError::InvalidStateTransition { operation, state }),
        }
    }

    fn finish(&mut self) -> SessionSummary {
        let session = self.session.take();
        let (dictionary_name, score, total, best_streak) = session
            .map(|s| (s.dictionary_name.clone(), s.score, s.total(), s.best_streak))
            .unwrap_or_default();

        let entry = NewHistoryEntry {
            completed_at: Utc::now(),
            dictionary_name: dictionary_name.clone(),
            score,
            total,
            best_streak,
        };
        let history = match self.store.append_history(entry) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(dictionary = %dictionary_name, error = %e, "failed to save quiz history");
                self.write_errors.push(e);
                None
            }
        };

        info!(dictionary = %dictionary_name, score, total, "quiz finished");
        let summary = SessionSummary {
            dictionary_name,
            score,
            total,
            best_streak,
            history,
        };
        self.summary = Some(summary.clone());
        self.state = QuizState::Finished;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteStore, WordStat};
    use assert_matches::assert_matches;
    use std::path::PathBuf;

    const DWELL: Duration = Duration::from_millis(DEFAULT_DWELL_MS);

    fn pool(words: &[&str]) -> Vec<Word> {
        words
            .iter()
            .map(|w| Word::new(*w, format!("{w}-ja")))
            .collect()
    }

    fn setup() -> (Arc<SqliteStore>, QuizEngine) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = QuizEngine::new(store.clone()).with_picker(QuestionPicker::seeded(11));
        (store, engine)
    }

    fn current_word(engine: &QuizEngine) -> String {
        engine.session().unwrap().current().unwrap().english.clone()
    }

    fn answer_current(engine: &mut QuizEngine, correct: bool) -> Option<Progress> {
        let word = current_word(engine);
        let answer = if correct { word } else { "wrong".to_string() };
        engine.submit_answer(&answer).unwrap();
        engine.on_tick(DWELL)
    }

    struct FailingStore;

    impl FailingStore {
        fn error() -> StoreError {
            StoreError::StorageUnavailable {
                path: PathBuf::from("/nowhere"),
                reason: "test".to_string(),
            }
        }
    }

    impl ProgressStore for FailingStore {
        fn initialize(&self) -> Result<(), StoreError> {
            Err(Self::error())
        }

        fn record_attempt(&self, _word: &str, _was_correct: bool) -> Result<WordStat, StoreError> {
            Err(Self::error())
        }

        fn word_stats(&self) -> Result<Vec<WordStat>, StoreError> {
            Err(Self::error())
        }

        fn append_history(&self, _entry: NewHistoryEntry) -> Result<QuizHistoryEntry, StoreError> {
            Err(Self::error())
        }

        fn history(&self) -> Result<Vec<QuizHistoryEntry>, StoreError> {
            Err(Self::error())
        }
    }

    #[test]
    fn test_new_engine_is_idle() {
        let (_store, engine) = setup();
        assert_eq!(engine.state(), QuizState::Idle);
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_small_pool_uses_every_word_once() {
        let (_store, mut engine) = setup();
        engine.start("Level 1", &pool(&["a", "b", "c"]), 10).unwrap();

        let session = engine.session().unwrap();
        assert_eq!(session.total(), 3);
        let mut words: Vec<_> = session.questions.iter().map(|w| w.english.clone()).collect();
        words.sort();
        assert_eq!(words, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_start_rejects_empty_pool_and_zero_size() {
        let (_store, mut engine) = setup();

        assert_eq!(engine.start("x", &[], 10), Err(SessionError::EmptyPool));
        assert_eq!(engine.state(), QuizState::Idle);

        assert_eq!(
            engine.start("x", &pool(&["a"]), 0),
            Err(SessionError::ZeroSessionSize)
        );
        assert_eq!(engine.state(), QuizState::Idle);
    }

    #[test]
    fn test_empty_pool_keeps_running_session() {
        let (_store, mut engine) = setup();
        engine.start("x", &pool(&["a", "b"]), 10).unwrap();

        assert_eq!(engine.start("y", &[], 10), Err(SessionError::EmptyPool));
        assert_eq!(engine.state(), QuizState::AwaitingAnswer);
        assert_eq!(engine.session().unwrap().dictionary_name, "x");
    }

    #[test]
    fn test_correct_answer_is_case_insensitive() {
        let (store, mut engine) = setup();
        engine.start("x", &pool(&["apple"]), 1).unwrap();

        let feedback = engine.submit_answer("APPLE").unwrap();
        assert!(feedback.correct);
        assert_eq!(engine.state(), QuizState::ShowingFeedback);
        assert_eq!(engine.session().unwrap().score, 1);

        let stats = store.word_stats().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].correct_count, 1);
    }

    #[test]
    fn test_dwell_counts_down_before_advancing() {
        let (_store, mut engine) = setup();
        engine.start("x", &pool(&["a", "b"]), 2).unwrap();
        engine.submit_answer("nope").unwrap();

        assert_eq!(engine.on_tick(Duration::from_millis(1000)), None);
        assert_eq!(engine.state(), QuizState::ShowingFeedback);
        assert_eq!(engine.dwell_remaining(), Some(Duration::from_millis(500)));

        assert_eq!(
            engine.on_tick(Duration::from_millis(500)),
            Some(Progress::NextQuestion)
        );
        assert_eq!(engine.state(), QuizState::AwaitingAnswer);
        assert_eq!(engine.session().unwrap().position, 1);
        assert!(engine.session().unwrap().input.is_empty());
    }

    #[test]
    fn test_tick_without_dwell_does_nothing() {
        let (_store, mut engine) = setup();
        assert_eq!(engine.on_tick(DWELL), None);

        engine.start("x", &pool(&["a"]), 1).unwrap();
        assert_eq!(engine.on_tick(DWELL), None);
        assert_eq!(engine.state(), QuizState::AwaitingAnswer);
    }

    #[test]
    fn test_full_session_writes_history() {
        let (store, mut engine) = setup();
        engine
            .start("Level 1", &pool(&["a", "b", "c", "d", "e"]), 5)
            .unwrap();

        let answers = [true, true, false, true, true];
        let mut last = None;
        for correct in answers {
            last = answer_current(&mut engine, correct);
        }

        let summary = match last {
            Some(Progress::Finished(summary)) => summary,
            other => panic!("expected finish, got {other:?}"),
        };
        assert_eq!(summary.score, 4);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.best_streak, 2);
        assert_eq!(engine.state(), QuizState::Finished);
        assert!(engine.session().is_none());

        let history = store.history().unwrap();
        assert_eq!(history[0].score, 4);
        assert_eq!(history[0].total, 5);
        assert_eq!(history[0].dictionary_name, "Level 1");
        assert_eq!(summary.history.as_ref(), Some(&history[0]));
    }

    #[test]
    fn test_submit_after_finish_is_rejected() {
        let (store, mut engine) = setup();
        engine.start("x", &pool(&["a"]), 1).unwrap();
        answer_current(&mut engine, true);
        assert_eq!(engine.state(), QuizState::Finished);

        let before = store.word_stats().unwrap();
        assert_eq!(
            engine.submit_answer("a"),
            Err(SessionError::InvalidStateTransition {
                operation: "submit_answer",
                state: QuizState::Finished,
            })
        );
        assert_eq!(store.word_stats().unwrap(), before);
    }

    #[test]
    fn test_double_submit_is_rejected() {
        let (store, mut engine) = setup();
        engine.start("x", &pool(&["a", "b"]), 2).unwrap();
        let word = current_word(&engine);

        engine.submit_answer(&word).unwrap();
        assert_matches!(
            engine.submit_answer(&word),
            Err(SessionError::InvalidStateTransition {
                state: QuizState::ShowingFeedback,
                ..
            })
        );

        let stats = store.word_stats().unwrap();
        assert_eq!(stats.iter().map(|s| s.attempts()).sum::<u32>(), 1);
    }

    #[test]
    fn test_cancel_discards_session_but_keeps_attempts() {
        let (store, mut engine) = setup();
        engine.start("x", &pool(&["a", "b", "c"]), 3).unwrap();
        answer_current(&mut engine, true);
        engine.submit_answer("wrong").unwrap();

        engine.cancel().unwrap();
        assert_eq!(engine.state(), QuizState::Idle);
        assert!(engine.session().is_none());
        assert_eq!(engine.on_tick(DWELL), None);

        assert!(store.history().unwrap().is_empty());
        assert_eq!(store.word_stats().unwrap().len(), 2);
    }

    #[test]
    fn test_cancel_rules() {
        let (_store, mut engine) = setup();
        assert_eq!(engine.cancel(), Ok(()));

        engine.start("x", &pool(&["a"]), 1).unwrap();
        answer_current(&mut engine, false);
        assert_matches!(
            engine.cancel(),
            Err(SessionError::InvalidStateTransition {
                operation: "cancel",
                state: QuizState::Finished,
            })
        );
        assert!(engine.summary().is_some());

        engine.reset();
        assert_eq!(engine.state(), QuizState::Idle);
        assert!(engine.summary().is_none());
    }

    #[test]
    fn test_restart_drops_pending_dwell() {
        let (store, mut engine) = setup();
        engine.start("first", &pool(&["a"]), 1).unwrap();
        engine.submit_answer("a").unwrap();

        engine.start("second", &pool(&["b", "c"]), 2).unwrap();
        assert_eq!(engine.dwell_remaining(), None);
        assert_eq!(engine.on_tick(DWELL), None);
        assert_eq!(engine.state(), QuizState::AwaitingAnswer);
        assert_eq!(engine.session().unwrap().position, 0);
        assert!(store.history().unwrap().is_empty());
    }

    #[test]
    fn test_input_buffer_editing() {
        let (_store, mut engine) = setup();
        engine.start("x", &pool(&["cat"]), 1).unwrap();

        for c in "caty".chars() {
            engine.push_char(c).unwrap();
        }
        engine.backspace().unwrap();
        assert_eq!(engine.session().unwrap().input, "cat");

        let feedback = engine.submit().unwrap();
        assert!(feedback.correct);
        assert_eq!(feedback.answer, "cat");
        assert_matches!(
            engine.push_char('x'),
            Err(SessionError::InvalidStateTransition {
                operation: "push_char",
                ..
            })
        );
    }

    #[test]
    fn test_write_failures_do_not_block_progress() {
        let mut engine = QuizEngine::new(Arc::new(FailingStore)).with_dwell(Duration::ZERO);
        engine.start("x", &pool(&["a", "b"]), 2).unwrap();

        assert_eq!(answer_current(&mut engine, true), Some(Progress::NextQuestion));
        let summary = match answer_current(&mut engine, true) {
            Some(Progress::Finished(summary)) => summary,
            other => panic!("expected finish, got {other:?}"),
        };

        assert_eq!(summary.score, 2);
        assert!(summary.history.is_none());
        assert_eq!(engine.take_write_errors().len(), 3);
        assert!(engine.take_write_errors().is_empty());
    }

    #[test]
    fn test_seeded_engines_ask_same_order() {
        let words = pool(&["a", "b", "c", "d", "e", "f", "g"]);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());

        let mut first = QuizEngine::new(store.clone()).with_picker(QuestionPicker::seeded(5));
        let mut second = QuizEngine::new(store).with_picker(QuestionPicker::seeded(5));
        first.start("x", &words, 4).unwrap();
        second.start("x", &words, 4).unwrap();

        assert_eq!(
            first.session().unwrap().questions,
            second.session().unwrap().questions
        );
    }
}
