// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod flashcard;
pub mod quiz;
pub mod runtime;
pub mod selection;
pub mod session;
pub mod speech;
pub mod stats;
pub mod store;
pub mod util;

pub use error::{DictionaryError, FlashcardError, SessionError, StoreError};
pub use quiz::{Progress, QuizEngine, QuizState, SessionSummary};
pub use stats::StatsAggregator;
pub use store::{ProgressStore, SqliteStore};
