use itertools::Itertools;
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::{ProgressStore, QuizHistoryEntry, WordStat};
use crate::util::{mean, percentage};

type Result<T> = std::result::Result<T, StoreError>;

/// Everything the stats screen shows, read in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub overall_accuracy: f64,
    pub words_practiced: usize,
    pub session_count: usize,
    pub average_score: Option<f64>,
    pub weakest_words: Vec<WordStat>,
    pub recent_sessions: Vec<QuizHistoryEntry>,
}

/// Read-only views derived from the progress store
pub struct StatsAggregator {
    store: Arc<dyn ProgressStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Correct attempts over all attempts across every word; 0 with no attempts
    pub fn overall_accuracy(&self) -> Result<f64> {
        Ok(overall_accuracy(&self.store.word_stats()?))
    }

    /// The `n` words with the lowest accuracy
    pub fn weakest_words(&self, n: usize) -> Result<Vec<WordStat>> {
        Ok(weakest_words(self.store.word_stats()?, n))
    }

    /// The `n` most recent sessions, newest first
    pub fn recent_sessions(&self, n: usize) -> Result<Vec<QuizHistoryEntry>> {
        let mut history = self.store.history()?;
        history.truncate(n);
        Ok(history)
    }

    pub fn session_count(&self) -> Result<usize> {
        Ok(self.store.history()?.len())
    }

    /// Mean score percentage of the `n` most recent sessions
    pub fn average_score(&self, n: usize) -> Result<Option<f64>> {
        Ok(average_score(&self.store.history()?, n))
    }

    pub fn summary(&self, weakest_n: usize, recent_n: usize) -> Result<StatsSummary> {
        let word_stats = self.store.word_stats()?;
        let history = self.store.history()?;

        Ok(StatsSummary {
            overall_accuracy: overall_accuracy(&word_stats),
            words_practiced: word_stats.len(),
            session_count: history.len(),
            average_score: average_score(&history, recent_n),
            weakest_words: weakest_words(word_stats, weakest_n),
            recent_sessions: history.into_iter().take(recent_n).collect(),
        })
    }
}

fn overall_accuracy(stats: &[WordStat]) -> f64 {
    let (correct, attempts) = stats.iter().fold((0u64, 0u64), |(c, a), stat| {
        (c + u64::from(stat.correct_count), a + u64::from(stat.attempts()))
    });
    percentage(correct, attempts)
}

/// Ascending accuracy, then fewer attempts, then word key
fn weakest_words(stats: Vec<WordStat>, n: usize) -> Vec<WordStat> {
    stats
        .into_iter()
        .sorted_by(|a, b| {
            a.accuracy()
                .total_cmp(&b.accuracy())
                .then_with(|| a.attempts().cmp(&b.attempts()))
                .then_with(|| a.word.cmp(&b.word))
        })
        .take(n)
        .collect()
}

fn average_score(history: &[QuizHistoryEntry], n: usize) -> Option<f64> {
    let percentages: Vec<f64> = history
        .iter()
        .take(n)
        .map(QuizHistoryEntry::percentage)
        .collect();
    mean(&percentages)
}
