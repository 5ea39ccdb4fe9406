use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

use crate::dictionary::Word;
use crate::store::normalize_word_key;

/// Picks the questions for a quiz session
#[derive(Debug)]
pub struct QuestionPicker {
    rng: StdRng,
}

impl QuestionPicker {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic picker for reproducible sessions
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Shuffle the distinct words of `pool` and keep the first `count`.
    ///
    /// Words whose English spelling normalizes to the same key count once; the
    /// first occurrence wins.
    pub fn pick(&mut self, pool: &[Word], count: usize) -> Vec<Word> {
        let mut candidates = distinct_words(pool);
        candidates.shuffle(&mut self.rng);
        candidates.truncate(count);
        candidates
    }

    /// Every distinct word of `pool` in a fresh random order, for a flashcard deck
    pub fn deck(&mut self, pool: &[Word]) -> Vec<Word> {
        let mut deck = distinct_words(pool);
        deck.shuffle(&mut self.rng);
        deck
    }
}

impl Default for QuestionPicker {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// `pool` with later duplicates (by normalized key) and blank words removed
pub fn distinct_words(pool: &[Word]) -> Vec<Word> {
    let mut seen = HashSet::new();
    pool.iter()
        .filter(|word| {
            let key = normalize_word_key(&word.english);
            !key.is_empty() && seen.insert(key)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_pool(n: usize) -> Vec<Word> {
        (0..n)
            .map(|i| Word::new(format!("word{i}"), format!("単語{i}")))
            .collect()
    }

    #[test]
    fn test_pick_takes_requested_count() {
        let pool = create_pool(20);
        let mut picker = QuestionPicker::seeded(7);

        let picked = picker.pick(&pool, 10);
        assert_eq!(picked.len(), 10);
        assert!(picked.iter().all(|w| pool.contains(w)));
    }

    #[test]
    fn test_pick_small_pool_returns_whole_pool() {
        let pool = create_pool(3);
        let mut picker = QuestionPicker::seeded(1);

        let mut picked = picker.pick(&pool, 10);
        assert_eq!(picked.len(), 3);

        picked.sort_by(|a, b| a.english.cmp(&b.english));
        assert_eq!(picked, pool);
    }

    #[test]
    fn test_pick_has_no_duplicates() {
        let pool = create_pool(50);
        let mut picker = QuestionPicker::from_entropy();

        for _ in 0..20 {
            let picked = picker.pick(&pool, 25);
            let keys: HashSet<_> = picked.iter().map(|w| w.english.clone()).collect();
            assert_eq!(keys.len(), picked.len());
        }
    }

    #[test]
    fn test_same_seed_same_order() {
        let pool = create_pool(30);

        let first = QuestionPicker::seeded(42).pick(&pool, 10);
        let second = QuestionPicker::seeded(42).pick(&pool, 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_word_can_come_first() {
        let pool = create_pool(4);
        let mut picker = QuestionPicker::seeded(3);

        let firsts: HashSet<String> = (0..200)
            .map(|_| picker.pick(&pool, 1)[0].english.clone())
            .collect();
        assert_eq!(firsts.len(), 4);
    }

    #[test]
    fn test_deck_reorders_whole_pool() {
        let pool = create_pool(20);

        let deck = QuestionPicker::seeded(5).deck(&pool);
        assert_eq!(deck.len(), pool.len());
        assert_ne!(deck, pool);
        assert_eq!(deck, QuestionPicker::seeded(5).deck(&pool));

        let mut sorted = deck.clone();
        sorted.sort_by_key(|w| w.english.trim_start_matches("word").parse::<usize>().unwrap());
        assert_eq!(sorted, pool);
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let pool = vec![
            Word::new("Apple", "りんご"),
            Word::new(" apple ", "リンゴ"),
            Word::new("cat", "猫"),
            Word::new("   ", "空"),
        ];

        let distinct = distinct_words(&pool);
        assert_eq!(
            distinct,
            vec![Word::new("Apple", "りんご"), Word::new("cat", "猫")]
        );

        let picked = QuestionPicker::seeded(9).pick(&pool, 10);
        assert_eq!(picked.len(), 2);
    }
}
