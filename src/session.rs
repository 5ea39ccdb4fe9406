use crate::dictionary::Word;

/// Result of the most recent answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub word: Word,
    pub answer: String,
    pub correct: bool,
}

/// In-memory state of one quiz session. Discarded on finish or cancel.
#[derive(Debug, Clone)]
pub struct Session {
    pub dictionary_name: String,
    pub questions: Vec<Word>,
    pub position: usize,
    pub score: u32,
    pub input: String,
    pub feedback: Option<Feedback>,
    pub streak: u32,
    pub best_streak: u32,
}

impl Session {
    pub fn new(dictionary_name: impl Into<String>, questions: Vec<Word>) -> Self {
        Self {
            dictionary_name: dictionary_name.into(),
            questions,
            position: 0,
            score: 0,
            input: String::new(),
            feedback: None,
            streak: 0,
            best_streak: 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn current(&self) -> Option<&Word> {
        self.questions.get(self.position)
    }

    pub fn is_last_question(&self) -> bool {
        self.position + 1 >= self.questions.len()
    }

    pub fn record(&mut self, feedback: Feedback) {
        if feedback.correct {
            self.score += 1;
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
        } else {
            self.streak = 0;
        }
        self.feedback = Some(feedback);
    }

    pub fn advance(&mut self) {
        self.position += 1;
        self.input.clear();
        self.feedback = None;
    }
}

/// Case-insensitive exact match of an answer against the target spelling
pub fn answer_matches(answer: &str, target: &str) -> bool {
    answer.to_lowercase() == target.to_lowercase()
}
