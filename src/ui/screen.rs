use crossterm::event::KeyEvent;
use ratatui::Frame;
use std::time::Duration;

use eigo::speech::Speaker;

use crate::{FlashcardApp, QuizApp};

/// What the event loop should do after a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A UI Screen boundary: responsible for rendering and input handling
pub trait Screen {
    fn render(&self, f: &mut Frame);

    fn on_key(&mut self, key: KeyEvent) -> Flow;

    /// Advance timers. Returns true if the screen needs a redraw.
    fn on_tick(&mut self, _elapsed: Duration) -> bool {
        false
    }
}

impl<S: Speaker> Screen for QuizApp<S> {
    fn render(&self, f: &mut Frame) {
        f.render_widget(self, f.area());
    }

    fn on_key(&mut self, key: KeyEvent) -> Flow {
        self.handle_key(key)
    }

    fn on_tick(&mut self, elapsed: Duration) -> bool {
        QuizApp::<S>::on_tick(self, elapsed)
    }
}

impl Screen for FlashcardApp {
    fn render(&self, f: &mut Frame) {
        f.render_widget(self, f.area());
    }

    fn on_key(&mut self, key: KeyEvent) -> Flow {
        self.handle_key(key)
    }

    fn on_tick(&mut self, elapsed: Duration) -> bool {
        FlashcardApp::on_tick(self, elapsed)
    }
}
