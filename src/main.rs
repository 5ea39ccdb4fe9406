mod ui;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    fs::OpenOptions,
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use eigo::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    dictionary::{self, Dictionary, SearchMode},
    error::SessionError,
    flashcard::{FlashcardMode, FlashcardPlayer},
    quiz::{Progress, QuizEngine, QuizState},
    runtime::{AppEvent, CrosstermEventSource, EventSource, FixedTicker, Runner, Ticker},
    selection::QuestionPicker,
    speech::{LanguageTag, NullSpeaker, Speaker, SpeechCompletion},
    stats::StatsAggregator,
    store::{ProgressStore, SqliteStore},
};

use crate::ui::screen::{Flow, Screen};

/// vocabulary trainer with spelling quizzes, flashcards and progress tracking
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Learn English vocabulary from Japanese prompts. Every answer is recorded per word so the stats view can point out your weakest words."
)]
pub struct Cli {
    /// progress database file [default: ~/.local/state/eigo/progress.db]
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// type the English word for each Japanese prompt (default)
    Quiz(QuizArgs),
    /// auto-advancing flashcards
    Flashcards(FlashcardArgs),
    /// print a dictionary, optionally filtered
    Browse(BrowseArgs),
    /// print overall accuracy, weakest words and recent sessions
    Stats(StatsArgs),
    /// list the bundled dictionaries
    Dictionaries,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DictionaryArgs {
    /// bundled dictionary to use [default: from config]
    #[clap(short, long)]
    dictionary: Option<String>,

    /// JSON dictionary file to use instead of a bundled one
    #[clap(short, long, conflicts_with = "dictionary")]
    file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct QuizArgs {
    #[clap(flatten)]
    source: DictionaryArgs,

    /// number of questions [default: from config]
    #[clap(short = 'n', long)]
    size: Option<usize>,

    /// seed for the question order
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FlashcardArgs {
    #[clap(flatten)]
    source: DictionaryArgs,

    /// how cards advance
    #[clap(short, long, value_enum, default_value_t = ModeArg::Silent)]
    mode: ModeArg,

    /// seed for the card order
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BrowseArgs {
    #[clap(flatten)]
    source: DictionaryArgs,

    /// only show words containing this text
    #[clap(short, long)]
    search: Option<String>,

    /// match the search against the Japanese side
    #[clap(short, long)]
    japanese: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatsArgs {
    /// number of weakest words to list [default: from config]
    #[clap(short, long)]
    weakest: Option<usize>,

    /// number of recent sessions to list [default: from config]
    #[clap(short, long)]
    recent: Option<usize>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum ModeArg {
    #[default]
    Silent,
    English,
    Japanese,
}

impl From<ModeArg> for FlashcardMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Silent => FlashcardMode::Silent,
            ModeArg::English => FlashcardMode::EnglishAudio,
            ModeArg::Japanese => FlashcardMode::JapaneseAudio,
        }
    }
}

/// Quiz screen state: the engine plus what is needed to start another round.
///
/// Each new question is read out in English through `speaker`.
pub struct QuizApp<S: Speaker = NullSpeaker> {
    pub engine: QuizEngine,
    pub dictionary: Dictionary,
    pub session_size: usize,
    pub speaker: S,
    /// Results that failed to persist this run
    pub unsaved: usize,
}

impl QuizApp {
    pub fn new(engine: QuizEngine, dictionary: Dictionary, session_size: usize) -> Self {
        Self::with_speaker(engine, dictionary, session_size, NullSpeaker)
    }
}

impl<S: Speaker> QuizApp<S> {
    pub fn with_speaker(
        engine: QuizEngine,
        dictionary: Dictionary,
        session_size: usize,
        speaker: S,
    ) -> Self {
        Self {
            engine,
            dictionary,
            session_size,
            speaker,
            unsaved: 0,
        }
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        self.engine.start(
            &self.dictionary.name,
            &self.dictionary.words,
            self.session_size,
        )?;
        self.speak_current();
        Ok(())
    }

    /// Read the current question's word aloud. Nothing waits on the result.
    pub fn speak_current(&mut self) {
        let Some(word) = self.engine.session().and_then(|s| s.current()) else {
            return;
        };
        self.speaker.cancel();
        self.speaker
            .speak(&word.english, LanguageTag::English, SpeechCompletion::detached());
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if is_quit_key(key) {
            if matches!(
                self.engine.state(),
                QuizState::AwaitingAnswer | QuizState::ShowingFeedback
            ) {
                // Quitting mid-session discards it without history
                if let Err(e) = self.engine.cancel() {
                    debug!(error = %e, "cancel on quit failed");
                }
            }
            self.speaker.cancel();
            return Flow::Quit;
        }

        let outcome = match self.engine.state() {
            QuizState::AwaitingAnswer => match key.code {
                KeyCode::Enter => {
                    let has_input = self
                        .engine
                        .session()
                        .is_some_and(|s| !s.input.trim().is_empty());
                    if has_input {
                        self.engine.submit().map(|_| ())
                    } else {
                        Ok(())
                    }
                }
                KeyCode::Backspace => self.engine.backspace(),
                KeyCode::Tab => {
                    self.speak_current();
                    Ok(())
                }
                KeyCode::Char(c) => self.engine.push_char(c),
                _ => Ok(()),
            },
            QuizState::Finished => match key.code {
                KeyCode::Char('r') | KeyCode::Enter => self.start(),
                KeyCode::Char('q') => return Flow::Quit,
                _ => Ok(()),
            },
            QuizState::ShowingFeedback | QuizState::Idle => Ok(()),
        };
        if let Err(e) = outcome {
            debug!(error = %e, "key ignored");
        }

        self.collect_write_errors();
        Flow::Continue
    }

    pub fn on_tick(&mut self, elapsed: Duration) -> bool {
        let progress = self.engine.on_tick(elapsed);
        if let Some(Progress::NextQuestion) = progress {
            self.speak_current();
        }
        self.collect_write_errors();
        progress.is_some()
    }

    fn collect_write_errors(&mut self) {
        self.unsaved += self.engine.take_write_errors().len();
    }
}

/// Flashcard screen state
pub struct FlashcardApp {
    pub player: FlashcardPlayer<NullSpeaker>,
    pub dictionary_name: String,
}

impl FlashcardApp {
    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if is_quit_key(key) || key.code == KeyCode::Char('q') {
            self.player.stop();
            return Flow::Quit;
        }

        match key.code {
            KeyCode::Char(' ') => {
                if self.player.is_playing() {
                    self.player.stop();
                } else {
                    self.player.play();
                }
            }
            KeyCode::Right | KeyCode::Char('l') => self.player.next(),
            KeyCode::Left | KeyCode::Char('h') => self.player.previous(),
            KeyCode::Char('m') => self.player.set_mode(next_mode(self.player.mode())),
            _ => {}
        }
        Flow::Continue
    }

    pub fn on_tick(&mut self, elapsed: Duration) -> bool {
        self.player.on_tick(elapsed)
    }
}

fn next_mode(mode: FlashcardMode) -> FlashcardMode {
    match mode {
        FlashcardMode::Silent => FlashcardMode::EnglishAudio,
        FlashcardMode::EnglishAudio => FlashcardMode::JapaneseAudio,
        FlashcardMode::JapaneseAudio => FlashcardMode::Silent,
    }
}

fn is_quit_key(key: KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FileConfigStore::new().load();

    let db_path = cli
        .db
        .clone()
        .or_else(AppDirs::db_path)
        .unwrap_or_else(|| PathBuf::from("eigo_progress.db"));

    if let Err(e) = init_logging(&AppDirs::log_path_for(&db_path)) {
        eprintln!("eigo: logging disabled: {e:#}");
    }

    let mut stdout = io::stdout();
    match cli.command.unwrap_or(Command::Quiz(QuizArgs::default())) {
        Command::Quiz(args) => {
            require_tty();
            run_quiz(&args, &config, &db_path)
        }
        Command::Flashcards(args) => {
            require_tty();
            run_flashcards(&args, &config)
        }
        Command::Browse(args) => print_browse(&args, &config, &mut stdout),
        Command::Stats(args) => print_stats(&args, &config, &db_path, &mut stdout),
        Command::Dictionaries => print_dictionaries(&mut stdout),
    }
}

fn require_tty() {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }
}

/// Log to a file; the terminal belongs to the TUI
fn init_logging(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env("EIGO_LOG").unwrap_or_else(|_| EnvFilter::new("eigo=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

fn load_dictionary(args: &DictionaryArgs, config: &Config) -> Result<Dictionary> {
    match &args.file {
        Some(path) => dictionary::load_file(path)
            .with_context(|| format!("loading dictionary from {}", path.display())),
        None => {
            let name = args.dictionary.as_deref().unwrap_or(&config.dictionary);
            dictionary::builtin_named(name).with_context(|| format!("loading dictionary {name}"))
        }
    }
}

/// Open the progress store for a quiz. An unusable store is kept anyway so
/// the quiz still runs, just without saving.
fn open_quiz_store(db_path: &Path) -> Arc<dyn ProgressStore> {
    let store = SqliteStore::new(db_path);
    if let Err(e) = store.initialize() {
        warn!(error = %e, "progress will not be saved this session");
    }
    Arc::new(store)
}

fn run_quiz(args: &QuizArgs, config: &Config, db_path: &Path) -> Result<()> {
    let dictionary = load_dictionary(&args.source, config)?;
    let picker = args
        .seed
        .map(QuestionPicker::seeded)
        .unwrap_or_default();
    let engine = QuizEngine::new(open_quiz_store(db_path))
        .with_picker(picker)
        .with_dwell(config.dwell());

    let mut app = QuizApp::new(
        engine,
        dictionary,
        args.size.unwrap_or(config.session_size),
    );
    app.start().context("starting quiz")?;

    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    with_terminal(|terminal| run_screen(terminal, &mut app, &runner))?;

    if app.unsaved > 0 {
        eprintln!("eigo: {} result(s) could not be saved", app.unsaved);
    }
    Ok(())
}

/// Shuffled deck from `dictionary`, not yet playing
fn create_flashcard_app(
    dictionary: Dictionary,
    mode: FlashcardMode,
    picker: &mut QuestionPicker,
    config: &Config,
) -> Result<FlashcardApp> {
    let deck = picker.deck(&dictionary.words);
    let player = FlashcardPlayer::new(deck, mode, NullSpeaker)?
        .with_timing(config.flashcard_interval(), config.flashcard_lead_in());

    Ok(FlashcardApp {
        player,
        dictionary_name: dictionary.name,
    })
}

fn run_flashcards(args: &FlashcardArgs, config: &Config) -> Result<()> {
    let dictionary = load_dictionary(&args.source, config)?;
    let mut picker = args.seed.map(QuestionPicker::seeded).unwrap_or_default();
    let mut app = create_flashcard_app(dictionary, args.mode.into(), &mut picker, config)?;
    app.player.play();

    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    with_terminal(|terminal| run_screen(terminal, &mut app, &runner))
}

fn with_terminal<F>(run: F) -> Result<()>
where
    F: FnOnce(&mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()>,
{
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// Feed events to `screen` until it asks to quit, redrawing on change
fn run_screen<B, S, E, T>(
    terminal: &mut Terminal<B>,
    screen: &mut S,
    runner: &Runner<E, T>,
) -> Result<()>
where
    B: Backend,
    S: Screen,
    E: EventSource,
    T: Ticker,
{
    terminal.draw(|f| screen.render(f))?;

    loop {
        let redraw = match runner.step() {
            AppEvent::Tick => screen.on_tick(runner.tick_interval()),
            AppEvent::Resize => true,
            AppEvent::Key(key) => match screen.on_key(key) {
                Flow::Quit => break,
                Flow::Continue => true,
            },
        };

        if redraw {
            terminal.draw(|f| screen.render(f))?;
        }
    }

    info!("screen closed");
    Ok(())
}

fn print_browse(args: &BrowseArgs, config: &Config, out: &mut impl Write) -> Result<()> {
    let dictionary = load_dictionary(&args.source, config)?;
    let mode = if args.japanese {
        SearchMode::Japanese
    } else {
        SearchMode::English
    };
    let words = dictionary.search(args.search.as_deref().unwrap_or(""), mode);

    for word in &words {
        writeln!(out, "{:<16} {}", word.english, word.japanese)?;
    }
    writeln!(out, "{} of {} words in {}", words.len(), dictionary.words.len(), dictionary.name)?;
    Ok(())
}

fn print_stats(args: &StatsArgs, config: &Config, db_path: &Path, out: &mut impl Write) -> Result<()> {
    let store = SqliteStore::open(db_path)
        .with_context(|| format!("opening progress database {}", db_path.display()))?;
    let aggregator = StatsAggregator::new(Arc::new(store));

    let weakest_n = args.weakest.unwrap_or(config.weakest_words_limit);
    let recent_n = args.recent.unwrap_or(config.recent_sessions_limit);
    let summary = aggregator.summary(weakest_n, recent_n)?;

    writeln!(
        out,
        "Overall accuracy: {:.1}% across {} words",
        summary.overall_accuracy, summary.words_practiced
    )?;
    match summary.average_score {
        Some(average) => writeln!(
            out,
            "Sessions played: {} (average {:.1}% over the last {})",
            summary.session_count,
            average,
            summary.recent_sessions.len()
        )?,
        None => writeln!(out, "Sessions played: 0")?,
    }

    writeln!(out)?;
    writeln!(out, "Weakest words:")?;
    if summary.weakest_words.is_empty() {
        writeln!(out, "  no attempts yet")?;
    }
    for stat in &summary.weakest_words {
        writeln!(
            out,
            "  {:<16} {:>3}/{:<3} {:>5.1}%",
            stat.word,
            stat.correct_count,
            stat.attempts(),
            stat.accuracy()
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Recent sessions:")?;
    if summary.recent_sessions.is_empty() {
        writeln!(out, "  no sessions yet")?;
    }
    for entry in &summary.recent_sessions {
        writeln!(
            out,
            "  {}  {:<10} {}/{} ({:.0}%)  best streak {}",
            entry
                .completed_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
            entry.dictionary_name,
            entry.score,
            entry.total,
            entry.percentage(),
            entry.best_streak
        )?;
    }
    Ok(())
}

fn print_dictionaries(out: &mut impl Write) -> Result<()> {
    for dictionary in dictionary::builtin()? {
        writeln!(out, "{} ({} words)", dictionary.name, dictionary.words.len())?;
    }
    Ok(())
}
