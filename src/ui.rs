pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use eigo::quiz::QuizState;
use eigo::speech::Speaker;

use crate::{FlashcardApp, QuizApp};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn help_style() -> Style {
    Style::default()
        .add_modifier(Modifier::ITALIC)
        .add_modifier(Modifier::DIM)
}

fn screen_chunks(area: Rect, body_lines: u16) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(body_lines),
            Constraint::Length(1),
        ])
        .split(area)
}

impl<S: Speaker> Widget for &QuizApp<S> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.engine.state() {
            QuizState::Finished => render_results(self, area, buf),
            QuizState::Idle => Paragraph::new("No quiz running")
                .alignment(Alignment::Center)
                .render(area, buf),
            QuizState::AwaitingAnswer | QuizState::ShowingFeedback => {
                render_question(self, area, buf)
            }
        }
    }
}

fn render_question<S: Speaker>(app: &QuizApp<S>, area: Rect, buf: &mut Buffer) {
    let Some(session) = app.engine.session() else {
        return;
    };
    let Some(word) = session.current() else {
        return;
    };

    let chunks = screen_chunks(area, 7);

    let mut header = vec![Span::styled(
        format!(
            "{}  question {}/{}  score {}  streak {}",
            session.dictionary_name,
            session.position + 1,
            session.total(),
            session.score,
            session.streak
        ),
        Style::default().fg(Color::Cyan),
    )];
    if app.unsaved > 0 {
        header.push(Span::styled(
            format!("  {} result(s) not saved", app.unsaved),
            Style::default().fg(Color::Yellow),
        ));
    }
    Paragraph::new(Line::from(header)).render(chunks[0], buf);

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(chunks[1]);

    Paragraph::new(Span::styled(word.japanese.as_str(), bold().fg(Color::Magenta)))
        .alignment(Alignment::Center)
        .render(body[1], buf);

    Paragraph::new(format!("{}_", session.input))
        .block(Block::default().borders(Borders::ALL).title("answer"))
        .render(body[2], buf);

    if let Some(feedback) = &session.feedback {
        let line = if feedback.correct {
            Span::styled("Correct!", bold().fg(Color::Green))
        } else {
            Span::styled(
                format!("Incorrect, the answer is \"{}\"", feedback.word.english),
                bold().fg(Color::Red),
            )
        };
        Paragraph::new(line)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(body[3], buf);
    }

    Paragraph::new("(enter) submit / (tab) listen again / (esc) quit")
        .style(help_style())
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
}

fn render_results<S: Speaker>(app: &QuizApp<S>, area: Rect, buf: &mut Buffer) {
    let Some(summary) = app.engine.summary() else {
        return;
    };
    let chunks = screen_chunks(area, 4);

    Paragraph::new(Span::styled(
        format!("{} finished", summary.dictionary_name),
        Style::default().fg(Color::Cyan),
    ))
    .render(chunks[0], buf);

    let percentage = eigo::util::percentage(summary.score.into(), summary.total.into());
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{}/{} correct ({percentage:.0}%)", summary.score, summary.total),
            bold(),
        )),
        Line::from(format!("best streak {}", summary.best_streak)),
    ];
    if summary.history.is_none() {
        lines.push(Line::from(Span::styled(
            "this result could not be saved",
            Style::default().fg(Color::Yellow),
        )));
    }
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new("(r)etry / (esc) quit")
        .style(help_style())
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
}

impl Widget for &FlashcardApp {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let player = &self.player;
        let chunks = screen_chunks(area, 4);

        let status = if player.is_playing() { "playing" } else { "paused" };
        Paragraph::new(Span::styled(
            format!(
                "{}  card {}/{}  {}  {}",
                self.dictionary_name,
                player.index() + 1,
                player.len(),
                player.mode(),
                status
            ),
            Style::default().fg(Color::Cyan),
        ))
        .render(chunks[0], buf);

        let word = player.current();
        let card = vec![
            Line::from(Span::styled(word.english.as_str(), bold())),
            Line::from(""),
            Line::from(Span::styled(
                word.japanese.as_str(),
                Style::default().fg(Color::Magenta),
            )),
        ];
        let card_area = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3), Constraint::Min(0)])
            .split(chunks[1]);
        Paragraph::new(card)
            .alignment(Alignment::Center)
            .render(card_area[1], buf);

        Paragraph::new("(space) play/pause / (←/→) previous/next / (m)ode / (esc) quit")
            .style(help_style())
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }
}
