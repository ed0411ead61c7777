use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Widget, Wrap},
};
use time_humanize::HumanTime;

use crate::app::{App, HomeFocus, Tab, View};
use crate::study::{Phase, StudyMode};
use crate::swipe::SwipePreview;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.view {
            View::Home => render_home(self, area, buf),
            View::Loading => render_loading(self, area, buf),
            View::Session => render_session(self, area, buf),
        }
    }
}

/// "2023-11-05 09:31:00" (UTC, as sqlite stores it) rendered as a relative
/// time. Unparseable values fall back to the raw string.
pub fn humanize_created_at(created_at: &str) -> String {
    match chrono::NaiveDateTime::parse_from_str(created_at, "%Y-%m-%d %H:%M:%S") {
        Ok(then) => {
            let delta = chrono::Utc::now().naive_utc() - then;
            HumanTime::from(-delta.num_seconds()).to_string()
        }
        Err(_) => created_at.to_string(),
    }
}

fn render_home(app: &App, area: Rect, buf: &mut Buffer) {
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    Paragraph::new(Span::styled("tubedeck", bold_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let input_border = if app.home_focus == HomeFocus::UrlEntry {
        Style::default().fg(Color::Green)
    } else {
        dim_style
    };
    Paragraph::new(app.url_input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(input_border)
                .title("YouTube URL (Enter to generate)"),
        )
        .render(chunks[1], buf);

    if let Some(error) = &app.error {
        Paragraph::new(Span::styled(error.as_str(), Style::default().fg(Color::Red)))
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);
    }

    let items: Vec<ListItem> = app
        .sessions
        .iter()
        .enumerate()
        .map(|(idx, session)| {
            let selected =
                app.home_focus == HomeFocus::Sessions && idx == app.selected_session;
            let marker = if selected { "> " } else { "  " };
            let line = Line::from(vec![
                Span::raw(marker),
                Span::styled(session.title.clone(), bold_style),
                Span::styled(
                    format!("  {}", humanize_created_at(&session.created_at)),
                    dim_style,
                ),
            ]);
            if selected {
                ListItem::new(line).style(Style::default().fg(Color::Green))
            } else {
                ListItem::new(line)
            }
        })
        .collect();
    List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Previous sessions"),
        )
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(tab) switch focus / (esc) quit",
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);
}

fn render_loading(app: &App, area: Rect, buf: &mut Buffer) {
    let message = if app.loading_step.is_empty() {
        "Working..."
    } else {
        app.loading_step.as_str()
    };
    Paragraph::new(Span::styled(
        message,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(centered_line(area), buf);
}

fn render_session(app: &App, area: Rect, buf: &mut Buffer) {
    match app.study.phase() {
        Phase::ModeSelect => render_mode_select(app, area, buf),
        Phase::Studying => match app.tab {
            Tab::Cards => render_card(app, area, buf),
            Tab::Summary => render_summary(app, area, buf),
        },
        Phase::Complete => render_complete(area, buf),
        Phase::Idle => {}
    }
}

fn render_mode_select(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let title = app
        .session
        .as_ref()
        .map(|s| s.title.as_str())
        .unwrap_or("Session");
    Paragraph::new(Span::styled(title, bold_style))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[0], buf);

    let total = app.study.cards().len();
    let unknown = app.study.unknown_count();
    Paragraph::new(format!("(a) study {} ({} cards)", StudyMode::All, total))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let unknown_line = format!(
        "(u) study {} ({} cards)",
        StudyMode::UnknownOnly,
        unknown
    );
    let unknown_style = if app.study.can_select_unknown_only() {
        Style::default()
    } else {
        dim_style
    };
    Paragraph::new(Span::styled(unknown_line, unknown_style))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new("(r) reset progress")
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(esc) home / (o) open video",
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[5], buf);
}

fn render_card(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let position = format!(
        "Card {}/{}",
        app.study.cursor() + 1,
        app.study.filtered_len()
    );
    Paragraph::new(Span::styled(position, bold_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    if let Some(card) = app.study.current_card() {
        let text = if app.flipped { &card.back } else { &card.front };
        let side = if app.flipped { "back" } else { "front" };
        let mut title = side.to_string();
        if card.mastered {
            title.push_str(" · mastered");
        }
        Paragraph::new(Span::styled(text.as_str(), bold_style))
            .block(Block::default().borders(Borders::ALL).title(title))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[1], buf);
    }

    if let Some(preview) = app.swipe.preview() {
        let (label, color) = match preview {
            SwipePreview::Mastered => ("release to mark mastered", Color::Green),
            SwipePreview::NeedsStudy => ("release to mark needs study", Color::Red),
        };
        Paragraph::new(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled(
        "(←) mastered / (→) needs study / (↑↓) browse / (space) flip / (s) summary / (esc) home",
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

fn render_summary(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(3), Constraint::Length(1)].as_ref())
        .split(area);

    let summary = app
        .session
        .as_ref()
        .map(|s| s.summary.as_str())
        .unwrap_or_default();
    Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL).title("Summary"))
        .wrap(Wrap { trim: true })
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        "(s) back to cards / (esc) home",
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);
}

fn render_complete(area: Rect, buf: &mut Buffer) {
    Paragraph::new(Span::styled(
        "Deck complete!",
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .render(centered_line(area), buf);
}

/// A one-line rect vertically centered in `area`.
fn centered_line(area: Rect) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);
    chunks[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, Session};
    use crate::store::Store;
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn app_with_session() -> App {
        let mut store = Store::open_in_memory().unwrap();
        let session = Session {
            id: "s1".into(),
            url: "https://youtu.be/abc".into(),
            title: "Learn English".into(),
            summary: "A video about learning.".into(),
            created_at: String::new(),
        };
        let cards = vec![
            Card {
                id: "c1".into(),
                session_id: "s1".into(),
                front: "사과".into(),
                back: "apple".into(),
                card_order: 1,
                mastered: false,
            },
            Card {
                id: "c2".into(),
                session_id: "s1".into(),
                front: "바다".into(),
                back: "sea".into(),
                card_order: 2,
                mastered: false,
            },
        ];
        store.create_session_with_cards(&session, &cards).unwrap();
        App::new(store, None)
    }

    fn draw(app: &App) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| f.render_widget(app, f.area())).unwrap();
        buffer_text(&terminal)
    }

    #[test]
    fn test_home_shows_sessions_and_input() {
        let app = app_with_session();
        let text = draw(&app);
        assert!(text.contains("YouTube URL"));
        assert!(text.contains("Learn English"));
    }

    #[test]
    fn test_home_shows_error() {
        let mut app = app_with_session();
        app.error = Some("no transcript".into());
        let text = draw(&app);
        assert!(text.contains("no transcript"));
    }

    #[test]
    fn test_mode_select_shows_counts() {
        let mut app = app_with_session();
        app.open_session("s1");
        let text = draw(&app);
        assert!(text.contains("all cards (2 cards)"));
        assert!(text.contains("needs study (2 cards)"));
    }

    #[test]
    fn test_card_front_then_back() {
        let mut app = app_with_session();
        app.open_session("s1");
        app.study.select_mode(StudyMode::All);
        let text = draw(&app);
        // Wide glyphs leave a blank continuation cell in the buffer, so
        // match one syllable at a time.
        assert!(text.contains("사"));
        assert!(text.contains("Card 1/2"));
        assert!(!text.contains("apple"));

        app.flipped = true;
        let text = draw(&app);
        assert!(text.contains("apple"));
    }

    #[test]
    fn test_swipe_preview_banner() {
        let mut app = app_with_session();
        app.open_session("s1");
        app.study.select_mode(StudyMode::All);
        app.swipe.begin(100.0);
        app.swipe.update(60.0);
        let text = draw(&app);
        assert!(text.contains("release to mark mastered"));
    }

    #[test]
    fn test_summary_tab() {
        let mut app = app_with_session();
        app.open_session("s1");
        app.study.select_mode(StudyMode::All);
        app.tab = Tab::Summary;
        let text = draw(&app);
        assert!(text.contains("A video about learning."));
        assert!(!text.contains("사"));
    }

    #[test]
    fn test_complete_screen() {
        let mut app = app_with_session();
        app.open_session("s1");
        app.study.select_mode(StudyMode::All);
        app.judge_current(true);
        app.judge_current(true);
        let text = draw(&app);
        assert!(text.contains("Deck complete!"));
    }

    #[test]
    fn test_humanize_created_at_fallback() {
        assert_eq!(humanize_created_at("not a date"), "not a date");
    }

    #[test]
    fn test_humanize_created_at_recent() {
        let now = chrono::Utc::now()
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let text = humanize_created_at(&now);
        assert!(text.contains("now"), "unexpected rendering: {}", text);
    }
}
