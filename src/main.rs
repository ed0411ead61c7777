use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::mpsc::Sender,
    thread,
    time::Duration,
};
use webbrowser::Browser;

use tubedeck::{
    app::{Action, App},
    config::{Config, ConfigStore, FileConfigStore},
    export::export_session_csv,
    pipeline::{self, CommandTranscriptFetcher, LlmCardGenerator},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    store::Store,
    writeback::Writeback,
};

const TICK_RATE_MS: u64 = 100;

/// turn youtube videos into study-able flashcard decks
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Extracts the transcript of a YouTube video, asks an LLM to distill it into English-learning flashcards, and opens a swipeable study deck in the terminal."
)]
pub struct Cli {
    /// path to the flashcard database (default: per-user state directory)
    #[clap(long)]
    db: Option<PathBuf>,

    /// write one session's cards as CSV to stdout and exit
    #[clap(long, value_name = "SESSION_ID")]
    export: Option<String>,
}

impl Cli {
    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(Store::default_db_path)
            .unwrap_or_else(|| PathBuf::from("flashcards.db"))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let db_path = cli.db_path();

    if let Some(session_id) = &cli.export {
        let store = Store::open(&db_path)?;
        export_session_csv(&store, session_id, io::stdout())?;
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config = FileConfigStore::new().load();
    let store = Store::open(&db_path)?;
    let writeback = Writeback::spawn(db_path.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, Some(writeback));
    let result = run_tui(&mut terminal, &mut app, &config, &db_path);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    config: &Config,
    db_path: &PathBuf,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Mouse(mouse) => app.handle_mouse(mouse),
            AppEvent::Generated(result) => app.on_generated(*result),
            AppEvent::Key(key) => match app.handle_key(key) {
                Some(Action::Quit) => break,
                Some(Action::Generate(url)) => {
                    spawn_generation(url, config.clone(), db_path.clone(), runner.sender());
                }
                Some(Action::OpenUrl(url)) => {
                    if Browser::is_available() {
                        webbrowser::open(&url).unwrap_or_default();
                    }
                }
                None => {}
            },
        }
    }
    Ok(())
}

/// Run the generation pipeline off the UI thread. The worker opens its own
/// database connection and reports back through the event channel.
fn spawn_generation(url: String, config: Config, db_path: PathBuf, tx: Sender<AppEvent>) {
    thread::spawn(move || {
        let result = generate_session(&url, &config, &db_path);
        // The loop may have shut down; nothing left to notify then.
        let _ = tx.send(AppEvent::Generated(Box::new(result)));
    });
}

fn generate_session(
    url: &str,
    config: &Config,
    db_path: &PathBuf,
) -> Result<pipeline::GeneratedSession, pipeline::GenerateError> {
    let api_key = config
        .resolved_api_key()
        .ok_or_else(|| pipeline::GenerateError::Unknown("no API key configured".into()))?;
    let fetcher = CommandTranscriptFetcher::new(&config.transcript_command);
    let generator = LlmCardGenerator::new(&config.api_base_url, &api_key, &config.model)?;
    let mut store = Store::open(db_path)
        .map_err(|e| pipeline::GenerateError::Unknown(e.to_string()))?;
    pipeline::generate(url, &fetcher, &generator, &mut store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["tubedeck"]);
        assert_eq!(cli.db, None);
        assert_eq!(cli.export, None);
    }

    #[test]
    fn test_cli_db_override() {
        let cli = Cli::parse_from(["tubedeck", "--db", "/tmp/cards.db"]);
        assert_eq!(cli.db_path(), PathBuf::from("/tmp/cards.db"));
    }

    #[test]
    fn test_cli_export_flag() {
        let cli = Cli::parse_from(["tubedeck", "--export", "abc123"]);
        assert_eq!(cli.export.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cli_db_path_has_fallback() {
        let cli = Cli::parse_from(["tubedeck"]);
        assert!(!cli.db_path().as_os_str().is_empty());
    }
}
