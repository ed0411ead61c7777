use crate::model::Session;
use crate::pipeline::{GenerateError, GeneratedSession};
use crate::store::Store;
use crate::study::{Direction, MasteryWrite, Phase, Study, StudyMode};
use crate::swipe::{SwipeOutcome, SwipeTracker};
use crate::writeback::Writeback;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

/// Top-level screen being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Loading,
    Session,
}

/// Tabs inside the session view. Judging keys only work on the cards tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Cards,
    Summary,
}

/// Which widget on the home view owns keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeFocus {
    UrlEntry,
    Sessions,
}

/// Side effects the event loop must perform on the app's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Kick off a generation worker for this URL.
    Generate(String),
    /// Open the current session's source video in a browser.
    OpenUrl(String),
}

pub struct App {
    pub store: Store,
    pub writeback: Option<Writeback>,
    pub study: Study,
    pub view: View,
    pub tab: Tab,
    pub home_focus: HomeFocus,
    pub session: Option<Session>,
    pub sessions: Vec<Session>,
    pub selected_session: usize,
    pub url_input: String,
    pub error: Option<String>,
    pub loading_step: String,
    pub swipe: SwipeTracker,
    /// Whether the current card shows its back side.
    pub flipped: bool,
}

impl App {
    pub fn new(store: Store, writeback: Option<Writeback>) -> Self {
        let mut app = Self {
            store,
            writeback,
            study: Study::new(),
            view: View::Home,
            tab: Tab::Cards,
            home_focus: HomeFocus::UrlEntry,
            session: None,
            sessions: Vec::new(),
            selected_session: 0,
            url_input: String::new(),
            error: None,
            loading_step: String::new(),
            swipe: SwipeTracker::new(),
            flipped: false,
        };
        app.refresh_sessions();
        app
    }

    pub fn refresh_sessions(&mut self) {
        match self.store.list_sessions() {
            Ok(sessions) => {
                self.sessions = sessions;
                if self.selected_session >= self.sessions.len() {
                    self.selected_session = self.sessions.len().saturating_sub(1);
                }
            }
            Err(e) => {
                log::error!("could not list sessions: {}", e);
            }
        }
    }

    /// Load an existing session's cards and enter the study view.
    pub fn open_session(&mut self, session_id: &str) {
        self.error = None;
        let session = match self.store.get_session(session_id) {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.error = Some("Session not found.".to_string());
                self.view = View::Home;
                return;
            }
            Err(e) => {
                self.error = Some(format!("Could not load session: {}", e));
                self.view = View::Home;
                return;
            }
        };
        match self.store.cards_for_session(&session.id) {
            Ok(cards) => {
                self.study.load_session(cards);
                self.session = Some(session);
                self.view = View::Session;
                self.tab = Tab::Cards;
                self.flipped = false;
            }
            Err(e) => {
                self.error = Some(format!("Could not load cards: {}", e));
                self.view = View::Home;
            }
        }
    }

    /// Generation worker finished; either enter the new session or fall
    /// back to home with an inline message.
    pub fn on_generated(&mut self, result: Result<GeneratedSession, GenerateError>) {
        self.loading_step.clear();
        match result {
            Ok(generated) => {
                self.refresh_sessions();
                self.study.load_session(generated.cards);
                self.session = Some(generated.session);
                self.url_input.clear();
                self.view = View::Session;
                self.tab = Tab::Cards;
                self.flipped = false;
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.view = View::Home;
            }
        }
    }

    pub fn on_tick(&mut self) {
        let was_complete = self.study.phase() == Phase::Complete;
        self.study.on_tick();
        if was_complete && self.study.phase() == Phase::ModeSelect {
            self.flipped = false;
        }
    }

    pub fn go_home(&mut self) {
        self.study.return_home();
        self.session = None;
        self.view = View::Home;
        self.tab = Tab::Cards;
        self.flipped = false;
        self.swipe.cancel();
        self.error = None;
        self.refresh_sessions();
    }

    fn enqueue(&self, write: MasteryWrite) {
        if let Some(writeback) = &self.writeback {
            writeback.enqueue(write);
        }
    }

    /// Judge the card under the cursor and queue the persistence write.
    pub fn judge_current(&mut self, mastered: bool) {
        let Some(card_id) = self.study.current_card().map(|c| c.id.clone()) else {
            return;
        };
        if let Some(write) = self.study.judge(&card_id, mastered) {
            self.enqueue(write);
            self.flipped = false;
        }
    }

    fn navigate(&mut self, direction: Direction) {
        let before = self.study.cursor();
        self.study.navigate(direction);
        if self.study.cursor() != before {
            self.flipped = false;
        }
    }

    fn reset_mastery(&mut self) {
        if let Some(write) = self.study.reset_mastery() {
            self.enqueue(write);
            self.flipped = false;
        }
    }

    /// True when swipe/arrow judging applies: studying, on the cards tab.
    fn judging_enabled(&self) -> bool {
        self.view == View::Session
            && self.tab == Tab::Cards
            && self.study.phase() == Phase::Studying
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        match self.view {
            View::Home => self.handle_home_key(key),
            View::Loading => None,
            View::Session => self.handle_session_key(key),
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Tab => {
                self.home_focus = match self.home_focus {
                    HomeFocus::UrlEntry if !self.sessions.is_empty() => HomeFocus::Sessions,
                    _ => HomeFocus::UrlEntry,
                };
            }
            _ => match self.home_focus {
                HomeFocus::UrlEntry => match key.code {
                    KeyCode::Char(c) => {
                        self.url_input.push(c);
                    }
                    KeyCode::Backspace => {
                        self.url_input.pop();
                    }
                    KeyCode::Enter => {
                        let url = self.url_input.trim().to_string();
                        if !url.is_empty() {
                            self.error = None;
                            self.view = View::Loading;
                            self.loading_step =
                                "Extracting the YouTube transcript...".to_string();
                            return Some(Action::Generate(url));
                        }
                    }
                    _ => {}
                },
                HomeFocus::Sessions => match key.code {
                    KeyCode::Up | KeyCode::Char('k') => {
                        self.selected_session = self.selected_session.saturating_sub(1);
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        if self.selected_session + 1 < self.sessions.len() {
                            self.selected_session += 1;
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(session) = self.sessions.get(self.selected_session) {
                            let id = session.id.clone();
                            self.open_session(&id);
                        }
                    }
                    _ => {}
                },
            },
        }
        None
    }

    fn handle_session_key(&mut self, key: KeyEvent) -> Option<Action> {
        // Keys that work regardless of study phase.
        match key.code {
            KeyCode::Esc | KeyCode::Char('h') => {
                self.go_home();
                return None;
            }
            KeyCode::Char('o') => {
                if let Some(session) = &self.session {
                    return Some(Action::OpenUrl(session.url.clone()));
                }
            }
            _ => {}
        }

        match self.study.phase() {
            Phase::ModeSelect => match key.code {
                KeyCode::Char('a') => {
                    self.study.select_mode(StudyMode::All);
                    self.tab = Tab::Cards;
                    self.flipped = false;
                }
                KeyCode::Char('u') => {
                    // Disabled when nothing needs study; the machine would
                    // tolerate it, but the surface should not offer it.
                    if self.study.can_select_unknown_only() {
                        self.study.select_mode(StudyMode::UnknownOnly);
                        self.tab = Tab::Cards;
                        self.flipped = false;
                    }
                }
                KeyCode::Char('r') => self.reset_mastery(),
                _ => {}
            },
            Phase::Studying => match key.code {
                KeyCode::Tab | KeyCode::Char('s') => {
                    self.tab = match self.tab {
                        Tab::Cards => Tab::Summary,
                        Tab::Summary => Tab::Cards,
                    };
                    self.swipe.cancel();
                }
                // Judging and navigation only apply on the cards tab, so a
                // stray arrow while reading the summary never judges.
                KeyCode::Left if self.tab == Tab::Cards => self.judge_current(true),
                KeyCode::Right if self.tab == Tab::Cards => self.judge_current(false),
                KeyCode::Up if self.tab == Tab::Cards => self.navigate(Direction::Prev),
                KeyCode::Down if self.tab == Tab::Cards => self.navigate(Direction::Next),
                KeyCode::Char(' ') | KeyCode::Enter if self.tab == Tab::Cards => {
                    self.flipped = !self.flipped;
                }
                _ => {}
            },
            // Complete auto-returns on its own; Idle never pairs with the
            // session view.
            Phase::Complete | Phase::Idle => {}
        }
        None
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !self.judging_enabled() {
            self.swipe.cancel();
            return;
        }
        match mouse.kind {
            MouseEventKind::Down(crossterm::event::MouseButton::Left) => {
                self.swipe.begin(mouse.column as f64);
            }
            MouseEventKind::Drag(crossterm::event::MouseButton::Left) => {
                self.swipe.update(mouse.column as f64);
            }
            MouseEventKind::Up(crossterm::event::MouseButton::Left) => {
                if let SwipeOutcome::Judge { mastered } = self.swipe.finish() {
                    self.judge_current(mastered);
                }
            }
            _ => {}
        }
    }
}
