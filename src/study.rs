use crate::model::Card;
use itertools::Itertools;
use std::time::{Duration, Instant};

/// How long the "deck complete" screen stays up before the machine returns
/// to mode selection on its own. Single-shot and non-cancelable.
pub const COMPLETE_DISPLAY_MS: u64 = 1500;

/// Filter applied to a session's cards while studying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StudyMode {
    #[strum(serialize = "all cards")]
    All,
    #[strum(serialize = "needs study")]
    UnknownOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session loaded.
    Idle,
    /// Session loaded, mode not yet chosen.
    ModeSelect,
    /// Mode chosen, browsing the filtered cards.
    Studying,
    /// Filtered sequence exhausted by a judgment; auto-returns to ModeSelect.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// An idempotent persistence request emitted by the state machine. The
/// machine never touches the store itself; the caller forwards these to the
/// writeback queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasteryWrite {
    SetMastered { card_id: String, mastered: bool },
    ResetSession { session_id: String },
}

/// In-memory state for one open study session.
///
/// Local mastery flags are updated optimistically; the store is the durable
/// source of truth reconciled at the next session load.
#[derive(Debug)]
pub struct Study {
    cards: Vec<Card>,
    mode: Option<StudyMode>,
    cursor: usize,
    phase: Phase,
    complete_deadline: Option<Instant>,
}

impl Default for Study {
    fn default() -> Self {
        Self::new()
    }
}

impl Study {
    pub fn new() -> Self {
        Self {
            cards: Vec::new(),
            mode: None,
            cursor: 0,
            phase: Phase::Idle,
            complete_deadline: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Option<StudyMode> {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The full (unfiltered) card sequence.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn unknown_count(&self) -> usize {
        self.cards.iter().filter(|c| !c.mastered).count()
    }

    /// The UI disables selecting UnknownOnly when nothing needs study; the
    /// machine tolerates the call anyway (see `select_mode`).
    pub fn can_select_unknown_only(&self) -> bool {
        self.unknown_count() > 0
    }

    fn filtered_indices(&self) -> Vec<usize> {
        match self.mode {
            Some(StudyMode::UnknownOnly) => {
                self.cards.iter().positions(|c| !c.mastered).collect()
            }
            _ => (0..self.cards.len()).collect(),
        }
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered_indices().len()
    }

    /// The card under the cursor, if any.
    pub fn current_card(&self) -> Option<&Card> {
        let indices = self.filtered_indices();
        indices.get(self.cursor).map(|&i| &self.cards[i])
    }

    /// Load a session's cards and move to mode selection. Pure state load;
    /// the caller already fetched the cards from the store.
    pub fn load_session(&mut self, cards: Vec<Card>) {
        self.cards = cards;
        self.mode = None;
        self.cursor = 0;
        self.phase = Phase::ModeSelect;
        self.complete_deadline = None;
    }

    /// Choose a study mode and start browsing. Only meaningful from
    /// ModeSelect. An empty filtered sequence (UnknownOnly with zero
    /// unmastered cards) silently lands on the complete screen instead of
    /// exposing an out-of-range cursor.
    pub fn select_mode(&mut self, mode: StudyMode) {
        if self.phase != Phase::ModeSelect {
            return;
        }
        self.mode = Some(mode);
        let len = self.filtered_len();
        if len == 0 {
            self.enter_complete();
            return;
        }
        // Clamp rather than trusting the caller: a stale cursor from a
        // previous pass must stay inside the new filtered sequence.
        self.cursor = self.cursor.min(len - 1);
        self.phase = Phase::Studying;
    }

    /// Judge the card under the cursor. Returns the persistence request to
    /// enqueue, or None when the call was rejected.
    ///
    /// The supplied id must match the current card; out-of-order judging is
    /// not supported and a mismatch is dropped (logged) rather than applied
    /// to the wrong card.
    pub fn judge(&mut self, card_id: &str, mastered: bool) -> Option<MasteryWrite> {
        if self.phase != Phase::Studying {
            return None;
        }
        match self.current_card() {
            Some(card) if card.id == card_id => {}
            Some(card) => {
                log::warn!(
                    "judge rejected: id {} does not match current card {}",
                    card_id,
                    card.id
                );
                return None;
            }
            None => return None,
        }

        if let Some(card) = self.cards.iter_mut().find(|c| c.id == card_id) {
            card.mastered = mastered;
        }

        let new_len = self.filtered_len();
        if self.cursor + 1 < new_len {
            self.cursor += 1;
        } else {
            self.enter_complete();
        }

        Some(MasteryWrite::SetMastered {
            card_id: card_id.to_string(),
            mastered,
        })
    }

    /// Move the cursor by one within the filtered sequence. No wrap, no
    /// judgment; a no-op at either boundary.
    pub fn navigate(&mut self, direction: Direction) {
        if self.phase != Phase::Studying {
            return;
        }
        let len = self.filtered_len();
        if len == 0 {
            return;
        }
        match direction {
            Direction::Prev => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                }
            }
            Direction::Next => {
                if self.cursor < len - 1 {
                    self.cursor += 1;
                }
            }
        }
    }

    /// Clear every card's mastery flag and return to mode selection. Safe
    /// from any phase; a no-op when no session is loaded.
    pub fn reset_mastery(&mut self) -> Option<MasteryWrite> {
        if self.cards.is_empty() {
            return None;
        }
        for card in &mut self.cards {
            card.mastered = false;
        }
        let session_id = self.cards[0].session_id.clone();
        self.cursor = 0;
        self.mode = None;
        self.phase = Phase::ModeSelect;
        self.complete_deadline = None;
        Some(MasteryWrite::ResetSession { session_id })
    }

    /// Discard session, cards, cursor, and mode. Valid from any phase.
    pub fn return_home(&mut self) {
        *self = Self::new();
    }

    fn enter_complete(&mut self) {
        self.phase = Phase::Complete;
        self.complete_deadline =
            Some(Instant::now() + Duration::from_millis(COMPLETE_DISPLAY_MS));
    }

    /// Drive the Complete → ModeSelect auto-return from the tick loop.
    pub fn on_tick(&mut self) {
        self.poll_complete(Instant::now());
    }

    /// Tick with an explicit clock, for deterministic tests.
    pub fn poll_complete(&mut self, now: Instant) {
        if self.phase != Phase::Complete {
            return;
        }
        if let Some(deadline) = self.complete_deadline {
            if now >= deadline {
                self.cursor = 0;
                self.mode = None;
                self.phase = Phase::ModeSelect;
                self.complete_deadline = None;
            }
        }
    }
}
