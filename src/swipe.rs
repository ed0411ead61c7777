/// Gesture interpretation for the study view.
///
/// A continuous pointer gesture reduces to a scalar horizontal displacement
/// `d = start_x - current_x` (positive = leftward). Past the preview
/// threshold the UI shows which judgment the gesture would commit; past the
/// commit threshold on release the judgment is applied. Anything shorter is
/// discarded without touching state.

/// Displacement at which a directional preview appears.
pub const PREVIEW_THRESHOLD: f64 = 30.0;
/// Displacement at which releasing the gesture commits a judgment.
/// Exactly this distance commits; one unit less does not.
pub const COMMIT_THRESHOLD: f64 = 50.0;

/// What an in-progress gesture is about to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipePreview {
    /// Leftward swipe: judge the current card as mastered.
    Mastered,
    /// Rightward swipe: judge the current card as needing study.
    NeedsStudy,
}

/// Outcome of a finished gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeOutcome {
    /// Commit `judge(current, mastered)`.
    Judge { mastered: bool },
    /// Below the commit threshold; no state change.
    Discarded,
}

/// Tracks a single pointer gesture from press to release.
#[derive(Debug, Default)]
pub struct SwipeTracker {
    start_x: Option<f64>,
    current_x: f64,
}

impl SwipeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer pressed at `x`; begins a gesture and resets any stale one.
    pub fn begin(&mut self, x: f64) {
        self.start_x = Some(x);
        self.current_x = x;
    }

    /// Pointer moved to `x` while held.
    pub fn update(&mut self, x: f64) {
        if self.start_x.is_some() {
            self.current_x = x;
        }
    }

    pub fn is_active(&self) -> bool {
        self.start_x.is_some()
    }

    /// Signed displacement of the gesture so far, positive = leftward.
    pub fn displacement(&self) -> f64 {
        match self.start_x {
            Some(start) => start - self.current_x,
            None => 0.0,
        }
    }

    /// Directional preview for the in-progress gesture, if it has travelled
    /// far enough.
    pub fn preview(&self) -> Option<SwipePreview> {
        let d = self.displacement();
        if d.abs() < PREVIEW_THRESHOLD {
            return None;
        }
        if d > 0.0 {
            Some(SwipePreview::Mastered)
        } else {
            Some(SwipePreview::NeedsStudy)
        }
    }

    /// Pointer released; ends the gesture and reports what it committed.
    pub fn finish(&mut self) -> SwipeOutcome {
        let d = self.displacement();
        self.start_x = None;
        if d.abs() < COMMIT_THRESHOLD {
            return SwipeOutcome::Discarded;
        }
        SwipeOutcome::Judge { mastered: d > 0.0 }
    }

    /// Drop the gesture without committing (e.g. focus left the cards tab).
    pub fn cancel(&mut self) {
        self.start_x = None;
    }
}
