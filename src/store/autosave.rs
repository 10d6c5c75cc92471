use std::time::{Duration, Instant};

/// Inactivity window after which pending field edits auto-commit.
pub const AUTO_SAVE_WINDOW: Duration = Duration::from_millis(300);

/// Single cancelable deadline for debounced saves.
///
/// Two states: idle (`deadline == None`) and armed. Re-arming while armed
/// supersedes the previous deadline; there is never more than one in flight.
/// The owner polls `fire` from its event loop and commits when it reports
/// true. Dropping the owner drops the deadline with it, so no commit can
/// outlive the editor.
#[derive(Debug)]
pub struct AutoSaveTimer {
    window: Duration,
    deadline: Option<Instant>,
}

impl AutoSaveTimer {
    pub fn new(window: Duration) -> Self {
        AutoSaveTimer {
            window,
            deadline: None,
        }
    }

    /// Start or restart the inactivity window from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
        tracing::debug!(window_ms = self.window.as_millis() as u64, "auto-save armed");
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }

    /// One-shot: reports true exactly once per armed deadline, then returns
    /// to idle.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

impl Default for AutoSaveTimer {
    fn default() -> Self {
        AutoSaveTimer::new(AUTO_SAVE_WINDOW)
    }
}
