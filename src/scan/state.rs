use std::collections::HashSet;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Outcome of checking one decoded payload against the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Same payload as the last acceptance, still inside the cooldown window.
    CoolingDown,
    /// Already accepted earlier in this session.
    Duplicate,
}

#[derive(Debug, Clone)]
struct Cooldown {
    payload: String,
    at: Instant,
}

/// Per-session de-duplication state, owned by the orchestrator.
///
/// Created when a capture session starts and dropped when it ends. Clearing
/// the scanned set keeps the cooldown, so a code that is still in front of
/// the camera is not accepted again the moment the user clears history.
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: String,
    scanned: HashSet<String>,
    cooldown: Option<Cooldown>,
    cooldown_window: Duration,
}

impl SessionState {
    pub fn new(cooldown_window: Duration) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            scanned: HashSet::new(),
            cooldown: None,
            cooldown_window,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn scanned_count(&self) -> usize {
        self.scanned.len()
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.scanned.contains(payload)
    }

    /// Cooldown is checked before the scanned set.
    pub fn evaluate(&self, payload: &str, now: Instant) -> Verdict {
        if let Some(cooldown) = &self.cooldown {
            if cooldown.payload == payload
                && now.saturating_duration_since(cooldown.at) < self.cooldown_window
            {
                return Verdict::CoolingDown;
            }
        }

        if self.scanned.contains(payload) {
            return Verdict::Duplicate;
        }

        Verdict::Accept
    }

    pub fn record_accept(&mut self, payload: &str, now: Instant) {
        self.scanned.insert(payload.to_string());
        self.cooldown = Some(Cooldown {
            payload: payload.to_string(),
            at: now,
        });
    }

    pub fn clear_scanned(&mut self) {
        self.scanned.clear();
    }
}
