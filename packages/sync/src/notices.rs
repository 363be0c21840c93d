//! # Notices
//!
//! User-visible error messages. Each notice expires `timeout` after it is
//! shown; hovering it pauses expiry and leaving restarts the countdown.
//! Expiry is evaluated lazily against `tokio::time::Instant`.

use std::time::Duration;
use tokio::time::Instant;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoticeId(u64);

#[derive(Debug, Clone)]
pub struct Notice {
    pub id: NoticeId,
    pub message: String,
    /// `None` while hovered
    expires_at: Option<Instant>,
}

#[derive(Debug)]
pub struct Notices {
    timeout: Duration,
    entries: Vec<Notice>,
    next_id: u64,
}

impl Notices {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Show `message` and log `detail` for diagnosis
    pub fn error(&mut self, message: impl Into<String>, detail: &str) -> NoticeId {
        let message = message.into();
        error!(detail, "{}", message);

        let id = NoticeId(self.next_id);
        self.next_id += 1;
        self.entries.push(Notice {
            id,
            message,
            expires_at: Some(Instant::now() + self.timeout),
        });
        id
    }

    fn prune(&mut self) {
        let now = Instant::now();
        self.entries
            .retain(|n| n.expires_at.map_or(true, |deadline| deadline > now));
    }

    /// Notices still on screen, oldest first
    pub fn visible(&mut self) -> &[Notice] {
        self.prune();
        &self.entries
    }

    pub fn messages(&mut self) -> Vec<String> {
        self.visible().iter().map(|n| n.message.clone()).collect()
    }

    pub fn hover(&mut self, id: NoticeId) {
        self.prune();
        if let Some(notice) = self.entries.iter_mut().find(|n| n.id == id) {
            notice.expires_at = None;
        }
    }

    pub fn leave(&mut self, id: NoticeId) {
        let deadline = Instant::now() + self.timeout;
        if let Some(notice) = self.entries.iter_mut().find(|n| n.id == id) {
            notice.expires_at = Some(deadline);
        }
    }

    pub fn dismiss(&mut self, id: NoticeId) {
        self.entries.retain(|n| n.id != id);
    }
}
