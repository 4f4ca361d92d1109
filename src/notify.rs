use crate::util::Tone;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub tone: Tone,
    expires_at: Instant,
}

/// Transient on-screen messages. Each banner disappears on its own after
/// the configured lifetime unless dismissed first.
#[derive(Debug)]
pub struct Notifications {
    ttl: Duration,
    banners: Vec<Banner>,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Notifications {
            ttl,
            banners: Vec::new(),
        }
    }

    pub fn push(&mut self, message: impl Into<String>, tone: Tone, now: Instant) {
        self.banners.push(Banner {
            message: message.into(),
            tone,
            expires_at: now + self.ttl,
        });
    }

    pub fn dismiss_latest(&mut self) -> Option<Banner> {
        self.banners.pop()
    }

    /// Drops expired banners, returning how many went away.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.banners.len();
        self.banners.retain(|b| b.expires_at > now);
        before - self.banners.len()
    }

    pub fn visible(&self) -> &[Banner] {
        &self.banners
    }

    pub fn is_empty(&self) -> bool {
        self.banners.is_empty()
    }
}
