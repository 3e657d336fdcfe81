//! Idle disconnect.
//!
//! When a session runs out of songs a deferred check is posted back onto the
//! session after the grace period. The check itself decides whether to
//! disconnect by looking at the session as it is at that moment, so a song
//! started in the meantime simply makes the check a no-op.

use serenity::model::id::GuildId;
use std::time::Duration;
use tokio::{sync::mpsc, time::Instant};
use tracing::debug;

use super::session::SessionCommand;

/// Programa la verificación de inactividad
pub(crate) fn schedule(sender: mpsc::UnboundedSender<SessionCommand>, guild_id: GuildId, after: Duration) {
    debug!(
        "⏳ Desconexión por inactividad programada en {}s para guild {}",
        after.as_secs(),
        guild_id
    );

    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if sender.send(SessionCommand::IdleCheck).is_err() {
            debug!("Sesión cerrada antes de la verificación de inactividad");
        }
    });
}

/// Tracks since when a session has had nothing to play.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct IdleTimer {
    since: Option<Instant>,
}

impl IdleTimer {
    pub fn mark(&mut self, now: Instant) {
        self.since = Some(now);
    }

    pub fn clear(&mut self) {
        self.since = None;
    }

    pub fn expired(&self, now: Instant, timeout: Duration) -> bool {
        self.since
            .is_some_and(|since| now.saturating_duration_since(since) >= timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timer_expiry() {
        let start = Instant::now();
        let mut timer = IdleTimer::default();
        assert!(!timer.expired(start + Duration::from_secs(1000), Duration::from_secs(180)));

        timer.mark(start);
        assert!(!timer.expired(start + Duration::from_secs(179), Duration::from_secs(180)));
        assert!(timer.expired(start + Duration::from_secs(180), Duration::from_secs(180)));

        timer.clear();
        assert!(!timer.expired(start + Duration::from_secs(500), Duration::from_secs(180)));
    }
}
