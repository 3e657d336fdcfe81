//! Now-playing progress, sampled at query time.

use chrono::{DateTime, Utc};

pub const BAR_SEGMENTS: u64 = 12;

const FILLED: char = '█';
const EMPTY: char = '░';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Segundos transcurridos, ya limitados a la duración conocida
    pub elapsed_secs: u64,
    pub duration_secs: u64,
    /// `None` cuando la duración es desconocida
    pub bar: Option<String>,
}

/// Computes progress for a song started at `started_at` with the given
/// duration. Clock skew (a start in the future) yields zero elapsed.
pub fn progress(started_at: DateTime<Utc>, duration_secs: u64, now: DateTime<Utc>) -> Progress {
    let raw = (now - started_at).num_seconds().max(0) as u64;
    let elapsed_secs = if duration_secs > 0 {
        raw.min(duration_secs)
    } else {
        raw
    };

    Progress {
        elapsed_secs,
        duration_secs,
        bar: progress_bar(elapsed_secs, duration_secs),
    }
}

/// `floor(elapsed / duration * 12)` filled segments, never more than 12.
pub fn progress_bar(elapsed_secs: u64, duration_secs: u64) -> Option<String> {
    if duration_secs == 0 {
        return None;
    }

    let elapsed = elapsed_secs.min(duration_secs);
    let filled = (elapsed * BAR_SEGMENTS / duration_secs) as usize;
    let empty = BAR_SEGMENTS as usize - filled;

    let mut bar = String::with_capacity(BAR_SEGMENTS as usize * FILLED.len_utf8());
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(empty));
    Some(bar)
}
