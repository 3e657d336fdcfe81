//! # Audio Module
//!
//! Per-guild playback engine for Vibe Music.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue State
//! - Pure state machine: queue, current, previous, history, loop modes
//! - One `advance` routine decides what plays next
//!
//! ### [`session`] - Session Actors
//! - One tokio task per guild owns its [`queue::MusicQueue`]
//! - Transport completions and idle checks arrive as messages, so advances
//!   for a guild never overlap
//!
//! ### [`transport`] - Voice Transport
//! - Songbird-backed playback of downloaded files
//! - Exactly one completion per started track
//!
//! ### [`player`] - Facade
//! - Resolves requests and forwards commands to the right session
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let player = AudioPlayer::new(sessions, resolver);
//!
//! player.join(guild_id, channel_id).await?;
//! player.play(guild_id, "never gonna give you up").await?;
//! player.toggle_loop_song(guild_id).await?;
//! player.skip(guild_id).await?;
//! ```

pub mod error;
pub mod history;
pub mod player;
pub mod progress;
pub mod queue;
pub mod reaper;
pub mod reclaim;
pub mod session;
pub mod transport;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;
