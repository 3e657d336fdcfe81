//! Test doubles for the voice transport and file reclamation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{
    queue::Song,
    reclaim::ResourceReclaimer,
    transport::{PlaybackCompletion, TransportProvider, VoiceTransport},
};

pub(crate) fn song(id: &str) -> Song {
    Song {
        id: id.to_string(),
        title: format!("Canción {}", id),
        source_url: format!("https://www.youtube.com/watch?v={}", id),
        local_path: PathBuf::from(format!("/tmp/vibe-music-test/song_{}.mp3", id)),
        duration_secs: 180,
    }
}

#[derive(Default)]
struct FakeState {
    completion: Option<PlaybackCompletion>,
    paused: bool,
    plays: Vec<PathBuf>,
    stops: usize,
    disconnects: usize,
    volume: Option<f32>,
    failing: HashSet<PathBuf>,
}

/// In-memory transport. A track "plays" until [`FakeTransport::finish`] or
/// `stop` fires its completion.
#[derive(Default)]
pub(crate) struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    /// Simula el fin natural de la pista actual
    pub fn finish(&self) {
        let completion = self.state.lock().completion.take();
        if let Some(completion) = completion {
            completion.notify();
        }
    }

    pub fn fail_on(&self, path: PathBuf) {
        self.state.lock().failing.insert(path);
    }

    pub fn plays(&self) -> Vec<PathBuf> {
        self.state.lock().plays.clone()
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn volume(&self) -> Option<f32> {
        self.state.lock().volume
    }

    pub fn is_paused_now(&self) -> bool {
        self.state.lock().paused
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, _channel_id: ChannelId) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.disconnects += 1;
        state.completion = None;
        state.paused = false;
        Ok(())
    }

    async fn play(&self, path: &Path, volume: f32, completion: PlaybackCompletion) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing.contains(path) {
            bail!("archivo corrupto: {}", path.display());
        }
        state.plays.push(path.to_path_buf());
        state.volume = Some(volume);
        state.completion = Some(completion);
        state.paused = false;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let completion = {
            let mut state = self.state.lock();
            state.stops += 1;
            state.paused = false;
            state.completion.take()
        };
        if let Some(completion) = completion {
            completion.notify();
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.state.lock().paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.state.lock().paused = false;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let state = self.state.lock();
        state.completion.is_some() && !state.paused
    }

    async fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.completion.is_some() && state.paused
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.state.lock().volume = Some(volume);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeProvider {
    transports: DashMap<GuildId, Arc<FakeTransport>>,
}

impl FakeProvider {
    pub fn get(&self, guild_id: GuildId) -> Arc<FakeTransport> {
        self.transports.entry(guild_id).or_default().clone()
    }
}

impl TransportProvider for FakeProvider {
    fn transport_for(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport> {
        self.get(guild_id)
    }
}

/// Counts reclamations per file instead of touching the disk.
#[derive(Default)]
pub(crate) struct CountingReclaimer {
    counts: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingReclaimer {
    pub fn count_for(&self, path: &Path) -> usize {
        self.counts.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }
}

#[async_trait]
impl ResourceReclaimer for CountingReclaimer {
    async fn reclaim(&self, song: &Song) {
        *self.counts.lock().entry(song.local_path.clone()).or_insert(0) += 1;
    }
}
