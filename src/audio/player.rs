use chrono::Utc;
use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::info;

use super::{
    error::EngineError,
    progress::{progress, Progress},
    queue::{QueueSnapshot, Song},
    session::{Enqueued, SessionHandle, SessionRegistry, Toggle},
    volume::Volume,
};
use crate::sources::Resolver;

/// Canción actual con su progreso
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub song: Song,
    pub progress: Progress,
}

/// Entry point for the command layer. Every operation is addressed by guild;
/// the matching session is created on first use.
pub struct AudioPlayer {
    sessions: Arc<SessionRegistry>,
    resolver: Arc<Resolver>,
}

impl AudioPlayer {
    pub fn new(sessions: Arc<SessionRegistry>, resolver: Arc<Resolver>) -> Self {
        Self { sessions, resolver }
    }

    fn session(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions.get_or_create(guild_id)
    }

    pub async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError> {
        self.session(guild_id).join(channel_id).await
    }

    pub async fn leave(&self, guild_id: GuildId) -> Result<usize, EngineError> {
        self.session(guild_id).leave().await
    }

    /// La conexión de voz se cerró desde fuera (kick, canal borrado)
    pub fn handle_disconnect(&self, guild_id: GuildId) {
        if let Some(session) = self.sessions.get(guild_id) {
            session.disconnected();
        }
    }

    /// Resolves `query` and appends the song, starting playback when idle.
    ///
    /// Resolution runs on the caller's task, so a slow download never holds
    /// up the session.
    pub async fn play(&self, guild_id: GuildId, query: &str) -> Result<(Song, Enqueued), EngineError> {
        let song = self.resolver.resolve(query).await?;
        let enqueued = self.session(guild_id).enqueue(song.clone(), true).await?;
        Ok((song, enqueued))
    }

    /// Agrega sin iniciar la reproducción
    pub async fn enqueue(&self, guild_id: GuildId, song: Song) -> Result<Enqueued, EngineError> {
        self.session(guild_id).enqueue(song, false).await
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.session(guild_id).skip().await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.session(guild_id).pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.session(guild_id).resume().await
    }

    pub async fn toggle_loop_song(&self, guild_id: GuildId) -> Result<bool, EngineError> {
        self.session(guild_id).toggle(Toggle::LoopSong).await
    }

    pub async fn toggle_repeat_queue(&self, guild_id: GuildId) -> Result<bool, EngineError> {
        self.session(guild_id).toggle(Toggle::RepeatQueue).await
    }

    pub async fn toggle_stay(&self, guild_id: GuildId) -> Result<bool, EngineError> {
        self.session(guild_id).toggle(Toggle::Stay).await
    }

    pub async fn toggle_autoplay(&self, guild_id: GuildId) -> Result<bool, EngineError> {
        self.session(guild_id).toggle(Toggle::Autoplay).await
    }

    /// Plays the last retired song again. Its file was deleted when it was
    /// retired, so it is downloaded again before going back to the front.
    pub async fn previous(&self, guild_id: GuildId) -> Result<Song, EngineError> {
        let session = self.session(guild_id);
        let previous = session.previous_song().await?;

        let fresh = self.resolver.reload(&previous).await?;
        session.restore_previous(fresh.clone()).await?;

        info!("⏮️ Volviendo a: {}", fresh.title);
        Ok(fresh)
    }

    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> Result<Volume, EngineError> {
        self.session(guild_id)
            .set_volume(Volume::from_user_input(percent))
            .await
    }

    pub async fn volume(&self, guild_id: GuildId) -> Result<Volume, EngineError> {
        Ok(self.snapshot(guild_id).await?.volume)
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Result<QueueSnapshot, EngineError> {
        self.session(guild_id).snapshot().await
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Result<Option<NowPlaying>, EngineError> {
        let snapshot = self.snapshot(guild_id).await?;

        Ok(snapshot.current.map(|song| {
            let started_at = snapshot.started_at.unwrap_or_else(Utc::now);
            NowPlaying {
                progress: progress(started_at, song.duration_secs, Utc::now()),
                song,
            }
        }))
    }

    /// Servidores con el bot conectado a un canal de voz
    pub async fn connected_sessions(&self) -> usize {
        let handles = self.sessions.handles();
        join_all(handles.iter().map(|handle| handle.snapshot()))
            .await
            .into_iter()
            .filter(|snapshot| matches!(snapshot, Ok(s) if s.connected))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            session::SessionSettings,
            testing::{CountingReclaimer, FakeProvider},
        },
        sources::{Candidate, DownloadedTrack, MockSearchService},
    };
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const GUILD: GuildId = GuildId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(2);

    fn track(dir: &Path, id: &str, nonce: &str) -> DownloadedTrack {
        let local_path = dir.join(format!("song_{}_{}.mp3", id, nonce));
        std::fs::write(&local_path, b"mp3").unwrap();
        DownloadedTrack {
            id: id.to_string(),
            title: format!("Título {}", id),
            duration_secs: 240,
            webpage_url: Some(format!("https://www.youtube.com/watch?v={}", id)),
            local_path,
        }
    }

    fn player(service: MockSearchService) -> (AudioPlayer, Arc<FakeProvider>, Arc<CountingReclaimer>) {
        let transports = Arc::new(FakeProvider::default());
        let reclaimer = Arc::new(CountingReclaimer::default());
        let sessions = Arc::new(SessionRegistry::new(
            SessionSettings::default(),
            transports.clone(),
            reclaimer.clone(),
            None,
        ));
        let resolver = Arc::new(Resolver::new(Arc::new(service), 5));
        (AudioPlayer::new(sessions, resolver), transports, reclaimer)
    }

    #[tokio::test]
    async fn play_resolves_then_starts() {
        let dir = tempfile::tempdir().unwrap();
        let first = track(dir.path(), "a", "1");

        let mut service = MockSearchService::new();
        service.expect_search().returning(|_, _| {
            Ok(vec![Candidate {
                id: "a".into(),
                title: "Título a".into(),
                duration_secs: 240,
                webpage_url: None,
            }])
        });
        service
            .expect_download()
            .returning(move |_| Ok(first.clone()));

        let (player, transports, _) = player(service);
        player.join(GUILD, CHANNEL).await.unwrap();

        let (song, enqueued) = player.play(GUILD, "canción a").await.unwrap();
        assert!(enqueued.started);
        assert_eq!(song.id, "a");
        assert_eq!(transports.get(GUILD).plays(), vec![song.local_path.clone()]);

        let now = player.now_playing(GUILD).await.unwrap().unwrap();
        assert_eq!(now.song, song);
        assert_eq!(now.progress.duration_secs, 240);
    }

    #[tokio::test]
    async fn failed_resolution_leaves_session_untouched() {
        let mut service = MockSearchService::new();
        service.expect_search().returning(|_, _| Ok(Vec::new()));

        let (player, _, _) = player(service);
        player.join(GUILD, CHANNEL).await.unwrap();

        let err = player.play(GUILD, "nada").await.unwrap_err();
        assert!(matches!(err, EngineError::Resolution(_)));

        let snapshot = player.snapshot(GUILD).await.unwrap();
        assert!(snapshot.current.is_none());
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn previous_downloads_again_and_plays() {
        let dir = tempfile::tempdir().unwrap();
        let original = track(dir.path(), "a", "1");
        let again = track(dir.path(), "a", "2");
        let again_path = again.local_path.clone();

        let mut service = MockSearchService::new();
        service
            .expect_download()
            .withf(|url| url == "https://youtu.be/a")
            .times(1)
            .returning(move |_| Ok(original.clone()));
        service
            .expect_download()
            .withf(|url| url == "https://www.youtube.com/watch?v=a")
            .times(1)
            .returning(move |_| Ok(again.clone()));

        let (player, transports, reclaimer) = player(service);
        player.join(GUILD, CHANNEL).await.unwrap();
        assert!(matches!(player.previous(GUILD).await, Err(EngineError::NoPrevious)));

        let (song, _) = player.play(GUILD, "https://youtu.be/a").await.unwrap();
        transports.get(GUILD).finish();
        player.snapshot(GUILD).await.unwrap();
        assert_eq!(reclaimer.count_for(&song.local_path), 1);

        let fresh = player.previous(GUILD).await.unwrap();
        assert_eq!(fresh.local_path, again_path);

        let now = player.now_playing(GUILD).await.unwrap().unwrap();
        assert_eq!(now.song.local_path, again_path);
    }

    #[tokio::test]
    async fn volume_is_clamped() {
        let (player, _, _) = player(MockSearchService::new());
        assert_eq!(player.set_volume(GUILD, 250).await.unwrap().percent(), 100);
        assert_eq!(player.set_volume(GUILD, 35).await.unwrap().percent(), 35);
        assert_eq!(player.volume(GUILD).await.unwrap().percent(), 35);
    }

    #[tokio::test]
    async fn disconnect_for_unknown_guild_is_ignored() {
        let (player, _, _) = player(MockSearchService::new());
        player.handle_disconnect(GUILD);
        assert!(player.sessions.get(GUILD).is_none());
    }

    #[tokio::test]
    async fn only_connected_sessions_are_counted() {
        let (player, _, _) = player(MockSearchService::new());
        player.join(GUILD, CHANNEL).await.unwrap();
        player.join(GuildId::new(7), CHANNEL).await.unwrap();
        player.toggle_stay(GuildId::new(8)).await.unwrap();
        assert_eq!(player.connected_sessions().await, 2);

        player.leave(GuildId::new(7)).await.unwrap();
        assert_eq!(player.connected_sessions().await, 1);
    }
}
