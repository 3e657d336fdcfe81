//! Per-guild session actor and the registry that owns them.
//!
//! Every guild gets one task that owns its [`MusicQueue`] and processes
//! [`SessionCommand`]s strictly in order. Nothing else mutates the queue, so
//! two advances can never overlap: a skip and a natural track end both arrive
//! as messages and are handled one after the other.

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, error, info, warn};

use super::{
    error::EngineError,
    queue::{Advance, MusicQueue, QueueSnapshot, Song},
    reaper::{self, IdleTimer},
    reclaim::ResourceReclaimer,
    transport::{PlaybackCompletion, TransportProvider, VoiceTransport},
    volume::Volume,
};
use crate::config::Config;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    LoopSong,
    RepeatQueue,
    Stay,
    Autoplay,
}

/// Resultado de agregar una canción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Posición (1-indexada) en la cola al momento de agregarla
    pub position: usize,
    /// La canción empezó a sonar inmediatamente
    pub started: bool,
}

/// Notifications for the user-facing layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    NowPlaying { guild_id: GuildId, song: Song },
    PlaybackFailed { guild_id: GuildId, song: Song, error: String },
    QueueFinished { guild_id: GuildId },
    IdleDisconnected { guild_id: GuildId },
}

impl PlayerEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            PlayerEvent::NowPlaying { guild_id, .. }
            | PlayerEvent::PlaybackFailed { guild_id, .. }
            | PlayerEvent::QueueFinished { guild_id }
            | PlayerEvent::IdleDisconnected { guild_id } => *guild_id,
        }
    }
}

pub(crate) enum SessionCommand {
    Join { channel_id: ChannelId, reply: Reply<()> },
    Leave { reply: Reply<usize> },
    Disconnected,
    Enqueue { song: Song, autostart: bool, reply: Reply<Enqueued> },
    TrackEnded { play_id: u64 },
    Skip { reply: Reply<()> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    Toggle { toggle: Toggle, reply: Reply<bool> },
    PreviousSong { reply: Reply<Song> },
    RestorePrevious { song: Song, reply: Reply<()> },
    SetVolume { volume: Volume, reply: Reply<Volume> },
    Snapshot { reply: Reply<QueueSnapshot> },
    IdleCheck,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_queue_size: usize,
    pub history_size: usize,
    pub default_volume: Volume,
    pub idle_timeout: Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            history_size: config.history_size,
            default_volume: Volume::new(config.default_volume),
            idle_timeout: config.idle_timeout,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Cheap, cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    sender: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .map_err(|_| EngineError::SessionClosed(self.guild_id))?;
        rx.await
            .map_err(|_| EngineError::SessionClosed(self.guild_id))?
    }

    pub async fn join(&self, channel_id: ChannelId) -> Result<(), EngineError> {
        self.request(|reply| SessionCommand::Join { channel_id, reply }).await
    }

    /// Vacía la sesión y desconecta. Devuelve cuántas canciones se descartaron.
    pub async fn leave(&self) -> Result<usize, EngineError> {
        self.request(|reply| SessionCommand::Leave { reply }).await
    }

    /// The voice connection went away without us asking.
    pub fn disconnected(&self) {
        if self.sender.send(SessionCommand::Disconnected).is_err() {
            debug!("Sesión {} ya cerrada", self.guild_id);
        }
    }

    /// Appends `song`. With `autostart`, playback begins right away when the
    /// session is idle; the session must be connected in that case.
    pub async fn enqueue(&self, song: Song, autostart: bool) -> Result<Enqueued, EngineError> {
        self.request(|reply| SessionCommand::Enqueue { song, autostart, reply })
            .await
    }

    pub async fn skip(&self) -> Result<(), EngineError> {
        self.request(|reply| SessionCommand::Skip { reply }).await
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.request(|reply| SessionCommand::Resume { reply }).await
    }

    pub async fn toggle(&self, toggle: Toggle) -> Result<bool, EngineError> {
        self.request(|reply| SessionCommand::Toggle { toggle, reply }).await
    }

    pub async fn previous_song(&self) -> Result<Song, EngineError> {
        self.request(|reply| SessionCommand::PreviousSong { reply }).await
    }

    /// Puts `song` at the front of the queue. If something is playing it is
    /// stopped and the regular completion path picks `song` up; otherwise
    /// playback starts immediately.
    pub async fn restore_previous(&self, song: Song) -> Result<(), EngineError> {
        self.request(|reply| SessionCommand::RestorePrevious { song, reply })
            .await
    }

    pub async fn set_volume(&self, volume: Volume) -> Result<Volume, EngineError> {
        self.request(|reply| SessionCommand::SetVolume { volume, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, EngineError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }
}

/// Guild id -> session, created on first lookup and kept for the life of the
/// process.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    settings: SessionSettings,
    transports: Arc<dyn TransportProvider>,
    reclaimer: Arc<dyn ResourceReclaimer>,
    events: Option<mpsc::UnboundedSender<PlayerEvent>>,
}

impl SessionRegistry {
    pub fn new(
        settings: SessionSettings,
        transports: Arc<dyn TransportProvider>,
        reclaimer: Arc<dyn ResourceReclaimer>,
        events: Option<mpsc::UnboundedSender<PlayerEvent>>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            settings,
            transports,
            reclaimer,
            events,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| self.spawn(guild_id))
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    fn spawn(&self, guild_id: GuildId) -> SessionHandle {
        let (sender, receiver) = mpsc::unbounded_channel();

        let actor = SessionActor {
            guild_id,
            queue: MusicQueue::new(
                self.settings.max_queue_size,
                self.settings.history_size,
                self.settings.default_volume,
            ),
            transport: self.transports.transport_for(guild_id),
            reclaimer: self.reclaimer.clone(),
            events: self.events.clone(),
            sender: sender.downgrade(),
            idle_timeout: self.settings.idle_timeout,
            idle: IdleTimer::default(),
            connected: false,
            play_seq: 0,
            active_play: None,
        };

        info!("🆕 Sesión creada para guild {}", guild_id);
        tokio::spawn(actor.run(receiver));

        SessionHandle { guild_id, sender }
    }
}

struct SessionActor {
    guild_id: GuildId,
    queue: MusicQueue,
    transport: Arc<dyn VoiceTransport>,
    reclaimer: Arc<dyn ResourceReclaimer>,
    events: Option<mpsc::UnboundedSender<PlayerEvent>>,
    /// Débil para que la sesión termine cuando el registro suelta su handle
    sender: mpsc::WeakUnboundedSender<SessionCommand>,
    idle_timeout: Duration,
    idle: IdleTimer,
    connected: bool,
    play_seq: u64,
    /// Play id whose completion is allowed to advance the queue.
    active_play: Option<u64>,
}

impl SessionActor {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<SessionCommand>) {
        while let Some(command) = receiver.recv().await {
            self.handle(command).await;
        }
        debug!("Sesión de guild {} finalizada", self.guild_id);
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join { channel_id, reply } => {
                let _ = reply.send(self.join(channel_id).await);
            }
            SessionCommand::Leave { reply } => {
                let _ = reply.send(self.leave().await);
            }
            SessionCommand::Disconnected => self.on_disconnected().await,
            SessionCommand::Enqueue { song, autostart, reply } => {
                let _ = reply.send(self.enqueue(song, autostart).await);
            }
            SessionCommand::TrackEnded { play_id } => self.on_track_ended(play_id).await,
            SessionCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            SessionCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            SessionCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            SessionCommand::Toggle { toggle, reply } => {
                let enabled = match toggle {
                    Toggle::LoopSong => self.queue.toggle_loop_song(),
                    Toggle::RepeatQueue => self.queue.toggle_repeat_queue(),
                    Toggle::Stay => self.queue.toggle_stay(),
                    Toggle::Autoplay => self.queue.toggle_autoplay(),
                };
                // Sin 24/7 y sin nada sonando, vuelve a correr el reloj de inactividad
                if toggle == Toggle::Stay && !enabled && self.queue.current().is_none() {
                    self.on_exhausted();
                }
                let _ = reply.send(Ok(enabled));
            }
            SessionCommand::PreviousSong { reply } => {
                let _ = reply.send(self.queue.previous().cloned().ok_or(EngineError::NoPrevious));
            }
            SessionCommand::RestorePrevious { song, reply } => {
                let _ = reply.send(self.restore_previous(song).await);
            }
            SessionCommand::SetVolume { volume, reply } => {
                let _ = reply.send(self.set_volume(volume).await);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.queue.snapshot(self.connected)));
            }
            SessionCommand::IdleCheck => self.on_idle_check().await,
        }
    }

    async fn join(&mut self, channel_id: ChannelId) -> Result<(), EngineError> {
        self.transport
            .connect(channel_id)
            .await
            .map_err(EngineError::transport)?;
        self.connected = true;
        Ok(())
    }

    async fn leave(&mut self) -> Result<usize, EngineError> {
        let was_connected = self.connected;
        let dropped = self.clear().await;

        if !was_connected {
            return Err(EngineError::TransportUnavailable);
        }

        self.transport
            .disconnect()
            .await
            .map_err(EngineError::transport)?;
        Ok(dropped)
    }

    async fn on_disconnected(&mut self) {
        if self.connected || self.queue.current().is_some() {
            warn!("🔌 Conexión de voz perdida en guild {}", self.guild_id);
        }
        self.clear().await;
    }

    /// Empties the session, stops playback and reclaims every file still owned
    /// by the queue. Any completion still in flight becomes stale.
    async fn clear(&mut self) -> usize {
        let owned = self.queue.clear();
        self.active_play = None;
        self.idle.clear();

        if self.connected && (self.transport.is_playing().await || self.transport.is_paused().await) {
            if let Err(e) = self.transport.stop().await {
                warn!("⚠️ No se pudo detener la reproducción: {:?}", e);
            }
        }
        self.connected = false;

        join_all(owned.iter().map(|song| self.reclaimer.reclaim(song))).await;
        owned.len()
    }

    async fn enqueue(&mut self, song: Song, autostart: bool) -> Result<Enqueued, EngineError> {
        let rejected = if autostart && !self.connected {
            Some(EngineError::TransportUnavailable)
        } else {
            None
        };

        let position = match rejected {
            Some(err) => Err(err),
            None => self.queue.enqueue(song.clone()).map_err(EngineError::from),
        };

        let position = match position {
            Ok(position) => position,
            Err(err) => {
                // La canción nunca entró a la cola: su archivo no tiene dueño
                self.reclaimer.reclaim(&song).await;
                return Err(err);
            }
        };

        let started = if autostart && self.queue.current().is_none() {
            self.advance().await;
            self.queue.current().is_some_and(|current| *current == song)
        } else {
            false
        };

        Ok(Enqueued { position, started })
    }

    async fn on_track_ended(&mut self, play_id: u64) {
        if self.active_play != Some(play_id) {
            debug!(
                "Fin de reproducción {} ignorado en guild {} (obsoleto)",
                play_id, self.guild_id
            );
            return;
        }

        self.active_play = None;
        self.advance().await;
    }

    /// The single advance routine. Retires or requeues the current song,
    /// then starts the next one; songs the transport refuses are dropped
    /// and the following one is tried.
    async fn advance(&mut self) {
        loop {
            let step = self.queue.advance(Utc::now());
            if let Some(retired) = step.retired() {
                self.reclaimer.reclaim(retired).await;
            }

            match step {
                Advance::Started { next, .. } => match self.start(&next).await {
                    Ok(()) => {
                        info!("🎵 Reproduciendo: {} en guild {}", next.title, self.guild_id);
                        self.emit(PlayerEvent::NowPlaying {
                            guild_id: self.guild_id,
                            song: next,
                        });
                        return;
                    }
                    Err(e) => {
                        error!("❌ No se pudo reproducir {}: {:?}", next.title, e);
                        if let Some(failed) = self.queue.abandon_current() {
                            self.reclaimer.reclaim(&failed).await;
                        }
                        self.emit(PlayerEvent::PlaybackFailed {
                            guild_id: self.guild_id,
                            song: next,
                            error: e.to_string(),
                        });
                    }
                },
                Advance::Exhausted { .. } => {
                    self.active_play = None;
                    self.emit(PlayerEvent::QueueFinished {
                        guild_id: self.guild_id,
                    });
                    self.on_exhausted();
                    return;
                }
            }
        }
    }

    async fn start(&mut self, song: &Song) -> anyhow::Result<()> {
        let sender = self
            .sender
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("La sesión se está cerrando"))?;

        self.play_seq += 1;
        let play_id = self.play_seq;
        let completion = PlaybackCompletion::new(sender, play_id);

        self.transport
            .play(&song.local_path, self.queue.volume().multiplier(), completion)
            .await?;

        self.active_play = Some(play_id);
        self.idle.clear();
        Ok(())
    }

    fn on_exhausted(&mut self) {
        if self.queue.stay_connected() || !self.connected {
            return;
        }

        self.idle.mark(Instant::now());
        if let Some(sender) = self.sender.upgrade() {
            reaper::schedule(sender, self.guild_id, self.idle_timeout);
        }
    }

    async fn on_idle_check(&mut self) {
        if !self.connected
            || self.queue.current().is_some()
            || self.queue.stay_connected()
            || !self.idle.expired(Instant::now(), self.idle_timeout)
        {
            return;
        }

        if self.transport.is_playing().await {
            return;
        }

        info!("💤 Desconectando guild {} por inactividad", self.guild_id);
        if let Err(e) = self.transport.disconnect().await {
            warn!("⚠️ Error al desconectar por inactividad: {:?}", e);
        }
        self.connected = false;
        self.idle.clear();
        self.emit(PlayerEvent::IdleDisconnected {
            guild_id: self.guild_id,
        });
    }

    async fn skip(&mut self) -> Result<(), EngineError> {
        if self.queue.current().is_none() {
            return Err(EngineError::NothingPlaying);
        }

        // La notificación de fin hará avanzar la cola
        self.transport.stop().await.map_err(EngineError::transport)
    }

    async fn pause(&mut self) -> Result<(), EngineError> {
        if self.queue.current().is_none() || !self.transport.is_playing().await {
            return Err(EngineError::NothingPlaying);
        }
        self.transport.pause().await.map_err(EngineError::transport)
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        if self.queue.current().is_none() || !self.transport.is_paused().await {
            return Err(EngineError::NothingPaused);
        }
        self.transport.resume().await.map_err(EngineError::transport)
    }

    async fn restore_previous(&mut self, song: Song) -> Result<(), EngineError> {
        self.queue.push_front(song);

        if self.queue.current().is_some() {
            self.transport.stop().await.map_err(EngineError::transport)?;
        } else if self.connected {
            self.advance().await;
        }
        Ok(())
    }

    async fn set_volume(&mut self, volume: Volume) -> Result<Volume, EngineError> {
        self.queue.set_volume(volume);

        if self.queue.current().is_some() {
            if let Err(e) = self.transport.set_volume(volume.multiplier()).await {
                warn!("⚠️ No se pudo aplicar el volumen: {:?}", e);
            }
        }
        Ok(volume)
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
