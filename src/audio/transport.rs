//! Voice transport seam.
//!
//! The engine talks to the voice connection only through [`VoiceTransport`].
//! Completion of a `play` is reported by consuming the [`PlaybackCompletion`]
//! handed to it, which posts a message onto the owning session's command
//! channel instead of touching session state from the driver's task.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, Input},
    tracks::{ControlError, PlayMode, TrackHandle, TrackResult},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{path::Path, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::session::SessionCommand;

/// One-shot completion notification for a single `play` call.
pub struct PlaybackCompletion {
    sender: mpsc::UnboundedSender<SessionCommand>,
    play_id: u64,
}

impl PlaybackCompletion {
    pub(crate) fn new(sender: mpsc::UnboundedSender<SessionCommand>, play_id: u64) -> Self {
        Self { sender, play_id }
    }

    /// Consumes the notification; safe to call from any thread or task.
    pub fn notify(self) {
        let play_id = self.play_id;
        if self
            .sender
            .send(SessionCommand::TrackEnded { play_id })
            .is_err()
        {
            debug!("Sesión cerrada, se descarta el fin de la reproducción {}", play_id);
        }
    }
}

impl std::fmt::Debug for PlaybackCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackCompletion")
            .field("play_id", &self.play_id)
            .finish()
    }
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, channel_id: ChannelId) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Starts `path` at `volume` (0.0 - 1.0). On success `completion` fires
    /// exactly once, when the track ends, errors or is stopped.
    async fn play(&self, path: &Path, volume: f32, completion: PlaybackCompletion) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    async fn set_volume(&self, volume: f32) -> Result<()>;
}

/// Hands each new session its transport.
pub trait TransportProvider: Send + Sync {
    fn transport_for(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport>;
}

pub struct SongbirdProvider {
    manager: Arc<Songbird>,
}

impl SongbirdProvider {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

impl TransportProvider for SongbirdProvider {
    fn transport_for(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport> {
        Arc::new(SongbirdTransport {
            manager: self.manager.clone(),
            guild_id,
            track: Mutex::new(None),
        })
    }
}

/// Songbird-backed transport for one guild.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    track: Mutex<Option<TrackHandle>>,
}

impl SongbirdTransport {
    fn current_track(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current_track()?;
        track.get_info().await.ok().map(|state| state.playing)
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, channel_id: ChannelId) -> Result<()> {
        info!("🔗 Conectando al canal {} en guild {}", channel_id, self.guild_id);

        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Error al unirse al canal: {:?}", e))?;

        info!("🔊 Conectado al canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.track.lock().take();

        if self.manager.get(self.guild_id).is_some() {
            self.manager
                .remove(self.guild_id)
                .await
                .map_err(|e| anyhow::anyhow!("Error al desconectar: {:?}", e))?;
        }

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn play(&self, path: &Path, volume: f32, completion: PlaybackCompletion) -> Result<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or_else(|| anyhow::anyhow!("No hay conexión de voz en guild {}", self.guild_id))?;

        let input: Input = File::new(path.to_path_buf()).into();

        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        let notifier = TrackEndNotifier {
            guild_id: self.guild_id,
            completion: Arc::new(Mutex::new(Some(completion))),
        };
        stop_on_failure(configure(&handle, volume, notifier), || handle.stop())?;

        *self.track.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        match self.current_track() {
            Some(track) => stopped(track.stop()),
            None => Ok(()),
        }
    }

    async fn pause(&self) -> Result<()> {
        let track = self
            .current_track()
            .ok_or_else(|| anyhow::anyhow!("No hay pista activa"))?;
        track
            .pause()
            .map_err(|e| anyhow::anyhow!("Error al pausar: {}", e))
    }

    async fn resume(&self) -> Result<()> {
        let track = self
            .current_track()
            .ok_or_else(|| anyhow::anyhow!("No hay pista activa"))?;
        track
            .play()
            .map_err(|e| anyhow::anyhow!("Error al reanudar: {}", e))
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        if let Some(track) = self.current_track() {
            track
                .set_volume(volume)
                .map_err(|e| anyhow::anyhow!("Error al ajustar volumen: {}", e))?;
        }
        Ok(())
    }
}

fn configure(handle: &TrackHandle, volume: f32, notifier: TrackEndNotifier) -> Result<()> {
    handle
        .set_volume(volume)
        .map_err(|e| anyhow::anyhow!("Error al ajustar volumen: {}", e))?;

    // Fin y error comparten la misma notificación: solo la primera se envía
    handle
        .add_event(Event::Track(TrackEvent::End), notifier.clone())
        .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
    handle
        .add_event(Event::Track(TrackEvent::Error), notifier)
        .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
    Ok(())
}

/// Detiene la pista recién iniciada si no se pudo configurar, para que no
/// siga sonando sin notificación de fin.
fn stop_on_failure<T>(result: Result<T>, stop: impl FnOnce() -> TrackResult<()>) -> Result<T> {
    if result.is_err() {
        if let Err(e) = stop() {
            debug!("No se pudo detener la pista fallida: {}", e);
        }
    }
    result
}

/// Una pista que ya terminó cuenta como detenida.
fn stopped(result: TrackResult<()>) -> Result<()> {
    match result {
        Ok(()) | Err(ControlError::Finished) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Error al detener: {}", e)),
    }
}

/// Forwards the first End/Error event of a track to its session.
#[derive(Clone)]
struct TrackEndNotifier {
    guild_id: GuildId,
    completion: Arc<Mutex<Option<PlaybackCompletion>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in tracks.iter() {
                if let PlayMode::Errored(e) = &state.playing {
                    error!("❌ Error en pista para guild {}: {:?}", self.guild_id, e);
                }
            }
        }

        if let Some(completion) = self.completion.lock().take() {
            debug!("🎵 Pista terminada en guild {}", self.guild_id);
            completion.notify();
        }

        // Quitar el handler de la pista
        Some(Event::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn stopping_a_finished_track_is_not_an_error() {
        assert!(stopped(Ok(())).is_ok());
        assert!(stopped(Err(ControlError::Finished)).is_ok());
        assert!(stopped(Err(ControlError::Dropped)).is_err());
    }

    #[test]
    fn failed_setup_stops_the_track() {
        let stops = Cell::new(0);
        let result: Result<()> = stop_on_failure(Err(anyhow::anyhow!("sin handler")), || {
            stops.set(stops.get() + 1);
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(stops.get(), 1);

        // Un error al detener no oculta el error original
        let result: Result<()> = stop_on_failure(Err(anyhow::anyhow!("volumen")), || {
            Err(ControlError::Finished)
        });
        assert_eq!(result.unwrap_err().to_string(), "volumen");
    }

    #[test]
    fn successful_setup_leaves_the_track_playing() {
        let stops = Cell::new(0);
        let result = stop_on_failure(Ok(()), || {
            stops.set(stops.get() + 1);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(stops.get(), 0);
    }
}
