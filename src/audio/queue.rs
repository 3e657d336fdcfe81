use chrono::{DateTime, Utc};
use std::{collections::VecDeque, path::PathBuf, time::Duration};
use tracing::{debug, info};

use super::{history::History, volume::Volume};

/// A resolved, downloaded song.
///
/// The file at `local_path` belongs to this song alone and is deleted when the
/// song is retired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub local_path: PathBuf,
    /// 0 cuando la duración es desconocida
    pub duration_secs: u64,
}

impl Song {
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Repite la canción actual (reinsertada al frente)
    Track,
    /// Repite la cola completa (reinsertada al final)
    Queue,
}

/// Result of one advance step.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// `next` is now current. `retired` needs its file reclaimed.
    Started { next: Song, retired: Option<Song> },
    /// Nothing left to play; `current` is empty.
    Exhausted { retired: Option<Song> },
}

impl Advance {
    pub fn retired(&self) -> Option<&Song> {
        match self {
            Advance::Started { retired, .. } | Advance::Exhausted { retired } => retired.as_ref(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("La cola está llena (máximo {max} canciones)")]
pub struct QueueFull {
    pub max: usize,
}

/// Per-guild queue state. Pure: no I/O, no clocks except the `now` callers
/// pass in, so every transition is deterministic.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Song>,
    current: Option<Song>,
    previous: Option<Song>,
    history: History,
    loop_mode: LoopMode,
    stay_connected: bool,
    autoplay: bool,
    started_at: Option<DateTime<Utc>>,
    volume: Volume,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize, history_size: usize, volume: Volume) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            previous: None,
            history: History::new(history_size),
            loop_mode: LoopMode::Off,
            stay_connected: false,
            autoplay: false,
            started_at: None,
            volume,
            max_size,
        }
    }

    /// Agrega una canción al final de la cola
    pub fn enqueue(&mut self, song: Song) -> Result<usize, QueueFull> {
        if self.items.len() >= self.max_size {
            return Err(QueueFull { max: self.max_size });
        }

        info!("➕ Agregado a la cola: {}", song.title);
        self.items.push_back(song);
        Ok(self.items.len())
    }

    /// Reinserta una canción al frente (para "anterior")
    pub fn push_front(&mut self, song: Song) {
        info!("⏮️ Reinsertada al frente: {}", song.title);
        self.items.push_front(song);
    }

    /// Retires `current` and promotes the next song.
    ///
    /// With a loop mode on, the finished song goes back into the queue (front
    /// for [`LoopMode::Track`], back for [`LoopMode::Queue`]) and is not
    /// retired. Otherwise it becomes `previous`, is appended to the history
    /// and returned as `retired`. The requeue happens before the empty check,
    /// so a single looped song keeps repeating.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Advance {
        let mut retired = None;

        if let Some(prev) = self.current.take() {
            match self.loop_mode {
                LoopMode::Track => {
                    debug!("🔂 Repitiendo canción: {}", prev.title);
                    self.items.push_front(prev);
                }
                LoopMode::Queue => {
                    debug!("🔁 Canción devuelta al final por repetir cola: {}", prev.title);
                    self.items.push_back(prev);
                }
                LoopMode::Off => {
                    self.history.push(prev.clone());
                    self.previous = Some(prev.clone());
                    retired = Some(prev);
                }
            }
        }

        match self.items.pop_front() {
            Some(next) => {
                info!("➡️ Siguiente en cola: {}", next.title);
                self.current = Some(next.clone());
                self.started_at = Some(now);
                Advance::Started { next, retired }
            }
            None => {
                info!("📭 Cola vacía, no hay siguiente canción");
                self.started_at = None;
                Advance::Exhausted { retired }
            }
        }
    }

    /// Drops `current` without requeueing it; used when the transport could
    /// not start it. The song is returned for reclamation.
    pub fn abandon_current(&mut self) -> Option<Song> {
        self.started_at = None;
        self.current.take()
    }

    /// Vacía cola, actual y anterior. Devuelve las canciones cuyos archivos
    /// siguen en disco.
    pub fn clear(&mut self) -> Vec<Song> {
        let mut owned: Vec<Song> = self.current.take().into_iter().collect();
        owned.extend(self.items.drain(..));
        self.previous = None;
        self.started_at = None;
        info!("🗑️ Cola limpiada: {} canciones", owned.len());
        owned
    }

    pub fn toggle_loop_song(&mut self) -> bool {
        self.loop_mode = match self.loop_mode {
            LoopMode::Track => LoopMode::Off,
            _ => LoopMode::Track,
        };
        self.log_loop_mode();
        self.loop_mode == LoopMode::Track
    }

    pub fn toggle_repeat_queue(&mut self) -> bool {
        self.loop_mode = match self.loop_mode {
            LoopMode::Queue => LoopMode::Off,
            _ => LoopMode::Queue,
        };
        self.log_loop_mode();
        self.loop_mode == LoopMode::Queue
    }

    pub fn toggle_stay(&mut self) -> bool {
        self.stay_connected = !self.stay_connected;
        info!("📡 Modo 24/7: {}", self.stay_connected);
        self.stay_connected
    }

    pub fn toggle_autoplay(&mut self) -> bool {
        self.autoplay = !self.autoplay;
        info!("🎶 Autoplay: {}", self.autoplay);
        self.autoplay
    }

    pub fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        info!("🔊 Volumen ajustado a {}%", volume.percent());
    }

    pub fn current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&Song> {
        self.previous.as_ref()
    }

    pub fn stay_connected(&self) -> bool {
        self.stay_connected
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Copia del estado para mostrar al usuario
    pub fn snapshot(&self, connected: bool) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            items: self.items.iter().cloned().collect(),
            previous: self.previous.clone(),
            history: self.history.to_vec(),
            loop_mode: self.loop_mode,
            stay_connected: self.stay_connected,
            autoplay: self.autoplay,
            started_at: self.started_at,
            volume: self.volume,
            connected,
        }
    }

    fn log_loop_mode(&self) {
        match self.loop_mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Song>,
    pub items: Vec<Song>,
    pub previous: Option<Song>,
    pub history: Vec<Song>,
    pub loop_mode: LoopMode,
    pub stay_connected: bool,
    pub autoplay: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub volume: Volume,
    pub connected: bool,
}

impl QueueSnapshot {
    pub fn total_duration(&self) -> Duration {
        self.items
            .iter()
            .chain(self.current.iter())
            .filter_map(Song::duration)
            .sum()
    }

    /// Obtiene una página de la cola (1-indexada)
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage<'_> {
        let per_page = per_page.max(1);
        let total_pages = self.items.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(self.items.len());

        QueuePage {
            items: &self.items[start.min(end)..end],
            offset: start,
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage<'a> {
    pub items: &'a [Song],
    /// Posición (0-indexada) del primer elemento de la página en la cola
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
}
