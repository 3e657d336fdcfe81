use serenity::model::id::GuildId;
use thiserror::Error;

use super::queue::QueueFull;
use crate::sources::ResolutionError;

/// Errores del motor de reproducción que se reportan al usuario.
///
/// None of these leave the session in a partially mutated state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No hay una canción anterior disponible")]
    NoPrevious,

    #[error("El bot no está conectado a un canal de voz")]
    TransportUnavailable,

    #[error("No se está reproduciendo nada")]
    NothingPlaying,

    #[error("No hay nada en pausa")]
    NothingPaused,

    #[error(transparent)]
    QueueFull(#[from] QueueFull),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Error en la conexión de voz: {0}")]
    Transport(String),

    #[error("La sesión del servidor {0} ya no está disponible")]
    SessionClosed(GuildId),
}

impl EngineError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}
