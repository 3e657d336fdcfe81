use serenity::{builder::CreateEmbed, builder::CreateMessage, http::Http};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AnnounceChannels;
use crate::{audio::session::PlayerEvent, ui::embeds};

/// Publica los eventos del reproductor en el último canal usado por cada guild
pub async fn run_event_listener(
    http: Arc<Http>,
    announce: AnnounceChannels,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
) {
    info!("📣 Escuchando eventos del reproductor");

    while let Some(event) = events.recv().await {
        let guild_id = event.guild_id();
        let Some(channel_id) = announce.get(&guild_id).map(|c| *c) else {
            debug!("Sin canal de anuncios para guild {}", guild_id);
            continue;
        };

        let message = CreateMessage::new().embed(render_event(&event));
        if let Err(e) = channel_id.send_message(&http, message).await {
            warn!("⚠️ No se pudo anunciar en guild {}: {:?}", guild_id, e);
        }
    }

    info!("📣 Canal de eventos cerrado");
}

fn render_event(event: &PlayerEvent) -> CreateEmbed {
    match event {
        PlayerEvent::NowPlaying { song, .. } => embeds::create_now_playing_embed(song, None),
        PlayerEvent::PlaybackFailed { song, error, .. } => embeds::create_error_embed(
            "No se pudo reproducir",
            &format!("**{}** se omitió: {}", song.title, error),
        ),
        PlayerEvent::QueueFinished { .. } => embeds::create_info_embed(
            "Cola terminada",
            "📭 No hay más canciones en la cola",
        ),
        PlayerEvent::IdleDisconnected { .. } => embeds::create_info_embed(
            "Desconectado por inactividad",
            "💤 Me fui del canal de voz porque no había nada sonando",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::song;
    use serenity::model::id::GuildId;

    #[test]
    fn events_render_with_song_titles() {
        let guild_id = GuildId::new(5);

        let now = serde_json::to_string(&render_event(&PlayerEvent::NowPlaying {
            guild_id,
            song: song("a"),
        }))
        .unwrap();
        assert!(now.contains("Canción a"));

        let failed = serde_json::to_string(&render_event(&PlayerEvent::PlaybackFailed {
            guild_id,
            song: song("b"),
            error: "archivo corrupto".into(),
        }))
        .unwrap();
        assert!(failed.contains("Canción b"));
        assert!(failed.contains("archivo corrupto"));

        let idle = serde_json::to_string(&render_event(&PlayerEvent::IdleDisconnected { guild_id }))
            .unwrap();
        assert!(idle.contains("inactividad"));
    }
}
