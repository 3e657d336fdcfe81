use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info};

use super::{commands::Command, MusicBot};
use crate::{
    audio::error::EngineError,
    ui::embeds,
};

/// Ejecuta un comando ya parseado y responde en el canal del mensaje
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: Command,
    bot: &MusicBot,
) -> Result<()> {
    let voice_channel = get_user_voice_channel(ctx, guild_id, msg.author.id);

    let reply = if command.requires_voice() && voice_channel.is_none() {
        Some(embeds::create_error_embed(
            "Sin canal de voz",
            "Debes estar en un canal de voz para usar este comando",
        ))
    } else {
        match run(ctx, msg, guild_id, voice_channel, command, bot).await {
            Ok(reply) => reply,
            Err(e) => {
                info!("⚠️ Comando rechazado en guild {}: {}", guild_id, e);
                Some(engine_error_embed(&e))
            }
        }
    };

    if let Some(embed) = reply {
        msg.channel_id
            .send_message(&ctx.http, CreateMessage::new().embed(embed))
            .await?;
    }

    Ok(())
}

async fn run(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    voice_channel: Option<ChannelId>,
    command: Command,
    bot: &MusicBot,
) -> Result<Option<CreateEmbed>, EngineError> {
    let player = &bot.player;

    let embed = match command {
        Command::Join => {
            let channel_id = voice_channel.ok_or(EngineError::TransportUnavailable)?;
            player.join(guild_id, channel_id).await?;
            embeds::create_success_embed("Conectado", &format!("🔊 Conectado a <#{}>", channel_id))
        }
        Command::Leave => {
            let dropped = player.leave(guild_id).await?;
            embeds::create_success_embed(
                "Desconectado",
                &format!("👋 Hasta luego. Se descartaron {} canciones", dropped),
            )
        }
        Command::Play(query) => {
            ensure_connected(guild_id, voice_channel, bot).await?;

            if let Err(e) = msg.channel_id.broadcast_typing(&ctx.http).await {
                debug!("No se pudo mostrar 'escribiendo': {:?}", e);
            }

            let (song, enqueued) = player.play(guild_id, &query).await?;
            if enqueued.started {
                // El anuncio de "reproduciendo" llega por el canal de eventos
                return Ok(None);
            }
            embeds::create_track_added_embed(&song, enqueued.position)
        }
        Command::Skip => {
            player.skip(guild_id).await?;
            embeds::create_success_embed("Saltada", "⏭️ Pasando a la siguiente canción")
        }
        Command::Pause => {
            player.pause(guild_id).await?;
            embeds::create_success_embed("Pausado", "⏸️ Reproducción en pausa")
        }
        Command::Resume => {
            player.resume(guild_id).await?;
            embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada")
        }
        Command::Loop => {
            let enabled = player.toggle_loop_song(guild_id).await?;
            embeds::create_toggle_embed("🔂 Repetir canción", enabled)
        }
        Command::Repeat => {
            let enabled = player.toggle_repeat_queue(guild_id).await?;
            embeds::create_toggle_embed("🔁 Repetir cola", enabled)
        }
        Command::Stay => {
            let enabled = player.toggle_stay(guild_id).await?;
            embeds::create_toggle_embed("🌙 Modo 24/7", enabled)
        }
        Command::Autoplay => {
            let enabled = player.toggle_autoplay(guild_id).await?;
            embeds::create_toggle_embed("🎲 Autoplay", enabled)
        }
        Command::Previous => {
            ensure_connected(guild_id, voice_channel, bot).await?;
            let song = player.previous(guild_id).await?;
            embeds::create_success_embed("Anterior", &format!("⏮️ Volviendo a **{}**", song.title))
        }
        Command::Queue(page) => {
            let snapshot = player.snapshot(guild_id).await?;
            embeds::create_queue_embed(&snapshot, page, bot.prefix())
        }
        Command::NowPlaying => match player.now_playing(guild_id).await? {
            Some(now) => embeds::create_now_playing_embed(&now.song, Some(&now.progress)),
            None => embeds::create_info_embed("Nada sonando", "No se está reproduciendo nada"),
        },
        Command::Volume(None) => embeds::create_volume_embed(player.volume(guild_id).await?),
        Command::Volume(Some(level)) => {
            embeds::create_volume_embed(player.set_volume(guild_id, level).await?)
        }
        Command::Status => {
            let snapshot = player.snapshot(guild_id).await?;
            embeds::create_status_embed(&snapshot, player.connected_sessions().await)
        }
        Command::Help => embeds::create_help_embed(bot.prefix()),
    };

    Ok(Some(embed))
}

/// Se une al canal del autor si el bot todavía no está conectado
async fn ensure_connected(
    guild_id: GuildId,
    voice_channel: Option<ChannelId>,
    bot: &MusicBot,
) -> Result<(), EngineError> {
    if bot.player.snapshot(guild_id).await?.connected {
        return Ok(());
    }

    let channel_id = voice_channel.ok_or(EngineError::TransportUnavailable)?;
    bot.player.join(guild_id, channel_id).await
}

fn error_title(err: &EngineError) -> &'static str {
    match err {
        EngineError::NoPrevious => "Sin canción anterior",
        EngineError::TransportUnavailable => "Sin conexión",
        EngineError::NothingPlaying => "Nada sonando",
        EngineError::NothingPaused => "Nada en pausa",
        EngineError::QueueFull(_) => "Cola llena",
        EngineError::Resolution(_) => "Canción no encontrada",
        EngineError::Transport(_) => "Error de voz",
        EngineError::SessionClosed(_) => "Sesión cerrada",
    }
}

fn engine_error_embed(err: &EngineError) -> CreateEmbed {
    embeds::create_error_embed(error_title(err), &err.to_string())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::QueueFull;
    use crate::sources::ResolutionError;

    #[test]
    fn every_engine_error_has_a_title() {
        let errors = [
            EngineError::NoPrevious,
            EngineError::TransportUnavailable,
            EngineError::NothingPlaying,
            EngineError::NothingPaused,
            EngineError::QueueFull(QueueFull { max: 3 }),
            EngineError::Resolution(ResolutionError::NoCandidate("x".into())),
            EngineError::transport("timeout"),
            EngineError::SessionClosed(GuildId::new(1)),
        ];

        for err in &errors {
            let rendered = serde_json::to_string(&engine_error_embed(err)).unwrap();
            assert!(rendered.contains(error_title(err)));
            assert!(rendered.contains(&err.to_string()));
        }
    }
}
