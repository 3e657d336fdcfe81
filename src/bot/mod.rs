//! # Bot Module
//!
//! Discord side of Vibe Music: prefix commands in, embeds out.
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. Messages are parsed
//! with [`commands::Command::parse`] and dispatched by [`handlers`]; engine
//! events (now playing, idle disconnect, ...) are posted by the background
//! listener in [`events`] to the last channel each guild used.

use dashmap::DashMap;
use serenity::{
    all::{ActivityData, ChannelId, Context, EventHandler, GuildId, Message, Ready, VoiceState},
    async_trait,
    builder::CreateMessage,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{audio::player::AudioPlayer, config::Config, ui::embeds};
use commands::Command;

/// Último canal de texto usado por guild, destino de los anuncios
pub type AnnounceChannels = Arc<DashMap<GuildId, ChannelId>>;

pub struct MusicBot {
    config: Arc<Config>,
    pub player: Arc<AudioPlayer>,
    announce: AnnounceChannels,
}

impl MusicBot {
    pub fn new(config: Config, player: Arc<AudioPlayer>, announce: AnnounceChannels) -> Self {
        Self {
            config: Arc::new(config),
            player,
            announce,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.command_prefix
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening("🎶 Vibing on Music 🎶")));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let command = match Command::parse(self.prefix(), &msg.content) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(e) => {
                let embed = embeds::create_error_embed("Comando inválido", &e.to_string());
                if let Err(e) = msg
                    .channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await
                {
                    warn!("⚠️ No se pudo responder: {:?}", e);
                }
                return;
            }
        };

        info!(
            "📝 Comando {} usado por {} en guild {}",
            command.name(),
            msg.author.name,
            guild_id
        );
        self.announce.insert(guild_id, msg.channel_id);

        if let Err(e) = handlers::handle_command(&ctx, &msg, guild_id, command, self).await {
            error!("Error manejando comando: {:?}", e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Detectar si el bot fue desconectado
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.player.handle_disconnect(guild_id);
        }
    }
}
