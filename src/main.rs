use anyhow::Result;
use dashmap::DashMap;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;

use crate::audio::{
    player::AudioPlayer,
    reclaim::{self, FileReclaimer},
    session::{SessionRegistry, SessionSettings},
    transport::SongbirdProvider,
};
use crate::bot::{AnnounceChannels, MusicBot};
use crate::config::Config;
use crate::sources::{Resolver, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vibe_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    info!("🎵 Iniciando Vibe Music v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    if let Err(e) = reclaim::purge_stale_downloads(&config.download_dir).await {
        warn!("⚠️ No se pudo limpiar {}: {}", config.download_dir.display(), e);
    }

    let ytdlp = Arc::new(YtDlpClient::new(&config));
    if let Err(e) = ytdlp.verify_dependencies().await {
        warn!("⚠️ Dependencias de audio incompletas: {:?}", e);
    }

    // Motor de reproducción
    let songbird = Songbird::serenity();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let sessions = Arc::new(SessionRegistry::new(
        SessionSettings::from(&config),
        Arc::new(SongbirdProvider::new(songbird.clone())),
        Arc::new(FileReclaimer),
        Some(events_tx),
    ));
    let resolver = Arc::new(Resolver::new(ytdlp, config.search_result_limit));
    let player = Arc::new(AudioPlayer::new(sessions, resolver));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let announce: AnnounceChannels = Arc::new(DashMap::new());
    let handler = MusicBot::new(config.clone(), player, announce.clone());

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(bot::events::run_event_listener(
        client.http.clone(),
        announce,
        events_rx,
    ));

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Sin token también se puede verificar yt-dlp y ffmpeg
    dotenvy::dotenv().ok();
    let config = Config::from_vars(|key| std::env::var(key).ok()).unwrap_or_default();

    YtDlpClient::new(&config).verify_dependencies().await?;
    println!("OK");
    Ok(())
}
