use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    progress::Progress,
    queue::{LoopMode, QueueSnapshot, Song},
    volume::Volume,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Vibe Music";

const ITEMS_PER_PAGE: usize = 10;

fn duration_label(song: &Song) -> String {
    match song.duration() {
        Some(duration) => format_duration(duration),
        None => "Desconocida".to_string(),
    }
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(song: &Song, progress: Option<&Progress>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", song.title))
        .color(colors::MUSIC_PURPLE);

    match progress {
        Some(progress) => {
            let elapsed = format_duration(Duration::from_secs(progress.elapsed_secs));
            let value = match &progress.bar {
                Some(bar) => format!("`{}` {} / {}", bar, elapsed, duration_label(song)),
                None => format!("{} transcurrido", elapsed),
            };
            embed = embed.field("⏱️ Progreso", value, false);
        }
        None => {
            embed = embed.field("⏱️ Duración", duration_label(song), true);
        }
    }

    if song.source_url.starts_with("http") {
        embed = embed.url(&song.source_url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(song: &Song, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!(
            "**{}** se ha agregado a la cola de reproducción",
            song.title
        ))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(song), true)
        .field("📍 Posición", position.to_string(), true);

    if song.source_url.starts_with("http") {
        embed = embed.url(&song.source_url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente cuando llegue su turno",
        ))
}

fn loop_label(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "➡️ Desactivada",
        LoopMode::Track => "🔂 Canción",
        LoopMode::Queue => "🔁 Cola",
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "✅ Activado"
    } else {
        "❌ Desactivado"
    }
}

/// Crea un embed con una página de la cola
pub fn create_queue_embed(snapshot: &QueueSnapshot, page: usize, prefix: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.items.is_empty() {
        return embed
            .description(format!(
                "😴 **La cola está vacía**\n\n💡 Usa `{}play <canción>` para agregar música",
                prefix
            ))
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    // Canción actual
    if let Some(current) = &snapshot.current {
        let status = match snapshot.loop_mode {
            LoopMode::Track => "🔂",
            LoopMode::Queue => "🔁",
            LoopMode::Off => "▶️",
        };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}** `[{}]`", current.title, duration_label(current)),
            false,
        );
    }

    // Próximas canciones
    let queue_page = snapshot.page(page, ITEMS_PER_PAGE);
    if !queue_page.items.is_empty() {
        let description: String = queue_page
            .items
            .iter()
            .enumerate()
            .map(|(i, song)| {
                format!(
                    "**{}**. {} `[{}]`\n",
                    queue_page.offset + i + 1,
                    song.title,
                    duration_label(song)
                )
            })
            .collect();

        embed = embed.field("Próximas canciones", description, false);
    }

    // Información adicional
    let mut info = format!("**Total:** {} canciones", snapshot.items.len());
    let total = snapshot.total_duration();
    if total > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(total)));
    }
    if snapshot.loop_mode != LoopMode::Off {
        info.push_str(&format!(" • **Repetición:** {}", loop_label(snapshot.loop_mode)));
    }
    embed = embed.field("Información", info, false);

    // Paginación
    let footer = if queue_page.total_pages > 1 {
        format!(
            "Página {} de {} • Vibe Music",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

/// Crea un embed con el estado de la sesión
pub fn create_status_embed(snapshot: &QueueSnapshot, connected_guilds: usize) -> CreateEmbed {
    let current = snapshot
        .current
        .as_ref()
        .map(|song| song.title.clone())
        .unwrap_or_else(|| "Nada".to_string());
    let previous = snapshot
        .previous
        .as_ref()
        .map(|song| song.title.clone())
        .unwrap_or_else(|| "Ninguna".to_string());

    let mut embed = CreateEmbed::default()
        .title("📊 Estado del Reproductor")
        .color(colors::INFO_BLUE)
        .field(
            "🔊 Conexión",
            if snapshot.connected { "Conectado" } else { "Desconectado" },
            true,
        )
        .field("🎵 Actual", current, true)
        .field("⏮️ Anterior", previous, true)
        .field("📋 En cola", snapshot.items.len().to_string(), true)
        .field("🔁 Repetición", loop_label(snapshot.loop_mode), true)
        .field("🌙 24/7", on_off(snapshot.stay_connected), true)
        .field("🎲 Autoplay", on_off(snapshot.autoplay), true)
        .field("🔉 Volumen", format!("{}%", snapshot.volume.percent()), true)
        .field("🌐 Servidores conectados", connected_guilds.to_string(), true);

    if !snapshot.history.is_empty() {
        let history: String = snapshot
            .history
            .iter()
            .rev()
            .take(5)
            .map(|song| format!("• {}\n", song.title))
            .collect();
        embed = embed.field("🕘 Historial reciente", history, false);
    }

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed para el cambio de un modo on/off
pub fn create_toggle_embed(mode: &str, enabled: bool) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("{} {}", if enabled { "✅" } else { "⛔" }, mode))
        .description(format!(
            "**{}** está ahora {}",
            mode,
            if enabled { "activado" } else { "desactivado" }
        ))
        .color(if enabled {
            colors::SUCCESS_GREEN
        } else {
            colors::NEUTRAL_GRAY
        })
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de ayuda general
pub fn create_help_embed(prefix: &str) -> CreateEmbed {
    let p = prefix;
    CreateEmbed::default()
        .title("🎵 Vibe Music - Comandos")
        .color(colors::INFO_BLUE)
        .description("Música por servidor con cola, repetición y modo 24/7")
        .field(
            "🎵 Reproducción",
            format!(
                "• `{p}play <canción|enlace>` (`{p}p`) - Reproduce o agrega a la cola\n\
                • `{p}pause` / `{p}resume` - Pausa o reanuda\n\
                • `{p}skip` (`{p}s`) - Salta la canción actual\n\
                • `{p}previous` (`{p}prev`) - Vuelve a la canción anterior\n\
                • `{p}nowplaying` (`{p}np`) - Muestra la canción actual"
            ),
            false,
        )
        .field(
            "📜 Cola",
            format!(
                "• `{p}queue [página]` (`{p}q`) - Muestra la cola\n\
                • `{p}loop` - Repite la canción actual\n\
                • `{p}repeat` - Repite la cola completa\n\
                • `{p}autoplay` - Activa/desactiva autoplay"
            ),
            false,
        )
        .field(
            "🔊 Conexión",
            format!(
                "• `{p}join` (`{p}j`) - Conecta al canal de voz\n\
                • `{p}leave` (`{p}dc`) - Limpia la cola y desconecta\n\
                • `{p}stay` (`{p}247`) - Modo 24/7\n\
                • `{p}volume [0-100]` (`{p}v`) - Ajusta el volumen\n\
                • `{p}status` - Estado del reproductor"
            ),
            false,
        )
        .field(
            "🎵 Fuentes Soportadas",
            "• YouTube / YouTube Music\n\
            • Spotify, JioSaavn, Apple Music y Amazon Music (se buscan en YouTube)",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de volumen con indicador visual
pub fn create_volume_embed(volume: Volume) -> CreateEmbed {
    let percent = volume.percent();
    let status_emoji = match percent {
        0 => "🔇",
        1..=50 => "🔉",
        _ => "🔊",
    };

    CreateEmbed::default()
        .title(format!("{} Control de Volumen", status_emoji))
        .description(format!("**Volumen actual: {}%**", percent))
        .field("📊 Nivel", create_volume_bar(volume), false)
        .color(if percent == 0 {
            colors::WARNING_ORANGE
        } else {
            colors::INFO_BLUE
        })
        .footer(CreateEmbedFooter::new("💡 Usa volume <0-100> para ajustar"))
        .timestamp(Timestamp::now())
}

/// Crea una barra visual de volumen
fn create_volume_bar(volume: Volume) -> String {
    let segments = 20;
    let filled = (volume.percent() as usize * segments) / Volume::MAX as usize;
    let empty = segments - filled;

    let bar = "█".repeat(filled) + &"▒".repeat(empty);
    format!("`[{}]`", bar)
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{queue::MusicQueue, testing::song};
    use chrono::Utc;

    fn render(embed: &CreateEmbed) -> String {
        serde_json::to_string(embed).unwrap()
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(185)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn volume_bar_scales_to_twenty_segments() {
        assert_eq!(create_volume_bar(Volume::new(0)), format!("`[{}]`", "▒".repeat(20)));
        assert_eq!(
            create_volume_bar(Volume::new(50)),
            format!("`[{}{}]`", "█".repeat(10), "▒".repeat(10))
        );
        assert_eq!(create_volume_bar(Volume::new(100)), format!("`[{}]`", "█".repeat(20)));
    }

    #[test]
    fn help_uses_the_configured_prefix() {
        let rendered = render(&create_help_embed("?"));
        assert!(rendered.contains("?play"));
        assert!(!rendered.contains("!play"));
    }

    #[test]
    fn queue_embed_numbers_across_pages() {
        let mut queue = MusicQueue::new(100, 10, Volume::default());
        for i in 0..15 {
            queue.enqueue(song(&format!("s{}", i))).unwrap();
        }
        queue.advance(Utc::now());
        let snapshot = queue.snapshot(true);

        let rendered = render(&create_queue_embed(&snapshot, 2, "!"));
        assert!(rendered.contains("**11**. Canción s11"));
        assert!(rendered.contains("Página 2 de 2"));
    }

    #[test]
    fn empty_queue_hint() {
        let snapshot = MusicQueue::new(100, 10, Volume::default()).snapshot(false);
        assert!(render(&create_queue_embed(&snapshot, 1, "!")).contains("La cola está vacía"));
    }
}
