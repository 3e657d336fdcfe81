use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub default_volume: u8, // 0-100
    pub max_queue_size: usize,
    pub history_size: usize,

    // Búsqueda y descarga
    pub search_result_limit: usize,
    pub ytdlp_path: String,
    pub ytdlp_cookies: Option<PathBuf>,
    #[serde(with = "humantime_serde_compat")]
    pub ytdlp_timeout: Duration,

    // Paths
    pub download_dir: PathBuf,

    // Inactividad
    #[serde(with = "humantime_serde_compat")]
    pub idle_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_vars(|key| std::env::var(key).ok())?;

        // Crear directorio de descargas si no existe
        std::fs::create_dir_all(&config.download_dir).with_context(|| {
            format!(
                "No se pudo crear el directorio de descargas {}",
                config.download_dir.display()
            )
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// `load` passes the process environment; tests pass a map.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            command_prefix: var("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            default_volume: match var("DEFAULT_VOLUME") {
                Some(v) => v.parse().context("DEFAULT_VOLUME inválido")?,
                None => defaults.default_volume,
            },
            max_queue_size: match var("MAX_QUEUE_SIZE") {
                Some(v) => v.parse().context("MAX_QUEUE_SIZE inválido")?,
                None => defaults.max_queue_size,
            },
            history_size: match var("HISTORY_SIZE") {
                Some(v) => v.parse().context("HISTORY_SIZE inválido")?,
                None => defaults.history_size,
            },

            search_result_limit: match var("SEARCH_RESULT_LIMIT") {
                Some(v) => v.parse().context("SEARCH_RESULT_LIMIT inválido")?,
                None => defaults.search_result_limit,
            },
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            ytdlp_cookies: var("YTDLP_COOKIES").map(PathBuf::from),
            ytdlp_timeout: match var("YTDLP_TIMEOUT") {
                Some(v) => humantime::parse_duration(&v).context("YTDLP_TIMEOUT inválido")?,
                None => defaults.ytdlp_timeout,
            },

            download_dir: var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),

            idle_timeout: match var("IDLE_TIMEOUT") {
                Some(v) => humantime::parse_duration(&v).context("IDLE_TIMEOUT inválido")?,
                None => defaults.idle_timeout,
            },
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be between 0 and 100
    /// - Queue and search limits must be greater than 0
    /// - A history size of 0 disables the history
    /// - The command prefix cannot be empty
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            anyhow::bail!("Default volume must be between 0 and 100, got: {}", self.default_volume);
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.search_result_limit == 0 {
            anyhow::bail!("Search result limit must be greater than 0");
        }

        if self.ytdlp_timeout.is_zero() {
            anyhow::bail!("yt-dlp timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {}\n  \
            Audio: {}% vol, {} queue, {} history\n  \
            Search: top {} for links, yt-dlp '{}' (timeout {}, cookies: {})\n  \
            Downloads: {}\n  \
            Idle disconnect: {}",
            self.command_prefix,
            self.default_volume,
            self.max_queue_size,
            self.history_size,
            self.search_result_limit,
            self.ytdlp_path,
            humantime::format_duration(self.ytdlp_timeout),
            self.ytdlp_cookies.is_some(),
            self.download_dir.display(),
            humantime::format_duration(self.idle_timeout),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (el token no tiene valor por defecto)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            default_volume: 100,
            max_queue_size: 1000,
            history_size: 10,

            search_result_limit: 5,
            ytdlp_path: "yt-dlp".to_string(),
            ytdlp_cookies: None,
            ytdlp_timeout: Duration::from_secs(120),

            download_dir: "./downloads".into(),

            idle_timeout: Duration::from_secs(180), // 3 minutos
        }
    }
}

/// Serializes durations as humantime strings ("3m", "120s").
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_vars(vars(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.default_volume, 100);
        assert_eq!(config.history_size, 10);
        assert_eq!(config.search_result_limit, 5);
        assert_eq!(config.idle_timeout, Duration::from_secs(180));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::from_vars(vars(&[])).is_err());
        assert!(Config::from_vars(vars(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn durations_use_humantime_syntax() {
        let config = Config::from_vars(vars(&[
            ("DISCORD_TOKEN", "abc"),
            ("IDLE_TIMEOUT", "5m"),
            ("YTDLP_TIMEOUT", "45s"),
        ]))
        .unwrap();

        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.ytdlp_timeout, Duration::from_secs(45));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.default_volume = 150;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.command_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_history_size_is_accepted() {
        let mut config = Config::default();
        config.history_size = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn summary_never_leaks_the_token() {
        let mut config = Config::default();
        config.discord_token = "super-secret".to_string();
        assert!(!config.summary().contains("super-secret"));
    }

    #[test]
    fn durations_serialize_as_humantime() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["idle_timeout"], "3m");
        assert_eq!(json["ytdlp_timeout"], "2m");

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back.idle_timeout, Duration::from_secs(180));
    }
}
