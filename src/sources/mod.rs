//! Turning a user request into a downloaded [`Song`].
//!
//! The [`Resolver`] owns the policy (link normalization, candidate choice,
//! file checks); the actual lookups go through a [`SearchService`] so the
//! policy can be exercised without a network.

pub mod external;
pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::queue::Song;

pub use ytdlp::YtDlpClient;

/// Canciones más cortas se consideran clips o intros
const MIN_PREFERRED_DURATION_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMetadata {
    pub title: String,
    pub uploader: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub duration_secs: u64,
    pub webpage_url: Option<String>,
}

impl Candidate {
    pub fn download_url(&self) -> String {
        self.webpage_url
            .clone()
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedTrack {
    pub id: String,
    pub title: String,
    pub duration_secs: u64,
    pub webpage_url: Option<String>,
    pub local_path: PathBuf,
}

/// Search and download backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Título y autor de un enlace, sin descargar nada
    async fn search_metadata_only(&self, query: &str) -> Result<Option<LinkMetadata>>;

    /// Text search for up to `limit` results. `query` is searched as text
    /// even when it looks like a link.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>>;

    /// Downloads `url` as audio into the download directory.
    async fn download(&self, url: &str) -> Result<DownloadedTrack>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No se encontraron resultados para: {0}")]
    NoCandidate(String),

    #[error("No se pudo descargar: {0}")]
    DownloadFailed(String),
}

/// Picks the first candidate longer than 30 seconds, then the first with any
/// known duration, then simply the first one.
pub fn select_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .find(|c| c.duration_secs > MIN_PREFERRED_DURATION_SECS)
        .or_else(|| candidates.iter().find(|c| c.duration_secs > 0))
        .or_else(|| candidates.first())
}

pub struct Resolver {
    service: Arc<dyn SearchService>,
    link_search_limit: usize,
}

impl Resolver {
    pub fn new(service: Arc<dyn SearchService>, link_search_limit: usize) -> Self {
        Self {
            service,
            link_search_limit: link_search_limit.max(1),
        }
    }

    /// Resuelve una búsqueda o enlace a una canción descargada
    pub async fn resolve(&self, query: &str) -> Result<Song, ResolutionError> {
        let query = query.trim();
        info!("🔍 Resolviendo: {}", query);

        if external::is_external_link(query) {
            let hint = self.link_hint(query).await;
            info!("🔗 Enlace externo convertido a búsqueda: {}", hint);
            return self.search_and_download(&hint, self.link_search_limit).await;
        }

        if external::is_url(query) {
            return self.download(query).await;
        }

        self.search_and_download(query, 1).await
    }

    /// Descarga otra vez una canción cuyo archivo ya fue eliminado
    pub async fn reload(&self, song: &Song) -> Result<Song, ResolutionError> {
        info!("🔄 Descargando de nuevo: {}", song.title);
        self.download(&song.source_url).await
    }

    async fn link_hint(&self, link: &str) -> String {
        match self.service.search_metadata_only(link).await {
            Ok(Some(meta)) if !meta.title.trim().is_empty() => match meta.uploader {
                Some(uploader) if !uploader.trim().is_empty() => {
                    format!("{} {}", meta.title.trim(), uploader.trim())
                }
                _ => meta.title.trim().to_string(),
            },
            Ok(_) => external::fallback_hint(link),
            Err(e) => {
                debug!("Metadatos no disponibles para {}: {:?}", link, e);
                external::fallback_hint(link)
            }
        }
    }

    async fn search_and_download(&self, query: &str, limit: usize) -> Result<Song, ResolutionError> {
        let candidates = match self.service.search(query, limit).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("⚠️ Búsqueda fallida para '{}': {:?}", query, e);
                Vec::new()
            }
        };

        let chosen = select_candidate(&candidates)
            .ok_or_else(|| ResolutionError::NoCandidate(query.to_string()))?;
        debug!("Candidato elegido: {} ({}s)", chosen.title, chosen.duration_secs);

        self.download(&chosen.download_url()).await
    }

    async fn download(&self, url: &str) -> Result<Song, ResolutionError> {
        let track = self.service.download(url).await.map_err(|e| {
            warn!("❌ Descarga fallida para {}: {:?}", url, e);
            ResolutionError::DownloadFailed(url.to_string())
        })?;

        let exists = tokio::fs::try_exists(&track.local_path)
            .await
            .unwrap_or(false);
        if !exists {
            warn!(
                "❌ El archivo descargado no existe: {}",
                track.local_path.display()
            );
            return Err(ResolutionError::DownloadFailed(url.to_string()));
        }

        info!("✅ Descargado: {} -> {}", track.title, track.local_path.display());
        Ok(Song {
            source_url: track.webpage_url.unwrap_or_else(|| url.to_string()),
            id: track.id,
            title: track.title,
            local_path: track.local_path,
            duration_secs: track.duration_secs,
        })
    }
}
