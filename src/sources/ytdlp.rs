use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, warn};

use super::{Candidate, DownloadedTrack, LinkMetadata, SearchService};
use crate::config::Config;

/// Cliente para buscar y descargar audio con yt-dlp
pub struct YtDlpClient {
    binary: String,
    cookies: Option<PathBuf>,
    download_dir: PathBuf,
    timeout: Duration,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    artist: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YtDlpInfo {
    fn duration_secs(&self) -> u64 {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0)
    }

    /// En modo `--flat-playlist` solo viene `url`
    fn page_url(&self) -> Option<String> {
        self.webpage_url
            .clone()
            .or_else(|| self.url.clone())
            .filter(|u| u.starts_with("http"))
    }

    fn title_or_id(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.id.clone())
    }

    fn into_candidate(self) -> Candidate {
        Candidate {
            duration_secs: self.duration_secs(),
            webpage_url: self.page_url(),
            title: self.title_or_id(),
            id: self.id,
        }
    }
}

impl YtDlpClient {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.ytdlp_path.clone(),
            cookies: config.ytdlp_cookies.clone(),
            download_dir: config.download_dir.clone(),
            timeout: config.ytdlp_timeout,
        }
    }

    /// Verifica que yt-dlp y ffmpeg estén disponibles
    pub async fn verify_dependencies(&self) -> Result<()> {
        let yt_dlp = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("No se pudo ejecutar {}", self.binary))?;

        if !yt_dlp.status.success() {
            anyhow::bail!("yt-dlp no disponible");
        }
        info!(
            "✅ yt-dlp versión: {}",
            String::from_utf8_lossy(&yt_dlp.stdout).trim()
        );

        let ffmpeg = Command::new("ffmpeg")
            .arg("-version")
            .output()
            .await
            .context("No se pudo ejecutar ffmpeg")?;

        if !ffmpeg.status.success() {
            anyhow::bail!("ffmpeg no disponible");
        }
        info!("✅ ffmpeg disponible");

        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--no-warnings", "--socket-timeout", "30", "--retries", "3"]);
        if let Some(cookies) = &self.cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.args(args).kill_on_drop(true);

        debug!("▶️ {} {}", self.binary, args.join(" "));

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp excedió {}s", self.timeout.as_secs()))?
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn output_template(&self, nonce: &str) -> String {
        self.download_dir
            .join(format!("song_%(id)s_{}.%(ext)s", nonce))
            .to_string_lossy()
            .into_owned()
    }

    fn downloaded_path(&self, id: &str, nonce: &str) -> PathBuf {
        downloaded_path(&self.download_dir, id, nonce)
    }
}

fn downloaded_path(dir: &Path, id: &str, nonce: &str) -> PathBuf {
    dir.join(format!("song_{}_{}.mp3", id, nonce))
}

/// Siempre una búsqueda de texto, también cuando la pista es un enlace
fn search_target(query: &str, limit: usize) -> String {
    format!("ytsearch{}:{}", limit.max(1), query)
}

/// Una línea JSON por resultado; las líneas ilegibles se ignoran
fn parse_candidates(stdout: &str) -> Vec<Candidate> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => Some(info.into_candidate()),
            Err(e) => {
                warn!("⚠️ Resultado de yt-dlp ilegible: {}", e);
                None
            }
        })
        .collect()
}

fn parse_metadata(stdout: &str) -> Result<LinkMetadata> {
    let info: YtDlpInfo =
        serde_json::from_str(stdout.trim()).context("Error al parsear respuesta de yt-dlp")?;

    Ok(LinkMetadata {
        uploader: info.artist.clone().or_else(|| info.uploader.clone()),
        title: info.title.unwrap_or_default(),
    })
}

#[async_trait]
impl SearchService for YtDlpClient {
    async fn search_metadata_only(&self, query: &str) -> Result<Option<LinkMetadata>> {
        let stdout = self
            .run(&["--dump-json", "--skip-download", "--no-playlist", query])
            .await?;
        let meta = parse_metadata(&stdout)?;
        Ok((!meta.title.trim().is_empty()).then_some(meta))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let target = search_target(query, limit);
        let stdout = self
            .run(&["--dump-json", "--flat-playlist", "--skip-download", &target])
            .await?;

        let mut candidates = parse_candidates(&stdout);
        candidates.truncate(limit.max(1));
        info!("🔍 Encontrados {} resultados para: {}", candidates.len(), query);
        Ok(candidates)
    }

    async fn download(&self, url: &str) -> Result<DownloadedTrack> {
        let nonce = format!("{:08x}", fastrand::u32(..));
        let template = self.output_template(&nonce);

        info!("⬇️ Descargando: {}", url);
        let stdout = self
            .run(&[
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K",
                "-o",
                &template,
                "--dump-json",
                "--no-simulate",
                url,
            ])
            .await?;

        let line = stdout
            .lines()
            .find(|line| line.trim_start().starts_with('{'))
            .context("yt-dlp no devolvió información de la descarga")?;
        let info: YtDlpInfo =
            serde_json::from_str(line).context("Error al parsear respuesta de yt-dlp")?;

        Ok(DownloadedTrack {
            local_path: self.downloaded_path(&info.id, &nonce),
            duration_secs: info.duration_secs(),
            webpage_url: info.page_url(),
            title: info.title_or_id(),
            id: info.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_queries_become_youtube_searches() {
        assert_eq!(search_target("lofi beats", 5), "ytsearch5:lofi beats");
        assert_eq!(search_target("lofi beats", 0), "ytsearch1:lofi beats");
        assert_eq!(
            search_target("https://music.apple.com/us/album/x/123?i=456", 5),
            "ytsearch5:https://music.apple.com/us/album/x/123?i=456"
        );
    }

    #[test]
    fn parses_flat_search_results() {
        let stdout = r#"{"id": "a1", "title": "Intro", "duration": 12.0, "url": "https://www.youtube.com/watch?v=a1"}
not json
{"id": "b2", "title": "Canción completa", "duration": 215.4, "webpage_url": "https://www.youtube.com/watch?v=b2"}
{"id": "c3", "duration": null}
"#;
        let candidates = parse_candidates(stdout);

        assert_eq!(
            candidates,
            vec![
                Candidate {
                    id: "a1".into(),
                    title: "Intro".into(),
                    duration_secs: 12,
                    webpage_url: Some("https://www.youtube.com/watch?v=a1".into()),
                },
                Candidate {
                    id: "b2".into(),
                    title: "Canción completa".into(),
                    duration_secs: 215,
                    webpage_url: Some("https://www.youtube.com/watch?v=b2".into()),
                },
                Candidate {
                    id: "c3".into(),
                    title: "c3".into(),
                    duration_secs: 0,
                    webpage_url: None,
                },
            ]
        );
    }

    #[test]
    fn metadata_prefers_artist_over_uploader() {
        let meta = parse_metadata(
            r#"{"id": "x", "title": "Blinding Lights", "artist": "The Weeknd", "uploader": "TheWeekndVEVO"}"#,
        )
        .unwrap();
        assert_eq!(meta.title, "Blinding Lights");
        assert_eq!(meta.uploader.as_deref(), Some("The Weeknd"));

        assert!(parse_metadata("error").is_err());
    }

    #[test]
    fn download_path_matches_output_template() {
        let dir = Path::new("/tmp/descargas");
        assert_eq!(
            downloaded_path(dir, "dQw4w9WgXcQ", "0a1b2c3d"),
            PathBuf::from("/tmp/descargas/song_dQw4w9WgXcQ_0a1b2c3d.mp3")
        );

        let client = YtDlpClient {
            binary: "yt-dlp".into(),
            cookies: None,
            download_dir: dir.to_path_buf(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(
            client.output_template("0a1b2c3d"),
            "/tmp/descargas/song_%(id)s_0a1b2c3d.%(ext)s"
        );
    }
}
