use async_trait::async_trait;
use std::{io::ErrorKind, path::Path};
use tracing::{debug, info, warn};

use super::queue::Song;

/// Deletes the downloaded file of a retired song.
///
/// Implementations must tolerate the file already being gone and must never
/// fail the caller: a cleanup problem is logged and playback moves on.
#[async_trait]
pub trait ResourceReclaimer: Send + Sync {
    async fn reclaim(&self, song: &Song);
}

/// Borra el archivo local con `tokio::fs`.
pub struct FileReclaimer;

#[async_trait]
impl ResourceReclaimer for FileReclaimer {
    async fn reclaim(&self, song: &Song) {
        match tokio::fs::remove_file(&song.local_path).await {
            Ok(()) => debug!("🧹 Archivo eliminado: {}", song.local_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("🧹 El archivo ya no existía: {}", song.local_path.display())
            }
            Err(e) => warn!(
                "⚠️ No se pudo eliminar {} ({}): {}",
                song.local_path.display(),
                song.title,
                e
            ),
        }
    }
}

/// Deletes downloads left behind by a previous run. Nothing owns them once
/// the process restarts. Returns how many files were removed.
pub async fn purge_stale_downloads(dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with("song_") {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("⚠️ No se pudo eliminar {}: {}", entry.path().display(), e),
        }
    }

    if removed > 0 {
        info!("🧹 {} descargas antiguas eliminadas", removed);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::song;

    #[tokio::test]
    async fn removes_the_file_once_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song_a.mp3");
        tokio::fs::write(&path, b"fake mp3").await.unwrap();

        let mut target = song("a");
        target.local_path = path.clone();

        FileReclaimer.reclaim(&target).await;
        assert!(!path.exists());

        // Segunda llamada: el archivo ya no está, no debe fallar
        FileReclaimer.reclaim(&target).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn purge_only_touches_song_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["song_a_1.mp3", "song_b_2.webm.part", "notas.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        assert_eq!(purge_stale_downloads(dir.path()).await.unwrap(), 2);
        assert!(dir.path().join("notas.txt").exists());
        assert!(!dir.path().join("song_a_1.mp3").exists());
    }
}
