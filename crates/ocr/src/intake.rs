use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Raster formats the engines decode. PDFs must be rasterized by the caller.
const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Spawn a notify watcher on `watch_dir` that sends new image paths to `tx`.
/// The returned watcher must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths.into_iter().filter(|p| is_supported_image(p)) {
                    forward(&tx, path);
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Queue a path for processing. Returns false when it had to be dropped.
fn forward(tx: &mpsc::Sender<PathBuf>, path: PathBuf) -> bool {
    match tx.try_send(path) {
        Ok(()) => true,
        Err(TrySendError::Full(path)) => {
            warn!("Intake queue full, dropping {}", path.display());
            false
        }
        Err(TrySendError::Closed(path)) => {
            warn!("Intake channel closed, dropping {}", path.display());
            false
        }
    }
}

/// Wait until a freshly created file has stopped growing.
///
/// The size is sampled every `interval`; two equal non-zero samples in a row
/// mean the writer is done. Gives up with `TimedOut` after `max_checks` samples.
pub async fn wait_until_settled(path: &Path, interval: Duration, max_checks: u32) -> io::Result<u64> {
    let mut last = None;
    for _ in 0..max_checks {
        let len = tokio::fs::metadata(path).await?.len();
        if len > 0 && last == Some(len) {
            return Ok(len);
        }
        last = Some(len);
        tokio::time::sleep(interval).await;
    }
    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{} is still being written", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions() {
        assert!(is_supported_image(Path::new("card.png")));
        assert!(is_supported_image(Path::new("/scans/CARD.JPG")));
        assert!(is_supported_image(Path::new("card.tiff")));
        assert!(!is_supported_image(Path::new("card.pdf")));
        assert!(!is_supported_image(Path::new("card")));
        assert!(!is_supported_image(Path::new("card.png.ocr.json")));
    }

    #[tokio::test]
    async fn watcher_starts_on_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        assert!(spawn_intake_watcher(dir.path(), tx).is_ok());
    }

    #[tokio::test]
    async fn watcher_fails_on_missing_dir() {
        let (tx, _rx) = mpsc::channel(4);
        assert!(spawn_intake_watcher(Path::new("/nonexistent/intake"), tx).is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_path() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward(&tx, PathBuf::from("a.png")));
        assert!(!forward(&tx, PathBuf::from("b.png")));
        assert_eq!(rx.recv().await, Some(PathBuf::from("a.png")));
        drop(rx);
        assert!(!forward(&tx, PathBuf::from("c.png")));
    }

    #[tokio::test]
    async fn settled_file_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, [7u8; 32]).unwrap();
        let len = wait_until_settled(&path, Duration::from_millis(10), 5).await.unwrap();
        assert_eq!(len, 32);
    }

    #[tokio::test]
    async fn growing_file_settles_after_last_write() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        let mut file = tokio::fs::File::create(&path).await.unwrap();
        let writer = tokio::spawn(async move {
            for _ in 0..3 {
                file.write_all(&[1u8; 100]).await.unwrap();
                file.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });
        let len = wait_until_settled(&path, Duration::from_millis(150), 20).await.unwrap();
        writer.await.unwrap();
        assert_eq!(len, 300);
    }

    #[tokio::test]
    async fn empty_file_never_settles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, b"").unwrap();
        let err = wait_until_settled(&path, Duration::from_millis(5), 3).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(wait_until_settled(&dir.path().join("gone.png"), Duration::from_millis(5), 3)
            .await
            .is_err());
    }
}
