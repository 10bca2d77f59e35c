use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use idcard_ocr::intake::{spawn_intake_watcher, wait_until_settled};
use idcard_ocr::{FieldExtractor, OcrBackend, OcrOrchestrator};
use serde::Serialize;
use tokio::sync::mpsc;

/// A dropped file counts as complete once its size holds for one interval.
const SETTLE_INTERVAL: Duration = Duration::from_millis(250);
const SETTLE_CHECKS: u32 = 40;

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

pub async fn scan(
    orchestrator: &OcrOrchestrator,
    image: &Path,
    engine: Option<&str>,
    pretty: bool,
) -> Result<()> {
    match engine {
        Some(id) => {
            let result = orchestrator.process_single(image, id).await?;
            print_json(&result, pretty)
        }
        None => {
            let report = orchestrator.process_all(image).await?;
            print_json(&report, pretty)
        }
    }
}

pub fn engines(orchestrator: &OcrOrchestrator) -> Result<()> {
    for (id, backend) in orchestrator.registry().iter() {
        match backend.unavailable_notice() {
            Some(notice) => println!("{id:<12} unavailable  {notice}"),
            None => println!("{id:<12} available"),
        }
    }
    Ok(())
}

pub fn extract(text_file: &Path, pretty: bool) -> Result<()> {
    let text = std::fs::read_to_string(text_file)
        .with_context(|| format!("Failed to read {}", text_file.display()))?;
    print_json(&FieldExtractor::parse(&text), pretty)
}

/// `<out>/<image stem>.ocr.json`
fn report_path(out_dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    out_dir.join(format!("{stem}.ocr.json"))
}

pub async fn watch(orchestrator: &OcrOrchestrator, dir: &Path, out_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(dir, tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tracing::info!("Watching intake folder: {}", dir.display());

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(path) = received else { break };
                if let Err(e) = wait_until_settled(&path, SETTLE_INTERVAL, SETTLE_CHECKS).await {
                    tracing::warn!("Skipping {}: {e}", path.display());
                    continue;
                }
                tracing::info!("Processing card: {}", path.display());
                let report = orchestrator.process_all(&path).await?;
                let dest = report_path(out_dir, &path);
                let json = serde_json::to_vec_pretty(&report)?;
                match tokio::fs::write(&dest, json).await {
                    Ok(()) => tracing::info!("Report stored: {}", dest.display()),
                    Err(e) => tracing::warn!("Failed to write {}: {e}", dest.display()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watcher");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use idcard_ocr::{EngineRegistry, MockRecognizer};

    #[test]
    fn report_path_uses_stem() {
        let path = report_path(Path::new("/reports"), Path::new("/intake/card-17.jpg"));
        assert_eq!(path, PathBuf::from("/reports/card-17.ocr.json"));
    }

    #[test]
    fn extract_reads_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.txt");
        std::fs::write(&path, "ID: C2010074\nBlood: A+").unwrap();
        assert!(extract(&path, false).is_ok());
        assert!(extract(&dir.path().join("missing.txt"), false).is_err());
    }

    #[tokio::test]
    async fn scan_unknown_engine_fails() {
        let registry = EngineRegistry::builder()
            .register("tesseract", MockRecognizer::new("ID: C2010074"))
            .build();
        let orchestrator = OcrOrchestrator::new(registry);
        let err = scan(&orchestrator, Path::new("card.png"), Some("nonexistent"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown engine: nonexistent"));
        assert!(scan(&orchestrator, Path::new("card.png"), None, true).await.is_ok());
    }
}
