use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::hash;
use crate::pipeline;
use crate::recognizer::OcrBackend;
use crate::registry::EngineRegistry;
use crate::types::{EngineResult, OcrReport};
use crate::vote;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Unknown engine: {0}")]
    UnknownEngine(String),
    #[error("No OCR engines registered")]
    NoEngines,
}

/// Runs the registered engines over an image and reconciles their fields.
///
/// Engine work is blocking (decode, inference) and runs on tokio's blocking
/// pool, one task per engine, so a slow engine never stalls the others or the
/// caller's runtime.
pub struct OcrOrchestrator {
    registry: Arc<EngineRegistry>,
    engine_timeout: Option<Duration>,
}

impl OcrOrchestrator {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry: Arc::new(registry), engine_timeout: None }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(EngineRegistry::from_config(config))
            .with_engine_timeout(config.orchestrator.engine_timeout())
    }

    /// An engine still running after `timeout` is reported as failed. Its
    /// blocking thread is not interrupted.
    pub fn with_engine_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.engine_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Every registered engine, concurrently, then the per-field vote.
    ///
    /// Engine failures are contained in their results; the only error is an
    /// empty registry.
    pub async fn process_all(&self, image_path: &Path) -> Result<OcrReport, OrchestratorError> {
        if self.registry.is_empty() {
            return Err(OrchestratorError::NoEngines);
        }
        info!("Running {} engines on {}", self.registry.len(), image_path.display());

        let handles: Vec<_> = self
            .registry
            .iter()
            .map(|(id, backend)| {
                let run = run_engine(
                    id.to_string(),
                    Arc::clone(backend),
                    image_path.to_path_buf(),
                    self.engine_timeout,
                );
                (id.to_string(), tokio::spawn(run))
            })
            .collect();

        // Awaited in registry order so the report and the vote tie-break follow it.
        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => EngineResult::failed(&id, format!("{id} task aborted: {e}")),
            };
            results.push(result);
        }

        let best_guess = vote::best_guess(&results);
        let image_sha256 = hashed(image_path).await;
        let report = OcrReport::new(best_guess, results, image_sha256, Utc::now());
        if report.all_degraded() {
            warn!("No engine recognized {}", image_path.display());
        }
        Ok(report)
    }

    /// One engine by id, without reconciliation.
    pub async fn process_single(
        &self,
        image_path: &Path,
        engine_id: &str,
    ) -> Result<EngineResult, OrchestratorError> {
        let backend = self
            .registry
            .get(engine_id)
            .ok_or_else(|| OrchestratorError::UnknownEngine(engine_id.to_string()))?;
        Ok(run_engine(
            engine_id.to_string(),
            Arc::clone(backend),
            image_path.to_path_buf(),
            self.engine_timeout,
        )
        .await)
    }
}

async fn run_engine(
    id: String,
    backend: Arc<dyn OcrBackend>,
    image_path: PathBuf,
    timeout: Option<Duration>,
) -> EngineResult {
    let task_id = id.clone();
    let task = tokio::task::spawn_blocking(move || {
        pipeline::process_image(&task_id, backend.as_ref(), &image_path)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(engine = %id, "Engine timed out after {limit:?}");
                return EngineResult::failed(&id, format!("{id} timed out after {}s", limit.as_secs_f32()));
            }
        },
        None => task.await,
    };

    joined.unwrap_or_else(|e| {
        warn!(engine = %id, "Engine panicked: {e}");
        EngineResult::failed(&id, format!("{id} crashed: {e}"))
    })
}

async fn hashed(image_path: &Path) -> Option<String> {
    let path = image_path.to_path_buf();
    tokio::task::spawn_blocking(move || hash::sha256_file(&path).ok())
        .await
        .ok()
        .flatten()
        .map(|digest| hash::to_hex(&digest))
}
