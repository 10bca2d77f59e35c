//! Engine configuration stored in TOML.
//!
//! Every key has a default, so an empty file describes the stock deployment:
//! Tesseract, the neural recognizer under `easy_ocr`, and two placeholder slots.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tesseract: TesseractSettings,
    pub neural: NeuralSettings,
    /// Omitted → the stock slots; `placeholders = []` clears them.
    pub placeholders: Vec<PlaceholderEngine>,
    pub orchestrator: OrchestratorSettings,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract: TesseractSettings::default(),
            neural: NeuralSettings::default(),
            placeholders: default_placeholders(),
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

impl OcrConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&raw)
    }

    /// Like [`OcrConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractSettings {
    pub enabled: bool,
    /// tessdata directory; `None` uses the system default.
    pub data_path: Option<PathBuf>,
    pub language: String,
    pub page_seg_mode: u8,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self { enabled: true, data_path: None, language: "eng".into(), page_seg_mode: 6 }
    }
}

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Settings for the neural recognizer registered as `easy_ocr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralSettings {
    pub enabled: bool,
    pub model_dir: PathBuf,
    pub detection_model: Option<PathBuf>,
    pub recognition_model: Option<PathBuf>,
}

impl Default for NeuralSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_dir: default_model_dir(),
            detection_model: None,
            recognition_model: None,
        }
    }
}

impl NeuralSettings {
    pub fn detection_model_path(&self) -> PathBuf {
        self.detection_model
            .clone()
            .unwrap_or_else(|| self.model_dir.join(DETECTION_MODEL_FILENAME))
    }

    pub fn recognition_model_path(&self) -> PathBuf {
        self.recognition_model
            .clone()
            .unwrap_or_else(|| self.model_dir.join(RECOGNITION_MODEL_FILENAME))
    }
}

/// `$XDG_CACHE_HOME/ocrs`, else `~/.cache/ocrs`, else `./ocrs-models`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// A registry slot for a backend this deployment does not ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderEngine {
    pub id: String,
    pub message: String,
}

impl PlaceholderEngine {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { id: id.into(), message: message.into() }
    }
}

fn default_placeholders() -> Vec<PlaceholderEngine> {
    vec![
        PlaceholderEngine::new("paddle_ocr", "PaddleOCR disabled (requires paddlepaddle)"),
        PlaceholderEngine::new("ocropus", "Using Tesseract as fallback"),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Per-engine wall-clock limit; an engine exceeding it yields a failed result.
    pub engine_timeout_secs: Option<u64>,
}

impl OrchestratorSettings {
    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_secs.map(Duration::from_secs)
    }
}
