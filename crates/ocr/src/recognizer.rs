use std::path::Path;

use thiserror::Error;

use crate::preprocess::PreprocessError;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("{0}")]
    NotAvailable(String),
}

impl From<PreprocessError> for OcrError {
    fn from(e: PreprocessError) -> Self {
        OcrError::ImageDecode(e.to_string())
    }
}

/// Characters of trimmed text at which [`text_length_confidence`] saturates.
const CONFIDENCE_SATURATION_CHARS: f32 = 1000.0;

/// Coarse confidence heuristic: trimmed character count / 1000, capped at 1.0.
///
/// Not a calibrated probability. It only rewards longer extractions.
pub fn text_length_confidence(text: &str) -> f32 {
    let chars = text.trim().chars().count() as f32;
    (chars / CONFIDENCE_SATURATION_CHARS).min(1.0)
}

/// Abstraction over an OCR backend.
/// Implementations read the image at `image_path` and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn extract_text(&self, image_path: &Path) -> Result<String, OcrError>;

    /// Confidence for text this backend produced. Defaults to the length heuristic.
    fn confidence(&self, text: &str) -> f32 {
        text_length_confidence(text)
    }

    /// `Some(notice)` for placeholder backends that cannot recognize anything
    /// in this deployment.
    fn unavailable_notice(&self) -> Option<&str> {
        None
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string. Used to unit test the orchestration
/// without requiring a real engine to be installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn extract_text(&self, _image_path: &Path) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Inert backend (fills slots for engines missing from a deployment) ─────────

/// Stand-in for a backend that is not installed or not compiled in. Its
/// "recognized text" is the unavailability notice and its confidence is zero.
#[derive(Debug, Clone)]
pub struct InertRecognizer {
    notice: String,
}

impl InertRecognizer {
    pub fn new(notice: impl Into<String>) -> Self {
        Self { notice: notice.into() }
    }
}

impl OcrBackend for InertRecognizer {
    fn extract_text(&self, _image_path: &Path) -> Result<String, OcrError> {
        Ok(self.notice.clone())
    }

    fn confidence(&self, _text: &str) -> f32 {
        0.0
    }

    fn unavailable_notice(&self) -> Option<&str> {
        Some(&self.notice)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use std::path::Path;

    use leptess::{LepTess, Variable};
    use tracing::debug;

    use super::{OcrBackend, OcrError};
    use crate::config::TesseractSettings;
    use crate::preprocess;

    /// Tesseract over the binarized, denoised image.
    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
        page_seg_mode: u8,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str, page_seg_mode: u8) -> Self {
            Self { data_path, lang: lang.to_string(), page_seg_mode }
        }

        pub fn from_settings(settings: &TesseractSettings) -> Self {
            Self::new(
                settings.data_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                &settings.language,
                settings.page_seg_mode,
            )
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
            let cleaned = preprocess::preprocess(image_path)?;
            let png = preprocess::encode_png(&cleaned)?;

            // LepTess is not Sync, so each call gets its own handle.
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(format!("Tesseract init failed: {e}")))?;
            lt.set_variable(Variable::TesseditPagesegMode, &self.page_seg_mode.to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let text = lt
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(format!("Tesseract extraction failed: {e}")))?;
            debug!(chars = text.len(), "Tesseract pass complete");
            Ok(text)
        }
    }
}

// ── Neural backend (optional, gated behind `neural` feature) ──────────────────

#[cfg(feature = "neural")]
pub mod neural_backend {
    use std::path::{Path, PathBuf};
    use std::sync::OnceLock;

    use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
    use rten::Model;
    use tracing::{debug, info};

    use super::{OcrBackend, OcrError};
    use crate::config::NeuralSettings;
    use crate::preprocess;

    /// Detection + recognition network pair run on the raw RGB image.
    ///
    /// Models load on first use, exactly once, and are then shared read-only by
    /// every call, including concurrent ones.
    pub struct NeuralRecognizer {
        detection_model: PathBuf,
        recognition_model: PathBuf,
        engine: OnceLock<Result<OcrEngine, String>>,
    }

    impl NeuralRecognizer {
        pub fn new(detection_model: PathBuf, recognition_model: PathBuf) -> Self {
            Self { detection_model, recognition_model, engine: OnceLock::new() }
        }

        pub fn from_settings(settings: &NeuralSettings) -> Self {
            Self::new(settings.detection_model_path(), settings.recognition_model_path())
        }

        fn engine(&self) -> Result<&OcrEngine, OcrError> {
            self.engine
                .get_or_init(|| self.load())
                .as_ref()
                .map_err(|e| OcrError::NotAvailable(e.clone()))
        }

        fn load(&self) -> Result<OcrEngine, String> {
            info!("Loading text detection model from {}", self.detection_model.display());
            let detection_model = Model::load_file(&self.detection_model).map_err(|e| {
                format!("failed to load detection model {}: {e}", self.detection_model.display())
            })?;
            info!("Loading text recognition model from {}", self.recognition_model.display());
            let recognition_model = Model::load_file(&self.recognition_model).map_err(|e| {
                format!("failed to load recognition model {}: {e}", self.recognition_model.display())
            })?;
            OcrEngine::new(OcrEngineParams {
                detection_model: Some(detection_model),
                recognition_model: Some(recognition_model),
                ..Default::default()
            })
            .map_err(|e| format!("failed to initialise neural engine: {e}"))
        }
    }

    impl OcrBackend for NeuralRecognizer {
        fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
            let rgb = preprocess::load_image(image_path)?.to_rgb8();
            let engine = self.engine()?;

            let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let input = engine
                .prepare_input(source)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let text = engine
                .get_text(&input)
                .map_err(|e| OcrError::Engine(format!("neural extraction failed: {e}")))?;
            debug!(lines = text.lines().count(), "Neural pass complete");
            Ok(text)
        }
    }
}
