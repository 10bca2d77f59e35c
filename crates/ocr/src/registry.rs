use std::sync::Arc;

use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::recognizer::{InertRecognizer, OcrBackend};

/// Stable engine identifiers. Persisted per-engine breakdowns are keyed by these.
pub const TESSERACT: &str = "tesseract";
pub const EASY_OCR: &str = "easy_ocr";

/// Ordered map from engine id to backend. Built once, immutable afterwards.
///
/// Order is registration order; it fixes the report layout and breaks vote ties.
#[derive(Clone)]
pub struct EngineRegistry {
    engines: Vec<(String, Arc<dyn OcrBackend>)>,
}

impl EngineRegistry {
    pub fn builder() -> EngineRegistryBuilder {
        EngineRegistryBuilder::default()
    }

    /// The stock deployment: Tesseract, the neural recognizer as `easy_ocr`,
    /// then the configured placeholders. Backends that are disabled or not
    /// compiled in keep their slot as inert engines.
    pub fn from_config(config: &OcrConfig) -> Self {
        let mut builder = Self::builder()
            .register_arc(TESSERACT, tesseract_backend(config))
            .register_arc(EASY_OCR, neural_backend(config));
        for placeholder in &config.placeholders {
            builder = builder.register(&placeholder.id, InertRecognizer::new(&placeholder.message));
        }
        let registry = builder.build();
        info!("Engine registry ready: {}", registry.ids().collect::<Vec<_>>().join(", "));
        registry
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn OcrBackend>> {
        self.engines.iter().find(|(key, _)| key == id).map(|(_, backend)| backend)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.engines.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn OcrBackend>)> {
        self.engines.iter().map(|(id, backend)| (id.as_str(), backend))
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry").field("engines", &self.ids().collect::<Vec<_>>()).finish()
    }
}

#[derive(Default)]
pub struct EngineRegistryBuilder {
    engines: Vec<(String, Arc<dyn OcrBackend>)>,
}

impl EngineRegistryBuilder {
    pub fn register(self, id: &str, backend: impl OcrBackend + 'static) -> Self {
        self.register_arc(id, Arc::new(backend))
    }

    /// Registering an id twice replaces the backend but keeps its original slot.
    pub fn register_arc(mut self, id: &str, backend: Arc<dyn OcrBackend>) -> Self {
        match self.engines.iter_mut().find(|(key, _)| key == id) {
            Some(slot) => {
                warn!("Engine '{id}' registered twice; replacing");
                slot.1 = backend;
            }
            None => self.engines.push((id.to_string(), backend)),
        }
        self
    }

    pub fn build(self) -> EngineRegistry {
        EngineRegistry { engines: self.engines }
    }
}

fn tesseract_backend(config: &OcrConfig) -> Arc<dyn OcrBackend> {
    if config.tesseract.enabled {
        compiled_tesseract(config)
    } else {
        Arc::new(InertRecognizer::new("Tesseract disabled in configuration"))
    }
}

fn neural_backend(config: &OcrConfig) -> Arc<dyn OcrBackend> {
    if config.neural.enabled {
        compiled_neural(config)
    } else {
        Arc::new(InertRecognizer::new("Neural recognizer disabled in configuration"))
    }
}

#[cfg(feature = "tesseract")]
fn compiled_tesseract(config: &OcrConfig) -> Arc<dyn OcrBackend> {
    use crate::recognizer::tesseract_backend::TesseractRecognizer;
    Arc::new(TesseractRecognizer::from_settings(&config.tesseract))
}

#[cfg(not(feature = "tesseract"))]
fn compiled_tesseract(_config: &OcrConfig) -> Arc<dyn OcrBackend> {
    Arc::new(InertRecognizer::new("Tesseract not available: built without the `tesseract` feature"))
}

#[cfg(feature = "neural")]
fn compiled_neural(config: &OcrConfig) -> Arc<dyn OcrBackend> {
    use crate::recognizer::neural_backend::NeuralRecognizer;
    Arc::new(NeuralRecognizer::from_settings(&config.neural))
}

#[cfg(not(feature = "neural"))]
fn compiled_neural(_config: &OcrConfig) -> Arc<dyn OcrBackend> {
    Arc::new(InertRecognizer::new(
        "Neural recognizer not available: built without the `neural` feature",
    ))
}
