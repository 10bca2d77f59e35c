pub mod config;
pub mod extract;
pub mod hash;
pub mod intake;
pub mod orchestrator;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod registry;
pub mod types;
pub mod vote;

pub use config::{ConfigError, OcrConfig};
pub use extract::FieldExtractor;
pub use hash::{sha256_file, to_hex};
pub use orchestrator::{OcrOrchestrator, OrchestratorError};
pub use pipeline::process_image;
pub use preprocess::{load_image, preprocess, preprocess_gray, PreprocessError};
pub use recognizer::{
    text_length_confidence, InertRecognizer, MockRecognizer, OcrBackend, OcrError,
};
pub use registry::{EngineRegistry, EngineRegistryBuilder};
pub use types::{EngineResult, EngineStatus, Field, FieldRecord, OcrReport, NOT_FOUND};
pub use vote::best_guess;
