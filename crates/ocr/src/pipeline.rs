use std::path::Path;

use tracing::{info, warn};

use crate::extract::FieldExtractor;
use crate::recognizer::OcrBackend;
use crate::types::EngineResult;

/// Runs one engine over one image: extract text → confidence → field extraction.
///
/// Never fails. A placeholder backend yields an `Unavailable` result and any
/// extraction error becomes a `Failed` result whose raw text explains why, so
/// one engine cannot abort the others.
pub fn process_image(engine_id: &str, backend: &dyn OcrBackend, image_path: &Path) -> EngineResult {
    if let Some(notice) = backend.unavailable_notice() {
        info!(engine = engine_id, "Engine unavailable: {notice}");
        return EngineResult::unavailable(engine_id, notice);
    }

    info!(engine = engine_id, "Processing {}", image_path.display());
    match backend.extract_text(image_path) {
        Ok(raw_text) => {
            let confidence = backend.confidence(&raw_text);
            let fields = FieldExtractor::parse(&raw_text);
            info!(
                engine = engine_id,
                confidence,
                populated = fields.populated_count(),
                "Engine finished"
            );
            EngineResult::recognized(engine_id, raw_text, fields, confidence)
        }
        Err(e) => {
            warn!(engine = engine_id, "Engine failed: {e}");
            EngineResult::failed(engine_id, format!("{engine_id} extraction failed: {e}"))
        }
    }
}
