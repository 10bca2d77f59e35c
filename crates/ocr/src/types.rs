use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker stored in the best-guess record for fields no engine recovered.
pub const NOT_FOUND: &str = "Not Found";

/// The closed set of identity-card fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "ID")]
    Id,
    FullName,
    University,
    Department,
    Enrollment,
    BloodGroup,
    Validity,
}

impl Field {
    /// Every field, in record order.
    pub const ALL: [Field; 7] = [
        Field::Id,
        Field::FullName,
        Field::University,
        Field::Department,
        Field::Enrollment,
        Field::BloodGroup,
        Field::Validity,
    ];

    /// The stable key used in serialized records.
    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "ID",
            Field::FullName => "FullName",
            Field::University => "University",
            Field::Department => "Department",
            Field::Enrollment => "Enrollment",
            Field::BloodGroup => "BloodGroup",
            Field::Validity => "Validity",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Field {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| format!("Unknown field: '{s}'"))
    }
}

/// Structured extraction of one identity card. Always holds exactly the seven
/// fields of [`Field::ALL`]; an unrecognized field is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRecord {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "FullName")]
    full_name: String,
    #[serde(rename = "University")]
    university: String,
    #[serde(rename = "Department")]
    department: String,
    #[serde(rename = "Enrollment")]
    enrollment: String,
    #[serde(rename = "BloodGroup")]
    blood_group: String,
    #[serde(rename = "Validity")]
    validity: String,
}

impl FieldRecord {
    /// A record with every field set to [`NOT_FOUND`].
    pub fn not_found() -> Self {
        let mut record = Self::default();
        for field in Field::ALL {
            record.set(field, NOT_FOUND);
        }
        record
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id,
            Field::FullName => &self.full_name,
            Field::University => &self.university,
            Field::Department => &self.department,
            Field::Enrollment => &self.enrollment,
            Field::BloodGroup => &self.blood_group,
            Field::Validity => &self.validity,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::FullName => &mut self.full_name,
            Field::University => &mut self.university,
            Field::Department => &mut self.department,
            Field::Enrollment => &mut self.enrollment,
            Field::BloodGroup => &mut self.blood_group,
            Field::Validity => &mut self.validity,
        };
        *slot = value.into();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }

    /// Number of fields holding a non-blank value.
    pub fn populated_count(&self) -> usize {
        self.iter().filter(|(_, v)| !v.trim().is_empty()).count()
    }
}

/// Outcome class of one engine's run over one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// The engine ran and its text went through field extraction.
    Recognized,
    /// The engine is a placeholder for a backend missing from this deployment.
    Unavailable,
    /// The engine failed (decode error, crash, timeout); raw text holds the reason.
    Failed,
}

impl EngineStatus {
    pub fn is_degraded(self) -> bool {
        !matches!(self, EngineStatus::Recognized)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Recognized => write!(f, "recognized"),
            EngineStatus::Unavailable => write!(f, "unavailable"),
            EngineStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One engine's raw text, structured fields and confidence for one image.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    engine: String,
    raw_text: String,
    #[serde(rename = "structured_data")]
    fields: FieldRecord,
    confidence: f32,
    status: EngineStatus,
}

impl EngineResult {
    pub fn recognized(
        engine: impl Into<String>,
        raw_text: impl Into<String>,
        fields: FieldRecord,
        confidence: f32,
    ) -> Self {
        Self {
            engine: engine.into(),
            raw_text: raw_text.into(),
            fields,
            confidence: confidence.clamp(0.0, 1.0),
            status: EngineStatus::Recognized,
        }
    }

    /// A placeholder result: the notice becomes the raw text, confidence is zero.
    pub fn unavailable(engine: impl Into<String>, notice: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            raw_text: notice.into(),
            fields: FieldRecord::default(),
            confidence: 0.0,
            status: EngineStatus::Unavailable,
        }
    }

    /// A degraded result carrying the failure reason as its raw text.
    pub fn failed(engine: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            engine: engine.into(),
            raw_text: format!("Error: {reason}"),
            fields: FieldRecord::default(),
            confidence: 0.0,
            status: EngineStatus::Failed,
        }
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn fields(&self) -> &FieldRecord {
        &self.fields
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }
}

/// Full multi-engine output: per-engine results in registry order plus the
/// reconciled best guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrReport {
    best_guess: FieldRecord,
    #[serde(with = "engine_map")]
    results_by_engine: Vec<EngineResult>,
    image_sha256: Option<String>,
    processed_at: DateTime<Utc>,
}

impl OcrReport {
    pub fn new(
        best_guess: FieldRecord,
        results_by_engine: Vec<EngineResult>,
        image_sha256: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self { best_guess, results_by_engine, image_sha256, processed_at }
    }

    pub fn best_guess(&self) -> &FieldRecord {
        &self.best_guess
    }

    /// Per-engine results, in registry order.
    pub fn engines(&self) -> &[EngineResult] {
        &self.results_by_engine
    }

    pub fn engine(&self, id: &str) -> Option<&EngineResult> {
        self.results_by_engine.iter().find(|r| r.engine == id)
    }

    pub fn image_sha256(&self) -> Option<&str> {
        self.image_sha256.as_deref()
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// True when no engine produced a recognized result.
    pub fn all_degraded(&self) -> bool {
        self.results_by_engine.iter().all(EngineResult::is_degraded)
    }

    /// Highest-confidence recognized result; earlier engines win ties.
    pub fn best_engine(&self) -> Option<&EngineResult> {
        self.results_by_engine
            .iter()
            .filter(|r| !r.is_degraded())
            .fold(None, |best: Option<&EngineResult>, r| match best {
                Some(b) if b.confidence >= r.confidence => Some(b),
                _ => Some(r),
            })
    }
}

/// Serializes the per-engine results as a map keyed by engine id, keeping
/// registry order in both directions.
mod engine_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::EngineResult;

    pub fn serialize<S: Serializer>(results: &[EngineResult], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(results.len()))?;
        for result in results {
            map.serialize_entry(&result.engine, result)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<EngineResult>, D::Error> {
        struct EngineMapVisitor;

        impl<'de> Visitor<'de> for EngineMapVisitor {
            type Value = Vec<EngineResult>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of engine id to engine result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, mut result)) = access.next_entry::<String, EngineResult>()? {
                    // The map key is authoritative.
                    result.engine = id;
                    results.push(result);
                }
                Ok(results)
            }
        }

        d.deserialize_map(EngineMapVisitor)
    }
}
