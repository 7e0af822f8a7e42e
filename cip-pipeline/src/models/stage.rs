//! Stage numbering and persisted stage outputs

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use uuid::Uuid;

/// The eight pipeline stages, numbered 1-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    Extraction = 1,
    Analysis = 2,
    Safety = 3,
    RagSetup = 4,
    Outline = 5,
    Draft = 6,
    QualityAssurance = 7,
    Formatting = 8,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Extraction,
        Stage::Analysis,
        Stage::Safety,
        Stage::RagSetup,
        Stage::Outline,
        Stage::Draft,
        Stage::QualityAssurance,
        Stage::Formatting,
    ];

    /// Stages rerun by human-feedback regeneration
    pub const REGENERATION: [Stage; 4] = [
        Stage::Outline,
        Stage::Draft,
        Stage::QualityAssurance,
        Stage::Formatting,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.number() == number)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Analysis => "analysis",
            Stage::Safety => "safety",
            Stage::RagSetup => "rag_setup",
            Stage::Outline => "outline",
            Stage::Draft => "draft",
            Stage::QualityAssurance => "quality_assurance",
            Stage::Formatting => "formatting",
        }
    }

    /// Audit event type recorded on success
    pub fn completed_event(self) -> String {
        format!("stage_{}_completed", self.number())
    }

    /// Audit event type recorded on failure
    pub fn failed_event(self) -> String {
        format!("stage_{}_failed", self.number())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} ({})", self.number(), self.name())
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::from_number(value).ok_or_else(|| format!("stage number out of range: {}", value))
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

/// One persisted execution of one stage.
///
/// `output` is the stored envelope: `{"success": true, ...payload fields}` or
/// `{"success": false, "error": "...", "traceback": "..."}`. Rows are never updated;
/// a rerun appends a newer row for the same (pipeline, stage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutputRecord {
    pub id: i64,
    pub pipeline_id: Uuid,
    pub stage: Stage,
    pub output: Value,
    pub created_at: DateTime<Utc>,
}

impl StageOutputRecord {
    pub fn is_success(&self) -> bool {
        self.output
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.output.get("error").and_then(Value::as_str)
    }

    /// Decode a successful payload into its typed form.
    ///
    /// A failed envelope or a shape mismatch is a data integrity error naming
    /// this stage as the producer.
    pub fn decode<T: DeserializeOwned>(&self) -> PipelineResult<T> {
        if !self.is_success() {
            return Err(PipelineError::DataIntegrity {
                stage: self.stage,
                field: "success".to_string(),
                detail: format!(
                    "latest output is a failure: {}",
                    self.error_message().unwrap_or("unknown error")
                ),
            });
        }
        serde_json::from_value(self.output.clone())
            .map_err(|e| PipelineError::from_decode(self.stage, &e))
    }
}

/// Wrap a typed payload in a success envelope
pub fn success_envelope<T: Serialize>(payload: &T) -> Result<Value, serde_json::Error> {
    let mut map = match serde_json::to_value(payload)? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    map.insert("success".to_string(), Value::Bool(true));
    Ok(Value::Object(map))
}

/// Failure envelope with the error message and its cause chain
pub fn failure_envelope(error: &str, traceback: Option<&str>) -> Value {
    let mut value = json!({
        "success": false,
        "error": error,
    });
    if let Some(trace) = traceback {
        value["traceback"] = Value::String(trace.to_string());
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        word_count: usize,
    }

    fn record(output: Value) -> StageOutputRecord {
        StageOutputRecord {
            id: 1,
            pipeline_id: Uuid::nil(),
            stage: Stage::Extraction,
            output,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stage_numbers() {
        assert_eq!(Stage::Extraction.number(), 1);
        assert_eq!(Stage::Formatting.number(), 8);
        assert_eq!(Stage::from_number(7), Some(Stage::QualityAssurance));
        assert_eq!(Stage::from_number(0), None);
        assert_eq!(Stage::from_number(9), None);
        assert_eq!(Stage::Safety.completed_event(), "stage_3_completed");
        assert_eq!(Stage::Draft.failed_event(), "stage_6_failed");
    }

    #[test]
    fn test_stage_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Stage::Outline).unwrap(), "5");
        assert_eq!(serde_json::from_str::<Stage>("2").unwrap(), Stage::Analysis);
        assert!(serde_json::from_str::<Stage>("12").is_err());
    }

    #[test]
    fn test_success_envelope_flattens_payload() {
        let value = success_envelope(&Sample { word_count: 812 }).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["word_count"], json!(812));

        let decoded: Sample = record(value).decode().unwrap();
        assert_eq!(decoded, Sample { word_count: 812 });
    }

    #[test]
    fn test_failure_envelope_does_not_decode() {
        let rec = record(failure_envelope("extraction failed", Some("cause: timeout")));
        assert!(!rec.is_success());
        assert_eq!(rec.error_message(), Some("extraction failed"));
        assert_eq!(rec.output["traceback"], json!("cause: timeout"));

        let err = rec.decode::<Sample>().unwrap_err();
        assert!(matches!(err, PipelineError::DataIntegrity { stage: Stage::Extraction, .. }));
    }

    #[test]
    fn test_missing_field_reports_field_name() {
        let rec = record(json!({"success": true}));
        match rec.decode::<Sample>().unwrap_err() {
            PipelineError::DataIntegrity { field, .. } => assert_eq!(field, "word_count"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
