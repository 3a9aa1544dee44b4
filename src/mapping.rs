use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Association between an activity (by its string code, e.g. `013.03-c02`) and the
/// rubric used to grade it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityRubricMapping {
    pub activity_code: String,
    pub rubric_id: u64,
    #[serde(default)]
    pub rubric_title: String,
    #[serde(default)]
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response of `POST /rubrics/import/`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RubricImport {
    pub mapping: ActivityRubricMapping,
    pub rubric_title: String,
}

/// Body of `POST /rubrics/mappings/set/`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SetMappingRequest {
    pub activity_code: String,
    pub rubric_id: u64,
}

/// Finds the rubric mapped to `activity_code`, if any.
pub fn resolve_rubric(mappings: &[ActivityRubricMapping], activity_code: &str) -> Option<u64> {
    mappings
        .iter()
        .find(|mapping| mapping.activity_code == activity_code)
        .map(|mapping| mapping.rubric_id)
}
