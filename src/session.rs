use crate::submission::string_or_null;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of `GET /health/`: whether the AI grading service behind the API is set up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ServiceHealth {
    pub configured: bool,
    #[serde(default, deserialize_with = "string_or_null")]
    pub model: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub service: String,
}

impl ServiceHealth {
    /// Short line for status bars, e.g. `openai (gpt-4)` or `not configured`.
    pub fn describe(&self) -> String {
        if !self.configured {
            return "not configured".to_string();
        }
        match (self.service.is_empty(), self.model.is_empty()) {
            (false, false) => format!("{} ({})", self.service, self.model),
            (false, true) => self.service.clone(),
            (true, false) => self.model.clone(),
            (true, true) => "configured".to_string(),
        }
    }
}

/// One logged call to the AI grading service, as listed by `GET /sessions/`.
///
/// The server keeps these for audit: who triggered the call, the prompt it sent and the
/// raw model response. Non-staff users only see their own sessions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GradingSession {
    pub id: u64,
    #[serde(default)]
    pub user: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub activity_id: Option<u64>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub prompt: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub response: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub model_used: String,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
