use crate::error::{GradingError, Result};
use crate::scoring;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Lifecycle of an assessment submission.
///
/// ```text
/// submitted -> grading -> graded -> reviewed
/// ```
///
/// `reviewed` is terminal. `grading` is only ever shown while a grade request is in flight;
/// the server answers a grade request with the `graded` entity directly.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Submitted,
    Grading,
    Graded,
    Reviewed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Grading => "grading",
            SubmissionStatus::Graded => "graded",
            SubmissionStatus::Reviewed => "reviewed",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Submitted, SubmissionStatus::Grading)
                | (SubmissionStatus::Grading, SubmissionStatus::Graded)
                | (SubmissionStatus::Graded, SubmissionStatus::Reviewed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SubmissionStatus::Reviewed
    }

    /// Grading may only start from `submitted`.
    pub fn ensure_can_grade(self) -> Result<()> {
        if self.can_transition_to(SubmissionStatus::Grading) {
            Ok(())
        } else {
            Err(GradingError::InvalidState {
                action: "grade",
                status: self,
            })
        }
    }

    /// A teacher review may only be applied to a `graded` submission.
    pub fn ensure_can_review(self) -> Result<()> {
        if self.can_transition_to(SubmissionStatus::Reviewed) {
            Ok(())
        } else {
            Err(GradingError::InvalidState {
                action: "review",
                status: self,
            })
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// The API sends `null` for blank text columns on some endpoints.
pub(crate) fn string_or_null<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Points and feedback for one criterion of one submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CriterionScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub criterion: u64,
    #[serde(default)]
    pub criterion_name: Option<String>,
    #[serde(default, alias = "criterion_max_points")]
    pub max_points: Option<f64>,
    pub points_earned: f64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub feedback: String,
    #[serde(default)]
    pub teacher_points: Option<f64>,
    #[serde(default)]
    pub teacher_feedback: Option<String>,
}

impl CriterionScore {
    pub fn final_points(&self) -> f64 {
        scoring::final_points(self)
    }
}

/// A student's answer to an activity question, together with its grading results.
///
/// `final_score` and `percentage` are not stored: the server's copies are ignored and
/// both are derived from the other fields on demand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AssessmentSubmission {
    pub id: u64,
    #[serde(default)]
    pub student: u64,
    #[serde(default)]
    pub student_username: Option<String>,
    pub activity_id: u64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub question_text: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub answer_text: String,
    #[serde(default)]
    pub rubric: Option<u64>,
    #[serde(default)]
    pub rubric_title: Option<String>,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub feedback: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub graded_by_ai: bool,
    #[serde(default, deserialize_with = "string_or_null")]
    pub ai_model_used: String,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub teacher_score: Option<f64>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub teacher_feedback: String,
    #[serde(default)]
    pub reviewed_by: Option<u64>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub criterion_scores: Vec<CriterionScore>,
}

impl AssessmentSubmission {
    pub fn final_score(&self) -> Option<f64> {
        scoring::final_score(self)
    }

    pub fn percentage(&self) -> Option<f64> {
        scoring::percentage(self)
    }

    pub fn is_reviewed(&self) -> bool {
        self.status == SubmissionStatus::Reviewed
    }
}

/// Whether an activity can be submitted without a rubric attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RubricRequirement {
    #[default]
    Optional,
    Required,
}

/// Body of `POST /submissions/`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub activity_id: u64,
    pub question_text: String,
    pub answer_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric: Option<u64>,
}

impl NewSubmission {
    /// Builds a submission request, rejecting it before any network traffic if the
    /// question or answer is blank or a required rubric could not be resolved.
    pub fn new(
        activity_id: u64,
        question: &str,
        answer: &str,
        rubric: Option<u64>,
        requirement: RubricRequirement,
    ) -> Result<Self> {
        if question.trim().is_empty() {
            return Err(GradingError::validation("Question text is required"));
        }
        if answer.trim().is_empty() {
            return Err(GradingError::validation("Answer text is required"));
        }
        if requirement == RubricRequirement::Required && rubric.is_none() {
            return Err(GradingError::validation(format!(
                "Activity {} requires a rubric but none is attached",
                activity_id
            )));
        }
        Ok(NewSubmission {
            activity_id,
            question_text: question.to_string(),
            answer_text: answer.to_string(),
            rubric,
        })
    }
}

/// Body of `POST /submissions/{id}/grade/`.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct GradeRequest {
    pub context: String,
}

impl GradeRequest {
    pub fn new(context: Option<&str>) -> Self {
        GradeRequest {
            context: context.unwrap_or_default().to_string(),
        }
    }
}

/// Body of `POST /submissions/{id}/review/`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub teacher_score: f64,
    pub teacher_feedback: String,
}

impl ReviewRequest {
    pub fn new(teacher_score: f64, teacher_feedback: &str) -> Result<Self> {
        if !teacher_score.is_finite() || teacher_score < 0.0 {
            return Err(GradingError::validation(
                "Teacher score must be a non-negative number",
            ));
        }
        Ok(ReviewRequest {
            teacher_score,
            teacher_feedback: teacher_feedback.to_string(),
        })
    }
}
