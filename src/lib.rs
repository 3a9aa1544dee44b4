//! # Assessment Grading Connector
//!
//! This Rust library is the client side of an AI-assisted assessment platform. Students submit
//! answers to activity questions, an external grading service scores them against rubrics written
//! by teachers, and teachers review and override the results.
//!
//! ## Core Features
//!
//! - **Rubrics:** Criteria with point values and weights. The point total and the criteria order
//!   are kept in step with the criteria list on every edit.
//! - **Submission lifecycle:** `submitted -> grading -> graded -> reviewed`, with grade and review
//!   refused from any other state before a request is sent.
//! - **Score aggregation:** Final points per criterion, final score and percentage, with teacher
//!   overrides taking precedence.
//! - **API client:** Blocking `reqwest` client for the grading REST API with CSRF handling,
//!   timeouts and explicit cancellation.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! assessment_grading_connector = "0.1"
//! ```
//!
//! Grading a submission and recording a teacher review:
//! ```no_run
//! use assessment_grading_connector::{
//!     AssessmentCredentials, ClientConfig, GradingClient, SubmissionWorkflow,
//! };
//!
//! let credentials = AssessmentCredentials::from_cookie_header(
//!     "https://school.example.com/api/grading",
//!     "csrftoken=abc; sessionid=xyz",
//! );
//! let client = GradingClient::new(credentials, ClientConfig::default()).unwrap();
//!
//! let mut workflow = SubmissionWorkflow::load(&client, 42).unwrap();
//! match workflow.grade(Some("Unit 3 notes")) {
//!     Ok(graded) => println!("AI score: {:?}", graded.final_score()),
//!     Err(e) => eprintln!("Grading failed: {}", e),
//! }
//! workflow.review(12.0, "Good reasoning").unwrap();
//! ```
//!
//! Building a rubric:
//! ```
//! use assessment_grading_connector::{Rubric, RubricCriterion};
//!
//! let mut rubric = Rubric::new("Lab report")
//!     .with_criterion(RubricCriterion::new("Accuracy", 10.0))
//!     .with_criterion(RubricCriterion::new("Clarity", 5.0));
//! assert_eq!(rubric.total_points, 15.0);
//!
//! rubric.move_down(0).unwrap();
//! assert_eq!(rubric.criteria[0].name, "Clarity");
//! assert!(rubric.move_down(1).is_err());
//! ```
pub mod connection; // HTTP plumbing: CSRF, timeouts, cancellation, error bodies.
pub mod credentials; // Grading API URL and session cookies.
pub mod error;
pub mod grading; // REST operations of the grading API.
pub mod mapping; // Activity code to rubric mappings.
pub mod rubric;
pub mod scoring; // Final points, final score, percentage.
pub mod session; // Service health and the grading audit log.
pub mod submission; // Submissions and their lifecycle.
pub mod workflow; // Per-view state for editors and graders.

#[cfg(test)]
mod test_support;

// Exports key structures for external use.
pub use connection::CancelToken;
pub use credentials::{AssessmentCredentials, ClientConfig};
pub use error::{GradingError, Result};
pub use grading::{AssessmentApi, GradingClient};
pub use mapping::{ActivityRubricMapping, RubricImport, SetMappingRequest};
pub use rubric::{CriterionPatch, Rubric, RubricCriterion};
pub use scoring::ScoreSummary;
pub use session::{GradingSession, ServiceHealth};
pub use submission::{
    AssessmentSubmission, CriterionScore, GradeRequest, NewSubmission, ReviewRequest,
    RubricRequirement, SubmissionStatus,
};
pub use workflow::{ActionState, PendingAction, ResourceState, RubricEditor, SubmissionWorkflow};

#[cfg(test)]
mod tests {
    use crate::test_support::FakeApi;
    use crate::*;

    #[test]
    fn test_import_then_grade_with_mapped_rubric() {
        let api = FakeApi::new();
        let imported = api
            .import_rubric("energy.json", br#"{"criteria": []}"#.to_vec(), "013.03-c02")
            .unwrap();
        assert_eq!(imported.rubric_title, "energy.json");
        assert_eq!(imported.mapping.activity_code, "013.03-c02");

        let mut editor = RubricEditor::load(&api, imported.mapping.rubric_id).unwrap();
        editor
            .rubric_mut()
            .add_criterion(RubricCriterion::new("Evidence", 4.0));
        editor.save().unwrap();

        let rubric = workflow::resolve_activity_rubric(&api, "013.03-c02").unwrap();
        let new = NewSubmission::new(5, "Q", "A", rubric, RubricRequirement::Required).unwrap();
        let mut workflow = SubmissionWorkflow::submit(&api, &new).unwrap();
        workflow.grade(None).unwrap();

        let graded = api
            .list_submissions(Some(5), Some(SubmissionStatus::Graded))
            .unwrap();
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[0].criterion_scores.len(), 1);
        assert_eq!(graded[0].max_score, Some(4.0));
    }
}
