//! In-memory stand-in for the grading API, used by the workflow tests.

use crate::error::{GradingError, Result};
use crate::grading::AssessmentApi;
use crate::mapping::{ActivityRubricMapping, RubricImport, SetMappingRequest};
use crate::rubric::Rubric;
use crate::session::{GradingSession, ServiceHealth};
use crate::submission::{
    AssessmentSubmission, CriterionScore, GradeRequest, NewSubmission, ReviewRequest,
    SubmissionStatus,
};
use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

const TEACHER_ID: u64 = 1;
const STUDENT_ID: u64 = 2;

fn not_found(what: &str) -> GradingError {
    GradingError::Api {
        status: 404,
        message: format!("{} not found", what),
    }
}

fn bad_request(message: &str) -> GradingError {
    GradingError::Api {
        status: 400,
        message: message.to_string(),
    }
}

/// Behaves like the server: assigns ids, enforces the lifecycle and "grades" every
/// criterion at 80% of its points.
#[derive(Default)]
pub(crate) struct FakeApi {
    rubrics: RefCell<BTreeMap<u64, Rubric>>,
    submissions: RefCell<BTreeMap<u64, AssessmentSubmission>>,
    mappings: RefCell<Vec<ActivityRubricMapping>>,
    next_id: Cell<u64>,
    grade_failure: RefCell<Option<GradingError>>,
    grade_calls: Cell<usize>,
    review_calls: Cell<usize>,
    sessions: RefCell<Vec<GradingSession>>,
    unconfigured: Cell<bool>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        FakeApi::default()
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    pub(crate) fn fail_next_grade(&self, err: GradingError) {
        *self.grade_failure.borrow_mut() = Some(err);
    }

    pub(crate) fn grade_calls(&self) -> usize {
        self.grade_calls.get()
    }

    pub(crate) fn review_calls(&self) -> usize {
        self.review_calls.get()
    }

    /// Makes `/health/` report an unconfigured service and grading answer 503.
    pub(crate) fn unconfigure(&self) {
        self.unconfigured.set(true);
    }

    pub(crate) fn rubric_count(&self) -> usize {
        self.rubrics.borrow().len()
    }

    fn store_rubric(&self, id: u64, rubric: &Rubric) -> Rubric {
        let mut stored = rubric.clone();
        stored.id = Some(id);
        stored.created_by = Some(TEACHER_ID);
        stored.updated_at = Some(Utc::now());
        for criterion in stored.criteria.iter_mut() {
            if criterion.id.is_none() {
                criterion.id = Some(self.next_id());
            }
        }
        self.rubrics.borrow_mut().insert(id, stored.clone());
        stored
    }
}

impl AssessmentApi for FakeApi {
    fn list_rubrics(&self, activity_id: Option<u64>) -> Result<Vec<Rubric>> {
        Ok(self
            .rubrics
            .borrow()
            .values()
            .filter(|r| r.is_active && (activity_id.is_none() || r.activity_id == activity_id))
            .cloned()
            .collect())
    }

    fn get_rubric(&self, id: u64) -> Result<Rubric> {
        self.rubrics
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Rubric"))
    }

    fn create_rubric(&self, rubric: &Rubric) -> Result<Rubric> {
        let id = self.next_id();
        Ok(self.store_rubric(id, rubric))
    }

    fn update_rubric(&self, id: u64, rubric: &Rubric) -> Result<Rubric> {
        if !self.rubrics.borrow().contains_key(&id) {
            return Err(not_found("Rubric"));
        }
        Ok(self.store_rubric(id, rubric))
    }

    fn delete_rubric(&self, id: u64) -> Result<()> {
        self.rubrics
            .borrow_mut()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Rubric"))
    }

    fn list_submissions(
        &self,
        activity_id: Option<u64>,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<AssessmentSubmission>> {
        Ok(self
            .submissions
            .borrow()
            .values()
            .filter(|s| activity_id.map_or(true, |a| s.activity_id == a))
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect())
    }

    fn get_submission(&self, id: u64) -> Result<AssessmentSubmission> {
        self.submissions
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Submission"))
    }

    fn create_submission(&self, submission: &NewSubmission) -> Result<AssessmentSubmission> {
        let rubric_title = match submission.rubric {
            Some(id) => Some(self.get_rubric(id)?.title),
            None => None,
        };
        let created = AssessmentSubmission {
            id: self.next_id(),
            student: STUDENT_ID,
            activity_id: submission.activity_id,
            question_text: submission.question_text.clone(),
            answer_text: submission.answer_text.clone(),
            rubric: submission.rubric,
            rubric_title,
            status: SubmissionStatus::Submitted,
            submitted_at: Some(Utc::now()),
            ..Default::default()
        };
        self.submissions
            .borrow_mut()
            .insert(created.id, created.clone());
        Ok(created)
    }

    fn grade_submission(&self, id: u64, _request: &GradeRequest) -> Result<AssessmentSubmission> {
        self.grade_calls.set(self.grade_calls.get() + 1);
        if let Some(err) = self.grade_failure.borrow_mut().take() {
            return Err(err);
        }
        if self.unconfigured.get() {
            return Err(GradingError::Api {
                status: 503,
                message: "AI service not configured".to_string(),
            });
        }
        let mut submission = self.get_submission(id)?;
        if submission.status != SubmissionStatus::Submitted {
            return Err(bad_request("Submission has already been graded"));
        }

        match submission.rubric {
            Some(rubric_id) => {
                let rubric = self.get_rubric(rubric_id)?;
                submission.criterion_scores = rubric
                    .criteria
                    .iter()
                    .map(|c| CriterionScore {
                        id: Some(self.next_id()),
                        criterion: c.id.unwrap_or_default(),
                        criterion_name: Some(c.name.clone()),
                        max_points: Some(c.max_points),
                        points_earned: c.max_points * 0.8,
                        feedback: format!("{} mostly met", c.name),
                        ..Default::default()
                    })
                    .collect();
                submission.score = Some(submission.criterion_scores.iter().map(|s| s.points_earned).sum());
                submission.max_score = Some(rubric.total_points());
            }
            None => {
                submission.score = Some(7.0);
                submission.max_score = Some(10.0);
            }
        }
        submission.status = SubmissionStatus::Graded;
        submission.feedback = "Good answer".to_string();
        submission.graded_at = Some(Utc::now());
        submission.graded_by_ai = true;
        submission.ai_model_used = "fake-model".to_string();
        submission.tokens_used = Some(321);

        self.sessions.borrow_mut().insert(
            0,
            GradingSession {
                id: self.next_id(),
                user: Some(TEACHER_ID),
                username: Some("teacher".to_string()),
                activity_id: Some(submission.activity_id),
                prompt: format!("Q: {}\nA: {}", submission.question_text, submission.answer_text),
                response: submission.feedback.clone(),
                model_used: submission.ai_model_used.clone(),
                tokens_used: submission.tokens_used,
                created_at: submission.graded_at,
            },
        );
        self.submissions.borrow_mut().insert(id, submission.clone());
        Ok(submission)
    }

    fn review_submission(
        &self,
        id: u64,
        request: &ReviewRequest,
    ) -> Result<AssessmentSubmission> {
        self.review_calls.set(self.review_calls.get() + 1);
        let mut submission = self.get_submission(id)?;
        if submission.status != SubmissionStatus::Graded {
            return Err(bad_request("Only graded submissions can be reviewed"));
        }
        submission.teacher_score = Some(request.teacher_score);
        submission.teacher_feedback = request.teacher_feedback.clone();
        submission.reviewed_by = Some(TEACHER_ID);
        submission.reviewed_at = Some(Utc::now());
        submission.status = SubmissionStatus::Reviewed;
        self.submissions.borrow_mut().insert(id, submission.clone());
        Ok(submission)
    }

    fn import_rubric(
        &self,
        file_name: &str,
        _content: Vec<u8>,
        activity_code: &str,
    ) -> Result<RubricImport> {
        let created = self.create_rubric(&Rubric::new(file_name))?;
        let mapping = self.set_mapping(&SetMappingRequest {
            activity_code: activity_code.to_string(),
            rubric_id: created.id.unwrap_or_default(),
        })?;
        Ok(RubricImport {
            mapping,
            rubric_title: created.title,
        })
    }

    fn list_mappings(&self) -> Result<Vec<ActivityRubricMapping>> {
        Ok(self.mappings.borrow().clone())
    }

    fn set_mapping(&self, request: &SetMappingRequest) -> Result<ActivityRubricMapping> {
        let rubric = self.get_rubric(request.rubric_id)?;
        let mapping = ActivityRubricMapping {
            activity_code: request.activity_code.clone(),
            rubric_id: request.rubric_id,
            rubric_title: rubric.title,
            assignment_id: None,
            created_at: Some(Utc::now()),
        };
        let mut mappings = self.mappings.borrow_mut();
        mappings.retain(|m| m.activity_code != request.activity_code);
        mappings.push(mapping.clone());
        Ok(mapping)
    }

    fn health_check(&self) -> Result<ServiceHealth> {
        if self.unconfigured.get() {
            return Ok(ServiceHealth::default());
        }
        Ok(ServiceHealth {
            configured: true,
            model: "fake-model".to_string(),
            service: "fake".to_string(),
        })
    }

    fn list_grading_sessions(&self, activity_id: Option<u64>) -> Result<Vec<GradingSession>> {
        Ok(self
            .sessions
            .borrow()
            .iter()
            .filter(|s| match activity_id {
                Some(id) if id != 0 => s.activity_id == Some(id),
                _ => true,
            })
            .take(100)
            .cloned()
            .collect())
    }
}
