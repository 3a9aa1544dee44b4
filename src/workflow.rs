//! Per-view state for the rubric editor and the submission grader.
//!
//! These objects hold what a single screen needs: the confirmed entity as last returned
//! by the server, the loading/error flags of the action in progress and, for
//! submissions, the optimistic overlay shown while a lifecycle request is in flight.
//! Each view owns its own instances; nothing here is shared process-wide.

use crate::error::{GradingError, Result};
use crate::grading::AssessmentApi;
use crate::mapping::resolve_rubric;
use crate::rubric::Rubric;
use crate::scoring::ScoreSummary;
use crate::submission::{
    AssessmentSubmission, GradeRequest, NewSubmission, ReviewRequest, SubmissionStatus,
};

/// Loading/error flags of one user-triggered action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionState {
    pub loading: bool,
    pub error: Option<String>,
}

impl ActionState {
    /// Runs `action`, keeping the flags up to date. The error is recorded and returned.
    pub fn run<T>(&mut self, action: impl FnOnce() -> Result<T>) -> Result<T> {
        self.loading = true;
        self.error = None;
        let result = action();
        self.loading = false;
        if let Err(e) = &result {
            self.error = Some(e.to_string());
        }
        result
    }
}

/// A remotely loaded value plus its loading/error flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        ResourceState {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> ResourceState<T> {
    pub fn new() -> Self {
        ResourceState::default()
    }

    /// Fetches the value. On failure the previous value is kept and the error recorded.
    pub fn load(&mut self, fetch: impl FnOnce() -> Result<T>) -> Result<&T> {
        self.loading = true;
        self.error = None;
        let result = fetch();
        self.loading = false;
        match result {
            Ok(data) => Ok(&*self.data.insert(data)),
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Looks up the rubric mapped to an activity code on the server.
pub fn resolve_activity_rubric<A: AssessmentApi>(
    api: &A,
    activity_code: &str,
) -> Result<Option<u64>> {
    let mappings = api.list_mappings()?;
    Ok(resolve_rubric(&mappings, activity_code))
}

/// Lifecycle request currently in flight for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Grading,
    Reviewing,
}

impl PendingAction {
    /// Status the server must report once the action has succeeded.
    pub fn expected_status(self) -> SubmissionStatus {
        match self {
            PendingAction::Grading => SubmissionStatus::Graded,
            PendingAction::Reviewing => SubmissionStatus::Reviewed,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            PendingAction::Grading => "grade",
            PendingAction::Reviewing => "review",
        }
    }
}

/// A grade request that has been accepted locally and is waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGrade {
    pub submission_id: u64,
    pub request: GradeRequest,
}

/// A review request that has been accepted locally and is waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReview {
    pub submission_id: u64,
    pub request: ReviewRequest,
}

/// Drives one submission through `submitted -> grading -> graded -> reviewed`.
///
/// `confirmed` is always an entity the server returned. The optimistic `grading` status
/// lives only in `pending` and disappears when the response arrives, whether it is a
/// success or a failure. Work can be split with `begin_*` / `complete` when the request
/// runs elsewhere, or done in one call with `grade` / `review`.
pub struct SubmissionWorkflow<'a, A: AssessmentApi> {
    api: &'a A,
    confirmed: AssessmentSubmission,
    pending: Option<PendingAction>,
    action: ActionState,
}

impl<'a, A: AssessmentApi> SubmissionWorkflow<'a, A> {
    pub fn new(api: &'a A, submission: AssessmentSubmission) -> Self {
        SubmissionWorkflow {
            api,
            confirmed: submission,
            pending: None,
            action: ActionState::default(),
        }
    }

    /// Fetches an existing submission.
    pub fn load(api: &'a A, id: u64) -> Result<Self> {
        Ok(SubmissionWorkflow::new(api, api.get_submission(id)?))
    }

    /// Creates a new submission on the server.
    pub fn submit(api: &'a A, submission: &NewSubmission) -> Result<Self> {
        let created = api.create_submission(submission)?;
        log::info!(
            "Submission {} created for activity {} ({})",
            created.id,
            created.activity_id,
            created.status
        );
        Ok(SubmissionWorkflow::new(api, created))
    }

    pub fn submission(&self) -> &AssessmentSubmission {
        &self.confirmed
    }

    pub fn into_submission(self) -> AssessmentSubmission {
        self.confirmed
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    pub fn action_state(&self) -> &ActionState {
        &self.action
    }

    /// Status to show: `grading` while a grade request is in flight, else the confirmed one.
    pub fn displayed_status(&self) -> SubmissionStatus {
        match self.pending {
            Some(PendingAction::Grading) => SubmissionStatus::Grading,
            _ => self.confirmed.status,
        }
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary::of(&self.confirmed)
    }

    fn ensure_idle(&self, action: &'static str) -> Result<()> {
        if self.pending.is_some() {
            return Err(GradingError::InvalidState {
                action,
                status: self.displayed_status(),
            });
        }
        Ok(())
    }

    // Records a locally rejected action so the view shows it like a server error.
    fn reject(&mut self, err: GradingError) -> GradingError {
        self.action.error = Some(err.to_string());
        err
    }

    pub fn begin_grade(&mut self, context: Option<&str>) -> Result<PendingGrade> {
        let checked = self
            .ensure_idle("grade")
            .and_then(|_| self.confirmed.status.ensure_can_grade());
        if let Err(e) = checked {
            return Err(self.reject(e));
        }
        self.pending = Some(PendingAction::Grading);
        self.action.loading = true;
        self.action.error = None;
        Ok(PendingGrade {
            submission_id: self.confirmed.id,
            request: GradeRequest::new(context),
        })
    }

    pub fn begin_review(&mut self, teacher_score: f64, teacher_feedback: &str) -> Result<PendingReview> {
        let checked = self
            .ensure_idle("review")
            .and_then(|_| self.confirmed.status.ensure_can_review())
            .and_then(|_| ReviewRequest::new(teacher_score, teacher_feedback));
        let request = match checked {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        self.pending = Some(PendingAction::Reviewing);
        self.action.loading = true;
        self.action.error = None;
        Ok(PendingReview {
            submission_id: self.confirmed.id,
            request,
        })
    }

    /// Applies the outcome of the pending request.
    ///
    /// On success the returned entity becomes the confirmed state, provided it carries the
    /// status the pending action leads to (`graded` after a grade, `reviewed` after a
    /// review). Otherwise, and on failure, the confirmed state is left exactly as it was
    /// before the request.
    pub fn complete(&mut self, outcome: Result<AssessmentSubmission>) -> Result<&AssessmentSubmission> {
        let pending = self.pending.take();
        self.action.loading = false;
        match outcome {
            Ok(updated) => {
                if updated.id != self.confirmed.id {
                    let err = GradingError::Network(format!(
                        "expected submission {} in response, got {}",
                        self.confirmed.id, updated.id
                    ));
                    return Err(self.reject(err));
                }
                if let Some(action) = pending {
                    if updated.status != action.expected_status() {
                        log::warn!(
                            "Submission {}: {:?} answered with status {}",
                            updated.id,
                            action,
                            updated.status
                        );
                        let err = GradingError::InvalidState {
                            action: action.verb(),
                            status: updated.status,
                        };
                        return Err(self.reject(err));
                    }
                }
                log::info!(
                    "Submission {}: {} -> {} ({:?})",
                    updated.id,
                    self.confirmed.status,
                    updated.status,
                    pending
                );
                self.confirmed = updated;
                Ok(&self.confirmed)
            }
            Err(e) => {
                log::warn!("Submission {}: {:?} failed: {}", self.confirmed.id, pending, e);
                self.action.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Asks the grading service to grade the submission. Only valid from `submitted`.
    pub fn grade(&mut self, context: Option<&str>) -> Result<&AssessmentSubmission> {
        let pending = self.begin_grade(context)?;
        let outcome = self
            .api
            .grade_submission(pending.submission_id, &pending.request);
        self.complete(outcome)
    }

    /// Records a teacher review. Only valid from `graded`.
    pub fn review(&mut self, teacher_score: f64, teacher_feedback: &str) -> Result<&AssessmentSubmission> {
        let pending = self.begin_review(teacher_score, teacher_feedback)?;
        let outcome = self
            .api
            .review_submission(pending.submission_id, &pending.request);
        self.complete(outcome)
    }

    /// Replaces the confirmed state with a fresh copy from the server.
    pub fn reload(&mut self) -> Result<&AssessmentSubmission> {
        let api = self.api;
        let id = self.confirmed.id;
        self.confirmed = self.action.run(|| api.get_submission(id))?;
        Ok(&self.confirmed)
    }
}

/// Edits a rubric locally and saves it with create or update as appropriate.
pub struct RubricEditor<'a, A: AssessmentApi> {
    api: &'a A,
    rubric: Rubric,
    action: ActionState,
}

impl<'a, A: AssessmentApi> RubricEditor<'a, A> {
    pub fn new(api: &'a A, rubric: Rubric) -> Self {
        RubricEditor {
            api,
            rubric,
            action: ActionState::default(),
        }
    }

    pub fn load(api: &'a A, id: u64) -> Result<Self> {
        Ok(RubricEditor::new(api, api.get_rubric(id)?))
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Mutable access for criterion edits; the rubric's mutators keep derived fields current.
    pub fn rubric_mut(&mut self) -> &mut Rubric {
        &mut self.rubric
    }

    pub fn action_state(&self) -> &ActionState {
        &self.action
    }

    /// Validates and saves the rubric, then adopts the server's copy.
    pub fn save(&mut self) -> Result<&Rubric> {
        let mut draft = self.rubric.clone();
        if let Err(e) = draft.prepare_for_save() {
            self.action.error = Some(e.to_string());
            return Err(e);
        }
        let api = self.api;
        let saved = self.action.run(|| match draft.id {
            Some(id) => api.update_rubric(id, &draft),
            None => api.create_rubric(&draft),
        })?;
        log::info!("Rubric {:?} saved ({} points)", saved.id, saved.total_points);
        self.rubric = saved;
        Ok(&self.rubric)
    }

    /// Deletes the rubric on the server. A rubric that was never saved has nothing to delete.
    pub fn delete(&mut self) -> Result<()> {
        let id = self
            .rubric
            .id
            .ok_or_else(|| GradingError::validation("This rubric has not been saved yet"))?;
        let api = self.api;
        self.action.run(|| api.delete_rubric(id))?;
        self.rubric.id = None;
        Ok(())
    }
}
