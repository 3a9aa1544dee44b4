//! Score aggregation for graded submissions.
//!
//! Everything here is a pure function of its input: the same submission always
//! aggregates to the same numbers, and nothing is cached between calls.

use crate::submission::{AssessmentSubmission, CriterionScore};
use serde::Serialize;

/// Teacher override when present, otherwise the AI-assigned points.
pub fn final_points(score: &CriterionScore) -> f64 {
    score.teacher_points.unwrap_or(score.points_earned)
}

/// Sum of `final_points` over a list of criterion scores, or `None` for an empty list.
pub fn criteria_total(scores: &[CriterionScore]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().map(final_points).sum())
    }
}

/// The score a submission is reported with.
///
/// Precedence: a teacher's overall `teacher_score`, then the sum of the per-criterion
/// final points, then the AI's overall `score`. `None` while nothing has been graded.
pub fn final_score(submission: &AssessmentSubmission) -> Option<f64> {
    submission
        .teacher_score
        .or_else(|| criteria_total(&submission.criterion_scores))
        .or(submission.score)
}

/// `final_score / max_score * 100`, or `None` when either side is missing or
/// `max_score` is zero.
pub fn percentage(submission: &AssessmentSubmission) -> Option<f64> {
    let max_score = submission.max_score.filter(|max| *max != 0.0 && max.is_finite())?;
    let score = final_score(submission)?;
    Some(score * 100.0 / max_score)
}

/// One line of a score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionResult {
    pub criterion: u64,
    pub name: Option<String>,
    pub final_points: f64,
    pub max_points: Option<f64>,
    pub overridden: bool,
}

/// Aggregated view of a submission's grading results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub final_score: Option<f64>,
    pub max_score: Option<f64>,
    pub percentage: Option<f64>,
    pub criteria: Vec<CriterionResult>,
}

impl ScoreSummary {
    pub fn of(submission: &AssessmentSubmission) -> Self {
        ScoreSummary {
            final_score: final_score(submission),
            max_score: submission.max_score,
            percentage: percentage(submission),
            criteria: submission
                .criterion_scores
                .iter()
                .map(|score| CriterionResult {
                    criterion: score.criterion,
                    name: score.criterion_name.clone(),
                    final_points: final_points(score),
                    max_points: score.max_points,
                    overridden: score.teacher_points.is_some(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(criterion: u64, points_earned: f64, teacher_points: Option<f64>) -> CriterionScore {
        CriterionScore {
            criterion,
            points_earned,
            teacher_points,
            ..Default::default()
        }
    }

    #[test]
    fn test_final_points_prefers_teacher() {
        assert_eq!(final_points(&score(1, 8.0, Some(9.0))), 9.0);
        assert_eq!(final_points(&score(1, 8.0, None)), 8.0);
        assert_eq!(final_points(&score(1, 8.0, Some(0.0))), 0.0);
    }

    #[test]
    fn test_final_score_precedence() {
        let mut submission = AssessmentSubmission {
            score: Some(11.0),
            max_score: Some(15.0),
            ..Default::default()
        };
        assert_eq!(final_score(&submission), Some(11.0));

        submission.criterion_scores = vec![score(1, 8.0, Some(9.0)), score(2, 4.0, None)];
        assert_eq!(final_score(&submission), Some(13.0));

        submission.teacher_score = Some(12.0);
        assert_eq!(final_score(&submission), Some(12.0));

        assert_eq!(final_score(&AssessmentSubmission::default()), None);
    }

    #[test]
    fn test_percentage_never_divides_by_zero() {
        let mut submission = AssessmentSubmission {
            score: Some(5.0),
            max_score: Some(0.0),
            ..Default::default()
        };
        assert_eq!(percentage(&submission), None);

        submission.max_score = None;
        assert_eq!(percentage(&submission), None);

        submission.max_score = Some(20.0);
        assert_eq!(percentage(&submission), Some(25.0));

        submission.score = None;
        assert_eq!(percentage(&submission), None);
    }

    #[test]
    fn test_aggregation_is_repeatable() {
        let submission = AssessmentSubmission {
            max_score: Some(15.0),
            criterion_scores: vec![score(1, 7.5, None), score(2, 3.0, Some(4.5))],
            ..Default::default()
        };
        let first = ScoreSummary::of(&submission);
        let second = ScoreSummary::of(&submission);
        assert_eq!(first, second);
        assert_eq!(first.final_score, Some(12.0));
        assert_eq!(first.percentage, Some(80.0));
        assert!(first.criteria[1].overridden);
        assert!(!first.criteria[0].overridden);
    }
}
