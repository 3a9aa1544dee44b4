use crate::error::{GradingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Points given to a criterion freshly added to a rubric.
pub const DEFAULT_CRITERION_POINTS: f64 = 10.0;

fn default_weight() -> f64 {
    1.0
}

fn default_active() -> bool {
    true
}

/// One gradable dimension of a rubric.
///
/// `order` mirrors the criterion's position in its rubric and is rewritten by every
/// structural edit on the parent `Rubric`; it is never set by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub max_points: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub order: usize,
}

impl RubricCriterion {
    pub fn new(name: &str, max_points: f64) -> Self {
        RubricCriterion {
            id: None,
            name: name.to_string(),
            description: String::new(),
            max_points,
            weight: default_weight(),
            order: 0,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    fn validate(&self, position: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GradingError::validation(format!(
                "Criterion {} needs a name",
                position + 1
            )));
        }
        if !self.max_points.is_finite() || self.max_points <= 0.0 {
            return Err(GradingError::validation(format!(
                "Criterion '{}' must be worth more than 0 points",
                self.name
            )));
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(GradingError::validation(format!(
                "Criterion '{}' weight must be between 0.0 and 1.0",
                self.name
            )));
        }
        Ok(())
    }
}

impl Default for RubricCriterion {
    fn default() -> Self {
        RubricCriterion::new("", DEFAULT_CRITERION_POINTS)
    }
}

/// Field edits applied to a single criterion. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriterionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_points: Option<f64>,
    pub weight: Option<f64>,
}

/// Sum of `max_points` over a list of criteria.
pub fn total_points(criteria: &[RubricCriterion]) -> f64 {
    criteria.iter().map(|c| c.max_points).sum()
}

/// A named set of grading criteria, as exchanged with the grading API.
///
/// The `total_points` field is carried on the wire but is derived: every mutator below
/// recomputes it from `criteria`, and `prepare_for_save` does it once more right before a
/// create or update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub activity_id: Option<u64>,
    #[serde(default, skip_serializing)]
    pub created_by: Option<u64>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub total_points: f64,
    #[serde(default)]
    pub criteria: Vec<RubricCriterion>,
}

impl Rubric {
    pub fn new(title: &str) -> Self {
        Rubric {
            id: None,
            title: title.to_string(),
            description: String::new(),
            activity_id: None,
            created_by: None,
            created_at: None,
            updated_at: None,
            is_active: true,
            total_points: 0.0,
            criteria: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_activity(mut self, activity_id: u64) -> Self {
        self.activity_id = Some(activity_id);
        self
    }

    pub fn with_criterion(mut self, criterion: RubricCriterion) -> Self {
        self.add_criterion(criterion);
        self
    }

    /// Sum of the criteria's `max_points`, computed from the current list.
    pub fn total_points(&self) -> f64 {
        total_points(&self.criteria)
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    // Keeps `order` and `total_points` in step with `criteria`.
    fn sync_derived(&mut self) {
        for (position, criterion) in self.criteria.iter_mut().enumerate() {
            criterion.order = position;
        }
        self.total_points = self.total_points();
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.criteria.len() {
            return Err(GradingError::OutOfRange {
                index,
                len: self.criteria.len(),
            });
        }
        Ok(())
    }

    /// Appends a criterion at the end of the list.
    pub fn add_criterion(&mut self, criterion: RubricCriterion) {
        self.criteria.push(criterion);
        self.sync_derived();
    }

    /// Appends an empty criterion with the default point value.
    pub fn add_blank_criterion(&mut self) -> usize {
        self.add_criterion(RubricCriterion::default());
        self.criteria.len() - 1
    }

    pub fn remove_criterion(&mut self, index: usize) -> Result<RubricCriterion> {
        self.check_index(index)?;
        let removed = self.criteria.remove(index);
        self.sync_derived();
        Ok(removed)
    }

    pub fn update_criterion(&mut self, index: usize, patch: CriterionPatch) -> Result<()> {
        self.check_index(index)?;
        let criterion = &mut self.criteria[index];
        if let Some(name) = patch.name {
            criterion.name = name;
        }
        if let Some(description) = patch.description {
            criterion.description = description;
        }
        if let Some(max_points) = patch.max_points {
            criterion.max_points = max_points;
        }
        if let Some(weight) = patch.weight {
            criterion.weight = weight;
        }
        self.sync_derived();
        Ok(())
    }

    /// Swaps the criterion at `from` with its neighbour at `to`.
    ///
    /// Only moves of one position are supported. Both indices must be inside the list,
    /// otherwise the rubric is left untouched and `OutOfRange` is returned.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from.abs_diff(to) != 1 {
            return Err(GradingError::validation(format!(
                "Criteria can only move one position at a time (from {} to {})",
                from, to
            )));
        }
        self.criteria.swap(from, to);
        self.sync_derived();
        Ok(())
    }

    pub fn move_up(&mut self, index: usize) -> Result<()> {
        match index.checked_sub(1) {
            Some(target) => self.reorder(index, target),
            None => Err(GradingError::OutOfRange {
                index,
                len: self.criteria.len(),
            }),
        }
    }

    pub fn move_down(&mut self, index: usize) -> Result<()> {
        match index.checked_add(1) {
            Some(target) => self.reorder(index, target),
            None => Err(GradingError::OutOfRange {
                index,
                len: self.criteria.len(),
            }),
        }
    }

    /// Checks everything the server would otherwise reject.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(GradingError::validation("Rubric title is required"));
        }
        if self.criteria.is_empty() {
            return Err(GradingError::validation(
                "A rubric needs at least one criterion",
            ));
        }
        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for (position, criterion) in self.criteria.iter().enumerate() {
            criterion.validate(position)?;
            if !names.insert(criterion.name.trim()) {
                return Err(GradingError::validation(format!(
                    "Criterion name '{}' is used more than once",
                    criterion.name
                )));
            }
            if !orders.insert(criterion.order) {
                return Err(GradingError::validation(format!(
                    "Criterion order {} is used more than once",
                    criterion.order
                )));
            }
        }
        Ok(())
    }

    /// Renumbers, recomputes the total and validates. Called before every create/update.
    pub fn prepare_for_save(&mut self) -> Result<()> {
        self.sync_derived();
        self.validate()
    }
}
