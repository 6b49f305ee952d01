//! Ordered sub-task plan with per-step status.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{PlanError, PlanResult};

/// Separator between concurrently runnable sub-tasks in [`Plan::current_step`].
pub const STEP_SEPARATOR: &str = "<sep>";

/// Progress of a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet picked up.
    #[default]
    NotStarted,
    /// Currently being executed.
    InProgress,
    /// Done.
    Completed,
}

impl StepStatus {
    /// Get the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
        }
    }

    fn marker(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(StepStatus::NotStarted),
            "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            other => Err(PlanError::InvalidStatus(other.to_string())),
        }
    }
}

fn step_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^Step\s*(\d+)\.\s?([\s\S]*?)\s?[：:]([\s\S]*)$").ok())
        .as_ref()
}

/// An ordered list of sub-tasks with positional status and notes.
///
/// `steps`, `step_status` and `notes` always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan title.
    pub title: String,
    /// Stage label per step; filled by [`Plan::formatted`].
    #[serde(default)]
    pub stages: Vec<String>,
    /// Step descriptions.
    pub steps: Vec<String>,
    /// Status of each step.
    pub step_status: Vec<StepStatus>,
    /// Free-form note per step.
    pub notes: Vec<String>,
}

impl Plan {
    /// Create a plan with every step `not_started`.
    pub fn create(title: impl Into<String>, steps: Vec<String>) -> Self {
        let len = steps.len();
        Self {
            title: title.into(),
            stages: Vec::new(),
            steps,
            step_status: vec![StepStatus::NotStarted; len],
            notes: vec![String::new(); len],
        }
    }

    /// Check that the positional arrays agree in length.
    pub fn validate(&self) -> PlanResult<()> {
        let steps = self.steps.len();
        if self.step_status.len() != steps || self.notes.len() != steps {
            return Err(PlanError::LengthMismatch {
                steps,
                statuses: self.step_status.len(),
                notes: self.notes.len(),
            });
        }
        Ok(())
    }

    /// Replace the title and/or steps.
    ///
    /// A step whose text is unchanged at the same position keeps its status
    /// and note; every other step starts over as `not_started`.
    pub fn update(&mut self, title: Option<String>, steps: Option<Vec<String>>) -> PlanResult<()> {
        self.validate()?;
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(new_steps) = steps {
            let mut statuses = Vec::with_capacity(new_steps.len());
            let mut notes = Vec::with_capacity(new_steps.len());
            for (i, step) in new_steps.iter().enumerate() {
                if self.steps.get(i) == Some(step) {
                    statuses.push(self.step_status[i]);
                    notes.push(self.notes[i].clone());
                } else {
                    statuses.push(StepStatus::NotStarted);
                    notes.push(String::new());
                }
            }
            self.steps = new_steps;
            self.step_status = statuses;
            self.notes = notes;
            self.stages.clear();
        }
        Ok(())
    }

    /// Set the status and/or note of one step.
    pub fn mark_step(
        &mut self,
        index: usize,
        status: Option<StepStatus>,
        note: Option<String>,
    ) -> PlanResult<()> {
        self.validate()?;
        if index >= self.steps.len() {
            return Err(PlanError::StepIndexOutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        if let Some(status) = status {
            self.step_status[index] = status;
        }
        if let Some(note) = note {
            self.notes[index] = note;
        }
        Ok(())
    }

    /// Advance the plan by one step.
    ///
    /// Every active step is completed and the first not-started step after
    /// it becomes active. When nothing is active, the first not-started step
    /// is started.
    pub fn step_plan(&mut self) -> PlanResult<()> {
        self.validate()?;
        let mut resume_from = 0;
        for (i, status) in self.step_status.iter_mut().enumerate() {
            if *status == StepStatus::InProgress {
                *status = StepStatus::Completed;
                resume_from = i + 1;
            }
        }
        let next = self.step_status[resume_from..]
            .iter()
            .position(|s| *s == StepStatus::NotStarted)
            .map(|offset| resume_from + offset)
            .or_else(|| {
                self.step_status
                    .iter()
                    .position(|s| *s == StepStatus::NotStarted)
            });
        if let Some(next) = next {
            self.step_status[next] = StepStatus::InProgress;
        }
        Ok(())
    }

    /// Mark every step completed.
    pub fn finish(&mut self) {
        for status in &mut self.step_status {
            *status = StepStatus::Completed;
        }
    }

    /// All active steps, joined by [`STEP_SEPARATOR`]; empty when none is active.
    pub fn current_step(&self) -> String {
        self.steps
            .iter()
            .zip(&self.step_status)
            .filter(|(_, status)| **status == StepStatus::InProgress)
            .map(|(step, _)| step.as_str())
            .collect::<Vec<_>>()
            .join(STEP_SEPARATOR)
    }

    /// Whether every step is completed. An empty plan is complete.
    pub fn all_complete(&self) -> bool {
        self.step_status.iter().all(|s| *s == StepStatus::Completed)
    }

    /// Number of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.step_status.iter().filter(|s| **s == status).count()
    }

    /// Copy with `"Step N. Stage: description"` steps split into stage and description.
    ///
    /// Steps that do not follow the pattern are kept as-is with an empty stage.
    pub fn formatted(&self) -> Self {
        let mut stages = Vec::with_capacity(self.steps.len());
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step_pattern().and_then(|p| p.captures(step)) {
                Some(caps) => {
                    stages.push(caps[2].trim().to_string());
                    steps.push(caps[3].trim().to_string());
                }
                None => {
                    stages.push(String::new());
                    steps.push(step.clone());
                }
            }
        }
        Self {
            title: self.title.clone(),
            stages,
            steps,
            step_status: self.step_status.clone(),
            notes: self.notes.clone(),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.steps.len();
        let completed = self.count(StepStatus::Completed);
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 * 100.0 / total as f64
        };

        writeln!(f, "Plan: {}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count() + 6))?;
        writeln!(
            f,
            "Progress: {}/{} steps completed ({:.1}%)",
            completed, total, percent
        )?;
        writeln!(
            f,
            "Status: {} completed, {} in progress, {} not started",
            completed,
            self.count(StepStatus::InProgress),
            self.count(StepStatus::NotStarted)
        )?;
        writeln!(f)?;
        writeln!(f, "Steps:")?;
        for (i, step) in self.steps.iter().enumerate() {
            let status = self.step_status.get(i).copied().unwrap_or_default();
            writeln!(f, "{}. {} {}", i, status.marker(), step)?;
            if let Some(note) = self.notes.get(i).filter(|n| !n.is_empty()) {
                writeln!(f, "   Notes: {}", note)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_and_validate() {
        let plan = Plan::create("Report", steps(&["collect", "write"]));
        assert_eq!(plan.step_status, vec![StepStatus::NotStarted; 2]);
        assert_eq!(plan.notes.len(), 2);
        assert!(plan.validate().is_ok());

        let mut broken = plan.clone();
        broken.notes.pop();
        assert!(matches!(
            broken.validate(),
            Err(PlanError::LengthMismatch { steps: 2, statuses: 2, notes: 1 })
        ));
        assert!(broken.step_plan().is_err());
    }

    #[test]
    fn test_all_complete() {
        let mut plan = Plan::create("t", steps(&["a", "b", "c"]));
        assert!(!plan.all_complete());
        plan.finish();
        assert!(plan.all_complete());

        assert!(Plan::create("empty", Vec::new()).all_complete());
    }

    #[test]
    fn test_step_plan_advances_in_order() {
        let mut plan = Plan::create("t", steps(&["a", "b", "c"]));
        assert_eq!(plan.current_step(), "");

        plan.step_plan().unwrap();
        assert_eq!(plan.current_step(), "a");

        plan.step_plan().unwrap();
        assert_eq!(plan.current_step(), "b");
        assert_eq!(plan.step_status[0], StepStatus::Completed);

        plan.step_plan().unwrap();
        plan.step_plan().unwrap();
        assert_eq!(plan.current_step(), "");
        assert!(plan.all_complete());

        // Advancing a finished plan is a no-op.
        plan.step_plan().unwrap();
        assert!(plan.all_complete());
    }

    #[test]
    fn test_step_plan_on_empty_plan() {
        let mut plan = Plan::create("empty", Vec::new());
        plan.step_plan().unwrap();
        assert!(plan.all_complete());
        assert_eq!(plan.current_step(), "");
    }

    #[test]
    fn test_current_step_joins_active_steps() {
        let mut plan = Plan::create("t", steps(&["a", "b", "c"]));
        plan.mark_step(0, Some(StepStatus::InProgress), None).unwrap();
        plan.mark_step(2, Some(StepStatus::InProgress), None).unwrap();
        assert_eq!(plan.current_step(), "a<sep>c");
    }

    #[test]
    fn test_mark_step_out_of_range() {
        let mut plan = Plan::create("t", steps(&["a"]));
        let err = plan.mark_step(3, Some(StepStatus::Completed), None).unwrap_err();
        assert_eq!(err, PlanError::StepIndexOutOfRange { index: 3, len: 1 });

        plan.mark_step(0, None, Some("checked".to_string())).unwrap();
        assert_eq!(plan.notes[0], "checked");
        assert_eq!(plan.step_status[0], StepStatus::NotStarted);
    }

    #[test]
    fn test_update_keeps_unchanged_steps() {
        let mut plan = Plan::create("t", steps(&["a", "b"]));
        plan.mark_step(0, Some(StepStatus::Completed), Some("done".to_string())).unwrap();
        plan.update(None, Some(steps(&["a", "x", "y"]))).unwrap();

        assert_eq!(plan.step_status, vec![
            StepStatus::Completed,
            StepStatus::NotStarted,
            StepStatus::NotStarted
        ]);
        assert_eq!(plan.notes[0], "done");
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("in_progress".parse::<StepStatus>().unwrap(), StepStatus::InProgress);
        assert!(matches!(
            "blocked".parse::<StepStatus>(),
            Err(PlanError::InvalidStatus(_))
        ));
        assert_eq!(
            serde_json::to_string(&StepStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
    }

    #[test]
    fn test_formatted_splits_stage() {
        let plan = Plan::create(
            "t",
            steps(&["Step 1. Research: find sources", "plain step"]),
        );
        let formatted = plan.formatted();
        assert_eq!(formatted.stages, vec!["Research".to_string(), String::new()]);
        assert_eq!(formatted.steps, vec!["find sources".to_string(), "plain step".to_string()]);
        assert_eq!(formatted.step_status.len(), 2);
    }

    #[test]
    fn test_display() {
        let mut plan = Plan::create("Trip", steps(&["book", "pack"]));
        plan.step_plan().unwrap();
        plan.mark_step(0, None, Some("flight found".to_string())).unwrap();

        let text = plan.to_string();
        assert!(text.contains("Plan: Trip"));
        assert!(text.contains("Progress: 0/2 steps completed (0.0%)"));
        assert!(text.contains("0. [→] book"));
        assert!(text.contains("Notes: flight found"));
    }
}
