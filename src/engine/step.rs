//! Step definitions and per-step results

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::automation::{ElementState, Gesture};

/// One query that may locate the step's element, with its own deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorCandidate {
    pub query: String,
    /// Bound on the query plus the displayed wait for this candidate
    pub display_timeout: Duration,
}

impl LocatorCandidate {
    pub fn new(query: impl Into<String>, display_timeout: Duration) -> Self {
        Self {
            query: query.into(),
            display_timeout,
        }
    }
}

/// What to do with the resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Tap,
    SetText(String),
    /// Read text and displayed state; the result lands in `StepResult::observed`
    ReadState,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::SetText(_) => "set text",
            Self::ReadState => "read state",
        }
    }
}

/// Whether a failing step aborts the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    #[default]
    Required,
    BestEffort,
}

/// A logical UI action: an ordered list of candidates plus what to do with
/// the first one that shows up
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStep {
    pub name: String,
    pub candidates: Vec<LocatorCandidate>,
    pub action: Action,
    pub criticality: Criticality,
    /// Pause after a successful action so transitions can finish
    pub post_action_settle: Duration,
    /// Label of the screenshot taken after the step
    pub diagnostic_label: String,
    /// Gestures issued before resolving; failures are ignored
    pub prelude: Vec<Gesture>,
}

impl ActionStep {
    /// Create a required step with no candidates, no settle delay and a
    /// screenshot label derived from the name
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        let name = name.into();
        let diagnostic_label = format!("{}.png", slug(&name));
        Self {
            name,
            candidates: Vec::new(),
            action,
            criticality: Criticality::Required,
            post_action_settle: Duration::ZERO,
            diagnostic_label,
            prelude: Vec::new(),
        }
    }

    pub fn candidate(mut self, query: impl Into<String>, display_timeout: Duration) -> Self {
        self.candidates
            .push(LocatorCandidate::new(query, display_timeout));
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.criticality = Criticality::BestEffort;
        self
    }

    pub fn settle(mut self, delay: Duration) -> Self {
        self.post_action_settle = delay;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.diagnostic_label = label.into();
        self
    }

    pub fn before(mut self, gesture: Gesture) -> Self {
        self.prelude.push(gesture);
        self
    }

    /// Candidate queries in declared order
    pub fn queries(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.query.as_str()).collect()
    }

    /// Worst-case time spent resolving: the sum of all candidate timeouts
    pub fn resolution_budget(&self) -> Duration {
        self.candidates.iter().map(|c| c.display_timeout).sum()
    }
}

/// Lowercase, underscore-separated form of a step name
pub(crate) fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "step".to_string()
    } else {
        trimmed.to_string()
    }
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    SkippedBestEffort,
    FailedRequired,
}

/// Result of executing one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: ActionStep,
    pub outcome: StepOutcome,
    pub error: Option<String>,
    /// Index of the candidate that matched
    pub matched_candidate: Option<usize>,
    /// State read by a `ReadState` action
    pub observed: Option<ElementState>,
    /// Where the step's screenshot was written, if capture succeeded
    pub artifact: Option<PathBuf>,
}

impl StepResult {
    pub fn is_failure(&self) -> bool {
        self.outcome == StepOutcome::FailedRequired
    }

    /// The query of the candidate that matched
    pub fn matched_query(&self) -> Option<&str> {
        self.matched_candidate
            .and_then(|i| self.step.candidates.get(i))
            .map(|c| c.query.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let step = ActionStep::new("Find Sign Up", Action::Tap)
            .candidate("//a", Duration::from_millis(8000))
            .candidate("//b", Duration::from_millis(2000));

        assert_eq!(step.criticality, Criticality::Required);
        assert_eq!(step.diagnostic_label, "find_sign_up.png");
        assert_eq!(step.queries(), vec!["//a", "//b"]);
        assert_eq!(step.resolution_budget(), Duration::from_secs(10));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Open profile (best effort)"), "open_profile_best_effort");
        assert_eq!(slug("  ✓ "), "step");
    }
}
