//! Step execution
//!
//! Runs one step: prelude gestures, resolution, the action, the settle
//! delay and a diagnostic capture. Every failure is turned into a
//! `StepOutcome` according to the step's criticality.

use std::path::PathBuf;
use std::sync::Arc;

use crate::automation::{AutomationSession, ElementHandle, ElementState, Gesture};
use crate::common::{Error, Result};

use super::diagnostics::DiagnosticSink;
use super::resolver::{resolve, ResolutionOutcome};
use super::step::{Action, ActionStep, Criticality, StepOutcome, StepResult};

/// Executes steps against a session
#[derive(Clone)]
pub struct StepExecutor {
    sink: Arc<dyn DiagnosticSink>,
    capture: bool,
}

impl StepExecutor {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            capture: true,
        }
    }

    /// Skip screenshots entirely
    pub fn without_capture(mut self) -> Self {
        self.capture = false;
        self
    }

    /// Run one step and report how it ended
    pub async fn execute(
        &self,
        session: &mut dyn AutomationSession,
        step: &ActionStep,
    ) -> StepResult {
        tracing::debug!(step = %step.name, "Executing step");

        run_prelude(&mut *session, step).await;

        let attempt = attempt_step(&mut *session, step).await;
        let artifact = self.capture(&mut *session, &step.diagnostic_label).await;

        let mut result = StepResult {
            step: step.clone(),
            outcome: StepOutcome::Success,
            error: None,
            matched_candidate: None,
            observed: None,
            artifact,
        };

        match attempt {
            Ok((index, observed)) => {
                tracing::info!(step = %step.name, candidate = index, "Step succeeded");
                result.matched_candidate = Some(index);
                result.observed = observed;
            }
            Err(e) => match step.criticality {
                Criticality::Required => {
                    tracing::error!(step = %step.name, "Required step failed: {}", e);
                    result.outcome = StepOutcome::FailedRequired;
                    result.error = Some(e.to_string());
                }
                Criticality::BestEffort => {
                    tracing::warn!(step = %step.name, "Skipping best-effort step: {}", e);
                    result.outcome = StepOutcome::SkippedBestEffort;
                    result.error = Some(e.to_string());
                }
            },
        }

        result
    }

    /// Capture a screenshot under `label`
    ///
    /// Failures are logged and swallowed.
    pub async fn capture(
        &self,
        session: &mut dyn AutomationSession,
        label: &str,
    ) -> Option<PathBuf> {
        if !self.capture {
            return None;
        }

        let saved = async {
            let bytes = session
                .screenshot()
                .await
                .map_err(|e| Error::capture_failed(label, &e.to_string()))?;
            self.sink.persist(label, &bytes).await
        }
        .await;

        match saved {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Screenshot failed: {}", e);
                None
            }
        }
    }
}

/// Issue the step's prelude gestures, ignoring failures
async fn run_prelude(session: &mut dyn AutomationSession, step: &ActionStep) {
    for gesture in &step.prelude {
        let result = match gesture {
            Gesture::Back => session.back().await,
            Gesture::Scroll(scroll) => session.scroll(scroll).await,
        };
        if let Err(e) = result {
            tracing::debug!(step = %step.name, "Ignoring failed {:?} gesture: {}", gesture, e);
        }
    }
}

/// Resolve, act and settle; returns the matched index and any read state
async fn attempt_step(
    session: &mut dyn AutomationSession,
    step: &ActionStep,
) -> Result<(usize, Option<ElementState>)> {
    let (element, index) = match resolve(&mut *session, &step.candidates).await {
        ResolutionOutcome::Found {
            element,
            candidate_index,
        } => (element, candidate_index),
        ResolutionOutcome::NotFound => {
            return Err(Error::resolution_exhausted(&step.name, &step.queries()));
        }
    };

    let observed = perform(session, step, &element)
        .await
        .map_err(|e| Error::action_failed(&step.name, step.action.label(), &e.to_string()))?;

    if !step.post_action_settle.is_zero() {
        tokio::time::sleep(step.post_action_settle).await;
    }

    Ok((index, observed))
}

async fn perform(
    session: &mut dyn AutomationSession,
    step: &ActionStep,
    element: &ElementHandle,
) -> Result<Option<ElementState>> {
    match &step.action {
        Action::Tap => session.tap(element).await.map(|_| None),
        Action::SetText(text) => session.set_value(element, text).await.map(|_| None),
        Action::ReadState => session.element_state(element).await.map(Some),
    }
}
