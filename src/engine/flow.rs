//! Flow execution
//!
//! Runs an ordered list of steps inside one session. The session is
//! released on every exit path, including a panic inside the step loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::Serialize;

use crate::common::{Error, Result};

use super::executor::StepExecutor;
use super::lifecycle::{SessionConfig, SessionHandle, SessionLifecycleManager};
use super::step::{ActionStep, StepOutcome, StepResult};

/// Flow execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    SessionOpening,
    Running,
    Closing,
    Done,
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::SessionOpening => write!(f, "session-opening"),
            Self::Running => write!(f, "running"),
            Self::Closing => write!(f, "closing"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowOutcome {
    Passed,
    Failed,
}

/// Result of one flow execution
#[derive(Debug, Clone)]
pub struct FlowResult {
    pub flow_name: String,
    /// Results of the steps that were attempted, in order
    pub step_results: Vec<StepResult>,
    pub overall_outcome: FlowOutcome,
    pub started_at: DateTime<Utc>,
    pub session_opened_at: Option<DateTime<Utc>>,
    pub session_closed_at: Option<DateTime<Utc>>,
    /// Foreground app observed after launch
    pub app_id: Option<String>,
    /// Acquisition failure or unexpected error outside step handling
    pub error: Option<String>,
}

impl FlowResult {
    pub fn passed(&self) -> bool {
        self.overall_outcome == FlowOutcome::Passed
    }

    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.step_results
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }

    /// The step that aborted the flow, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.is_failure())
    }
}

/// Runs flows one session at a time
#[derive(Clone)]
pub struct FlowRunner {
    lifecycle: SessionLifecycleManager,
    executor: StepExecutor,
}

impl FlowRunner {
    pub fn new(lifecycle: SessionLifecycleManager, executor: StepExecutor) -> Self {
        Self {
            lifecycle,
            executor,
        }
    }

    /// Execute `steps` in order inside a fresh session
    pub async fn run(
        &self,
        flow_name: &str,
        steps: &[ActionStep],
        config: &SessionConfig,
    ) -> FlowResult {
        let mut state = FlowState::Idle;
        let mut result = FlowResult {
            flow_name: flow_name.to_string(),
            step_results: Vec::with_capacity(steps.len()),
            overall_outcome: FlowOutcome::Failed,
            started_at: Utc::now(),
            session_opened_at: None,
            session_closed_at: None,
            app_id: None,
            error: None,
        };

        advance(flow_name, &mut state, FlowState::SessionOpening);
        let mut handle = match self.lifecycle.acquire(config).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(flow = %flow_name, "{}", e);
                result.error = Some(e.to_string());
                advance(flow_name, &mut state, FlowState::Done);
                return result;
            }
        };
        result.session_opened_at = Some(handle.opened_at());
        result.app_id = Some(handle.app_id().to_string());
        if let Ok(session) = handle.session() {
            let label = format!("{}_0_launch.png", flow_name);
            self.executor.capture(session, &label).await;
        }

        advance(flow_name, &mut state, FlowState::Running);
        let run = AssertUnwindSafe(self.run_steps(&mut handle, steps, &mut result.step_results))
            .catch_unwind()
            .await;

        let unexpected = match run {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(
                Error::Internal(format!("step loop panicked: {}", panic_message(&*panic)))
                    .to_string(),
            ),
        };

        advance(flow_name, &mut state, FlowState::Closing);
        if let Ok(session) = handle.session() {
            let label = format!("{}_final.png", flow_name);
            self.executor.capture(session, &label).await;
        }
        self.lifecycle.release(&mut handle).await;
        result.session_closed_at = handle.closed_at();

        let step_failed = result.step_results.iter().any(|r| r.is_failure());
        result.overall_outcome = if step_failed || unexpected.is_some() {
            FlowOutcome::Failed
        } else {
            FlowOutcome::Passed
        };
        if let Some(message) = unexpected {
            tracing::error!(flow = %flow_name, "{}", message);
            result.error = Some(message);
        }

        advance(flow_name, &mut state, FlowState::Done);
        tracing::info!(
            flow = %flow_name,
            outcome = ?result.overall_outcome,
            steps = result.step_results.len(),
            "Flow finished"
        );
        result
    }

    /// Run steps until the first required failure
    async fn run_steps(
        &self,
        handle: &mut SessionHandle,
        steps: &[ActionStep],
        results: &mut Vec<StepResult>,
    ) -> Result<()> {
        for step in steps {
            let step_result = self.executor.execute(handle.session()?, step).await;
            let halt = step_result.outcome == StepOutcome::FailedRequired;
            results.push(step_result);
            if halt {
                tracing::debug!(step = %step.name, "Halting flow after required failure");
                break;
            }
        }
        Ok(())
    }
}

fn advance(flow: &str, state: &mut FlowState, next: FlowState) {
    tracing::debug!(flow = %flow, "{} -> {}", state, next);
    *state = next;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
