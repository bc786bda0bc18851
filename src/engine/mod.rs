//! Resilient locate-and-act engine
//!
//! A step is an ordered list of locator candidates plus an action. The
//! resolver tries candidates in order with independent timeouts, the
//! executor turns failures into outcomes according to the step's
//! criticality, and the flow runner strings steps together inside one
//! session that is always released.

pub mod diagnostics;
pub mod executor;
pub mod flow;
pub mod lifecycle;
pub mod resolver;
pub mod step;

#[cfg(test)]
pub(crate) mod testkit;

pub use diagnostics::{DiagnosticSink, DirectorySink, NullSink};
pub use executor::StepExecutor;
pub use flow::{FlowOutcome, FlowResult, FlowRunner, FlowState};
pub use lifecycle::{EndpointSlot, SessionConfig, SessionHandle, SessionLifecycleManager};
pub use resolver::{resolve, ResolutionOutcome};
pub use step::{
    Action, ActionStep, Criticality, LocatorCandidate, StepOutcome, StepResult,
};
