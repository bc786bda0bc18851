//! Flow files and the runner that drives them
//!
//! Flows are YAML files describing ordered steps. The runner expands
//! variables, executes each flow in its own session and prints a transcript;
//! a JSON report can be written for CI.

mod config;
mod report;
mod runner;

pub use config::*;
pub use report::{FlowReport, RunReport, StepReport};
pub use runner::{build_runner, check_flows, prepare_flows, run_flows, PreparedFlow};
