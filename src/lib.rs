//! uiflow - resilient UI flows for mobile apps over WebDriver
//!
//! The engine locates elements through ordered candidate locators with
//! independent timeouts, performs actions, captures screenshots and keeps
//! one remote session per flow.

pub mod automation;
pub mod cli;
pub mod commands;
pub mod common;
pub mod engine;
pub mod testing;
pub mod webdriver;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use engine::{
    Action, ActionStep, Criticality, FlowOutcome, FlowResult, FlowRunner, LocatorCandidate,
    StepOutcome, StepResult,
};
