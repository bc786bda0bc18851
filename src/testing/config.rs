//! Flow definition files
//!
//! Defines the data structures for deserializing YAML flow definitions and
//! turning them into engine steps.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::automation::Gesture;
use crate::common::{expand_placeholders, Error, Result};
use crate::engine::{Action, ActionStep, Criticality, LocatorCandidate};

/// A complete flow loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct FlowDefinition {
    /// Name of the flow, also the screenshot prefix
    pub name: String,
    /// Optional description of what the flow exercises
    pub description: Option<String>,
    /// Values substituted for `${name}` in queries and text
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Launch settle delay for this flow, overriding the configured one
    pub launch_settle_ms: Option<u64>,
    /// Defaults applied to steps that don't set their own
    #[serde(default)]
    pub defaults: StepDefaults,
    /// The steps, in execution order
    pub steps: Vec<StepDefinition>,
}

/// Per-flow step defaults
#[derive(Deserialize, Debug, Default)]
pub struct StepDefaults {
    /// Candidate display timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Settle delay after a successful action in milliseconds
    pub settle_ms: Option<u64>,
}

/// What a step does with its element
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    SetText,
    ReadState,
}

/// A single step in the flow
#[derive(Deserialize, Debug)]
pub struct StepDefinition {
    /// Human-readable step name
    pub name: String,
    /// Candidate queries, most specific first
    #[serde(default)]
    pub candidates: Vec<CandidateDefinition>,
    pub action: ActionKind,
    /// Text for `set_text`
    pub text: Option<String>,
    #[serde(default)]
    pub criticality: Criticality,
    /// Settle delay after a successful action in milliseconds
    pub settle_ms: Option<u64>,
    /// Screenshot file name; derived from the flow and step name if absent
    pub screenshot: Option<String>,
    /// Gestures issued before resolving, failures ignored
    #[serde(default)]
    pub before: Vec<Gesture>,
}

/// A candidate is either a bare query or a query with its own timeout
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum CandidateDefinition {
    Query(String),
    Detailed {
        query: String,
        timeout_ms: Option<u64>,
    },
}

impl CandidateDefinition {
    fn query(&self) -> &str {
        match self {
            Self::Query(query) | Self::Detailed { query, .. } => query,
        }
    }

    fn timeout_ms(&self) -> Option<u64> {
        match self {
            Self::Query(_) => None,
            Self::Detailed { timeout_ms, .. } => *timeout_ms,
        }
    }
}

/// Variable values supplied from outside the flow file
#[derive(Debug, Clone)]
pub struct Variables {
    overrides: BTreeMap<String, String>,
    unix_ms: String,
}

impl Variables {
    /// Overrides take precedence over the flow's own variables
    pub fn new(overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            overrides: overrides.into_iter().collect(),
            unix_ms: chrono::Utc::now().timestamp_millis().to_string(),
        }
    }

    /// Parse a `key=value` pair as given on the command line
    pub fn parse_pair(pair: &str) -> Result<(String, String)> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(Error::Config(format!(
                "Invalid variable '{}', expected key=value",
                pair
            ))),
        }
    }

    fn builtin(&self, name: &str) -> Option<String> {
        match name {
            "unix_ms" => Some(self.unix_ms.clone()),
            _ => None,
        }
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FlowDefinition {
    /// Load and parse a flow file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse flow YAML; `origin` names the source in errors
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let flow: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::flow_definition(origin, e.to_string()))?;
        flow.validate(origin)?;
        Ok(flow)
    }

    fn validate(&self, origin: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::flow_definition(origin, "flow name is empty"));
        }
        for (i, step) in self.steps.iter().enumerate() {
            let at = format!("step {} ('{}')", i + 1, step.name);
            if step.name.trim().is_empty() {
                return Err(Error::flow_definition(
                    origin,
                    format!("step {} has no name", i + 1),
                ));
            }
            match (step.action, &step.text) {
                (ActionKind::SetText, None) => {
                    return Err(Error::flow_definition(
                        origin,
                        format!("{}: set_text requires 'text'", at),
                    ));
                }
                (ActionKind::Tap | ActionKind::ReadState, Some(_)) => {
                    return Err(Error::flow_definition(
                        origin,
                        format!("{}: 'text' is only valid with set_text", at),
                    ));
                }
                _ => {}
            }
            if let Some(c) = step.candidates.iter().find(|c| c.query().trim().is_empty()) {
                return Err(Error::flow_definition(
                    origin,
                    format!("{}: empty candidate query {:?}", at, c),
                ));
            }
        }
        Ok(())
    }

    /// Resolve a `${name}` placeholder
    fn lookup(&self, vars: &Variables, name: &str) -> Option<String> {
        if let Some(value) = vars.overrides.get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.variables.get(name) {
            return Some(expand_placeholders(value, |n| vars.builtin(n)));
        }
        vars.builtin(name)
    }

    /// Build engine steps with variables expanded
    ///
    /// `default_timeout` applies to candidates when neither the candidate nor
    /// the flow defaults set one.
    pub fn to_steps(&self, vars: &Variables, default_timeout: Duration) -> Vec<ActionStep> {
        let expand = |s: &str| expand_placeholders(s, |name| self.lookup(vars, name));
        let flow_timeout = self
            .defaults
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default_timeout);

        self.steps
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let action = match def.action {
                    ActionKind::Tap => Action::Tap,
                    ActionKind::SetText => {
                        Action::SetText(expand(def.text.as_deref().unwrap_or_default()))
                    }
                    ActionKind::ReadState => Action::ReadState,
                };

                let candidates = def
                    .candidates
                    .iter()
                    .map(|c| {
                        let timeout = c
                            .timeout_ms()
                            .map(Duration::from_millis)
                            .unwrap_or(flow_timeout);
                        LocatorCandidate::new(expand(c.query()), timeout)
                    })
                    .collect();

                let settle_ms = def.settle_ms.or(self.defaults.settle_ms).unwrap_or(0);
                let label = def.screenshot.clone().unwrap_or_else(|| {
                    format!(
                        "{}_{}_{}.png",
                        self.name,
                        i + 1,
                        crate::engine::step::slug(&def.name)
                    )
                });

                ActionStep {
                    name: def.name.clone(),
                    candidates,
                    action,
                    criticality: def.criticality,
                    post_action_settle: Duration::from_millis(settle_ms),
                    diagnostic_label: label,
                    prelude: def.before.clone(),
                }
            })
            .collect()
    }
}
