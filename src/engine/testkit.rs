//! Scripted automation doubles for engine unit tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::automation::{
    AutomationHost, AutomationSession, Capabilities, ElementHandle, ElementState, ScrollGesture,
};
use crate::common::{Error, Result};

use super::diagnostics::DiagnosticSink;

#[derive(Debug, Clone)]
enum Behavior {
    /// Displayed from the given instant on (`None` = never)
    Displayed(Option<Instant>),
    /// Missing from the tree until the given instant, then displayed
    Attached(Instant),
    InvalidSelector,
    ProtocolError,
    /// The find request never returns
    Stalled,
}

#[derive(Default)]
struct State {
    elements: HashMap<String, Behavior>,
    texts: HashMap<String, String>,
    failing_taps: Vec<String>,
    calls: Vec<String>,
    app_id: String,
    screenshot_fails: bool,
    open_fails: bool,
    close_fails: bool,
    opened: usize,
    closed: usize,
}

/// Shared script describing what a scripted session sees
#[derive(Clone)]
pub struct Script(Arc<Mutex<State>>);

impl Script {
    pub fn new() -> Self {
        let state = State {
            app_id: "com.laza.ecommerce".to_string(),
            ..State::default()
        };
        Self(Arc::new(Mutex::new(state)))
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn visible(&self, query: &str) {
        self.with(|s| {
            s.elements
                .insert(query.to_string(), Behavior::Displayed(Some(Instant::now())))
        });
    }

    pub fn appears_after(&self, query: &str, delay: Duration) {
        self.with(|s| {
            s.elements.insert(
                query.to_string(),
                Behavior::Displayed(Some(Instant::now() + delay)),
            )
        });
    }

    /// Not in the tree until `delay` has passed
    pub fn attached_after(&self, query: &str, delay: Duration) {
        self.with(|s| {
            s.elements
                .insert(query.to_string(), Behavior::Attached(Instant::now() + delay))
        });
    }

    /// Present in the tree but never displayed
    pub fn hidden(&self, query: &str) {
        self.with(|s| s.elements.insert(query.to_string(), Behavior::Displayed(None)));
    }

    pub fn invalid(&self, query: &str) {
        self.with(|s| s.elements.insert(query.to_string(), Behavior::InvalidSelector));
    }

    pub fn broken(&self, query: &str) {
        self.with(|s| s.elements.insert(query.to_string(), Behavior::ProtocolError));
    }

    pub fn stalled(&self, query: &str) {
        self.with(|s| s.elements.insert(query.to_string(), Behavior::Stalled));
    }

    pub fn text(&self, query: &str, text: &str) {
        self.with(|s| s.texts.insert(query.to_string(), text.to_string()));
    }

    pub fn fail_tap(&self, query: &str) {
        self.with(|s| s.failing_taps.push(query.to_string()));
    }

    pub fn app_id(&self, id: &str) {
        self.with(|s| s.app_id = id.to_string());
    }

    pub fn fail_screenshots(&self) {
        self.with(|s| s.screenshot_fails = true);
    }

    pub fn fail_open(&self) {
        self.with(|s| s.open_fails = true);
    }

    pub fn fail_close(&self) {
        self.with(|s| s.close_fails = true);
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn find_count(&self, query: &str) -> usize {
        let call = format!("find {}", query);
        self.with(|s| s.calls.iter().filter(|c| **c == call).count())
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| c.starts_with(prefix)).count())
    }

    pub fn opened(&self) -> usize {
        self.with(|s| s.opened)
    }

    pub fn closed(&self) -> usize {
        self.with(|s| s.closed)
    }

    fn record(&self, call: String) {
        self.with(|s| s.calls.push(call));
    }
}

/// Element handles carry their query so actions can look the script up
fn query_of(element: &ElementHandle) -> &str {
    element.id().trim_start_matches("el:")
}

pub struct ScriptedSession {
    script: Script,
}

impl ScriptedSession {
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

#[async_trait]
impl AutomationSession for ScriptedSession {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn find_element(&mut self, query: &str) -> Result<ElementHandle> {
        self.script.record(format!("find {}", query));
        let behavior = self.script.with(|s| s.elements.get(query).cloned());
        match behavior {
            Some(Behavior::Displayed(_)) => Ok(ElementHandle::new(format!("el:{}", query))),
            Some(Behavior::Attached(at)) if Instant::now() >= at => {
                Ok(ElementHandle::new(format!("el:{}", query)))
            }
            Some(Behavior::InvalidSelector) => Err(Error::InvalidSelector {
                query: query.to_string(),
                message: "unparseable".to_string(),
            }),
            Some(Behavior::ProtocolError) => Err(Error::WebDriver {
                error: "unknown error".to_string(),
                message: "instrumentation crashed".to_string(),
            }),
            Some(Behavior::Stalled) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Timeout(3_600_000))
            }
            Some(Behavior::Attached(_)) | None => Err(Error::ElementNotFound {
                query: query.to_string(),
            }),
        }
    }

    async fn wait_displayed(&mut self, element: &ElementHandle, timeout: Duration) -> Result<bool> {
        let query = query_of(element).to_string();
        self.script.record(format!("wait {}", query));
        let shown_at = self.script.with(|s| match s.elements.get(&query) {
            Some(Behavior::Displayed(at)) => *at,
            Some(Behavior::Attached(at)) => Some(*at),
            _ => None,
        });

        let deadline = Instant::now() + timeout;
        match shown_at {
            Some(at) if at <= deadline => {
                tokio::time::sleep_until(at).await;
                Ok(true)
            }
            _ => {
                tokio::time::sleep_until(deadline).await;
                Ok(false)
            }
        }
    }

    async fn tap(&mut self, element: &ElementHandle) -> Result<()> {
        let query = query_of(element).to_string();
        self.script.record(format!("tap {}", query));
        if self.script.with(|s| s.failing_taps.contains(&query)) {
            return Err(Error::WebDriver {
                error: "stale element reference".to_string(),
                message: "element detached".to_string(),
            });
        }
        Ok(())
    }

    async fn set_value(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        let query = query_of(element).to_string();
        self.script.record(format!("set {} = {}", query, text));
        self.script.with(|s| s.texts.insert(query, text.to_string()));
        Ok(())
    }

    async fn element_state(&mut self, element: &ElementHandle) -> Result<ElementState> {
        let query = query_of(element).to_string();
        self.script.record(format!("read {}", query));
        let text = self
            .script
            .with(|s| s.texts.get(&query).cloned())
            .unwrap_or_default();
        Ok(ElementState {
            text,
            displayed: true,
        })
    }

    async fn current_app_id(&mut self) -> Result<String> {
        self.script.record("app_id".to_string());
        Ok(self.script.with(|s| s.app_id.clone()))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.script.record("screenshot".to_string());
        if self.script.with(|s| s.screenshot_fails) {
            return Err(Error::WebDriver {
                error: "unknown error".to_string(),
                message: "screen is secure".to_string(),
            });
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn back(&mut self) -> Result<()> {
        self.script.record("back".to_string());
        Ok(())
    }

    async fn scroll(&mut self, _gesture: &ScrollGesture) -> Result<()> {
        self.script.record("scroll".to_string());
        Err(Error::WebDriver {
            error: "unsupported operation".to_string(),
            message: "no scrollable area".to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.script.record("close".to_string());
        self.script.with(|s| s.closed += 1);
        if self.script.with(|s| s.close_fails) {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }
}

pub struct ScriptedHost {
    pub script: Script,
}

#[async_trait]
impl AutomationHost for ScriptedHost {
    async fn open_session(&self, _caps: &Capabilities) -> Result<Box<dyn AutomationSession>> {
        self.script.record("open".to_string());
        if self.script.with(|s| s.open_fails) {
            return Err(Error::SessionAcquisition(
                "could not start UiAutomator2".to_string(),
            ));
        }
        self.script.with(|s| s.opened += 1);
        Ok(Box::new(ScriptedSession::new(self.script.clone())))
    }

    fn endpoint(&self) -> String {
        "scripted://device".to_string()
    }
}

/// Sink that remembers labels instead of writing files
#[derive(Clone, Default)]
pub struct RecordingSink {
    labels: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticSink for RecordingSink {
    async fn persist(&self, label: &str, _bytes: &[u8]) -> Result<PathBuf> {
        self.labels.lock().unwrap().push(label.to_string());
        if self.fail {
            return Err(Error::capture_failed(label, "disk full"));
        }
        Ok(PathBuf::from("/results").join(label))
    }
}

pub fn capabilities() -> Capabilities {
    Capabilities {
        platform_name: "Android".to_string(),
        automation_name: "UiAutomator2".to_string(),
        device_name: "Android Emulator".to_string(),
        platform_version: None,
        app: Some(PathBuf::from("app.apk")),
        app_package: None,
        app_activity: None,
        auto_grant_permissions: true,
        new_command_timeout: Duration::from_secs(180),
        no_reset: None,
        full_reset: None,
    }
}
