//! Remote automation session interface
//!
//! The engine only talks to these traits. The WebDriver client in
//! `crate::webdriver` is the production implementation; tests provide
//! scripted ones.

mod types;

pub use types::*;

use async_trait::async_trait;
use std::time::Duration;

use crate::common::Result;

/// Something that can open automation sessions, e.g. an Appium server
#[async_trait]
pub trait AutomationHost: Send + Sync {
    /// Open a new session with the given capabilities
    async fn open_session(&self, caps: &Capabilities) -> Result<Box<dyn AutomationSession>>;

    /// Short description of the endpoint for logs
    fn endpoint(&self) -> String;
}

/// A live automation session against one device
///
/// Every method is one round-trip to the remote host.
#[async_trait]
pub trait AutomationSession: Send {
    /// Session identifier assigned by the host
    fn id(&self) -> &str;

    /// Pause between lookups while waiting for an element to appear
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    /// Look up a single element; `Error::ElementNotFound` when absent
    async fn find_element(&mut self, query: &str) -> Result<ElementHandle>;

    /// Wait up to `timeout` for the element to be displayed
    ///
    /// Returns `Ok(false)` when the deadline passes first.
    async fn wait_displayed(&mut self, element: &ElementHandle, timeout: Duration) -> Result<bool>;

    async fn tap(&mut self, element: &ElementHandle) -> Result<()>;

    /// Replace the element's text content
    async fn set_value(&mut self, element: &ElementHandle, text: &str) -> Result<()>;

    async fn element_state(&mut self, element: &ElementHandle) -> Result<ElementState>;

    /// Identity of the app currently in the foreground
    async fn current_app_id(&mut self) -> Result<String>;

    /// PNG screenshot of the current screen
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    async fn back(&mut self) -> Result<()>;

    async fn scroll(&mut self, gesture: &ScrollGesture) -> Result<()>;

    /// End the session on the host
    async fn close(&mut self) -> Result<()>;
}
