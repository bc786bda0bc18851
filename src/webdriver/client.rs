//! HTTP client for Appium / W3C WebDriver servers
//!
//! `WebDriverHost` opens sessions; `WebDriverSession` implements the
//! automation session trait with one HTTP round-trip per call.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::automation::{
    AutomationHost, AutomationSession, Capabilities, ElementHandle, ElementState, LocatorStrategy,
    ScrollGesture,
};
use crate::common::{Error, Result};

use super::protocol::{self, ServerStatus};

/// Connection to an automation server
#[derive(Clone)]
pub struct WebDriverHost {
    http: Client,
    base_url: String,
    poll_interval: Duration,
}

impl WebDriverHost {
    /// Create a host for `base_url`, e.g. `http://127.0.0.1:4723`
    ///
    /// `request_timeout` bounds every HTTP round-trip; `poll_interval` is the
    /// pause between displayed-state polls.
    pub fn new(base_url: &str, request_timeout: Duration, poll_interval: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval,
        })
    }

    /// Query the server's readiness
    pub async fn status(&self) -> Result<ServerStatus> {
        let url = format!("{}/status", self.base_url);
        let value = send(&self.http, Method::GET, &url, None, None).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl AutomationHost for WebDriverHost {
    async fn open_session(&self, caps: &Capabilities) -> Result<Box<dyn AutomationSession>> {
        let url = format!("{}/session", self.base_url);
        let body = protocol::new_session_body(caps);
        tracing::debug!("New session request: {}", body);

        let value = send(&self.http, Method::POST, &url, Some(body), None)
            .await
            .map_err(|e| Error::SessionAcquisition(e.to_string()))?;
        let id = protocol::session_id(&value)?;

        tracing::info!(session = %id, "Opened automation session");

        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            session_url: format!("{}/session/{}", self.base_url, id),
            id,
            poll_interval: self.poll_interval,
            closed: false,
        }))
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

/// One live WebDriver session
pub struct WebDriverSession {
    http: Client,
    session_url: String,
    id: String,
    poll_interval: Duration,
    closed: bool,
}

impl WebDriverSession {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        let url = format!("{}{}", self.session_url, path);
        send(&self.http, method, &url, body, None).await
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool> {
        let path = format!("/element/{}/displayed", element.id());
        let value = self.call(Method::GET, &path, None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl AutomationSession for WebDriverSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn find_element(&mut self, query: &str) -> Result<ElementHandle> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        let (strategy, value) = LocatorStrategy::parse(query);
        let url = format!("{}/element", self.session_url);
        let body = json!({ "using": strategy.as_str(), "value": value });

        let value = send(&self.http, Method::POST, &url, Some(body), Some(query)).await?;
        protocol::element_handle(&value)
    }

    async fn wait_displayed(&mut self, element: &ElementHandle, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_displayed(element).await? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn tap(&mut self, element: &ElementHandle) -> Result<()> {
        let path = format!("/element/{}/click", element.id());
        self.call(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    async fn set_value(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        let clear = format!("/element/{}/clear", element.id());
        self.call(Method::POST, &clear, Some(json!({}))).await?;

        let value = format!("/element/{}/value", element.id());
        self.call(Method::POST, &value, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn element_state(&mut self, element: &ElementHandle) -> Result<ElementState> {
        let path = format!("/element/{}/text", element.id());
        let text = self.call(Method::GET, &path, None).await?;
        let displayed = self.is_displayed(element).await?;
        Ok(ElementState {
            text: text.as_str().unwrap_or_default().to_string(),
            displayed,
        })
    }

    async fn current_app_id(&mut self) -> Result<String> {
        let value = self
            .call(Method::GET, "/appium/device/current_package", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let value = self.call(Method::GET, "/screenshot", None).await?;
        let encoded = value.as_str().ok_or_else(|| Error::WebDriver {
            error: "invalid response".to_string(),
            message: "Screenshot value is not a string".to_string(),
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::WebDriver {
                error: "invalid response".to_string(),
                message: format!("Screenshot is not valid base64: {}", e),
            })
    }

    async fn back(&mut self) -> Result<()> {
        self.call(Method::POST, "/back", Some(json!({}))).await?;
        Ok(())
    }

    async fn scroll(&mut self, gesture: &ScrollGesture) -> Result<()> {
        self.call(Method::POST, "/execute/sync", Some(protocol::scroll_body(gesture)))
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        send(&self.http, Method::DELETE, &self.session_url, None, None).await?;
        tracing::info!(session = %self.id, "Closed automation session");
        Ok(())
    }
}

/// Send one command and decode its `value`
async fn send(
    http: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    query: Option<&str>,
) -> Result<Value> {
    tracing::trace!("WebDriver >>> {} {}", method, url);

    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;

    tracing::trace!("WebDriver <<< {} ({} bytes)", status, bytes.len());

    protocol::parse_response(status, &bytes, query)
}
