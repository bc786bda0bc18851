//! W3C WebDriver wire format helpers
//!
//! Pure functions for building request bodies and decoding responses, kept
//! apart from the HTTP client so they can be tested without a server.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::automation::{Capabilities, ElementHandle, ScrollGesture};
use crate::common::{Error, Result};

/// Key carrying the element reference in W3C responses
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a5ad7d6e1f5";

/// Key used by pre-W3C (JSONWP) servers
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Error body of a failed command
#[derive(Debug, Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

/// Body of a `/status` response
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub build: Option<Value>,
}

/// Build the `POST /session` body
pub fn new_session_body(caps: &Capabilities) -> Value {
    let mut always = Map::new();
    always.insert("platformName".into(), json!(caps.platform_name));
    always.insert("appium:automationName".into(), json!(caps.automation_name));
    always.insert("appium:deviceName".into(), json!(caps.device_name));
    always.insert(
        "appium:autoGrantPermissions".into(),
        json!(caps.auto_grant_permissions),
    );
    always.insert(
        "appium:newCommandTimeout".into(),
        json!(caps.new_command_timeout.as_secs()),
    );

    if let Some(version) = &caps.platform_version {
        always.insert("appium:platformVersion".into(), json!(version));
    }
    if let Some(app) = &caps.app {
        always.insert("appium:app".into(), json!(app.display().to_string()));
    }
    if let Some(package) = &caps.app_package {
        always.insert("appium:appPackage".into(), json!(package));
    }
    if let Some(activity) = &caps.app_activity {
        always.insert("appium:appActivity".into(), json!(activity));
    }
    if let Some(no_reset) = caps.no_reset {
        always.insert("appium:noReset".into(), json!(no_reset));
    }
    if let Some(full_reset) = caps.full_reset {
        always.insert("appium:fullReset".into(), json!(full_reset));
    }

    json!({
        "capabilities": {
            "alwaysMatch": Value::Object(always),
            "firstMatch": [{}],
        }
    })
}

/// Build the `mobile: scrollGesture` script call
pub fn scroll_body(gesture: &ScrollGesture) -> Value {
    json!({
        "script": "mobile: scrollGesture",
        "args": [{
            "left": gesture.left,
            "top": gesture.top,
            "width": gesture.width,
            "height": gesture.height,
            "direction": gesture.direction,
            "percent": gesture.percent,
        }],
    })
}

/// Decode a command response into its `value`
///
/// `query` is the locator of a find request, used to map "no such element"
/// and "invalid selector" onto their own variants.
pub fn parse_response(status: u16, body: &[u8], query: Option<&str>) -> Result<Value> {
    let parsed: Value = serde_json::from_slice(body).map_err(|e| Error::WebDriver {
        error: format!("http {}", status),
        message: format!(
            "Unparseable response body ({}): {}",
            e,
            String::from_utf8_lossy(&body[..body.len().min(200)])
        ),
    })?;

    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    // JSONWP servers signal errors with a non-zero status field and HTTP 200
    let legacy_failed = parsed
        .get("status")
        .and_then(Value::as_i64)
        .is_some_and(|s| s != 0);

    if (200..300).contains(&status) && !legacy_failed {
        return Ok(value);
    }

    match serde_json::from_value::<ErrorValue>(value.clone()) {
        Ok(err) => Err(Error::from_webdriver(&err.error, &err.message, query)),
        Err(_) => Err(Error::WebDriver {
            error: format!("http {}", status),
            message: value.to_string(),
        }),
    }
}

/// Extract the session id from a `POST /session` value
pub fn session_id(value: &Value) -> Result<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::SessionAcquisition(format!("No sessionId in response: {}", value)))
}

/// Extract the element reference from a find response value
pub fn element_handle(value: &Value) -> Result<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(ElementHandle::new)
        .ok_or_else(|| Error::WebDriver {
            error: "invalid response".to_string(),
            message: format!("No element reference in {}", value),
        })
}
