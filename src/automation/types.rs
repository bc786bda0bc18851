//! Value types exchanged with a remote automation session

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Capability set used to open a session
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub platform_name: String,
    pub automation_name: String,
    pub device_name: String,
    pub platform_version: Option<String>,
    /// Application binary to install before launch
    pub app: Option<PathBuf>,
    /// Identity of an already-installed application
    pub app_package: Option<String>,
    pub app_activity: Option<String>,
    pub auto_grant_permissions: bool,
    pub new_command_timeout: Duration,
    pub no_reset: Option<bool>,
    pub full_reset: Option<bool>,
}

/// Opaque reference to an element inside a live session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// State read back from an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub text: String,
    pub displayed: bool,
}

/// Element location strategy understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    XPath,
    Id,
    AccessibilityId,
    ClassName,
    UiAutomator,
}

impl LocatorStrategy {
    /// W3C / Appium `using` value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XPath => "xpath",
            Self::Id => "id",
            Self::AccessibilityId => "accessibility id",
            Self::ClassName => "class name",
            Self::UiAutomator => "-android uiautomator",
        }
    }

    /// Split a query into its strategy and value
    ///
    /// Queries are XPath unless they carry one of the `id=`,
    /// `accessibility id=`, `class=` or `uiautomator=` prefixes.
    pub fn parse(query: &str) -> (Self, &str) {
        const PREFIXES: [(&str, LocatorStrategy); 4] = [
            ("id=", LocatorStrategy::Id),
            ("accessibility id=", LocatorStrategy::AccessibilityId),
            ("class=", LocatorStrategy::ClassName),
            ("uiautomator=", LocatorStrategy::UiAutomator),
        ];

        for (prefix, strategy) in PREFIXES {
            if let Some(value) = query.strip_prefix(prefix) {
                return (strategy, value.trim());
            }
        }
        (Self::XPath, query)
    }
}

/// Direction of a scroll gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

/// Scroll gesture within a rectangular area of the screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollGesture {
    #[serde(default = "default_left")]
    pub left: u32,
    #[serde(default = "default_top")]
    pub top: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub direction: ScrollDirection,
    /// Fraction of the area to scroll, 0.0..=1.0
    #[serde(default = "default_percent")]
    pub percent: f32,
}

impl Default for ScrollGesture {
    fn default() -> Self {
        Self {
            left: default_left(),
            top: default_top(),
            width: default_width(),
            height: default_height(),
            direction: ScrollDirection::Down,
            percent: default_percent(),
        }
    }
}

fn default_left() -> u32 {
    100
}
fn default_top() -> u32 {
    800
}
fn default_width() -> u32 {
    200
}
fn default_height() -> u32 {
    500
}
fn default_percent() -> f32 {
    0.6
}

/// Gesture issued before a step resolves its candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum Gesture {
    /// System back navigation
    Back,
    /// Scroll within an area
    Scroll(ScrollGesture),
}
