//! W3C WebDriver / Appium client
//!
//! Implements the automation traits over HTTP against an Appium server.

pub mod client;
pub mod protocol;

pub use client::{WebDriverHost, WebDriverSession};
pub use protocol::ServerStatus;
