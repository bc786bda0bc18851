//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, resolve_relative, DEFAULT_RESULTS_DIR};
use super::Result;
use crate::automation::Capabilities;
use crate::engine::SessionConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Automation server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Capability set sent when opening a session
    #[serde(default)]
    pub capabilities: CapabilityConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Screenshot settings
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Automation server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Appium/WebDriver server
    #[serde(default = "default_server_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:4723".to_string()
}

/// Capability settings
#[derive(Debug, Deserialize, Clone)]
pub struct CapabilityConfig {
    #[serde(default = "default_platform_name")]
    pub platform_name: String,

    #[serde(default = "default_automation_name")]
    pub automation_name: String,

    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Platform version, e.g. "13.0"
    pub platform_version: Option<String>,

    /// Path to the application binary to install
    pub app: Option<PathBuf>,

    /// Package identity of an already-installed app
    pub app_package: Option<String>,

    /// Activity to launch for an already-installed app
    pub app_activity: Option<String>,

    #[serde(default = "default_true")]
    pub auto_grant_permissions: bool,

    /// Seconds the server waits for a new command before ending the session
    #[serde(default = "default_new_command_timeout")]
    pub new_command_timeout_secs: u64,

    pub no_reset: Option<bool>,

    pub full_reset: Option<bool>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            platform_name: default_platform_name(),
            automation_name: default_automation_name(),
            device_name: default_device_name(),
            platform_version: None,
            app: None,
            app_package: None,
            app_activity: None,
            auto_grant_permissions: true,
            new_command_timeout_secs: default_new_command_timeout(),
            no_reset: None,
            full_reset: None,
        }
    }
}

fn default_platform_name() -> String {
    "Android".to_string()
}
fn default_automation_name() -> String {
    "UiAutomator2".to_string()
}
fn default_device_name() -> String {
    "Android Emulator".to_string()
}
fn default_new_command_timeout() -> u64 {
    180
}
fn default_true() -> bool {
    true
}

/// Timeout settings
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Pause after launch before the first query
    #[serde(default = "default_launch_settle")]
    pub launch_settle_ms: u64,

    /// Display timeout for candidates that don't set their own
    #[serde(default = "default_display_timeout")]
    pub display_timeout_ms: u64,

    /// Interval between displayed-state polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for a single HTTP round-trip to the server
    #[serde(default = "default_http_request")]
    pub http_request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            launch_settle_ms: default_launch_settle(),
            display_timeout_ms: default_display_timeout(),
            poll_interval_ms: default_poll_interval(),
            http_request_secs: default_http_request(),
        }
    }
}

fn default_launch_settle() -> u64 {
    4000
}
fn default_display_timeout() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    250
}
fn default_http_request() -> u64 {
    120
}

/// Diagnostic artifact settings
#[derive(Debug, Deserialize)]
pub struct DiagnosticsConfig {
    /// Directory screenshots are written to
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Disable to skip screenshot capture entirely
    #[serde(default = "default_true")]
    pub screenshots: bool,

    /// Fail acquisition when the foreground app id is empty after launch
    #[serde(default = "default_true")]
    pub verify_launch: bool,

    /// Foreground app id expected after launch (mismatch is only a warning)
    pub expected_app_id: Option<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            screenshots: true,
            verify_launch: true,
            expected_app_id: None,
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RESULTS_DIR)
}

impl Config {
    /// Load configuration from `path`, or from the default config file
    ///
    /// Returns default configuration if no path is given and the default
    /// file doesn't exist. An explicit path that doesn't exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::parse(&content)?;
        if let (Some(app), Some(base)) = (config.capabilities.app.as_mut(), path.parent()) {
            *app = resolve_relative(base, app);
        }
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Build the capability set sent when opening a session
    pub fn capabilities(&self) -> Result<Capabilities> {
        let caps = &self.capabilities;
        if caps.app.is_none() && caps.app_package.is_none() {
            return Err(super::Error::Config(
                "Either 'app' or 'app_package' must be configured".to_string(),
            ));
        }

        Ok(Capabilities {
            platform_name: caps.platform_name.clone(),
            automation_name: caps.automation_name.clone(),
            device_name: caps.device_name.clone(),
            platform_version: caps.platform_version.clone(),
            app: caps.app.clone(),
            app_package: caps.app_package.clone(),
            app_activity: caps.app_activity.clone(),
            auto_grant_permissions: caps.auto_grant_permissions,
            new_command_timeout: Duration::from_secs(caps.new_command_timeout_secs),
            no_reset: caps.no_reset,
            full_reset: caps.full_reset,
        })
    }

    /// Build the per-flow session configuration
    pub fn session_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            capabilities: self.capabilities()?,
            launch_settle: Duration::from_millis(self.timeouts.launch_settle_ms),
            verify_launch: self.diagnostics.verify_launch,
            expected_app_id: self.diagnostics.expected_app_id.clone(),
        })
    }

    /// Display timeout applied to candidates without their own
    pub fn default_display_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.display_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_local_appium() {
        let config = Config::default();
        assert_eq!(config.server.url, "http://127.0.0.1:4723");
        assert_eq!(config.capabilities.automation_name, "UiAutomator2");
        assert!(config.capabilities.auto_grant_permissions);
        assert_eq!(config.timeouts.launch_settle_ms, 4000);
        assert_eq!(config.diagnostics.results_dir, PathBuf::from("docs/results"));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            url = "http://10.0.0.5:4723"

            [capabilities]
            app_package = "com.laza.ecommerce"
            app_activity = ".MainActivity"
            new_command_timeout_secs = 240

            [timeouts]
            launch_settle_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.server.url, "http://10.0.0.5:4723");
        assert_eq!(config.capabilities.platform_name, "Android");
        assert_eq!(config.timeouts.launch_settle_ms, 5000);
        assert_eq!(config.timeouts.display_timeout_ms, 10_000);

        let session = config.session_config().unwrap();
        assert_eq!(session.launch_settle, Duration::from_millis(5000));
        assert_eq!(
            session.capabilities.new_command_timeout,
            Duration::from_secs(240)
        );
    }

    #[test]
    fn test_capabilities_require_app_reference() {
        let config = Config::default();
        assert!(matches!(
            config.capabilities(),
            Err(super::super::Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        assert!(matches!(
            Config::parse("[server\nurl ="),
            Err(super::super::Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(super::super::Error::FileRead { .. })
        ));
    }
}
