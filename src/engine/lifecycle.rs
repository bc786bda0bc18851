//! Session lifecycle
//!
//! One remote session per flow. Acquisition waits for the endpoint slot so
//! only one session is live against a device at a time; release is
//! idempotent and never fails. A handle dropped without release, e.g. when
//! the flow future is cancelled, closes its session in the background and
//! holds the slot until that close completes.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::automation::{AutomationHost, AutomationSession, Capabilities};
use crate::common::{Error, Result};

/// Per-flow session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capabilities: Capabilities,
    /// Pause after launch so the app can get past its splash screen
    pub launch_settle: Duration,
    /// Fail acquisition when no app is in the foreground after launch
    pub verify_launch: bool,
    /// Logged as a warning when the foreground app differs
    pub expected_app_id: Option<String>,
}

impl SessionConfig {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            launch_settle: Duration::from_millis(4000),
            verify_launch: true,
            expected_app_id: None,
        }
    }
}

/// Admits one live session at a time
#[derive(Clone, Default)]
pub struct EndpointSlot(Arc<Mutex<()>>);

impl EndpointSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot shared by every manager that doesn't bring its own
    pub fn global() -> Self {
        static GLOBAL: OnceLock<EndpointSlot> = OnceLock::new();
        GLOBAL.get_or_init(EndpointSlot::new).clone()
    }

    async fn claim(&self) -> OwnedMutexGuard<()> {
        self.0.clone().lock_owned().await
    }

    /// True when no session currently holds the slot
    pub fn is_free(&self) -> bool {
        self.0.try_lock().is_ok()
    }

    /// Wait until the current holder, including a background close, lets go
    pub async fn released(&self) {
        let _guard = self.0.lock().await;
    }
}

/// Exclusive ownership of one open session
pub struct SessionHandle {
    session: Option<Box<dyn AutomationSession>>,
    slot: Option<OwnedMutexGuard<()>>,
    id: String,
    app_id: String,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl SessionHandle {
    /// The live session, or `SessionClosed` once released
    pub fn session(&mut self) -> Result<&mut dyn AutomationSession> {
        match self.session.as_mut() {
            Some(session) => Ok(session.as_mut()),
            None => Err(Error::SessionClosed),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Foreground app observed right after launch
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        // The slot stays claimed until the remote session is gone
        let slot = self.slot.take();
        let id = std::mem::take(&mut self.id);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!(session = %id, "Session dropped while open, closing it");
                runtime.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!(session = %id, "Error closing session: {}", e);
                    }
                    drop(slot);
                });
            }
            Err(_) => {
                tracing::warn!(session = %id, "Session dropped outside a runtime, left open");
            }
        }
    }
}

/// Opens and closes sessions around a flow
#[derive(Clone)]
pub struct SessionLifecycleManager {
    host: Arc<dyn AutomationHost>,
    slot: EndpointSlot,
}

impl SessionLifecycleManager {
    /// Manager using the process-wide endpoint slot
    pub fn new(host: Arc<dyn AutomationHost>) -> Self {
        Self::with_slot(host, EndpointSlot::global())
    }

    pub fn with_slot(host: Arc<dyn AutomationHost>, slot: EndpointSlot) -> Self {
        Self { host, slot }
    }

    pub fn endpoint(&self) -> String {
        self.host.endpoint()
    }

    /// Open a session, wait for the app to settle and check it launched
    pub async fn acquire(&self, config: &SessionConfig) -> Result<SessionHandle> {
        let guard = self.slot.claim().await;
        tracing::debug!(endpoint = %self.host.endpoint(), "Endpoint slot claimed");

        let session = self
            .host
            .open_session(&config.capabilities)
            .await
            .map_err(|e| {
                if matches!(e, Error::SessionAcquisition(_)) {
                    e
                } else {
                    Error::SessionAcquisition(e.to_string())
                }
            })?;
        let opened_at = Utc::now();
        let id = session.id().to_string();

        let mut handle = SessionHandle {
            session: Some(session),
            slot: Some(guard),
            id,
            app_id: String::new(),
            opened_at,
            closed_at: None,
        };

        if !config.launch_settle.is_zero() {
            tracing::debug!(
                "Waiting {} ms for the app to settle",
                config.launch_settle.as_millis()
            );
            tokio::time::sleep(config.launch_settle).await;
        }

        match self.check_launch(&mut handle, config).await {
            Ok(app_id) => {
                handle.app_id = app_id;
                Ok(handle)
            }
            Err(e) => {
                self.release(&mut handle).await;
                Err(e)
            }
        }
    }

    async fn check_launch(
        &self,
        handle: &mut SessionHandle,
        config: &SessionConfig,
    ) -> Result<String> {
        let app_id = match handle.session()?.current_app_id().await {
            Ok(id) => id,
            Err(e) if config.verify_launch => {
                return Err(Error::SessionAcquisition(format!(
                    "Could not read the foreground app: {}",
                    e
                )));
            }
            Err(e) => {
                tracing::warn!("Could not read the foreground app: {}", e);
                String::new()
            }
        };

        tracing::info!(session = %handle.id, "Current app: {}", app_id);

        if config.verify_launch && app_id.trim().is_empty() {
            return Err(Error::SessionAcquisition(
                "App did not launch: foreground app id is empty".to_string(),
            ));
        }

        if let Some(expected) = &config.expected_app_id {
            if expected != &app_id {
                tracing::warn!("Expected app '{}' in the foreground, found '{}'", expected, app_id);
            }
        }

        Ok(app_id)
    }

    /// Close the session and free the endpoint slot
    ///
    /// Calling this again on the same handle does nothing. Close errors are
    /// logged, never returned.
    pub async fn release(&self, handle: &mut SessionHandle) {
        let Some(mut session) = handle.session.take() else {
            tracing::debug!(session = %handle.id, "Session already released");
            return;
        };

        if let Err(e) = session.close().await {
            tracing::warn!(session = %handle.id, "Error closing session: {}", e);
        }
        handle.closed_at = Some(Utc::now());
        handle.slot.take();
    }
}
