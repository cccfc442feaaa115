//! Session lifecycle orchestration.
//!
//! The [`Lifecycle`] drives one container's server/client pair through a
//! strict state machine and publishes the live session to running tests
//! through a [`SessionSlot`]:
//!
//! ```text
//!          start_session              stop_session
//! Idle ───▶ ServerReady ───▶ Running ───▶ ClientStopped ───▶ Idle
//!            (setup ok)     (start ok)     (stop ok)      (tear_down ok)
//! ```
//!
//! Isolation decides which hook pair brackets the session:
//! session-scoped containers start in `process_before` and stop in
//! `process_after`; per-test containers restart around every test via
//! `process_before_test`/`process_after_test`, the other pair being a
//! no-op.
//!
//! Failure leaves the machine exactly where the failed step found it: a
//! failed server setup leaves `Idle` with nothing to clean up, a failed
//! client start leaves `ServerReady` so a later stop still tears the
//! server down. Coverage is pulled *before* the client stops, while the
//! page is still alive.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::client::{ClientError, DriverHandle, SharedClient};
use crate::config::Isolation;
use crate::container::Container;
use crate::coverage::{Aggregator, CoverageAccumulator, CoverageResult};
use crate::server::ServerError;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors raised while driving a container through its lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The server failed to set up.
    #[error("failed to set up {server} server: {source}")]
    Setup {
        server: String,
        #[source]
        source: ServerError,
    },

    /// The server failed to tear down.
    #[error("failed to tear down {server} server: {source}")]
    TearDown {
        server: String,
        #[source]
        source: ServerError,
    },

    /// The client session failed to start.
    #[error("failed to start {client} client: {source}")]
    Start {
        client: String,
        #[source]
        source: ClientError,
    },

    /// The client session failed to stop.
    #[error("failed to stop {client} client: {source}")]
    Stop {
        client: String,
        #[source]
        source: ClientError,
    },

    /// Coverage collection failed during shutdown.
    #[error(transparent)]
    Coverage(#[from] crate::coverage::CoverageError),

    /// A session is already published; only one can be active at a time.
    #[error("a driver session is already active")]
    SessionActive,

    /// A stop was requested but no session is up.
    #[error("no driver session is active")]
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    ServerReady,
    Running,
    ClientStopped,
}

/// The live session as published to running tests.
///
/// Everything here is a snapshot taken at start time except `client`,
/// which is the live handle behind its lock.
pub struct ActiveSession {
    driver: Option<DriverHandle>,
    browser_name: String,
    browser_version: Option<String>,
    browser: String,
    client_name: String,
    server_name: String,
    client: SharedClient,
    aggregator: Aggregator,
}

impl ActiveSession {
    /// The backend's raw driver handle, when the client exposes one.
    pub fn driver(&self) -> Option<&DriverHandle> {
        self.driver.as_ref()
    }

    /// The session's browser name, from the final capabilities.
    pub fn browser_name(&self) -> &str {
        &self.browser_name
    }

    /// The requested browser version, when one was specified.
    pub fn browser_version(&self) -> Option<&str> {
        self.browser_version.as_deref()
    }

    /// Combined browser identity: `name` or `name_version`. Useful for
    /// naming screenshots and report sections.
    pub fn browser(&self) -> &str {
        &self.browser
    }

    /// The client type driving this session.
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// The server type behind this session.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// The live client, behind the session lock.
    pub fn client(&self) -> &SharedClient {
        &self.client
    }

    /// Pulls coverage from the page right now, without stopping
    /// anything. Tests call this before navigating away from an
    /// instrumented page, since navigation resets the in-page counters.
    pub async fn collect_coverage(&self) -> CoverageResult<()> {
        let mut client = self.client.lock().await;
        self.aggregator.collect(client.as_mut()).await
    }
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("browser", &self.browser)
            .field("client_name", &self.client_name)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

/// Single-slot registry for the currently active session.
///
/// Shared between the orchestrator (which publishes and clears) and the
/// test harness (which reads). Holding at most one session at a time is
/// what makes the "already active" rejection possible.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    inner: Arc<Mutex<Option<Arc<ActiveSession>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published session, if any.
    pub fn current(&self) -> Option<Arc<ActiveSession>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn publish(&self, session: Arc<ActiveSession>) -> LifecycleResult<()> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(LifecycleError::SessionActive);
        }
        *slot = Some(session);
        Ok(())
    }

    fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Drives one container through its session lifecycle.
pub struct Lifecycle {
    container: Container,
    slot: SessionSlot,
    aggregator: Aggregator,
    state: State,
}

impl Lifecycle {
    /// Wraps a container with the slot it publishes to and the run-wide
    /// coverage accumulator it reports into.
    pub fn new(container: Container, slot: SessionSlot, accumulator: CoverageAccumulator) -> Self {
        let aggregator = Aggregator::new(container.coverage().clone(), accumulator);
        Self {
            container,
            slot,
            aggregator,
            state: State::Idle,
        }
    }

    pub fn isolation(&self) -> Isolation {
        self.container.isolation()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Session-level before hook: starts the pair unless this container
    /// restarts per test.
    pub async fn process_before(&mut self) -> LifecycleResult<()> {
        match self.container.isolation() {
            Isolation::Session => self.start_session().await,
            Isolation::PerTest => Ok(()),
        }
    }

    /// Session-level after hook: stops the pair unless this container
    /// restarts per test.
    pub async fn process_after(&mut self) -> LifecycleResult<()> {
        match self.container.isolation() {
            Isolation::Session => self.stop_session().await,
            Isolation::PerTest => Ok(()),
        }
    }

    /// Per-test before hook: starts the pair for per-test containers.
    pub async fn process_before_test(&mut self) -> LifecycleResult<()> {
        match self.container.isolation() {
            Isolation::PerTest => self.start_session().await,
            Isolation::Session => Ok(()),
        }
    }

    /// Per-test after hook: stops the pair for per-test containers.
    pub async fn process_after_test(&mut self) -> LifecycleResult<()> {
        match self.container.isolation() {
            Isolation::PerTest => self.stop_session().await,
            Isolation::Session => Ok(()),
        }
    }

    /// Pulls coverage from the running session without stopping it.
    pub async fn collect_coverage(&self) -> CoverageResult<()> {
        let mut client = self.container.client().lock().await;
        self.aggregator.collect(client.as_mut()).await
    }

    /// Sets up the server, starts the client and publishes the session.
    pub async fn start_session(&mut self) -> LifecycleResult<()> {
        if self.state != State::Idle || self.slot.is_active() {
            return Err(LifecycleError::SessionActive);
        }

        let server_name = self.container.server().kind().to_string();
        let client_name = self.container.client_kind().to_string();

        let capabilities = {
            let client = self.container.client().lock().await;
            client.capabilities().clone()
        };

        info!(server = %server_name, "setting up driver server");
        self.container
            .server_mut()
            .setup(&capabilities)
            .await
            .map_err(|source| LifecycleError::Setup {
                server: server_name.clone(),
                source,
            })?;
        self.state = State::ServerReady;

        info!(client = %client_name, "starting driver client");
        {
            let mut client = self.container.client().lock().await;
            client.start().await.map_err(|source| LifecycleError::Start {
                client: client_name.clone(),
                source,
            })?;
        }
        self.state = State::Running;

        let session = self.build_session(server_name, client_name).await;
        info!(browser = %session.browser, "driver session active");
        self.slot.publish(Arc::new(session))
    }

    /// Collects coverage, stops the client, tears the server down and
    /// clears the published session.
    ///
    /// Callable from `ServerReady` (a client that never started) and
    /// `ClientStopped` (a failed teardown being retried) too, in which
    /// case only the server is torn down.
    pub async fn stop_session(&mut self) -> LifecycleResult<()> {
        match self.state {
            State::Running => {}
            // A client that never started, or a teardown being retried:
            // only the server is left to deal with.
            State::ServerReady | State::ClientStopped => return self.tear_down_server().await,
            State::Idle => return Err(LifecycleError::NotActive),
        }

        let client_name = self.container.client_kind().to_string();
        {
            let mut client = self.container.client().lock().await;
            self.aggregator.collect(client.as_mut()).await?;

            info!(client = %client_name, "stopping driver client");
            client.stop().await.map_err(|source| LifecycleError::Stop {
                client: client_name.clone(),
                source,
            })?;
        }
        self.state = State::ClientStopped;

        self.tear_down_server().await?;
        Ok(())
    }

    async fn tear_down_server(&mut self) -> LifecycleResult<()> {
        let server_name = self.container.server().kind().to_string();
        info!(server = %server_name, "tearing down driver server");
        self.container
            .server_mut()
            .tear_down()
            .await
            .map_err(|source| LifecycleError::TearDown {
                server: server_name,
                source,
            })?;
        self.state = State::Idle;
        self.slot.clear();
        Ok(())
    }

    async fn build_session(&self, server_name: String, client_name: String) -> ActiveSession {
        let client = self.container.client().lock().await;
        let capabilities = client.capabilities();

        let browser_name = capabilities
            .get("browserName")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&client_name)
            .to_string();
        let browser_version = capabilities
            .get("version")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let browser = match &browser_version {
            Some(version) => format!("{browser_name}_{version}"),
            None => browser_name.clone(),
        };
        if capabilities.get("browserName").is_none() {
            warn!(fallback = %browser_name, "capabilities carry no browserName");
        }

        ActiveSession {
            driver: client.instance(),
            browser_name,
            browser_version,
            browser,
            client_name,
            server_name,
            client: Arc::clone(self.container.client()),
            aggregator: self.aggregator.clone(),
        }
    }
}
