//! Driver server trait and implementations.
//!
//! A server is whatever exposes a WebDriver HTTP endpoint for a client
//! to attach to: nothing at all (something already running externally),
//! a locally spawned driver binary, or a remote cloud grid. The
//! orchestrator only ever talks to the [`Server`] trait.
//!
//! # Built-in Servers
//!
//! | Type | Module | Description |
//! |------|--------|-------------|
//! | `external` | [`external`] | Endpoint managed outside this process |
//! | `chromedriver` | [`chromedriver`] | Spawns a local `chromedriver` binary |
//! | `geckodriver` | [`geckodriver`] | Spawns a local `geckodriver` binary |
//! | `selenium` | [`selenium`] | Spawns a standalone Selenium jar via java |
//! | `browserstack` | [`browserstack`] | BrowserStack cloud grid |
//! | `saucelabs` | [`saucelabs`] | Sauce Labs cloud grid |
//!
//! # Implementing a Custom Server
//!
//! Implement [`Server`] and register a factory for it by name on the
//! [`crate::registry::Registry`]. The orchestrator calls `setup` before
//! the client starts and `tear_down` after the client has stopped; both
//! are awaited in strict sequence and never retried.

pub mod browserstack;
pub mod chromedriver;
pub mod external;
pub mod geckodriver;
pub mod saucelabs;
pub mod selenium;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while running a driver server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The driver binary could not be spawned.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The spawned driver process could not be killed.
    #[error("failed to stop {binary}: {source}")]
    Kill {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// No usable java binary was found for the Selenium jar.
    #[error(
        "cannot find the java binary; set the JAVA_HOME environment variable \
         or install java at /usr/bin/java"
    )]
    JavaNotFound,

    /// A required configuration entry is missing at setup time.
    #[error("missing server configuration: {0}")]
    MissingConfiguration(String),

    /// Server-specific error not covered by other variants.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A driver server: the process or remote endpoint a client connects to.
///
/// Implementations must tolerate repeated `setup`/`tear_down` pairs on
/// the same instance (per-test isolation restarts the pair around every
/// test). `tear_down` is only ever called after a successful `setup`.
#[async_trait]
pub trait Server: Send + Sync {
    /// Type identifier this server was registered under, used for error
    /// context and the published session info.
    fn kind(&self) -> &str;

    /// The WebDriver endpoint URL, if this server knows it. `None`
    /// means the client must be told the URL some other way.
    fn url(&self) -> Option<String>;

    /// Lets the server adjust the client's requested capabilities
    /// before the client connects: a cloud grid injects credentials, a
    /// local driver defaults the browser name.
    fn augment_capabilities(&self, capabilities: Map<String, Value>) -> Map<String, Value>;

    /// Makes the endpoint available (spawn a process, or nothing for
    /// external/cloud endpoints). `capabilities` are the client's final
    /// augmented capabilities, for servers that need them at startup.
    async fn setup(&mut self, capabilities: &Map<String, Value>) -> ServerResult<()>;

    /// Shuts the endpoint down and releases any spawned process.
    async fn tear_down(&mut self) -> ServerResult<()>;
}
