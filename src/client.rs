//! Driver client trait and implementations.
//!
//! A client owns the browser session against a server's WebDriver
//! endpoint. Two real backends are built in (`fantoccini` and
//! `thirtyfour`), plus an `external` placeholder for sessions driven
//! entirely outside this process.
//!
//! The concrete driver handle is exposed through [`Client::instance`]
//! as a type-erased [`DriverHandle`]; test code downcasts it to the
//! backend it asked for. The orchestrator itself only uses the trait.

pub mod external;
pub mod fantoccini;
pub mod thirtyfour;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Type-erased handle to a backend's driver object. Downcast with
/// `handle.downcast_ref::<fantoccini::Client>()` (or the thirtyfour
/// equivalent) to drive the browser directly.
pub type DriverHandle = Arc<dyn Any + Send + Sync>;

/// A client behind the session lock, as published to running tests.
pub type SharedClient = Arc<tokio::sync::Mutex<Box<dyn Client>>>;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while driving a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The WebDriver endpoint could not be reached or refused the
    /// session.
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// The session failed after it was established.
    #[error("webdriver session error: {0}")]
    Session(String),

    /// Script execution in the browser failed.
    #[error("script execution failed: {0}")]
    Script(String),

    /// An operation needing a live session was called before `start`.
    #[error("client session has not been started")]
    NotStarted,

    /// The client backend cannot perform the requested operation.
    #[error("the {client} client does not support {operation}")]
    Unsupported {
        client: &'static str,
        operation: &'static str,
    },

    /// Client-specific error not covered by other variants.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Script injected to read and reset the in-page coverage object. Takes
/// the coverage variable name as its single argument and returns the
/// serialized coverage map.
pub(crate) const COVERAGE_SCRIPT: &str = include_str!("client/scripts/coverage.js");

/// A driver client: owns one browser session.
///
/// `start` and `stop` bracket the session; `stop` on a client that was
/// never started is a no-op. Capabilities are fixed at construction
/// (after server augmentation) and never change over the client's life.
#[async_trait]
pub trait Client: Send + Sync {
    /// Type identifier this client was registered under.
    fn kind(&self) -> &str;

    /// The endpoint URL this client connects to.
    fn url(&self) -> &str;

    /// The final capabilities requested for the session.
    fn capabilities(&self) -> &Map<String, Value>;

    /// The live driver handle, if a session is up.
    fn instance(&self) -> Option<DriverHandle>;

    /// Opens the browser session.
    async fn start(&mut self) -> ClientResult<()>;

    /// Closes the browser session. No-op when no session is up.
    async fn stop(&mut self) -> ClientResult<()>;

    /// Reads and resets the in-page coverage object named by
    /// `coverage_var`, returning whatever the browser handed back
    /// (typically a JSON string).
    async fn load_coverage(&mut self, coverage_var: &str) -> ClientResult<Value>;
}
