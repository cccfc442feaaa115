//! Motorcade coordinates browser-automation test runs: it turns a
//! declarative task description into concrete WebDriver server/client
//! pairs, drives each pair through a strict session lifecycle, and
//! aggregates istanbul-style coverage pulled out of the browser.
//!
//! # Architecture
//!
//! The crate is organized around a handful of small pieces:
//!
//! - [`expand`] multiplies one task description into independent
//!   variants, one per requested browser/server combination.
//! - [`config`] is the typed configuration a variant parses into.
//! - [`registry`] maps `type` strings to server and client factories;
//!   every built-in is pre-seeded, embedders add their own.
//! - [`container`] assembles one server/client pair from a concrete
//!   configuration, resolving the endpoint URL and capabilities.
//! - [`lifecycle`] drives a container through
//!   setup → start → stop → tear-down, bracketing either a whole
//!   session or every single test, and publishes the live session
//!   through a single-slot registry.
//! - [`coverage`] pulls instrumented-page coverage out of the browser
//!   and merges it across sessions and containers.
//!
//! # Example
//!
//! ```no_run
//! use motorcade::{
//!     Container, CoverageAccumulator, DriverConfig, Lifecycle, Registry, SessionSlot,
//! };
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = Registry::with_builtins();
//! let config = DriverConfig::from_value(&json!({
//!     "client": "fantoccini",
//!     "server": "chromedriver",
//!     "coverage": { "active": true }
//! }))?;
//!
//! let container = Container::build(&registry, &config)?;
//! let slot = SessionSlot::new();
//! let accumulator = CoverageAccumulator::new();
//! let mut lifecycle = Lifecycle::new(container, slot.clone(), accumulator.clone());
//!
//! lifecycle.process_before().await?;
//! // ... run tests against slot.current() ...
//! lifecycle.process_after().await?;
//!
//! let coverage = accumulator.snapshot();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod container;
pub mod coverage;
pub mod expand;
pub mod lifecycle;
pub mod registry;
pub mod server;

pub use client::{Client, ClientError, ClientResult, DriverHandle, SharedClient};
pub use config::{
    ComponentOptions, ComponentSpec, ConfigError, ConfigResult, CoverageConfig, DriverConfig,
    Isolation, MappingRule,
};
pub use container::Container;
pub use coverage::{
    Aggregator, CoverageAccumulator, CoverageError, CoverageMap, CoverageResult, CoverageSettings,
    FileCoverage,
};
pub use expand::expand_task;
pub use lifecycle::{ActiveSession, Lifecycle, LifecycleError, LifecycleResult, SessionSlot};
pub use registry::{ClientFactory, Registry, ServerFactory};
pub use server::{Server, ServerError, ServerResult};
