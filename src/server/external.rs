//! Externally managed driver server.
//!
//! Used when the WebDriver endpoint is already running outside this
//! process (a developer-launched driver, a CI service container). Setup
//! and tear-down are no-ops; the endpoint URL must come from the client
//! spec or the well-known default.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Server, ServerResult};
use crate::config::ComponentOptions;

/// Server variant for endpoints this process does not manage.
#[derive(Debug, Default)]
pub struct ExternalServer;

impl ExternalServer {
    pub fn from_options(_options: &ComponentOptions) -> Self {
        Self
    }
}

#[async_trait]
impl Server for ExternalServer {
    fn kind(&self) -> &str {
        "external"
    }

    fn url(&self) -> Option<String> {
        None
    }

    fn augment_capabilities(&self, capabilities: Map<String, Value>) -> Map<String, Value> {
        capabilities
    }

    async fn setup(&mut self, _capabilities: &Map<String, Value>) -> ServerResult<()> {
        // The driver endpoint is expected to already be available.
        Ok(())
    }

    async fn tear_down(&mut self) -> ServerResult<()> {
        Ok(())
    }
}
