//! Externally driven client.
//!
//! Placeholder for sessions where the browser is driven entirely
//! outside this process. Start and stop are no-ops and there is no
//! driver handle, so coverage cannot be pulled from the page.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Client, ClientError, ClientResult, DriverHandle};
use crate::config::ComponentOptions;

/// Client variant for sessions this process does not drive.
#[derive(Debug)]
pub struct ExternalClient {
    url: String,
    capabilities: Map<String, Value>,
}

impl ExternalClient {
    pub fn new(url: String, capabilities: Map<String, Value>) -> Self {
        Self { url, capabilities }
    }

    pub fn from_options(
        _options: &ComponentOptions,
        url: String,
        capabilities: Map<String, Value>,
    ) -> Self {
        Self::new(url, capabilities)
    }
}

#[async_trait]
impl Client for ExternalClient {
    fn kind(&self) -> &str {
        "external"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn capabilities(&self) -> &Map<String, Value> {
        &self.capabilities
    }

    fn instance(&self) -> Option<DriverHandle> {
        None
    }

    async fn start(&mut self) -> ClientResult<()> {
        Ok(())
    }

    async fn stop(&mut self) -> ClientResult<()> {
        Ok(())
    }

    async fn load_coverage(&mut self, _coverage_var: &str) -> ClientResult<Value> {
        Err(ClientError::Unsupported {
            client: "external",
            operation: "coverage collection",
        })
    }
}
