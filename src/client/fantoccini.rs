//! Client backed by the `fantoccini` WebDriver crate.

use async_trait::async_trait;
use fantoccini::ClientBuilder;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Client, ClientError, ClientResult, DriverHandle, COVERAGE_SCRIPT};
use crate::config::ComponentOptions;

/// Client variant driving a session through fantoccini.
pub struct FantocciniClient {
    url: String,
    capabilities: Map<String, Value>,
    driver: Option<fantoccini::Client>,
}

impl FantocciniClient {
    pub fn new(url: String, capabilities: Map<String, Value>) -> Self {
        Self {
            url,
            capabilities,
            driver: None,
        }
    }

    pub fn from_options(
        _options: &ComponentOptions,
        url: String,
        capabilities: Map<String, Value>,
    ) -> Self {
        Self::new(url, capabilities)
    }

    fn driver_mut(&mut self) -> ClientResult<&mut fantoccini::Client> {
        self.driver.as_mut().ok_or(ClientError::NotStarted)
    }
}

#[async_trait]
impl Client for FantocciniClient {
    fn kind(&self) -> &str {
        "fantoccini"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn capabilities(&self) -> &Map<String, Value> {
        &self.capabilities
    }

    fn instance(&self) -> Option<DriverHandle> {
        self.driver
            .as_ref()
            .map(|driver| std::sync::Arc::new(driver.clone()) as DriverHandle)
    }

    async fn start(&mut self) -> ClientResult<()> {
        if self.driver.is_some() {
            return Ok(());
        }
        debug!(url = %self.url, "opening fantoccini session");
        let driver = ClientBuilder::native()
            .capabilities(self.capabilities.clone())
            .connect(&self.url)
            .await
            .map_err(|e| ClientError::Connect {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        self.driver = Some(driver);
        Ok(())
    }

    async fn stop(&mut self) -> ClientResult<()> {
        if let Some(driver) = self.driver.take() {
            debug!(url = %self.url, "closing fantoccini session");
            driver
                .close()
                .await
                .map_err(|e| ClientError::Session(e.to_string()))?;
        }
        Ok(())
    }

    async fn load_coverage(&mut self, coverage_var: &str) -> ClientResult<Value> {
        let args = vec![Value::String(coverage_var.to_string())];
        let driver = self.driver_mut()?;
        driver
            .execute(COVERAGE_SCRIPT, args)
            .await
            .map_err(|e| ClientError::Script(e.to_string()))
    }
}
