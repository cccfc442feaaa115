//! Client backed by the `thirtyfour` WebDriver crate.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thirtyfour::prelude::WebDriver;
use thirtyfour::Capabilities;
use tracing::debug;

use super::{Client, ClientError, ClientResult, DriverHandle, COVERAGE_SCRIPT};
use crate::config::ComponentOptions;

/// Client variant driving a session through thirtyfour.
pub struct ThirtyFourClient {
    url: String,
    capabilities: Map<String, Value>,
    driver: Option<WebDriver>,
}

impl ThirtyFourClient {
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
}

#[async_trait]
impl Client for ThirtyFourClient {
    fn kind(&self) -> &str {
        "thirtyfour"
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
        debug!(url = %self.url, "opening thirtyfour session");
        let capabilities = Capabilities::from(self.capabilities.clone());
        let driver = WebDriver::new(&self.url, capabilities)
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
            debug!(url = %self.url, "closing thirtyfour session");
            driver
                .quit()
                .await
                .map_err(|e| ClientError::Session(e.to_string()))?;
        }
        Ok(())
    }

    async fn load_coverage(&mut self, coverage_var: &str) -> ClientResult<Value> {
        let driver = self.driver.as_ref().ok_or(ClientError::NotStarted)?;
        let ret = driver
            .execute(COVERAGE_SCRIPT, vec![Value::String(coverage_var.to_string())])
            .await
            .map_err(|e| ClientError::Script(e.to_string()))?;
        Ok(ret.json().clone())
    }
}
