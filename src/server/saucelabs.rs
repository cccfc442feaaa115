//! Sauce Labs cloud grid.
//!
//! Like BrowserStack, this server manages no process. Sauce Labs takes
//! its credentials in the hub URL rather than in capabilities.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Server, ServerResult};
use crate::config::{ComponentOptions, ConfigError, ConfigResult};

/// Server variant for the Sauce Labs remote grid.
#[derive(Debug)]
pub struct SauceLabsServer {
    user: String,
    access_key: String,
}

impl SauceLabsServer {
    pub fn from_options(options: &ComponentOptions) -> ConfigResult<Self> {
        let user = required(&options.configuration, "user")?;
        let access_key = required(&options.configuration, "accessKey")?;
        Ok(Self { user, access_key })
    }
}

fn required(configuration: &Map<String, Value>, key: &str) -> ConfigResult<String> {
    configuration
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Invalid(format!("saucelabs configuration requires {key}")))
}

#[async_trait]
impl Server for SauceLabsServer {
    fn kind(&self) -> &str {
        "saucelabs"
    }

    fn url(&self) -> Option<String> {
        Some(format!(
            "http://{}:{}@ondemand.saucelabs.com/wd/hub",
            self.user, self.access_key
        ))
    }

    fn augment_capabilities(&self, capabilities: Map<String, Value>) -> Map<String, Value> {
        capabilities
    }

    async fn setup(&mut self, _capabilities: &Map<String, Value>) -> ServerResult<()> {
        Ok(())
    }

    async fn tear_down(&mut self) -> ServerResult<()> {
        Ok(())
    }
}
