//! Locally spawned geckodriver server.
//!
//! Spawns the `geckodriver` binary, waits a fixed grace period for the
//! endpoint to come up, and kills the process on tear-down. Defaults the
//! client's `browserName` capability to `firefox`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Child;
use tracing::{debug, info};

use super::{Server, ServerError, ServerResult};
use crate::config::{ComponentOptions, ConfigError, ConfigResult};

/// Configuration for the geckodriver server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeckoDriverConfig {
    /// Path or name of the geckodriver binary.
    pub binary: String,

    /// Port the driver listens on.
    pub port: u16,

    /// Seconds to wait after spawning before the endpoint is assumed up.
    pub startup_grace_secs: u64,
}

impl Default for GeckoDriverConfig {
    fn default() -> Self {
        Self {
            binary: "geckodriver".to_string(),
            port: 4444,
            startup_grace_secs: 3,
        }
    }
}

/// Server variant that owns a spawned geckodriver process.
#[derive(Debug)]
pub struct GeckoDriverServer {
    config: GeckoDriverConfig,
    child: Option<Child>,
}

impl GeckoDriverServer {
    pub fn from_options(options: &ComponentOptions) -> ConfigResult<Self> {
        let config: GeckoDriverConfig =
            serde_json::from_value(Value::Object(options.configuration.clone()))
                .map_err(|e| ConfigError::Invalid(format!("geckodriver configuration: {e}")))?;
        Ok(Self {
            config,
            child: None,
        })
    }
}

#[async_trait]
impl Server for GeckoDriverServer {
    fn kind(&self) -> &str {
        "geckodriver"
    }

    fn url(&self) -> Option<String> {
        Some(format!("http://127.0.0.1:{}/", self.config.port))
    }

    fn augment_capabilities(&self, mut capabilities: Map<String, Value>) -> Map<String, Value> {
        capabilities
            .entry("browserName")
            .or_insert_with(|| Value::String("firefox".to_string()));
        capabilities
    }

    async fn setup(&mut self, _capabilities: &Map<String, Value>) -> ServerResult<()> {
        if self.child.is_none() {
            info!(binary = %self.config.binary, port = self.config.port, "spawning geckodriver");
            let child = tokio::process::Command::new(&self.config.binary)
                .arg("--port")
                .arg(self.config.port.to_string())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| ServerError::Spawn {
                    binary: self.config.binary.clone(),
                    source,
                })?;
            self.child = Some(child);
        }

        tokio::time::sleep(Duration::from_secs(self.config.startup_grace_secs)).await;
        Ok(())
    }

    async fn tear_down(&mut self) -> ServerResult<()> {
        if let Some(mut child) = self.child.take() {
            debug!(binary = %self.config.binary, "stopping geckodriver");
            child.start_kill().map_err(|source| ServerError::Kill {
                binary: self.config.binary.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let options = ComponentOptions::default();
        let server = GeckoDriverServer::from_options(&options).unwrap();

        assert_eq!(server.url().as_deref(), Some("http://127.0.0.1:4444/"));
        let augmented = server.augment_capabilities(Map::new());
        assert_eq!(augmented["browserName"], "firefox");
    }

    #[test]
    fn custom_port() {
        let options = ComponentOptions {
            configuration: json!({ "port": 4450 }).as_object().cloned().unwrap(),
            ..ComponentOptions::default()
        };
        let server = GeckoDriverServer::from_options(&options).unwrap();
        assert_eq!(server.url().as_deref(), Some("http://127.0.0.1:4450/"));
    }
}
