//! Locally spawned chromedriver server.
//!
//! Spawns the `chromedriver` binary found on the PATH (or at a
//! configured location), waits a short fixed grace period for it to
//! bind its port, and kills it on tear-down. Defaults the client's
//! `browserName` capability to `chrome`.
//!
//! # Example Configuration
//!
//! ```json
//! { "type": "chromedriver", "configuration": { "port": 9515 } }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Child;
use tracing::{debug, info};

use super::{Server, ServerError, ServerResult};
use crate::config::{ComponentOptions, ConfigError, ConfigResult};

/// Configuration for the chromedriver server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChromeDriverConfig {
    /// Path or name of the chromedriver binary.
    pub binary: String,

    /// Port the driver listens on.
    pub port: u16,

    /// Seconds to wait after spawning before the endpoint is assumed up.
    pub startup_grace_secs: u64,
}

impl Default for ChromeDriverConfig {
    fn default() -> Self {
        Self {
            binary: "chromedriver".to_string(),
            port: 9515,
            startup_grace_secs: 1,
        }
    }
}

/// Server variant that owns a spawned chromedriver process.
#[derive(Debug)]
pub struct ChromeDriverServer {
    config: ChromeDriverConfig,
    child: Option<Child>,
}

impl ChromeDriverServer {
    pub fn from_options(options: &ComponentOptions) -> ConfigResult<Self> {
        let config: ChromeDriverConfig =
            serde_json::from_value(Value::Object(options.configuration.clone()))
                .map_err(|e| ConfigError::Invalid(format!("chromedriver configuration: {e}")))?;
        Ok(Self {
            config,
            child: None,
        })
    }
}

#[async_trait]
impl Server for ChromeDriverServer {
    fn kind(&self) -> &str {
        "chromedriver"
    }

    fn url(&self) -> Option<String> {
        Some(format!("http://127.0.0.1:{}/", self.config.port))
    }

    fn augment_capabilities(&self, mut capabilities: Map<String, Value>) -> Map<String, Value> {
        capabilities
            .entry("browserName")
            .or_insert_with(|| Value::String("chrome".to_string()));
        capabilities
    }

    async fn setup(&mut self, _capabilities: &Map<String, Value>) -> ServerResult<()> {
        if self.child.is_none() {
            info!(binary = %self.config.binary, port = self.config.port, "spawning chromedriver");
            let child = tokio::process::Command::new(&self.config.binary)
                .arg(format!("--port={}", self.config.port))
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
            debug!(binary = %self.config.binary, "stopping chromedriver");
            child.start_kill().map_err(|source| ServerError::Kill {
                binary: self.config.binary.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
