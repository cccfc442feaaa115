//! Standalone Selenium server spawned through java.
//!
//! Launches `java -jar <selenium jar> -port <port>` and tears it down by
//! killing the process. The jar path is required; the java binary is
//! discovered at setup time from `JAVA_HOME` or the usual system
//! location so that a missing JVM fails loudly instead of hanging the
//! client's first connection attempt.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Child;
use tracing::{debug, info};

use super::{Server, ServerError, ServerResult};
use crate::config::{ComponentOptions, ConfigError, ConfigResult};

/// Configuration for the standalone Selenium server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeleniumConfig {
    /// Explicit java binary to use. Discovered when absent.
    pub java_path: Option<PathBuf>,

    /// Path to the selenium-server-standalone jar. Required at setup.
    pub jar_path: Option<PathBuf>,

    /// Port the server listens on.
    pub port: u16,

    /// Seconds to wait after spawning before the endpoint is assumed up.
    pub startup_grace_secs: u64,
}

impl Default for SeleniumConfig {
    fn default() -> Self {
        Self {
            java_path: None,
            jar_path: None,
            port: 9518,
            startup_grace_secs: 5,
        }
    }
}

/// Server variant that owns a spawned Selenium jar process.
#[derive(Debug)]
pub struct SeleniumServer {
    config: SeleniumConfig,
    child: Option<Child>,
}

impl SeleniumServer {
    pub fn from_options(options: &ComponentOptions) -> ConfigResult<Self> {
        let config: SeleniumConfig =
            serde_json::from_value(Value::Object(options.configuration.clone()))
                .map_err(|e| ConfigError::Invalid(format!("selenium configuration: {e}")))?;
        Ok(Self {
            config,
            child: None,
        })
    }

    /// Finds a java binary: the configured path, `$JAVA_HOME/bin/java`,
    /// then `/usr/bin/java`.
    fn java_binary(&self) -> ServerResult<PathBuf> {
        if let Some(path) = &self.config.java_path {
            return Ok(path.clone());
        }
        if let Ok(home) = std::env::var("JAVA_HOME") {
            let candidate = PathBuf::from(home).join("bin").join("java");
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        let fallback = PathBuf::from("/usr/bin/java");
        if fallback.is_file() {
            return Ok(fallback);
        }
        Err(ServerError::JavaNotFound)
    }
}

#[async_trait]
impl Server for SeleniumServer {
    fn kind(&self) -> &str {
        "selenium"
    }

    fn url(&self) -> Option<String> {
        Some(format!("http://127.0.0.1:{}/wd/hub", self.config.port))
    }

    fn augment_capabilities(&self, capabilities: Map<String, Value>) -> Map<String, Value> {
        capabilities
    }

    async fn setup(&mut self, _capabilities: &Map<String, Value>) -> ServerResult<()> {
        if self.child.is_none() {
            let jar = self
                .config
                .jar_path
                .clone()
                .ok_or_else(|| ServerError::MissingConfiguration("jarPath".to_string()))?;
            let java = self.java_binary()?;

            info!(java = %java.display(), jar = %jar.display(), port = self.config.port,
                "spawning selenium server");
            let child = tokio::process::Command::new(&java)
                .arg("-jar")
                .arg(&jar)
                .arg("-port")
                .arg(self.config.port.to_string())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| ServerError::Spawn {
                    binary: java.display().to_string(),
                    source,
                })?;
            self.child = Some(child);
        }

        tokio::time::sleep(Duration::from_secs(self.config.startup_grace_secs)).await;
        Ok(())
    }

    async fn tear_down(&mut self) -> ServerResult<()> {
        if let Some(mut child) = self.child.take() {
            debug!("stopping selenium server");
            child.start_kill().map_err(|source| ServerError::Kill {
                binary: "java".to_string(),
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

    fn options(configuration: Value) -> ComponentOptions {
        ComponentOptions {
            kind: Some("selenium".to_string()),
            configuration: configuration.as_object().cloned().unwrap_or_default(),
            ..ComponentOptions::default()
        }
    }

    #[test]
    fn default_url_uses_the_hub_path() {
        let server = SeleniumServer::from_options(&options(json!({}))).unwrap();
        assert_eq!(server.url().as_deref(), Some("http://127.0.0.1:9518/wd/hub"));
    }

    #[tokio::test]
    async fn setup_without_jar_path_is_rejected() {
        let mut server = SeleniumServer::from_options(&options(json!({}))).unwrap();
        let err = server.setup(&Map::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::MissingConfiguration(ref key) if key == "jarPath"));
    }

    #[test]
    fn explicit_java_path_wins_discovery() {
        let server = SeleniumServer::from_options(&options(
            json!({ "javaPath": "/opt/jdk/bin/java", "jarPath": "/opt/selenium.jar" }),
        ))
        .unwrap();
        assert_eq!(
            server.java_binary().unwrap(),
            PathBuf::from("/opt/jdk/bin/java")
        );
    }
}
