//! BrowserStack cloud grid.
//!
//! Nothing to spawn or tear down; the server contributes the fixed hub
//! URL and injects the account credentials into the client's
//! capabilities. Credentials are validated when the server is built so a
//! misconfigured run fails before any session is attempted.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Server, ServerResult};
use crate::config::{ComponentOptions, ConfigError, ConfigResult};

const HUB_URL: &str = "http://hub.browserstack.com/wd/hub";

/// Server variant for the BrowserStack remote grid.
#[derive(Debug)]
pub struct BrowserStackServer {
    user: String,
    access_key: String,
}

impl BrowserStackServer {
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
        .ok_or_else(|| ConfigError::Invalid(format!("browserstack configuration requires {key}")))
}

#[async_trait]
impl Server for BrowserStackServer {
    fn kind(&self) -> &str {
        "browserstack"
    }

    fn url(&self) -> Option<String> {
        Some(HUB_URL.to_string())
    }

    fn augment_capabilities(&self, mut capabilities: Map<String, Value>) -> Map<String, Value> {
        capabilities.insert(
            "browserstack.user".to_string(),
            Value::String(self.user.clone()),
        );
        capabilities.insert(
            "browserstack.key".to_string(),
            Value::String(self.access_key.clone()),
        );
        capabilities
    }

    async fn setup(&mut self, _capabilities: &Map<String, Value>) -> ServerResult<()> {
        Ok(())
    }

    async fn tear_down(&mut self) -> ServerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(configuration: Value) -> ComponentOptions {
        ComponentOptions {
            kind: Some("browserstack".to_string()),
            configuration: configuration.as_object().cloned().unwrap_or_default(),
            ..ComponentOptions::default()
        }
    }

    #[test]
    fn credentials_are_required() {
        assert!(BrowserStackServer::from_options(&options(json!({}))).is_err());
        assert!(BrowserStackServer::from_options(&options(json!({ "user": "u" }))).is_err());
        assert!(
            BrowserStackServer::from_options(&options(json!({ "user": "u", "accessKey": "k" })))
                .is_ok()
        );
    }

    #[test]
    fn credentials_land_in_capabilities() {
        let server =
            BrowserStackServer::from_options(&options(json!({ "user": "u", "accessKey": "k" })))
                .unwrap();

        let augmented = server.augment_capabilities(Map::new());
        assert_eq!(augmented["browserstack.user"], "u");
        assert_eq!(augmented["browserstack.key"], "k");
        assert_eq!(server.url().as_deref(), Some(HUB_URL));
    }
}
