//! Driver container: one server/client pair plus its run settings.
//!
//! A container is the unit the lifecycle orchestrator operates on. It is
//! built from one concrete [`DriverConfig`] (post-expansion) and a
//! [`Registry`], following a fixed construction order:
//!
//! 1. compile the coverage settings (fail fast on bad patterns),
//! 2. build the server from its registered factory,
//! 3. resolve the endpoint URL: an explicit client `url` wins, then the
//!    server's advertised URL, then the well-known local hub,
//! 4. merge the client's requested capabilities over the defaults and
//!    let the server augment the result,
//! 5. build the client against the resolved URL and final capabilities.
//!
//! Everything that can fail here fails before any process is spawned or
//! session opened.

use std::sync::Arc;

use tracing::debug;

use crate::client::SharedClient;
use crate::config::{
    default_capabilities, merge_maps, ConfigResult, DriverConfig, Isolation, DEFAULT_HUB_URL,
};
use crate::coverage::CoverageSettings;
use crate::registry::Registry;
use crate::server::Server;

/// One server/client pair and the settings that govern its lifecycle.
pub struct Container {
    client: SharedClient,
    client_kind: String,
    server: Box<dyn Server>,
    isolation: Isolation,
    coverage: CoverageSettings,
}

impl Container {
    /// Assembles a container from already-built parts. [`Container::build`]
    /// is the usual entry point; this one exists for embedders wiring in
    /// hand-built components.
    pub fn new(
        client: Box<dyn crate::client::Client>,
        server: Box<dyn Server>,
        isolation: Isolation,
        coverage: CoverageSettings,
    ) -> Self {
        let client_kind = client.kind().to_string();
        Self {
            client: Arc::new(tokio::sync::Mutex::new(client)),
            client_kind,
            server,
            isolation,
            coverage,
        }
    }

    /// Builds a container from one concrete driver configuration.
    pub fn build(registry: &Registry, config: &DriverConfig) -> ConfigResult<Self> {
        let coverage = CoverageSettings::compile(&config.coverage)?;

        let server_options = config.server.clone().into_options();
        let server_factory = registry.server(server_options.kind_or_default())?;
        let server = server_factory(&server_options)?;

        let client_options = config.client.clone().into_options();
        let url = client_options
            .url
            .clone()
            .or_else(|| server.url())
            .unwrap_or_else(|| DEFAULT_HUB_URL.to_string());

        let capabilities = merge_maps(&default_capabilities(), &client_options.capabilities);
        let capabilities = server.augment_capabilities(capabilities);

        let client_factory = registry.client(client_options.kind_or_default())?;
        let client = client_factory(&client_options, url.clone(), capabilities)?;

        debug!(
            server = server.kind(),
            client = client.kind(),
            url = %url,
            "built driver container"
        );
        Ok(Self::new(client, server, config.isolation.into(), coverage))
    }

    pub fn client(&self) -> &SharedClient {
        &self.client
    }

    /// The `kind` of the client, readable without taking the session
    /// lock.
    pub fn client_kind(&self) -> &str {
        &self.client_kind
    }

    pub fn server(&self) -> &dyn Server {
        self.server.as_ref()
    }

    pub fn server_mut(&mut self) -> &mut Box<dyn Server> {
        &mut self.server
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    pub fn coverage(&self) -> &CoverageSettings {
        &self.coverage
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("client_kind", &self.client_kind)
            .field("server_kind", &self.server.kind())
            .field("isolation", &self.isolation)
            .field("coverage", &self.coverage)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(configuration: serde_json::Value) -> ConfigResult<Container> {
        let registry = Registry::with_builtins();
        let config = DriverConfig::from_value(&configuration)?;
        Container::build(&registry, &config)
    }

    #[tokio::test]
    async fn empty_configuration_builds_external_pair_on_default_hub() {
        let container = build(json!({})).unwrap();

        assert_eq!(container.server().kind(), "external");
        assert_eq!(container.client_kind(), "external");
        assert_eq!(container.isolation(), Isolation::Session);

        let client = container.client().lock().await;
        assert_eq!(client.url(), DEFAULT_HUB_URL);
        assert_eq!(client.capabilities()["javascriptEnabled"], true);
    }

    #[tokio::test]
    async fn explicit_client_url_wins_over_server_url() {
        let container = build(json!({
            "client": { "type": "fantoccini", "url": "http://10.0.0.5:4444/wd/hub" },
            "server": { "type": "chromedriver" }
        }))
        .unwrap();

        let client = container.client().lock().await;
        assert_eq!(client.url(), "http://10.0.0.5:4444/wd/hub");
    }

    #[tokio::test]
    async fn server_url_is_used_when_client_has_none() {
        let container = build(json!({
            "client": "fantoccini",
            "server": { "type": "chromedriver", "configuration": { "port": 9700 } }
        }))
        .unwrap();

        let client = container.client().lock().await;
        assert_eq!(client.url(), "http://127.0.0.1:9700/");
    }

    #[tokio::test]
    async fn server_augments_capabilities_before_the_client_sees_them() {
        let container = build(json!({
            "client": "fantoccini",
            "server": "chromedriver"
        }))
        .unwrap();

        let client = container.client().lock().await;
        assert_eq!(client.capabilities()["browserName"], "chrome");
        // Defaults survive augmentation.
        assert_eq!(client.capabilities()["acceptSslCerts"], true);
    }

    #[tokio::test]
    async fn client_capabilities_override_defaults() {
        let container = build(json!({
            "client": {
                "type": "fantoccini",
                "capabilities": { "javascriptEnabled": false, "browserName": "firefox" }
            },
            "server": "chromedriver"
        }))
        .unwrap();

        let client = container.client().lock().await;
        assert_eq!(client.capabilities()["javascriptEnabled"], false);
        // An explicit browser name is not overwritten by augmentation.
        assert_eq!(client.capabilities()["browserName"], "firefox");
    }

    #[test]
    fn unknown_server_type_fails_the_build() {
        let err = build(json!({ "server": "warpdrive" })).unwrap_err();
        assert!(matches!(
            err,
            crate::config::ConfigError::UnknownType { kind: "server", .. }
        ));
    }

    #[test]
    fn debug_output_names_both_kinds() {
        let container = build(json!({ "server": "chromedriver" })).unwrap();
        let rendered = format!("{container:?}");
        assert!(rendered.contains("chromedriver"));
        assert!(rendered.contains("client_kind"));
    }

    #[test]
    fn per_test_isolation_is_carried() {
        let container = build(json!({ "isolation": true })).unwrap();
        assert_eq!(container.isolation(), Isolation::PerTest);
    }

    #[test]
    fn bad_coverage_pattern_fails_before_any_factory_runs() {
        let err = build(json!({
            "server": "warpdrive",
            "coverage": { "excludes": ["["] }
        }))
        .unwrap_err();

        // Coverage compilation runs first, so its error wins.
        assert!(matches!(
            err,
            crate::config::ConfigError::ExcludePattern { .. }
        ));
    }
}
