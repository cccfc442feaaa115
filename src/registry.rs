//! Factory registry for server and client types.
//!
//! Components are looked up by the `type` string of their spec. The
//! registry ships pre-seeded with every built-in via
//! [`Registry::with_builtins`]; embedders add their own backends by
//! registering a factory under a new name, or shadow a built-in by
//! reusing its name (last registration wins).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{
    external::ExternalClient, fantoccini::FantocciniClient, thirtyfour::ThirtyFourClient, Client,
};
use crate::config::{ComponentOptions, ConfigError, ConfigResult};
use crate::server::{
    browserstack::BrowserStackServer, chromedriver::ChromeDriverServer, external::ExternalServer,
    geckodriver::GeckoDriverServer, saucelabs::SauceLabsServer, selenium::SeleniumServer, Server,
};

/// Builds a server from its spec options.
pub type ServerFactory = Arc<dyn Fn(&ComponentOptions) -> ConfigResult<Box<dyn Server>> + Send + Sync>;

/// Builds a client from its spec options, the resolved endpoint URL and
/// the final (server-augmented) capabilities.
pub type ClientFactory = Arc<
    dyn Fn(&ComponentOptions, String, Map<String, Value>) -> ConfigResult<Box<dyn Client>>
        + Send
        + Sync,
>;

/// Registry of named server and client factories.
#[derive(Clone, Default)]
pub struct Registry {
    servers: HashMap<String, ServerFactory>,
    clients: HashMap<String, ClientFactory>,
}

impl Registry {
    /// An empty registry with no factories at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with every built-in server and client type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register_server("external", |options| {
            Ok(Box::new(ExternalServer::from_options(options)) as Box<dyn Server>)
        });
        registry.register_server("chromedriver", |options| {
            Ok(Box::new(ChromeDriverServer::from_options(options)?) as Box<dyn Server>)
        });
        registry.register_server("geckodriver", |options| {
            Ok(Box::new(GeckoDriverServer::from_options(options)?) as Box<dyn Server>)
        });
        registry.register_server("selenium", |options| {
            Ok(Box::new(SeleniumServer::from_options(options)?) as Box<dyn Server>)
        });
        registry.register_server("browserstack", |options| {
            Ok(Box::new(BrowserStackServer::from_options(options)?) as Box<dyn Server>)
        });
        registry.register_server("saucelabs", |options| {
            Ok(Box::new(SauceLabsServer::from_options(options)?) as Box<dyn Server>)
        });

        registry.register_client("external", |options, url, capabilities| {
            Ok(Box::new(ExternalClient::from_options(options, url, capabilities)) as Box<dyn Client>)
        });
        registry.register_client("fantoccini", |options, url, capabilities| {
            Ok(
                Box::new(FantocciniClient::from_options(options, url, capabilities))
                    as Box<dyn Client>,
            )
        });
        registry.register_client("thirtyfour", |options, url, capabilities| {
            Ok(
                Box::new(ThirtyFourClient::from_options(options, url, capabilities))
                    as Box<dyn Client>,
            )
        });

        registry
    }

    /// Registers a server factory under `name`, replacing any previous
    /// registration.
    pub fn register_server<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ComponentOptions) -> ConfigResult<Box<dyn Server>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(name = %name, "registering server factory");
        self.servers.insert(name, Arc::new(factory));
    }

    /// Registers a client factory under `name`, replacing any previous
    /// registration.
    pub fn register_client<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ComponentOptions, String, Map<String, Value>) -> ConfigResult<Box<dyn Client>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        debug!(name = %name, "registering client factory");
        self.clients.insert(name, Arc::new(factory));
    }

    /// Looks up the server factory registered under `name`.
    pub fn server(&self, name: &str) -> ConfigResult<&ServerFactory> {
        self.servers.get(name).ok_or_else(|| ConfigError::UnknownType {
            kind: "server",
            name: name.to_string(),
        })
    }

    /// Looks up the client factory registered under `name`.
    pub fn client(&self, name: &str) -> ConfigResult<&ClientFactory> {
        self.clients.get(name).ok_or_else(|| ConfigError::UnknownType {
            kind: "client",
            name: name.to_string(),
        })
    }

    pub fn has_server(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    pub fn has_client(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
