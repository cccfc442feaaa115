//! Configuration model for driver runs.
//!
//! This module defines the typed shapes a driver-decorator configuration
//! deserializes into, along with the defaults applied before a container
//! is built. The schema mirrors the task-description surface:
//!
//! ```text
//! DriverConfig (one concrete run)
//! ├── isolation              - false: once per session, true: once per test
//! ├── client: ComponentSpec  - "fantoccini" | { type, capabilities, url, .. }
//! ├── server: ComponentSpec  - "selenium"   | { type, configuration, .. }
//! └── coverage: CoverageConfig
//! ```
//!
//! A bare string is shorthand for `{ "type": <string> }` on both the
//! client and the server side. Expansion (see [`crate::expand`]) has
//! already reduced any server *list* to a single entry by the time a
//! `DriverConfig` is parsed.
//!
//! # Example
//!
//! ```
//! use motorcade::config::DriverConfig;
//!
//! let config = DriverConfig::from_value(&serde_json::json!({
//!     "isolation": false,
//!     "client": { "type": "fantoccini" },
//!     "server": "selenium",
//!     "coverage": { "active": true }
//! })).unwrap();
//!
//! assert!(config.coverage.active);
//! assert_eq!(config.coverage.coverage_var, "__coverage__");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result type for configuration and registry operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fatal configuration errors, raised eagerly at construction time.
///
/// These are never retried: a malformed or unresolvable configuration
/// aborts the run before any server or client is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A `type` field did not resolve to a registered factory.
    #[error("unknown {kind} type \"{name}\"")]
    UnknownType { kind: &'static str, name: String },

    /// The options object failed structural validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A coverage exclude entry is not a valid glob pattern.
    #[error("invalid coverage exclude pattern \"{pattern}\": {source}")]
    ExcludePattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A coverage mapping rule's `from` field is not a valid regex.
    #[error("invalid coverage mapping expression \"{from}\": {source}")]
    MappingExpression {
        from: String,
        #[source]
        source: regex::Error,
    },
}

/// Fallback component type when a spec omits `type`.
pub const DEFAULT_TYPE: &str = "external";

/// Well-known WebDriver hub URL used when neither the client spec nor
/// the server supplies one.
pub const DEFAULT_HUB_URL: &str = "http://127.0.0.1:4444/wd/hub";

/// One concrete driver-run configuration.
///
/// This is the shape of a driver decorator's `configuration` field
/// *after* expansion: the `server` field names exactly one server.
/// Missing fields take their defaults; wrong field types are a
/// [`ConfigError`] at parse time, not on first use.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// `false` starts the server/client pair once per session;
    /// `true` restarts it around every individual test.
    pub isolation: bool,

    /// The driver client to attach (library wrapper around the driver
    /// connection).
    pub client: ComponentSpec,

    /// The driver server to run against (process or remote endpoint
    /// exposing a WebDriver URL).
    pub server: ComponentSpec,

    /// Remote coverage collection settings.
    pub coverage: CoverageConfig,
}

impl DriverConfig {
    /// Parses a driver configuration from a JSON value, validating the
    /// structure eagerly.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Isolation mode for a container's lifecycle.
///
/// Wire format is the boolean `isolation` field on [`DriverConfig`]:
/// `false` maps to [`Isolation::Session`], `true` to
/// [`Isolation::PerTest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// One setup/tear-down bracket around the whole session.
    Session,
    /// A fresh setup/tear-down bracket around every test.
    PerTest,
}

impl From<bool> for Isolation {
    fn from(per_test: bool) -> Self {
        if per_test {
            Isolation::PerTest
        } else {
            Isolation::Session
        }
    }
}

/// A client or server reference: either a bare type name or a full
/// options object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ComponentSpec {
    /// Shorthand: `"selenium"` means `{ "type": "selenium" }`.
    Name(String),
    /// Full options object.
    Options(ComponentOptions),
}

impl Default for ComponentSpec {
    fn default() -> Self {
        ComponentSpec::Options(ComponentOptions::default())
    }
}

impl ComponentSpec {
    /// Normalizes the spec into a full options object.
    pub fn into_options(self) -> ComponentOptions {
        match self {
            ComponentSpec::Name(name) => ComponentOptions {
                kind: Some(name),
                ..ComponentOptions::default()
            },
            ComponentSpec::Options(options) => options,
        }
    }
}

/// Options for constructing one client or server instance.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ComponentOptions {
    /// Registered factory name; `"external"` when absent.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Requested driver capabilities (client side). Augmented by the
    /// server before the client is constructed.
    pub capabilities: Map<String, Value>,

    /// Variant-specific configuration (ports, binaries, credentials).
    pub configuration: Map<String, Value>,

    /// Explicit WebDriver endpoint URL. Takes precedence over the URL
    /// the server advertises.
    pub url: Option<String>,
}

impl ComponentOptions {
    /// The factory name to resolve, falling back to [`DEFAULT_TYPE`].
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_TYPE)
    }
}

/// Remote coverage collection settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `active` | `false` |
/// | `coverageVar` | `"__coverage__"` |
/// | `mapping` | none |
/// | `excludes` | `**/node_modules/**`, `**/test/**`, `**/tests/**` |
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageConfig {
    /// Whether remote coverage is collected at all.
    pub active: bool,

    /// Name of the in-page variable holding the coverage object.
    pub coverage_var: String,

    /// Ordered path-rewrite rules applied after exclusion filtering.
    pub mapping: Option<Vec<MappingRule>>,

    /// Glob patterns; a path matching any of them is dropped.
    pub excludes: Vec<String>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            active: false,
            coverage_var: default_coverage_var(),
            mapping: None,
            excludes: default_excludes(),
        }
    }
}

fn default_coverage_var() -> String {
    "__coverage__".to_string()
}

fn default_excludes() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/test/**".to_string(),
        "**/tests/**".to_string(),
    ]
}

/// One coverage path-rewrite rule.
///
/// `from` is a regex source; the first match in a path is replaced
/// with `to`. Rules apply in list order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappingRule {
    pub from: String,
    pub to: String,
}

/// Capabilities every client requests unless overridden.
pub fn default_capabilities() -> Map<String, Value> {
    let mut caps = Map::new();
    caps.insert("acceptSslCerts".to_string(), Value::Bool(true));
    caps.insert("cssSelectorsEnabled".to_string(), Value::Bool(true));
    caps.insert("javascriptEnabled".to_string(), Value::Bool(true));
    caps.insert("takesScreenshot".to_string(), Value::Bool(true));
    caps.insert("handlesAlerts".to_string(), Value::Bool(true));
    caps.insert(
        "unexpectedAlertBehavior".to_string(),
        Value::String("accept".to_string()),
    );
    caps
}

/// Merges an override map onto a base map without mutating either.
///
/// Nested objects merge recursively; any other value in the override
/// replaces the base value wholesale.
pub fn merge_maps(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overlay {
        match (merged.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                let nested = merge_maps(existing, incoming);
                merged.insert(key.clone(), Value::Object(nested));
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}
