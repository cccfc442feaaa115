//! Remote coverage collection and aggregation.
//!
//! Instrumented pages accumulate istanbul-style coverage records in a
//! well-known window variable. This module pulls those records out of
//! the browser, filters and remaps their paths, and merges them across
//! every page load and every container of a run into one coverage map.
//!
//! The pipeline per collection:
//!
//! ```text
//! browser ──load──▶ raw value ──parse──▶ CoverageMap
//!                 ──filter (glob excludes)──▶
//!                 ──remap (regex rewrites)──▶
//!                 ──absorb──▶ CoverageAccumulator
//! ```
//!
//! Merging is additive: the same file observed twice has its statement,
//! function and branch hit counts summed, so partial reports from
//! per-test isolation add up to the same totals a single long session
//! would produce.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{Client, ClientError};
use crate::config::{ConfigError, ConfigResult, CoverageConfig};

/// Result type for coverage operations.
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Errors that can occur while collecting or merging coverage.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// The client failed to execute the in-page coverage script.
    #[error("failed to load remote coverage: {0}")]
    Remote(#[from] ClientError),

    /// The raw coverage payload was not valid JSON.
    #[error("failed to parse coverage payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The payload parsed but is not a coverage object.
    #[error("coverage payload has an unexpected shape")]
    UnexpectedShape,
}

/// Coverage records keyed by file path. BTreeMap keeps report output
/// deterministic.
pub type CoverageMap = BTreeMap<String, FileCoverage>;

/// Istanbul-format coverage record for one file.
///
/// `s`, `f` and `b` are hit counts keyed by statement, function and
/// branch id; the `*Map` fields describe source locations and are
/// carried through merging untouched (first writer wins). Unknown
/// fields emitted by other istanbul tooling survive a round trip via
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileCoverage {
    pub path: String,

    #[serde(default)]
    pub s: BTreeMap<String, u64>,

    #[serde(default)]
    pub f: BTreeMap<String, u64>,

    #[serde(default)]
    pub b: BTreeMap<String, Vec<u64>>,

    #[serde(default, rename = "statementMap")]
    pub statement_map: Map<String, Value>,

    #[serde(default, rename = "fnMap")]
    pub fn_map: Map<String, Value>,

    #[serde(default, rename = "branchMap")]
    pub branch_map: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Merges `incoming` into `target`, summing hit counts.
pub fn merge_records(target: &mut FileCoverage, incoming: &FileCoverage) {
    for (id, count) in &incoming.s {
        *target.s.entry(id.clone()).or_insert(0) += count;
    }
    for (id, count) in &incoming.f {
        *target.f.entry(id.clone()).or_insert(0) += count;
    }
    for (id, counts) in &incoming.b {
        let existing = target.b.entry(id.clone()).or_default();
        if existing.len() < counts.len() {
            existing.resize(counts.len(), 0);
        }
        for (slot, count) in counts.iter().enumerate() {
            existing[slot] += count;
        }
    }
    for (key, value) in &incoming.statement_map {
        if !target.statement_map.contains_key(key) {
            target.statement_map.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in &incoming.fn_map {
        if !target.fn_map.contains_key(key) {
            target.fn_map.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in &incoming.branch_map {
        if !target.branch_map.contains_key(key) {
            target.branch_map.insert(key.clone(), value.clone());
        }
    }
}

/// Merges `incoming` into `target` file by file.
pub fn merge_maps(target: &mut CoverageMap, incoming: CoverageMap) {
    for (path, record) in incoming {
        match target.get_mut(&path) {
            Some(existing) => merge_records(existing, &record),
            None => {
                target.insert(path, record);
            }
        }
    }
}

/// Parses the raw value a browser handed back into a coverage map.
///
/// Browsers return the coverage object serialized as a JSON string;
/// some drivers deserialize it on the way out and hand back the object
/// itself. A page that never loaded instrumented code yields `null`,
/// which parses to an empty map.
pub fn parse_raw(raw: &Value) -> CoverageResult<CoverageMap> {
    match raw {
        Value::Null => Ok(CoverageMap::new()),
        Value::String(payload) => Ok(serde_json::from_str(payload)?),
        Value::Object(_) => Ok(serde_json::from_value(raw.clone())?),
        _ => Err(CoverageError::UnexpectedShape),
    }
}

/// Compiled coverage settings for one container.
///
/// Patterns and regexes are compiled once at container construction so
/// a malformed configuration fails before any session starts.
#[derive(Debug, Clone)]
pub struct CoverageSettings {
    active: bool,
    coverage_var: String,
    excludes: Vec<glob::Pattern>,
    mapping: Vec<(Regex, String)>,
}

impl CoverageSettings {
    /// Compiles a [`CoverageConfig`] into usable settings.
    pub fn compile(config: &CoverageConfig) -> ConfigResult<Self> {
        if config.coverage_var.is_empty() {
            return Err(ConfigError::Invalid(
                "coverage coverageVar must not be empty".to_string(),
            ));
        }

        let excludes = config
            .excludes
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|source| ConfigError::ExcludePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let mapping = config
            .mapping
            .iter()
            .flatten()
            .map(|rule| {
                Regex::new(&rule.from)
                    .map(|regex| (regex, rule.to.clone()))
                    .map_err(|source| ConfigError::MappingExpression {
                        from: rule.from.clone(),
                        source,
                    })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            active: config.active,
            coverage_var: config.coverage_var.clone(),
            excludes,
            mapping,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn coverage_var(&self) -> &str {
        &self.coverage_var
    }

    /// Drops every record whose path matches any exclude pattern.
    pub fn filter(&self, coverage: CoverageMap) -> CoverageMap {
        coverage
            .into_iter()
            .filter(|(path, _)| !self.excludes.iter().any(|pattern| pattern.matches(path)))
            .collect()
    }

    /// Rewrites record paths through the mapping rules. Every rule is
    /// applied in list order, each replacing the first match of its
    /// regex in the path as rewritten so far; paths nothing matches
    /// pass through unchanged. The embedded `path` field is kept in
    /// sync with the map key.
    pub fn remap(&self, coverage: CoverageMap) -> CoverageMap {
        if self.mapping.is_empty() {
            return coverage;
        }

        let mut remapped = CoverageMap::new();
        for (path, record) in coverage {
            let mut rewritten = path;
            for (regex, to) in &self.mapping {
                rewritten = regex.replace(&rewritten, to.as_str()).into_owned();
            }

            let mut record = record;
            record.path = rewritten.clone();
            match remapped.get_mut(&rewritten) {
                Some(existing) => merge_records(existing, &record),
                None => {
                    remapped.insert(rewritten, record);
                }
            }
        }
        remapped
    }
}

/// Run-wide coverage sink shared by every container of a run.
///
/// Poisoning is ignored: a panicked test thread must not lose the
/// coverage already gathered.
#[derive(Debug, Clone, Default)]
pub struct CoverageAccumulator {
    inner: Arc<Mutex<CoverageMap>>,
}

impl CoverageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a coverage map into the accumulated total.
    pub fn absorb(&self, incoming: CoverageMap) {
        let mut total = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        merge_maps(&mut total, incoming);
    }

    /// A copy of everything accumulated so far.
    pub fn snapshot(&self) -> CoverageMap {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discards everything accumulated so far.
    pub fn reset(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Per-container coverage collector: settings plus the shared sink.
#[derive(Debug, Clone)]
pub struct Aggregator {
    settings: CoverageSettings,
    accumulator: CoverageAccumulator,
}

impl Aggregator {
    pub fn new(settings: CoverageSettings, accumulator: CoverageAccumulator) -> Self {
        Self {
            settings,
            accumulator,
        }
    }

    pub fn settings(&self) -> &CoverageSettings {
        &self.settings
    }

    pub fn accumulator(&self) -> &CoverageAccumulator {
        &self.accumulator
    }

    /// Pulls coverage out of the client's page and folds it into the
    /// accumulator. A no-op when coverage is inactive.
    pub async fn collect(&self, client: &mut dyn Client) -> CoverageResult<()> {
        if !self.settings.active {
            return Ok(());
        }

        let raw = client.load_coverage(&self.settings.coverage_var).await?;
        let coverage = parse_raw(&raw)?;
        let coverage = self.settings.filter(coverage);
        let coverage = self.settings.remap(coverage);

        debug!(files = coverage.len(), "collected remote coverage");
        self.accumulator.absorb(coverage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingRule;
    use async_trait::async_trait;
    use serde_json::json;

    fn record(path: &str, statements: &[(&str, u64)]) -> FileCoverage {
        FileCoverage {
            path: path.to_string(),
            s: statements
                .iter()
                .map(|(id, count)| (id.to_string(), *count))
                .collect(),
            ..FileCoverage::default()
        }
    }

    fn settings(config: &CoverageConfig) -> CoverageSettings {
        CoverageSettings::compile(config).unwrap()
    }

    #[test]
    fn merge_into_empty_is_identity() {
        let mut total = CoverageMap::new();
        let mut incoming = CoverageMap::new();
        incoming.insert("src/a.js".into(), record("src/a.js", &[("1", 2)]));

        merge_maps(&mut total, incoming.clone());

        assert_eq!(total, incoming);
    }

    #[test]
    fn overlapping_records_sum_their_counts() {
        let mut total = CoverageMap::new();
        total.insert("src/a.js".into(), record("src/a.js", &[("1", 2), ("2", 0)]));

        let mut incoming = CoverageMap::new();
        incoming.insert("src/a.js".into(), record("src/a.js", &[("1", 3), ("3", 1)]));
        merge_maps(&mut total, incoming);

        let merged = &total["src/a.js"];
        assert_eq!(merged.s["1"], 5);
        assert_eq!(merged.s["2"], 0);
        assert_eq!(merged.s["3"], 1);
    }

    #[test]
    fn branch_arrays_pad_and_sum_elementwise() {
        let mut target = FileCoverage {
            b: [("1".to_string(), vec![1, 2])].into_iter().collect(),
            ..FileCoverage::default()
        };
        let incoming = FileCoverage {
            b: [("1".to_string(), vec![4, 0, 7])].into_iter().collect(),
            ..FileCoverage::default()
        };

        merge_records(&mut target, &incoming);

        assert_eq!(target.b["1"], vec![5, 2, 7]);
    }

    #[test]
    fn location_maps_keep_the_first_writer() {
        let mut target = FileCoverage::default();
        target
            .statement_map
            .insert("1".into(), json!({ "line": 1 }));
        let mut incoming = FileCoverage::default();
        incoming
            .statement_map
            .insert("1".into(), json!({ "line": 99 }));
        incoming
            .statement_map
            .insert("2".into(), json!({ "line": 2 }));

        merge_records(&mut target, &incoming);

        assert_eq!(target.statement_map["1"], json!({ "line": 1 }));
        assert_eq!(target.statement_map["2"], json!({ "line": 2 }));
    }

    #[test]
    fn parse_accepts_string_object_and_null() {
        let from_string = parse_raw(&json!(r#"{ "src/a.js": { "path": "src/a.js" } }"#)).unwrap();
        assert!(from_string.contains_key("src/a.js"));

        let from_object = parse_raw(&json!({ "src/a.js": { "path": "src/a.js" } })).unwrap();
        assert!(from_object.contains_key("src/a.js"));

        assert!(parse_raw(&Value::Null).unwrap().is_empty());
        assert!(matches!(
            parse_raw(&json!(42)),
            Err(CoverageError::UnexpectedShape)
        ));
    }

    #[test]
    fn default_excludes_drop_dependency_and_test_paths() {
        let settings = settings(&CoverageConfig::default());
        let mut coverage = CoverageMap::new();
        coverage.insert("src/a.js".into(), record("src/a.js", &[]));
        coverage.insert(
            "web/node_modules/x/y.js".into(),
            record("web/node_modules/x/y.js", &[]),
        );
        coverage.insert("app/test/a_test.js".into(), record("app/test/a_test.js", &[]));

        let filtered = settings.filter(coverage);

        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["src/a.js"]);
    }

    #[test]
    fn remap_rewrites_key_and_embedded_path() {
        let config = CoverageConfig {
            mapping: Some(vec![MappingRule {
                from: "^build/".to_string(),
                to: "src/".to_string(),
            }]),
            ..CoverageConfig::default()
        };
        let settings = settings(&config);

        let mut coverage = CoverageMap::new();
        coverage.insert("build/a.js".into(), record("build/a.js", &[("1", 1)]));
        coverage.insert("other/b.js".into(), record("other/b.js", &[]));

        let remapped = settings.remap(coverage);

        assert!(remapped.contains_key("src/a.js"));
        assert_eq!(remapped["src/a.js"].path, "src/a.js");
        assert!(remapped.contains_key("other/b.js"));
        assert!(!remapped.contains_key("build/a.js"));
    }

    #[test]
    fn rules_apply_cumulatively_in_list_order() {
        let config = CoverageConfig {
            mapping: Some(vec![
                MappingRule {
                    from: "^build/".to_string(),
                    to: "src/".to_string(),
                },
                MappingRule {
                    from: "a\\.js$".to_string(),
                    to: "z.js".to_string(),
                },
            ]),
            ..CoverageConfig::default()
        };
        let settings = settings(&config);

        let mut coverage = CoverageMap::new();
        coverage.insert("build/a.js".into(), record("build/a.js", &[]));

        // Both rules fire: the second sees the first's rewrite.
        let remapped = settings.remap(coverage);
        assert_eq!(remapped.keys().collect::<Vec<_>>(), vec!["src/z.js"]);
        assert_eq!(remapped["src/z.js"].path, "src/z.js");
    }

    #[test]
    fn each_rule_replaces_only_the_first_match_in_a_path() {
        let config = CoverageConfig {
            mapping: Some(vec![MappingRule {
                from: "lib/".to_string(),
                to: "src/".to_string(),
            }]),
            ..CoverageConfig::default()
        };
        let settings = settings(&config);

        let mut coverage = CoverageMap::new();
        coverage.insert("lib/lib/a.js".into(), record("lib/lib/a.js", &[]));

        let remapped = settings.remap(coverage);
        assert!(remapped.contains_key("src/lib/a.js"));
    }

    #[test]
    fn remap_collisions_merge() {
        let config = CoverageConfig {
            mapping: Some(vec![MappingRule {
                from: "^(build|dist)/".to_string(),
                to: "src/".to_string(),
            }]),
            ..CoverageConfig::default()
        };
        let settings = settings(&config);

        let mut coverage = CoverageMap::new();
        coverage.insert("build/a.js".into(), record("build/a.js", &[("1", 2)]));
        coverage.insert("dist/a.js".into(), record("dist/a.js", &[("1", 3)]));

        let remapped = settings.remap(coverage);

        assert_eq!(remapped.len(), 1);
        assert_eq!(remapped["src/a.js"].s["1"], 5);
    }

    #[test]
    fn bad_patterns_fail_compilation() {
        let bad_glob = CoverageConfig {
            excludes: vec!["[".to_string()],
            ..CoverageConfig::default()
        };
        assert!(matches!(
            CoverageSettings::compile(&bad_glob),
            Err(ConfigError::ExcludePattern { .. })
        ));

        let bad_regex = CoverageConfig {
            mapping: Some(vec![MappingRule {
                from: "(".to_string(),
                to: "x".to_string(),
            }]),
            ..CoverageConfig::default()
        };
        assert!(matches!(
            CoverageSettings::compile(&bad_regex),
            Err(ConfigError::MappingExpression { .. })
        ));

        let empty_var = CoverageConfig {
            coverage_var: String::new(),
            ..CoverageConfig::default()
        };
        assert!(CoverageSettings::compile(&empty_var).is_err());
    }

    struct ScriptedClient {
        payload: Value,
        calls: u32,
    }

    #[async_trait]
    impl Client for ScriptedClient {
        fn kind(&self) -> &str {
            "scripted"
        }
        fn url(&self) -> &str {
            "http://127.0.0.1:4444/wd/hub"
        }
        fn capabilities(&self) -> &Map<String, Value> {
            static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
            EMPTY.get_or_init(Map::new)
        }
        fn instance(&self) -> Option<crate::client::DriverHandle> {
            None
        }
        async fn start(&mut self) -> crate::client::ClientResult<()> {
            Ok(())
        }
        async fn stop(&mut self) -> crate::client::ClientResult<()> {
            Ok(())
        }
        async fn load_coverage(&mut self, _var: &str) -> crate::client::ClientResult<Value> {
            self.calls += 1;
            Ok(self.payload.clone())
        }
    }

    #[tokio::test]
    async fn inactive_aggregator_never_touches_the_client() {
        let aggregator = Aggregator::new(
            settings(&CoverageConfig::default()),
            CoverageAccumulator::new(),
        );
        let mut client = ScriptedClient {
            payload: json!({ "src/a.js": { "path": "src/a.js", "s": { "1": 1 } } }),
            calls: 0,
        };

        aggregator.collect(&mut client).await.unwrap();

        assert_eq!(client.calls, 0);
        assert!(aggregator.accumulator().snapshot().is_empty());
    }

    #[tokio::test]
    async fn active_aggregator_filters_and_accumulates() {
        let config = CoverageConfig {
            active: true,
            ..CoverageConfig::default()
        };
        let aggregator = Aggregator::new(settings(&config), CoverageAccumulator::new());
        let mut client = ScriptedClient {
            payload: json!({
                "src/a.js": { "path": "src/a.js", "s": { "1": 1 } },
                "x/node_modules/d.js": { "path": "x/node_modules/d.js", "s": { "1": 9 } }
            }),
            calls: 0,
        };

        aggregator.collect(&mut client).await.unwrap();
        aggregator.collect(&mut client).await.unwrap();

        assert_eq!(client.calls, 2);
        let total = aggregator.accumulator().snapshot();
        assert_eq!(total.len(), 1);
        assert_eq!(total["src/a.js"].s["1"], 2);
    }

    #[tokio::test]
    async fn null_payload_accumulates_nothing() {
        let config = CoverageConfig {
            active: true,
            ..CoverageConfig::default()
        };
        let aggregator = Aggregator::new(settings(&config), CoverageAccumulator::new());
        let mut client = ScriptedClient {
            payload: Value::Null,
            calls: 0,
        };

        aggregator.collect(&mut client).await.unwrap();

        assert!(aggregator.accumulator().snapshot().is_empty());
    }

    #[test]
    fn accumulator_reset_clears_state() {
        let accumulator = CoverageAccumulator::new();
        let mut incoming = CoverageMap::new();
        incoming.insert("src/a.js".into(), record("src/a.js", &[("1", 1)]));
        accumulator.absorb(incoming);

        accumulator.reset();

        assert!(accumulator.snapshot().is_empty());
    }
}
