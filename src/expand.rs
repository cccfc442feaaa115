//! Task-description expansion.
//!
//! A task description may ask for several browser/server combinations in
//! one go: the driver decorator's `configuration` can be a list, and each
//! configuration's `server` can be a list. This module expands such a
//! task into independent, concrete task variants (one per combination)
//! before any container is ever built.
//!
//! The expansion is a pure function over JSON trees. Every produced
//! variant is a fresh deep copy; unrelated decorators and task fields are
//! carried through untouched. Malformed shapes are passed through rather
//! than rejected (`decorators` missing or not an array ⇒ the task comes
//! back unchanged), so expansion never fails on any input.
//!
//! # Example
//!
//! ```
//! use motorcade::expand::expand_task;
//! use serde_json::json;
//!
//! let task = json!({
//!     "type": "mocha",
//!     "decorators": [{
//!         "type": "webDriver",
//!         "configuration": { "server": ["chromedriver", "geckodriver"] }
//!     }]
//! });
//!
//! let variants = expand_task(&task);
//! assert_eq!(variants.len(), 2);
//! assert_eq!(variants[0]["decorators"][0]["configuration"]["server"], "chromedriver");
//! assert_eq!(variants[1]["decorators"][0]["configuration"]["server"], "geckodriver");
//! ```

use serde_json::Value;

/// Decorator type identifier recognized for expansion. Entries with any
/// other `type` pass through on every variant, unexpanded.
pub const DRIVER_DECORATOR: &str = "webDriver";

/// Expands one task description into its concrete variants.
///
/// Walks `task.decorators` in order. For each entry whose `type` is
/// [`DRIVER_DECORATOR`] and that carries a `configuration`, the
/// configuration is expanded via [`expand_configurations`] and one task
/// variant is appended per concrete configuration, differing from the
/// input only in that decorator's `configuration` field.
///
/// The variant accumulator is reset when the *first* matching decorator
/// is found; later matching decorators append their variants after the
/// first's. A task with no matching decorator comes back as a
/// single-element list holding a copy of the input.
///
/// Output order is deterministic: decorators outer, configuration
/// entries next, server entries innermost.
pub fn expand_task(task: &Value) -> Vec<Value> {
    let mut result = vec![task.clone()];
    let mut modified = false;

    let Some(decorators) = task.get("decorators").and_then(Value::as_array) else {
        return result;
    };

    for (index, decorator) in decorators.iter().enumerate() {
        if decorator.get("type").and_then(Value::as_str) != Some(DRIVER_DECORATOR) {
            continue;
        }
        let Some(configuration) = decorator.get("configuration") else {
            continue;
        };

        let concrete = expand_configurations(configuration);

        // Only decorators that actually require expansion affect the
        // output count.
        if !modified {
            modified = true;
            result = Vec::new();
        }

        for configuration in concrete {
            let mut variant = task.clone();
            variant["decorators"][index]["configuration"] = configuration;
            result.push(variant);
        }
    }

    result
}

/// Expands a decorator `configuration` field: a list expands element by
/// element and concatenates in order, anything else expands directly.
pub fn expand_configurations(configuration: &Value) -> Vec<Value> {
    match configuration.as_array() {
        Some(entries) => entries.iter().flat_map(expand_configuration).collect(),
        None => expand_configuration(configuration),
    }
}

/// Expands one configuration over its `server` field.
///
/// When `server` is present, one copy of the configuration is produced
/// per server entry (in order), each with `server` overwritten by that
/// single entry. A configuration without `server` is returned as-is.
pub fn expand_configuration(configuration: &Value) -> Vec<Value> {
    let Some(server) = configuration.get("server") else {
        return vec![configuration.clone()];
    };

    as_sequence(server)
        .into_iter()
        .map(|entry| {
            let mut concrete = configuration.clone();
            concrete["server"] = entry;
            concrete
        })
        .collect()
}

/// Normalizes a value into a sequence: arrays as-is, anything else as a
/// one-element sequence.
pub fn as_sequence(value: &Value) -> Vec<Value> {
    match value.as_array() {
        Some(entries) => entries.clone(),
        None => vec![value.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_without_decorators_passes_through() {
        let task = json!({ "type": "mocha", "data": 21 });
        let variants = expand_task(&task);

        assert_eq!(variants, vec![task]);
    }

    #[test]
    fn decorators_of_other_types_pass_through() {
        let task = json!({
            "type": "mocha",
            "decorators": [{ "type": "coverage", "configuration": { "server": ["a", "b"] } }]
        });
        let variants = expand_task(&task);

        assert_eq!(variants, vec![task]);
    }

    #[test]
    fn non_array_decorators_pass_through() {
        let task = json!({ "type": "mocha", "decorators": "oops" });
        assert_eq!(expand_task(&task), vec![task]);
    }

    #[test]
    fn matching_decorator_without_configuration_passes_through() {
        let task = json!({ "decorators": [{ "type": "webDriver" }] });
        assert_eq!(expand_task(&task), vec![task]);
    }

    #[test]
    fn server_list_yields_one_variant_per_server_in_order() {
        let task = json!({
            "decorators": [{
                "type": "webDriver",
                "configuration": { "server": ["chromedriver", "selenium"] }
            }]
        });

        let variants = expand_task(&task);

        assert_eq!(variants.len(), 2);
        assert_eq!(
            variants[0]["decorators"][0]["configuration"]["server"],
            "chromedriver"
        );
        assert_eq!(
            variants[1]["decorators"][0]["configuration"]["server"],
            "selenium"
        );
    }

    #[test]
    fn configuration_list_and_server_lists_multiply() {
        // Two configuration entries with 2 and 3 servers: 5 variants.
        let task = json!({
            "decorators": [{
                "type": "webDriver",
                "configuration": [
                    { "client": "fantoccini", "server": ["a", "b"] },
                    { "client": "thirtyfour", "server": ["c", "d", "e"] }
                ]
            }]
        });

        let variants = expand_task(&task);

        assert_eq!(variants.len(), 5);
        let servers: Vec<_> = variants
            .iter()
            .map(|v| v["decorators"][0]["configuration"]["server"].clone())
            .collect();
        assert_eq!(servers, vec![json!("a"), json!("b"), json!("c"), json!("d"), json!("e")]);
        assert_eq!(
            variants[0]["decorators"][0]["configuration"]["client"],
            "fantoccini"
        );
        assert_eq!(
            variants[2]["decorators"][0]["configuration"]["client"],
            "thirtyfour"
        );
    }

    #[test]
    fn configuration_without_server_expands_to_itself() {
        let task = json!({
            "decorators": [{
                "type": "webDriver",
                "configuration": { "client": "fantoccini" }
            }]
        });

        let variants = expand_task(&task);

        assert_eq!(variants.len(), 1);
        assert_eq!(
            variants[0]["decorators"][0]["configuration"],
            json!({ "client": "fantoccini" })
        );
    }

    #[test]
    fn unrelated_fields_are_preserved_on_every_variant() {
        let task = json!({
            "type": "mocha",
            "data": { "nested": [1, 2, 3] },
            "decorators": [
                { "type": "junit", "configuration": { "path": "out.xml" } },
                { "type": "webDriver", "configuration": { "server": ["a", "b"] } }
            ]
        });

        let variants = expand_task(&task);

        assert_eq!(variants.len(), 2);
        for variant in &variants {
            assert_eq!(variant["type"], "mocha");
            assert_eq!(variant["data"], json!({ "nested": [1, 2, 3] }));
            assert_eq!(
                variant["decorators"][0],
                json!({ "type": "junit", "configuration": { "path": "out.xml" } })
            );
        }
    }

    #[test]
    fn variants_are_deep_copies_isolated_from_the_input() {
        let mut task = json!({
            "type": "mocha",
            "decorators": [{ "type": "webDriver", "configuration": { "data": 1 } }],
            "data": 21
        });

        let variants = expand_task(&task);

        // Mutating the original afterwards must not leak into variants.
        task["data"] = json!(23);
        assert_eq!(variants[0]["data"], 21);
    }

    #[test]
    fn variants_are_isolated_from_each_other() {
        let task = json!({
            "decorators": [{ "type": "webDriver", "configuration": { "server": ["a", "b"] } }],
            "shared": { "flag": true }
        });

        let mut variants = expand_task(&task);
        variants[0]["shared"]["flag"] = json!(false);

        assert_eq!(variants[1]["shared"]["flag"], true);
    }

    #[test]
    fn two_matching_decorators_concatenate_their_expansions() {
        // The accumulator resets only on the first matching decorator:
        // the second appends its variants (built from the original task)
        // after the first's. Pinned behavior, see DESIGN.md.
        let task = json!({
            "decorators": [
                { "type": "webDriver", "configuration": { "server": ["a", "b"] } },
                { "type": "webDriver", "configuration": { "server": ["c"] } }
            ]
        });

        let variants = expand_task(&task);

        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0]["decorators"][0]["configuration"]["server"], "a");
        assert_eq!(variants[1]["decorators"][0]["configuration"]["server"], "b");
        // The third variant expanded the second decorator; the first
        // decorator's configuration is back to its unexpanded form.
        assert_eq!(variants[2]["decorators"][1]["configuration"]["server"], "c");
        assert_eq!(
            variants[2]["decorators"][0]["configuration"]["server"],
            json!(["a", "b"])
        );
    }

    #[test]
    fn as_sequence_wraps_scalars_and_keeps_arrays() {
        assert_eq!(as_sequence(&json!("x")), vec![json!("x")]);
        assert_eq!(as_sequence(&json!(["x", "y"])), vec![json!("x"), json!("y")]);
        assert_eq!(as_sequence(&json!({ "type": "a" })), vec![json!({ "type": "a" })]);
    }
}
