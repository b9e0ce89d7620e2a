use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use cohortex_types::{ANY_EVENT_COLUMN, RECORD_END_COLUMN, RECORD_START_COLUMN};

use crate::error::{Error, Result};
use crate::predicate::{DerivedPredicate, PlainPredicate, PredicateDef};
use crate::tree::WindowTree;
use crate::window::{Endpoint, WindowSpec};

/// Reserved names a trigger may use in place of a declared predicate.
const RESERVED_TRIGGERS: [&str; 3] = [ANY_EVENT_COLUMN, RECORD_START_COLUMN, RECORD_END_COLUMN];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDerived {
    expr: String,
    #[serde(default, rename = "static")]
    static_inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWindow {
    start: Option<String>,
    end: Option<String>,
    start_inclusive: bool,
    end_inclusive: bool,
    #[serde(default)]
    has: serde_yaml::Mapping,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    index_timestamp: Option<String>,
}

/// A fully validated task specification: declared predicates, the trigger,
/// the configured windows, and the window tree derived from them.
///
/// Built once per invocation and immutable thereafter.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    predicates: Vec<(String, PredicateDef)>,
    trigger: String,
    windows: Vec<(String, WindowSpec)>,
    label_window: Option<String>,
    index_timestamp_window: Option<String>,
    derived_order: Vec<String>,
    tree: WindowTree,
}

impl TaskConfig {
    /// Load and validate a task document from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            return Err(Error::Config(format!(
                "only '.yaml' task documents are supported; got: '{}'",
                path.display()
            )));
        }
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot load configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a task document from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let doc: serde_yaml::Mapping = serde_yaml::from_str(text)?;

        let mut predicates_raw = None;
        let mut trigger_raw = None;
        let mut windows_raw = None;
        let mut unknown: Vec<String> = Vec::new();
        for (key, value) in doc {
            match key.as_str() {
                Some("predicates") => predicates_raw = Some(expect_mapping(value, "predicates")?),
                Some("trigger") => {
                    trigger_raw = Some(serde_yaml::from_value::<String>(value).map_err(|e| {
                        Error::Config(format!("key 'trigger': {}", e))
                    })?);
                }
                Some("windows") => windows_raw = Some(expect_mapping(value, "windows")?),
                // Unused beyond readability of the document itself.
                Some("description") => {}
                _ => unknown.push(key_name(&key)),
            }
        }
        if !unknown.is_empty() {
            return Err(Error::Config(format!(
                "unrecognized keys in configuration file: '{}'",
                unknown.join(", ")
            )));
        }
        let predicates_raw = predicates_raw.ok_or_else(|| missing_key("predicates"))?;
        let trigger = trigger_raw.ok_or_else(|| missing_key("trigger"))?;
        let windows_raw = windows_raw.ok_or_else(|| missing_key("windows"))?;

        info!("Parsing predicates...");
        let mut predicates = Vec::new();
        for (key, value) in predicates_raw {
            let name = string_key(&key, "predicate")?;
            let def = if value.get("expr").is_some() {
                let raw: RawDerived = serde_yaml::from_value(value)
                    .map_err(|e| Error::Config(format!("predicate '{}': {}", name, e)))?;
                PredicateDef::Derived(DerivedPredicate::parse(&raw.expr, raw.static_inputs)?)
            } else {
                let raw: PlainPredicate = serde_yaml::from_value(value)
                    .map_err(|e| Error::Config(format!("predicate '{}': {}", name, e)))?;
                PredicateDef::Plain(raw)
            };
            predicates.push((name, def));
        }

        info!("Parsing windows...");
        let mut windows = Vec::new();
        for (key, value) in windows_raw {
            let name = string_key(&key, "window")?;
            let raw: RawWindow = serde_yaml::from_value(value)
                .map_err(|e| Error::Config(format!("window '{}': {}", name, e)))?;
            let has = raw
                .has
                .into_iter()
                .map(|(k, v)| {
                    let pred = string_key(&k, "constraint")?;
                    let bounds: String = serde_yaml::from_value(v).map_err(|e| {
                        Error::Config(format!(
                            "constraint '{}' of window '{}': {}",
                            pred, name, e
                        ))
                    })?;
                    Ok((pred, bounds))
                })
                .collect::<Result<Vec<_>>>()?;
            let spec = WindowSpec::new(
                raw.start,
                raw.end,
                raw.start_inclusive,
                raw.end_inclusive,
                has,
                raw.label,
                raw.index_timestamp,
            )
            .map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("window '{}': {}", name, msg)),
                Error::Ordering(msg) => Error::Ordering(format!("window '{}': {}", name, msg)),
                other => other,
            })?;
            windows.push((name, spec));
        }

        Self::new(predicates, trigger, windows)
    }

    /// Validate an already-parsed task model and derive the window tree.
    pub fn new(
        predicates: Vec<(String, PredicateDef)>,
        trigger: String,
        windows: Vec<(String, WindowSpec)>,
    ) -> Result<Self> {
        let derived_order = validate_predicates(&predicates)?;
        let (label_window, index_timestamp_window) =
            validate_windows(&predicates, &trigger, &windows)?;

        let tree = WindowTree::build(&windows)?;

        Ok(Self {
            predicates,
            trigger,
            windows,
            label_window,
            index_timestamp_window,
            derived_order,
            tree,
        })
    }

    pub fn predicates(&self) -> &[(String, PredicateDef)] {
        &self.predicates
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateDef> {
        self.predicates
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def)
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn windows(&self) -> &[(String, WindowSpec)] {
        &self.windows
    }

    pub fn window(&self, name: &str) -> Option<&WindowSpec> {
        self.windows
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    pub fn tree(&self) -> &WindowTree {
        &self.tree
    }

    pub fn label_window(&self) -> Option<&str> {
        self.label_window.as_deref()
    }

    pub fn index_timestamp_window(&self) -> Option<&str> {
        self.index_timestamp_window.as_deref()
    }

    /// Names of declared subject-level (static) predicates.
    pub fn static_predicates(&self) -> Vec<&str> {
        self.predicates
            .iter()
            .filter(|(_, def)| def.is_static())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Derived predicates in dependency (topological) order.
    pub fn derived_predicates(&self) -> Vec<(&str, &DerivedPredicate)> {
        self.derived_order
            .iter()
            .filter_map(|name| match self.predicate(name) {
                Some(PredicateDef::Derived(def)) => Some((name.as_str(), def)),
                _ => None,
            })
            .collect()
    }

    /// The tree node carrying the label, with the labeling predicate.
    /// The label lives on the window's non-root endpoint.
    pub fn label_node(&self) -> Option<(String, String)> {
        let window = self.label_window.as_deref()?;
        let spec = self.window(window)?;
        let endpoint = spec.root_node().other();
        let predicate = spec.label.clone()?;
        Some((format!("{}.{}", window, endpoint.as_str()), predicate))
    }

    /// The tree node and timestamp field supplying the prediction time.
    pub fn index_node(&self) -> Option<(String, Endpoint)> {
        let window = self.index_timestamp_window.as_deref()?;
        let spec = self.window(window)?;
        let node_endpoint = spec.root_node().other();
        let field = spec.index_timestamp?;
        Some((format!("{}.{}", window, node_endpoint.as_str()), field))
    }
}

fn name_is_valid(name: &str) -> bool {
    let re = regex::Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex");
    re.is_match(name)
}

/// Check predicate names and derived inputs, and return the derived
/// predicate names in topological order.
fn validate_predicates(predicates: &[(String, PredicateDef)]) -> Result<Vec<String>> {
    let declared: HashSet<&str> = predicates.iter().map(|(n, _)| n.as_str()).collect();

    let mut missing = Vec::new();
    for (name, def) in predicates {
        if !name_is_valid(name) {
            return Err(Error::Config(format!(
                "predicate name '{}' is invalid; must be composed of alphanumeric or '_' \
                 characters",
                name
            )));
        }
        if let PredicateDef::Derived(derived) = def {
            for input in &derived.inputs {
                if !declared.contains(input.as_str()) {
                    missing.push(format!(
                        "derived predicate '{}' references undefined predicate '{}'",
                        name, input
                    ));
                }
            }
        }
    }
    if !missing.is_empty() {
        return Err(Error::MissingReference(missing.join("\n")));
    }

    // Kahn's algorithm over the adjacency implied by derived inputs: a
    // derived predicate is ready once every input is plain or already ordered.
    let mut ordered: Vec<String> = Vec::new();
    let mut ready: HashSet<String> = predicates
        .iter()
        .filter(|(_, def)| def.is_plain())
        .map(|(n, _)| n.clone())
        .collect();
    let mut remaining: Vec<(&str, &DerivedPredicate)> = predicates
        .iter()
        .filter_map(|(n, def)| match def {
            PredicateDef::Derived(d) => Some((n.as_str(), d)),
            PredicateDef::Plain(_) => None,
        })
        .collect();

    while !remaining.is_empty() {
        let mut resolved: Vec<String> = Vec::new();
        remaining.retain(|(name, derived)| {
            if derived.inputs.iter().all(|i| ready.contains(i)) {
                resolved.push(name.to_string());
                false
            } else {
                true
            }
        });
        if resolved.is_empty() {
            let names: Vec<&str> = remaining.iter().map(|(n, _)| *n).collect();
            return Err(Error::Cycle(format!(
                "predicate graph is not a directed acyclic graph; unresolved: {}",
                names.join(", ")
            )));
        }
        for name in resolved {
            ready.insert(name.clone());
            ordered.push(name);
        }
    }

    Ok(ordered)
}

fn validate_windows(
    predicates: &[(String, PredicateDef)],
    trigger: &str,
    windows: &[(String, WindowSpec)],
) -> Result<(Option<String>, Option<String>)> {
    let declared: HashSet<&str> = predicates.iter().map(|(n, _)| n.as_str()).collect();

    let mut label_windows = Vec::new();
    let mut index_windows = Vec::new();
    for (name, window) in windows {
        if !name_is_valid(name) {
            return Err(Error::Config(format!(
                "window name '{}' is invalid; must be composed of alphanumeric or '_' \
                 characters",
                name
            )));
        }
        if let Some(label) = &window.label {
            if !declared.contains(label.as_str()) {
                return Err(Error::MissingReference(format!(
                    "label must be one of the defined predicates; got: '{}' for window '{}'",
                    label, name
                )));
            }
            label_windows.push(name.clone());
        }
        if window.index_timestamp.is_some() {
            index_windows.push(name.clone());
        }

        for predicate in window.referenced_predicates() {
            // `*` binds to `_ANY_EVENT` at constraint-check time.
            if predicate == "*" {
                continue;
            }
            if predicate != ANY_EVENT_COLUMN && !declared.contains(predicate.as_str()) {
                return Err(Error::MissingReference(format!(
                    "window '{}' references undefined predicate '{}'",
                    name, predicate
                )));
            }
        }
    }

    if label_windows.len() > 1 {
        return Err(Error::Cardinality(format!(
            "only one window can be labeled; found {} labeled windows: {}",
            label_windows.len(),
            label_windows.join(", ")
        )));
    }
    if index_windows.len() > 1 {
        return Err(Error::Cardinality(format!(
            "only the 'start'/'end' of one window can be used as the index timestamp; found \
             {} windows with index_timestamp: {}",
            index_windows.len(),
            index_windows.join(", ")
        )));
    }

    if !declared.contains(trigger) && !RESERVED_TRIGGERS.contains(&trigger) {
        return Err(Error::MissingReference(format!(
            "trigger event predicate '{}' not found in predicates: {}",
            trigger,
            predicates
                .iter()
                .map(|(n, _)| n.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok((label_windows.pop(), index_windows.pop()))
}

fn expect_mapping(value: serde_yaml::Value, key: &str) -> Result<serde_yaml::Mapping> {
    match value {
        serde_yaml::Value::Mapping(map) => Ok(map),
        _ => Err(Error::Config(format!(
            "configuration key '{}' must be a mapping",
            key
        ))),
    }
}

fn missing_key(key: &str) -> Error {
    Error::Config(format!("configuration is missing required key '{}'", key))
}

fn key_name(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

fn string_key(key: &serde_yaml::Value, kind: &str) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(Error::Config(format!(
            "{} names must be strings; got: {:?}",
            kind, other
        ))),
    }
}
