// Construction-time overrides
// `path=value` document patches and `name=value` runtime variables

use crate::parser::error::ValidationError;
use crate::parser::models::{Mapping, Value};

use indexmap::IndexMap;
use regex::Regex;

use std::sync::LazyLock;

static PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w.-]+)=(.*)$").expect("override pattern is valid"));

/// Parse a `key=value` pair. Keys are word, dot and dash characters.
pub fn parse_pair(pair: &str) -> Result<(String, String), String> {
    let caps = PAIR_RE.captures(pair).ok_or_else(|| {
        format!(
            "invalid variable \"{}\", the format should be \"key=value\" with key matching [\\w.-]+",
            pair
        )
    })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// Overrides supplied by the caller when loading a description and building a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    /// Dotted document path -> literal text, applied before validation
    pub document: IndexMap<String, String>,
    /// Runtime variable name -> value, wins over variable definitions
    pub variables: IndexMap<String, String>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.document.insert(path.into(), value.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Runtime variables as context values
    pub fn variable_values(&self) -> Mapping {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }

    /// Patch every document override into `document`
    pub fn apply_to(&self, document: &mut Value) -> Result<(), ValidationError> {
        for (path, literal) in &self.document {
            set_path(document, path, Value::from_literal(literal))?;
        }
        Ok(())
    }
}

/// Set `value` at dotted `path`, creating intermediate mappings as needed
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), ValidationError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ValidationError::new("empty segment in override path", path));
    }

    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        if current.is_null() {
            *current = Value::Object(Mapping::new());
        }
        let Value::Object(map) = current else {
            return Err(ValidationError::new(
                format!(
                    "cannot set override, '{}' is not a mapping",
                    segments[..i].join(".")
                ),
                path,
            ));
        };

        if i + 1 == segments.len() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        current = map.entry(segment.to_string()).or_insert(Value::Null);
    }

    Ok(())
}
