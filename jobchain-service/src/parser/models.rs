// Job Description Models
// Dynamic values, step keys, event-handler bindings and variable definitions

use indexmap::IndexMap;
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use std::fmt;
use std::sync::LazyLock;

/// Ordered string-keyed mapping. Key order is significant: a job's keys are its
/// execution order.
pub type Mapping = IndexMap<String, Value>;

/// A step key is `name` or `name.alias`
pub const STEP_NAME_PATTERN: &str = r"^(\w+)(?:\.([\w.-]+))?$";

/// Prefix of keys that configure a step or job instead of naming a parameter
pub const CONFIG_PREFIX: char = '_';

/// Prefix of event-handler binding keys (`_on_success`, `_on_error`, ...)
pub const EVENT_HANDLER_PREFIX: &str = "_on_";

static STEP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(STEP_NAME_PATTERN).expect("step name pattern is valid"));

/// Dynamic value used for document data, step arguments and step results
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Mapping),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Mapping> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// String form used when a value is substituted into surrounding text
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_json(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Convert a parsed YAML node. Non-string keys are stringified, tags are dropped.
    pub fn from_yaml(yaml: &serde_yaml::Value) -> Value {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => Value::Number(
                n.as_f64()
                    .or_else(|| n.as_i64().map(|i| i as f64))
                    .unwrap_or_default(),
            ),
            serde_yaml::Value::String(s) => Value::String(s.clone()),
            serde_yaml::Value::Sequence(seq) => {
                Value::Array(seq.iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Object(
                map.iter()
                    .filter_map(|(k, v)| yaml_key(k).map(|key| (key, Value::from_yaml(v))))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(&tagged.value),
        }
    }

    /// Parse `text` as a JSON literal, keeping it as plain text when it is not one
    pub fn from_literal(text: &str) -> Value {
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Object(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parsed step key: `npm_build.web` is step `npm_build` with alias `web`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    pub name: String,
    pub alias: Option<String>,
}

impl StepKey {
    pub fn parse(key: &str) -> Option<Self> {
        let caps = STEP_NAME_RE.captures(key)?;
        Some(Self {
            name: caps[1].to_string(),
            alias: caps.get(2).map(|m| m.as_str().to_string()),
        })
    }

    pub fn is_valid(key: &str) -> bool {
        STEP_NAME_RE.is_match(key)
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}.{}", self.name, alias),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A job after template merging: step key -> argument mapping, in declared order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Job {
    pub steps: IndexMap<String, Mapping>,
}

impl Job {
    pub fn get(&self, step_key: &str) -> Option<&Mapping> {
        self.steps.get(step_key)
    }

    pub fn step_keys(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.steps
                .iter()
                .map(|(k, v)| (k.clone(), Value::Object(v.clone())))
                .collect(),
        )
    }
}

/// `_on_<event>` binding: the handler to invoke and its unresolved arguments
#[derive(Debug, Clone, PartialEq)]
pub struct EventHandlerSpec {
    pub name: String,
    pub args: Mapping,
}

impl EventHandlerSpec {
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Some(map) = value.as_object() else {
            return Err("event handler binding must be a mapping".to_string());
        };
        let name = match map.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err("the name of an event handler must be a string".to_string()),
            None => return Err("missing name for the event handler".to_string()),
        };
        let args = match map.get("args") {
            Some(Value::Object(args)) => args.clone(),
            Some(_) => return Err("the args of an event handler must be a mapping".to_string()),
            None => return Err("missing args for the event handler".to_string()),
        };
        Ok(Self { name, args })
    }
}

/// Entry of the top-level `variable` section
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableDefinition {
    pub value: Option<Value>,
    pub parser: Option<String>,
}

impl VariableDefinition {
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            _ => return Err("variable definition must be a mapping".to_string()),
        };
        let parser = match map.get("parser") {
            None | Some(Value::Null) => None,
            Some(Value::String(parser)) => Some(parser.clone()),
            Some(_) => return Err("variable parser must be a string".to_string()),
        };
        Ok(Self {
            value: map.get("value").cloned(),
            parser,
        })
    }
}
