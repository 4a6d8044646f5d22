// Variable Definitions
// Resolves the `variable` section once per run, before any step executes

use crate::capabilities::Registry;
use crate::error::{ParseError, ServiceResult};
use crate::expression::patterns::{FUNCTION_CALL_RE, FUNCTION_CALL_SEARCH_RE, NAMED_VARIABLE_RE};
use crate::expression::{apply_function, evaluate_arguments, substitute};
use crate::parser::models::{Mapping, Value, VariableDefinition, CONFIG_PREFIX};
use crate::parser::overrides::Overrides;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use std::sync::LazyLock;

/// Where a parser receives the variable's input value
static VALUE_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\}").expect("placeholder pattern is valid"));

/// Resolve variable definitions in declaration order.
///
/// The result holds every runtime override, then each definition's parsed value.
pub fn resolve_variables(
    definitions: &IndexMap<String, VariableDefinition>,
    overrides: &Overrides,
    registry: &Registry,
) -> ServiceResult<Mapping> {
    let mut variables = overrides.variable_values();

    for (name, definition) in definitions {
        if name.starts_with(CONFIG_PREFIX) {
            continue;
        }

        let input = input_value(name, definition, overrides);
        let value = match &definition.parser {
            Some(parser) => parse_value(registry, parser, &input).map_err(|e| ParseError {
                name: name.clone(),
                parser: Some(parser.clone()),
                value: input.clone(),
                message: e.to_string(),
            })?,
            None => input,
        };

        debug!(variable = %name, value = %value, "resolved variable");
        variables.insert(name.clone(), value);
    }

    Ok(variables)
}

/// Runtime override first, else the literal. A literal of exactly `${name}`
/// reads runtime override `name`.
fn input_value(name: &str, definition: &VariableDefinition, overrides: &Overrides) -> Value {
    if let Some(value) = overrides.variables.get(name) {
        return Value::String(value.clone());
    }

    match &definition.value {
        Some(Value::String(text)) => match NAMED_VARIABLE_RE.captures(text) {
            Some(caps) => overrides
                .variables
                .get(&caps[1])
                .map(|value| Value::String(value.clone()))
                .unwrap_or_default(),
            None => Value::String(text.clone()),
        },
        Some(value) => value.clone(),
        None => Value::Null,
    }
}

fn parse_value(registry: &Registry, parser: &str, input: &Value) -> ServiceResult<Value> {
    if let Some(caps) = FUNCTION_CALL_RE.captures(parser) {
        return call_with_input(registry, &caps[1], &caps[2], input);
    }

    substitute(parser, &FUNCTION_CALL_SEARCH_RE, |caps| {
        Ok(call_with_input(registry, &caps[1], &caps[2], input)?.as_string())
    })
    .map(Value::String)
}

/// An empty argument list receives the input as its only argument; otherwise
/// every `{}` in the argument text is bound to the input.
fn call_with_input(
    registry: &Registry,
    name: &str,
    args_text: &str,
    input: &Value,
) -> ServiceResult<Value> {
    let args = if args_text.trim().is_empty() {
        vec![input.clone()]
    } else {
        evaluate_arguments(args_text, &VALUE_PLACEHOLDER_RE, |_| Ok(input.clone()))?
    };

    apply_function(registry, name, args)
}
