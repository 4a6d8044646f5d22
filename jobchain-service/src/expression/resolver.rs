// Variable Resolution
// Resolves `${...}` references and `$func(...);` calls embedded in values

use crate::capabilities::Registry;
use crate::error::{ServiceError, ServiceResult};
use crate::execution::context::ExecutionContext;
use crate::expression::evaluator::{evaluate, EvalError};
use crate::expression::patterns::{
    path_segments, CONTEXT_PATH_RE, CONTEXT_PATH_SEARCH_RE, FUNCTION_CALL_RE,
    FUNCTION_CALL_SEARCH_RE, NAMED_VARIABLE_RE, NAMED_VARIABLE_SEARCH_RE, REFERENCE_RE,
};
use crate::parser::models::{Mapping, Value};

use indexmap::IndexMap;
use regex::{Captures, Regex};
use tracing::debug;

/// Resolves expressions against one job run's context.
///
/// A scope mapping, when set, stands in for the `$` bucket and is searched before
/// `variables` for named references.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    context: &'a ExecutionContext,
    registry: &'a Registry,
    scope: Option<&'a Mapping>,
}

impl<'a> Resolver<'a> {
    pub fn new(context: &'a ExecutionContext, registry: &'a Registry) -> Self {
        Self {
            context,
            registry,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: &'a Mapping) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn context(&self) -> &'a ExecutionContext {
        self.context
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Resolve strings; recurse through sequences element-wise and mappings value-wise
    pub fn resolve(&self, value: &Value) -> ServiceResult<Value> {
        match value {
            Value::String(text) => self.resolve_str(text),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<ServiceResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => self.resolve_mapping(map).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    pub fn resolve_mapping(&self, map: &Mapping) -> ServiceResult<Mapping> {
        map.iter()
            .map(|(key, value)| -> ServiceResult<(String, Value)> {
                Ok((key.clone(), self.resolve(value)?))
            })
            .collect()
    }

    /// Resolve one string. A string that is exactly one reference yields the
    /// referenced value itself; otherwise every reference is substituted as text.
    pub fn resolve_str(&self, text: &str) -> ServiceResult<Value> {
        if let Some(caps) = CONTEXT_PATH_RE.captures(text) {
            return Ok(self.path(&caps[1]));
        }
        if let Some(caps) = NAMED_VARIABLE_RE.captures(text) {
            return Ok(self.named(&caps[1]));
        }
        if let Some(caps) = FUNCTION_CALL_RE.captures(text) {
            match self.call(&caps[1], &caps[2]) {
                // `$a(..);-$b(..);` is several calls joined by text, not one call
                Err(ServiceError::Expression(_)) if spans_several_calls(text) => {}
                result => return result,
            }
        }
        if !text.contains('$') {
            return Ok(Value::String(text.to_string()));
        }

        let text = substitute(text, &FUNCTION_CALL_SEARCH_RE, |caps| {
            Ok(self.call(&caps[1], &caps[2])?.as_string())
        })?;
        let text = substitute(&text, &CONTEXT_PATH_SEARCH_RE, |caps| {
            Ok(self.path(&caps[1]).as_string())
        })?;
        let text = substitute(&text, &NAMED_VARIABLE_SEARCH_RE, |caps| {
            Ok(self.named(&caps[1]).as_string())
        })?;

        Ok(Value::String(text))
    }

    /// Context path as captured from `${<path>}`, e.g. `1.modules` or `.error.message`
    pub fn path(&self, path: &str) -> Value {
        self.context.lookup(&path_segments(path), self.scope)
    }

    /// Named variable: scope first, then resolved variables
    pub fn named(&self, name: &str) -> Value {
        self.scope
            .and_then(|scope| scope.get(name))
            .or_else(|| self.context.variable(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Call function `name` with the raw argument text between the parentheses
    pub fn call(&self, name: &str, args_text: &str) -> ServiceResult<Value> {
        let args = self.arguments(args_text)?;
        apply_function(self.registry, name, args)
    }

    /// Evaluate function argument text to positional values
    pub fn arguments(&self, args_text: &str) -> ServiceResult<Vec<Value>> {
        evaluate_arguments(args_text, &REFERENCE_RE, |reference| {
            self.resolve_str(reference)
        })
    }
}

fn spans_several_calls(text: &str) -> bool {
    FUNCTION_CALL_SEARCH_RE
        .find(text)
        .is_some_and(|first| first.end() < text.len())
}

/// Apply a function to evaluated arguments. `eval` returns its arguments, a single
/// argument unwrapped; any other name must be registered.
pub fn apply_function(registry: &Registry, name: &str, mut args: Vec<Value>) -> ServiceResult<Value> {
    if name == "eval" {
        return Ok(if args.len() == 1 {
            args.remove(0)
        } else {
            Value::Array(args)
        });
    }

    let function = registry.function(name).ok_or_else(|| {
        ServiceError::NotImplemented(format!("function \"{}\" not supported yet", name))
    })?;

    function.run(args).map_err(|e| {
        ServiceError::Expression(EvalError::new(format!(
            "function \"{}\" failed: {}",
            name, e
        )))
    })
}

/// Evaluate argument text as a list.
///
/// Each distinct match of `references` is bound to a placeholder `_var_<i>` in
/// first-occurrence order and converted once; the rewritten text is evaluated
/// as `[<text>]`.
pub fn evaluate_arguments<F>(
    args_text: &str,
    references: &Regex,
    mut convert: F,
) -> ServiceResult<Vec<Value>>
where
    F: FnMut(&str) -> ServiceResult<Value>,
{
    if args_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut placeholders: IndexMap<String, String> = IndexMap::new();
    for found in references.find_iter(args_text) {
        let next = format!("_var_{}", placeholders.len());
        placeholders.entry(found.as_str().to_string()).or_insert(next);
    }

    let body = references.replace_all(args_text, |caps: &Captures<'_>| {
        placeholders.get(&caps[0]).cloned().unwrap_or_default()
    });

    let mut bindings = Mapping::new();
    for (reference, placeholder) in &placeholders {
        bindings.insert(placeholder.clone(), convert(reference)?);
    }

    let expression = format!("[{}]", body);
    if !placeholders.is_empty() {
        debug!(
            arguments = args_text,
            generated = %expression,
            "resolving the argument expression"
        );
    }

    match evaluate(&expression, &bindings)? {
        Value::Array(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

/// Replace every match of `pattern` in `text` with the result of `replace`
pub fn substitute<F>(text: &str, pattern: &Regex, mut replace: F) -> ServiceResult<String>
where
    F: FnMut(&Captures<'_>) -> ServiceResult<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let Some(found) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..found.start()]);
        out.push_str(&replace(&caps)?);
        last = found.end();
    }
    out.push_str(&text[last..]);

    Ok(out)
}
