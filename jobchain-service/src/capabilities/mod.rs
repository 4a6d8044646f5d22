// Capabilities Module
// Step, event-handler and function contracts plus the registry that holds them

pub mod batch;
pub mod log;
pub mod output;
pub mod shell;

pub use batch::BatchStep;
pub use log::LogHandler;
pub use output::OutputStep;
pub use shell::ShellStep;

use crate::error::ServiceError;
use crate::expression::functions::BUILTIN_FUNCTIONS;
use crate::expression::Resolver;
use crate::parser::models::{Mapping, Value};

use std::collections::HashMap;
use thiserror::Error;

/// Failure reported by a capability
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<ServiceError> for CapabilityError {
    fn from(err: ServiceError) -> Self {
        Self::new(err.to_string())
    }
}

/// Everything a step receives for one invocation
pub struct StepCall<'a> {
    /// Resolved parameters the step declared
    pub parameters: Mapping,
    /// Fresh per-call scratch mapping
    pub scratch: Mapping,
    /// Resolver bound to the running job's context
    pub resolver: &'a Resolver<'a>,
}

impl<'a> StepCall<'a> {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).filter(|value| !value.is_null())
    }

    /// A required string parameter
    pub fn require_str(&self, name: &str) -> Result<String, CapabilityError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.as_string()),
            None => Err(CapabilityError::new(format!(
                "missing required parameter '{}'",
                name
            ))),
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.resolver.registry()
    }
}

/// A unit of work invoked by name from a job
pub trait Step: Send + Sync {
    /// Parameter names the step accepts; anything else is not passed
    fn parameters(&self) -> &[&'static str];

    /// Hook applied to the raw argument mapping before resolution
    fn decorate_arguments(&self, arguments: Mapping) -> Result<Mapping, CapabilityError> {
        Ok(arguments)
    }

    fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError>;
}

/// Reacts to a job lifecycle event. Returns whether the event was consumed.
pub trait EventHandler: Send + Sync {
    fn run(&self, args: &Mapping) -> Result<bool, CapabilityError>;
}

/// Value transform callable as `$name(args);`
pub trait Function: Send + Sync {
    fn run(&self, args: Vec<Value>) -> Result<Value, CapabilityError>;
}

impl<F> Function for F
where
    F: Fn(Vec<Value>) -> Result<Value, CapabilityError> + Send + Sync,
{
    fn run(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        self(args)
    }
}

/// Capability registry, populated explicitly at startup
#[derive(Default)]
pub struct Registry {
    steps: HashMap<String, Box<dyn Step>>,
    event_handlers: HashMap<String, Box<dyn EventHandler>>,
    functions: HashMap<String, Box<dyn Function>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in steps, handlers and functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_step("shell", ShellStep::new())
            .register_step("output", OutputStep)
            .register_step("batch", BatchStep)
            .register_event_handler("log", LogHandler);

        for (name, function) in BUILTIN_FUNCTIONS {
            registry.register_function(*name, *function);
        }
        registry
    }

    pub fn register_step(&mut self, name: impl Into<String>, step: impl Step + 'static) -> &mut Self {
        self.steps.insert(name.into(), Box::new(step));
        self
    }

    pub fn register_event_handler(
        &mut self,
        name: impl Into<String>,
        handler: impl EventHandler + 'static,
    ) -> &mut Self {
        self.event_handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        function: impl Function + 'static,
    ) -> &mut Self {
        self.functions.insert(name.into(), Box::new(function));
        self
    }

    pub fn step(&self, name: &str) -> Option<&dyn Step> {
        self.steps.get(name).map(|step| step.as_ref())
    }

    pub fn event_handler(&self, name: &str) -> Option<&dyn EventHandler> {
        self.event_handlers.get(name).map(|handler| handler.as_ref())
    }

    pub fn function(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(name).map(|function| function.as_ref())
    }

    /// Registered step names, sorted
    pub fn step_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke step `name` with plain parameters, as a nested call from another step
    pub fn run_step(
        &self,
        name: &str,
        parameters: &Mapping,
        resolver: &Resolver<'_>,
    ) -> Result<Option<Mapping>, CapabilityError> {
        let step = self
            .step(name)
            .ok_or_else(|| CapabilityError::new(format!("Not found the executor [{}]", name)))?;

        let parameters = step.decorate_arguments(parameters.clone())?;
        let call = StepCall {
            parameters: declared_parameters(step, &parameters),
            scratch: Mapping::new(),
            resolver,
        };
        step.run(call)
    }
}

/// Keep only the non-`_` parameters the step declares
pub fn declared_parameters(step: &dyn Step, parameters: &Mapping) -> Mapping {
    let declared = step.parameters();
    parameters
        .iter()
        .filter(|(name, _)| declared.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Step for Echo {
        fn parameters(&self) -> &[&'static str] {
            &["message"]
        }

        fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError> {
            Ok(Some(call.parameters))
        }
    }

    #[test]
    fn test_registry_builtins() {
        let registry = Registry::with_builtins();

        assert_eq!(registry.step_names(), vec!["batch", "output", "shell"]);
        assert!(registry.event_handler("log").is_some());
        assert!(registry.function("dict_values").is_some());
        assert!(registry.function("upper").is_some());
        assert!(registry.step("checkout").is_none());
    }

    #[test]
    fn test_register_closure_function() {
        let mut registry = Registry::new();
        registry.register_function("first", |args: Vec<Value>| {
            Ok::<_, CapabilityError>(args.into_iter().next().unwrap_or_default())
        });

        let function = registry.function("first").unwrap();
        assert_eq!(
            function.run(vec![Value::from("a"), Value::from("b")]).unwrap(),
            Value::from("a")
        );
    }

    #[test]
    fn test_declared_parameters_filter() {
        let mut parameters = Mapping::new();
        parameters.insert("message".to_string(), Value::from("hi"));
        parameters.insert("extra".to_string(), Value::from("dropped"));

        let filtered = declared_parameters(&Echo, &parameters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["message"], Value::from("hi"));
    }

    #[test]
    fn test_capability_error_from_io() {
        let err: CapabilityError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into();
        assert_eq!(err.to_string(), "no such file");
    }
}
