// Batch step
// Runs a set of named sub-steps, optionally restricted to selected executors

use crate::capabilities::{CapabilityError, Step, StepCall};
use crate::parser::models::{Mapping, Value};

use tracing::info;

/// `batch` step.
///
/// ```yaml
/// batch:
///   executors: [web]
///   commands:
///     web: {name: shell, args: {cmd: npm run build}}
///     api: {name: shell, args: {cmd: mvn package}}
/// ```
pub struct BatchStep;

impl Step for BatchStep {
    fn parameters(&self) -> &[&'static str] {
        &["commands", "executors"]
    }

    fn decorate_arguments(&self, mut arguments: Mapping) -> Result<Mapping, CapabilityError> {
        let Some(Value::Object(commands)) = arguments.get("commands") else {
            return Err(CapabilityError::new(
                "Missing commands, it can not be None.",
            ));
        };

        // Executor lists written as expressions are only known after resolution
        let selected = match arguments.get("executors") {
            Some(Value::Array(executors)) => Some(selected_commands(commands, executors)),
            _ => None,
        };
        if let Some(selected) = selected {
            arguments.insert("commands".to_string(), Value::Object(selected));
        }

        Ok(arguments)
    }

    fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError> {
        let commands = match call.get("commands") {
            Some(Value::Object(commands)) => commands.clone(),
            _ => return Err(CapabilityError::new("'commands' must be a mapping")),
        };

        let commands = match call.get("executors") {
            Some(Value::Array(executors)) => selected_commands(&commands, executors),
            Some(Value::String(executors)) => {
                let executors: Vec<Value> = executors
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(Value::from)
                    .collect();
                selected_commands(&commands, &executors)
            }
            _ => commands,
        };

        let registry = call.registry();
        let mut results = Mapping::new();

        for (key, command) in &commands {
            let Some(command) = command.as_object() else {
                return Err(CapabilityError::new(format!(
                    "command '{}' must be a mapping",
                    key
                )));
            };
            let name = command
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| CapabilityError::new(format!("command '{}' has no name", key)))?;
            let args = command
                .get("args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            info!(command = %key, step = name, "running batch command");
            let result = registry.run_step(name, &args, call.resolver)?;
            results.insert(key.clone(), result.map(Value::Object).unwrap_or_default());
        }

        Ok(Some(results))
    }
}

fn selected_commands(commands: &Mapping, executors: &[Value]) -> Mapping {
    commands
        .iter()
        .filter(|(key, _)| executors.iter().any(|e| e.as_string() == **key))
        .map(|(key, command)| (key.clone(), command.clone()))
        .collect()
}
