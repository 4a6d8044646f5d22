// Event Dispatch
// Runs `_on_<event>` handler bindings, most specific scope first

use crate::capabilities::Registry;
use crate::error::{ServiceError, ServiceResult};
use crate::execution::context::ExecutionContext;
use crate::expression::Resolver;
use crate::parser::description::JobDescription;
use crate::parser::models::Mapping;

use tracing::{debug, info};

/// Lifecycle events a job run emits
pub const ERROR_EVENT: &str = "error";
pub const SUCCESS_EVENT: &str = "success";

/// Dispatches events for one repository/job pair
pub struct EventDispatcher<'a> {
    description: &'a JobDescription,
    registry: &'a Registry,
    repository: &'a str,
    job: &'a str,
}

impl<'a> EventDispatcher<'a> {
    pub fn new(
        description: &'a JobDescription,
        registry: &'a Registry,
        repository: &'a str,
        job: &'a str,
    ) -> Self {
        Self {
            description,
            registry,
            repository,
            job,
        }
    }

    /// Dispatch `event`, optionally bound to a step key.
    ///
    /// `scope` is visible to argument resolution as named variables and as the `$`
    /// bucket. Returns whether a handler consumed the event.
    pub fn dispatch(
        &self,
        event: &str,
        context: &ExecutionContext,
        step_key: Option<&str>,
        scope: Option<&Mapping>,
    ) -> ServiceResult<bool> {
        let handlers = self
            .description
            .event_handlers(event, self.repository, self.job, step_key);

        if handlers.is_empty() {
            debug!(event, "no handlers bound");
            return Ok(false);
        }

        let resolver = Resolver::new(context, self.registry);
        let resolver = match scope {
            Some(scope) => resolver.with_scope(scope),
            None => resolver,
        };

        for spec in handlers {
            let args = resolver.resolve_mapping(&spec.args)?;

            let handler = self.registry.event_handler(&spec.name).ok_or_else(|| {
                ServiceError::NotImplemented(format!(
                    "event handler \"{}\" not supported yet",
                    spec.name
                ))
            })?;

            info!(event, handler = %spec.name, "running event handler");
            let consumed = handler
                .run(&args)
                .map_err(|e| ServiceError::EventHandler {
                    handler: spec.name.clone(),
                    message: e.message,
                })?;

            if consumed {
                debug!(event, handler = %spec.name, "event consumed");
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityError, EventHandler};
    use crate::parser::models::Value;

    use std::sync::{Arc, Mutex};

    /// Records `message` and returns `consume`
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl EventHandler for Recorder {
        fn run(&self, args: &Mapping) -> Result<bool, CapabilityError> {
            let message = args.get("message").map(Value::as_string).unwrap_or_default();
            self.calls.lock().unwrap().push(message);
            Ok(args.get("consume").map(Value::is_truthy).unwrap_or(false))
        }
    }

    struct Failing;

    impl EventHandler for Failing {
        fn run(&self, _args: &Mapping) -> Result<bool, CapabilityError> {
            Err(CapabilityError::new("handler broke"))
        }
    }

    const DESCRIPTION: &str = r#"
repositories:
  _on_error: {name: record, args: {message: global}}
  repo1:
    _on_error: {name: record, args: {message: repository}}
    build:
      _on_error: {name: record, args: {message: 'job ${.error.message}', consume: '${consume_job}'}}
      _on_success: {name: record, args: {message: 'done ${0.context.job}'}}
      checkout:
        _on_error: {name: record, args: {message: 'step ${.error.step}'}}
"#;

    fn recorder_registry() -> (Registry, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        registry.register_event_handler(
            "record",
            Recorder {
                calls: Arc::clone(&calls),
            },
        );
        (registry, calls)
    }

    fn error_scope() -> Mapping {
        let mut error = Mapping::new();
        error.insert("step".to_string(), Value::from("checkout"));
        error.insert("message".to_string(), Value::from("boom"));
        let mut scope = Mapping::new();
        scope.insert("error".to_string(), Value::Object(error));
        scope
    }

    #[test]
    fn test_handlers_run_most_specific_first() {
        let description: JobDescription = DESCRIPTION.parse().unwrap();
        let (registry, calls) = recorder_registry();
        let context = ExecutionContext::new("repo1", "build");
        let scope = error_scope();

        let dispatcher = EventDispatcher::new(&description, &registry, "repo1", "build");
        let consumed = dispatcher
            .dispatch(ERROR_EVENT, &context, Some("checkout"), Some(&scope))
            .unwrap();

        assert!(!consumed);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["step checkout", "job boom", "repository", "global"]
        );
    }

    #[test]
    fn test_consumed_event_stops_chain() {
        let description: JobDescription = DESCRIPTION.parse().unwrap();
        let (registry, calls) = recorder_registry();
        let mut context = ExecutionContext::new("repo1", "build");
        let mut variables = Mapping::new();
        variables.insert("consume_job".to_string(), Value::Bool(true));
        context.set_variables(variables);
        let scope = error_scope();

        let dispatcher = EventDispatcher::new(&description, &registry, "repo1", "build");
        let consumed = dispatcher
            .dispatch(ERROR_EVENT, &context, Some("checkout"), Some(&scope))
            .unwrap();

        assert!(consumed);
        assert_eq!(*calls.lock().unwrap(), vec!["step checkout", "job boom"]);
    }

    #[test]
    fn test_success_event_without_step() {
        let description: JobDescription = DESCRIPTION.parse().unwrap();
        let (registry, calls) = recorder_registry();
        let context = ExecutionContext::new("repo1", "build");

        let dispatcher = EventDispatcher::new(&description, &registry, "repo1", "build");
        dispatcher
            .dispatch(SUCCESS_EVENT, &context, None, None)
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["done build"]);
    }

    #[test]
    fn test_no_handlers_is_a_no_op() {
        let description: JobDescription = DESCRIPTION.parse().unwrap();
        let registry = Registry::new();
        let context = ExecutionContext::new("repo1", "build");

        let dispatcher = EventDispatcher::new(&description, &registry, "repo1", "build");
        assert!(!dispatcher
            .dispatch("deploy", &context, None, None)
            .unwrap());
    }

    #[test]
    fn test_missing_handler_is_not_implemented() {
        let description: JobDescription = DESCRIPTION.parse().unwrap();
        let registry = Registry::new();
        let context = ExecutionContext::new("repo1", "build");

        let dispatcher = EventDispatcher::new(&description, &registry, "repo1", "build");
        let err = dispatcher
            .dispatch(SUCCESS_EVENT, &context, None, None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotImplemented(_)));
    }

    #[test]
    fn test_failing_handler() {
        let description: JobDescription = DESCRIPTION.parse().unwrap();
        let mut registry = Registry::new();
        registry.register_event_handler("record", Failing);
        let context = ExecutionContext::new("repo1", "build");

        let dispatcher = EventDispatcher::new(&description, &registry, "repo1", "build");
        let err = dispatcher
            .dispatch(SUCCESS_EVENT, &context, None, None)
            .unwrap_err();

        let ServiceError::EventHandler { handler, message } = err else {
            panic!("expected an event handler error, got {:?}", err);
        };
        assert_eq!(handler, "record");
        assert_eq!(message, "handler broke");
    }
}
