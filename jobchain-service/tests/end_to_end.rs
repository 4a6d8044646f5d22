// End-to-end job runs through the public API

use jobchain_service::{
    CapabilityError, EventHandler, ExecutionState, JobDescription, JobExecutor, Mapping,
    Overrides, Registry, ServiceError, Step, StepCall, Value,
};

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Stands in for a source checkout
struct Checkout;

impl Step for Checkout {
    fn parameters(&self) -> &[&'static str] {
        &["url", "branch"]
    }

    fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError> {
        let mut result = Mapping::new();
        result.insert("url".to_string(), Value::from(call.require_str("url")?));
        Ok(Some(result))
    }
}

/// Reports the modules it was asked to build
struct NpmBuild;

impl Step for NpmBuild {
    fn parameters(&self) -> &[&'static str] {
        &["modules"]
    }

    fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError> {
        let modules = call
            .get("modules")
            .cloned()
            .unwrap_or_else(|| Value::from(vec!["a", "b"]));
        if modules.as_array().is_some_and(|m| m.is_empty()) {
            return Err(CapabilityError::new("nothing to build"));
        }

        let mut result = Mapping::new();
        result.insert("modules".to_string(), modules);
        Ok(Some(result))
    }
}

#[derive(Clone, Default)]
struct Events {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Events {
    fn recorded(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl EventHandler for Events {
    fn run(&self, args: &Mapping) -> Result<bool, CapabilityError> {
        let message = args.get("message").map(Value::as_string).unwrap_or_default();
        self.calls.lock().unwrap().push(message);
        Ok(args.get("consume").map(Value::is_truthy).unwrap_or(false))
    }
}

fn registry(events: &Events) -> Registry {
    let mut registry = Registry::with_builtins();
    registry
        .register_step("checkout", Checkout)
        .register_step("npm_build", NpmBuild)
        .register_event_handler("notify", events.clone());
    registry
}

const DESCRIPTION: &str = r#"
template:
  checkout:
    url: git@example.org:web.git
    branch: main
  npm_build.web:
    modules: [a, b]

variable:
  release:
    value: '${version}'
    parser: '$trim({});'
  modules:
    value: 'web api'
    parser: '$split();'

repositories:
  _on_error:
    name: notify
    args: {message: 'global: ${.error.step_name}'}
  repo1:
    _on_error:
      name: notify
      args: {message: 'repository: ${.error.message}', consume: true}
    build:
      _on_error:
        name: notify
        args: {message: 'job: ${error}'}
      _on_success:
        name: notify
        args: {message: 'built ${2.modules} for ${0.context.repository}'}
      checkout:
        _condition: false
      npm_build.web:
    release:
      checkout:
        branch: 'release-${release}'
      npm_build.web:
        modules: []
      checkout.after:
        url: never
    summary:
      npm_build.web:
        modules: '${modules}'
      output:
        values:
          count: '$length(${1.modules});'
          first: '$eval(${1.modules}[0]);'
          sum: '$eval(${1.modules}[0] + "-" + ${1.modules}[-1]);'
          release: 'v${release}'
"#;

#[test]
fn test_skipped_step_and_template_defaults() {
    let description: JobDescription = DESCRIPTION.parse().unwrap();
    let events = Events::default();
    let registry = registry(&events);

    let mut executor =
        JobExecutor::new(&description, &registry, "repo1", "build", &Overrides::new()).unwrap();
    executor.execute().unwrap();

    let context = executor.context();
    assert_eq!(executor.state(), ExecutionState::Succeeded);
    assert_eq!(context.slot(1), Some(&Value::Object(Mapping::new())));

    let mut expected = Mapping::new();
    expected.insert("modules".to_string(), Value::from(vec!["a", "b"]));
    assert_eq!(context.slot(2), Some(&Value::Object(expected)));

    assert_eq!(events.recorded(), vec![r#"built ["a","b"] for repo1"#]);
}

#[test]
fn test_failure_fires_error_handlers_until_consumed() {
    let description: JobDescription = DESCRIPTION.parse().unwrap();
    let events = Events::default();
    let registry = registry(&events);

    let overrides = Overrides::new().with_variable("version", " 2.0 ");
    let mut executor =
        JobExecutor::new(&description, &registry, "repo1", "release", &overrides).unwrap();

    let err = executor.execute().unwrap_err();
    let ServiceError::Step(step_error) = &err else {
        panic!("expected a step error, got {:?}", err);
    };
    assert_eq!(step_error.step_name(), "npm_build.web");
    assert_eq!(
        err.to_string(),
        "the step 'npm_build.web' failed, error: nothing to build"
    );

    let context = executor.context();
    assert_eq!(executor.state(), ExecutionState::Failed);
    assert_eq!(context.slot_count(), 3);
    assert_eq!(
        context.slot(1).and_then(|s| s.as_object()).map(|s| s["url"].clone()),
        Some(Value::from("git@example.org:web.git"))
    );
    assert_eq!(context.slot(2), Some(&Value::Object(Mapping::new())));
    assert_eq!(context.variable("release"), Some(&Value::from("2.0")));

    // The job handler renders the whole error mapping; the repository handler consumes.
    let recorded = events.recorded();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].starts_with("job: {"));
    assert!(recorded[0].contains(r#""step_name":"npm_build.web""#));
    assert_eq!(recorded[1], "repository: nothing to build");
}

#[test]
fn test_function_calls_in_arguments() {
    let description: JobDescription = DESCRIPTION.parse().unwrap();
    let events = Events::default();
    let registry = registry(&events);

    let overrides = Overrides::new().with_variable("version", "3.1");
    let mut executor =
        JobExecutor::new(&description, &registry, "repo1", "summary", &overrides).unwrap();
    executor.execute().unwrap();

    let output = executor
        .context()
        .slot(2)
        .and_then(Value::as_object)
        .cloned()
        .unwrap();
    assert_eq!(output["count"], Value::Number(2.0));
    assert_eq!(output["first"], Value::from("web"));
    assert_eq!(output["sum"], Value::from("web-api"));
    assert_eq!(output["release"], Value::from("v3.1"));
}

#[test]
fn test_document_overrides_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DESCRIPTION.as_bytes()).unwrap();

    let overrides = Overrides::new()
        .with_document("repositories.repo1.build.checkout._condition", "true")
        .with_document("template.checkout.url", "git@example.org:api.git");
    let description =
        JobDescription::load(file.path().to_str().unwrap(), &overrides).unwrap();

    let events = Events::default();
    let registry = registry(&events);
    let mut executor =
        JobExecutor::new(&description, &registry, "repo1", "build", &overrides).unwrap();
    executor.execute().unwrap();

    let checkout = executor.context().slot(1).and_then(Value::as_object).cloned().unwrap();
    assert_eq!(checkout["url"], Value::from("git@example.org:api.git"));
}

#[test]
fn test_invalid_document_reports_every_problem() {
    let err = "repositories:\n  repo1:\n    build:\n      bad name!: {}\n      ok:\n        _on_error: {name: 3}\n"
        .parse::<JobDescription>()
        .unwrap_err();

    let ServiceError::Validation(errors) = err else {
        panic!("expected validation errors, got {:?}", err);
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].path, "repositories.repo1.build.bad name!");
    assert_eq!(errors[1].path, "repositories.repo1.build.ok._on_error");
}

#[cfg(unix)]
#[test]
fn test_builtin_shell_and_batch_steps() {
    let description: JobDescription = r#"
repositories:
  local:
    run:
      shell:
        cmd: 'echo {}-{}'
        parameters: [[a, 1], ['${0.context.job}', 2]]
      batch:
        executors: [second]
        commands:
          first: {name: shell, args: {cmd: 'exit 3'}}
          second: {name: output, args: {values: {seen: '${1.stdout}'}}}
"#
    .parse()
    .unwrap();
    let registry = Registry::with_builtins();

    let mut executor =
        JobExecutor::new(&description, &registry, "local", "run", &Overrides::new()).unwrap();
    executor.execute().unwrap();

    let shell = executor.context().slot(1).and_then(Value::as_object).cloned().unwrap();
    assert_eq!(shell["stdout"], Value::from("run-2"));
    assert_eq!(shell["exit_code"], Value::Number(0.0));

    let batch = executor.context().slot(2).and_then(Value::as_object).cloned().unwrap();
    assert_eq!(batch.keys().collect::<Vec<_>>(), vec!["second"]);
    let second = batch["second"].as_object().unwrap();
    assert_eq!(second["seen"], Value::from("run-2"));
}
