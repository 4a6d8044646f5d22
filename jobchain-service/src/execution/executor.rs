// Job Executor
// Runs the steps of one repository/job pair in declared order

use crate::capabilities::{declared_parameters, Registry, StepCall};
use crate::error::{ServiceError, ServiceResult, StepError};
use crate::execution::context::ExecutionContext;
use crate::execution::events::{EventDispatcher, ERROR_EVENT, SUCCESS_EVENT};
use crate::execution::variables::resolve_variables;
use crate::expression::Resolver;
use crate::parser::description::JobDescription;
use crate::parser::models::{Job, Mapping, StepKey, Value, CONFIG_PREFIX, EVENT_HANDLER_PREFIX};
use crate::parser::overrides::Overrides;

use tracing::{error, info, warn};

/// Step configuration key; a falsy value skips the step
pub const CONDITION_KEY: &str = "_condition";

/// Lifecycle of one executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Initializing,
    /// Index of the step being run, 0-based
    Running(usize),
    Succeeded,
    Failed,
}

/// Executes one job. A job runs at most once per executor.
pub struct JobExecutor<'a> {
    description: &'a JobDescription,
    registry: &'a Registry,
    repository: String,
    job_name: String,
    job: Job,
    context: ExecutionContext,
    state: ExecutionState,
}

impl<'a> JobExecutor<'a> {
    /// Look up the job and resolve variable definitions. Fails on an unknown
    /// repository or job and on any variable parser failure.
    pub fn new(
        description: &'a JobDescription,
        registry: &'a Registry,
        repository: &str,
        job_name: &str,
        overrides: &Overrides,
    ) -> ServiceResult<Self> {
        let job = description.job(repository, job_name)?;

        let mut context = ExecutionContext::new(repository, job_name);
        let variables =
            resolve_variables(description.variable_definitions(), overrides, registry)?;
        context.set_variables(variables);

        Ok(Self {
            description,
            registry,
            repository: repository.to_string(),
            job_name: job_name.to_string(),
            job,
            context,
            state: ExecutionState::Initializing,
        })
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Run every step, then the `success` event.
    ///
    /// A failing step stops the run: its slot is left empty, the `error` event is
    /// dispatched for that step and the [`StepError`] is returned.
    pub fn execute(&mut self) -> ServiceResult<()> {
        if self.state != ExecutionState::Initializing {
            return Err(ServiceError::AlreadyExecuted);
        }

        let step_keys: Vec<String> = self.job.step_keys().map(String::from).collect();
        info!(
            repository = %self.repository,
            job = %self.job_name,
            steps = step_keys.len(),
            "running job"
        );

        for (index, step_key) in step_keys.iter().enumerate() {
            self.state = ExecutionState::Running(index);

            match self.run_step(step_key) {
                Ok(result) => self.context.set_slot(index + 1, result),
                Err(err) => {
                    self.context.set_slot(index + 1, Mapping::new());
                    self.state = ExecutionState::Failed;

                    if let ServiceError::Step(step_error) = &err {
                        error!(step = %step_key, error = %step_error.message, "step failed");
                        let mut scope = Mapping::new();
                        scope.insert("error".to_string(), step_error.to_value());
                        self.dispatcher().dispatch(
                            ERROR_EVENT,
                            &self.context,
                            Some(step_key.as_str()),
                            Some(&scope),
                        )?;
                    } else {
                        error!(step = %step_key, error = %err, "step aborted");
                    }
                    return Err(err);
                }
            }
        }

        if let Err(err) = self
            .dispatcher()
            .dispatch(SUCCESS_EVENT, &self.context, None, None)
        {
            self.state = ExecutionState::Failed;
            return Err(err);
        }

        self.state = ExecutionState::Succeeded;
        info!(repository = %self.repository, job = %self.job_name, "job succeeded");
        Ok(())
    }

    fn dispatcher(&self) -> EventDispatcher<'_> {
        EventDispatcher::new(self.description, self.registry, &self.repository, &self.job_name)
    }

    /// Resolve and invoke one step, returning the mapping for its slot
    fn run_step(&self, step_key: &str) -> ServiceResult<Mapping> {
        let key = StepKey::parse(step_key)
            .ok_or_else(|| StepError::new(step_key, None, "invalid step name"))?;
        info!(step = %key, "running step");

        let step = self.registry.step(&key.name).ok_or_else(|| {
            warn!(step = %key.name, alias = ?key.alias, "step not registered");
            StepError::new(&key.name, key.alias.clone(), "Not found")
        })?;

        let raw = self.job.get(step_key).cloned().unwrap_or_default();
        let raw = step
            .decorate_arguments(raw)
            .map_err(|e| StepError::new(&key.name, key.alias.clone(), e.message))?;

        let resolver = Resolver::new(&self.context, self.registry);
        let mut config = Mapping::new();
        let mut parameters = Mapping::new();

        for (name, value) in &raw {
            if name.starts_with(EVENT_HANDLER_PREFIX) {
                continue;
            }
            let value = resolver.resolve(value)?;
            if name.starts_with(CONFIG_PREFIX) {
                config.insert(name.clone(), value);
            } else {
                parameters.insert(name.clone(), value);
            }
        }

        if !config.get(CONDITION_KEY).map_or(true, Value::is_truthy) {
            info!(step = %key, "ignored, condition is false");
            return Ok(Mapping::new());
        }

        let call = StepCall {
            parameters: declared_parameters(step, &parameters),
            scratch: Mapping::new(),
            resolver: &resolver,
        };

        match step.run(call) {
            Ok(result) => Ok(result.unwrap_or_default()),
            Err(e) => Err(StepError::new(&key.name, key.alias, e.message).into()),
        }
    }
}
