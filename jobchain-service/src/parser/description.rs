// Job Description Store
// Loads a job description, validates its structure and serves merged jobs
// and scoped event-handler bindings

use crate::error::{ServiceError, ServiceResult};
use crate::parser::error::{DocumentError, DocumentErrorKind, ValidationError};
use crate::parser::models::{
    EventHandlerSpec, Job, Mapping, StepKey, Value, VariableDefinition, CONFIG_PREFIX,
    EVENT_HANDLER_PREFIX, STEP_NAME_PATTERN,
};
use crate::parser::overrides::Overrides;
use crate::parser::template::merge_job;

use indexmap::IndexMap;
use tracing::debug;

use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Parsed, validated job description. Read-only after construction.
#[derive(Debug, Clone)]
pub struct JobDescription {
    repositories: Mapping,
    template: Mapping,
    variables: IndexMap<String, VariableDefinition>,
}

impl JobDescription {
    /// Parse a YAML document, applying document overrides before validation
    pub fn parse(content: &str, overrides: &Overrides) -> ServiceResult<Self> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| DocumentError::from_yaml_error(&e, content))?;

        let mut document = Value::from_yaml(&yaml);
        overrides.apply_to(&mut document)?;
        Self::from_value(document)
    }

    /// Parse a job description file
    pub fn from_file<P: AsRef<Path>>(path: P, overrides: &Overrides) -> ServiceResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DocumentError::new(
                format!("failed to read '{}': {}", path.display(), e),
                DocumentErrorKind::Io,
            )
        })?;
        Self::parse(&content, overrides)
    }

    /// Load from a file path or an `http(s)://` URL
    pub fn load(source: &str, overrides: &Overrides) -> ServiceResult<Self> {
        if is_url(source) {
            debug!(url = source, "fetching job description");
            let content = fetch(source)?;
            Self::parse(&content, overrides)
        } else {
            Self::from_file(source, overrides)
        }
    }

    /// Build from an already parsed document
    pub fn from_value(document: Value) -> ServiceResult<Self> {
        DescriptionValidator::validate(&document).map_err(ServiceError::Validation)?;

        let Value::Object(mut root) = document else {
            // validate() rejects non-mapping documents
            return Err(ServiceError::Validation(vec![ValidationError::new(
                "document must be a mapping",
                "",
            )]));
        };

        let repositories = take_mapping(&mut root, "repositories");
        let template = take_mapping(&mut root, "template");
        let variables = take_mapping(&mut root, "variable")
            .iter()
            .filter(|(name, _)| !name.starts_with(CONFIG_PREFIX))
            .filter_map(|(name, def)| {
                VariableDefinition::from_value(def)
                    .ok()
                    .map(|def| (name.clone(), def))
            })
            .collect();

        Ok(Self {
            repositories,
            template,
            variables,
        })
    }

    pub fn repositories(&self) -> &Mapping {
        &self.repositories
    }

    pub fn template(&self) -> &Mapping {
        &self.template
    }

    /// Variable definitions in declaration order
    pub fn variable_definitions(&self) -> &IndexMap<String, VariableDefinition> {
        &self.variables
    }

    /// The job `job_name` of `repository_name`, with template defaults merged in
    pub fn job(&self, repository_name: &str, job_name: &str) -> ServiceResult<Job> {
        let repository = self
            .repository(repository_name)
            .ok_or_else(|| ServiceError::NotFound(format!("repository '{}'", repository_name)))?;

        let job = repository
            .get(job_name)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "job '{}' in repository '{}'",
                    job_name, repository_name
                ))
            })?;

        Ok(merge_job(&self.template, job))
    }

    /// Handler bindings for `event`, most specific scope first:
    /// step (when given), job, repository, then the global `repositories` scope.
    pub fn event_handlers(
        &self,
        event_name: &str,
        repository_name: &str,
        job_name: &str,
        step_key: Option<&str>,
    ) -> Vec<EventHandlerSpec> {
        let handler_key = format!("{}{}", EVENT_HANDLER_PREFIX, event_name);

        self.scopes(repository_name, job_name, step_key)
            .into_iter()
            .filter_map(|scope| scope.get(&handler_key))
            .filter_map(|binding| EventHandlerSpec::from_value(binding).ok())
            .collect()
    }

    fn repository(&self, name: &str) -> Option<&Mapping> {
        if name.starts_with(CONFIG_PREFIX) {
            return None;
        }
        self.repositories.get(name).and_then(Value::as_object)
    }

    fn scopes(&self, repository_name: &str, job_name: &str, step_key: Option<&str>) -> Vec<&Mapping> {
        let mut scopes = vec![&self.repositories];

        if let Some(repository) = self.repository(repository_name) {
            scopes.push(repository);
            if let Some(job) = repository.get(job_name).and_then(Value::as_object) {
                scopes.push(job);
                if let Some(step) = step_key.and_then(|key| job.get(key)).and_then(Value::as_object) {
                    scopes.push(step);
                }
            }
        }

        scopes.reverse();
        scopes
    }
}

impl FromStr for JobDescription {
    type Err = ServiceError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::parse(content, &Overrides::default())
    }
}

fn take_mapping(root: &mut Mapping, key: &str) -> Mapping {
    match root.shift_remove(key) {
        Some(Value::Object(map)) => map,
        _ => Mapping::new(),
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn fetch(url: &str) -> Result<String, DocumentError> {
    let to_error = |e: reqwest::Error| {
        DocumentError::new(format!("failed to fetch '{}': {}", url, e), DocumentErrorKind::Http)
    };

    reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(to_error)
}

/// Structural checks run once when a description is built
pub struct DescriptionValidator;

impl DescriptionValidator {
    pub fn validate(document: &Value) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let Some(root) = document.as_object() else {
            errors.push(ValidationError::new("document must be a mapping", ""));
            return Err(errors);
        };

        match root.get("repositories") {
            Some(Value::Object(repositories)) if !repositories.is_empty() => {
                Self::validate_repositories(repositories, &mut errors);
            }
            Some(Value::Object(_)) | Some(Value::Null) | None => {
                errors.push(
                    ValidationError::new("invalid file, missing \"repositories\" attribute", "repositories")
                        .with_suggestion("declare at least one repository with one job"),
                );
            }
            Some(_) => errors.push(ValidationError::new(
                "\"repositories\" must be a mapping",
                "repositories",
            )),
        }

        match root.get("template") {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(_) => errors.push(ValidationError::new("\"template\" must be a mapping", "template")),
        }

        match root.get("variable") {
            None | Some(Value::Null) => {}
            Some(Value::Object(variables)) => {
                for (name, definition) in variables {
                    if name.starts_with(CONFIG_PREFIX) {
                        continue;
                    }
                    if let Err(message) = VariableDefinition::from_value(definition) {
                        errors.push(ValidationError::new(message, format!("variable.{}", name)));
                    }
                }
            }
            Some(_) => errors.push(ValidationError::new("\"variable\" must be a mapping", "variable")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_repositories(repositories: &Mapping, errors: &mut Vec<ValidationError>) {
        Self::validate_handlers(repositories, "repositories", errors);

        for (repository_name, repository) in repositories {
            if repository_name.starts_with(CONFIG_PREFIX) {
                continue;
            }
            let path = format!("repositories.{}", repository_name);
            let Some(repository) = repository.as_object() else {
                errors.push(ValidationError::new("repository must be a mapping of jobs", path));
                continue;
            };

            Self::validate_handlers(repository, &path, errors);
            for (job_name, job) in repository {
                if job_name.starts_with(CONFIG_PREFIX) {
                    continue;
                }
                let path = format!("{}.{}", path, job_name);
                match job.as_object() {
                    Some(job) => Self::validate_job(job, &path, errors),
                    None => errors.push(ValidationError::new("job must be a mapping of steps", path)),
                }
            }
        }
    }

    fn validate_job(job: &Mapping, path: &str, errors: &mut Vec<ValidationError>) {
        Self::validate_handlers(job, path, errors);

        for (step_key, arguments) in job {
            if step_key.starts_with(CONFIG_PREFIX) {
                continue;
            }
            let step_path = format!("{}.{}", path, step_key);

            if !StepKey::is_valid(step_key) {
                errors.push(
                    ValidationError::new(format!("invalid step name \"{}\"", step_key), &step_path)
                        .with_suggestion(format!("step names must match {}", STEP_NAME_PATTERN)),
                );
            }

            match arguments {
                Value::Object(arguments) => Self::validate_handlers(arguments, &step_path, errors),
                Value::Null => {}
                _ => errors.push(ValidationError::new(
                    "step arguments must be a mapping",
                    step_path,
                )),
            }
        }
    }

    fn validate_handlers(scope: &Mapping, path: &str, errors: &mut Vec<ValidationError>) {
        for (key, binding) in scope {
            if !key.starts_with(EVENT_HANDLER_PREFIX) {
                continue;
            }
            if let Err(message) = EventHandlerSpec::from_value(binding) {
                errors.push(ValidationError::new(
                    format!("{} '{}'", message, key),
                    format!("{}.{}", path, key),
                ));
            }
        }
    }
}
