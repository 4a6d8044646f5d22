// Service Errors
// Error taxonomy shared by loading, resolution and execution

use crate::expression::EvalError;
use crate::parser::error::{DocumentError, ValidationError};
use crate::parser::models::{Mapping, Value};

use std::fmt;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Document(#[from] DocumentError),

    #[error("invalid job description:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("{0}")]
    Expression(#[from] EvalError),

    #[error("event handler '{handler}' failed: {message}")]
    EventHandler { handler: String, message: String },

    #[error("the job has already been executed by this executor")]
    AlreadyExecuted,
}

impl ServiceError {
    /// Short kind name for reporting
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Document(_) => "document",
            ServiceError::Validation(_) => "validation",
            ServiceError::NotFound(_) => "not found",
            ServiceError::NotImplemented(_) => "not implemented",
            ServiceError::Parse(_) => "variable parse",
            ServiceError::Step(_) => "step",
            ServiceError::Expression(_) => "expression",
            ServiceError::EventHandler { .. } => "event handler",
            ServiceError::AlreadyExecuted => "already executed",
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(vec![err])
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A step failed. Raised at most once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepError {
    pub step: String,
    pub alias: Option<String>,
    pub message: String,
}

impl StepError {
    pub fn new(step: impl Into<String>, alias: Option<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            alias,
            message: message.into(),
        }
    }

    /// `name` or `name.alias`
    pub fn step_name(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}.{}", self.step, alias),
            None => self.step.clone(),
        }
    }

    /// Mapping form exposed to `_on_error` handlers as `error`
    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert("step".to_string(), Value::from(self.step.as_str()));
        map.insert("alias".to_string(), Value::from(self.alias.clone()));
        map.insert("step_name".to_string(), Value::from(self.step_name()));
        map.insert("message".to_string(), Value::from(self.message.as_str()));
        Value::Object(map)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the step '{}' failed, error: {}",
            self.step_name(),
            self.message
        )
    }
}

impl std::error::Error for StepError {}

/// A variable definition could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub name: String,
    pub parser: Option<String>,
    pub value: Value,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "can't parse variable \"{}\" with the parser \"{}\", the given value is \"{}\" and the error message is \"{}\"",
            self.name,
            self.parser.as_deref().unwrap_or_default(),
            self.value,
            self.message
        )
    }
}

impl std::error::Error for ParseError {}
