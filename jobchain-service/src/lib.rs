// Job Chain Service Library
// Declarative job descriptions, expression resolution and sequential step execution

pub mod capabilities;
pub mod error;
pub mod execution;
pub mod expression;
pub mod parser;

// Re-export commonly used types
pub use error::{ParseError, ServiceError, ServiceResult, StepError};

// Re-export parser types
pub use parser::{
    parse_pair, DescriptionValidator, DocumentError, DocumentErrorKind, EventHandlerSpec, Job,
    JobDescription, Mapping, Overrides, StepKey, ValidationError, Value, VariableDefinition,
};

// Re-export expression types
pub use expression::{EvalError, Resolver};

// Re-export capability types
pub use capabilities::{
    BatchStep, CapabilityError, EventHandler, Function, LogHandler, OutputStep, Registry,
    ShellStep, Step, StepCall,
};

// Re-export execution types
pub use execution::{EventDispatcher, ExecutionContext, ExecutionState, JobExecutor};
