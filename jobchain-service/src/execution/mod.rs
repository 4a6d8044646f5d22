// Execution Engine Module
// Job context, variable definitions, step orchestration and event dispatch

pub mod context;
pub mod events;
pub mod executor;
pub mod variables;

pub use context::{walk, ExecutionContext};
pub use events::{EventDispatcher, ERROR_EVENT, SUCCESS_EVENT};
pub use executor::{ExecutionState, JobExecutor, CONDITION_KEY};
pub use variables::resolve_variables;
