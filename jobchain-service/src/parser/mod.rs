// Parser module for job descriptions
// Provides YAML loading, overrides, validation, and template merging

pub mod description;
pub mod error;
pub mod models;
pub mod overrides;
pub mod template;

pub use description::{DescriptionValidator, JobDescription};
pub use error::{DocumentError, DocumentErrorKind, ValidationError};
pub use models::*;
pub use overrides::{parse_pair, Overrides};
pub use template::{deep_merge, merge_job};
