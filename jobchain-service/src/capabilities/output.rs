// Output step
// Publishes its `values` mapping into the step's context slot

use crate::capabilities::{CapabilityError, Step, StepCall};
use crate::parser::models::{Mapping, Value};

pub struct OutputStep;

impl Step for OutputStep {
    fn parameters(&self) -> &[&'static str] {
        &["values"]
    }

    fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError> {
        match call.get("values") {
            Some(Value::Object(values)) => Ok(Some(values.clone())),
            Some(_) => Err(CapabilityError::new("'values' must be a mapping")),
            None => Ok(None),
        }
    }
}
