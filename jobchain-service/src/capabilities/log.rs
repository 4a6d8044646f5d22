// Log event handler
// Writes a resolved message through tracing and reports whether it consumed the event

use crate::capabilities::{CapabilityError, EventHandler};
use crate::parser::models::{Mapping, Value};

use tracing::{debug, error, info, warn};

/// `log` handler: `message`, optional `level` (info) and `consume` (true)
pub struct LogHandler;

impl EventHandler for LogHandler {
    fn run(&self, args: &Mapping) -> Result<bool, CapabilityError> {
        let message = args.get("message").map(Value::as_string).unwrap_or_default();
        let level = args
            .get("level")
            .map(Value::as_string)
            .unwrap_or_else(|| "info".to_string());

        match level.to_lowercase().as_str() {
            "debug" => debug!(target: "jobchain::event", "{}", message),
            "info" => info!(target: "jobchain::event", "{}", message),
            "warn" | "warning" => warn!(target: "jobchain::event", "{}", message),
            "error" => error!(target: "jobchain::event", "{}", message),
            other => {
                return Err(CapabilityError::new(format!(
                    "unknown log level '{}'",
                    other
                )))
            }
        }

        Ok(args.get("consume").map(Value::is_truthy).unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Mapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_log_consumes_by_default() {
        assert!(LogHandler
            .run(&args(&[("message", Value::from("done"))]))
            .unwrap());
    }

    #[test]
    fn test_log_consume_false_passes_event_on() {
        let consumed = LogHandler
            .run(&args(&[
                ("message", Value::from("failed")),
                ("level", Value::from("error")),
                ("consume", Value::Bool(false)),
            ]))
            .unwrap();
        assert!(!consumed);
    }

    #[test]
    fn test_log_unknown_level() {
        assert!(LogHandler
            .run(&args(&[("level", Value::from("loud"))]))
            .is_err());
    }
}
