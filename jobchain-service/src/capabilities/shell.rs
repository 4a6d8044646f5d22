// Shell step
// Runs a command through the platform shell, optionally once per parameter entry

use crate::capabilities::{CapabilityError, Step, StepCall};
use crate::parser::models::{Mapping, Value};

use regex::{Captures, Regex};
use tracing::{debug, info};

use std::process::{Command, Stdio};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w*)\}").expect("placeholder pattern is valid"));

/// Shells the step can run commands with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// Default shell (sh on Unix, cmd on Windows)
    Default,
    /// Bash shell
    Bash,
}

impl Shell {
    /// Get the shell executable and arguments
    fn get_command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Shell::Default => {
                if cfg!(target_os = "windows") {
                    ("cmd", &["/C"])
                } else {
                    ("sh", &["-c"])
                }
            }
            Shell::Bash => ("bash", &["-c"]),
        }
    }
}

/// Output of one command
#[derive(Debug, Clone, Default)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None when killed by a signal)
    pub exit_code: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// `shell` step: `cmd`, optional `cwd`, `env` and `parameters`
pub struct ShellStep {
    shell: Shell,
}

impl ShellStep {
    pub fn new() -> Self {
        Self {
            shell: Shell::Default,
        }
    }

    pub fn with_shell(shell: Shell) -> Self {
        Self { shell }
    }

    /// Run one command and capture its output
    pub fn run_command(
        &self,
        script: &str,
        cwd: Option<&str>,
        env: &Mapping,
    ) -> Result<ShellOutput, CapabilityError> {
        let (shell_cmd, shell_args) = self.shell.get_command();

        let mut cmd = Command::new(shell_cmd);
        cmd.args(shell_args);
        cmd.arg(script);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in env {
            cmd.env(key, value.as_string());
        }
        cmd.stdin(Stdio::null());

        debug!(command = script, "spawning shell command");
        let output = cmd.output().map_err(|e| {
            CapabilityError::new(format!(
                "failed to spawn shell process '{}': {}",
                shell_cmd, e
            ))
        })?;

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            exit_code: output.status.code(),
        })
    }
}

impl Default for ShellStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for ShellStep {
    fn parameters(&self) -> &[&'static str] {
        &["cmd", "cwd", "env", "parameters"]
    }

    fn run(&self, call: StepCall<'_>) -> Result<Option<Mapping>, CapabilityError> {
        let cmd = call.require_str("cmd")?;
        let cwd = call.get("cwd").map(Value::as_string);
        let env = match call.get("env") {
            Some(Value::Object(env)) => env.clone(),
            Some(_) => return Err(CapabilityError::new("'env' must be a mapping")),
            None => Mapping::new(),
        };

        let commands = match call.get("parameters") {
            Some(Value::Array(parameters)) => parameters
                .iter()
                .map(|parameter| format_command(&cmd, parameter))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(CapabilityError::new("'parameters' must be a list")),
            None => vec![cmd],
        };

        let mut last = ShellOutput::default();
        for command in &commands {
            info!(command = %command, "running");
            last = self.run_command(command, cwd.as_deref(), &env)?;

            if !last.success() {
                let code = last
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string());
                let detail = if last.stderr.is_empty() {
                    &last.stdout
                } else {
                    &last.stderr
                };
                return Err(CapabilityError::new(format!(
                    "command '{}' exited with code {}: {}",
                    command, code, detail
                )));
            }
        }

        let mut result = Mapping::new();
        result.insert("stdout".to_string(), Value::String(last.stdout));
        result.insert(
            "exit_code".to_string(),
            last.exit_code.map(|c| Value::from(c as i64)).unwrap_or_default(),
        );
        Ok(Some(result))
    }
}

/// Fill `{}`, `{0}` and `{key}` placeholders in `cmd` from one parameter entry.
///
/// Lists fill positional placeholders, mappings fill named ones, any other value
/// fills `{}` and `{0}`.
pub fn format_command(cmd: &str, parameter: &Value) -> Result<String, CapabilityError> {
    let positional: Vec<Value> = match parameter {
        Value::Array(items) => items.clone(),
        Value::Object(_) => Vec::new(),
        other => vec![other.clone()],
    };

    let mut next = 0;
    let mut formatted = String::with_capacity(cmd.len());
    let mut last_end = 0;

    for caps in PLACEHOLDER_RE.captures_iter(cmd) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        formatted.push_str(&cmd[last_end..whole.start]);
        formatted.push_str(&placeholder_value(&caps, parameter, &positional, &mut next)?);
        last_end = whole.end;
    }
    formatted.push_str(&cmd[last_end..]);

    Ok(formatted)
}

fn placeholder_value(
    caps: &Captures<'_>,
    parameter: &Value,
    positional: &[Value],
    next: &mut usize,
) -> Result<String, CapabilityError> {
    let key = &caps[1];

    let value = if key.is_empty() {
        *next += 1;
        positional.get(*next - 1)
    } else if let Ok(index) = key.parse::<usize>() {
        positional.get(index)
    } else {
        parameter.as_object().and_then(|map| map.get(key))
    };

    value.map(Value::as_string).ok_or_else(|| {
        CapabilityError::new(format!(
            "no value for placeholder '{}' in parameter {}",
            &caps[0], parameter
        ))
    })
}
