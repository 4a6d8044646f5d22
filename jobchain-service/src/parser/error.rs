// Job description error types
// Location-aware document errors and structural validation errors

use std::fmt;

/// Error reading or parsing a job description document
#[derive(Debug, Clone)]
pub struct DocumentError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Surrounding source lines
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    pub kind: DocumentErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentErrorKind {
    /// YAML syntax error
    YamlSyntax,
    /// File could not be read
    Io,
    /// URL could not be fetched
    Http,
}

impl DocumentError {
    pub fn new(message: impl Into<String>, kind: DocumentErrorKind) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
            context: String::new(),
            suggestion: None,
            kind,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create context from source content
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        if self.line == 0 {
            return self;
        }

        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column.saturating_sub(1)) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    /// Create from a serde_yaml error
    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));

        let mut error = DocumentError::new(err.to_string(), DocumentErrorKind::YamlSyntax)
            .at(line, column)
            .with_source_context(source, 2);
        error.suggestion = suggest_yaml_fix(source, line);
        error
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if self.line > 0 {
            write!(f, " (line {}:{})", self.line, self.column)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context.trim_end())?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            write!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for DocumentError {}

fn suggest_yaml_fix(source: &str, line: usize) -> Option<String> {
    let error_line = source.lines().nth(line.checked_sub(1)?)?;

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    // Unquoted expressions starting with `$` are fine, but `{` starts a flow mapping
    if error_line.contains(": {") && error_line.contains('$') {
        return Some("quote values that contain '{' so they are read as strings".to_string());
    }

    None
}

/// Structural problem in a job description, reported with the offending path
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
    pub path: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error at '{}': {}", self.path, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_error_display() {
        let err = DocumentError::new("did not find expected key", DocumentErrorKind::YamlSyntax)
            .at(3, 5)
            .with_suggestion("check the indentation");

        let output = err.to_string();
        assert!(output.contains("did not find expected key"));
        assert!(output.contains("line 3:5"));
        assert!(output.contains("help: check the indentation"));
    }

    #[test]
    fn test_document_error_with_source_context() {
        let source = "repositories:\n  repo1:\n    build:\n      checkout: {}\n";
        let err = DocumentError::new("bad", DocumentErrorKind::YamlSyntax)
            .at(3, 5)
            .with_source_context(source, 1);

        assert!(err.context.contains(">    3 |     build:"));
        assert!(err.context.contains("repo1"));
        assert!(err.context.contains("checkout"));
    }

    #[test]
    fn test_from_yaml_error_has_location() {
        let source = "repositories:\n  repo1: [unclosed\n";
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(source).unwrap_err();
        let err = DocumentError::from_yaml_error(&yaml_err, source);

        assert_eq!(err.kind, DocumentErrorKind::YamlSyntax);
        assert!(err.line > 0);
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("invalid step name", "repositories.repo1.build.bad name")
            .with_suggestion("use word characters");
        assert_eq!(
            err.to_string(),
            "validation error at 'repositories.repo1.build.bad name': invalid step name (use word characters)"
        );
    }
}
