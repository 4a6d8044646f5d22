// Expression patterns
// `${1.path}` context paths, `${name}` variables and `$func(args);` calls

use regex::Regex;

use std::sync::LazyLock;

const CONTEXT_PATH: &str = r"\$\{(\d*(?:\.(?:\w+|\[[\w.]+\]))*)\}";
const NAMED_VARIABLE: &str = r"\$\{([a-zA-Z][\w-]*)\}";
const FUNCTION_CALL: &str = r"\$([a-zA-Z_]\w*)\((.*)\);";
const FUNCTION_CALL_LAZY: &str = r"\$([a-zA-Z_]\w*)\((.*?)\);";

fn compile(pattern: String) -> Regex {
    Regex::new(&pattern).expect("expression pattern is valid")
}

fn whole(pattern: &str) -> Regex {
    compile(format!(r"(?s)^{}$", pattern))
}

/// Whole-string context path; group 1 is the path without `$`
pub static CONTEXT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| whole(CONTEXT_PATH));

/// Whole-string named variable; group 1 is the name
pub static NAMED_VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| whole(NAMED_VARIABLE));

/// Whole-string function call; group 1 is the name, group 2 the argument text
pub static FUNCTION_CALL_RE: LazyLock<Regex> = LazyLock::new(|| whole(FUNCTION_CALL));

pub static CONTEXT_PATH_SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(CONTEXT_PATH.to_string()));

pub static NAMED_VARIABLE_SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(NAMED_VARIABLE.to_string()));

pub static FUNCTION_CALL_SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(format!("(?s){}", FUNCTION_CALL_LAZY)));

/// Any reference inside function argument text
pub static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(format!(
        "(?s){}|{}|{}",
        CONTEXT_PATH, NAMED_VARIABLE, FUNCTION_CALL_LAZY
    ))
});

/// One segment of a context path: `$1`, `key` or `[literal.key]`
static PATH_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"[$\w]+|\[[\w.]+\]".to_string()));

/// Split a captured context path (`1.modules.[a.b]`) into segments: `$1`, `modules`, `a.b`
pub fn path_segments(path: &str) -> Vec<String> {
    let rooted = format!("${}", path);
    PATH_SEGMENT_RE
        .find_iter(&rooted)
        .map(|m| {
            m.as_str()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_path_whole_match() {
        let caps = CONTEXT_PATH_RE.captures("${1.modules.[a.b]}").unwrap();
        assert_eq!(&caps[1], "1.modules.[a.b]");

        let caps = CONTEXT_PATH_RE.captures("${.error.message}").unwrap();
        assert_eq!(&caps[1], ".error.message");

        assert!(CONTEXT_PATH_RE.is_match("${}"));
        assert!(!CONTEXT_PATH_RE.is_match("${1.modules} tail"));
        assert!(!CONTEXT_PATH_RE.is_match("${name}"));
    }

    #[test]
    fn test_named_variable_whole_match() {
        let caps = NAMED_VARIABLE_RE.captures("${release-version}").unwrap();
        assert_eq!(&caps[1], "release-version");

        assert!(NAMED_VARIABLE_RE.is_match("${v}"));
        assert!(!NAMED_VARIABLE_RE.is_match("${1abc}"));
        assert!(!NAMED_VARIABLE_RE.is_match("prefix ${v}"));
    }

    #[test]
    fn test_function_call_whole_match_is_greedy() {
        let caps = FUNCTION_CALL_RE.captures("$join($split('a,b', ',');, '-');").unwrap();
        assert_eq!(&caps[1], "join");
        assert_eq!(&caps[2], "$split('a,b', ',');, '-'");
    }

    #[test]
    fn test_function_call_search_is_lazy() {
        let found: Vec<_> = FUNCTION_CALL_SEARCH_RE
            .captures_iter("a $upper('x'); b $lower('Y'); c")
            .map(|caps| caps[1].to_string())
            .collect();
        assert_eq!(found, vec!["upper", "lower"]);
    }

    #[test]
    fn test_reference_search() {
        let found: Vec<_> = REFERENCE_RE
            .find_iter("${1.a}, ${name}, $eval(1);, 'plain'")
            .map(|m| m.as_str().to_string())
            .collect();
        assert_eq!(found, vec!["${1.a}", "${name}", "$eval(1);"]);
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("1.modules.[a.b]"), vec!["$1", "modules", "a.b"]);
        assert_eq!(path_segments(".error.message"), vec!["$", "error", "message"]);
        assert_eq!(path_segments("0.context.job"), vec!["$0", "context", "job"]);
        assert_eq!(path_segments(""), vec!["$"]);
    }
}
