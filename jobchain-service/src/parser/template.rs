// Template Merging
// Applies per-step-key template defaults to a job's own step arguments

use crate::parser::models::{Job, Mapping, Value, CONFIG_PREFIX};

use indexmap::IndexMap;

/// Deep-merge `overlay` over `base`.
///
/// Nested mappings merge key by key; any other overlay value replaces the base
/// value. Keys already in `base` keep their position, new keys are appended.
pub fn deep_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let next = match value {
            Value::Object(nested) => {
                let existing = match merged.get(key) {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => Mapping::new(),
                };
                Value::Object(deep_merge(&existing, nested))
            }
            other => other.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

/// Merge template defaults into every step of a raw job.
///
/// Only step keys present in both the job and the template receive defaults.
/// The result follows the job's own key order; `_`-prefixed job keys are
/// configuration and are not steps.
pub fn merge_job(template: &Mapping, job: &Mapping) -> Job {
    let mut steps = IndexMap::new();

    for (step_key, arguments) in job {
        if step_key.starts_with(CONFIG_PREFIX) {
            continue;
        }

        let own = match arguments {
            Value::Object(own) => own.clone(),
            _ => Mapping::new(),
        };

        let merged = match template.get(step_key) {
            Some(Value::Object(defaults)) => deep_merge(defaults, &own),
            _ => own,
        };

        steps.insert(step_key.clone(), merged);
    }

    Job { steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        match Value::from_yaml(&parsed) {
            Value::Object(map) => map,
            other => panic!("expected mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_merge_job_wins_on_leaves() {
        let base = mapping("url: git@host:a.git\nauth:\n  user: ci\n  password: old\n");
        let overlay = mapping("auth:\n  password: new\nbranch: main\n");

        let merged = deep_merge(&base, &overlay);

        assert_eq!(
            merged,
            mapping("url: git@host:a.git\nauth:\n  user: ci\n  password: new\nbranch: main\n")
        );
    }

    #[test]
    fn test_deep_merge_replaces_non_mapping_base() {
        let base = mapping("opts: plain\n");
        let overlay = mapping("opts:\n  a: 1\n");
        assert_eq!(deep_merge(&base, &overlay), mapping("opts:\n  a: 1\n"));

        let base = mapping("opts:\n  a: 1\n");
        let overlay = mapping("opts: [1, 2]\n");
        assert_eq!(deep_merge(&base, &overlay), mapping("opts: [1, 2]\n"));
    }

    #[test]
    fn test_merge_job_uses_template_only_for_matching_keys() {
        let template = mapping(
            "checkout:\n  branch: develop\n  reset: true\nnpm_build:\n  modular: true\n",
        );
        let job = mapping("checkout:\n  branch: main\ndeploy:\n  host: example.org\n");

        let merged = merge_job(&template, &job);

        assert_eq!(merged.get("checkout"), Some(&mapping("branch: main\nreset: true\n")));
        assert_eq!(merged.get("deploy"), Some(&mapping("host: example.org\n")));
        assert!(merged.get("npm_build").is_none());
    }

    #[test]
    fn test_merge_job_keeps_job_order() {
        let template = mapping("c: {x: 1}\nb: {x: 2}\na: {x: 3}\n");
        let job = mapping("a: {}\nb: {}\nc: {}\n");

        let merged = merge_job(&template, &job);

        assert_eq!(merged.step_keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_job_aliased_key_needs_exact_template_key() {
        let template = mapping("npm_build:\n  modular: true\nnpm_build.web:\n  web_pattern: '*-web'\n");
        let job = mapping("npm_build.web:\n  modules: [a]\nnpm_build.api: ~\n");

        let merged = merge_job(&template, &job);

        assert_eq!(
            merged.get("npm_build.web"),
            Some(&mapping("web_pattern: '*-web'\nmodules: [a]\n"))
        );
        assert_eq!(merged.get("npm_build.api"), Some(&Mapping::new()));
    }

    #[test]
    fn test_merge_job_null_arguments_take_template() {
        let template = mapping("checkout:\n  branch: develop\n");
        let job = mapping("checkout:\n_on_error:\n  name: log\n  args: {}\n");

        let merged = merge_job(&template, &job);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("checkout"), Some(&mapping("branch: develop\n")));
    }
}
