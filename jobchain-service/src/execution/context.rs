// Runtime Execution Context
// Scratch bucket, step slots and resolved variables for one job run

use crate::parser::models::{Mapping, Value};

/// Context threaded through one job run.
///
/// Slot `$0` holds run metadata, slot `$i` the result of the i-th step.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    /// `$` bucket
    scratch: Mapping,
    /// `$0`, `$1`, ...
    slots: Vec<Value>,
    variables: Mapping,
}

impl ExecutionContext {
    pub fn new(repository: &str, job: &str) -> Self {
        let mut context = Mapping::new();
        context.insert("repository".to_string(), Value::from(repository));
        context.insert("job".to_string(), Value::from(job));

        let mut metadata = Mapping::new();
        metadata.insert("context".to_string(), Value::Object(context));

        Self {
            scratch: Mapping::new(),
            slots: vec![Value::Object(metadata)],
            variables: Mapping::new(),
        }
    }

    pub fn scratch(&self) -> &Mapping {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut Mapping {
        &mut self.scratch
    }

    /// Run metadata (`$0`)
    pub fn metadata(&self) -> &Value {
        &self.slots[0]
    }

    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Number of slots including `$0`
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Store a step result in slot `index` (1-based), filling skipped positions with
    /// empty mappings
    pub fn set_slot(&mut self, index: usize, result: Mapping) {
        debug_assert!(index > 0, "slot 0 holds run metadata");
        while self.slots.len() <= index {
            self.slots.push(Value::Object(Mapping::new()));
        }
        self.slots[index] = Value::Object(result);
    }

    pub fn variables(&self) -> &Mapping {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_variables(&mut self, variables: Mapping) {
        self.variables = variables;
    }

    /// Resolve context path segments (`$`, `$N`, then keys). `scratch` replaces
    /// the `$` bucket when given. Never fails: anything missing is `Null`.
    pub fn lookup(&self, segments: &[String], scratch: Option<&Mapping>) -> Value {
        let Some((root, rest)) = segments.split_first() else {
            return Value::Null;
        };

        if root == "$" {
            let scratch = scratch.unwrap_or(&self.scratch);
            return match rest.split_first() {
                None => Value::Object(scratch.clone()),
                Some((key, rest)) => scratch
                    .get(key)
                    .map(|value| walk(value, rest))
                    .unwrap_or_default(),
            };
        }

        // `$00` and `$01` are not slot keys
        root.strip_prefix('$')
            .filter(|index| *index == "0" || !index.starts_with('0'))
            .and_then(|index| index.parse::<usize>().ok())
            .and_then(|index| self.slots.get(index))
            .map(|slot| walk(slot, rest))
            .unwrap_or_default()
    }

    /// The whole context as one mapping: `$`, `$0..$N`, `variables`
    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert("$".to_string(), Value::Object(self.scratch.clone()));
        for (index, slot) in self.slots.iter().enumerate() {
            map.insert(format!("${}", index), slot.clone());
        }
        map.insert(
            "variables".to_string(),
            Value::Object(self.variables.clone()),
        );
        Value::Object(map)
    }
}

/// Walk `segments` below `root`. Mappings are indexed by key, sequences by numeric
/// segment; anything missing yields `Null`.
pub fn walk(root: &Value, segments: &[String]) -> Value {
    let mut current = root;

    for segment in segments {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        };

        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }

    current.clone()
}
