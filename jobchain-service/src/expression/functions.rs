// Built-in variable functions
// Registered by `Registry::with_builtins` and callable as `$name(args);`

use crate::capabilities::CapabilityError;
use crate::parser::models::Value;

/// Signature shared by every built-in function
pub type BuiltinFunction = fn(Vec<Value>) -> Result<Value, CapabilityError>;

/// Built-in functions by name
pub const BUILTIN_FUNCTIONS: &[(&str, BuiltinFunction)] = &[
    ("dict_values", dict_values),
    ("lower", lower),
    ("upper", upper),
    ("trim", trim),
    ("split", split),
    ("join", join),
    ("replace", replace),
    ("length", length),
    ("coalesce", coalesce),
];

/// `dict_values(mapping, keys, sep?)`: values of `mapping` for `keys`, in key order.
/// `keys` is a list or a string split on `sep` (whitespace when absent).
/// Keys missing from the mapping are left out.
pub fn dict_values(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args_between(&args, 2, 3, "dict_values")?;

    let Value::Object(map) = &args[0] else {
        return Err(CapabilityError::new(
            "dict_values() requires a mapping as first argument",
        ));
    };

    let keys: Vec<String> = match &args[1] {
        Value::String(keys) => split_text(keys, args.get(2)),
        Value::Array(keys) => keys.iter().map(Value::as_string).collect(),
        _ => {
            return Err(CapabilityError::new(
                "dict_values() requires a list or a string of keys",
            ))
        }
    };

    Ok(Value::Array(
        keys.iter().filter_map(|key| map.get(key)).cloned().collect(),
    ))
}

pub fn lower(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args(&args, 1, "lower")?;
    Ok(Value::String(args[0].as_string().to_lowercase()))
}

pub fn upper(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args(&args, 1, "upper")?;
    Ok(Value::String(args[0].as_string().to_uppercase()))
}

pub fn trim(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args(&args, 1, "trim")?;
    Ok(Value::String(args[0].as_string().trim().to_string()))
}

/// `split(text, sep?)`, whitespace-separated when `sep` is absent
pub fn split(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args_between(&args, 1, 2, "split")?;
    let parts = split_text(&args[0].as_string(), args.get(1));
    Ok(Value::Array(parts.into_iter().map(Value::String).collect()))
}

/// `join(list, sep?)`, comma-separated when `sep` is absent
pub fn join(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args_between(&args, 1, 2, "join")?;

    let separator = args
        .get(1)
        .map(Value::as_string)
        .unwrap_or_else(|| ",".to_string());

    match &args[0] {
        Value::Array(arr) => {
            let strings: Vec<String> = arr.iter().map(|v| v.as_string()).collect();
            Ok(Value::String(strings.join(&separator)))
        }
        _ => Err(CapabilityError::new(
            "join() requires array as first argument",
        )),
    }
}

pub fn replace(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args(&args, 3, "replace")?;
    let s = args[0].as_string();
    let from = args[1].as_string();
    let to = args[2].as_string();
    Ok(Value::String(s.replace(&from, &to)))
}

pub fn length(args: Vec<Value>) -> Result<Value, CapabilityError> {
    require_args(&args, 1, "length")?;
    match &args[0] {
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::Array(arr) => Ok(Value::Number(arr.len() as f64)),
        Value::Object(obj) => Ok(Value::Number(obj.len() as f64)),
        _ => Err(CapabilityError::new(
            "length() requires string, array, or object",
        )),
    }
}

/// First argument that is neither null nor an empty string
pub fn coalesce(args: Vec<Value>) -> Result<Value, CapabilityError> {
    for arg in args {
        match &arg {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            _ => return Ok(arg),
        }
    }
    Ok(Value::Null)
}

fn split_text(text: &str, separator: Option<&Value>) -> Vec<String> {
    match separator {
        Some(sep) if !sep.is_null() => text.split(&sep.as_string()).map(String::from).collect(),
        _ => text.split_whitespace().map(String::from).collect(),
    }
}

fn require_args(args: &[Value], count: usize, name: &str) -> Result<(), CapabilityError> {
    if args.len() != count {
        return Err(CapabilityError::new(format!(
            "{}() requires {} argument(s), got {}",
            name,
            count,
            args.len()
        )));
    }
    Ok(())
}

fn require_args_between(
    args: &[Value],
    min: usize,
    max: usize,
    name: &str,
) -> Result<(), CapabilityError> {
    if args.len() < min || args.len() > max {
        return Err(CapabilityError::new(format!(
            "{}() requires {} to {} arguments, got {}",
            name,
            min,
            max,
            args.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::models::Mapping;

    fn strings(items: &[&str]) -> Value {
        Value::from(items.to_vec())
    }

    #[test]
    fn test_dict_values() {
        let mut map = Mapping::new();
        map.insert("web".to_string(), Value::from("web-1.0"));
        map.insert("api".to_string(), Value::from("api-2.0"));
        let map = Value::Object(map);

        assert_eq!(
            dict_values(vec![map.clone(), strings(&["api", "web", "missing"])]).unwrap(),
            strings(&["api-2.0", "web-1.0"])
        );
        assert_eq!(
            dict_values(vec![map.clone(), Value::from("web api")]).unwrap(),
            strings(&["web-1.0", "api-2.0"])
        );
        assert_eq!(
            dict_values(vec![map.clone(), Value::from("web,api"), Value::from(",")]).unwrap(),
            strings(&["web-1.0", "api-2.0"])
        );
        assert!(dict_values(vec![Value::from("x"), Value::from("a")]).is_err());
        assert!(dict_values(vec![map]).is_err());
    }

    #[test]
    fn test_lower_upper_trim() {
        assert_eq!(lower(vec![Value::from("ABC")]).unwrap(), Value::from("abc"));
        assert_eq!(upper(vec![Value::from("abc")]).unwrap(), Value::from("ABC"));
        assert_eq!(trim(vec![Value::from("  x ")]).unwrap(), Value::from("x"));
        assert!(lower(vec![]).is_err());
    }

    #[test]
    fn test_split_join() {
        assert_eq!(
            split(vec![Value::from("a,b"), Value::from(",")]).unwrap(),
            strings(&["a", "b"])
        );
        assert_eq!(
            split(vec![Value::from(" a  b ")]).unwrap(),
            strings(&["a", "b"])
        );
        assert_eq!(
            join(vec![strings(&["a", "b"]), Value::from("-")]).unwrap(),
            Value::from("a-b")
        );
        assert_eq!(join(vec![strings(&["a", "b"])]).unwrap(), Value::from("a,b"));
        assert!(join(vec![Value::from("a")]).is_err());
    }

    #[test]
    fn test_replace_length_coalesce() {
        assert_eq!(
            replace(vec![Value::from("1.0.0"), Value::from("."), Value::from("_")]).unwrap(),
            Value::from("1_0_0")
        );
        assert_eq!(length(vec![strings(&["a", "b"])]).unwrap(), Value::Number(2.0));
        assert_eq!(length(vec![Value::from("héllo")]).unwrap(), Value::Number(5.0));
        assert!(length(vec![Value::Number(1.0)]).is_err());
        assert_eq!(
            coalesce(vec![Value::Null, Value::from(""), Value::from("x")]).unwrap(),
            Value::from("x")
        );
        assert_eq!(coalesce(vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_builtin_table_names() {
        let names: Vec<_> = BUILTIN_FUNCTIONS.iter().map(|(name, _)| *name).collect();
        assert!(names.contains(&"dict_values"));
        assert!(!names.contains(&"eval"));
    }
}
