// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Argument expansion, result filenames and key flattening.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Keyword arguments of one task, in insertion order.
pub type ArgMap = Map<String, Value>;

/// Expand static and variable arguments into one argument map per combination.
///
/// Combinations follow the key order of `variable_args`, with the last key
/// varying fastest. Every map starts from `static_args`; variable values
/// overwrite static ones of the same name. Empty `variable_args` yields a
/// single map.
pub fn construct_args(static_args: &ArgMap, variable_args: &ArgMap) -> Result<Vec<ArgMap>> {
    let mut combinations = vec![static_args.clone()];
    for (key, options) in variable_args {
        let options = options.as_array().ok_or_else(|| {
            Error::Config(format!(
                "variable argument '{}' must be a list of options, got {}",
                key, options
            ))
        })?;
        combinations = combinations
            .into_iter()
            .flat_map(|base| {
                options.iter().map(move |option| {
                    let mut arg = base.clone();
                    arg.insert(key.clone(), option.clone());
                    arg
                })
            })
            .collect();
    }
    Ok(combinations)
}

/// Render one argument value for use in a filename.
///
/// Integers have no decimal point and strings are written raw. Floats use
/// the shortest representation that keeps at least one decimal, switching to
/// exponent form below `1e-4` and from `1e16` on, with a signed exponent of
/// at least two digits (`1e-05`, `2.5e+16`).
pub fn format_arg_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                format_float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let magnitude = value.abs();
    if value == 0.0 || !value.is_finite() || (1e-4..1e16).contains(&magnitude) {
        return format!("{:?}", value);
    }
    let scientific = format!("{:e}", value);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => scientific,
    }
}

/// `{loss}_{k1}_{v1}_..._{kN}_{vN}.{extension}` over the variable argument names.
pub fn construct_filename(
    loss: &str,
    variable_arg_names: &[String],
    loss_arg: &ArgMap,
    extension: &str,
) -> String {
    let mut name = loss.to_string();
    for key in variable_arg_names {
        let value = loss_arg.get(key).unwrap_or(&Value::Null);
        name.push('_');
        name.push_str(key);
        name.push('_');
        name.push_str(&format_arg_value(value));
    }
    format!("{}.{}", name, extension)
}

/// Flatten nested objects into `parent{sep}child` keys.
pub fn flatten(map: &ArgMap, sep: &str) -> ArgMap {
    let mut flat = ArgMap::new();
    flatten_into(&mut flat, "", map, sep);
    flat
}

fn flatten_into(flat: &mut ArgMap, parent: &str, map: &ArgMap, sep: &str) {
    for (key, value) in map {
        let full = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, sep, key)
        };
        match value {
            Value::Object(inner) => flatten_into(flat, &full, inner, sep),
            other => {
                flat.insert(full, other.clone());
            }
        }
    }
}

/// Prepend `{prefix}.` to every key.
pub fn add_prefix(map: ArgMap, prefix: &str) -> ArgMap {
    map.into_iter()
        .map(|(key, value)| (format!("{}.{}", prefix, key), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ArgMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_construct_args_product() {
        let static_args = map(json!({"a": 1.0}));
        let variable_args = map(json!({"scale": [0.1, 0.2], "n": [1, 2, 3]}));
        let args = construct_args(&static_args, &variable_args).unwrap();

        assert_eq!(args.len(), 6);
        assert_eq!(args[0], map(json!({"a": 1.0, "scale": 0.1, "n": 1})));
        assert_eq!(args[1], map(json!({"a": 1.0, "scale": 0.1, "n": 2})));
        assert_eq!(args[5], map(json!({"a": 1.0, "scale": 0.2, "n": 3})));
        for arg in &args {
            assert_eq!(arg.get("a"), Some(&json!(1.0)));
        }
    }

    #[test]
    fn test_construct_args_empty_variable() {
        let static_args = map(json!({"a": 1.0, "n": 4}));
        let args = construct_args(&static_args, &ArgMap::new()).unwrap();
        assert_eq!(args, vec![static_args]);

        let args = construct_args(&ArgMap::new(), &ArgMap::new()).unwrap();
        assert_eq!(args, vec![ArgMap::new()]);
    }

    #[test]
    fn test_construct_args_empty_option_list() {
        let variable_args = map(json!({"n": []}));
        let args = construct_args(&ArgMap::new(), &variable_args).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_construct_args_non_list_is_config_error() {
        let variable_args = map(json!({"n": 3}));
        let err = construct_args(&ArgMap::new(), &variable_args).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_construct_filename() {
        let loss_arg = map(json!({"param1": 1, "param2": 2, "static": "x"}));
        let names = vec!["param1".to_string(), "param2".to_string()];
        assert_eq!(
            construct_filename("default-loss", &names, &loss_arg, "json"),
            "default-loss_param1_1_param2_2.json"
        );
        assert_eq!(
            construct_filename("default-loss", &[], &loss_arg, "json"),
            "default-loss.json"
        );
    }

    #[test]
    fn test_format_arg_value() {
        assert_eq!(format_arg_value(&json!(3)), "3");
        assert_eq!(format_arg_value(&json!(1.0)), "1.0");
        assert_eq!(format_arg_value(&json!(0.25)), "0.25");
        assert_eq!(format_arg_value(&json!("variance")), "variance");
        assert_eq!(format_arg_value(&json!(true)), "true");
    }

    #[test]
    fn test_format_arg_value_exponent_form() {
        assert_eq!(format_arg_value(&json!(1e-5)), "1e-05");
        assert_eq!(format_arg_value(&json!(-2.5e-7)), "-2.5e-07");
        assert_eq!(format_arg_value(&json!(1e16)), "1e+16");
        assert_eq!(format_arg_value(&json!(1.5e123)), "1.5e+123");
        assert_eq!(format_arg_value(&json!(1e-4)), "0.0001");
        assert_eq!(format_arg_value(&json!(1e15)), "1000000000000000.0");
        assert_eq!(format_arg_value(&json!(0.0)), "0.0");

        let mut arg = ArgMap::new();
        arg.insert("tol".into(), json!(1e-6));
        assert_eq!(
            construct_filename("PowerLoss", &["tol".to_string()], &arg, "json"),
            "PowerLoss_tol_1e-06.json"
        );
    }

    #[test]
    fn test_flatten_and_prefix() {
        let nested = map(json!({"name": "run", "content": {"loss": "PowerLoss", "inner": {"x": 1}}}));
        let flat = flatten(&nested, ".");
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "content.loss", "content.inner.x"]);

        let prefixed = add_prefix(flat, "config");
        assert_eq!(prefixed.get("config.content.loss"), Some(&json!("PowerLoss")));
        assert_eq!(prefixed.get("config.name"), Some(&json!("run")));
    }
}
