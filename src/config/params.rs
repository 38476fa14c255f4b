use crate::{Error, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Values for `${NAME}` placeholders in a config file.
///
/// Explicit values win; anything not set here is looked up in the process
/// environment.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    /// Create empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get an explicitly set value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse from CLI args like "KEY=VALUE".
    pub fn from_args(args: &[String]) -> Result<Self> {
        args.iter().try_fold(Self::new(), |params, arg| {
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::Config(format!("invalid param '{}', expected KEY=VALUE", arg))
            })?;
            if key.is_empty() {
                return Err(Error::Config(format!("invalid param '{}', empty key", arg)));
            }
            Ok(params.set(key, value))
        })
    }

    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(str::to_string)
            .or_else(|| std::env::var(key).ok())
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

/// Replace every `${NAME}` in `template`. Unresolvable names are an error.
pub fn substitute(template: &str, params: &Params) -> Result<String> {
    let mut missing: Option<String> = None;
    let out = placeholder().replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        params.resolve(name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });
    match missing {
        Some(name) => Err(Error::Config(format!(
            "unresolved variable ${{{}}}: pass -P {}=... or set it in the environment",
            name, name
        ))),
        None => Ok(out.into_owned()),
    }
}

/// Recursively substitute placeholders in every string of a YAML tree.
pub fn substitute_value(value: &mut serde_yaml::Value, params: &Params) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => *s = substitute(s, params)?,
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, params)?;
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for v in seq.iter_mut() {
                substitute_value(v, params)?;
            }
        }
        _ => {}
    }
    Ok(())
}
