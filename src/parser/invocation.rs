//! Parsed command line handed to the dispatcher and to handlers.

use std::collections::BTreeMap;

use clap::ArgMatches;
use serde_json::Value;

use crate::registry::{DocumentStore, Registry};
use crate::schema::{ArgAction, Command, CommandArg};

/// Routing tokens plus typed argument values keyed by destination.
///
/// `module` and `command` are canonical names (clap resolves short-name
/// aliases to the module's full name). Absent optional values are `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedInvocation {
    pub module: Option<String>,
    pub command: Option<String>,
    pub args: BTreeMap<String, Value>,
}

impl ParsedInvocation {
    /// Invocation that only names a module/command (no argument values).
    pub fn route(module: Option<&str>, command: Option<&str>) -> Self {
        Self {
            module: module.map(str::to_string),
            command: command.map(str::to_string),
            args: BTreeMap::new(),
        }
    }

    /// Builder helper for tests and embedders.
    pub fn with_arg(mut self, dest: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(dest.into(), value.into());
        self
    }

    /// Extract routing tokens and argument values from clap matches, using the
    /// registry schema to type each value.
    pub fn from_matches<S: DocumentStore>(registry: &Registry<S>, matches: &ArgMatches) -> Self {
        let mut inv = Self::default();
        let Some((module_token, module_matches)) = matches.subcommand() else {
            return inv;
        };
        inv.module = Some(module_token.to_string());

        let Some((command_name, command_matches)) = module_matches.subcommand() else {
            return inv;
        };
        inv.command = Some(command_name.to_string());

        if let Some(cmd) = registry
            .resolve_module(module_token)
            .and_then(|m| m.find_command(command_name))
        {
            inv.args = extract_args(cmd, command_matches);
        }
        inv
    }

    /* ---- Accessors ---- */

    /// Raw value; `None` when the destination is unknown or null.
    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.args.get(dest).filter(|v| !v.is_null())
    }

    pub fn str(&self, dest: &str) -> Option<&str> {
        self.get(dest).and_then(Value::as_str)
    }

    pub fn int(&self, dest: &str) -> Option<i64> {
        self.get(dest).and_then(Value::as_i64)
    }

    pub fn float(&self, dest: &str) -> Option<f64> {
        self.get(dest).and_then(Value::as_f64)
    }

    /// Boolean value; absent counts as `false`.
    pub fn flag(&self, dest: &str) -> bool {
        self.get(dest).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Occurrence count of a `count` flag; absent counts as 0.
    pub fn count(&self, dest: &str) -> u64 {
        self.get(dest).and_then(Value::as_u64).unwrap_or(0)
    }

    /// Values of a multi-valued argument; a single value becomes a one-item list.
    pub fn list(&self, dest: &str) -> Vec<&Value> {
        match self.get(dest) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(v) => vec![v],
            None => Vec::new(),
        }
    }
}

fn extract_args(cmd: &Command, matches: &ArgMatches) -> BTreeMap<String, Value> {
    cmd.args
        .iter()
        .map(|arg| (arg.dest(), extract_value(arg, matches)))
        .collect()
}

fn extract_value(arg: &CommandArg, matches: &ArgMatches) -> Value {
    let id = arg.dest();
    match arg.action {
        Some(ArgAction::StoreTrue | ArgAction::StoreFalse) => matches
            .try_get_one::<bool>(&id)
            .ok()
            .flatten()
            .map(|b| Value::Bool(*b))
            .unwrap_or(Value::Null),
        Some(ArgAction::Count) => {
            let seed = arg.default.as_ref().and_then(Value::as_u64).unwrap_or(0);
            let seen = matches.try_get_one::<u8>(&id).ok().flatten().copied().unwrap_or(0);
            Value::from(seed + u64::from(seen))
        }
        None => {
            let Some(raws) = matches.try_get_many::<String>(&id).ok().flatten() else {
                return Value::Null;
            };
            // Values already passed the argument's value parser; coercion cannot fail here.
            let mut values: Vec<Value> = raws
                .map(|raw| {
                    arg.arg_type
                        .coerce(raw)
                        .unwrap_or_else(|_| Value::String(raw.clone()))
                })
                .collect();
            if arg.is_variadic() {
                Value::Array(values)
            } else if values.is_empty() {
                Value::Null
            } else {
                values.swap_remove(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors() {
        let inv = ParsedInvocation::route(Some("demo"), Some("run"))
            .with_arg("name", "alpha")
            .with_arg("n", 3)
            .with_arg("ratio", 0.5)
            .with_arg("force", true)
            .with_arg("verbose", 2)
            .with_arg("files", json!(["a", "b"]))
            .with_arg("missing", Value::Null);

        assert_eq!(inv.str("name"), Some("alpha"));
        assert_eq!(inv.int("n"), Some(3));
        assert_eq!(inv.float("ratio"), Some(0.5));
        assert!(inv.flag("force"));
        assert!(!inv.flag("absent"));
        assert_eq!(inv.count("verbose"), 2);
        assert_eq!(inv.list("files").len(), 2);
        assert_eq!(inv.list("name"), vec![&json!("alpha")]);
        assert!(inv.get("missing").is_none());
        assert!(inv.list("missing").is_empty());
    }
}
