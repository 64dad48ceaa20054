/*!
Declarative command schema.

Three record types describe everything a module exposes to the admin CLI:

  ModuleRegistration  one module's command surface (identity: `module_name`)
  Command             one invocable action (`handler` = "<namespace>:<function>")
  CommandArg          one argument; positional unless `name` starts with '-'

The serde representation is the persisted registry document format. Optional
fields are `Option`s so "not provided" and "provided but falsy" stay distinct
(`default: 0` is not the same as no default).

Validation lives in `validate.rs`.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

mod validate;

/// Argument names that would shadow routing or help destinations.
pub const RESERVED_DESTS: &[&str] = &["module", "command", "help"];

/* ---- Enumerations ---- */

/// Value type of a non-action argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgType {
    #[default]
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
}

impl ArgType {
    /// Convert a raw command-line token into a typed JSON value.
    pub fn coerce(self, raw: &str) -> Result<Value, String> {
        match self {
            ArgType::Str => Ok(Value::String(raw.to_string())),
            ArgType::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("invalid integer value '{raw}'")),
            ArgType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("invalid float value '{raw}'")),
            ArgType::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| format!("invalid boolean value '{raw}' (expected true/false)")),
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgType::Str => "str",
            ArgType::Int => "int",
            ArgType::Float => "float",
            ArgType::Bool => "bool",
        };
        f.write_str(s)
    }
}

/// How many values an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nargs {
    /// `?` : zero or one
    #[serde(rename = "?")]
    Optional,
    /// `*` : zero or more
    #[serde(rename = "*")]
    ZeroOrMore,
    /// `+` : one or more
    #[serde(rename = "+")]
    OneOrMore,
}

impl Nargs {
    pub fn is_variadic(self) -> bool {
        matches!(self, Nargs::ZeroOrMore | Nargs::OneOrMore)
    }
}

/// Value-less flag behavior. Supersedes `type`, `nargs` and `choices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgAction {
    StoreTrue,
    StoreFalse,
    /// Occurrences are added to `default` (0 when absent).
    Count,
}

/* ---- Records ---- */

/// One argument declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandArg {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(rename = "type", default)]
    pub arg_type: ArgType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub nargs: Option<Nargs>,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub action: Option<ArgAction>,
}

impl CommandArg {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            short: None,
            arg_type: ArgType::Str,
            required: false,
            default: None,
            nargs: None,
            choices: None,
            action: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn arg_type(mut self, arg_type: ArgType) -> Self {
        self.arg_type = arg_type;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// A JSON `null` default is the same as no default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default = (!value.is_null()).then_some(value);
        self
    }

    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = Some(nargs);
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn action(mut self, action: ArgAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Positional unless the name carries a leading '-'.
    pub fn is_positional(&self) -> bool {
        !self.name.starts_with('-')
    }

    /// Destination key of the parsed value: `--dry-run` -> `dry_run`.
    pub fn dest(&self) -> String {
        self.name.trim_start_matches('-').replace('-', "_")
    }

    /// Long flag without its `--` prefix.
    pub fn long(&self) -> Option<&str> {
        self.name.strip_prefix("--").filter(|s| !s.is_empty())
    }

    /// Short flag letter, taken from `short` or from a `-x` style name.
    pub fn short_char(&self) -> Option<char> {
        if let Some(short) = &self.short {
            return single_dash_letter(short);
        }
        if self.name.starts_with("--") {
            return None;
        }
        single_dash_letter(&self.name)
    }

    /// Letter of a `-x` style name that also declares a different `short`.
    /// Both letters are accepted on the command line.
    pub fn short_alias(&self) -> Option<char> {
        self.short.as_ref()?;
        if self.name.starts_with("--") {
            return None;
        }
        single_dash_letter(&self.name).filter(|c| Some(*c) != self.short_char())
    }

    pub fn is_variadic(&self) -> bool {
        self.action.is_none() && self.nargs.is_some_and(Nargs::is_variadic)
    }
}

/// One invocable action within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub help: String,
    pub handler: String,
    #[serde(default)]
    pub args: Vec<CommandArg>,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            handler: handler.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: CommandArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn find_arg(&self, dest: &str) -> Option<&CommandArg> {
        self.args.iter().find(|a| a.dest() == dest)
    }
}

/// One module's full command surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRegistration {
    pub module_name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl ModuleRegistration {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            short_name: None,
            description: String::new(),
            commands: Vec::new(),
        }
    }

    pub fn short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/* ---- Value helpers ---- */

/// Accepts true/false, 1/0, yes/no, y/n, on/off (case-insensitive).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Command-line form of a JSON value: strings unquoted, everything else as JSON text.
pub fn raw_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn single_dash_letter(s: &str) -> Option<char> {
    let rest = s.strip_prefix('-')?;
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '-' => Some(c),
        _ => None,
    }
}
