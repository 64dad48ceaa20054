//! Registration-time validation. Anything accepted here builds into a parser
//! without tripping clap's own consistency checks.

use std::collections::HashSet;

use serde_json::Value;

use super::{ArgAction, Command, CommandArg, ModuleRegistration, RESERVED_DESTS, raw_value};
use crate::error::SchemaError;

impl ModuleRegistration {
    /// Reject registrations the parser builder could not express faithfully.
    ///
    /// Handler paths are deliberately not checked: a malformed handler is
    /// reported at dispatch time as a resolution error.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.module_name.trim().is_empty() {
            return Err(SchemaError::EmptyModuleName);
        }

        if let Some(short) = &self.short_name {
            let len = short.chars().count();
            if !(2..=4).contains(&len) || short.chars().any(char::is_whitespace) {
                return Err(SchemaError::InvalidShortName {
                    module: self.module_name.clone(),
                    short_name: short.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for cmd in &self.commands {
            if cmd.name.trim().is_empty() {
                return Err(SchemaError::EmptyCommandName {
                    module: self.module_name.clone(),
                });
            }
            if !seen.insert(cmd.name.as_str()) {
                return Err(SchemaError::DuplicateCommand {
                    module: self.module_name.clone(),
                    command: cmd.name.clone(),
                });
            }
            validate_command(cmd)?;
        }
        Ok(())
    }
}

fn validate_command(cmd: &Command) -> Result<(), SchemaError> {
    let mut dests = HashSet::new();
    let mut shorts = HashSet::new();
    let mut saw_optional_positional = false;
    let mut saw_variadic_positional = false;

    for arg in &cmd.args {
        let fail = |reason: &str| SchemaError::InvalidArg {
            command: cmd.name.clone(),
            arg: arg.name.clone(),
            reason: reason.to_string(),
        };

        let dest = arg.dest();
        if dest.is_empty() {
            return Err(fail("name must not be empty"));
        }
        if RESERVED_DESTS.contains(&dest.as_str()) {
            return Err(fail("name is reserved"));
        }
        if !dests.insert(dest) {
            return Err(fail("destination already used by another argument"));
        }

        if arg.is_positional() {
            if arg.short.is_some() {
                return Err(fail("positional arguments cannot have a short flag"));
            }
            if arg.action.is_some() {
                return Err(fail("positional arguments cannot have an action"));
            }
            if arg.required {
                return Err(fail("positional arguments are required by their nargs, not 'required'"));
            }
            if saw_variadic_positional {
                return Err(fail("only the last positional argument may take '*' or '+'"));
            }
            let optional = matches!(
                arg.nargs,
                Some(super::Nargs::Optional | super::Nargs::ZeroOrMore)
            );
            if !optional && saw_optional_positional {
                return Err(fail("a required positional cannot follow an optional one"));
            }
            saw_optional_positional |= optional;
            saw_variadic_positional |= arg.is_variadic();
        } else {
            if let Some(rest) = arg.name.strip_prefix("--")
                && (rest.is_empty() || rest.starts_with('-'))
            {
                return Err(fail("long names must look like '--name'"));
            }
            if !arg.name.starts_with("--") && arg.short_char().is_none() {
                return Err(fail("single-dash names must be exactly one letter, e.g. '-v'"));
            }
            if arg.short.is_some() && arg.short_char().is_none() {
                return Err(fail("short flag must look like '-v'"));
            }
        }

        for c in arg.short_char().into_iter().chain(arg.short_alias()) {
            if !c.is_ascii_alphanumeric() {
                return Err(fail("short flag must be a letter or digit"));
            }
            if c == 'h' {
                return Err(fail("short flag '-h' is reserved for help"));
            }
            if !shorts.insert(c) {
                return Err(fail("short flag already used by another argument"));
            }
        }

        match arg.action {
            Some(action) => validate_action_arg(arg, action).map_err(|r| fail(&r))?,
            None => validate_value_arg(arg).map_err(|r| fail(&r))?,
        }
    }
    Ok(())
}

fn validate_action_arg(arg: &CommandArg, action: ArgAction) -> Result<(), String> {
    if arg.nargs.is_some() {
        return Err("'nargs' cannot be combined with an action".into());
    }
    if arg.choices.is_some() {
        return Err("'choices' cannot be combined with an action".into());
    }
    match (action, &arg.default) {
        (_, None) => Ok(()),
        (ArgAction::StoreTrue | ArgAction::StoreFalse, Some(Value::Bool(_))) => Ok(()),
        (ArgAction::StoreTrue | ArgAction::StoreFalse, Some(_)) => {
            Err("default of a store_true/store_false flag must be a boolean".into())
        }
        (ArgAction::Count, Some(v)) if v.as_u64().is_some_and(|n| n <= u8::MAX as u64) => Ok(()),
        (ArgAction::Count, Some(_)) => Err("default of a count flag must be 0-255".into()),
    }
}

fn validate_value_arg(arg: &CommandArg) -> Result<(), String> {
    let choices: Option<Vec<String>> = match &arg.choices {
        Some(list) if list.is_empty() => return Err("'choices' must not be empty".into()),
        Some(list) => {
            let mut raws = Vec::with_capacity(list.len());
            for choice in list {
                if choice.is_array() || choice.is_object() || choice.is_null() {
                    return Err("choices must be scalar values".into());
                }
                let raw = raw_value(choice);
                arg.arg_type
                    .coerce(&raw)
                    .map_err(|e| format!("choice {choice}: {e}"))?;
                raws.push(raw);
            }
            Some(raws)
        }
        None => None,
    };

    let Some(default) = &arg.default else {
        return Ok(());
    };
    let items: Vec<&Value> = match default {
        Value::Array(items) if arg.is_variadic() => items.iter().collect(),
        Value::Array(_) => return Err("list defaults require nargs '*' or '+'".into()),
        Value::Object(_) => return Err("default must not be an object".into()),
        scalar => vec![scalar],
    };
    for item in items {
        let raw = raw_value(item);
        arg.arg_type
            .coerce(&raw)
            .map_err(|e| format!("default {item}: {e}"))?;
        if let Some(allowed) = &choices
            && !allowed.contains(&raw)
        {
            return Err(format!("default {item} is not one of the choices"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::SchemaError;
    use crate::schema::{ArgAction, ArgType, Command, CommandArg, ModuleRegistration, Nargs};

    fn module_with(args: Vec<CommandArg>) -> ModuleRegistration {
        let mut cmd = Command::new("run", "Run", "demo:run");
        cmd.args = args;
        ModuleRegistration::new("demo").command(cmd)
    }

    fn reason(reg: &ModuleRegistration) -> String {
        match reg.validate() {
            Err(SchemaError::InvalidArg { reason, .. }) => reason,
            other => panic!("expected InvalidArg, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_full_featured_command() {
        let reg = module_with(vec![
            CommandArg::new("key").help("Key to read"),
            CommandArg::new("rest").nargs(Nargs::ZeroOrMore),
            CommandArg::new("--count")
                .short("-c")
                .arg_type(ArgType::Int)
                .required(true)
                .default_value(10)
                .choices([1, 5, 10]),
            CommandArg::new("--verbose").short("-v").action(ArgAction::Count),
            CommandArg::new("--force").action(ArgAction::StoreTrue),
        ])
        .short_name("dm");
        assert_eq!(reg.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_module_name() {
        assert_eq!(
            ModuleRegistration::new("  ").validate(),
            Err(SchemaError::EmptyModuleName)
        );
    }

    #[test]
    fn rejects_bad_short_names() {
        for bad in ["s", "toolong", "a b"] {
            let reg = ModuleRegistration::new("demo").short_name(bad);
            assert!(
                matches!(reg.validate(), Err(SchemaError::InvalidShortName { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_duplicate_commands() {
        let reg = ModuleRegistration::new("demo")
            .command(Command::new("run", "", "demo:run"))
            .command(Command::new("run", "", "demo:run2"));
        assert!(matches!(
            reg.validate(),
            Err(SchemaError::DuplicateCommand { .. })
        ));
    }

    #[test]
    fn rejects_reserved_names() {
        assert_eq!(reason(&module_with(vec![CommandArg::new("module")])), "name is reserved");
        assert_eq!(
            reason(&module_with(vec![CommandArg::new("--command")])),
            "name is reserved"
        );
        assert!(reason(&module_with(vec![CommandArg::new("--all").short("-h")])).contains("help"));
    }

    #[test]
    fn rejects_colliding_destinations_and_shorts() {
        let dup_dest = module_with(vec![CommandArg::new("--dry-run"), CommandArg::new("--dry_run")]);
        assert!(reason(&dup_dest).contains("destination"));

        let dup_short = module_with(vec![
            CommandArg::new("--value").short("-v"),
            CommandArg::new("--verbose").short("-v"),
        ]);
        assert!(reason(&dup_short).contains("short flag already used"));

        let dup_name_letter = module_with(vec![
            CommandArg::new("-x").short("-y"),
            CommandArg::new("--xray").short("-x"),
        ]);
        assert!(reason(&dup_name_letter).contains("short flag already used"));

        let help_letter = module_with(vec![CommandArg::new("-h").short("-y")]);
        assert!(reason(&help_letter).contains("reserved for help"));
    }

    #[test]
    fn rejects_malformed_long_names() {
        for bad in ["---x", "----"] {
            let reg = module_with(vec![CommandArg::new(bad).action(ArgAction::StoreTrue)]);
            assert!(reg.validate().is_err(), "{bad} should be rejected");
        }
        let reg = module_with(vec![CommandArg::new("---x")]);
        assert!(reason(&reg).contains("'--name'"));
    }

    #[test]
    fn rejects_action_combined_with_value_options() {
        let reg = module_with(vec![CommandArg::new("--n")
            .action(ArgAction::Count)
            .choices([1, 2])]);
        assert!(reason(&reg).contains("choices"));

        let reg = module_with(vec![CommandArg::new("--f")
            .action(ArgAction::StoreTrue)
            .default_value("yes")]);
        assert!(reason(&reg).contains("boolean"));
    }

    #[test]
    fn rejects_nonsensical_positionals() {
        assert!(reason(&module_with(vec![CommandArg::new("key").required(true)])).contains("required"));
        assert!(reason(&module_with(vec![
            CommandArg::new("files").nargs(Nargs::OneOrMore),
            CommandArg::new("dest"),
        ]))
        .contains("last positional"));
        assert!(reason(&module_with(vec![
            CommandArg::new("maybe").nargs(Nargs::Optional),
            CommandArg::new("dest"),
        ]))
        .contains("cannot follow"));
    }

    #[test]
    fn rejects_defaults_that_do_not_fit_the_type_or_choices() {
        let reg = module_with(vec![CommandArg::new("--n")
            .arg_type(ArgType::Int)
            .default_value("ten")]);
        assert!(reason(&reg).contains("invalid integer"));

        let reg = module_with(vec![CommandArg::new("--mode")
            .choices(["fast", "slow"])
            .default_value("medium")]);
        assert!(reason(&reg).contains("not one of the choices"));
    }

    #[test]
    fn handler_paths_are_not_validated() {
        let reg = ModuleRegistration::new("demo").command(Command::new("run", "", "no-separator"));
        assert_eq!(reg.validate(), Ok(()));
    }
}
