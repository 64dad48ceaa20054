/*!
Parser builder: registry schema -> two-level clap command tree.

  <prog> [-v|-q] <MODULE|SHORT> <COMMAND> [args...]

Level one has one subcommand per module (its short name is a visible alias),
level two one subcommand per `Command`. Each `CommandArg` becomes one clap
`Arg`:

  positional (no leading '-')   nargs None -> required single value
                                nargs ?    -> optional single value (+ default)
                                nargs *    -> zero or more values  (+ default)
                                nargs +    -> one or more values
  optional ('--long' / '-x')    `short` adds a short flag for the same destination
                                action store_true/store_false/count replaces value handling;
                                a count starts from its `default`
                                a '-x' name with a different `short` keeps both letters
                                otherwise `type`/`choices` become the value parser

Values are kept as strings inside clap and typed when the invocation is
extracted (see `invocation.rs`), so `choices` and `type` share one path.
Neither `module` nor `command` level is required by clap, and unknown tokens
at either level are passed through as external subcommands: the dispatcher
owns the listing and not-found reporting.
*/

mod invocation;

use clap::builder::{PossibleValuesParser, ValueRange};
use clap::{Arg, ArgAction, ArgMatches, Args, FromArgMatches};
use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::error::ParserError;
use crate::registry::{DocumentStore, Registry};
use crate::schema::{self, CommandArg, ModuleRegistration, Nargs, raw_value};
pub use invocation::ParsedInvocation;

/// Flags accepted before the module token. Not global, so module arguments
/// are free to reuse `-v` / `-q`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Build the admin parser from every registered module.
pub fn build_parser<S: DocumentStore>(
    registry: &Registry<S>,
    program_name: &str,
    description: &str,
) -> Result<clap::Command, ParserError> {
    check_top_level_tokens(registry)?;

    let root = clap::Command::new(program_name.to_string())
        .about(description.to_string())
        .disable_help_subcommand(true)
        .allow_external_subcommands(true)
        .subcommand_value_name("MODULE")
        .subcommand_help_heading("Modules");
    let root = GlobalArgs::augment_args(root);

    Ok(registry
        .modules()
        .fold(root, |root, module| root.subcommand(module_parser(module))))
}

/// Build the parser, parse `argv` (argv[0] is the program name) and extract
/// the invocation.
pub fn parse_admin_args<S, I, T>(
    registry: &Registry<S>,
    program_name: &str,
    description: &str,
    argv: I,
) -> Result<(GlobalArgs, ParsedInvocation), ParserError>
where
    S: DocumentStore,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches: ArgMatches =
        build_parser(registry, program_name, description)?.try_get_matches_from(argv)?;
    let globals = GlobalArgs::from_arg_matches(&matches)?;
    Ok((globals, ParsedInvocation::from_matches(registry, &matches)))
}

/// Read only the root `-v` / `-q` flags, before the registry is loaded.
/// Anything else in `argv` is ignored here and checked by the full parse.
pub fn scan_global_args<I, T>(program_name: &str, argv: I) -> GlobalArgs
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let root = clap::Command::new(program_name.to_string())
        .disable_help_flag(true)
        .allow_external_subcommands(true)
        .ignore_errors(true);
    GlobalArgs::augment_args(root)
        .try_get_matches_from(argv)
        .ok()
        .and_then(|matches| GlobalArgs::from_arg_matches(&matches).ok())
        .unwrap_or_default()
}

/// Every module name and short name must route to exactly one module.
fn check_top_level_tokens<S: DocumentStore>(registry: &Registry<S>) -> Result<(), ParserError> {
    let mut claimed: BTreeMap<&str, &str> = BTreeMap::new();
    for module in registry.modules() {
        let name = module.module_name.as_str();
        for token in std::iter::once(name).chain(module.short_name.as_deref()) {
            match claimed.get(token) {
                Some(first) if *first != name => {
                    return Err(ParserError::AmbiguousToken {
                        token: token.to_string(),
                        first: first.to_string(),
                        second: name.to_string(),
                    });
                }
                _ => {
                    claimed.insert(token, name);
                }
            }
        }
    }
    Ok(())
}

fn module_parser(module: &ModuleRegistration) -> clap::Command {
    let about = if module.description.is_empty() {
        format!("Commands for {}", module.module_name)
    } else {
        module.description.clone()
    };

    let mut cmd = clap::Command::new(module.module_name.clone())
        .about(about)
        .disable_help_subcommand(true)
        .allow_external_subcommands(true)
        .subcommand_value_name("COMMAND")
        .subcommand_help_heading("Commands");
    if let Some(short) = &module.short_name
        && short != &module.module_name
    {
        cmd = cmd.visible_alias(short.clone());
    }
    module
        .commands
        .iter()
        .fold(cmd, |cmd, command| cmd.subcommand(command_parser(command)))
}

fn command_parser(command: &schema::Command) -> clap::Command {
    clap::Command::new(command.name.clone())
        .about(command.help.clone())
        // Repeating an option overrides the earlier value.
        .args_override_self(true)
        .args(command.args.iter().map(build_arg))
}

/// Translate one `CommandArg` into a clap `Arg`.
pub fn build_arg(spec: &CommandArg) -> Arg {
    let mut arg = Arg::new(spec.dest());
    if !spec.help.is_empty() {
        arg = arg.help(spec.help.clone());
    }

    if spec.is_positional() {
        arg = arg
            .value_name(spec.name.to_uppercase())
            .action(ArgAction::Set)
            .value_parser(value_parser(spec));
        arg = match spec.nargs {
            None => arg.required(true),
            Some(Nargs::Optional) => arg.required(false),
            Some(Nargs::ZeroOrMore) => arg.required(false).num_args(ValueRange::new(1..)),
            Some(Nargs::OneOrMore) => arg.required(true).num_args(ValueRange::new(1..)),
        };
        // Positional defaults only apply when the value may be omitted.
        if matches!(spec.nargs, Some(Nargs::Optional | Nargs::ZeroOrMore)) {
            arg = apply_default(arg, spec);
        }
        return arg;
    }

    if let Some(long) = spec.long() {
        arg = arg.long(long.to_string());
    }
    if let Some(short) = spec.short_char() {
        arg = arg.short(short);
    }
    if let Some(letter) = spec.short_alias() {
        arg = arg.visible_short_alias(letter);
    }

    if let Some(action) = spec.action {
        return match action {
            schema::ArgAction::StoreTrue => apply_default(arg.action(ArgAction::SetTrue), spec),
            schema::ArgAction::StoreFalse => apply_default(arg.action(ArgAction::SetFalse), spec),
            // Seeded from `default` when the invocation is extracted.
            schema::ArgAction::Count => arg.action(ArgAction::Count),
        };
    }

    arg = arg
        .action(ArgAction::Set)
        .required(spec.required)
        .value_name(spec.dest().to_uppercase())
        .value_parser(value_parser(spec));
    arg = match spec.nargs {
        None => arg,
        Some(Nargs::Optional) => arg.num_args(ValueRange::new(0..=1)),
        Some(Nargs::ZeroOrMore) => arg.num_args(ValueRange::new(0..)),
        Some(Nargs::OneOrMore) => arg.num_args(ValueRange::new(1..)),
    };
    apply_default(arg, spec)
}

fn apply_default(arg: Arg, spec: &CommandArg) -> Arg {
    match &spec.default {
        None => arg,
        Some(serde_json::Value::Array(items)) => {
            arg.default_values(items.iter().map(raw_value).collect::<Vec<_>>())
        }
        Some(value) => arg.default_value(raw_value(value)),
    }
}

/// `choices` restrict the raw token; otherwise the token must coerce to `type`.
fn value_parser(spec: &CommandArg) -> clap::builder::ValueParser {
    if let Some(choices) = &spec.choices {
        let raws: Vec<String> = choices.iter().map(raw_value).collect();
        return PossibleValuesParser::new(raws).into();
    }
    let arg_type = spec.arg_type;
    clap::builder::ValueParser::new(move |raw: &str| -> Result<String, String> {
        arg_type.coerce(raw).map(|_| raw.to_string())
    })
}
