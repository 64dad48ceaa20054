/*!
Dispatcher: parsed invocation -> resolved handler -> exit code.

Routing failures never escape as errors; each one prints a message naming
the module / command / handler involved and maps to a distinct exit code:

  0  OK                  handler succeeded (`Ok(None)` or `Ok(Some(0))`)
  1  HANDLER_FAILURE     used by the binary when a handler returns `Err`
  2  USAGE               no module / no command given, or argv rejected
  3  MODULE_NOT_FOUND    unknown module or short name
  4  COMMAND_NOT_FOUND   unknown command within a known module
  5  RESOLUTION          handler path malformed or not registered

A handler's own `Ok(Some(code))` is passed through unchanged. A handler
`Err` is returned to the caller untouched.
*/

use std::ffi::OsString;
use std::io::Write;

use tracing::debug;

use crate::error::ParserError;
use crate::parser::{ParsedInvocation, parse_admin_args};
use crate::registry::{DocumentStore, Registry};
use crate::resolver::ResolveHandler;
use crate::schema::{CommandArg, ModuleRegistration};
use crate::utils::format::{Role, StyleOptions, TableOpts, color, heading, table};

/// Process exit codes.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const HANDLER_FAILURE: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const MODULE_NOT_FOUND: i32 = 3;
    pub const COMMAND_NOT_FOUND: i32 = 4;
    pub const RESOLUTION: i32 = 5;
}

/// Output sinks for listings, messages and handler output.
pub struct Streams<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Streams<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }
}

/// Routes invocations against one registry and one handler resolver.
pub struct Dispatcher<'a, S: DocumentStore> {
    registry: &'a Registry<S>,
    resolver: &'a dyn ResolveHandler,
    program_name: String,
    style: StyleOptions,
}

impl<'a, S: DocumentStore> Dispatcher<'a, S> {
    pub fn new(registry: &'a Registry<S>, resolver: &'a dyn ResolveHandler) -> Self {
        Self {
            registry,
            resolver,
            program_name: "admin".to_string(),
            style: StyleOptions::detect(),
        }
    }

    /// Program name used in usage hints.
    pub fn program_name(mut self, name: impl Into<String>) -> Self {
        self.program_name = name.into();
        self
    }

    pub fn style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }

    /// Route `invocation` to its handler. `Err` only ever carries a handler failure.
    pub fn dispatch(
        &self,
        invocation: &ParsedInvocation,
        io: &mut Streams<'_>,
    ) -> anyhow::Result<i32> {
        let prog = &self.program_name;

        let Some(token) = invocation.module.as_deref() else {
            let _ = writeln!(io.out, "{}", self.render_modules());
            let _ = writeln!(io.err, "usage: {prog} <module> <command> [args...]");
            return Ok(exit_code::USAGE);
        };

        let Some(module) = self.registry.resolve_module(token) else {
            debug!(module = %token, "module not found in registry");
            let _ = writeln!(
                io.err,
                "{}: module '{token}' not found in registry (run '{prog}' to list modules)",
                self.error_label()
            );
            return Ok(exit_code::MODULE_NOT_FOUND);
        };

        let Some(command_name) = invocation.command.as_deref() else {
            let _ = writeln!(io.out, "{}", self.render_commands(module));
            let _ = writeln!(
                io.err,
                "usage: {prog} {} <command> [args...]",
                module.module_name
            );
            return Ok(exit_code::USAGE);
        };

        let Some(command) = module.find_command(command_name) else {
            debug!(module = %module.module_name, command = %command_name, "command not found");
            let _ = writeln!(
                io.err,
                "{}: command '{command_name}' not found in module '{}' (run '{prog} {}' to list commands)",
                self.error_label(),
                module.module_name,
                module.module_name
            );
            return Ok(exit_code::COMMAND_NOT_FOUND);
        };

        let handler = match self.resolver.try_resolve(&command.handler) {
            Ok(handler) => handler,
            Err(e) => {
                debug!(handler = %command.handler, "failed to resolve handler: {e}");
                let _ = writeln!(
                    io.err,
                    "{}: cannot run '{} {}': {e}",
                    self.error_label(),
                    module.module_name,
                    command.name
                );
                return Ok(exit_code::RESOLUTION);
            }
        };

        debug!(
            module = %module.module_name,
            command = %command.name,
            handler = %command.handler,
            "dispatching"
        );
        let code = handler(invocation, io)?.unwrap_or(exit_code::OK);
        debug!(code, "handler finished");
        Ok(code)
    }

    /// Listing of every registered module.
    pub fn render_modules(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .registry
            .modules()
            .map(|m| {
                vec![
                    m.module_name.clone(),
                    m.short_name.clone().unwrap_or_else(|| "-".into()),
                    m.commands.len().to_string(),
                    m.description.clone(),
                ]
            })
            .collect();

        let mut out = heading("Modules", rows.len(), &self.style);
        out.push('\n');
        if rows.is_empty() {
            out.push_str(&color(Role::Dim, "(no modules registered)", &self.style));
            return out;
        }
        out.push_str(&table(
            &["MODULE", "SHORT", "COMMANDS", "DESCRIPTION"],
            &rows,
            TableOpts {
                max_width: self.style.term_width,
                ..TableOpts::default()
            },
            &self.style,
        ));
        out
    }

    /// Listing of one module's commands.
    pub fn render_commands(&self, module: &ModuleRegistration) -> String {
        let rows: Vec<Vec<String>> = module
            .commands
            .iter()
            .map(|c| vec![c.name.clone(), usage_summary(&c.args), c.help.clone()])
            .collect();

        let title = match &module.short_name {
            Some(short) => format!("{} ({short}) commands", module.module_name),
            None => format!("{} commands", module.module_name),
        };
        let mut out = heading(title, rows.len(), &self.style);
        if !module.description.is_empty() {
            out.push('\n');
            out.push_str(&color(Role::Secondary, &module.description, &self.style));
        }
        out.push('\n');
        if rows.is_empty() {
            out.push_str(&color(Role::Dim, "(no commands)", &self.style));
            return out;
        }
        out.push_str(&table(
            &["COMMAND", "ARGS", "HELP"],
            &rows,
            TableOpts::default(),
            &self.style,
        ));
        out
    }

    fn error_label(&self) -> String {
        color(Role::Error, "error", &self.style)
    }
}

/// Compact argument synopsis: `<key> [--force] [--days DAYS]`.
pub fn usage_summary(args: &[CommandArg]) -> String {
    if args.is_empty() {
        return "-".to_string();
    }
    args.iter()
        .map(|a| {
            if a.is_positional() {
                let name = a.dest();
                match a.nargs {
                    None => format!("<{name}>"),
                    Some(crate::schema::Nargs::Optional) => format!("[{name}]"),
                    Some(crate::schema::Nargs::ZeroOrMore) => format!("[{name}...]"),
                    Some(crate::schema::Nargs::OneOrMore) => format!("<{name}>..."),
                }
            } else {
                let flag = if a.action.is_some() {
                    a.name.clone()
                } else {
                    format!("{} {}", a.name, a.dest().to_uppercase())
                };
                if a.required {
                    flag
                } else {
                    format!("[{flag}]")
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse `argv` against the registry and dispatch it. Parse errors (and
/// `--help` / `--version`) are rendered to `io` and mapped to clap's exit code.
pub fn run_admin<S, I, T>(
    registry: &Registry<S>,
    resolver: &dyn ResolveHandler,
    program_name: &str,
    description: &str,
    argv: I,
    io: &mut Streams<'_>,
) -> anyhow::Result<i32>
where
    S: DocumentStore,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let invocation = match parse_admin_args(registry, program_name, description, argv) {
        Ok((_, invocation)) => invocation,
        Err(e) => return Ok(report_parse_error(&e, io)),
    };
    Dispatcher::new(registry, resolver)
        .program_name(program_name)
        .dispatch(&invocation, io)
}

/// Print a parser failure and return the exit code it maps to.
pub fn report_parse_error(e: &ParserError, io: &mut Streams<'_>) -> i32 {
    match e {
        ParserError::Usage(clap_err) => {
            let rendered = clap_err.render().to_string();
            let sink: &mut dyn Write = if clap_err.use_stderr() {
                &mut *io.err
            } else {
                &mut *io.out
            };
            let _ = write!(sink, "{rendered}");
            clap_err.exit_code()
        }
        ParserError::AmbiguousToken { .. } => {
            let _ = writeln!(io.err, "error: {e}");
            exit_code::USAGE
        }
    }
}
