/*!
Built-in `cli_manager` module (short name `cli`).

The admin binary registers this module on every start, the same way any
other module re-registers from its refresh routine, and installs its
handlers into the handler table.

Commands:
  cli modules [--json]            list registered modules
  cli show <name> [--json]        one module's commands and arguments
  cli unregister <name>           drop a module from the registry
  cli export                      print the persisted registry document
  cli paths                       registry / admin entry-point locations

Handlers re-open the registry from disk on each call, so they always see
the persisted state rather than the dispatching process's snapshot.

JSON output (modules):
{
  "status": "ok",
  "count": 2,
  "modules": [
    { "module_name": "secret_manager", "short_name": "sm",
      "description": "...", "commands": ["get", "list"] }
  ]
}
*/

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::config::AdminConfig;
use crate::dispatch::{Streams, exit_code, usage_summary};
use crate::parser::ParsedInvocation;
use crate::registry::{Registry, RegisterReport};
use crate::resolver::{HandlerResult, HandlerTable};
use crate::schema::{ArgAction, Command, CommandArg, ModuleRegistration, Nargs, raw_value};
use crate::utils::format::{Role, StyleOptions, TableOpts, color, heading, table};

pub const MODULE_NAME: &str = "cli_manager";
pub const SHORT_NAME: &str = "cli";
const NAMESPACE: &str = "cli_registry::builtin";

fn handler_path(function: &str) -> String {
    format!("{NAMESPACE}:{function}")
}

/// Command surface of the built-in module.
pub fn registration() -> ModuleRegistration {
    let json_flag = || {
        CommandArg::new("--json")
            .help("Output JSON instead of human-readable text")
            .action(ArgAction::StoreTrue)
    };
    let module_arg = || CommandArg::new("name").help("Module name or short name");

    ModuleRegistration::new(MODULE_NAME)
        .short_name(SHORT_NAME)
        .description("Inspect and maintain the command registry")
        .command(
            Command::new("modules", "List registered modules", handler_path("modules"))
                .arg(json_flag()),
        )
        .command(
            Command::new("show", "Show a module's commands and arguments", handler_path("show"))
                .arg(module_arg())
                .arg(json_flag()),
        )
        .command(
            Command::new("unregister", "Remove a module from the registry", handler_path("unregister"))
                .arg(module_arg()),
        )
        .command(Command::new(
            "export",
            "Print the persisted registry document",
            handler_path("export"),
        ))
        .command(Command::new(
            "paths",
            "Show registry and admin entry-point paths",
            handler_path("paths"),
        ))
}

/// Register the built-in module (idempotent).
pub fn refresh<S: crate::registry::DocumentStore>(
    registry: &mut Registry<S>,
) -> Result<RegisterReport> {
    registry
        .register(registration())
        .context("failed to register the cli_manager module")
}

/// Add the built-in handlers to `table`.
pub fn install(table: &mut HandlerTable, config: &AdminConfig) -> Result<()> {
    let config = Arc::new(config.clone());

    let path = config.registry_path();
    table.register(&handler_path("modules"), move |inv, io| {
        list_modules(&path, inv, io)
    })?;

    let path = config.registry_path();
    table.register(&handler_path("show"), move |inv, io| {
        show_module(&path, inv, io)
    })?;

    let path = config.registry_path();
    table.register(&handler_path("unregister"), move |inv, io| {
        unregister(&path, inv, io)
    })?;

    let path = config.registry_path();
    table.register(&handler_path("export"), move |_, io| export(&path, io))?;

    let cfg = Arc::clone(&config);
    table.register(&handler_path("paths"), move |_, io| paths(&cfg, io))?;
    Ok(())
}

/* ---- Handlers ---- */

fn open(path: &Path) -> Result<Registry> {
    Registry::open_file(path).with_context(|| format!("failed to open registry '{}'", path.display()))
}

fn list_modules(path: &Path, inv: &ParsedInvocation, io: &mut Streams<'_>) -> HandlerResult {
    let registry = open(path)?;

    if inv.flag("json") {
        let modules: Vec<serde_json::Value> = registry
            .modules()
            .map(|m| {
                serde_json::json!({
                    "module_name": m.module_name,
                    "short_name": m.short_name,
                    "description": m.description,
                    "commands": m.commands.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        writeln!(
            io.out,
            "{}",
            serde_json::json!({
                "status": "ok",
                "count": modules.len(),
                "modules": modules,
            })
        )?;
        return Ok(None);
    }

    let style = StyleOptions::detect();
    let rows: Vec<Vec<String>> = registry
        .modules()
        .map(|m| {
            vec![
                m.module_name.clone(),
                m.short_name.clone().unwrap_or_else(|| "-".into()),
                m.commands
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                m.description.clone(),
            ]
        })
        .collect();
    writeln!(io.out, "{}", heading("Modules", rows.len(), &style))?;
    if !rows.is_empty() {
        writeln!(
            io.out,
            "{}",
            table(
                &["MODULE", "SHORT", "COMMANDS", "DESCRIPTION"],
                &rows,
                TableOpts::default(),
                &style
            )
        )?;
    }
    Ok(None)
}

fn show_module(path: &Path, inv: &ParsedInvocation, io: &mut Streams<'_>) -> HandlerResult {
    let registry = open(path)?;
    let token = inv.str("name").unwrap_or_default();
    let Some(module) = registry.resolve_module(token) else {
        writeln!(io.err, "error: module '{token}' not found in registry")?;
        return Ok(Some(exit_code::MODULE_NOT_FOUND));
    };

    if inv.flag("json") {
        let value = serde_json::to_value(module).context("failed to serialize module")?;
        writeln!(
            io.out,
            "{}",
            serde_json::json!({ "status": "ok", "module": value })
        )?;
        return Ok(None);
    }

    let style = StyleOptions::detect();
    let title = match &module.short_name {
        Some(short) => format!("{} ({short})", module.module_name),
        None => module.module_name.clone(),
    };
    writeln!(io.out, "{}", heading(title, module.commands.len(), &style))?;
    if !module.description.is_empty() {
        writeln!(io.out, "{}", color(Role::Secondary, &module.description, &style))?;
    }

    for cmd in &module.commands {
        writeln!(io.out)?;
        writeln!(
            io.out,
            "{} {}  {}",
            color(Role::Accent, &cmd.name, &style),
            usage_summary(&cmd.args),
            color(Role::Dim, format!("[{}]", cmd.handler), &style)
        )?;
        if !cmd.help.is_empty() {
            writeln!(io.out, "  {}", cmd.help)?;
        }
        if cmd.args.is_empty() {
            continue;
        }
        let rows: Vec<Vec<String>> = cmd.args.iter().map(arg_row).collect();
        writeln!(
            io.out,
            "{}",
            table(
                &["ARG", "KIND", "REQ", "DEFAULT", "HELP"],
                &rows,
                TableOpts::default(),
                &style
            )
        )?;
    }
    Ok(None)
}

fn arg_row(arg: &CommandArg) -> Vec<String> {
    let name = match arg.short_char() {
        Some(c) if arg.long().is_some() => format!("-{c}, {}", arg.name),
        _ => arg.name.clone(),
    };
    let kind = match (arg.action, arg.nargs) {
        (Some(ArgAction::StoreTrue), _) => "store_true".to_string(),
        (Some(ArgAction::StoreFalse), _) => "store_false".to_string(),
        (Some(ArgAction::Count), _) => "count".to_string(),
        (None, Some(n)) => {
            let n = serde_json::to_value(n).map(|v| raw_value(&v)).unwrap_or_default();
            format!("{}{n}", arg.arg_type)
        }
        (None, None) => arg.arg_type.to_string(),
    };
    let kind = match &arg.choices {
        Some(choices) => format!(
            "{kind} {{{}}}",
            choices.iter().map(raw_value).collect::<Vec<_>>().join(",")
        ),
        None => kind,
    };
    let optional_positional = matches!(arg.nargs, Some(Nargs::Optional | Nargs::ZeroOrMore));
    let required = arg.required || (arg.is_positional() && !optional_positional);
    vec![
        name,
        kind,
        if required { "yes".into() } else { "no".into() },
        arg.default.as_ref().map(raw_value).unwrap_or_else(|| "-".into()),
        arg.help.clone(),
    ]
}

fn unregister(path: &Path, inv: &ParsedInvocation, io: &mut Streams<'_>) -> HandlerResult {
    let mut registry = open(path)?;
    let token = inv.str("name").unwrap_or_default();
    let Some(name) = registry.resolve_module_name(token).map(str::to_string) else {
        writeln!(io.err, "error: module '{token}' not found in registry")?;
        return Ok(Some(exit_code::MODULE_NOT_FOUND));
    };
    registry
        .unregister(&name)
        .with_context(|| format!("failed to unregister '{name}'"))?;
    writeln!(io.out, "Unregistered module '{name}'")?;
    Ok(None)
}

fn export(path: &Path, io: &mut Streams<'_>) -> HandlerResult {
    let registry = open(path)?;
    let document = serde_json::to_string_pretty(&registry.get_registry())
        .context("failed to serialize registry")?;
    writeln!(io.out, "{document}")?;
    Ok(None)
}

fn paths(config: &AdminConfig, io: &mut Streams<'_>) -> HandlerResult {
    writeln!(io.out, "registry:  {}", config.registry_path().display())?;
    writeln!(io.out, "admin cli: {}", config.admin_cli_path().display())?;
    Ok(None)
}
