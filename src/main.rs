use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};

use cli_registry::dispatch::{Dispatcher, Streams, exit_code, report_parse_error};
use cli_registry::{
    AdminConfig, HandlerTable, Registry, builtin, parse_admin_args, scan_global_args, utils,
};

/// Admin entry point: dispatches to every command registered in the registry.
///
/// Command layout (built from the registry at start-up):
///   admin [-v|-vv|-q] <module|short-name> <command> [args...]
///   admin                       list registered modules
///   admin <module>              list that module's commands
///
/// Built-in module (`cli_manager`, short `cli`):
///   admin cli modules [--json]
///   admin cli show <name> [--json]
///   admin cli unregister <name>
///   admin cli export
///   admin cli paths
///
/// Environment:
///   CLI_MANAGER_CONFIG   YAML config file (data_dir, registry_file, admin_cli.*)
///   CLI_MANAGER_DATA     Override data_dir (registry document location)
///   RUST_LOG             Log filter; overrides -v / -q
///
/// Exit codes:
///   0 ok, 1 handler failure, 2 usage, 3 module not found,
///   4 command not found, 5 handler resolution error,
///   any other value: returned by the handler itself
fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code::HANDLER_FAILURE as u8)
        }
    }
}

fn run() -> Result<i32> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let config = AdminConfig::load()?;

    // Initialize logging before the registry is touched
    let globals = scan_global_args(&config.admin_cli.program_name, argv.iter().cloned());
    utils::init_logging(utils::derive_level(globals.verbose, globals.quiet));

    let mut registry = Registry::open_file(config.registry_path())
        .with_context(|| format!("failed to load registry '{}'", config.registry_path().display()))?;
    builtin::refresh(&mut registry)?;

    let mut handlers = HandlerTable::new();
    builtin::install(&mut handlers, &config)?;

    let (mut out, mut err) = (std::io::stdout(), std::io::stderr());
    let mut io = Streams::new(&mut out, &mut err);

    let program_name = &config.admin_cli.program_name;
    let (_, invocation) =
        match parse_admin_args(&registry, program_name, &config.admin_cli.description, argv) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(report_parse_error(&e, &mut io)),
        };

    Dispatcher::new(&registry, &handlers)
        .program_name(program_name.clone())
        .dispatch(&invocation, &mut io)
}
