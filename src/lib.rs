/*!
Centralized CLI command registry.

Feature modules declare their commands once as a [`ModuleRegistration`] and
register it; a single admin entry point loads the registry, builds a
two-level parser from it and dispatches to the handler each command names.

  modules --register_module--> Registry --(write-through)--> commands.json
  admin argv --> build_parser --> ParsedInvocation --> Dispatcher
             --> HandlerTable ("<namespace>:<function>") --> handler --> exit code

Layout:
  schema    CommandArg / Command / ModuleRegistration + validation
  registry  Registry, DocumentStore (JsonFileStore, MemoryStore)
  parser    build_parser, parse_admin_args, ParsedInvocation
  resolver  HandlerTable, ResolveHandler
  dispatch  Dispatcher, exit codes, run_admin
  config    AdminConfig (YAML + env)
  builtin   the admin's own `cli_manager` module
  utils     logging + terminal formatting

Example:

```no_run
use std::io::Write;
use cli_registry::{Command, CommandArg, HandlerTable, ModuleRegistration, Registry, Streams};

let mut registry = Registry::open_file("data/cli_manager/commands.json")?;
registry.register_module(
    ModuleRegistration::new("secret_manager")
        .short_name("sm")
        .command(Command::new("get", "Read a secret", "secret_manager:get")
            .arg(CommandArg::new("key"))),
);

let handlers = HandlerTable::new().with("secret_manager:get", |inv, io| {
    writeln!(io.out, "{}", inv.str("key").unwrap_or_default())?;
    Ok(None)
})?;

let (mut out, mut err) = (std::io::stdout(), std::io::stderr());
let code = cli_registry::run_admin(
    &registry, &handlers, "admin", "Project Admin CLI",
    ["admin", "sm", "get", "db_password"],
    &mut Streams::new(&mut out, &mut err),
)?;
# let _ = code;
# Ok::<(), anyhow::Error>(())
```
*/

pub mod builtin;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod utils;

pub use config::AdminConfig;
pub use dispatch::{Dispatcher, Streams, exit_code, run_admin};
pub use error::{ParserError, RegistryError, ResolutionError, SchemaError};
pub use parser::{GlobalArgs, ParsedInvocation, build_parser, parse_admin_args, scan_global_args};
pub use registry::{
    ConflictWarning, DocumentStore, JsonFileStore, MemoryStore, RegisterOutcome, RegisterReport,
    Registry,
};
pub use resolver::{Handler, HandlerResult, HandlerTable, ResolveHandler};
pub use schema::{ArgAction, ArgType, Command, CommandArg, ModuleRegistration, Nargs};
