//! Error taxonomy shared by the registry, parser builder and handler resolver.
//!
//! Registration problems surface as [`SchemaError`] / [`RegistryError`],
//! handler lookup problems as [`ResolutionError`], and parser construction
//! problems as [`ParserError`]. Errors raised *inside* a handler are plain
//! `anyhow::Error` values and are never wrapped here.

use thiserror::Error;

/// A registration that cannot be accepted as declared.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("module name must not be empty")]
    EmptyModuleName,

    #[error("short name '{short_name}' of module '{module}' must be 2-4 characters without whitespace")]
    InvalidShortName { module: String, short_name: String },

    #[error("module '{module}' declares a command with an empty name")]
    EmptyCommandName { module: String },

    #[error("module '{module}' declares command '{command}' more than once")]
    DuplicateCommand { module: String, command: String },

    #[error("invalid argument '{arg}' in command '{command}': {reason}")]
    InvalidArg {
        command: String,
        arg: String,
        reason: String,
    },
}

/// Failures of the registry itself (validation, ambiguity, persistence).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] SchemaError),

    #[error("module name '{module}' is already the short name of module '{owner}'")]
    Ambiguous { module: String, owner: String },

    #[error("registry document {location} is corrupt: {reason}")]
    CorruptStore { location: String, reason: String },

    #[error("registry store {location}: {source}")]
    Store {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a `"<namespace>:<function>"` handler path could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("handler path '{0}' must have the form '<namespace>:<function>'")]
    Malformed(String),

    #[error("namespace '{namespace}' is not registered (handler '{path}')")]
    UnknownNamespace { path: String, namespace: String },

    #[error("namespace '{namespace}' has no function '{function}' (handler '{path}')")]
    UnknownFunction {
        path: String,
        namespace: String,
        function: String,
    },
}

/// The registry cannot be turned into an unambiguous parser, or argv was rejected.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("top-level token '{token}' is claimed by both '{first}' and '{second}'")]
    AmbiguousToken {
        token: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Usage(#[from] clap::Error),
}
