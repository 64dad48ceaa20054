/*!
Handler resolution.

Commands name their handler indirectly as `"<namespace>:<function>"`. Modules
fill a [`HandlerTable`] at start-up (`table.register("secret_manager:list", f)`)
and the dispatcher looks handlers up through the [`ResolveHandler`] trait, so
neither the registry nor the dispatcher depends on any module's code.

The path is split on the *last* ':' so namespaces may themselves contain
colons (`crate::module:function`).
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::dispatch::Streams;
use crate::error::ResolutionError;
use crate::parser::ParsedInvocation;

/// `Ok(None)` means success (exit code 0); `Ok(Some(code))` is passed through
/// as the exit code; `Err` is a handler failure and propagates to the caller.
pub type HandlerResult = anyhow::Result<Option<i32>>;

/// A resolved command handler.
pub type Handler = Arc<dyn Fn(&ParsedInvocation, &mut Streams<'_>) -> HandlerResult + Send + Sync>;

/// Late binding from handler path to callable.
pub trait ResolveHandler {
    /// Resolve with the reason for failure.
    fn try_resolve(&self, path_spec: &str) -> Result<Handler, ResolutionError>;

    /// Resolve, logging and discarding the reason for failure.
    fn resolve_handler(&self, path_spec: &str) -> Option<Handler> {
        self.try_resolve(path_spec)
            .map_err(|e| error!("failed to resolve handler: {e}"))
            .ok()
    }
}

/// Split `"<namespace>:<function>"` on its last ':'.
pub fn split_path_spec(path_spec: &str) -> Result<(&str, &str), ResolutionError> {
    match path_spec.rsplit_once(':') {
        Some((namespace, function))
            if !namespace.trim().is_empty() && !function.trim().is_empty() =>
        {
            Ok((namespace, function))
        }
        _ => Err(ResolutionError::Malformed(path_spec.to_string())),
    }
}

/// Explicit registration table: namespace -> function name -> handler.
#[derive(Clone, Default)]
pub struct HandlerTable {
    namespaces: HashMap<String, HashMap<String, Handler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `path_spec`, replacing any previous entry.
    pub fn register<F>(&mut self, path_spec: &str, handler: F) -> Result<(), ResolutionError>
    where
        F: Fn(&ParsedInvocation, &mut Streams<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        let (namespace, function) = split_path_spec(path_spec)?;
        debug!(handler = %path_spec, "handler registered");
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(function.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Builder form of [`HandlerTable::register`].
    pub fn with<F>(mut self, path_spec: &str, handler: F) -> Result<Self, ResolutionError>
    where
        F: Fn(&ParsedInvocation, &mut Streams<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(path_spec, handler)?;
        Ok(self)
    }

    pub fn contains(&self, path_spec: &str) -> bool {
        self.try_resolve(path_spec).is_ok()
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResolveHandler for HandlerTable {
    fn try_resolve(&self, path_spec: &str) -> Result<Handler, ResolutionError> {
        let (namespace, function) = split_path_spec(path_spec)?;
        let functions =
            self.namespaces
                .get(namespace)
                .ok_or_else(|| ResolutionError::UnknownNamespace {
                    path: path_spec.to_string(),
                    namespace: namespace.to_string(),
                })?;
        functions
            .get(function)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownFunction {
                path: path_spec.to_string(),
                namespace: namespace.to_string(),
                function: function.to_string(),
            })
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<String> = self
            .namespaces
            .iter()
            .flat_map(|(ns, fns)| fns.keys().map(move |func| format!("{ns}:{func}")))
            .collect();
        paths.sort();
        f.debug_struct("HandlerTable").field("handlers", &paths).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HandlerTable {
        HandlerTable::new()
            .with("managers::secret_manager:list", |_, _| Ok(None))
            .unwrap()
            .with("demo:fail", |_, _| Ok(Some(7)))
            .unwrap()
    }

    #[test]
    fn split_uses_last_separator() {
        assert_eq!(
            split_path_spec("a::b:run").unwrap(),
            ("a::b", "run")
        );
        assert!(matches!(
            split_path_spec("no_separator"),
            Err(ResolutionError::Malformed(_))
        ));
        assert!(split_path_spec("ns:").is_err());
        assert!(split_path_spec(":func").is_err());
    }

    #[test]
    fn resolves_registered_handlers() {
        let t = table();
        assert_eq!(t.len(), 2);
        assert!(t.contains("managers::secret_manager:list"));
        assert!(t.resolve_handler("demo:fail").is_some());
    }

    #[test]
    fn resolution_failures_return_none() {
        let t = table();
        assert!(t.resolve_handler("missing").is_none());
        assert!(t.resolve_handler("nowhere:list").is_none());
        assert!(t.resolve_handler("demo:absent").is_none());
    }

    #[test]
    fn resolution_errors_carry_detail() {
        let t = table();
        assert!(matches!(
            t.try_resolve("nowhere:list"),
            Err(ResolutionError::UnknownNamespace { namespace, .. }) if namespace == "nowhere"
        ));
        assert!(matches!(
            t.try_resolve("demo:absent"),
            Err(ResolutionError::UnknownFunction { function, .. }) if function == "absent"
        ));
    }

    #[test]
    fn registering_a_malformed_path_fails() {
        let mut t = HandlerTable::new();
        assert!(t.register("nocolon", |_, _| Ok(None)).is_err());
        assert!(t.is_empty());
    }
}
