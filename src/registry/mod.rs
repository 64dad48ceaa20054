/*!
Module registry.

Maps `module_name -> ModuleRegistration` plus a derived `short_name ->
module_name` alias index. Every mutation is written through to the backing
[`DocumentStore`] before the in-memory state changes, so a failed save leaves
the registry exactly as it was.

Short-name policy: the first module to claim a short name keeps it. A later
registrant with the same short name (or a short name equal to another
module's full name) is stored without an alias and the conflict is reported
in [`RegisterReport::conflict`]. A short name equal to the module's own
name is simply dropped. A module whose *full* name is already some
other module's alias is rejected, since the top-level token would be
ambiguous.
*/

pub mod store;

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::RegistryError;
use crate::schema::ModuleRegistration;
pub use store::{Document, DocumentStore, JsonFileStore, MemoryStore};

/// What a successful registration did to the stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

/// Non-fatal short-name collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictWarning {
    pub short_name: String,
    /// Module whose alias was dropped.
    pub module: String,
    /// Module that keeps the token.
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReport {
    pub outcome: RegisterOutcome,
    pub conflict: Option<ConflictWarning>,
}

/// Registry of module command schemas backed by a document store.
#[derive(Debug)]
pub struct Registry<S: DocumentStore = JsonFileStore> {
    store: S,
    modules: Document,
    aliases: BTreeMap<String, String>,
}

impl Registry<JsonFileStore> {
    /// Open the registry persisted at `path` (missing file -> empty registry).
    /// The data directory is created up front.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let store = JsonFileStore::new(path.as_ref());
        store.ensure_dir()?;
        Self::open(store)
    }
}

impl<S: DocumentStore> Registry<S> {
    /// Load the registry from `store`. A corrupt document is an error, never
    /// silently replaced with an empty registry.
    pub fn open(store: S) -> Result<Self, RegistryError> {
        let modules = store.load()?;
        let aliases = build_alias_index(&modules);
        debug!(
            location = %store.location(),
            modules = modules.len(),
            "registry loaded"
        );
        Ok(Self {
            store,
            modules,
            aliases,
        })
    }

    /* ---- Mutations ---- */

    /// Register (or re-register) a module, returning what happened.
    pub fn register(
        &mut self,
        mut registration: ModuleRegistration,
    ) -> Result<RegisterReport, RegistryError> {
        registration.validate()?;
        let name = registration.module_name.clone();

        if registration.short_name.as_deref() == Some(name.as_str()) {
            debug!(module = %name, "short name equals module name; registering without alias");
            registration.short_name = None;
        }

        if let Some(owner) = self.aliases.get(&name)
            && owner != &name
        {
            return Err(RegistryError::Ambiguous {
                module: name,
                owner: owner.clone(),
            });
        }

        let mut conflict = None;
        if let Some(short) = registration.short_name.clone()
            && let Some(owner) = self.short_name_owner(&short, &name)
        {
            warn!(
                short_name = %short,
                module = %name,
                owner = %owner,
                "short name already taken; registering without alias"
            );
            registration.short_name = None;
            conflict = Some(ConflictWarning {
                short_name: short,
                module: name.clone(),
                owner,
            });
        }

        let outcome = match self.modules.get(&name) {
            Some(existing) if existing == &registration => RegisterOutcome::Unchanged,
            Some(_) => RegisterOutcome::Replaced,
            None => RegisterOutcome::Inserted,
        };

        // Unchanged entries leave the persisted document byte-identical.
        if outcome != RegisterOutcome::Unchanged {
            let mut next = self.modules.clone();
            next.insert(name.clone(), registration);
            self.commit(next)?;
        }

        debug!(module = %name, ?outcome, "module registered");
        Ok(RegisterReport { outcome, conflict })
    }

    /// Boolean form of [`Registry::register`] for module refresh routines.
    /// Conflicts are logged; only a rejected or unsaved registration yields `false`.
    pub fn register_module(&mut self, registration: ModuleRegistration) -> bool {
        let name = registration.module_name.clone();
        match self.register(registration) {
            Ok(_) => true,
            Err(e) => {
                error!(module = %name, "registration failed: {e}");
                false
            }
        }
    }

    /// Remove a module and its alias.
    pub fn unregister(&mut self, module_name: &str) -> Result<bool, RegistryError> {
        if !self.modules.contains_key(module_name) {
            return Ok(false);
        }
        let mut next = self.modules.clone();
        next.remove(module_name);
        self.commit(next)?;
        debug!(module = %module_name, "module unregistered");
        Ok(true)
    }

    /// `true` if the module was registered and has been removed.
    pub fn unregister_module(&mut self, module_name: &str) -> bool {
        match self.unregister(module_name) {
            Ok(removed) => removed,
            Err(e) => {
                error!(module = %module_name, "unregistration failed: {e}");
                false
            }
        }
    }

    /* ---- Queries ---- */

    /// Snapshot of `module_name -> serialized registration`.
    pub fn get_registry(&self) -> BTreeMap<String, Value> {
        self.modules
            .iter()
            .map(|(name, reg)| {
                (
                    name.clone(),
                    serde_json::to_value(reg).unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Registered module names (never short names), sorted.
    pub fn list_modules(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Canonical module name for a full name or short name token.
    pub fn resolve_module_name(&self, token: &str) -> Option<&str> {
        if let Some((name, _)) = self.modules.get_key_value(token) {
            return Some(name.as_str());
        }
        self.aliases.get(token).map(String::as_str)
    }

    pub fn resolve_module(&self, token: &str) -> Option<&ModuleRegistration> {
        self.resolve_module_name(token)
            .and_then(|name| self.modules.get(name))
    }

    pub fn get(&self, module_name: &str) -> Option<&ModuleRegistration> {
        self.modules.get(module_name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRegistration> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /* ---- Internals ---- */

    /// Another module already answering to `short`, if any.
    fn short_name_owner(&self, short: &str, module: &str) -> Option<String> {
        if let Some(owner) = self.aliases.get(short)
            && owner != module
        {
            return Some(owner.clone());
        }
        if short != module && self.modules.contains_key(short) {
            return Some(short.to_string());
        }
        None
    }

    fn commit(&mut self, next: Document) -> Result<(), RegistryError> {
        self.store.save(&next)?;
        self.aliases = build_alias_index(&next);
        self.modules = next;
        Ok(())
    }
}

fn build_alias_index(modules: &Document) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for reg in modules.values() {
        let Some(short) = &reg.short_name else {
            continue;
        };
        if let Some(owner) = aliases.get(short) {
            warn!(
                short_name = %short,
                module = %reg.module_name,
                owner = %owner,
                "duplicate short name in registry document; ignoring"
            );
            continue;
        }
        aliases.insert(short.clone(), reg.module_name.clone());
    }
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::schema::{ArgAction, ArgType, Command, CommandArg, Nargs};
    use serde_json::json;

    fn secret_manager() -> ModuleRegistration {
        ModuleRegistration::new("secret_manager")
            .short_name("sm")
            .description("Manage secrets")
            .command(
                Command::new("get", "Read a secret", "secret_manager:get")
                    .arg(CommandArg::new("key").help("Secret key")),
            )
    }

    fn memory_registry() -> Registry<MemoryStore> {
        Registry::open(MemoryStore::new()).unwrap()
    }

    #[test]
    fn register_then_lookup() {
        let mut reg = memory_registry();
        assert!(reg.register_module(secret_manager()));
        assert_eq!(reg.list_modules(), vec!["secret_manager".to_string()]);
        assert_eq!(reg.resolve_module_name("sm"), Some("secret_manager"));
        assert_eq!(reg.resolve_module_name("secret_manager"), Some("secret_manager"));
        assert_eq!(reg.resolve_module_name("nope"), None);
        assert_eq!(reg.get_registry()["secret_manager"]["short_name"], json!("sm"));
    }

    #[test]
    fn registering_twice_is_idempotent() {
        let mut reg = memory_registry();
        let first = reg.register(secret_manager()).unwrap();
        assert_eq!(first.outcome, RegisterOutcome::Inserted);
        let text_after_first = reg.store().text().unwrap().to_string();
        let snapshot = reg.get_registry();

        let second = reg.register(secret_manager()).unwrap();
        assert_eq!(second.outcome, RegisterOutcome::Unchanged);
        assert_eq!(reg.get_registry(), snapshot);
        assert_eq!(reg.store().text().unwrap(), text_after_first);
    }

    #[test]
    fn latest_registration_wins() {
        let mut reg = memory_registry();
        reg.register_module(secret_manager());
        let updated = secret_manager().description("Secrets, v2");
        let report = reg.register(updated).unwrap();
        assert_eq!(report.outcome, RegisterOutcome::Replaced);
        assert_eq!(reg.get("secret_manager").unwrap().description, "Secrets, v2");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn short_name_conflict_keeps_first_owner() {
        let mut reg = memory_registry();
        reg.register_module(secret_manager());

        let intruder = ModuleRegistration::new("service_monitor").short_name("sm");
        let report = reg.register(intruder.clone()).unwrap();
        assert_eq!(report.outcome, RegisterOutcome::Inserted);
        assert_eq!(
            report.conflict,
            Some(ConflictWarning {
                short_name: "sm".into(),
                module: "service_monitor".into(),
                owner: "secret_manager".into(),
            })
        );
        assert!(reg.register_module(intruder));
        assert_eq!(reg.resolve_module_name("sm"), Some("secret_manager"));
        assert_eq!(reg.get("service_monitor").unwrap().short_name, None);
    }

    #[test]
    fn short_name_equal_to_other_module_name_is_a_conflict() {
        let mut reg = memory_registry();
        reg.register_module(ModuleRegistration::new("db"));
        let report = reg
            .register(ModuleRegistration::new("database").short_name("db"))
            .unwrap();
        assert_eq!(report.conflict.map(|c| c.owner), Some("db".to_string()));
        assert_eq!(reg.resolve_module_name("db"), Some("db"));
    }

    #[test]
    fn module_name_equal_to_existing_alias_is_rejected() {
        let mut reg = memory_registry();
        reg.register_module(secret_manager());
        let err = reg.register(ModuleRegistration::new("sm")).unwrap_err();
        assert!(matches!(err, RegistryError::Ambiguous { .. }));
        assert!(!reg.register_module(ModuleRegistration::new("sm")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn re_registration_can_change_alias() {
        let mut reg = memory_registry();
        reg.register_module(secret_manager());
        reg.register_module(secret_manager().short_name("sec"));
        assert_eq!(reg.resolve_module_name("sm"), None);
        assert_eq!(reg.resolve_module_name("sec"), Some("secret_manager"));
    }

    #[test]
    fn empty_name_is_a_validation_failure() {
        let mut reg = memory_registry();
        assert!(!reg.register_module(ModuleRegistration::new("")));
        assert!(matches!(
            reg.register(ModuleRegistration::new("")),
            Err(RegistryError::Invalid(SchemaError::EmptyModuleName))
        ));
        assert!(reg.is_empty());
        assert_eq!(reg.store().saves(), 0);
    }

    #[test]
    fn unregister_unknown_leaves_registry_unchanged() {
        let mut reg = memory_registry();
        reg.register_module(secret_manager());
        let saves = reg.store().saves();
        assert!(!reg.unregister_module("nope"));
        assert_eq!(reg.list_modules(), vec!["secret_manager".to_string()]);
        assert_eq!(reg.store().saves(), saves);
    }

    #[test]
    fn unregister_removes_alias() {
        let mut reg = memory_registry();
        reg.register_module(secret_manager());
        assert!(reg.unregister_module("secret_manager"));
        assert!(reg.is_empty());
        assert_eq!(reg.resolve_module_name("sm"), None);
    }

    #[test]
    fn save_and_load_round_trip_with_every_field() {
        let full = ModuleRegistration::new("full")
            .short_name("fu")
            .description("Every field populated")
            .command(
                Command::new("run", "Run", "full:run")
                    .arg(CommandArg::new("target").help("Target").nargs(Nargs::Optional).default_value("all"))
                    .arg(
                        CommandArg::new("--count")
                            .help("How many")
                            .short("-c")
                            .arg_type(ArgType::Int)
                            .required(true)
                            .default_value(5)
                            .nargs(Nargs::OneOrMore)
                            .choices([1, 5, 10]),
                    )
                    .arg(CommandArg::new("--force").action(ArgAction::StoreTrue).default_value(false)),
            );
        let sparse = ModuleRegistration::new("sparse")
            .command(Command::new("noop", "", "sparse:noop"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");
        let mut reg = Registry::open_file(&path).unwrap();
        assert!(reg.register_module(full.clone()));
        assert!(reg.register_module(sparse.clone()));

        let reloaded = Registry::open_file(&path).unwrap();
        assert_eq!(reloaded.get("full"), Some(&full));
        assert_eq!(reloaded.get("sparse"), Some(&sparse));
        assert_eq!(reloaded.resolve_module_name("fu"), Some("full"));
        assert_eq!(reloaded.get_registry(), reg.get_registry());
    }

    #[test]
    fn short_name_equal_to_module_name_is_dropped() {
        let mut reg = memory_registry();
        let report = reg
            .register(
                ModuleRegistration::new("abc")
                    .short_name("abc")
                    .command(Command::new("run", "Run", "abc:run")),
            )
            .unwrap();
        assert_eq!(report.outcome, RegisterOutcome::Inserted);
        assert!(report.conflict.is_none());
        assert_eq!(reg.get("abc").unwrap().short_name, None);
        assert_eq!(reg.resolve_module_name("abc"), Some("abc"));

        crate::parser::build_parser(&reg, "admin", "Admin")
            .unwrap()
            .debug_assert();
    }

    #[test]
    fn open_file_creates_the_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data").join("cli_manager");
        let reg = Registry::open_file(data_dir.join("commands.json")).unwrap();
        assert!(reg.is_empty());
        assert!(data_dir.is_dir());
        assert!(!data_dir.join("commands.json").exists());
    }

    #[test]
    fn corrupt_document_refuses_to_open() {
        let err = Registry::open(MemoryStore::with_text("[1, 2")).unwrap_err();
        assert!(matches!(err, RegistryError::CorruptStore { .. }));
    }
}
