/*!
Persistence backends for the registry document.

The document is a single JSON object keyed by module name; each value is a
full `ModuleRegistration` (commands and args inlined), so it can be read back
without any migration step.

  JsonFileStore  on-disk document, replaced atomically (temp file + rename)
  MemoryStore    in-process document text, used by tests and embedders
*/

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RegistryError;
use crate::schema::ModuleRegistration;

/// In-memory form of the persisted document, sorted by module name.
pub type Document = BTreeMap<String, ModuleRegistration>;

/// Write-through storage for the registry document.
pub trait DocumentStore {
    /// Load the document. Missing or empty storage yields an empty document;
    /// unparseable content is a `CorruptStore` error.
    fn load(&self) -> Result<Document, RegistryError>;

    /// Replace the whole document. Readers never observe a partial write.
    fn save(&mut self, document: &Document) -> Result<(), RegistryError>;

    /// Human-readable location for diagnostics.
    fn location(&self) -> String;
}

/// Parse document text, tolerating empty input.
pub fn parse_document(text: &str, location: &str) -> Result<Document, RegistryError> {
    if text.trim().is_empty() {
        return Ok(Document::new());
    }
    let document: Document =
        serde_json::from_str(text).map_err(|e| RegistryError::CorruptStore {
            location: location.to_string(),
            reason: e.to_string(),
        })?;

    for (key, reg) in &document {
        if key != &reg.module_name {
            return Err(RegistryError::CorruptStore {
                location: location.to_string(),
                reason: format!(
                    "entry '{key}' holds module '{}'",
                    reg.module_name
                ),
            });
        }
    }
    Ok(document)
}

/// Serialize the document the way it is written to disk.
pub fn render_document(document: &Document) -> String {
    let mut text = serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".to_string());
    text.push('\n');
    text
}

/* ---- File store ---- */

/// Document persisted as a JSON file (`commands.json`).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory holding the document if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<PathBuf, RegistryError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;
        Ok(dir)
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Store {
            location: self.location(),
            source,
        }
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Document, RegistryError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "registry document missing; starting empty");
                return Ok(Document::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        parse_document(&text, &self.location())
    }

    fn save(&mut self, document: &Document) -> Result<(), RegistryError> {
        let dir = self.ensure_dir()?;

        // Same directory as the target so the rename never crosses filesystems.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(render_document(document).as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), modules = document.len(), "registry saved");
        Ok(())
    }

    fn location(&self) -> String {
        format!("'{}'", self.path.display())
    }
}

/* ---- Memory store ---- */

/// Document kept as JSON text in memory. Goes through the same serde path as
/// the file store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    text: Option<String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-existing document text (which may be corrupt).
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            saves: 0,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Number of completed saves.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Result<Document, RegistryError> {
        match &self.text {
            Some(text) => parse_document(text, &self.location()),
            None => Ok(Document::new()),
        }
    }

    fn save(&mut self, document: &Document) -> Result<(), RegistryError> {
        self.text = Some(render_document(document));
        self.saves += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
