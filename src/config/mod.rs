/*!
Admin configuration.

YAML shape (every key optional):

  data_dir: data/cli_manager        # where the registry document lives
  registry_file: commands.json
  admin_cli:
    program_name: admin_cli
    description: Project Admin CLI
    output_dir: .
    filename: admin_cli

Sources, highest first:
  CLI_MANAGER_DATA    overrides `data_dir`
  CLI_MANAGER_CONFIG  path of the YAML file
  built-in defaults
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "CLI_MANAGER_CONFIG";
pub const DATA_DIR_ENV: &str = "CLI_MANAGER_DATA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub data_dir: PathBuf,
    pub registry_file: String,
    pub admin_cli: AdminCliConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCliConfig {
    pub program_name: String,
    pub description: String,
    pub output_dir: PathBuf,
    pub filename: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/cli_manager"),
            registry_file: "commands.json".to_string(),
            admin_cli: AdminCliConfig::default(),
        }
    }
}

impl Default for AdminCliConfig {
    fn default() -> Self {
        Self {
            program_name: "admin_cli".to_string(),
            description: "Project Admin CLI".to_string(),
            output_dir: PathBuf::from("."),
            filename: "admin_cli".to_string(),
        }
    }
}

impl AdminConfig {
    /// Resolve configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Resolve configuration using `lookup` for environment variables.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = match non_empty(CONFIG_ENV) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        if let Some(dir) = non_empty(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).context("invalid YAML configuration")
    }

    /// Location of the persisted registry document.
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(&self.registry_file)
    }

    /// Where the generated admin entry point is placed.
    pub fn admin_cli_path(&self) -> PathBuf {
        self.admin_cli.output_dir.join(&self.admin_cli.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let c = AdminConfig::default();
        assert_eq!(c.registry_path(), PathBuf::from("data/cli_manager/commands.json"));
        assert_eq!(c.admin_cli_path(), PathBuf::from("./admin_cli"));
        assert_eq!(c.admin_cli.description, "Project Admin CLI");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let c = AdminConfig::from_yaml_str("admin_cli:\n  filename: admin\n").unwrap();
        assert_eq!(c.admin_cli.filename, "admin");
        assert_eq!(c.admin_cli.program_name, "admin_cli");
        assert_eq!(c.registry_file, "commands.json");
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(AdminConfig::from_yaml_str("data_dir: [unclosed").is_err());
    }

    #[test]
    fn env_lookup_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cli.yaml");
        std::fs::write(&file, "data_dir: /from/file\nregistry_file: reg.json\n").unwrap();

        let env: HashMap<&str, String> =
            HashMap::from([(CONFIG_ENV, file.display().to_string())]);
        let c = AdminConfig::load_with(|k| env.get(k).cloned()).unwrap();
        assert_eq!(c.registry_path(), PathBuf::from("/from/file/reg.json"));

        let env: HashMap<&str, String> = HashMap::from([
            (CONFIG_ENV, file.display().to_string()),
            (DATA_DIR_ENV, "/override".to_string()),
        ]);
        let c = AdminConfig::load_with(|k| env.get(k).cloned()).unwrap();
        assert_eq!(c.registry_path(), PathBuf::from("/override/reg.json"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let c = AdminConfig::load_with(|k| (k == CONFIG_ENV).then(|| "/no/such/file.yaml".to_string()));
        assert!(c.is_err());
    }
}
