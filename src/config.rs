//! Kernel configuration
//!
//! Where node modules are looked up and where user factories write their
//! generated modules. Loaded from JSON; every field is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{KernelError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Directories searched, in order, for `<locator>.node` files
    pub search_paths: Vec<PathBuf>,
    /// Directory user factories generate their modules into
    pub user_node_dir: PathBuf,
    /// Extension of module files, without the dot
    pub module_extension: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        let home = dirs::home_dir()
            .map(|home| home.join(constants::dirs::HOME_SUBDIR))
            .unwrap_or_else(|| PathBuf::from(constants::dirs::HOME_SUBDIR));

        Self {
            search_paths: vec![home.join(constants::dirs::MODULES_SUBDIR)],
            user_node_dir: home.join(constants::dirs::USER_NODES_SUBDIR),
            module_extension: constants::MODULE_EXTENSION.to_string(),
        }
    }
}

impl KernelConfig {
    /// Configuration rooted at `root` instead of the home directory
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            search_paths: vec![root.join(constants::dirs::MODULES_SUBDIR)],
            user_node_dir: root.join(constants::dirs::USER_NODES_SUBDIR),
            module_extension: constants::MODULE_EXTENSION.to_string(),
        }
    }

    /// Parse a configuration; missing fields take their defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            KernelError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        log::debug!("Loading kernel configuration from {}", path.display());
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.module_extension.is_empty() || self.module_extension.contains('.') {
            return Err(KernelError::Config(format!(
                "invalid module extension '{}'",
                self.module_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = KernelConfig::default();
        assert_eq!(config.module_extension, "node");
        assert!(config.user_node_dir.ends_with(".nodle/user_nodes"));
        assert_eq!(config.search_paths.len(), 1);
    }

    #[test]
    fn test_partial_json() {
        let config = KernelConfig::from_json_str(r#"{ "search_paths": ["/a", "/b"] }"#).unwrap();
        assert_eq!(config.search_paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(config.module_extension, "node");
    }

    #[test]
    fn test_rejects_bad_extension() {
        let result = KernelConfig::from_json_str(r#"{ "module_extension": ".node" }"#);
        assert!(matches!(result, Err(KernelError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.json");
        std::fs::write(&path, r#"{ "user_node_dir": "/tmp/user" }"#).unwrap();
        let config = KernelConfig::from_json_file(&path).unwrap();
        assert_eq!(config.user_node_dir, PathBuf::from("/tmp/user"));

        let missing = KernelConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(KernelError::Config(_))));
    }
}
