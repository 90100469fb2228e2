//! Resolving module locators to code units
//!
//! Script modules live in `<search dir>/<locator>.node`, with dots in the
//! locator mapping to subdirectories. Rust-implemented classes are registered
//! on the loader under a locator of their own and shadow files with the same
//! locator.

use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::unit::{CodeUnit, NativeConstructor, NodeClass};
use crate::config::KernelConfig;
use crate::constants;
use crate::error::{KernelError, Result};

/// Maps a module locator to a freshly loaded code unit
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, locator: &str) -> Result<CodeUnit>;
}

/// Read and compile a module file
pub fn load_file(locator: &str, path: &Path) -> Result<CodeUnit> {
    let text = std::fs::read_to_string(path).map_err(|e| KernelError::ModuleResolution {
        locator: locator.to_string(),
        reason: format!("cannot read {}: {}", path.display(), e),
    })?;
    CodeUnit::compile(locator, Some(path.to_path_buf()), text).map_err(|e| {
        KernelError::ModuleResolution {
            locator: locator.to_string(),
            reason: format!("{}: {}", path.display(), e),
        }
    })
}

/// Search-path based resolver
#[derive(Debug)]
pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    extension: String,
    native: HashMap<String, Vec<(String, NativeConstructor)>>,
}

impl ModuleLoader {
    /// Loader searching `search_paths` in order
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            extension: constants::MODULE_EXTENSION.to_string(),
            native: HashMap::new(),
        }
    }

    /// Loader over the configured search paths and module extension
    pub fn from_config(config: &KernelConfig) -> Self {
        let mut loader = Self::new(config.search_paths.clone());
        loader.extension = config.module_extension.clone();
        loader
    }

    /// Append a directory, searched after the existing ones
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Make a Rust-implemented class available as `locator`.`class`
    pub fn register_native(
        &mut self,
        locator: impl Into<String>,
        class: impl Into<String>,
        constructor: NativeConstructor,
    ) {
        let locator = locator.into();
        let class = class.into();
        debug!("Registered native class {}.{}", locator, class);
        let classes = self.native.entry(locator).or_default();
        classes.retain(|(name, _)| *name != class);
        classes.push((class, constructor));
    }

    /// Candidate file for `locator` under `dir`
    fn module_path(&self, dir: &Path, locator: &str) -> PathBuf {
        let mut path = dir.to_path_buf();
        for part in locator.split('.') {
            path.push(part);
        }
        path.set_extension(&self.extension);
        path
    }

    fn validate_locator(locator: &str) -> Result<()> {
        let valid = !locator.is_empty()
            && locator.split('.').all(|part| {
                !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
            });
        if valid {
            Ok(())
        } else {
            Err(KernelError::ModuleResolution {
                locator: locator.to_string(),
                reason: "malformed module locator".to_string(),
            })
        }
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModuleResolver for ModuleLoader {
    fn resolve(&self, locator: &str) -> Result<CodeUnit> {
        if let Some(classes) = self.native.get(locator) {
            let mut unit = CodeUnit::native(locator);
            for (name, constructor) in classes {
                unit.add_class(NodeClass::native(name.clone(), *constructor));
            }
            return Ok(unit);
        }

        Self::validate_locator(locator)?;

        for dir in &self.search_paths {
            let path = self.module_path(dir, locator);
            if path.is_file() {
                debug!("Loading module {} from {}", locator, path.display());
                return load_file(locator, &path);
            }
        }

        warn!(
            "Module {} not found in {} search path(s)",
            locator,
            self.search_paths.len()
        );
        Err(KernelError::ModuleResolution {
            locator: locator.to_string(),
            reason: format!("not found in search paths {:?}", self.search_paths),
        })
    }
}

/// Resolver bound to a single file, whatever locator is asked for
#[derive(Debug, Clone)]
pub struct FileResolver {
    path: PathBuf,
}

impl FileResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleResolver for FileResolver {
    fn resolve(&self, locator: &str) -> Result<CodeUnit> {
        load_file(locator, &self.path)
    }
}
