//! Packages: named registries of node factories

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::factory::NodeFactory;
use crate::error::{KernelError, Result};

/// Descriptive metadata of a package; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetaInfo {
    pub license: Option<String>,
    pub version: Option<String>,
    pub authors: Option<String>,
    pub institutes: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub publication: Option<String>,
}

impl PackageMetaInfo {
    /// Value of a recognised key, `None` for unknown or unset keys
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "license" => &self.license,
            "version" => &self.version,
            "authors" => &self.authors,
            "institutes" => &self.institutes,
            "url" => &self.url,
            "description" => &self.description,
            "publication" => &self.publication,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Factories keyed by name, plus package metadata
#[derive(Debug)]
pub struct Package {
    name: String,
    metainfo: PackageMetaInfo,
    factories: BTreeMap<String, Arc<NodeFactory>>,
}

impl Package {
    /// Empty package; its id is its name
    pub fn new(name: impl Into<String>, metainfo: PackageMetaInfo) -> Self {
        Self {
            name: name.into(),
            metainfo,
            factories: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptive fields of the package
    pub fn metainfo(&self) -> &PackageMetaInfo {
        &self.metainfo
    }

    /// Metadata value, empty for unknown or unset keys
    pub fn get_metainfo(&self, key: &str) -> &str {
        self.metainfo.get(key).unwrap_or("")
    }

    pub fn tip(&self) -> String {
        let mut tip = format!("Package : {}\n", self.name);
        for (label, value) in [
            ("Description", &self.metainfo.description),
            ("Institutes", &self.metainfo.institutes),
            ("URL", &self.metainfo.url),
        ] {
            if let Some(value) = value {
                tip.push_str(&format!("{} : {}\n", label, value));
            }
        }
        tip
    }

    /// Register `factory` under its name and record this package as its owner.
    ///
    /// A name already taken keeps its existing factory; the collision is
    /// logged and `false` returned.
    pub fn add_factory(&mut self, factory: Arc<NodeFactory>) -> bool {
        if self.factories.contains_key(factory.name()) {
            warn!(
                "Factory {} already defined in package {}. Ignored",
                factory.name(),
                self.name
            );
            return false;
        }

        factory.set_package(&self.name);
        debug!("Package {} registered factory {}", self.name, factory.name());
        self.factories.insert(factory.name().to_string(), factory);
        true
    }

    pub fn get_factory(&self, id: &str) -> Result<Arc<NodeFactory>> {
        self.factories
            .get(id)
            .cloned()
            .ok_or_else(|| KernelError::UnknownNode(format!("{} in package {}", id, self.name)))
    }

    /// Names of the registered factories, sorted
    pub fn get_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Registered factories
    pub fn factories(&self) -> impl Iterator<Item = &Arc<NodeFactory>> {
        self.factories.values()
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ModuleLoader;

    fn factory(name: &str, description: &str) -> Arc<NodeFactory> {
        NodeFactory::new(name, Arc::new(ModuleLoader::default()))
            .with_description(description)
            .build()
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut package = Package::new("math", PackageMetaInfo::default());
        assert!(package.add_factory(factory("Add", "first")));
        assert!(!package.add_factory(factory("Add", "second")));

        assert_eq!(package.len(), 1);
        assert_eq!(package.get_factory("Add").unwrap().description(), "first");
    }

    #[test]
    fn test_add_records_owner() {
        let mut package = Package::new("math", PackageMetaInfo::default());
        let add = factory("Add", "");
        package.add_factory(add.clone());
        assert_eq!(add.package().as_deref(), Some("math"));

        let rejected = factory("Add", "");
        package.add_factory(rejected.clone());
        assert_eq!(rejected.package(), None);
    }

    #[test]
    fn test_unknown_factory() {
        let package = Package::new("math", PackageMetaInfo::default());
        assert!(package.is_empty());
        assert!(matches!(
            package.get_factory("Missing"),
            Err(KernelError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_names() {
        let mut package = Package::new("math", PackageMetaInfo::default());
        package.add_factory(factory("Sub", ""));
        package.add_factory(factory("Add", ""));
        assert_eq!(package.get_names(), vec!["Add", "Sub"]);
        assert_eq!(package.factories().count(), 2);
    }

    #[test]
    fn test_metainfo() {
        let metainfo = PackageMetaInfo {
            license: Some("CeCILL-C".into()),
            url: Some("https://example.org".into()),
            ..Default::default()
        };
        let package = Package::new("math", metainfo);
        assert_eq!(package.get_metainfo("license"), "CeCILL-C");
        assert_eq!(package.get_metainfo("authors"), "");
        assert_eq!(package.get_metainfo("no such key"), "");
        assert_eq!(package.tip(), "Package : math\nURL : https://example.org\n");
    }

    #[test]
    fn test_metainfo_from_json() {
        let metainfo: PackageMetaInfo =
            serde_json::from_str(r#"{ "version": "0.1", "authors": "A. Author" }"#).unwrap();
        assert_eq!(metainfo.get("version"), Some("0.1"));
        assert_eq!(metainfo.get("publication"), None);
    }
}
