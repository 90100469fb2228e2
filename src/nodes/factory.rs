//! Node factories: metadata plus a code locator that produces node instances
//!
//! A factory resolves its module lazily and keeps the resulting [`CodeUnit`]
//! cached until the source is rewritten. Source edits come in two strengths:
//! [`NodeFactory::apply_new_source`] rebinds the class in the cached unit
//! only, [`NodeFactory::save_new_source`] additionally writes the module file
//! back and drops the cache so the next access reloads from disk.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

use super::node::Node;
use super::widget::{NodeWidget, WidgetCatalog};
use crate::code::{CodeUnit, FileResolver, ModuleResolver};
use crate::config::KernelConfig;
use crate::constants;
use crate::error::{KernelError, Result};
use crate::observer::{Listener, ListenerId, Observers};

/// Hierarchical category such as `Math/Arithmetic`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeCategory {
    path: Vec<String>,
}

impl NodeCategory {
    /// Category from path segments, outermost first
    pub fn new(path: &[&str]) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Last path component
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl From<&str> for NodeCategory {
    fn from(text: &str) -> Self {
        Self {
            path: text
                .split('/')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl From<String> for NodeCategory {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

impl From<NodeCategory> for String {
    fn from(category: NodeCategory) -> Self {
        category.to_string()
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("/"))
    }
}

/// Events emitted by a factory to its listeners
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryEvent {
    ModuleLoaded { locator: String },
    SourcePatched,
    SourceSaved { path: PathBuf },
    ModuleInvalidated,
}

/// Serialisable declaration of a factory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryDescriptor {
    pub name: String,
    pub description: String,
    pub category: NodeCategory,
    pub node_module: Option<String>,
    pub node_class: Option<String>,
    pub widget_module: Option<String>,
    pub widget_class: Option<String>,
}

/// Metadata and code locator able to produce nodes of one class
pub struct NodeFactory {
    uuid: Uuid,
    name: String,
    description: String,
    category: NodeCategory,
    node_module: Option<String>,
    node_class: Option<String>,
    widget_module: Option<String>,
    widget_class: Option<String>,
    package: Mutex<Option<String>>,
    resolver: Arc<dyn ModuleResolver>,
    /// Cached module; one lock serialises resolve, patch, save and instantiate
    module: Mutex<Option<Arc<CodeUnit>>>,
    observers: Observers<FactoryEvent>,
    self_ref: Weak<NodeFactory>,
}

impl NodeFactory {
    /// Start a factory named `name` whose modules come from `resolver`
    pub fn new(name: impl Into<String>, resolver: Arc<dyn ModuleResolver>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            category: NodeCategory::default(),
            node_module: None,
            node_class: None,
            widget_module: None,
            widget_class: None,
            package: Mutex::new(None),
            resolver,
            module: Mutex::new(None),
            observers: Observers::new(),
            self_ref: Weak::new(),
        }
    }

    /// Rebuild a factory from its serialized descriptor
    pub fn from_descriptor(descriptor: FactoryDescriptor, resolver: Arc<dyn ModuleResolver>) -> Self {
        let mut factory = Self::new(descriptor.name, resolver)
            .with_description(descriptor.description)
            .with_category(descriptor.category);
        factory.node_module = descriptor.node_module;
        factory.node_class = descriptor.node_class;
        factory.widget_module = descriptor.widget_module;
        factory.widget_class = descriptor.widget_class;
        factory
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Category path, either a `NodeCategory` or a `/` separated string
    pub fn with_category(mut self, category: impl Into<NodeCategory>) -> Self {
        self.category = category.into();
        self
    }

    /// Module and class the factory instantiates
    pub fn with_node_module(mut self, locator: impl Into<String>, class: impl Into<String>) -> Self {
        self.node_module = Some(locator.into());
        self.node_class = Some(class.into());
        self
    }

    /// Widget class to build editors with; the locator defaults to the node module
    pub fn with_widget(mut self, locator: Option<String>, class: impl Into<String>) -> Self {
        self.widget_module = locator;
        self.widget_class = Some(class.into());
        self
    }

    /// Finish construction. Nodes created through the returned factory can
    /// reach it back through [`Node::factory`].
    pub fn build(self) -> Arc<NodeFactory> {
        Arc::new_cyclic(|weak| NodeFactory {
            self_ref: weak.clone(),
            ..self
        })
    }

    /// Factory generating its own module at `<user_node_dir>/<name>.node`
    ///
    /// The boilerplate module is only written when the file does not exist
    /// yet, so earlier edits survive a restart.
    pub fn user(name: &str, config: &KernelConfig) -> Result<Arc<NodeFactory>> {
        if !is_identifier(name) {
            return Err(KernelError::InvalidName(name.to_string()));
        }

        let path = config
            .user_node_dir
            .join(format!("{}.{}", name, config.module_extension));
        if !path.exists() {
            std::fs::create_dir_all(&config.user_node_dir)
                .map_err(|e| KernelError::persist(Some(config.user_node_dir.clone()), e))?;
            write_atomic(&path, &constants::user_template::module_text(name))
                .map_err(|e| KernelError::persist(Some(path.clone()), e))?;
            info!("Created user node module {}", path.display());
        }

        let resolver = Arc::new(FileResolver::new(path));
        Ok(NodeFactory::new(name, resolver)
            .with_description("User defined node")
            .with_node_module(name, name)
            .build())
    }

    // Identity

    /// Unique id within a package, the factory name
    pub fn id(&self) -> &str {
        &self.name
    }

    /// Name the factory is registered under in its package
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender id of emitted events
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Free text description, empty when none was given
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &NodeCategory {
        &self.category
    }

    /// Locator of the module holding the node class
    pub fn node_module_locator(&self) -> Option<&str> {
        self.node_module.as_deref()
    }

    /// Name of the node class inside the module
    pub fn node_class_name(&self) -> Option<&str> {
        self.node_class.as_deref()
    }

    /// Name of the package this factory was registered in
    pub fn package(&self) -> Option<String> {
        lock(&self.package).clone()
    }

    pub(crate) fn set_package(&self, package: &str) {
        *lock(&self.package) = Some(package.to_string());
    }

    /// Short human readable summary
    pub fn tip(&self) -> String {
        let mut tip = format!("Name : {}", self.name);
        if !self.category.is_empty() {
            tip.push_str(&format!("\nCategory : {}", self.category));
        }
        if !self.description.is_empty() {
            tip.push_str(&format!("\nDescription : {}", self.description));
        }
        tip
    }

    /// Serializable snapshot of the factory settings
    pub fn descriptor(&self) -> FactoryDescriptor {
        FactoryDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            node_module: self.node_module.clone(),
            node_class: self.node_class.clone(),
            widget_module: self.widget_module.clone(),
            widget_class: self.widget_class.clone(),
        }
    }

    /// Descriptor as pretty printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.descriptor())?)
    }

    // Observation

    /// Register a listener for factory events
    pub fn subscribe(&self, listener: Arc<dyn Listener<FactoryEvent>>) -> ListenerId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn notify(&self, event: FactoryEvent) {
        self.observers.notify(self.uuid, &event);
    }

    // Instantiation

    /// Create a node of the configured class
    pub fn instantiate(&self) -> Result<Node> {
        self.instantiate_with(&[])
    }

    /// Create a node; `call_stack` lists ids of factories already being
    /// instantiated further up
    pub fn instantiate_with(&self, call_stack: &[String]) -> Result<Node> {
        if call_stack.iter().any(|id| id == self.id()) {
            return Err(KernelError::Recursion(format!(
                "{} -> {}",
                call_stack.join(" -> "),
                self.id()
            )));
        }

        let class_name = self.class_name()?;
        let (unit, loaded) = {
            let mut cache = lock(&self.module);
            self.cached_module(&mut cache)?
        };
        if loaded {
            self.notify_loaded(&unit);
        }

        let class = unit.class(class_name).ok_or_else(|| KernelError::ClassNotFound {
            module: unit.locator().to_string(),
            class: class_name.to_string(),
        })?;
        let mut node = class.construct()?;
        node.set_factory(self.self_ref.clone());
        debug!("Factory {} instantiated node {}", self.name, node.id());
        Ok(node)
    }

    /// Build an editor widget for `node` from `catalog`
    pub fn instantiate_widget(
        &self,
        node: &mut Node,
        parent: Option<&dyn Any>,
        edit: bool,
        catalog: &WidgetCatalog,
    ) -> Result<Arc<dyn NodeWidget>> {
        let constructor = match &self.widget_class {
            Some(class) => {
                let module = self
                    .widget_module
                    .as_deref()
                    .or(self.node_module.as_deref())
                    .ok_or_else(|| {
                        KernelError::WidgetUnavailable(format!(
                            "factory {} has no module for widget {}",
                            self.name, class
                        ))
                    })?;
                catalog.lookup(module, class)?
            }
            None => catalog.default_constructor()?,
        };
        Ok(constructor(node, parent, edit))
    }

    // Module access

    /// The cached module, resolving it first if needed
    pub fn get_node_module(&self) -> Result<Arc<CodeUnit>> {
        let (unit, loaded) = {
            let mut cache = lock(&self.module);
            self.cached_module(&mut cache)?
        };
        if loaded {
            self.notify_loaded(&unit);
        }
        Ok(unit)
    }

    /// Current source of the node class, `None` when unavailable
    pub fn get_node_source(&self) -> Option<String> {
        let class = self.node_class.as_deref()?;
        match self.get_node_module() {
            Ok(unit) => unit.class_source(class).map(str::to_string),
            Err(e) => {
                debug!("No source for factory {}: {}", self.name, e);
                None
            }
        }
    }

    /// Rebind classes defined in `new_source` in the cached module
    pub fn apply_new_source(&self, new_source: &str) -> Result<()> {
        let loaded = {
            let mut cache = lock(&self.module);
            let (unit, loaded) = self.cached_module(&mut cache)?;
            *cache = Some(Arc::new(unit.patch(new_source)?));
            loaded.then_some(unit)
        };
        if let Some(unit) = loaded {
            self.notify_loaded(&unit);
        }
        info!("Applied new source to factory {}", self.name);
        self.notify(FactoryEvent::SourcePatched);
        Ok(())
    }

    /// Apply `new_source`, then write it into the module file in place of the
    /// persisted class definition. Returns whether the file was written.
    ///
    /// `new_source` must define the factory's class, and the rewritten module
    /// must compile. Any failure leaves both the file and the cache as they
    /// were.
    pub fn save_new_source(&self, new_source: &str) -> Result<bool> {
        let class_name = self.class_name()?;

        let path = {
            let mut cache = lock(&self.module);
            let (unit, _) = self.cached_module(&mut cache)?;
            let patched = unit.patch(new_source)?;

            let redefined = match (unit.class(class_name), patched.class(class_name)) {
                (Some(old), Some(new)) => !Arc::ptr_eq(&old, &new),
                (None, Some(_)) => true,
                _ => false,
            };
            if !redefined {
                return Err(KernelError::SourcePatch(format!(
                    "new source does not define class {}",
                    class_name
                )));
            }

            if unit.persisted_class_source(class_name) == Some(new_source) {
                debug!("Source of {} unchanged, nothing written", self.name);
                *cache = Some(Arc::new(patched));
                drop(cache);
                self.notify(FactoryEvent::SourcePatched);
                return Ok(false);
            }

            let path = unit
                .path()
                .map(Path::to_path_buf)
                .ok_or_else(|| KernelError::persist(None, "module has no physical path"))?;
            let text = unit.replace_class_text(class_name, new_source).ok_or_else(|| {
                KernelError::persist(
                    Some(path.clone()),
                    format!("class {} has no persisted definition", class_name),
                )
            })?;

            if let Err(e) = CodeUnit::compile(unit.locator(), Some(path.clone()), text.as_str()) {
                warn!("Refusing to save {}: {}", path.display(), e);
                return Err(KernelError::SourcePatch(format!(
                    "module {} would not compile: {}",
                    unit.locator(),
                    e
                )));
            }

            write_atomic(&path, &text).map_err(|e| KernelError::persist(Some(path.clone()), e))?;
            *cache = None;
            path
        };

        info!("Saved source of factory {} to {}", self.name, path.display());
        self.notify(FactoryEvent::SourcePatched);
        self.notify(FactoryEvent::SourceSaved { path });
        self.notify(FactoryEvent::ModuleInvalidated);
        Ok(true)
    }

    /// Drop the cached module so the next access resolves it again
    pub fn invalidate_module(&self) {
        let had_module = lock(&self.module).take().is_some();
        if had_module {
            debug!("Invalidated module cache of factory {}", self.name);
            self.notify(FactoryEvent::ModuleInvalidated);
        }
    }

    /// Whether a module is cached, patched or not
    pub fn is_module_loaded(&self) -> bool {
        lock(&self.module).is_some()
    }

    fn class_name(&self) -> Result<&str> {
        self.node_class.as_deref().ok_or_else(|| KernelError::ClassNotFound {
            module: self.node_module.clone().unwrap_or_default(),
            class: String::new(),
        })
    }

    /// Returns the cached unit and whether it was resolved by this call
    fn cached_module(&self, cache: &mut Option<Arc<CodeUnit>>) -> Result<(Arc<CodeUnit>, bool)> {
        if let Some(unit) = cache.as_ref() {
            return Ok((Arc::clone(unit), false));
        }

        let locator = self
            .node_module
            .as_deref()
            .ok_or_else(|| KernelError::ModuleResolution {
                locator: String::new(),
                reason: format!("factory {} has no module locator", self.name),
            })?;
        let unit = Arc::new(self.resolver.resolve(locator)?);
        *cache = Some(Arc::clone(&unit));
        Ok((unit, true))
    }

    fn notify_loaded(&self, unit: &CodeUnit) {
        debug!("Factory {} loaded module {}", self.name, unit.locator());
        self.notify(FactoryEvent::ModuleLoaded {
            locator: unit.locator().to_string(),
        });
    }
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFactory")
            .field("name", &self.name)
            .field("category", &self.category.to_string())
            .field("node_module", &self.node_module)
            .field("node_class", &self.node_class)
            .field("loaded", &self.is_module_loaded())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Replace `path` with `text` through a temporary file in the same directory
fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    if let Ok(metadata) = std::fs::metadata(path) {
        file.as_file().set_permissions(metadata.permissions())?;
    }
    file.write_all(text.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
