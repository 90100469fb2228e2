//! Loaded code units and the classes they define

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{KernelError, Result};
use crate::nodes::node::Node;
use crate::script::{self, ClassDef, ScriptError};

/// Constructor of a class implemented in Rust
pub type NativeConstructor = fn() -> Node;

#[derive(Clone)]
pub enum ClassKind {
    Script(Arc<ClassDef>),
    Native(NativeConstructor),
}

/// A node class bound in a code unit's namespace
#[derive(Clone)]
pub struct NodeClass {
    name: String,
    /// Text of the class definition, `None` for native classes
    source: Option<String>,
    kind: ClassKind,
}

impl NodeClass {
    pub fn native(name: impl Into<String>, constructor: NativeConstructor) -> Self {
        Self {
            name: name.into(),
            source: None,
            kind: ClassKind::Native(constructor),
        }
    }

    fn script(def: ClassDef, text: &str) -> Self {
        Self {
            name: def.name.clone(),
            source: text.get(def.span.clone()).map(str::to_string),
            kind: ClassKind::Script(Arc::new(def)),
        }
    }

    /// Name the class is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn kind(&self) -> &ClassKind {
        &self.kind
    }

    /// Create a fresh node of this class
    pub fn construct(&self) -> Result<Node> {
        match &self.kind {
            ClassKind::Script(def) => script::instantiate_class(def),
            ClassKind::Native(constructor) => Ok(constructor()),
        }
    }
}

impl fmt::Debug for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ClassKind::Script(_) => "script",
            ClassKind::Native(_) => "native",
        };
        f.debug_struct("NodeClass")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// A module: a namespace of classes plus the text it was loaded from.
///
/// Patching rebinds classes in a copy of the namespace and never touches the
/// persisted text, so class spans keep pointing into what is on disk.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    locator: String,
    path: Option<PathBuf>,
    text: Option<String>,
    classes: HashMap<String, Arc<NodeClass>>,
    spans: HashMap<String, Range<usize>>,
}

impl CodeUnit {
    /// Compile module text; `path` is where the text lives, if anywhere
    pub fn compile(
        locator: impl Into<String>,
        path: Option<PathBuf>,
        text: impl Into<String>,
    ) -> std::result::Result<Self, ScriptError> {
        let text = text.into();
        let defs = script::parse_module(&text)?;

        let mut classes = HashMap::with_capacity(defs.len());
        let mut spans = HashMap::with_capacity(defs.len());
        for def in defs {
            spans.insert(def.name.clone(), def.span.clone());
            classes.insert(def.name.clone(), Arc::new(NodeClass::script(def, &text)));
        }

        Ok(Self {
            locator: locator.into(),
            path,
            text: Some(text),
            classes,
            spans,
        })
    }

    /// Empty unit without source text, for classes implemented in Rust
    pub fn native(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            path: None,
            text: None,
            classes: HashMap::new(),
            spans: HashMap::new(),
        }
    }

    /// Bind a class, replacing any of the same name
    pub fn add_class(&mut self, class: NodeClass) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Physical file backing the unit
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Text as loaded, unaffected by patches
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Class currently bound to `name`
    pub fn class(&self, name: &str) -> Option<Arc<NodeClass>> {
        self.classes.get(name).cloned()
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Current source of a class, including live patches
    pub fn class_source(&self, name: &str) -> Option<&str> {
        self.classes.get(name).and_then(|class| class.source())
    }

    /// Definition of a class as it appears in the persisted text
    pub fn persisted_class_source(&self, name: &str) -> Option<&str> {
        let span = self.spans.get(name)?;
        self.text.as_deref()?.get(span.clone())
    }

    /// Compile `new_text` and merge its classes over this namespace.
    ///
    /// Classes not mentioned in `new_text` keep their current binding. The
    /// persisted text and spans are left alone.
    pub fn patch(&self, new_text: &str) -> Result<CodeUnit> {
        if self.text.is_none() {
            return Err(KernelError::SourcePatch(format!(
                "module '{}' has no source to patch",
                self.locator
            )));
        }

        let defs = script::parse_module(new_text)
            .map_err(|e| KernelError::SourcePatch(format!("{}: {}", self.locator, e)))?;

        let mut patched = self.clone();
        for def in defs {
            log::debug!("Rebinding class {} in module {}", def.name, self.locator);
            patched
                .classes
                .insert(def.name.clone(), Arc::new(NodeClass::script(def, new_text)));
        }
        Ok(patched)
    }

    /// Persisted text with the definition of `name` replaced by `new_source`
    pub fn replace_class_text(&self, name: &str, new_source: &str) -> Option<String> {
        let span = self.spans.get(name)?;
        let text = self.text.as_deref()?;
        let mut replaced = String::with_capacity(text.len() + new_source.len());
        replaced.push_str(text.get(..span.start)?);
        replaced.push_str(new_source);
        replaced.push_str(text.get(span.end..)?);
        Some(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::data::NodeData;

    const MODULE: &str = "# math\n\
        node Double { input a: int = 2  output r  compute { return a * 2 } }\n\
        \n\
        node Negate { input a: int  output r  compute { return -a } }\n";

    #[test]
    fn test_compile_records_sources() {
        let unit = CodeUnit::compile("math", None, MODULE).unwrap();
        assert_eq!(unit.class_names(), vec!["Double", "Negate"]);
        let source = unit.class_source("Negate").unwrap();
        assert!(source.starts_with("node Negate"));
        assert_eq!(unit.persisted_class_source("Negate"), Some(source));
    }

    #[test]
    fn test_compile_error_reports_line() {
        let err = CodeUnit::compile("bad", None, "\n\nnode X { input }").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_patch_merges_namespace() {
        let unit = CodeUnit::compile("math", None, MODULE).unwrap();
        let old = unit.class("Double").unwrap();

        let patched = unit
            .patch("node Double { input a: int = 2  output r  compute { return a * 3 } }")
            .unwrap();

        let mut node = patched.class("Double").unwrap().construct().unwrap();
        node.eval().unwrap();
        assert_eq!(node.get_output(0).unwrap(), &NodeData::Int(6));

        // untouched classes and the unpatched unit survive
        assert!(patched.class("Negate").is_some());
        let mut node = old.construct().unwrap();
        node.eval().unwrap();
        assert_eq!(node.get_output(0).unwrap(), &NodeData::Int(4));

        // persisted view is unchanged
        assert_eq!(
            patched.persisted_class_source("Double"),
            unit.persisted_class_source("Double")
        );
        assert_ne!(patched.class_source("Double"), unit.class_source("Double"));
    }

    #[test]
    fn test_patch_rejects_bad_text() {
        let unit = CodeUnit::compile("math", None, MODULE).unwrap();
        assert!(matches!(unit.patch("node {"), Err(KernelError::SourcePatch(_))));
        assert!(matches!(
            CodeUnit::native("rust").patch("node A {}"),
            Err(KernelError::SourcePatch(_))
        ));
    }

    #[test]
    fn test_replace_class_text() {
        let unit = CodeUnit::compile("math", None, MODULE).unwrap();
        let replaced = unit
            .replace_class_text("Negate", "node Negate { input a  output r  compute { return a } }")
            .unwrap();
        assert!(replaced.starts_with("# math\nnode Double"));
        assert!(replaced.ends_with("compute { return a } }\n"));
        assert!(CodeUnit::compile("math", None, replaced).is_ok());
        assert!(unit.replace_class_text("Missing", "").is_none());
    }

    #[test]
    fn test_native_class() {
        let mut unit = CodeUnit::native("rust");
        unit.add_class(NodeClass::native("Empty", || Node::new("Empty")));
        let class = unit.class("Empty").unwrap();
        assert!(class.source().is_none());
        assert_eq!(class.construct().unwrap().caption(), "Empty");
        assert!(unit.class_source("Empty").is_none());
    }
}
