//! Widget seam between nodes and whatever front end displays them
//!
//! The kernel never draws anything. A front end registers widget
//! constructors in a [`WidgetCatalog`] keyed the same way node classes are,
//! by module locator and class name, plus an optional fallback used when a
//! factory names no widget class.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::node::{Node, NodeEvent};
use crate::error::{KernelError, Result};
use crate::observer::Listener;

/// A view bound to one node, notified of that node's events
pub trait NodeWidget: Listener<NodeEvent> {
    /// Id of the node this widget displays
    fn node_id(&self) -> Uuid;

    /// Whether the widget has any editable content
    fn is_empty(&self) -> bool {
        false
    }
}

/// Builds a widget for `node` under an optional front-end `parent`
pub type WidgetConstructor =
    Arc<dyn Fn(&mut Node, Option<&dyn Any>, bool) -> Arc<dyn NodeWidget> + Send + Sync>;

/// Wrap a typed builder so the widget gets subscribed to its node
fn subscribing<W, F>(build: F) -> WidgetConstructor
where
    W: NodeWidget + 'static,
    F: Fn(&Node, Option<&dyn Any>, bool) -> W + Send + Sync + 'static,
{
    Arc::new(
        move |node: &mut Node, parent: Option<&dyn Any>, edit: bool| -> Arc<dyn NodeWidget> {
            let widget: Arc<W> = Arc::new(build(node, parent, edit));
            node.subscribe(widget.clone());
            widget
        },
    )
}

#[derive(Default)]
pub struct WidgetCatalog {
    classes: HashMap<(String, String), WidgetConstructor>,
    default: Option<WidgetConstructor>,
}

impl WidgetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<W, F>(&mut self, module: impl Into<String>, class: impl Into<String>, build: F)
    where
        W: NodeWidget + 'static,
        F: Fn(&Node, Option<&dyn Any>, bool) -> W + Send + Sync + 'static,
    {
        self.classes
            .insert((module.into(), class.into()), subscribing(build));
    }

    /// Fallback used for factories without a widget class
    pub fn set_default<W, F>(&mut self, build: F)
    where
        W: NodeWidget + 'static,
        F: Fn(&Node, Option<&dyn Any>, bool) -> W + Send + Sync + 'static,
    {
        self.default = Some(subscribing(build));
    }

    /// Whether a fallback widget is configured
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Constructor registered as `module`.`class`
    pub fn lookup(&self, module: &str, class: &str) -> Result<WidgetConstructor> {
        if !self.classes.keys().any(|(m, _)| m == module) {
            return Err(KernelError::ModuleResolution {
                locator: module.to_string(),
                reason: "no widgets registered for this module".to_string(),
            });
        }
        self.classes
            .get(&(module.to_string(), class.to_string()))
            .cloned()
            .ok_or_else(|| KernelError::ClassNotFound {
                module: module.to_string(),
                class: class.to_string(),
            })
    }

    /// Fallback constructor, `WidgetUnavailable` when none is set
    pub fn default_constructor(&self) -> Result<WidgetConstructor> {
        self.default
            .clone()
            .ok_or_else(|| KernelError::WidgetUnavailable("no default widget registered".to_string()))
    }
}

impl fmt::Debug for WidgetCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .classes
            .keys()
            .map(|(module, class)| format!("{}.{}", module, class))
            .collect();
        keys.sort();
        f.debug_struct("WidgetCatalog")
            .field("classes", &keys)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Widget recording every event of its node into a shared log
    pub(crate) struct RecordingWidget {
        pub node: Uuid,
        pub edit: bool,
        pub events: Arc<Mutex<Vec<NodeEvent>>>,
    }

    impl RecordingWidget {
        pub fn build(node: &Node, _parent: Option<&dyn Any>, edit: bool) -> Self {
            Self {
                node: node.id(),
                edit,
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Listener<NodeEvent> for RecordingWidget {
        fn on_event(&self, _sender: Uuid, event: &NodeEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl NodeWidget for RecordingWidget {
        fn node_id(&self) -> Uuid {
            self.node
        }
    }

    #[test]
    fn test_registered_widget_follows_node() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut catalog = WidgetCatalog::new();
        catalog.register("views", "Recorder", move |node: &Node, _parent: Option<&dyn Any>, edit: bool| {
            assert!(edit);
            RecordingWidget {
                node: node.id(),
                edit,
                events: sink.clone(),
            }
        });

        let mut node = Node::new("Watched");
        let build = catalog.lookup("views", "Recorder").unwrap();
        let widget = build(&mut node, None, true);
        assert_eq!(widget.node_id(), node.id());
        assert!(!widget.is_empty());

        node.set_caption("Renamed");
        assert_eq!(*events.lock().unwrap(), vec![NodeEvent::CaptionModified]);
    }

    #[test]
    fn test_lookup_failures() {
        let mut catalog = WidgetCatalog::new();
        catalog.register("views", "Recorder", RecordingWidget::build);

        assert!(matches!(
            catalog.lookup("other", "Recorder"),
            Err(KernelError::ModuleResolution { .. })
        ));
        assert!(matches!(
            catalog.lookup("views", "Missing"),
            Err(KernelError::ClassNotFound { .. })
        ));
        assert!(matches!(
            catalog.default_constructor(),
            Err(KernelError::WidgetUnavailable(_))
        ));

        catalog.set_default(RecordingWidget::build);
        assert!(catalog.has_default());
        assert!(catalog.default_constructor().is_ok());
    }
}
