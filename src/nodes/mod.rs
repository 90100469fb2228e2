//! Node system - values, ports, nodes and the factories and packages producing them

pub mod data;
pub mod factory;
pub mod node;
pub mod package;
pub mod port;
pub mod widget;

pub use data::{DataType, NodeData};
pub use factory::{FactoryDescriptor, FactoryEvent, NodeCategory, NodeFactory};
pub use node::{Compute, InputState, Node, NodeEvent, CAPTION_KEY};
pub use package::{Package, PackageMetaInfo};
pub use port::{PortDefinition, PortDirection, PortId, PortRef, PortTable};
pub use widget::{NodeWidget, WidgetCatalog, WidgetConstructor};
