//! Nodle kernel
//!
//! Dataflow node model with lazy evaluation, factories that load node classes
//! from editable script modules, and packages grouping those factories.

pub mod code;
pub mod config;
pub mod constants;
pub mod error;
pub mod nodes;
pub mod observer;
pub mod script;

pub use code::{CodeUnit, FileResolver, ModuleLoader, ModuleResolver, NodeClass};
pub use config::KernelConfig;
pub use error::{KernelError, Result};
pub use nodes::{
    Compute, DataType, FactoryDescriptor, FactoryEvent, Node, NodeData, NodeEvent, NodeFactory,
    NodeWidget, Package, PackageMetaInfo, WidgetCatalog,
};
pub use observer::{Listener, ListenerId, Observers};
