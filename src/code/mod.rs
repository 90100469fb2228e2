//! Code units: loaded modules, their class namespaces and how they are found

pub mod loader;
pub mod unit;

pub use loader::{FileResolver, ModuleLoader, ModuleResolver};
pub use unit::{ClassKind, CodeUnit, NativeConstructor, NodeClass};
