//! Port descriptors and the name/index table owned by a node

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::data::DataType;
use crate::error::{KernelError, Result};

/// Unique identifier for a port within one direction of a node
pub type PortId = usize;

/// Direction of a port (input or output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Named, typed port descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub name: String,
    pub data_type: DataType,
}

impl PortDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Port address: positional index or name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRef<'a> {
    Index(PortId),
    Name(&'a str),
}

impl From<usize> for PortRef<'_> {
    fn from(index: usize) -> Self {
        PortRef::Index(index)
    }
}

impl<'a> From<&'a str> for PortRef<'a> {
    fn from(name: &'a str) -> Self {
        PortRef::Name(name)
    }
}

impl<'a> From<&'a String> for PortRef<'a> {
    fn from(name: &'a String) -> Self {
        PortRef::Name(name.as_str())
    }
}

/// Ordered descriptor list with a name index kept in lock step
#[derive(Debug, Clone)]
pub struct PortTable {
    direction: PortDirection,
    ports: Vec<PortDefinition>,
    index: HashMap<String, PortId>,
}

impl PortTable {
    pub fn new(direction: PortDirection) -> Self {
        Self {
            direction,
            ports: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Append a descriptor; duplicate names are rejected
    pub fn push(&mut self, port: PortDefinition) -> Result<PortId> {
        if self.index.contains_key(&port.name) {
            return Err(KernelError::DuplicatePort {
                name: port.name,
                direction: self.direction,
            });
        }
        let id = self.ports.len();
        self.index.insert(port.name.clone(), id);
        self.ports.push(port);
        Ok(id)
    }

    /// Resolve a port reference to its position
    pub fn resolve(&self, port: PortRef<'_>) -> Result<PortId> {
        match port {
            PortRef::Index(index) if index < self.ports.len() => Ok(index),
            PortRef::Index(index) => Err(KernelError::PortIndexOutOfRange {
                index,
                len: self.ports.len(),
                direction: self.direction,
            }),
            PortRef::Name(name) => {
                self.index
                    .get(name)
                    .copied()
                    .ok_or_else(|| KernelError::PortNotFound {
                        name: name.to_string(),
                        direction: self.direction,
                    })
            }
        }
    }

    /// Port definition by name or index
    pub fn get(&self, port: PortRef<'_>) -> Result<&PortDefinition> {
        let id = self.resolve(port)?;
        Ok(&self.ports[id])
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortDefinition> {
        self.ports.iter()
    }

    /// Port names in index order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_index_agree() {
        let mut table = PortTable::new(PortDirection::Input);
        table.push(PortDefinition::new("a", DataType::Int)).unwrap();
        table.push(PortDefinition::new("b", DataType::Any)).unwrap();

        for (position, port) in table.iter().enumerate() {
            assert_eq!(table.resolve(PortRef::Name(&port.name)).unwrap(), position);
        }
        assert_eq!(table.get(1.into()).unwrap().name, "b");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut table = PortTable::new(PortDirection::Output);
        table.push(PortDefinition::new("out", DataType::Any)).unwrap();
        let err = table.push(PortDefinition::new("out", DataType::Int)).unwrap_err();
        assert!(matches!(err, KernelError::DuplicatePort { .. }));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("out".into()).unwrap().data_type, DataType::Any);
    }

    #[test]
    fn test_bad_references() {
        let table = PortTable::new(PortDirection::Input);
        assert!(matches!(
            table.resolve(PortRef::Index(0)),
            Err(KernelError::PortIndexOutOfRange { index: 0, len: 0, .. })
        ));
        assert!(matches!(
            table.resolve(PortRef::Name("x")),
            Err(KernelError::PortNotFound { .. })
        ));
    }
}
