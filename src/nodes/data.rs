//! Values carried by ports and the type tags attached to port descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value flowing through node ports
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum NodeData {
    /// Unset port / absent result
    #[default]
    None,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Ordered collection; results of this shape are unpacked across outputs
    Tuple(Vec<NodeData>),
}

impl NodeData {
    /// True for the unset value
    pub fn is_none(&self) -> bool {
        matches!(self, NodeData::None)
    }

    /// Absent results leave a node's outputs untouched
    pub fn is_absent(&self) -> bool {
        match self {
            NodeData::None => true,
            NodeData::Tuple(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NodeData::Int(i) => Some(*i),
            NodeData::Boolean(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Numeric value as a float, ints and booleans included
    pub fn as_float(&self) -> Option<f64> {
        match self {
            NodeData::Float(f) => Some(*f),
            NodeData::Int(i) => Some(*i as f64),
            NodeData::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeData::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[NodeData]> {
        match self {
            NodeData::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Truthiness used by the script interpreter
    pub fn truthy(&self) -> bool {
        match self {
            NodeData::None => false,
            NodeData::Boolean(b) => *b,
            NodeData::Int(i) => *i != 0,
            NodeData::Float(f) => *f != 0.0,
            NodeData::String(s) => !s.is_empty(),
            NodeData::Tuple(items) => !items.is_empty(),
        }
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeData::None => "none",
            NodeData::Boolean(_) => "bool",
            NodeData::Int(_) => "int",
            NodeData::Float(_) => "float",
            NodeData::String(_) => "string",
            NodeData::Tuple(_) => "tuple",
        }
    }

    /// Type tag matching this value
    pub fn data_type(&self) -> DataType {
        match self {
            NodeData::None => DataType::Any,
            NodeData::Boolean(_) => DataType::Boolean,
            NodeData::Int(_) => DataType::Int,
            NodeData::Float(_) => DataType::Float,
            NodeData::String(_) => DataType::String,
            NodeData::Tuple(_) => DataType::Tuple,
        }
    }
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeData::None => write!(f, "none"),
            NodeData::Boolean(b) => write!(f, "{}", b),
            NodeData::Int(i) => write!(f, "{}", i),
            NodeData::Float(v) => write!(f, "{:?}", v),
            NodeData::String(s) => write!(f, "{:?}", s),
            NodeData::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<bool> for NodeData {
    fn from(value: bool) -> Self {
        NodeData::Boolean(value)
    }
}

impl From<i64> for NodeData {
    fn from(value: i64) -> Self {
        NodeData::Int(value)
    }
}

impl From<i32> for NodeData {
    fn from(value: i32) -> Self {
        NodeData::Int(value as i64)
    }
}

impl From<f64> for NodeData {
    fn from(value: f64) -> Self {
        NodeData::Float(value)
    }
}

impl From<&str> for NodeData {
    fn from(value: &str) -> Self {
        NodeData::String(value.to_string())
    }
}

impl From<String> for NodeData {
    fn from(value: String) -> Self {
        NodeData::String(value)
    }
}

impl<T: Into<NodeData>> From<Vec<T>> for NodeData {
    fn from(values: Vec<T>) -> Self {
        NodeData::Tuple(values.into_iter().map(Into::into).collect())
    }
}

/// Type tag attached to a port; opaque to the evaluation engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// Any type (for generic ports)
    #[default]
    Any,
    Boolean,
    Int,
    Float,
    String,
    Tuple,
    /// Application-defined interface name
    Custom(String),
}

impl DataType {
    /// Check if this data type can connect to another
    pub fn can_connect_to(&self, other: &DataType) -> bool {
        self == other || *self == DataType::Any || *other == DataType::Any
    }

    /// Human-readable name, also the spelling used in node scripts
    pub fn name(&self) -> &str {
        match self {
            DataType::Any => "any",
            DataType::Boolean => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Tuple => "tuple",
            DataType::Custom(name) => name,
        }
    }

    /// Parse a script type annotation; unknown names become `Custom`
    pub fn from_name(name: &str) -> Self {
        match name {
            "any" => DataType::Any,
            "bool" => DataType::Boolean,
            "int" => DataType::Int,
            "float" => DataType::Float,
            "string" | "str" => DataType::String,
            "tuple" => DataType::Tuple,
            other => DataType::Custom(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_results() {
        assert!(NodeData::None.is_absent());
        assert!(NodeData::Tuple(vec![]).is_absent());
        assert!(!NodeData::Int(0).is_absent());
        assert!(!NodeData::Boolean(false).is_absent());
    }

    #[test]
    fn test_data_type_compatibility() {
        assert!(DataType::Float.can_connect_to(&DataType::Float));
        assert!(DataType::Float.can_connect_to(&DataType::Any));
        assert!(DataType::Any.can_connect_to(&DataType::Float));
        assert!(!DataType::Float.can_connect_to(&DataType::String));
        assert_eq!(DataType::from_name("IImage"), DataType::Custom("IImage".into()));
        assert_eq!(DataType::from_name("int").name(), "int");
    }

    #[test]
    fn test_display() {
        let value = NodeData::from(vec![1, 2, 3]);
        assert_eq!(value.to_string(), "(1, 2, 3)");
        assert_eq!(NodeData::Tuple(vec![NodeData::Int(1)]).to_string(), "(1,)");
        assert_eq!(NodeData::Float(6.0).to_string(), "6.0");
    }
}
