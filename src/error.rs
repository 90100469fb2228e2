//! Error types for the node kernel

use std::path::PathBuf;
use thiserror::Error;

use crate::nodes::port::PortDirection;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Unknown node factory '{0}'")]
    UnknownNode(String),

    #[error("Recursive instantiation of factory '{0}'")]
    Recursion(String),

    #[error("Cannot resolve module '{locator}': {reason}")]
    ModuleResolution { locator: String, reason: String },

    #[error("Class '{class}' not found in module '{module}'")]
    ClassNotFound { module: String, class: String },

    #[error("Source patch failed: {0}")]
    SourcePatch(String),

    #[error("Cannot persist source to {path:?}: {reason}")]
    SourcePersist { path: Option<PathBuf>, reason: String },

    #[error("Node '{0}' has no compute operation")]
    NodeNotImplemented(String),

    #[error("Duplicate {direction} port '{name}'")]
    DuplicatePort { name: String, direction: PortDirection },

    #[error("{direction} port '{name}' not found")]
    PortNotFound { name: String, direction: PortDirection },

    #[error("{direction} port index {index} out of range ({len} ports)")]
    PortIndexOutOfRange {
        index: usize,
        len: usize,
        direction: PortDirection,
    },

    #[error("Compute error: {0}")]
    Compute(String),

    #[error("No widget available: {0}")]
    WidgetUnavailable(String),

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KernelError>;

impl KernelError {
    pub(crate) fn persist(path: Option<PathBuf>, reason: impl ToString) -> Self {
        KernelError::SourcePersist {
            path,
            reason: reason.to_string(),
        }
    }
}
