//! Node-script: the small language node modules are written in
//!
//! A module is a sequence of `node` class blocks declaring ports and an
//! optional `compute` block. Compiled classes run through [`ScriptCompute`].

pub mod ast;
pub mod interp;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{KernelError, Result};
use crate::nodes::data::NodeData;
use crate::nodes::node::{Compute, Node};

pub use ast::ClassDef;
pub use parser::parse_module;

/// Syntax or constant-evaluation error, with the 1-based line it occurred on
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Compute operation backed by a compiled class definition
pub struct ScriptCompute {
    class: Arc<ClassDef>,
}

impl ScriptCompute {
    pub fn new(class: Arc<ClassDef>) -> Self {
        Self { class }
    }
}

impl Compute for ScriptCompute {
    fn compute(&mut self, inputs: &[NodeData]) -> Result<NodeData> {
        let Some(body) = self.class.body.as_ref() else {
            return Err(KernelError::NodeNotImplemented(self.class.name.clone()));
        };

        let mut env = HashMap::with_capacity(inputs.len() + 1);
        for (decl, value) in self.class.inputs.iter().zip(inputs) {
            env.insert(decl.name.clone(), value.clone());
        }
        env.insert(interp::INPUTS_NAME.to_string(), NodeData::Tuple(inputs.to_vec()));

        interp::run(body, env)
            .map_err(|message| KernelError::Compute(format!("{}: {}", self.class.name, message)))
    }
}

/// Build a node instance from a class definition
pub fn instantiate_class(class: &Arc<ClassDef>) -> Result<Node> {
    let mut node = match class.body {
        Some(_) => Node::with_compute(class.name.clone(), ScriptCompute::new(Arc::clone(class))),
        None => Node::new(class.name.clone()),
    };
    for input in &class.inputs {
        node.add_input(input.name.clone(), input.data_type.clone(), input.default.clone())?;
    }
    for output in &class.outputs {
        node.add_output(output.name.clone(), output.data_type.clone())?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::data::DataType;

    fn class(source: &str) -> Arc<ClassDef> {
        Arc::new(parse_module(source).unwrap().remove(0))
    }

    #[test]
    fn test_instantiate_class() {
        let class = class("node Add { input a: int = 1  input b: int = 2  output r: int  compute { return a + b } }");
        let mut node = instantiate_class(&class).unwrap();
        assert_eq!(node.caption(), "Add");
        assert_eq!(node.input_type("a").unwrap(), &DataType::Int);
        assert!(node.eval().unwrap());
        assert_eq!(node.get_output("r").unwrap(), &NodeData::Int(3));

        node.set_input("b", NodeData::Int(10)).unwrap();
        node.eval().unwrap();
        assert_eq!(node.get_output(0).unwrap(), &NodeData::Int(11));
    }

    #[test]
    fn test_runtime_error_names_class() {
        let class = class("node Bad { input a  compute { return a + \"x\" } }");
        let mut node = instantiate_class(&class).unwrap();
        node.set_input(0, NodeData::Int(1)).unwrap();
        match node.eval() {
            Err(KernelError::Compute(message)) => assert!(message.starts_with("Bad:")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_class_without_compute_is_abstract() {
        let class = class("node Base { input a }");
        let mut node = instantiate_class(&class).unwrap();
        assert!(matches!(node.eval(), Err(KernelError::NodeNotImplemented(_))));
    }
}
