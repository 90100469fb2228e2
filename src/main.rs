//! nodle-kernel - evaluate one node from a node-script module
//!
//! Usage: `nodle-kernel <module.node> <Class> [int...]`
//!
//! Integer arguments are fed to the node's inputs in order, then the node is
//! evaluated once and its outputs printed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use nodle_kernel::{FileResolver, KernelError, NodeData, NodeFactory};

fn run(args: &[String]) -> Result<(), KernelError> {
    let [path, class, values @ ..] = args else {
        return Err(KernelError::Config(
            "usage: nodle-kernel <module.node> <Class> [int...]".to_string(),
        ));
    };

    let path = PathBuf::from(path);
    let locator = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("module")
        .to_string();

    let factory = NodeFactory::new(class.as_str(), Arc::new(FileResolver::new(&path)))
        .with_node_module(locator, class.as_str())
        .build();
    let mut node = factory.instantiate()?;

    for (index, value) in values.iter().enumerate() {
        let value: i64 = value
            .parse()
            .map_err(|e| KernelError::Config(format!("input {} '{}': {}", index, value, e)))?;
        node.set_input(index, NodeData::Int(value))?;
    }

    node.eval()?;
    for (port, value) in node.output_ports().iter().zip(node.outputs()) {
        println!("{} = {}", port.name, value);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
