//! Node types and the lazy evaluation contract
//!
//! A [`Node`] owns ordered input and output ports, their current values, a
//! dirty flag and an optional compute operation. Setting an input marks the
//! node dirty; [`Node::eval`] runs the compute operation only while dirty and
//! copies the result positionally into the outputs.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

use super::data::{DataType, NodeData};
use super::factory::NodeFactory;
use super::port::{PortDefinition, PortDirection, PortId, PortRef, PortTable};
use crate::error::{KernelError, Result};
use crate::observer::{Listener, ListenerId, Observers};

/// Metadata key holding the node caption
pub const CAPTION_KEY: &str = "caption";

/// Presentation state of an input, independent of its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputState {
    Connected,
    Hidden,
    Custom(String),
}

/// Events emitted by a node to its listeners
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    CaptionModified,
    DataModified { key: String },
    /// An input value or state changed and the node was marked dirty
    InputModified(PortId),
    /// Emitted once per executed `eval`, carrying the dirty flag
    StatusModified(bool),
}

/// User-overridable compute operation of a node
pub trait Compute: Send {
    /// Receives the full ordered input values. A `NodeData::Tuple` result is
    /// spread over the outputs, `None` or an empty tuple means "no result".
    fn compute(&mut self, inputs: &[NodeData]) -> Result<NodeData>;
}

impl<F> Compute for F
where
    F: FnMut(&[NodeData]) -> Result<NodeData> + Send,
{
    fn compute(&mut self, inputs: &[NodeData]) -> Result<NodeData> {
        self(inputs)
    }
}

/// Stateful, observable computation unit
pub struct Node {
    id: Uuid,
    inputs: PortTable,
    outputs: PortTable,
    input_values: Vec<NodeData>,
    input_states: Vec<Option<InputState>>,
    output_values: Vec<NodeData>,
    dirty: bool,
    internal_data: BTreeMap<String, NodeData>,
    factory: Option<Weak<NodeFactory>>,
    compute: Option<Box<dyn Compute>>,
    observers: Observers<NodeEvent>,
}

impl Node {
    /// Create a node without a compute operation; `eval` on it fails
    pub fn new(caption: impl Into<String>) -> Self {
        let mut internal_data = BTreeMap::new();
        internal_data.insert(CAPTION_KEY.to_string(), NodeData::String(caption.into()));
        Self {
            id: Uuid::new_v4(),
            inputs: PortTable::new(PortDirection::Input),
            outputs: PortTable::new(PortDirection::Output),
            input_values: Vec::new(),
            input_states: Vec::new(),
            output_values: Vec::new(),
            dirty: true,
            internal_data,
            factory: None,
            compute: None,
            observers: Observers::new(),
        }
    }

    /// Create a node backed by the given compute operation
    pub fn with_compute(caption: impl Into<String>, compute: impl Compute + 'static) -> Self {
        let mut node = Self::new(caption);
        node.compute = Some(Box::new(compute));
        node
    }

    /// Replace the compute operation
    pub fn set_compute(&mut self, compute: Box<dyn Compute>) {
        self.compute = Some(compute);
    }

    /// Unique id, also the `sender` of emitted events
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Factory that created this node, if it is still alive
    pub fn factory(&self) -> Option<Arc<NodeFactory>> {
        self.factory.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_factory(&mut self, factory: Weak<NodeFactory>) {
        self.factory = Some(factory);
    }

    // Observation

    /// Register a listener for node events
    pub fn subscribe(&self, listener: Arc<dyn Listener<NodeEvent>>) -> ListenerId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn notify(&self, event: NodeEvent) {
        self.observers.notify(self.id, &event);
    }

    // Internal data

    pub fn caption(&self) -> &str {
        self.internal_data
            .get(CAPTION_KEY)
            .and_then(NodeData::as_str)
            .unwrap_or_default()
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.internal_data
            .insert(CAPTION_KEY.to_string(), NodeData::String(caption.into()));
        self.notify(NodeEvent::CaptionModified);
    }

    /// Free-form annotation stored under `key`
    pub fn data(&self, key: &str) -> Option<&NodeData> {
        self.internal_data.get(key)
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: NodeData) {
        let key = key.into();
        self.internal_data.insert(key.clone(), value);
        self.notify(NodeEvent::DataModified { key });
    }

    // Declarations

    /// Append an input port with its initial value
    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        value: NodeData,
    ) -> Result<PortId> {
        let id = self.inputs.push(PortDefinition::new(name, data_type))?;
        self.input_values.push(value);
        self.input_states.push(None);
        Ok(id)
    }

    /// Append an output port, initially `NodeData::None`
    pub fn add_output(&mut self, name: impl Into<String>, data_type: DataType) -> Result<PortId> {
        let id = self.outputs.push(PortDefinition::new(name, data_type))?;
        self.output_values.push(NodeData::None);
        Ok(id)
    }

    // Ports

    pub fn input_ports(&self) -> &PortTable {
        &self.inputs
    }

    pub fn output_ports(&self) -> &PortTable {
        &self.outputs
    }

    /// Number of declared inputs
    pub fn input_count(&self) -> usize {
        self.input_values.len()
    }

    /// Number of declared outputs
    pub fn output_count(&self) -> usize {
        self.output_values.len()
    }

    /// Position of the input called `name`
    pub fn input_index(&self, name: &str) -> Result<PortId> {
        self.inputs.resolve(PortRef::Name(name))
    }

    /// Position of the output called `name`
    pub fn output_index(&self, name: &str) -> Result<PortId> {
        self.outputs.resolve(PortRef::Name(name))
    }

    /// Declared type of an input, by name or index
    pub fn input_type<'a>(&self, port: impl Into<PortRef<'a>>) -> Result<&DataType> {
        Ok(&self.inputs.get(port.into())?.data_type)
    }

    pub fn output_type<'a>(&self, port: impl Into<PortRef<'a>>) -> Result<&DataType> {
        Ok(&self.outputs.get(port.into())?.data_type)
    }

    // Values

    /// Current input values in port order
    pub fn inputs(&self) -> &[NodeData] {
        &self.input_values
    }

    /// Output values from the last evaluation, in port order
    pub fn outputs(&self) -> &[NodeData] {
        &self.output_values
    }

    pub fn get_input<'a>(&self, port: impl Into<PortRef<'a>>) -> Result<&NodeData> {
        let index = self.inputs.resolve(port.into())?;
        Ok(&self.input_values[index])
    }

    /// Set an input value. Equal values are ignored; otherwise the node is
    /// marked dirty and `InputModified` is emitted. Returns whether it changed.
    pub fn set_input<'a>(&mut self, port: impl Into<PortRef<'a>>, value: NodeData) -> Result<bool> {
        let index = self.inputs.resolve(port.into())?;
        if self.input_values[index] == value {
            return Ok(false);
        }
        self.input_values[index] = value;
        self.invalidate_input(index);
        Ok(true)
    }

    /// Value of an output, by name or index
    pub fn get_output<'a>(&self, port: impl Into<PortRef<'a>>) -> Result<&NodeData> {
        let index = self.outputs.resolve(port.into())?;
        Ok(&self.output_values[index])
    }

    /// Set an output value; outputs never affect the dirty flag
    pub fn set_output<'a>(&mut self, port: impl Into<PortRef<'a>>, value: NodeData) -> Result<()> {
        let index = self.outputs.resolve(port.into())?;
        self.output_values[index] = value;
        Ok(())
    }

    pub fn input_state<'a>(&self, port: impl Into<PortRef<'a>>) -> Result<Option<&InputState>> {
        let index = self.inputs.resolve(port.into())?;
        Ok(self.input_states[index].as_ref())
    }

    /// Set an input state; always invalidates, even if unchanged
    pub fn set_input_state<'a>(
        &mut self,
        port: impl Into<PortRef<'a>>,
        state: Option<InputState>,
    ) -> Result<()> {
        let index = self.inputs.resolve(port.into())?;
        self.input_states[index] = state;
        self.invalidate_input(index);
        Ok(())
    }

    // Status

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force the node dirty on behalf of input `index`
    pub fn invalidate_input(&mut self, index: PortId) {
        self.dirty = true;
        self.notify(NodeEvent::InputModified(index));
    }

    // Evaluation

    /// Invoke the compute operation directly, without touching node state
    pub fn call(&mut self, inputs: &[NodeData]) -> Result<NodeData> {
        match self.compute.as_mut() {
            Some(compute) => compute.compute(inputs),
            None => Err(KernelError::NodeNotImplemented(self.caption().to_string())),
        }
    }

    /// Evaluate the node if dirty. Returns `Ok(true)` when the compute
    /// operation ran, `Ok(false)` when the cached outputs were still valid.
    pub fn eval(&mut self) -> Result<bool> {
        if !self.dirty {
            trace!("Node {} is clean, skipping evaluation", self.caption());
            return Ok(false);
        }

        // Cleared first so a compute that touches inputs cannot recurse forever
        self.dirty = false;

        let result = match self.compute.as_mut() {
            Some(compute) => compute.compute(&self.input_values)?,
            None => return Err(KernelError::NodeNotImplemented(self.caption().to_string())),
        };
        self.notify(NodeEvent::StatusModified(self.dirty));

        if result.is_absent() {
            debug!("Node {} produced no result", self.caption());
            return Ok(true);
        }

        let values = match result {
            NodeData::Tuple(items) => items,
            scalar => vec![scalar],
        };
        for (slot, value) in self.output_values.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(true)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("caption", &self.caption())
            .field("inputs", &self.input_values)
            .field("outputs", &self.output_values)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(node: &Node) -> Arc<Mutex<Vec<NodeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        node.subscribe(Arc::new(move |_: Uuid, e: &NodeEvent| {
            sink.lock().unwrap().push(e.clone())
        }));
        events
    }

    fn identity(inputs: usize, outputs: usize) -> Node {
        let mut node = Node::with_compute("Identity", |inputs: &[NodeData]| {
            Ok(NodeData::Tuple(inputs.to_vec()))
        });
        for i in 0..inputs {
            node.add_input(format!("in{}", i), DataType::Any, NodeData::None).unwrap();
        }
        for i in 0..outputs {
            node.add_output(format!("out{}", i), DataType::Any).unwrap();
        }
        node
    }

    #[test]
    fn test_set_input_marks_dirty_once() {
        let mut node = identity(1, 1);
        node.eval().unwrap();
        assert!(!node.is_dirty());

        let events = recorder(&node);
        assert!(node.set_input(0, NodeData::Int(5)).unwrap());
        assert!(node.is_dirty());
        assert_eq!(*events.lock().unwrap(), vec![NodeEvent::InputModified(0)]);

        node.eval().unwrap();
        events.lock().unwrap().clear();
        assert!(!node.set_input("in0", NodeData::Int(5)).unwrap());
        assert!(!node.is_dirty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_set_input_state_always_invalidates() {
        let mut node = identity(1, 1);
        node.eval().unwrap();
        let events = recorder(&node);

        node.set_input_state(0, None).unwrap();
        assert!(node.is_dirty());
        assert_eq!(*events.lock().unwrap(), vec![NodeEvent::InputModified(0)]);
        node.set_input_state(0, Some(InputState::Hidden)).unwrap();
        assert_eq!(node.input_state(0).unwrap(), Some(&InputState::Hidden));
    }

    #[test]
    fn test_eval_is_lazy() {
        let mut node = identity(3, 3);
        for (i, v) in [1, 2, 3].into_iter().enumerate() {
            node.set_input(i, NodeData::Int(v)).unwrap();
        }
        let events = recorder(&node);

        assert!(node.eval().unwrap());
        assert!(!node.eval().unwrap());
        assert_eq!(node.outputs(), &[NodeData::Int(1), NodeData::Int(2), NodeData::Int(3)]);
        assert_eq!(*events.lock().unwrap(), vec![NodeEvent::StatusModified(false)]);
    }

    #[test]
    fn test_extra_results_are_dropped() {
        let mut node = Node::with_compute("Five", |_: &[NodeData]| {
            Ok(NodeData::from(vec![1, 2, 3, 4, 5]))
        });
        node.add_output("a", DataType::Int).unwrap();
        node.add_output("b", DataType::Int).unwrap();

        assert!(node.eval().unwrap());
        assert_eq!(node.outputs(), &[NodeData::Int(1), NodeData::Int(2)]);
    }

    #[test]
    fn test_missing_results_keep_previous_outputs() {
        let mut node = Node::with_compute("One", |_: &[NodeData]| Ok(NodeData::from(vec![7])));
        node.add_output("a", DataType::Int).unwrap();
        node.add_output("b", DataType::Int).unwrap();
        node.set_output("b", NodeData::String("kept".into())).unwrap();

        node.eval().unwrap();
        assert_eq!(node.get_output(0).unwrap(), &NodeData::Int(7));
        assert_eq!(node.get_output("b").unwrap(), &NodeData::String("kept".into()));
    }

    #[test]
    fn test_scalar_result_is_wrapped() {
        let mut node = Node::with_compute("Scalar", |_: &[NodeData]| Ok(NodeData::Float(2.5)));
        node.add_output("value", DataType::Float).unwrap();
        node.eval().unwrap();
        assert_eq!(node.get_output(0).unwrap(), &NodeData::Float(2.5));
    }

    #[test]
    fn test_absent_result_returns_true() {
        let mut node = Node::with_compute("Sink", |_: &[NodeData]| Ok(NodeData::None));
        node.add_output("value", DataType::Any).unwrap();
        node.set_output(0, NodeData::Int(1)).unwrap();
        assert!(node.eval().unwrap());
        assert_eq!(node.get_output(0).unwrap(), &NodeData::Int(1));
    }

    #[test]
    fn test_abstract_node_fails() {
        let mut node = Node::new("Abstract");
        assert!(matches!(node.eval(), Err(KernelError::NodeNotImplemented(c)) if c == "Abstract"));
        assert!(matches!(node.call(&[]), Err(KernelError::NodeNotImplemented(_))));
    }

    #[test]
    fn test_compute_errors_propagate() {
        let mut node = Node::with_compute("Failing", |_: &[NodeData]| {
            Err(KernelError::Compute("boom".into()))
        });
        assert!(matches!(node.eval(), Err(KernelError::Compute(m)) if m == "boom"));
        assert!(!node.is_dirty());
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let mut node = Node::new("Dup");
        node.add_input("x", DataType::Any, NodeData::None).unwrap();
        assert!(matches!(
            node.add_input("x", DataType::Int, NodeData::Int(0)),
            Err(KernelError::DuplicatePort { .. })
        ));
        assert_eq!(node.input_count(), 1);
        assert_eq!(node.input_ports().len(), 1);
        // Output names are independent of input names
        node.add_output("x", DataType::Any).unwrap();
    }

    #[test]
    fn test_metadata_events() {
        let mut node = Node::new("Start");
        let events = recorder(&node);
        assert_eq!(node.caption(), "Start");

        node.set_caption("Renamed");
        node.set_data("color", NodeData::String("red".into()));
        assert_eq!(node.caption(), "Renamed");
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                NodeEvent::CaptionModified,
                NodeEvent::DataModified { key: "color".into() }
            ]
        );
    }

    #[test]
    fn test_set_output_does_not_dirty() {
        let mut node = identity(0, 1);
        node.eval().unwrap();
        node.set_output(0, NodeData::Int(3)).unwrap();
        assert!(!node.is_dirty());
    }
}
