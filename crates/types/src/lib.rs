//! Serializable contracts shared between the pflow runtime and its producers:
//! the workflow IR and the node-type metadata registry.

pub mod ir;
pub mod metadata;

pub use ir::{InputSpec, IrEdge, IrNode, OutputSpec, WorkflowIr, DEFAULT_ACTION};
pub use metadata::{NodeMetadata, OutputField, ParamSpec, Registry, StructureField};
