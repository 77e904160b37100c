//! Decorators applied to every compiled node.
//!
//! The compiler stacks them as `InstrumentedNode(TemplateAwareNode(node))`;
//! the template layer is skipped for nodes whose params hold no templates.

pub mod instrumented;
pub mod template;

pub use instrumented::InstrumentedNode;
pub use template::{ParamKind, TemplateAwareNode};
