pub mod config;
pub mod error;
pub mod template;
pub mod types;
pub mod workflow_graph;

pub use config::{ConfigLoader, PflowConfig};
pub use error::AppError;
pub use types::*;
