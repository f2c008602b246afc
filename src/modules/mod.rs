//! Adapter modules for Windows administration tools

pub mod error;
pub mod executor;
pub mod interface;
pub mod net;
pub mod registry;
pub mod scoped;
pub mod script;
pub mod source_control;
pub mod sync;
pub mod system;
pub mod web;

// Re-export commonly used types
pub use error::*;
pub use interface::*;
pub use registry::ModuleRegistry;
