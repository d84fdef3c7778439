#[macro_use]
pub mod macros;

pub mod ast;
pub mod collections;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod pool;
pub mod pretty;
pub mod span;

// Re-export commonly used items for convenience
pub use tracing;

pub use diagnostics::{Diagnostic, ErrorCode, ErrorList, ErrorListener, Severity};
pub use pool::{ConstId, ConstantPool};

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
