//! Semantic analysis and code generation over the `xc-core` syntax tree.
//!
//! A unit goes through name resolution (repeated sweeps until a fixpoint), validation (once per
//! node, children first) and emission into register-based method code. [`CompileSession`] ties
//! the phases together and can be shared by threads compiling independent units.

#[macro_use]
extern crate xc_core;

pub mod emit;
#[cfg(test)]
mod fixture;
pub mod labels;
pub mod options;
pub mod resolve;
pub mod scope;
pub mod session;
pub mod stage;
pub mod symbols;
pub mod types;
pub mod validate;

pub use options::CompileOptions;
pub use session::{CompileSession, UnitOutcome, UnitStatus};
pub use stage::{ResolveOutcome, StageMgr};
pub use symbols::{Component, Lookup, StaticSymbolTable, SymbolTable};

use std::sync::atomic::AtomicU32;
use xc_core::pool::ConstantPool;

/// Shared facts every phase of one unit reads.
#[derive(Clone, Copy)]
pub struct UnitContext<'a> {
    pub pool: &'a ConstantPool,
    pub symbols: &'a dyn SymbolTable,
    /// Session-wide label-scope counter.
    pub label_scopes: &'a AtomicU32,
    pub options: &'a CompileOptions,
    /// Qualified name of the unit's module, the scope for symbol lookups.
    pub scope: &'a str,
}
