use crate::symbols::StaticSymbolTable;
use crate::{CompileOptions, ResolveOutcome, StageMgr, UnitContext};
use std::sync::atomic::AtomicU32;
use xc_bytecode::MethodCode;
use xc_core::ast::{Ast, NodeId};
use xc_core::diagnostics::ErrorList;
use xc_core::pool::ConstantPool;
use xc_core::Result;

/// Everything a unit borrows while it is compiled, owned for the length of a test.
pub(crate) struct Fixture {
    pub pool: ConstantPool,
    pub symbols: StaticSymbolTable,
    pub labels: AtomicU32,
    pub options: CompileOptions,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            pool: ConstantPool::new(),
            symbols: StaticSymbolTable::new(),
            labels: AtomicU32::new(0),
            options: CompileOptions::default(),
        }
    }

    pub fn ctx(&self) -> UnitContext<'_> {
        UnitContext {
            pool: &self.pool,
            symbols: &self.symbols,
            label_scopes: &self.labels,
            options: &self.options,
            scope: "test",
        }
    }

    pub fn resolve(&self, ast: &mut Ast, errs: &ErrorList) -> Result<ResolveOutcome> {
        let root = root_of(ast);
        StageMgr::new(ast, root, self.ctx(), errs).resolve_names()
    }

    /// Resolve then validate; returns the validated root.
    pub fn validate(&self, ast: &mut Ast, errs: &ErrorList) -> Result<Option<NodeId>> {
        let root = root_of(ast);
        let mut stages = StageMgr::new(ast, root, self.ctx(), errs);
        stages.resolve_names()?;
        stages.validate()
    }

    /// Resolve, validate and emit a unit that is expected to validate cleanly.
    pub fn emit(&self, ast: &mut Ast, errs: &ErrorList) -> Result<Vec<MethodCode>> {
        let root = root_of(ast);
        let mut stages = StageMgr::new(ast, root, self.ctx(), errs);
        stages.resolve_names()?;
        if stages.validate()?.is_none() {
            bail!("unit failed validation: {:?}", errs.diagnostics());
        }
        stages.emit()
    }
}

fn root_of(ast: &Ast) -> NodeId {
    ast.root().unwrap_or(NodeId(0))
}
