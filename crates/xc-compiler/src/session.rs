use crate::scope::module_name;
use crate::{CompileOptions, ResolveOutcome, StageMgr, SymbolTable, UnitContext};
use itertools::Itertools;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use xc_bytecode::MethodCode;
use xc_core::ast::Ast;
use xc_core::diagnostics::{Diagnostic, ErrorCode, ErrorList, ErrorListener, Severity};
use xc_core::pool::ConstantPool;
use xc_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum UnitStatus {
    #[display("emitted")]
    Emitted,
    /// Errors were reported; nothing was emitted.
    #[display("failed")]
    Failed,
    /// A fatal diagnostic or the error cap stopped the unit early.
    #[display("abandoned")]
    Abandoned,
}

#[derive(Debug)]
pub struct UnitOutcome {
    pub status: UnitStatus,
    pub methods: Vec<MethodCode>,
    pub diagnostics: Vec<Diagnostic>,
    /// How name resolution ended, if it ran to completion.
    pub resolve: Option<ResolveOutcome>,
}

impl UnitOutcome {
    pub fn is_emitted(&self) -> bool {
        self.status == UnitStatus::Emitted
    }

    pub fn count(&self, code: ErrorCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }

    pub fn method(&self, name: &str) -> Option<&MethodCode> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// State shared by every unit compiled together: the constant pool, the label-scope counter and
/// the options. A session is `Sync`; units may be compiled from several threads at once.
#[derive(Debug)]
pub struct CompileSession {
    pool: Arc<ConstantPool>,
    label_scopes: AtomicU32,
    options: CompileOptions,
}

impl Default for CompileSession {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl CompileSession {
    pub fn new(options: CompileOptions) -> Self {
        Self::with_pool(Arc::new(ConstantPool::new()), options)
    }

    pub fn with_pool(pool: Arc<ConstantPool>, options: CompileOptions) -> Self {
        Self {
            pool,
            label_scopes: AtomicU32::new(0),
            options,
        }
    }

    pub fn pool(&self) -> &Arc<ConstantPool> {
        &self.pool
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Resolve, validate and emit one unit. Failures of this unit never affect other units.
    pub fn compile_unit(&self, ast: &mut Ast, symbols: &dyn SymbolTable) -> UnitOutcome {
        let errs = ErrorList::new(self.options.max_errors);
        let scope = ast.root().map(|root| module_name(ast, root)).unwrap_or_default();
        tracing::info!("compiling unit `{}` ({} nodes)", scope, ast.len());

        let mut resolve = None;
        let (status, methods) = match self.run(ast, symbols, &scope, &errs, &mut resolve) {
            Ok(Some(methods)) => (UnitStatus::Emitted, methods),
            Ok(None) if errs.is_abort_desired() => (UnitStatus::Abandoned, Vec::new()),
            Ok(None) => (UnitStatus::Failed, Vec::new()),
            Err(err) => {
                tracing::warn!("abandoning unit `{}`: {}", scope, err);
                let message = match err {
                    Error::Invariant(message) => message,
                    other => other.to_string(),
                };
                errs.log(Diagnostic::fatal(ErrorCode::InternalError).with_arg(message));
                (UnitStatus::Abandoned, Vec::new())
            }
        };
        let diagnostics = errs.diagnostics();
        if errs.severity() >= Severity::Warning {
            tracing::debug!(
                "unit `{}` diagnostics: {}",
                scope,
                diagnostics.iter().map(Diagnostic::to_string).join("; ")
            );
        }
        tracing::info!(
            "unit `{}` {}: {} method(s), {} diagnostic(s)",
            scope,
            status,
            methods.len(),
            diagnostics.len()
        );
        UnitOutcome {
            status,
            methods,
            diagnostics,
            resolve,
        }
    }

    fn run(
        &self,
        ast: &mut Ast,
        symbols: &dyn SymbolTable,
        scope: &str,
        errs: &ErrorList,
        resolve: &mut Option<ResolveOutcome>,
    ) -> Result<Option<Vec<MethodCode>>> {
        let Some(root) = ast.root() else {
            invariant!("unit has no root");
        };
        let ctx = UnitContext {
            pool: &self.pool,
            symbols,
            label_scopes: &self.label_scopes,
            options: &self.options,
            scope,
        };
        let mut stages = StageMgr::new(ast, root, ctx, errs);
        *resolve = Some(stages.resolve_names()?);
        if errs.is_abort_desired() {
            return Ok(None);
        }
        let validated = stages.validate()?;
        if validated.is_none() || errs.has_serious_errors() {
            return Ok(None);
        }
        let methods = stages.emit()?;
        if errs.has_serious_errors() {
            return Ok(None);
        }
        Ok(Some(methods))
    }
}
