//! Drives a unit through its stages.
//!
//! Name resolution walks the tree in pre-order. A node that cannot resolve yet is put on a
//! revisit list, and the list is swept again until it empties, stops shrinking while nothing
//! waits on the symbol table, or the sweep limit is hit. Whatever is left is reported once as
//! unresolvable; a use of an alias that failed with its typedef is not reported again.
//! Validation and emission then each run once per node.

use crate::emit::Emitter;
use crate::resolve::NameResolver;
use crate::scope::find_typedef;
use crate::types::Progress;
use crate::validate::Validator;
use crate::UnitContext;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use xc_bytecode::MethodCode;
use xc_core::ast::{Ast, NodeId, Stage, Stmt, TypeExpr};
use xc_core::diagnostics::{Diagnostic, ErrorCode, ErrorListener};
use xc_core::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveOutcome {
    /// Every name resolved.
    Complete { sweeps: usize },
    /// A sweep resolved nothing new; `unresolved` nodes were reported.
    NoProgress { sweeps: usize, unresolved: usize },
    /// The sweep limit was reached first; `unresolved` nodes were reported.
    SweepLimit { sweeps: usize, unresolved: usize },
}

impl ResolveOutcome {
    pub fn sweeps(&self) -> usize {
        match *self {
            ResolveOutcome::Complete { sweeps }
            | ResolveOutcome::NoProgress { sweeps, .. }
            | ResolveOutcome::SweepLimit { sweeps, .. } => sweeps,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ResolveOutcome::Complete { .. })
    }
}

pub struct StageMgr<'a> {
    ast: &'a mut Ast,
    root: NodeId,
    ctx: UnitContext<'a>,
    errs: &'a dyn ErrorListener,
    revisit: Vec<NodeId>,
    iterations: usize,
    sweep_cap: Option<usize>,
    resolved: Option<ResolveOutcome>,
}

impl<'a> StageMgr<'a> {
    pub fn new(
        ast: &'a mut Ast,
        root: NodeId,
        ctx: UnitContext<'a>,
        errs: &'a dyn ErrorListener,
    ) -> Self {
        Self {
            ast,
            root,
            ctx,
            errs,
            revisit: Vec::new(),
            iterations: 0,
            sweep_cap: None,
            resolved: None,
        }
    }

    pub fn ast(&self) -> &Ast {
        self.ast
    }

    /// Sweeps performed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Nodes currently waiting for another sweep.
    pub fn pending(&self) -> &[NodeId] {
        &self.revisit
    }

    /// Default sweep limit: tree depth plus deferrable nodes plus one.
    pub fn default_sweep_limit(&self) -> usize {
        let deferrable = self
            .ast
            .preorder(self.root)
            .into_iter()
            .filter(|id| NameResolver::is_deferrable(self.ast, *id))
            .count();
        self.ast.depth(self.root) + deferrable + 1
    }

    fn sweep_limit(&self) -> usize {
        let limit = self
            .ctx
            .options
            .max_resolve_sweeps
            .unwrap_or_else(|| self.default_sweep_limit());
        self.sweep_cap.map_or(limit, |cap| limit.min(cap))
    }

    /// One pass over `ids`, returning the nodes that deferred again and whether any of them
    /// is waiting on the symbol table.
    fn sweep(
        &mut self,
        resolver: &NameResolver<'_>,
        ids: Vec<NodeId>,
    ) -> Result<(Vec<NodeId>, bool)> {
        self.iterations += 1;
        let mut deferred = Vec::new();
        let mut waiting = false;
        for id in ids {
            let node = self.ast.node(id);
            if !node.completable || node.state.stage.has_reached(Stage::Resolved) {
                continue;
            }
            if node.state.stage.is_failed() {
                continue;
            }
            self.ast.set_stage(id, Stage::Resolving);
            match resolver.resolve(self.ast, id, self.errs)? {
                Progress::Done => {
                    if !self.ast.stage(id).is_failed() {
                        self.ast.set_stage(id, Stage::Resolved);
                    }
                }
                Progress::Deferred => deferred.push(id),
                Progress::Waiting => {
                    waiting = true;
                    deferred.push(id);
                }
            }
            if self.errs.is_abort_desired() {
                break;
            }
        }
        Ok((deferred, waiting))
    }

    /// Run name resolution to its fixpoint. Idempotent once finished.
    pub fn resolve_names(&mut self) -> Result<ResolveOutcome> {
        if let Some(outcome) = self.resolved {
            return Ok(outcome);
        }
        let limit = self.sweep_limit();
        let resolver = NameResolver::new(self.ctx);

        let all = self.ast.preorder(self.root);
        let (first, _) = self.sweep(&resolver, all)?;
        self.revisit = first;
        tracing::debug!(
            "sweep {}: {} node(s) deferred",
            self.iterations,
            self.revisit.len()
        );

        let outcome = loop {
            if self.revisit.is_empty() {
                break ResolveOutcome::Complete {
                    sweeps: self.iterations,
                };
            }
            if self.iterations >= limit {
                break ResolveOutcome::SweepLimit {
                    sweeps: self.iterations,
                    unresolved: self.revisit.len(),
                };
            }
            let before = self.revisit.len();
            let pending = std::mem::take(&mut self.revisit);
            let (deferred, waiting) = self.sweep(&resolver, pending)?;
            self.revisit = deferred;
            tracing::debug!(
                "sweep {}: {} node(s) deferred",
                self.iterations,
                self.revisit.len()
            );
            if self.revisit.len() == before && !waiting {
                break ResolveOutcome::NoProgress {
                    sweeps: self.iterations,
                    unresolved: before,
                };
            }
        };

        let leftovers = std::mem::take(&mut self.revisit);
        let cascaded = self.cascaded(&leftovers);
        for id in leftovers {
            if cascaded.contains(&id) {
                tracing::trace!("{} fails with the alias it names", id);
            } else {
                let name = NameResolver::unresolved_name(self.ast, id);
                self.errs.log(
                    Diagnostic::error(ErrorCode::NameUnresolvable)
                        .with_arg(name)
                        .with_span(self.ast.span(id)),
                );
            }
            self.ast.set_stage(id, Stage::Failed);
        }
        tracing::debug!("name resolution finished: {:?}", outcome);
        self.resolved = Some(outcome);
        Ok(outcome)
    }

    /// Leftover alias uses that only fail because the typedef they name failed. Their
    /// failure is already reported at the typedef, unless the alias sits on a cycle, in which
    /// case every node of the cycle is reported.
    fn cascaded(&self, leftovers: &[NodeId]) -> HashSet<NodeId> {
        let pending: HashSet<NodeId> = leftovers.iter().copied().collect();
        let deps: HashMap<NodeId, Vec<NodeId>> = leftovers
            .iter()
            .filter_map(|id| {
                let Some(TypeExpr::Named { names, .. }) = self.ast.type_expr(*id) else {
                    return None;
                };
                let [name] = names.as_slice() else {
                    return None;
                };
                let alias = find_typedef(self.ast, *id, name)?;
                let Some(Stmt::Typedef { ty, .. }) = self.ast.stmt(alias) else {
                    return None;
                };
                let failed = self
                    .ast
                    .preorder(*ty)
                    .into_iter()
                    .filter(|dep| {
                        let node = self.ast.node(*dep);
                        pending.contains(dep) || !node.completable || node.state.stage.is_failed()
                    })
                    .collect::<Vec<_>>();
                Some((*id, failed))
            })
            .collect();

        let on_cycle = |start: NodeId| {
            let mut seen = HashSet::new();
            let mut stack: Vec<NodeId> = deps.get(&start).cloned().unwrap_or_default();
            while let Some(id) = stack.pop() {
                if id == start {
                    return true;
                }
                if seen.insert(id) {
                    stack.extend(deps.get(&id).into_iter().flatten().copied());
                }
            }
            false
        };
        deps.iter()
            .filter(|(id, failed)| !failed.is_empty() && !on_cycle(**id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Validate the whole unit. Returns the (possibly replaced) root, or `None` on failure.
    pub fn validate(&mut self) -> Result<Option<NodeId>> {
        let mut validator = Validator::new(self.ast, self.ctx, self.errs);
        let root = validator.validate(self.root)?;
        if let Some(root) = root {
            self.root = root;
        }
        Ok(root)
    }

    /// Emit every method of a validated unit.
    pub fn emit(&mut self) -> Result<Vec<MethodCode>> {
        let methods: Vec<NodeId> = match self.ast.stmt(self.root) {
            Some(Stmt::Module { members, .. }) => members.clone(),
            Some(Stmt::Method { .. }) => vec![self.root],
            _ => invariant!("unit root {} is not a module or method", self.root),
        };
        let mut code = Vec::with_capacity(methods.len());
        for method in methods {
            ensure_invariant!(
                self.ast.stage(method) == Stage::Validated,
                "method {} reached emission at stage {:?}",
                method,
                self.ast.stage(method)
            );
            let emitter = Emitter::new(self.ast, self.ctx, self.errs);
            code.push(emitter.emit_method(method)?);
        }
        if matches!(self.ast.stmt(self.root), Some(Stmt::Module { .. })) {
            self.ast.set_stage(self.root, Stage::Emitted);
        }
        Ok(code)
    }

    /// Advance the unit until its root reaches `target` (at most `Validated`), spending at most
    /// `max_iterations` resolution sweeps. Returns whether the target was reached.
    pub fn fast_forward(&mut self, target: Stage, max_iterations: usize) -> Result<bool> {
        ensure_invariant!(
            target <= Stage::Validated,
            "cannot fast-forward to {:?}",
            target
        );
        if target >= Stage::Resolved {
            if self.resolved.is_none() {
                self.sweep_cap = Some(max_iterations.max(1));
                let outcome = self.resolve_names();
                self.sweep_cap = None;
                outcome?;
            }
            if !self.resolved.is_some_and(|outcome| outcome.is_complete()) {
                return Ok(false);
            }
        }
        if target >= Stage::Validating {
            return Ok(self.validate()?.is_some());
        }
        Ok(!self.ast.stage(self.root).is_failed())
    }
}
