//! Type resolution: turning type expressions into pool-interned type constants.

use crate::scope::find_typedef;
use crate::symbols::{Component, Lookup};
use crate::UnitContext;
use xc_core::ast::{Ast, NodeId, Stage, Stmt, TypeExpr};
use xc_core::diagnostics::{Diagnostic, ErrorCode, ErrorListener};
use xc_core::pool::{TypeCategory, BUILTIN_TYPES};
use xc_core::{ConstId, Result};

/// Outcome of one name-resolution attempt on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Done,
    /// Not resolvable yet; retry on the next sweep.
    Deferred,
    /// The symbol table is still assembling the component. Retried like `Deferred`, but a
    /// sweep that only waits still counts as progress.
    Waiting,
}

enum TypeLookup {
    Type(ConstId),
    NotAType,
    Pending,
    Waiting,
}

pub struct TypeResolver<'a> {
    ctx: UnitContext<'a>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(ctx: UnitContext<'a>) -> Self {
        Self { ctx }
    }

    /// Name-resolution step for the type expression `id`.
    ///
    /// A named type that cannot be resolved yet gets a placeholder on its first attempt; the
    /// placeholder is filled in place once the name resolves.
    pub fn resolve_names(
        &self,
        ast: &mut Ast,
        id: NodeId,
        errs: &dyn ErrorListener,
    ) -> Result<Progress> {
        let pool = self.ctx.pool;
        match ast.type_expr(id).cloned() {
            Some(TypeExpr::Keyword(keyword)) => {
                let category = TypeCategory::from_keyword(keyword)?;
                ast.state_mut(id).ty = Some(pool.keyword_type(category));
                Ok(Progress::Done)
            }
            Some(TypeExpr::Named { names, .. }) => {
                let name = names.join(".");
                match self.lookup(ast, id, &names) {
                    TypeLookup::Type(ty) => {
                        match ast.state(id).ty {
                            Some(placeholder) if pool.entry(placeholder)?.is_placeholder() => {
                                pool.resolve_placeholder(placeholder, ty)?
                            }
                            _ => ast.state_mut(id).ty = Some(ty),
                        }
                        tracing::trace!("{} resolved type {}", id, name);
                        Ok(Progress::Done)
                    }
                    TypeLookup::NotAType => {
                        errs.log(
                            Diagnostic::error(ErrorCode::NotAType)
                                .with_arg(&name)
                                .with_span(ast.span(id)),
                        );
                        ast.set_stage(id, Stage::Failed);
                        Ok(Progress::Done)
                    }
                    lookup @ (TypeLookup::Pending | TypeLookup::Waiting) => {
                        if ast.state(id).ty.is_none() {
                            ast.state_mut(id).ty = Some(pool.new_unresolved(name));
                        }
                        Ok(match lookup {
                            TypeLookup::Waiting => Progress::Waiting,
                            _ => Progress::Deferred,
                        })
                    }
                }
            }
            Some(_) => Ok(Progress::Done),
            None => invariant!("{} is not a type expression", id),
        }
    }

    fn lookup(&self, ast: &Ast, id: NodeId, names: &[String]) -> TypeLookup {
        let pool = self.ctx.pool;
        if let [name] = names {
            if let Some(alias) = find_typedef(ast, id, name) {
                return match self.typedef_type(ast, alias) {
                    Some(ty) => TypeLookup::Type(ty),
                    None => TypeLookup::Pending,
                };
            }
            if BUILTIN_TYPES.contains(&name.as_str()) {
                return TypeLookup::Type(pool.class_type(name.as_str()));
            }
        }
        match self.ctx.symbols.lookup_name(self.ctx.scope, &names.join(".")) {
            Lookup::Found(Component::Type(ty)) => TypeLookup::Type(ty),
            Lookup::Found(_) => TypeLookup::NotAType,
            Lookup::NotFound => TypeLookup::Pending,
            Lookup::NotYetResolvable => TypeLookup::Waiting,
        }
    }

    /// The fully resolved type a typedef names, if it is known yet.
    pub fn typedef_type(&self, ast: &Ast, alias: NodeId) -> Option<ConstId> {
        let Some(Stmt::Typedef { ty, .. }) = ast.stmt(alias) else {
            return None;
        };
        let current = self.current_type(ast, *ty).ok().flatten()?;
        match self.ctx.pool.is_resolved(current) {
            Ok(true) => self.ctx.pool.canonical(current).ok(),
            _ => None,
        }
    }

    /// The type `id` denotes so far, assembled from its children. May still depend on
    /// placeholders.
    pub fn current_type(&self, ast: &Ast, id: NodeId) -> Result<Option<ConstId>> {
        let pool = self.ctx.pool;
        if ast.stage(id).is_failed() {
            return Ok(None);
        }
        let Some(ty) = ast.type_expr(id) else {
            invariant!("{} is not a type expression", id);
        };
        let children = |ids: &[NodeId]| -> Result<Option<Vec<ConstId>>> {
            ids.iter()
                .map(|child| self.current_type(ast, *child))
                .collect()
        };
        Ok(match ty {
            TypeExpr::Named { params, .. } => {
                match (ast.state(id).ty, children(params)?) {
                    (Some(base), Some(params)) => Some(pool.parameterized_type(base, params)),
                    _ => None,
                }
            }
            TypeExpr::Keyword(_) => ast.state(id).ty,
            TypeExpr::Tuple(elements) => children(elements)?.map(|types| pool.tuple_type(types)),
            TypeExpr::Nullable(inner) => self
                .current_type(ast, *inner)?
                .map(|inner| pool.nullable_type(inner)),
            TypeExpr::Bad(_) => None,
        })
    }

    /// Validation step: the canonical type of `id`, or `None` when it cannot be had.
    pub fn resolve_type(
        &self,
        ast: &mut Ast,
        id: NodeId,
        errs: &dyn ErrorListener,
    ) -> Result<Option<ConstId>> {
        let pool = self.ctx.pool;
        if let Some(TypeExpr::Bad(text)) = ast.type_expr(id) {
            errs.log(
                Diagnostic::error(ErrorCode::NameUnresolvable)
                    .with_arg(text)
                    .with_span(ast.span(id)),
            );
            return Ok(None);
        }
        let Some(current) = self.current_type(ast, id)? else {
            return Ok(None);
        };
        if !pool.is_resolved(current)? {
            // the unresolved leaf was reported when resolution gave up
            return Ok(None);
        }
        let ty = pool.canonical(current)?;
        ast.state_mut(id).ty = Some(ty);
        Ok(Some(ty))
    }
}
