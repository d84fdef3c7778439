//! Per-node name resolution, driven by the stage manager.

use crate::scope::{find_local, find_typedef};
use crate::symbols::Lookup;
use crate::types::{Progress, TypeResolver};
use crate::UnitContext;
use xc_core::ast::{Ast, Expr, NameBinding, NodeId, NodeKind, TypeExpr};
use xc_core::diagnostics::ErrorListener;
use xc_core::pool::BUILTIN_TYPES;
use xc_core::Result;

enum NameLookup {
    Bound(NameBinding),
    Pending,
    Waiting,
}

pub struct NameResolver<'a> {
    ctx: UnitContext<'a>,
    types: TypeResolver<'a>,
}

impl<'a> NameResolver<'a> {
    pub fn new(ctx: UnitContext<'a>) -> Self {
        Self {
            ctx,
            types: TypeResolver::new(ctx),
        }
    }

    /// Nodes whose resolution can be deferred: named types and names.
    pub fn is_deferrable(ast: &Ast, id: NodeId) -> bool {
        matches!(
            ast.kind(id),
            NodeKind::Type(TypeExpr::Named { .. }) | NodeKind::Expr(Expr::Name(_))
        )
    }

    /// The name to report when `id` never resolves.
    pub fn unresolved_name(ast: &Ast, id: NodeId) -> String {
        match ast.kind(id) {
            NodeKind::Type(ty) => ty.qualified_name().unwrap_or_default(),
            NodeKind::Expr(Expr::Name(name)) => name.clone(),
            _ => id.to_string(),
        }
    }

    pub fn resolve(&self, ast: &mut Ast, id: NodeId, errs: &dyn ErrorListener) -> Result<Progress> {
        match ast.kind(id) {
            NodeKind::Type(_) => self.types.resolve_names(ast, id, errs),
            NodeKind::Expr(Expr::Name(name)) => {
                let name = name.clone();
                Ok(match self.bind_name(ast, id, &name) {
                    NameLookup::Bound(binding) => {
                        tracing::trace!("{} bound {} to {:?}", id, name, binding);
                        ast.state_mut(id).binding = Some(binding);
                        Progress::Done
                    }
                    NameLookup::Pending => Progress::Deferred,
                    NameLookup::Waiting => Progress::Waiting,
                })
            }
            _ => Ok(Progress::Done),
        }
    }

    fn bind_name(&self, ast: &Ast, id: NodeId, name: &str) -> NameLookup {
        if !name.contains('.') {
            if let Some(decl) = find_local(ast, id, name) {
                return NameLookup::Bound(NameBinding::Local { decl });
            }
            if let Some(alias) = find_typedef(ast, id, name) {
                return match self.types.typedef_type(ast, alias) {
                    Some(ty) => NameLookup::Bound(NameBinding::Type(ty)),
                    None => NameLookup::Pending,
                };
            }
            if BUILTIN_TYPES.contains(&name) {
                return NameLookup::Bound(NameBinding::Type(self.ctx.pool.class_type(name)));
            }
        }
        match self.ctx.symbols.lookup_name(self.ctx.scope, name) {
            Lookup::Found(component) => NameLookup::Bound(component.into()),
            Lookup::NotFound => NameLookup::Pending,
            Lookup::NotYetResolvable => NameLookup::Waiting,
        }
    }
}
