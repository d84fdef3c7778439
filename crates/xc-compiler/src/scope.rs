//! Lexical lookups over the tree: locals, parameters and block-scoped typedefs.

use xc_core::ast::{Ast, NodeId, Stmt};

/// Find the declaration `name` refers to at `from`.
///
/// Locals are visible after their declaration in the enclosing blocks; a declare-and-test
/// condition is visible to later conditions and to the statement's body (the `then` branch of an
/// `if`). Parameters bind to their type node. The search stops at the enclosing method.
pub fn find_local(ast: &Ast, from: NodeId, name: &str) -> Option<NodeId> {
    let mut child = from;
    for parent in ast.ancestors(from) {
        let Some(stmt) = ast.stmt(parent) else {
            child = parent;
            continue;
        };
        let found = match stmt {
            Stmt::Block(stmts) => declared_before(ast, stmts, child, name),
            Stmt::If {
                conds, else_branch, ..
            } if Some(child) != *else_branch => declared_before(ast, conds, child, name),
            Stmt::While { conds, .. } => declared_before(ast, conds, child, name),
            Stmt::For { init, conds, .. } => declared_before(ast, conds, child, name)
                .or_else(|| declared_before(ast, init, child, name)),
            Stmt::Method { params, .. } => {
                return params
                    .iter()
                    .rev()
                    .find(|param| param.name == name)
                    .map(|param| param.ty);
            }
            _ => None,
        };
        if found.is_some() {
            return found;
        }
        child = parent;
    }
    None
}

/// Latest declaration of `name` among `list` entries before `child` (all of them when `child`
/// is not in the list).
fn declared_before(ast: &Ast, list: &[NodeId], child: NodeId, name: &str) -> Option<NodeId> {
    let end = list
        .iter()
        .position(|id| *id == child)
        .unwrap_or(list.len());
    list[..end]
        .iter()
        .rev()
        .copied()
        .find(|id| ast.stmt(*id).and_then(Stmt::declared_name) == Some(name))
}

/// Find the typedef named `name` visible at `from`. Typedefs are visible to their whole block,
/// including statements before them.
pub fn find_typedef(ast: &Ast, from: NodeId, name: &str) -> Option<NodeId> {
    for parent in ast.ancestors(from) {
        match ast.stmt(parent) {
            Some(Stmt::Block(stmts)) => {
                let found = stmts.iter().copied().find(|id| {
                    matches!(ast.stmt(*id), Some(Stmt::Typedef { name: alias, .. }) if alias == name)
                });
                if found.is_some() {
                    return found;
                }
            }
            Some(Stmt::Method { .. }) => return None,
            _ => {}
        }
    }
    None
}

/// The qualified module name of the unit containing `id`.
pub fn module_name(ast: &Ast, id: NodeId) -> String {
    std::iter::once(id)
        .chain(ast.ancestors(id))
        .find_map(|node| match ast.stmt(node) {
            Some(Stmt::Module { name, .. }) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// The method enclosing `id`.
pub fn enclosing_method(ast: &Ast, id: NodeId) -> Option<NodeId> {
    ast.ancestors(id)
        .find(|node| matches!(ast.stmt(*node), Some(Stmt::Method { .. })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xc_core::ast::AstBuilder;

    #[test]
    fn locals_are_visible_after_their_declaration() {
        let mut b = AstBuilder::new();
        let early = b.name("x");
        let early_stmt = b.expr_stmt(early);
        let ty = b.ty("Int");
        let decl = b.var(ty, "x", None);
        let late = b.name("x");
        let late_stmt = b.expr_stmt(late);
        let block = b.block(vec![early_stmt, decl, late_stmt]);
        let ast = b.finish(block);
        assert_eq!(find_local(&ast, early, "x"), None);
        assert_eq!(find_local(&ast, late, "x"), Some(decl));
    }

    #[test]
    fn cond_decl_is_visible_in_then_branch_only() {
        let mut b = AstBuilder::new();
        let ty = b.ty("String");
        let value = b.name("maybe");
        let cond = b.cond_decl(ty, "s", value);
        let then_use = b.name("s");
        let then_stmt = b.expr_stmt(then_use);
        let else_use = b.name("s");
        let else_stmt = b.expr_stmt(else_use);
        let stmt = b.if_else(vec![cond], then_stmt, Some(else_stmt));
        let ast = b.finish(stmt);
        assert_eq!(find_local(&ast, then_use, "s"), Some(cond));
        assert_eq!(find_local(&ast, else_use, "s"), None);
    }

    #[test]
    fn typedefs_are_forward_visible() {
        let mut b = AstBuilder::new();
        let use_ty = b.ty("Key");
        let decl = b.var(use_ty, "k", None);
        let target = b.ty("String");
        let alias = b.typedef("Key", target);
        let block = b.block(vec![decl, alias]);
        let params = vec![];
        let method = b.method("m", params, vec![], block);
        let module = b.module("app", vec![method]);
        let ast = b.finish(module);
        assert_eq!(find_typedef(&ast, use_ty, "Key"), Some(alias));
        assert_eq!(module_name(&ast, use_ty), "app");
        assert_eq!(enclosing_method(&ast, use_ty), Some(method));
    }
}
