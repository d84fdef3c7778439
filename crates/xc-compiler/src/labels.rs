//! Binding of break/continue statements to the statements they leave.

use std::sync::atomic::AtomicU32;
use xc_core::ast::{Ast, GotoBinding, GotoKind, NodeId, Stmt};
use xc_core::diagnostics::{Diagnostic, ErrorCode, ErrorListener};

/// Bind the break or continue statement `goto` to its target, minting the target's label scope.
///
/// Returns `None` after logging a diagnostic when no target exists.
pub fn resolve_goto(
    ast: &mut Ast,
    goto: NodeId,
    label_scopes: &AtomicU32,
    errs: &dyn ErrorListener,
) -> Option<GotoBinding> {
    let (kind, label) = match ast.stmt(goto) {
        Some(Stmt::Break(label)) => (GotoKind::Break, label.clone()),
        Some(Stmt::Continue(label)) => (GotoKind::Continue, label.clone()),
        _ => return None,
    };
    if let Some(binding) = ast.state(goto).goto {
        return Some(binding);
    }
    let ancestors: Vec<NodeId> = ast
        .ancestors(goto)
        .take_while(|id| !matches!(ast.stmt(*id), Some(Stmt::Method { .. })))
        .collect();

    let target = match &label {
        Some(label) => find_labeled(ast, &ancestors, goto, label, kind, errs)?,
        None => {
            let found = ancestors.iter().copied().find(|id| {
                ast.stmt(*id).is_some_and(|stmt| match kind {
                    GotoKind::Break => stmt.is_break_target(),
                    GotoKind::Continue => stmt.is_loop(),
                })
            });
            match found {
                Some(target) => target,
                None => {
                    let keyword = match kind {
                        GotoKind::Break => "break",
                        GotoKind::Continue => "continue",
                    };
                    errs.log(
                        Diagnostic::error(ErrorCode::MissingGotoTarget)
                            .with_arg(keyword)
                            .with_span(ast.span(goto)),
                    );
                    return None;
                }
            }
        }
    };

    let depth = ancestors
        .iter()
        .take_while(|id| **id != target)
        .filter(|id| ast.enters_scope(**id))
        .count();
    ast.label_scope(target, label_scopes);
    let state = ast.state_mut(target);
    match kind {
        GotoKind::Break => state.break_used = true,
        GotoKind::Continue => state.continue_used = true,
    }
    let binding = GotoBinding {
        target,
        depth,
        kind,
    };
    tracing::trace!("{} bound to {} at depth {}", goto, target, depth);
    ast.state_mut(goto).goto = Some(binding);
    Some(binding)
}

fn find_labeled(
    ast: &Ast,
    ancestors: &[NodeId],
    goto: NodeId,
    label: &str,
    kind: GotoKind,
    errs: &dyn ErrorListener,
) -> Option<NodeId> {
    let labeled = ancestors.iter().copied().find_map(|id| match ast.stmt(id) {
        Some(Stmt::Labeled { label: name, body }) if name == label => Some((id, *body)),
        _ => None,
    });
    let Some((labeled, body)) = labeled else {
        errs.log(
            Diagnostic::error(ErrorCode::MissingGotoLabel)
                .with_arg(label)
                .with_span(ast.span(goto)),
        );
        return None;
    };
    match kind {
        GotoKind::Break => Some(labeled),
        GotoKind::Continue if ast.stmt(body).is_some_and(Stmt::is_loop) => Some(body),
        GotoKind::Continue => {
            errs.log(
                Diagnostic::error(ErrorCode::IllegalContinueTarget)
                    .with_arg(label)
                    .with_span(ast.span(goto)),
            );
            None
        }
    }
}

/// Report a label that shadows an enclosing label of the same name.
pub fn check_duplicate_label(ast: &Ast, labeled: NodeId, errs: &dyn ErrorListener) -> bool {
    let Some(Stmt::Labeled { label, .. }) = ast.stmt(labeled) else {
        return true;
    };
    let shadowed = ast
        .ancestors(labeled)
        .take_while(|id| !matches!(ast.stmt(*id), Some(Stmt::Method { .. })))
        .any(|id| matches!(ast.stmt(id), Some(Stmt::Labeled { label: outer, .. }) if outer == label));
    if shadowed {
        errs.log(
            Diagnostic::error(ErrorCode::DuplicateLabel)
                .with_arg(label)
                .with_span(ast.span(labeled)),
        );
    }
    !shadowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xc_core::ast::AstBuilder;
    use xc_core::diagnostics::ErrorList;

    #[test]
    fn unlabeled_break_binds_nearest_loop() {
        let mut b = AstBuilder::new();
        let brk = b.brk(None);
        let then = b.block(vec![brk]);
        let cond = b.name("x");
        let stmt = b.if_then(vec![cond], then);
        let body = b.block(vec![stmt]);
        let flag = b.bool_lit(true);
        let lp = b.while_loop(vec![flag], body);
        let mut ast = b.finish(lp);
        let counter = AtomicU32::new(3);
        let errs = ErrorList::default();

        let binding = resolve_goto(&mut ast, brk, &counter, &errs).expect("bound");
        assert_eq!(binding.target, lp);
        // nothing in between declares locals
        assert_eq!(binding.depth, 0);
        assert_eq!(ast.state(lp).label_scope, Some(3));
        assert!(ast.state(lp).break_used);
        assert!(!ast.state(lp).continue_used);
        assert!(errs.is_empty());
    }

    #[test]
    fn depth_counts_entered_scopes_only() {
        let mut b = AstBuilder::new();
        let brk = b.brk(None);
        let then = b.block(vec![brk]);
        let (decl_ty, maybe) = (b.ty("String"), b.name("maybe"));
        let cond = b.cond_decl(decl_ty, "s", maybe);
        let stmt = b.if_then(vec![cond], then);
        let (ty, zero) = (b.ty("Int"), b.int(0));
        let local = b.var(ty, "y", Some(zero));
        let body = b.block(vec![local, stmt]);
        let flag = b.name("more");
        let lp = b.while_loop(vec![flag], body);
        let mut ast = b.finish(lp);
        let errs = ErrorList::default();

        let binding = resolve_goto(&mut ast, brk, &AtomicU32::new(0), &errs).expect("bound");
        // the if declaring `s` and the body declaring `y`
        assert_eq!(binding.depth, 2);
        assert!(!ast.enters_scope(then));
        assert!(!ast.enters_scope(lp));
    }

    #[test]
    fn labeled_break_leaves_the_for_scope_too() {
        let mut b = AstBuilder::new();
        let brk = b.brk(Some("out"));
        let (ty, zero) = (b.ty("Int"), b.int(0));
        let local = b.var(ty, "y", Some(zero));
        let body = b.block(vec![local, brk]);
        let lp = b.for_loop(vec![], vec![], vec![], body);
        let labeled = b.labeled("out", lp);
        let mut ast = b.finish(labeled);
        let errs = ErrorList::default();

        let binding = resolve_goto(&mut ast, brk, &AtomicU32::new(0), &errs).expect("bound");
        assert_eq!(binding.target, labeled);
        assert_eq!(binding.depth, 2);
    }

    #[test]
    fn break_outside_any_loop_is_missing_target() {
        let mut b = AstBuilder::new();
        let brk = b.brk(None);
        let block = b.block(vec![brk]);
        let mut ast = b.finish(block);
        let errs = ErrorList::default();
        assert_eq!(resolve_goto(&mut ast, brk, &AtomicU32::new(0), &errs), None);
        assert_eq!(errs.count(ErrorCode::MissingGotoTarget), 1);
        assert_eq!(errs.diagnostics()[0].args, vec!["break".to_string()]);
    }

    #[test]
    fn labeled_continue_needs_a_loop() {
        let mut b = AstBuilder::new();
        let cont = b.cont(Some("outer"));
        let block = b.block(vec![cont]);
        let labeled = b.labeled("outer", block);
        let mut ast = b.finish(labeled);
        let errs = ErrorList::default();
        assert_eq!(resolve_goto(&mut ast, cont, &AtomicU32::new(0), &errs), None);
        assert_eq!(errs.count(ErrorCode::IllegalContinueTarget), 1);
        assert_eq!(errs.count(ErrorCode::MissingGotoLabel), 0);
    }

    #[test]
    fn unknown_label_is_missing_label() {
        let mut b = AstBuilder::new();
        let brk = b.brk(Some("nowhere"));
        let body = b.block(vec![brk]);
        let flag = b.bool_lit(true);
        let lp = b.while_loop(vec![flag], body);
        let mut ast = b.finish(lp);
        let errs = ErrorList::default();
        assert_eq!(resolve_goto(&mut ast, brk, &AtomicU32::new(0), &errs), None);
        assert_eq!(errs.count(ErrorCode::MissingGotoLabel), 1);
    }

    #[test]
    fn labeled_continue_targets_the_labeled_loop() {
        let mut b = AstBuilder::new();
        let cont = b.cont(Some("outer"));
        let inner_body = b.block(vec![cont]);
        let inner_flag = b.name("more");
        let inner = b.while_loop(vec![inner_flag], inner_body);
        let outer_body = b.block(vec![inner]);
        let outer_flag = b.name("again");
        let outer = b.while_loop(vec![outer_flag], outer_body);
        let labeled = b.labeled("outer", outer);
        let mut ast = b.finish(labeled);
        let errs = ErrorList::default();
        let binding = resolve_goto(&mut ast, cont, &AtomicU32::new(0), &errs).expect("bound");
        assert_eq!(binding.target, outer);
        assert_eq!(binding.kind, GotoKind::Continue);
        assert!(ast.state(outer).continue_used);
    }

    #[test]
    fn shadowing_label_is_reported() {
        let mut b = AstBuilder::new();
        let brk = b.brk(Some("l"));
        let inner = b.labeled("l", brk);
        let outer = b.labeled("l", inner);
        let ast = b.finish(outer);
        let errs = ErrorList::default();
        assert!(check_duplicate_label(&ast, outer, &errs));
        assert!(!check_duplicate_label(&ast, inner, &errs));
        assert_eq!(errs.count(ErrorCode::DuplicateLabel), 1);
    }
}
