mod support;

use itertools::Itertools;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use support::{compile, unit_with_body};
use xc_compiler::{CompileOptions, CompileSession, UnitStatus};
use xc_core::ast::{Ast, AstBuilder, BinaryOp, Keyword};
use xc_core::diagnostics::{ErrorCode, Severity};
use xc_core::pool::ConstantPool;

/// `module app { method <name>(Int n) { Int i = 0; while (i < n) { i = i + 1; } } }`
fn counting_unit(name: &str) -> Ast {
    let mut b = AstBuilder::new();
    let n_ty = b.ty("Int");
    let i_ty = b.ty("Int");
    let zero = b.int(0);
    let decl = b.var(i_ty, "i", Some(zero));
    let i = b.name("i");
    let n = b.name("n");
    let test = b.binary(BinaryOp::Lt, i, n);
    let i2 = b.name("i");
    let one = b.int(1);
    let next = b.binary(BinaryOp::Add, i2, one);
    let step = b.assign("i", next);
    let loop_body = b.block(vec![step]);
    let lp = b.while_loop(vec![test], loop_body);
    let body = b.block(vec![decl, lp]);
    let method = b.method(name, vec![("n", n_ty)], vec![], body);
    let module = b.module("app", vec![method]);
    b.finish(module)
}

#[test]
fn units_compile_concurrently_on_one_session() {
    let session = CompileSession::default();
    let names = ["alpha", "beta", "gamma", "delta"];
    let outcomes = std::thread::scope(|scope| {
        let handles = names
            .iter()
            .map(|name| {
                let session = &session;
                scope.spawn(move || {
                    let mut ast = counting_unit(name);
                    let outcome = compile(session, &mut ast);
                    (outcome, ast)
                })
            })
            .collect_vec();
        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .collect_vec()
    });
    assert_eq!(outcomes.len(), names.len());

    let mut scopes = HashSet::new();
    for ((outcome, ast), name) in outcomes.iter().zip(names) {
        assert_eq!(outcome.status, UnitStatus::Emitted, "{:?}", outcome.diagnostics);
        let code = outcome.method(name).map(|m| m.ops.clone()).unwrap_or_default();
        assert!(!code.is_empty());
        let Some(root) = ast.root() else {
            panic!("{} has no root", name);
        };
        let minted = ast
            .preorder(root)
            .into_iter()
            .filter_map(|id| ast.state(id).label_scope)
            .collect_vec();
        assert!(!minted.is_empty());
        for scope in minted {
            assert!(scopes.insert(scope), "label scope {} minted twice", scope);
        }
    }
    // same source, same code, whichever thread ran it
    let firsts: Vec<_> = outcomes
        .iter()
        .zip(names)
        .filter_map(|((outcome, _), name)| outcome.method(name))
        .map(|method| method.ops.iter().map(|op| op.mnemonic()).collect_vec())
        .dedup()
        .collect();
    assert_eq!(firsts.len(), 1);
}

#[test]
fn interning_from_many_threads_agrees() {
    let pool = Arc::new(ConstantPool::new());
    let ids = std::thread::scope(|scope| {
        let handles = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                scope.spawn(move || {
                    (0..64)
                        .map(|n| (pool.int(n), pool.string(format!("s{}", n))))
                        .collect_vec()
                })
            })
            .collect_vec();
        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .collect_vec()
    });
    assert_eq!(ids.len(), 8);
    assert!(ids.iter().all_equal());
    for (n, (int, string)) in ids[0].iter().enumerate() {
        assert_eq!(pool.as_int(*int).ok().flatten(), Some(n as i64));
        assert_eq!(pool.describe(*string), format!("\"s{}\"", n));
    }
}

#[test]
fn failed_unit_leaves_its_neighbours_alone() {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let brk = b.brk(None);
    let mut broken = unit_with_body(b, "broken", vec![brk]);
    let mut fine = counting_unit("fine");

    let first = compile(&session, &mut broken);
    let second = compile(&session, &mut fine);
    assert_eq!(first.status, UnitStatus::Failed);
    assert_eq!(second.status, UnitStatus::Emitted);
    assert!(second.diagnostics.is_empty());
}

#[test]
fn non_type_keyword_abandons_the_unit() {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let ty = b.keyword_type(Keyword::Import);
    let decl = b.var(ty, "x", None);
    let mut ast = unit_with_body(b, "run", vec![decl]);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Abandoned);
    assert_eq!(outcome.count(ErrorCode::InternalError), 1);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Fatal);
    assert!(outcome.resolve.is_none());
}

#[test]
fn error_cap_abandons_the_unit() {
    let session = CompileSession::new(CompileOptions::default().with_max_errors(1));
    let mut b = AstBuilder::new();
    let first = b.ty("foo.One");
    let one = b.var(first, "a", None);
    let second = b.ty("foo.Two");
    let two = b.var(second, "b", None);
    let mut ast = unit_with_body(b, "run", vec![one, two]);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Abandoned);
    assert!(outcome.methods.is_empty());
}

#[test]
fn copied_method_is_structurally_equal() {
    let mut ast = counting_unit("copy");
    let Some(root) = ast.root() else {
        panic!("unit has no root");
    };
    let copy = ast.copy_subtree(root);
    assert_ne!(copy, root);
    assert!(ast.structurally_equal(root, copy));
    assert_eq!(ast.preorder(root).len(), ast.preorder(copy).len());
    assert!(ast.parent(copy).is_none());
}
