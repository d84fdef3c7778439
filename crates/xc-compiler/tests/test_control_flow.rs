mod support;

use pretty_assertions::assert_eq;
use support::{compile, unit_with_body};
use xc_bytecode::{Label, LabelKind, Op, Register};
use xc_compiler::{CompileOptions, CompileSession, UnitStatus};
use xc_core::ast::{AstBuilder, BinaryOp};
use xc_core::diagnostics::{ErrorCode, Severity};

fn mnemonics(ops: &[Op]) -> Vec<&'static str> {
    ops.iter().map(Op::mnemonic).collect()
}

#[test]
fn break_without_a_target_emits_nothing() {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let brk = b.brk(None);
    let mut ast = unit_with_body(b, "run", vec![brk]);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Failed);
    assert_eq!(outcome.count(ErrorCode::MissingGotoTarget), 1);
    assert_eq!(
        outcome.diagnostics[0].message(),
        ErrorCode::MissingGotoTarget.format(&["break".to_string()])
    );
    assert!(outcome.methods.is_empty());
}

#[test]
fn labeled_continue_to_a_block_is_illegal() {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let cont = b.cont(Some("outer"));
    let block = b.block(vec![cont]);
    let labeled = b.labeled("outer", block);
    let mut ast = unit_with_body(b, "run", vec![labeled]);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Failed);
    assert_eq!(outcome.count(ErrorCode::IllegalContinueTarget), 1);
    assert_eq!(outcome.count(ErrorCode::MissingGotoLabel), 0);
}

#[test]
fn labeled_break_leaves_the_labeled_statement() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let flag = b.ty("Boolean");
    let brk = b.brk(Some("out"));
    let inner = b.block(vec![brk]);
    let cond = b.name("flag");
    let lp = b.while_loop(vec![cond], inner);
    let labeled = b.labeled("out", lp);
    let body = b.block(vec![labeled]);
    let method = b.method("run", vec![("flag", flag)], vec![], body);
    let module = b.module("app", vec![method]);
    let mut ast = b.finish(module);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Emitted, "{:?}", outcome.diagnostics);
    let scope = ast
        .state(labeled)
        .label_scope
        .ok_or_else(|| eyre::eyre!("labeled statement has no labels"))?;
    let run = outcome.method("run").ok_or_else(|| eyre::eyre!("run not emitted"))?;
    let exit = Label::new(scope, LabelKind::Break);
    assert!(run.ops.contains(&Op::Jump(exit)));
    assert_eq!(run.label_offset(exit), Some(run.ops.len() - 1));
    Ok(())
}

#[test]
fn while_with_break_and_continue() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let (tc, tx) = (b.ty("Boolean"), b.ty("Boolean"));
    let brk = b.brk(None);
    let cont = b.cont(None);
    let x = b.name("x");
    let branch = b.if_else(vec![x], brk, Some(cont));
    let dead = b.ret(vec![]);
    let loop_body = b.block(vec![branch, dead]);
    let cond = b.name("cond");
    let lp = b.while_loop(vec![cond], loop_body);
    let body = b.block(vec![lp]);
    let method = b.method("spin", vec![("cond", tc), ("x", tx)], vec![], body);
    let module = b.module("app", vec![method]);
    let mut ast = b.finish(module);

    let outcome = compile(&session, &mut ast);
    assert!(outcome.is_emitted(), "{:?}", outcome.diagnostics);
    let spin = outcome.method("spin").ok_or_else(|| eyre::eyre!("spin not emitted"))?;
    assert_eq!(
        mnemonics(&spin.ops),
        vec!["JMP", "JMP_FALSE", "JMP", "JMP", "JMP_TRUE", "RETURN_0"]
    );
    let scope = ast
        .state(lp)
        .label_scope
        .ok_or_else(|| eyre::eyre!("loop has no labels"))?;
    assert_eq!(spin.label_offset(Label::new(scope, LabelKind::Repeat)), Some(1));
    assert_eq!(spin.label_offset(Label::new(scope, LabelKind::Continue)), Some(4));
    assert_eq!(spin.label_offset(Label::new(scope, LabelKind::Break)), Some(5));

    // the return after the if is dead: one warning, nothing serious
    assert_eq!(outcome.count(ErrorCode::NotReachable), 1);
    assert!(outcome
        .diagnostics
        .iter()
        .all(|d| d.severity == Severity::Warning));
    Ok(())
}

#[test]
fn unreachable_warning_can_be_turned_off() {
    let session = CompileSession::new(CompileOptions::default().with_warn_unreachable(false));
    let mut b = AstBuilder::new();
    let ret = b.ret(vec![]);
    let one = b.int(1);
    let dead = b.expr_stmt(one);
    let mut ast = unit_with_body(b, "run", vec![ret, dead]);

    let outcome = compile(&session, &mut ast);
    assert!(outcome.is_emitted());
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(ast.state(dead).reachable, Some(false));
}

#[test]
fn constant_tuple_statement_emits_no_ops() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let a = b.string("a");
    let tuple = b.tuple(vec![one, a]);
    let stmt = b.expr_stmt(tuple);
    let mut ast = unit_with_body(b, "run", vec![stmt]);

    let outcome = compile(&session, &mut ast);
    let run = outcome.method("run").ok_or_else(|| eyre::eyre!("run not emitted"))?;
    assert_eq!(run.ops, vec![Op::Return0]);
    let value = ast
        .state(tuple)
        .constant
        .ok_or_else(|| eyre::eyre!("tuple was not folded"))?;
    assert_eq!(session.pool().describe(value), "(1, \"a\")");
    Ok(())
}

#[test]
fn conditions_jump_to_else_one_by_one() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let (ta, tb) = (b.ty("Int"), b.ty("Int"));
    let a = b.name("a");
    let zero = b.int(0);
    let positive = b.binary(BinaryOp::Gt, a, zero);
    let a2 = b.name("a");
    let b_name = b.name("b");
    let smaller = b.binary(BinaryOp::Lt, a2, b_name);
    let then = b.block(vec![]);
    let stmt = b.if_then(vec![positive, smaller], then);
    let body = b.block(vec![stmt]);
    let method = b.method("check", vec![("a", ta), ("b", tb)], vec![], body);
    let module = b.module("app", vec![method]);
    let mut ast = b.finish(module);

    let outcome = compile(&session, &mut ast);
    let check = outcome.method("check").ok_or_else(|| eyre::eyre!("check not emitted"))?;
    let scope = ast
        .state(stmt)
        .label_scope
        .ok_or_else(|| eyre::eyre!("if has no labels"))?;
    let otherwise = Label::new(scope, LabelKind::Else);
    let jumps: Vec<&Op> = check
        .ops
        .iter()
        .filter(|op| op.target() == Some(otherwise))
        .collect();
    assert_eq!(jumps.len(), 2);
    assert_eq!(
        mnemonics(&check.ops),
        vec!["BINOP", "JMP_FALSE", "BINOP", "JMP_FALSE", "RETURN_0"]
    );
    // each test reads the register written just before it
    assert_eq!(
        check.ops[1],
        Op::JumpFalse {
            cond: Register(2).into(),
            target: otherwise
        }
    );
    Ok(())
}

#[test]
fn constant_false_condition_skips_the_branch() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let no = b.bool_lit(false);
    let ret = b.ret(vec![]);
    let then = b.block(vec![ret]);
    let stmt = b.if_then(vec![no], then);
    let mut ast = unit_with_body(b, "run", vec![stmt]);

    let outcome = compile(&session, &mut ast);
    let run = outcome.method("run").ok_or_else(|| eyre::eyre!("run not emitted"))?;
    assert_eq!(mnemonics(&run.ops), vec!["JMP", "RETURN_0"]);
    assert_eq!(ast.state(then).reachable, Some(false));
    Ok(())
}

fn scope_ops(ops: &[Op]) -> (usize, usize) {
    let enters = ops.iter().filter(|op| **op == Op::Enter).count();
    let exits = ops.iter().filter(|op| **op == Op::Exit).count();
    (enters, exits)
}

#[test]
fn break_exits_the_scope_it_leaves() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let tc = b.ty("Boolean");
    let (ty, zero) = (b.ty("Int"), b.int(0));
    let local = b.var(ty, "y", Some(zero));
    let brk = b.brk(None);
    let loop_body = b.block(vec![local, brk]);
    let cond = b.name("cond");
    let lp = b.while_loop(vec![cond], loop_body);
    let body = b.block(vec![lp]);
    let method = b.method("run", vec![("cond", tc)], vec![], body);
    let module = b.module("app", vec![method]);
    let mut ast = b.finish(module);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Emitted, "{:?}", outcome.diagnostics);
    let run = outcome.method("run").ok_or_else(|| eyre::eyre!("run not emitted"))?;
    assert_eq!(
        mnemonics(&run.ops),
        vec!["JMP", "ENTER", "VAR", "MOV", "EXIT", "JMP", "JMP_TRUE", "RETURN_0"]
    );
    assert_eq!(scope_ops(&run.ops), (1, 1));
    assert_eq!(ast.state(brk).goto.map(|goto| goto.depth), Some(1));
    Ok(())
}

#[test]
fn continue_in_a_for_body_exits_before_the_update() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let n_ty = b.ty("Int");
    let (i_ty, zero) = (b.ty("Int"), b.int(0));
    let init = b.var(i_ty, "i", Some(zero));
    let (i, n) = (b.name("i"), b.name("n"));
    let test = b.binary(BinaryOp::Lt, i, n);
    let (i2, one) = (b.name("i"), b.int(1));
    let next = b.binary(BinaryOp::Add, i2, one);
    let update = b.assign("i", next);
    let (y_ty, i3) = (b.ty("Int"), b.name("i"));
    let local = b.var(y_ty, "y", Some(i3));
    let cont = b.cont(None);
    let loop_body = b.block(vec![local, cont]);
    let lp = b.for_loop(vec![init], vec![test], vec![update], loop_body);
    let body = b.block(vec![lp]);
    let method = b.method("walk", vec![("n", n_ty)], vec![], body);
    let module = b.module("app", vec![method]);
    let mut ast = b.finish(module);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Emitted, "{:?}", outcome.diagnostics);
    let walk = outcome.method("walk").ok_or_else(|| eyre::eyre!("walk not emitted"))?;
    let scope = ast
        .state(lp)
        .label_scope
        .ok_or_else(|| eyre::eyre!("loop has no labels"))?;
    let next_round = Label::new(scope, LabelKind::Continue);
    let jump = walk
        .ops
        .iter()
        .position(|op| *op == Op::Jump(next_round))
        .ok_or_else(|| eyre::eyre!("continue not emitted"))?;
    assert_eq!(walk.ops[jump - 1], Op::Exit);
    // the for scope and the body scope, each closed once on every path
    assert_eq!(scope_ops(&walk.ops), (2, 2));
    assert_eq!(walk.ops.last(), Some(&Op::Return0));
    assert_eq!(walk.ops[walk.ops.len() - 2], Op::Exit);
    Ok(())
}

#[test]
fn continue_from_a_switch_case_reaches_the_loop() -> eyre::Result<()> {
    let session = CompileSession::default();
    let mut b = AstBuilder::new();
    let (tc, tx) = (b.ty("Boolean"), b.ty("Int"));
    let (ty, zero) = (b.ty("Int"), b.int(0));
    let local = b.var(ty, "y", Some(zero));
    let cont = b.cont(None);
    let case_body = b.block(vec![local, cont]);
    let one = b.int(1);
    let first = b.case(vec![one], case_body);
    let brk = b.brk(None);
    let fallback = b.default_case(brk);
    let x = b.name("x");
    let switch = b.switch(x, vec![first, fallback]);
    let loop_body = b.block(vec![switch]);
    let cond = b.name("cond");
    let lp = b.while_loop(vec![cond], loop_body);
    let body = b.block(vec![lp]);
    let method = b.method("pick", vec![("cond", tc), ("x", tx)], vec![], body);
    let module = b.module("app", vec![method]);
    let mut ast = b.finish(module);

    let outcome = compile(&session, &mut ast);
    assert_eq!(outcome.status, UnitStatus::Emitted, "{:?}", outcome.diagnostics);
    let pick = outcome.method("pick").ok_or_else(|| eyre::eyre!("pick not emitted"))?;
    assert_eq!(ast.state(cont).goto.map(|goto| goto.target), Some(lp));
    assert_eq!(ast.state(cont).goto.map(|goto| goto.depth), Some(1));
    assert_eq!(ast.state(brk).goto.map(|goto| goto.target), Some(switch));
    assert_eq!(ast.state(brk).goto.map(|goto| goto.depth), Some(0));
    assert_eq!(
        mnemonics(&pick.ops),
        vec![
            "JMP", "JMP_EQ", "JMP", "ENTER", "VAR", "MOV", "EXIT", "JMP", "JMP", "JMP_TRUE",
            "RETURN_0"
        ]
    );
    assert_eq!(scope_ops(&pick.ops), (1, 1));
    Ok(())
}
