#![allow(dead_code)]
use std::sync::Once;
use xc_compiler::{CompileSession, StaticSymbolTable, UnitOutcome};
use xc_core::ast::{Ast, AstBuilder, NodeId};

static TRACING: Once = Once::new();

/// Route compiler logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Wrap `stmts` into `module app { method <name>() { stmts } }`.
pub fn unit_with_body(mut b: AstBuilder, name: &str, stmts: Vec<NodeId>) -> Ast {
    let body = b.block(stmts);
    let method = b.method(name, vec![], vec![], body);
    let module = b.module("app", vec![method]);
    b.finish(module)
}

pub fn compile(session: &CompileSession, ast: &mut Ast) -> UnitOutcome {
    compile_with(session, ast, &StaticSymbolTable::new())
}

pub fn compile_with(
    session: &CompileSession,
    ast: &mut Ast,
    symbols: &StaticSymbolTable,
) -> UnitOutcome {
    init_tracing();
    session.compile_unit(ast, symbols)
}
