//! Emission of validated method bodies into register code.
//!
//! Reachability is tracked by the [`CodeBuffer`]: a terminal op makes the rest of the path
//! unreachable and a join label placed afterwards revives it only if some emitted jump targets
//! it. A statement that starts on an unreachable path is not emitted.

use crate::UnitContext;
use std::collections::HashMap;
use xc_bytecode::{CodeBuffer, Label, LabelKind, MethodCode, Op, Operand, Register};
use xc_core::ast::{Ast, BinaryOp, Expr, GotoKind, NameBinding, NodeId, Stage, Stmt, UnaryOp};
use xc_core::diagnostics::{Diagnostic, ErrorCode, ErrorListener};
use xc_core::Result;

pub struct Emitter<'a> {
    ast: &'a mut Ast,
    ctx: UnitContext<'a>,
    errs: &'a dyn ErrorListener,
    code: CodeBuffer,
    locals: HashMap<NodeId, Register>,
}

impl<'a> Emitter<'a> {
    pub fn new(ast: &'a mut Ast, ctx: UnitContext<'a>, errs: &'a dyn ErrorListener) -> Self {
        Self {
            ast,
            ctx,
            errs,
            code: CodeBuffer::new(),
            locals: HashMap::new(),
        }
    }

    pub fn emit_method(mut self, method: NodeId) -> Result<MethodCode> {
        let Some(Stmt::Method {
            name,
            params,
            returns,
            body,
        }) = self.ast.stmt(method).cloned()
        else {
            invariant!("{} is not a method", method);
        };
        for param in &params {
            let reg = self.code.new_register();
            self.locals.insert(param.ty, reg);
        }
        match self.ast.stmt(body).cloned() {
            Some(Stmt::Block(stmts)) => {
                self.ast.state_mut(body).reachable = Some(true);
                self.emit_sequence(&stmts)?;
                self.ast.set_stage(body, Stage::Emitted);
            }
            _ => {
                self.emit_stmt(body)?;
            }
        }
        if self.code.is_reachable() {
            if returns.is_empty() {
                self.code.add(Op::Return0);
            } else {
                self.errs.log(
                    Diagnostic::error(ErrorCode::ReturnRequired)
                        .with_arg(&name)
                        .with_span(self.ast.span(method)),
                );
            }
        }
        self.ast.set_stage(method, Stage::Emitted);
        let dropped = self.code.dropped();
        let code = self.code.finish(name)?;
        tracing::debug!(
            "emitted {}: {} op(s), {} register(s), {} dropped",
            code.name,
            code.ops.len(),
            code.registers,
            dropped
        );
        if self.ctx.options.verbose {
            tracing::debug!("\n{}", code.disassemble(self.ctx.pool));
        }
        Ok(code)
    }

    fn label(&mut self, owner: NodeId, kind: LabelKind) -> Label {
        Label::new(self.ast.label_scope(owner, self.ctx.label_scopes), kind)
    }

    /// Emit statements in order. The first one that cannot be reached is reported and it and
    /// everything after it is skipped.
    fn emit_sequence(&mut self, stmts: &[NodeId]) -> Result<()> {
        let mut warned = false;
        for stmt in stmts {
            if !self.code.is_reachable() {
                self.ast.state_mut(*stmt).reachable = Some(false);
                let silent = matches!(self.ast.stmt(*stmt), Some(Stmt::Typedef { .. }));
                if !warned && !silent && self.ctx.options.warn_unreachable {
                    self.errs.log(
                        Diagnostic::warning(ErrorCode::NotReachable)
                            .with_span(self.ast.span(*stmt)),
                    );
                    warned = true;
                }
                continue;
            }
            self.emit_stmt(*stmt)?;
        }
        Ok(())
    }

    /// Emit one statement. Returns whether it can complete normally.
    pub fn emit_stmt(&mut self, id: NodeId) -> Result<bool> {
        if !self.code.is_reachable() {
            self.ast.state_mut(id).reachable = Some(false);
            return Ok(false);
        }
        ensure_invariant!(
            self.ast.stage(id) == Stage::Validated,
            "{} reached emission at stage {:?}",
            id,
            self.ast.stage(id)
        );
        self.ast.state_mut(id).reachable = Some(true);
        let Some(stmt) = self.ast.stmt(id).cloned() else {
            invariant!("{} is not a statement", id);
        };
        match stmt {
            Stmt::Block(stmts) => {
                let scoped = self.ast.enters_scope(id);
                if scoped {
                    self.code.add(Op::Enter);
                }
                self.emit_sequence(&stmts)?;
                if scoped {
                    self.code.add(Op::Exit);
                }
            }
            Stmt::Expr(expr) => {
                self.emit_expr(expr)?;
            }
            Stmt::VarDecl { ty, init, .. } => {
                let reg = self.declare(id);
                self.add_var(reg, ty)?;
                if let Some(init) = init {
                    let from = self.emit_expr(init)?;
                    self.code.add(Op::Move { from, to: reg });
                }
            }
            Stmt::Assign { target, value } => {
                let to = match self.emit_expr(target)? {
                    Operand::Register(reg) => reg,
                    Operand::Constant(_) => invariant!("assignment target {} is constant", target),
                };
                let from = self.emit_expr(value)?;
                self.code.add(Op::Move { from, to });
            }
            Stmt::Typedef { .. } => {}
            Stmt::If {
                conds,
                then_branch,
                else_branch,
            } => self.emit_if(id, &conds, then_branch, else_branch)?,
            Stmt::While {
                conds,
                body,
                do_while,
            } => self.emit_while(id, &conds, body, do_while)?,
            Stmt::For {
                init,
                conds,
                updates,
                body,
            } => self.emit_for(id, &init, &conds, &updates, body)?,
            Stmt::Switch { value, cases } => self.emit_switch(id, value, &cases)?,
            Stmt::Labeled { body, .. } => {
                self.emit_stmt(body)?;
                if self.ast.state(id).break_used {
                    let brk = self.label(id, LabelKind::Break);
                    self.code.place_join(brk)?;
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {
                let Some(goto) = self.ast.state(id).goto else {
                    invariant!("{} reached emission unbound", id);
                };
                let kind = match goto.kind {
                    GotoKind::Break => LabelKind::Break,
                    GotoKind::Continue => LabelKind::Continue,
                };
                let target = self.label(goto.target, kind);
                for _ in 0..goto.depth {
                    self.code.add(Op::Exit);
                }
                self.code.add(Op::Jump(target));
            }
            Stmt::Return(values) => {
                if values.is_empty() {
                    self.code.add(Op::Return0);
                } else {
                    let operands = values
                        .iter()
                        .map(|value| self.emit_expr(*value))
                        .collect::<Result<Vec<_>>>()?;
                    self.code.add(Op::Return(operands));
                }
            }
            Stmt::Module { .. }
            | Stmt::Method { .. }
            | Stmt::Case { .. }
            | Stmt::CondDecl { .. } => invariant!("{} cannot be emitted as a statement", id),
        }
        self.ast.set_stage(id, Stage::Emitted);
        Ok(self.code.is_reachable())
    }

    fn declare(&mut self, decl: NodeId) -> Register {
        if let Some(reg) = self.locals.get(&decl) {
            return *reg;
        }
        let reg = self.code.new_register();
        self.locals.insert(decl, reg);
        reg
    }

    fn add_var(&mut self, reg: Register, ty_node: NodeId) -> Result<()> {
        let Some(ty) = self.ast.state(ty_node).ty else {
            invariant!("declared type {} has no type", ty_node);
        };
        self.code.add(Op::Var { reg, ty });
        Ok(())
    }

    /// Some(value) when every run of the conditions is known: false if any entry is constant
    /// false, true if all are constant true.
    fn constant_conds(&self, conds: &[NodeId]) -> Result<Option<bool>> {
        let mut all_true = true;
        for cond in conds {
            match self.ast.state(*cond).constant {
                Some(value) => match self.ctx.pool.as_bool(value)? {
                    Some(false) => return Ok(Some(false)),
                    Some(true) => {}
                    None => all_true = false,
                },
                None => all_true = false,
            }
        }
        Ok(all_true.then_some(true))
    }

    fn emit_if(
        &mut self,
        id: NodeId,
        conds: &[NodeId],
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> Result<()> {
        let else_label = self.label(id, LabelKind::Else);
        let end = self.label(id, LabelKind::End);
        let scoped = self.ast.enters_scope(id);
        if scoped {
            self.code.add(Op::Enter);
        }
        for cond in conds {
            if !self.code.is_reachable() {
                break;
            }
            self.emit_cond_jump(id, *cond, false, else_label)?;
        }
        self.emit_stmt(then_branch)?;
        match else_branch {
            Some(else_branch) => {
                if self.code.is_reachable() {
                    self.code.add(Op::Jump(end));
                }
                self.code.place_join(else_label)?;
                self.emit_stmt(else_branch)?;
                self.code.place_join(end)?;
            }
            None => self.code.place_join(else_label)?,
        }
        if scoped {
            self.code.add(Op::Exit);
        }
        Ok(())
    }

    /// Jump to `target` when all `conds` hold; fall through otherwise.
    fn emit_conds_true(&mut self, owner: NodeId, conds: &[NodeId], target: Label) -> Result<()> {
        let Some((last, leading)) = conds.split_last() else {
            self.code.add(Op::Jump(target));
            return Ok(());
        };
        if leading.is_empty() {
            return self.emit_cond_jump(owner, *last, true, target);
        }
        let skip = self.code.local_label();
        for cond in leading {
            self.emit_cond_jump(owner, *cond, false, skip)?;
        }
        self.emit_cond_jump(owner, *last, true, target)?;
        self.code.place_join(skip)?;
        Ok(())
    }

    fn emit_while(
        &mut self,
        id: NodeId,
        conds: &[NodeId],
        body: NodeId,
        do_while: bool,
    ) -> Result<()> {
        let repeat = self.label(id, LabelKind::Repeat);
        let cont = self.label(id, LabelKind::Continue);
        let brk = self.label(id, LabelKind::Break);
        match self.constant_conds(conds)? {
            Some(false) if !do_while => {
                self.ast.state_mut(body).reachable = Some(false);
            }
            Some(false) => {
                let scoped = self.ast.enters_scope(id);
                if scoped {
                    self.code.add(Op::Enter);
                }
                self.emit_stmt(body)?;
                self.code.place_join(cont)?;
                self.code.place_join(brk)?;
                if scoped {
                    self.code.add(Op::Exit);
                }
            }
            Some(true) => {
                self.code.place(repeat)?;
                self.code.place(cont)?;
                self.emit_stmt(body)?;
                if self.code.is_reachable() {
                    self.code.add(Op::Jump(repeat));
                }
                self.code.place_join(brk)?;
            }
            None => {
                let scoped = self.ast.enters_scope(id);
                if scoped {
                    self.code.add(Op::Enter);
                    for cond in conds {
                        if matches!(self.ast.stmt(*cond), Some(Stmt::CondDecl { .. })) {
                            self.declare(*cond);
                        }
                    }
                }
                if !do_while {
                    self.code.add(Op::Jump(cont));
                }
                self.code.place(repeat)?;
                self.emit_stmt(body)?;
                self.code.place_join(cont)?;
                if self.code.is_reachable() {
                    self.emit_conds_true(id, conds, repeat)?;
                }
                self.code.place_join(brk)?;
                if scoped {
                    self.code.add(Op::Exit);
                }
            }
        }
        Ok(())
    }

    fn emit_for(
        &mut self,
        id: NodeId,
        init: &[NodeId],
        conds: &[NodeId],
        updates: &[NodeId],
        body: NodeId,
    ) -> Result<()> {
        let test = self.label(id, LabelKind::Test);
        let cont = self.label(id, LabelKind::Continue);
        let brk = self.label(id, LabelKind::Break);
        self.code.add(Op::Enter);
        for stmt in init {
            self.emit_stmt(*stmt)?;
        }
        self.code.place(test)?;
        for cond in conds {
            if !self.code.is_reachable() {
                break;
            }
            self.emit_cond_jump(id, *cond, false, brk)?;
        }
        self.emit_stmt(body)?;
        self.code.place_join(cont)?;
        for update in updates {
            self.emit_stmt(*update)?;
        }
        if self.code.is_reachable() {
            self.code.add(Op::Jump(test));
        }
        self.code.place_join(brk)?;
        self.code.add(Op::Exit);
        Ok(())
    }

    fn emit_switch(&mut self, id: NodeId, value: NodeId, cases: &[NodeId]) -> Result<()> {
        let brk = self.label(id, LabelKind::Break);
        let value = self.emit_expr(value)?;
        let mut default = None;
        let mut bodies = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let Some(Stmt::Case { values, body }) = self.ast.stmt(*case).cloned() else {
                invariant!("switch member {} is not a case", case);
            };
            let target = self.label(id, LabelKind::Case(index as u32));
            if values.is_empty() {
                default = Some(target);
            }
            for case_value in values {
                let Some(constant) = self.ast.state(case_value).constant else {
                    invariant!("case value {} is not constant", case_value);
                };
                self.code.add(Op::JumpEq {
                    lhs: value,
                    rhs: Operand::Constant(constant),
                    target,
                });
            }
            bodies.push((*case, target, body));
        }
        self.code.add(Op::Jump(default.unwrap_or(brk)));
        for (case, target, body) in bodies {
            self.code.place_join(target)?;
            self.ast.state_mut(case).reachable = Some(self.code.is_reachable());
            self.emit_stmt(body)?;
            if self.code.is_reachable() {
                self.code.add(Op::Jump(brk));
            }
            self.ast.set_stage(case, Stage::Emitted);
        }
        self.code.place_join(brk)?;
        Ok(())
    }

    /// Emit one condition entry of `owner`, jumping to `target` when the entry evaluates to
    /// `jump_when`.
    fn emit_cond_jump(
        &mut self,
        owner: NodeId,
        cond: NodeId,
        jump_when: bool,
        target: Label,
    ) -> Result<()> {
        ensure_invariant!(
            self.ast.allows_short_circuit(owner, cond),
            "{} is not a condition of {}",
            cond,
            owner
        );
        if let Some(Stmt::CondDecl { ty, value, .. }) = self.ast.stmt(cond).cloned() {
            let reg = self.declare(cond);
            self.add_var(reg, ty)?;
            let from = self.emit_expr(value)?;
            self.code.add(Op::Move { from, to: reg });
            if jump_when {
                let skip = self.code.local_label();
                self.code.add(Op::JumpNull {
                    value: reg.into(),
                    target: skip,
                });
                self.code.add(Op::Jump(target));
                self.code.place_join(skip)?;
            } else {
                self.code.add(Op::JumpNull {
                    value: reg.into(),
                    target,
                });
            }
            self.ast.set_stage(cond, Stage::Emitted);
            return Ok(());
        }
        self.emit_branch(cond, jump_when, target)
    }

    /// Short-circuiting jump on a Boolean expression.
    fn emit_branch(&mut self, expr: NodeId, jump_when: bool, target: Label) -> Result<()> {
        if let Some(value) = self.ast.state(expr).constant {
            if self.ctx.pool.as_bool(value)? == Some(jump_when) {
                self.code.add(Op::Jump(target));
            }
            return Ok(());
        }
        match self.ast.expr(expr).cloned() {
            Some(Expr::Unary {
                op: UnaryOp::Not,
                operand,
            }) => self.emit_branch(operand, !jump_when, target)?,
            Some(Expr::Binary { op, lhs, rhs }) if op.is_logical() => {
                // `a && b` jumps on false as soon as one side is false; `a || b` on true.
                let eager = op == BinaryOp::Or;
                if jump_when == eager {
                    self.emit_branch(lhs, jump_when, target)?;
                    self.emit_branch(rhs, jump_when, target)?;
                } else {
                    let skip = self.code.local_label();
                    self.emit_branch(lhs, eager, skip)?;
                    self.emit_branch(rhs, jump_when, target)?;
                    self.code.place_join(skip)?;
                }
            }
            _ => {
                let cond = self.emit_expr(expr)?;
                self.code.add(if jump_when {
                    Op::JumpTrue { cond, target }
                } else {
                    Op::JumpFalse { cond, target }
                });
            }
        }
        self.ast.set_stage(expr, Stage::Emitted);
        Ok(())
    }

    /// Emit the value of an expression. Constant expressions emit nothing.
    pub fn emit_expr(&mut self, id: NodeId) -> Result<Operand> {
        if let Some(value) = self.ast.state(id).constant {
            return Ok(Operand::Constant(value));
        }
        let Some(expr) = self.ast.expr(id).cloned() else {
            invariant!("{} is not an expression", id);
        };
        let operand = match expr {
            Expr::Literal(_) => invariant!("literal {} was not folded", id),
            Expr::Name(name) => match self.ast.state(id).binding {
                Some(NameBinding::Local { decl }) => match self.locals.get(&decl) {
                    Some(reg) => Operand::Register(*reg),
                    None => invariant!("local `{}` used before its declaration", name),
                },
                _ => invariant!("name `{}` at {} has no runtime value", name, id),
            },
            Expr::Paren(inner) => self.emit_expr(inner)?,
            Expr::Unary { op, operand } => {
                let operand = self.emit_expr(operand)?;
                let to = self.code.new_register();
                self.code.add(Op::Unary { op, operand, to });
                to.into()
            }
            Expr::Binary { op, lhs, rhs } if op.is_logical() => {
                let to = self.code.new_register();
                let from = self.emit_expr(lhs)?;
                self.code.add(Op::Move { from, to });
                let skip = self.code.local_label();
                self.code.add(match op {
                    BinaryOp::And => Op::JumpFalse {
                        cond: to.into(),
                        target: skip,
                    },
                    _ => Op::JumpTrue {
                        cond: to.into(),
                        target: skip,
                    },
                });
                let from = self.emit_expr(rhs)?;
                self.code.add(Op::Move { from, to });
                self.code.place_join(skip)?;
                to.into()
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.emit_expr(lhs)?;
                let rhs = self.emit_expr(rhs)?;
                let to = self.code.new_register();
                self.code.add(Op::Binary { op, lhs, rhs, to });
                to.into()
            }
            Expr::Tuple { elements, .. } => {
                let elements = elements
                    .iter()
                    .map(|element| self.emit_expr(*element))
                    .collect::<Result<Vec<_>>>()?;
                let to = self.code.new_register();
                self.code.add(Op::MakeTuple { elements, to });
                to.into()
            }
        };
        self.ast.set_stage(id, Stage::Emitted);
        Ok(operand)
    }
}
