//! Validation: type checking, fit computation and constant folding.
//!
//! Every node is validated exactly once, children before the node itself. Validation returns
//! the node that should stand in the tree from now on (a parenthesized expression is replaced
//! by its inner expression) or `None` when the node failed. A failure propagates to the parent
//! without another diagnostic.

use crate::labels::{check_duplicate_label, resolve_goto};
use crate::types::TypeResolver;
use crate::UnitContext;
use std::collections::HashSet;
use xc_core::ast::{
    Ast, BinaryOp, Expr, Fit, Literal, NameBinding, NodeId, NodeKind, Param, Stage, Stmt,
    UnaryOp,
};
use xc_core::diagnostics::{Diagnostic, ErrorCode, ErrorListener};
use xc_core::pool::{Constant, TypeConstant};
use xc_core::{ConstId, Result};

pub struct Validator<'a> {
    ast: &'a mut Ast,
    ctx: UnitContext<'a>,
    errs: &'a dyn ErrorListener,
    types: TypeResolver<'a>,
    /// Return types of the method being validated.
    method_returns: Vec<ConstId>,
}

impl<'a> Validator<'a> {
    pub fn new(ast: &'a mut Ast, ctx: UnitContext<'a>, errs: &'a dyn ErrorListener) -> Self {
        Self {
            ast,
            ctx,
            errs,
            types: TypeResolver::new(ctx),
            method_returns: Vec::new(),
        }
    }

    pub fn ast(&self) -> &Ast {
        self.ast
    }

    fn error(&self, code: ErrorCode, id: NodeId, args: Vec<String>) {
        self.errs.log(
            Diagnostic::error(code)
                .with_args(args)
                .with_span(self.ast.span(id)),
        );
    }

    /// Validate any node: statement, expression (with no required type) or type expression.
    pub fn validate(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        match self.ast.kind(id) {
            NodeKind::Expr(_) => self.validate_expr(id, None),
            NodeKind::Type(_) => self.validate_type(id).map(|ty| ty.map(|_| id)),
            NodeKind::Stmt(_) => self.validate_stmt(id),
        }
    }

    /// Stage gate shared by every node kind. Returns the final result when the node was already
    /// validated or has failed.
    fn begin(&mut self, id: NodeId) -> Option<Option<NodeId>> {
        match self.ast.stage(id) {
            Stage::Failed => Some(None),
            stage if stage >= Stage::Validated => Some(Some(id)),
            _ => {
                self.ast.set_stage(id, Stage::Validating);
                None
            }
        }
    }

    fn finish(&mut self, id: NodeId, result: Option<NodeId>) -> Option<NodeId> {
        match result {
            Some(node) => {
                self.ast.set_stage(node, Stage::Validated);
                if node != id {
                    self.ast.set_stage(id, Stage::Validated);
                }
            }
            None => self.ast.set_stage(id, Stage::Failed),
        }
        result
    }

    /// Validate a type expression, children first. Returns its canonical type.
    pub fn validate_type(&mut self, id: NodeId) -> Result<Option<ConstId>> {
        if let Some(done) = self.begin(id) {
            return Ok(done.and_then(|id| self.ast.state(id).ty));
        }
        let mut ok = true;
        for child in self.ast.children(id) {
            ok &= self.validate_type(child)?.is_some();
        }
        let ty = if ok {
            self.types.resolve_type(self.ast, id, self.errs)?
        } else {
            None
        };
        self.finish(id, ty.map(|_| id));
        Ok(ty)
    }

    fn validate_all(&mut self, ids: &[NodeId]) -> Result<bool> {
        let mut ok = true;
        for id in ids {
            ok &= self.validate(*id)?.is_some();
        }
        Ok(ok)
    }

    pub fn validate_stmt(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        if let Some(done) = self.begin(id) {
            return Ok(done);
        }
        let Some(stmt) = self.ast.stmt(id).cloned() else {
            invariant!("{} is not a statement", id);
        };
        let ok = match stmt {
            Stmt::Module { members, .. } => self.validate_all(&members)?,
            Stmt::Method {
                name,
                params,
                returns,
                body,
            } => self.validate_method(id, &name, &params, &returns, body)?,
            Stmt::Block(stmts) => self.validate_block(&stmts)?,
            Stmt::Expr(expr) => self.validate_expr(expr, None)?.is_some(),
            Stmt::VarDecl { ty, init, .. } => match self.validate_type(ty)? {
                Some(ty) => match init {
                    Some(init) => self.validate_expr(init, Some(ty))?.is_some(),
                    None => true,
                },
                None => false,
            },
            Stmt::Assign { target, value } => self.validate_assign(target, value)?,
            Stmt::Typedef { ty, .. } => self.validate_type(ty)?.is_some(),
            Stmt::If {
                conds,
                then_branch,
                else_branch,
            } => {
                let mut ok = self.validate_conds(&conds)?;
                ok &= self.validate(then_branch)?.is_some();
                if let Some(else_branch) = else_branch {
                    ok &= self.validate(else_branch)?.is_some();
                }
                ok
            }
            Stmt::While {
                conds,
                body,
                do_while,
            } => {
                let mut ok = self.validate_conds(&conds)?;
                ok &= self.validate(body)?.is_some();
                if ok && !do_while && self.always_true(id)? && self.is_empty_block(body) {
                    self.error(ErrorCode::InfiniteLoop, id, vec![]);
                    ok = false;
                }
                ok
            }
            Stmt::For {
                init,
                conds,
                updates,
                body,
            } => {
                let mut ok = self.validate_all(&init)?;
                ok &= self.validate_conds(&conds)?;
                ok &= self.validate_all(&updates)?;
                ok &= self.validate(body)?.is_some();
                ok
            }
            Stmt::Switch { value, cases } => self.validate_switch(value, &cases)?,
            Stmt::Case { .. } => invariant!("case {} outside of a switch", id),
            Stmt::Labeled { body, .. } => {
                let ok = check_duplicate_label(self.ast, id, self.errs);
                self.validate(body)?.is_some() && ok
            }
            Stmt::Break(_) | Stmt::Continue(_) => {
                resolve_goto(self.ast, id, self.ctx.label_scopes, self.errs).is_some()
            }
            Stmt::Return(values) => self.validate_return(id, &values)?,
            Stmt::CondDecl { ty, value, .. } => self.validate_cond_decl(ty, value)?,
        };
        Ok(self.finish(id, ok.then_some(id)))
    }

    fn validate_method(
        &mut self,
        id: NodeId,
        name: &str,
        params: &[Param],
        returns: &[NodeId],
        body: NodeId,
    ) -> Result<bool> {
        let mut ok = true;
        let mut seen = HashSet::new();
        for param in params {
            ok &= self.validate_type(param.ty)?.is_some();
            if !seen.insert(param.name.as_str()) {
                self.error(ErrorCode::NameCollision, param.ty, vec![param.name.clone()]);
                ok = false;
            }
        }
        let mut return_types = Vec::with_capacity(returns.len());
        for ret in returns {
            match self.validate_type(*ret)? {
                Some(ty) => return_types.push(ty),
                None => ok = false,
            }
        }
        if !ok {
            return Ok(false);
        }
        tracing::debug!("validating method {} ({})", name, id);
        let outer = std::mem::replace(&mut self.method_returns, return_types);
        let body_ok = self.validate(body)?.is_some();
        self.method_returns = outer;
        Ok(body_ok)
    }

    fn validate_block(&mut self, stmts: &[NodeId]) -> Result<bool> {
        let mut ok = true;
        let mut declared = HashSet::new();
        for stmt in stmts {
            let name = match self.ast.stmt(*stmt) {
                Some(Stmt::VarDecl { name, .. })
                | Some(Stmt::CondDecl { name, .. })
                | Some(Stmt::Typedef { name, .. }) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = name {
                if !declared.insert(name.clone()) {
                    self.error(ErrorCode::NameCollision, *stmt, vec![name]);
                    self.ast.set_stage(*stmt, Stage::Failed);
                    ok = false;
                    continue;
                }
            }
            ok &= self.validate(*stmt)?.is_some();
        }
        Ok(ok)
    }

    fn validate_assign(&mut self, target: NodeId, value: NodeId) -> Result<bool> {
        let assignable = matches!(
            self.ast.state(target).binding,
            Some(NameBinding::Local { .. })
        ) && matches!(self.ast.expr(target), Some(Expr::Name(_)));
        if !assignable {
            if self.ast.stage(target).is_failed() {
                return Ok(false);
            }
            let name = match self.ast.expr(target) {
                Some(Expr::Name(name)) => name.clone(),
                _ => target.to_string(),
            };
            self.error(ErrorCode::NotAssignable, target, vec![name]);
            return Ok(false);
        }
        let Some(target) = self.validate_expr(target, None)? else {
            return Ok(false);
        };
        let ty = self.ast.state(target).ty;
        Ok(self.validate_expr(value, ty)?.is_some())
    }

    fn validate_conds(&mut self, conds: &[NodeId]) -> Result<bool> {
        let mut ok = true;
        for cond in conds {
            ok &= self.validate_cond(*cond)?;
        }
        Ok(ok)
    }

    /// A condition entry: a Boolean expression or a declare-and-test of a nullable value.
    fn validate_cond(&mut self, cond: NodeId) -> Result<bool> {
        if matches!(self.ast.kind(cond), NodeKind::Stmt(_)) {
            return Ok(self.validate_stmt(cond)?.is_some());
        }
        let boolean = self.ctx.pool.boolean_type();
        Ok(self.validate_expr(cond, Some(boolean))?.is_some())
    }

    fn validate_cond_decl(&mut self, ty: NodeId, value: NodeId) -> Result<bool> {
        let Some(ty) = self.validate_type(ty)? else {
            return Ok(false);
        };
        let nullable = self.ctx.pool.nullable_type(ty);
        Ok(self.validate_expr(value, Some(nullable))?.is_some())
    }

    fn validate_switch(&mut self, value: NodeId, cases: &[NodeId]) -> Result<bool> {
        let Some(value) = self.validate_expr(value, None)? else {
            return Ok(false);
        };
        let value_ty = self.ast.state(value).ty;
        let mut ok = true;
        let mut seen = HashSet::new();
        let mut has_default = false;
        for case in cases {
            if let Some(done) = self.begin(*case) {
                ok &= done.is_some();
                continue;
            }
            let Some(Stmt::Case { values, body }) = self.ast.stmt(*case).cloned() else {
                invariant!("switch member {} is not a case", case);
            };
            let mut case_ok = true;
            if values.is_empty() {
                if has_default {
                    self.error(ErrorCode::SwitchDefaultDuplicate, *case, vec![]);
                    case_ok = false;
                }
                has_default = true;
            }
            for value in values {
                match self.validate_expr(value, value_ty)? {
                    Some(value) => match self.ast.state(value).constant {
                        None => {
                            self.error(ErrorCode::NotConstant, value, vec![]);
                            case_ok = false;
                        }
                        Some(constant) => {
                            if !seen.insert(self.ctx.pool.canonical(constant)?) {
                                let shown = self.ctx.pool.describe(constant);
                                self.error(ErrorCode::SwitchCaseDuplicate, value, vec![shown]);
                                case_ok = false;
                            }
                        }
                    },
                    None => case_ok = false,
                }
            }
            case_ok &= self.validate(body)?.is_some();
            self.finish(*case, case_ok.then_some(*case));
            ok &= case_ok;
        }
        Ok(ok)
    }

    fn validate_return(&mut self, id: NodeId, values: &[NodeId]) -> Result<bool> {
        let expected = self.method_returns.clone();
        if values.len() != expected.len() {
            self.error(
                ErrorCode::ReturnExpected,
                id,
                vec![expected.len().to_string(), values.len().to_string()],
            );
            return Ok(false);
        }
        let mut ok = true;
        for (value, ty) in values.iter().zip(expected) {
            ok &= self.validate_expr(*value, Some(ty))?.is_some();
        }
        Ok(ok)
    }

    fn always_true(&self, id: NodeId) -> Result<bool> {
        let Some(stmt) = self.ast.stmt(id) else {
            return Ok(false);
        };
        for cond in stmt.conds() {
            match self.ast.state(*cond).constant {
                Some(value) if self.ctx.pool.as_bool(value)? == Some(true) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn is_empty_block(&self, id: NodeId) -> bool {
        matches!(self.ast.stmt(id), Some(Stmt::Block(stmts)) if stmts.is_empty())
    }

    /// Validate an expression, checking its fit against `required` when given.
    pub fn validate_expr(
        &mut self,
        id: NodeId,
        required: Option<ConstId>,
    ) -> Result<Option<NodeId>> {
        if let Some(done) = self.begin(id) {
            return Ok(done);
        }
        let Some(expr) = self.ast.expr(id).cloned() else {
            invariant!("{} is not an expression", id);
        };
        let pool = self.ctx.pool;
        let typed = match expr {
            Expr::Literal(literal) => {
                let value = match literal {
                    Literal::Int(value) => pool.int(value),
                    Literal::String(value) => pool.string(value),
                    Literal::Char(value) => pool.char(value),
                    Literal::Bool(value) => pool.bool(value),
                    Literal::Null => pool.null(),
                };
                Some((pool.type_of(value)?, Some(value)))
            }
            Expr::Name(name) => self.validate_name(id, &name)?,
            Expr::Paren(inner) => {
                let result = self.validate_expr(inner, required)?;
                if let (Some(inner), Some(parent)) = (result, self.ast.parent(id)) {
                    self.ast.replace_child(parent, id, inner);
                }
                return Ok(self.finish(id, result));
            }
            Expr::Unary { op, operand } => self.validate_unary(op, operand)?,
            Expr::Binary { op, lhs, rhs } => self.validate_binary(id, op, lhs, rhs)?,
            Expr::Tuple { ty, elements } => self.validate_tuple(id, ty, &elements, required)?,
        };
        let Some((ty, constant)) = typed else {
            return Ok(self.finish(id, None));
        };
        let state = self.ast.state_mut(id);
        state.ty = Some(ty);
        state.constant = constant;
        if let Some(required) = required {
            let fit = self.fit(ty, required)?;
            self.ast.state_mut(id).fit = Some(fit);
            if !fit.is_fit() {
                self.error(
                    ErrorCode::WrongType,
                    id,
                    vec![pool.describe(required), pool.describe(ty)],
                );
                return Ok(self.finish(id, None));
            }
        }
        Ok(self.finish(id, Some(id)))
    }

    fn validate_name(
        &mut self,
        id: NodeId,
        name: &str,
    ) -> Result<Option<(ConstId, Option<ConstId>)>> {
        Ok(match self.ast.state(id).binding.clone() {
            Some(NameBinding::Local { decl }) => self.local_type(decl).map(|ty| (ty, None)),
            Some(NameBinding::Constant { ty, value }) => Some((ty, Some(value))),
            Some(NameBinding::Type(_)) | Some(NameBinding::Namespace(_)) => {
                self.error(ErrorCode::NotAValue, id, vec![name.to_string()]);
                None
            }
            None => invariant!("name `{}` at {} reached validation unbound", name, id),
        })
    }

    /// Declared type of a local or parameter, once its type expression is validated.
    fn local_type(&self, decl: NodeId) -> Option<ConstId> {
        let ty_node = match self.ast.stmt(decl) {
            Some(Stmt::VarDecl { ty, .. }) | Some(Stmt::CondDecl { ty, .. }) => *ty,
            _ => decl,
        };
        if self.ast.stage(ty_node).has_reached(Stage::Validated) {
            self.ast.state(ty_node).ty
        } else {
            None
        }
    }

    fn validate_unary(
        &mut self,
        op: UnaryOp,
        operand: NodeId,
    ) -> Result<Option<(ConstId, Option<ConstId>)>> {
        let pool = self.ctx.pool;
        let ty = match op {
            UnaryOp::Not => pool.boolean_type(),
            UnaryOp::Neg => pool.int_type(),
        };
        let Some(operand) = self.validate_expr(operand, Some(ty))? else {
            return Ok(None);
        };
        let constant = match self.ast.state(operand).constant {
            Some(value) => match op {
                UnaryOp::Not => pool.as_bool(value)?.map(|b| pool.bool(!b)),
                UnaryOp::Neg => pool
                    .as_int(value)?
                    .and_then(i64::checked_neg)
                    .map(|n| pool.int(n)),
            },
            None => None,
        };
        Ok(Some((ty, constant)))
    }

    fn validate_binary(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<Option<(ConstId, Option<ConstId>)>> {
        let pool = self.ctx.pool;
        let (int, boolean, string) = (pool.int_type(), pool.boolean_type(), pool.string_type());
        if op.is_logical() {
            let lhs = self.validate_expr(lhs, Some(boolean))?;
            let rhs = self.validate_expr(rhs, Some(boolean))?;
            let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
                return Ok(None);
            };
            let left = self.constant_bool(lhs)?;
            let right = self.constant_bool(rhs)?;
            let folded = match (op, left, right) {
                (BinaryOp::And, Some(false), _) => Some(false),
                (BinaryOp::Or, Some(true), _) => Some(true),
                (BinaryOp::And, Some(true), Some(r)) | (BinaryOp::Or, Some(false), Some(r)) => {
                    Some(r)
                }
                _ => None,
            };
            return Ok(Some((boolean, folded.map(|b| pool.bool(b)))));
        }

        let lhs = self.validate_expr(lhs, None)?;
        let rhs = self.validate_expr(rhs, None)?;
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Ok(None);
        };
        let (Some(left_ty), Some(right_ty)) = (self.ast.state(lhs).ty, self.ast.state(rhs).ty)
        else {
            invariant!("operands of {} validated without a type", id);
        };
        let left = self.ast.state(lhs).constant;
        let right = self.ast.state(rhs).constant;

        let ty = match op {
            BinaryOp::Add if left_ty == string || right_ty == string => string,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if !self.check_operands(id, &[int], left_ty, right_ty) {
                    return Ok(None);
                }
                int
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !self.check_operands(id, &[int, pool.char_type()], left_ty, right_ty) {
                    return Ok(None);
                }
                boolean
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if !self.fit(right_ty, left_ty)?.is_fit() && !self.fit(left_ty, right_ty)?.is_fit()
                {
                    self.error(
                        ErrorCode::WrongType,
                        id,
                        vec![pool.describe(left_ty), pool.describe(right_ty)],
                    );
                    return Ok(None);
                }
                boolean
            }
            BinaryOp::And | BinaryOp::Or => {
                invariant!("logical operator {} not short-circuited", op)
            }
        };
        let constant = match (left, right) {
            (Some(left), Some(right)) => self.fold_binary(op, left, right)?,
            _ => None,
        };
        Ok(Some((ty, constant)))
    }

    /// Both operands must share one of the `allowed` types.
    fn check_operands(
        &self,
        id: NodeId,
        allowed: &[ConstId],
        left: ConstId,
        right: ConstId,
    ) -> bool {
        if left == right && allowed.contains(&left) {
            return true;
        }
        let culprit = if allowed.contains(&left) { right } else { left };
        let pool = self.ctx.pool;
        self.error(
            ErrorCode::WrongType,
            id,
            vec![pool.describe(allowed[0]), pool.describe(culprit)],
        );
        false
    }

    fn constant_bool(&self, id: NodeId) -> Result<Option<bool>> {
        match self.ast.state(id).constant {
            Some(value) => self.ctx.pool.as_bool(value),
            None => Ok(None),
        }
    }

    /// Fold a binary operator over two constants. Overflow and division by zero stay unfolded.
    fn fold_binary(&self, op: BinaryOp, left: ConstId, right: ConstId) -> Result<Option<ConstId>> {
        let pool = self.ctx.pool;
        let (Some(l), Some(r)) = (pool.get(left)?, pool.get(right)?) else {
            return Ok(None);
        };
        Ok(match (op, l, r) {
            (BinaryOp::Eq | BinaryOp::Ne, _, _) => {
                let equal = pool.canonical(left)? == pool.canonical(right)?;
                Some(pool.bool(equal == (op == BinaryOp::Eq)))
            }
            (op, Constant::Int(l), Constant::Int(r)) => match op {
                BinaryOp::Add => l.checked_add(r).map(|v| pool.int(v)),
                BinaryOp::Sub => l.checked_sub(r).map(|v| pool.int(v)),
                BinaryOp::Mul => l.checked_mul(r).map(|v| pool.int(v)),
                BinaryOp::Div => l.checked_div(r).map(|v| pool.int(v)),
                BinaryOp::Mod => l.checked_rem(r).map(|v| pool.int(v)),
                BinaryOp::Lt => Some(pool.bool(l < r)),
                BinaryOp::Le => Some(pool.bool(l <= r)),
                BinaryOp::Gt => Some(pool.bool(l > r)),
                BinaryOp::Ge => Some(pool.bool(l >= r)),
                _ => None,
            },
            (op, Constant::Char(l), Constant::Char(r)) => match op {
                BinaryOp::Lt => Some(pool.bool(l < r)),
                BinaryOp::Le => Some(pool.bool(l <= r)),
                BinaryOp::Gt => Some(pool.bool(l > r)),
                BinaryOp::Ge => Some(pool.bool(l >= r)),
                _ => None,
            },
            (BinaryOp::Add, Constant::String(l), Constant::String(r)) => {
                Some(pool.string(format!("{}{}", l, r)))
            }
            _ => None,
        })
    }

    fn validate_tuple(
        &mut self,
        id: NodeId,
        ty: Option<NodeId>,
        elements: &[NodeId],
        required: Option<ConstId>,
    ) -> Result<Option<(ConstId, Option<ConstId>)>> {
        let pool = self.ctx.pool;
        let declared = match ty {
            Some(ty) => match self.validate_type(ty)? {
                Some(ty) => Some(ty),
                None => return Ok(None),
            },
            None => required,
        };
        let fields = match declared.map(|ty| pool.get(ty)).transpose()?.flatten() {
            Some(Constant::Type(TypeConstant::Tuple(fields))) => Some(fields),
            _ => None,
        };
        if let (Some(fields), Some(_)) = (&fields, ty) {
            if fields.len() != elements.len() {
                self.error(
                    ErrorCode::TupleTypeWrongArity,
                    id,
                    vec![elements.len().to_string(), fields.len().to_string()],
                );
                return Ok(None);
            }
        }
        let fields = fields.filter(|fields| fields.len() == elements.len());

        let mut validated = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let required = fields.as_ref().map(|fields| fields[index]);
            validated.push(self.validate_expr(*element, required)?);
        }
        let Some(validated) = validated.into_iter().collect::<Option<Vec<_>>>() else {
            return Ok(None);
        };
        let mut types = Vec::with_capacity(validated.len());
        let mut constants = Vec::with_capacity(validated.len());
        for element in &validated {
            let state = self.ast.state(*element);
            let Some(ty) = state.ty else {
                invariant!("tuple element {} validated without a type", element);
            };
            types.push(ty);
            constants.push(state.constant);
        }
        let ty = match (ty, declared) {
            (Some(_), Some(declared)) => declared,
            _ => pool.tuple_type(types),
        };
        let constant = constants
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(|values| pool.tuple(values));
        Ok(Some((ty, constant)))
    }

    /// How well a value of type `actual` fits where `required` is expected.
    pub fn fit(&self, actual: ConstId, required: ConstId) -> Result<Fit> {
        let pool = self.ctx.pool;
        let actual = pool.canonical(actual)?;
        let required = pool.canonical(required)?;
        if actual == required {
            return Ok(Fit::Exact);
        }
        if required == pool.object_type() {
            return Ok(Fit::Convertible);
        }
        let (Some(Constant::Type(want)), Some(Constant::Type(have))) =
            (pool.get(required)?, pool.get(actual)?)
        else {
            return Ok(Fit::Fail);
        };
        Ok(match (want, have) {
            (TypeConstant::Nullable(_), _) if actual == pool.null_type() => Fit::Convertible,
            (TypeConstant::Nullable(inner), TypeConstant::Nullable(have)) => {
                if self.fit(have, inner)?.is_fit() {
                    Fit::Convertible
                } else {
                    Fit::Fail
                }
            }
            (TypeConstant::Nullable(inner), _) => {
                if self.fit(actual, inner)?.is_fit() {
                    Fit::Convertible
                } else {
                    Fit::Fail
                }
            }
            (TypeConstant::Tuple(want), TypeConstant::Tuple(have)) if want.len() == have.len() => {
                let mut fit = Fit::Exact;
                for (have, want) in have.into_iter().zip(want) {
                    match self.fit(have, want)? {
                        Fit::Fail => return Ok(Fit::Fail),
                        Fit::Exact => {}
                        _ => fit = Fit::Convertible,
                    }
                }
                fit
            }
            (TypeConstant::Tuple(want), _) if want.len() == 1 => {
                if self.fit(actual, want[0])?.is_fit() {
                    Fit::Pack
                } else {
                    Fit::Fail
                }
            }
            _ => Fit::Fail,
        })
    }

    /// Validate a copy of `expr` against a throwaway listener and report how it would fit
    /// `required`. The original subtree and the real listener are untouched, and the copy is
    /// dropped from the arena again.
    pub fn speculate_fit(&mut self, expr: NodeId, required: ConstId) -> Result<Fit> {
        let mark = self.ast.len();
        let copy = self.ast.copy_subtree(expr);
        let scratch = self.errs.speculative();
        let mut speculative = Validator {
            ast: &mut *self.ast,
            ctx: self.ctx,
            errs: scratch.as_ref(),
            types: TypeResolver::new(self.ctx),
            method_returns: self.method_returns.clone(),
        };
        let fit = match speculative.validate_expr(copy, None) {
            Ok(Some(copy)) => match speculative.ast.state(copy).ty {
                Some(ty) => speculative.fit(ty, required),
                None => Ok(Fit::Fail),
            },
            Ok(None) => Ok(Fit::Fail),
            Err(err) => Err(err),
        };
        self.ast.truncate(mark);
        fit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use pretty_assertions::assert_eq;
    use xc_core::ast::AstBuilder;
    use xc_core::diagnostics::{BlackholeListener, ErrorList};

    #[test]
    fn constant_tuple_folds() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let a = b.string("a");
        let tuple = b.tuple(vec![one, a]);
        let stmt = b.expr_stmt(tuple);
        let body = b.block(vec![stmt]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert!(fixture.validate(&mut ast, &errs)?.is_some());

        let pool = &fixture.pool;
        let expected = pool.tuple(vec![pool.int(1), pool.string("a")]);
        assert_eq!(ast.state(tuple).constant, Some(expected));
        assert_eq!(pool.describe(expected), "(1, \"a\")");
        assert!(errs.is_empty());
        Ok(())
    }

    #[test]
    fn paren_is_replaced_by_its_inner_expression() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let two = b.int(2);
        let three = b.int(3);
        let sum = b.binary(BinaryOp::Add, two, three);
        let paren = b.paren(sum);
        let ty = b.ty("Int");
        let decl = b.var(ty, "x", Some(paren));
        let body = b.block(vec![decl]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        fixture.validate(&mut ast, &errs)?;
        let Some(Stmt::VarDecl { init, .. }) = ast.stmt(decl) else {
            panic!("declaration changed shape");
        };
        assert_eq!(*init, Some(sum));
        assert_eq!(ast.state(sum).constant, Some(fixture.pool.int(5)));
        assert_eq!(ast.stage(sum), Stage::Validated);
        Ok(())
    }

    #[test]
    fn short_circuit_folds_on_constant_lhs() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let flag_ty = b.ty("Boolean");
        let no = b.bool_lit(false);
        let flag = b.name("flag");
        let and = b.and(no, flag);
        let ret = b.ret(vec![and]);
        let body = b.block(vec![ret]);
        let returns = b.ty("Boolean");
        let method = b.method("m", vec![("flag", flag_ty)], vec![returns], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        fixture.validate(&mut ast, &errs)?;
        assert_eq!(ast.state(and).constant, Some(fixture.pool.bool(false)));
        assert!(errs.is_empty());
        Ok(())
    }

    #[test]
    fn wrong_initializer_type_is_reported_once() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let text = b.string("nope");
        let ty = b.ty("Int");
        let decl = b.var(ty, "x", Some(text));
        let body = b.block(vec![decl]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs.diagnostics()[0].message(),
            "Type mismatch: Int expected, String found."
        );
        assert_eq!(ast.stage(decl), Stage::Failed);
        assert_eq!(ast.stage(method), Stage::Failed);
        Ok(())
    }

    #[test]
    fn explicit_tuple_type_checks_arity() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let int_ty = b.ty("Int");
        let string_ty = b.ty("String");
        let tuple_ty = b.tuple_type(vec![int_ty, string_ty]);
        let one = b.int(1);
        let tuple = b.typed_tuple(tuple_ty, vec![one]);
        let stmt = b.expr_stmt(tuple);
        let body = b.block(vec![stmt]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::TupleTypeWrongArity), 1);
        assert_eq!(
            errs.diagnostics()[0].message(),
            "The tuple type specifies 2 field(s); 1 field(s) found."
        );
        Ok(())
    }

    #[test]
    fn nullable_and_pack_fits() -> Result<()> {
        let fixture = Fixture::new();
        let mut ast = Ast::new();
        let validator = Validator::new(&mut ast, fixture.ctx(), &BlackholeListener);
        let pool = &fixture.pool;
        let int = pool.int_type();
        assert_eq!(validator.fit(int, int)?, Fit::Exact);
        assert_eq!(validator.fit(int, pool.nullable_type(int))?, Fit::Convertible);
        assert_eq!(
            validator.fit(pool.null_type(), pool.nullable_type(int))?,
            Fit::Convertible
        );
        assert_eq!(validator.fit(int, pool.tuple_type(vec![int]))?, Fit::Pack);
        assert_eq!(validator.fit(int, pool.object_type())?, Fit::Convertible);
        assert_eq!(validator.fit(pool.string_type(), int)?, Fit::Fail);
        Ok(())
    }

    #[test]
    fn speculation_leaves_original_and_listener_alone() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let text = b.string("s");
        let stmt = b.expr_stmt(text);
        let mut ast = b.finish(stmt);
        let nodes = ast.len();
        let errs = ErrorList::default();
        let mut validator = Validator::new(&mut ast, fixture.ctx(), &errs);
        let pool = &fixture.pool;
        assert_eq!(validator.speculate_fit(text, pool.int_type())?, Fit::Fail);
        assert_eq!(validator.speculate_fit(text, pool.string_type())?, Fit::Exact);
        assert_eq!(ast.stage(text), Stage::Initial);
        // the copies are gone again
        assert_eq!(ast.len(), nodes);
        assert_eq!(ast.root(), Some(stmt));
        assert!(errs.is_empty());
        Ok(())
    }

    #[test]
    fn repeated_case_value_is_a_duplicate() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let x_ty = b.ty("Int");
        let (one, two) = (b.int(1), b.int(2));
        let first_body = b.block(vec![]);
        let first = b.case(vec![one, two], first_body);
        let (one_again, sum_l, sum_r) = (b.int(3), b.int(1), b.int(1));
        let folded_two = b.binary(BinaryOp::Add, sum_l, sum_r);
        let second_body = b.block(vec![]);
        let second = b.case(vec![one_again, folded_two], second_body);
        let x = b.name("x");
        let switch = b.switch(x, vec![first, second]);
        let body = b.block(vec![switch]);
        let method = b.method("m", vec![("x", x_ty)], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();

        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::SwitchCaseDuplicate), 1);
        assert_eq!(
            errs.diagnostics()[0].message(),
            "The case value 2 is already used in this switch."
        );
        assert_eq!(ast.stage(first), Stage::Validated);
        assert_eq!(ast.stage(second), Stage::Failed);
        Ok(())
    }

    #[test]
    fn second_default_is_a_duplicate() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let x_ty = b.ty("Int");
        let one = b.int(1);
        let case_body = b.block(vec![]);
        let case = b.case(vec![one], case_body);
        let first_body = b.block(vec![]);
        let first = b.default_case(first_body);
        let second_body = b.block(vec![]);
        let second = b.default_case(second_body);
        let x = b.name("x");
        let switch = b.switch(x, vec![first, case, second]);
        let body = b.block(vec![switch]);
        let method = b.method("m", vec![("x", x_ty)], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();

        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::SwitchDefaultDuplicate), 1);
        assert_eq!(errs.diagnostics()[0].span, Some(ast.span(second)));
        assert_eq!(ast.stage(first), Stage::Validated);
        Ok(())
    }

    #[test]
    fn duplicate_local_is_a_name_collision() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let t1 = b.ty("Int");
        let first = b.var(t1, "x", None);
        let t2 = b.ty("Int");
        let second = b.var(t2, "x", None);
        let body = b.block(vec![first, second]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::NameCollision), 1);
        Ok(())
    }

    #[test]
    fn empty_constant_true_loop_is_infinite() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let yes = b.bool_lit(true);
        let empty = b.block(vec![]);
        let lp = b.while_loop(vec![yes], empty);
        let body = b.block(vec![lp]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::InfiniteLoop), 1);
        Ok(())
    }

    #[test]
    fn switch_case_values_must_be_constant() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let ty = b.ty("Int");
        let value = b.name("n");
        let other = b.name("n");
        let body = b.block(vec![]);
        let case = b.case(vec![other], body);
        let switch = b.switch(value, vec![case]);
        let block = b.block(vec![switch]);
        let method = b.method("m", vec![("n", ty)], vec![], block);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::NotConstant), 1);
        Ok(())
    }

    #[test]
    fn assigning_to_a_constant_is_rejected() -> Result<()> {
        let fixture = Fixture::new();
        fixture
            .symbols
            .define_constant(&fixture.pool, "test.LIMIT", fixture.pool.int(3))
            .expect("define");
        let mut b = AstBuilder::new();
        let value = b.int(4);
        let assign = b.assign("LIMIT", value);
        let body = b.block(vec![assign]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::NotAssignable), 1);
        Ok(())
    }

    #[test]
    fn type_name_in_value_position() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let name = b.name("String");
        let stmt = b.expr_stmt(name);
        let body = b.block(vec![stmt]);
        let method = b.method("m", vec![], vec![], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(errs.count(ErrorCode::NotAValue), 1);
        Ok(())
    }

    #[test]
    fn return_count_must_match() -> Result<()> {
        let fixture = Fixture::new();
        let mut b = AstBuilder::new();
        let ret = b.ret(vec![]);
        let body = b.block(vec![ret]);
        let returns = b.ty("Int");
        let method = b.method("m", vec![], vec![returns], body);
        let mut ast = b.finish(method);
        let errs = ErrorList::default();
        assert_eq!(fixture.validate(&mut ast, &errs)?, None);
        assert_eq!(
            errs.diagnostics()[0].message(),
            "Expected 1 return value(s); found 0."
        );
        Ok(())
    }
}
