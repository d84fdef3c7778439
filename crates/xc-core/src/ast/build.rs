//! Programmatic tree construction, standing in for a parser front end.

use super::{
    Ast, BinaryOp, Expr, Keyword, Literal, NodeId, Param, Stmt, TypeExpr, UnaryOp,
};
use crate::span::{FileId, Span};

/// Builds an [`Ast`] bottom-up. Leaves get distinct, increasing spans so that diagnostics
/// point somewhere; composites take the union of their children's spans.
#[derive(Debug, Default)]
pub struct AstBuilder {
    ast: Ast,
    file: FileId,
    cursor: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_file(file: FileId) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    fn leaf_span(&mut self, width: usize) -> Span {
        let lo = self.cursor + 1;
        let hi = lo + width.max(1) as u32;
        self.cursor = hi;
        Span::new(self.file, lo, hi)
    }

    fn leaf_expr(&mut self, expr: Expr, width: usize) -> NodeId {
        let span = self.leaf_span(width);
        self.ast.add_expr(expr, span)
    }

    fn leaf_stmt(&mut self, stmt: Stmt, width: usize) -> NodeId {
        let span = self.leaf_span(width);
        self.ast.add_stmt(stmt, span)
    }

    fn leaf_type(&mut self, ty: TypeExpr, width: usize) -> NodeId {
        let span = self.leaf_span(width);
        self.ast.add_type(ty, span)
    }

    fn stmt(&mut self, stmt: Stmt) -> NodeId {
        self.ast.add_stmt(stmt, Span::null())
    }

    fn expr(&mut self, expr: Expr) -> NodeId {
        self.ast.add_expr(expr, Span::null())
    }

    /// Direct access for callers that need to tweak a node before finishing.
    pub fn ast_mut(&mut self) -> &mut Ast {
        &mut self.ast
    }

    /// Finish the tree rooted at `root`, linking every parent below it.
    pub fn finish(mut self, root: NodeId) -> Ast {
        self.ast.set_root(root);
        self.ast
    }

    // expressions

    pub fn int(&mut self, value: i64) -> NodeId {
        let width = value.to_string().len();
        self.leaf_expr(Expr::Literal(Literal::Int(value)), width)
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.leaf_expr(Expr::Literal(Literal::String(value.into())), value.len() + 2)
    }

    pub fn char_lit(&mut self, value: char) -> NodeId {
        self.leaf_expr(Expr::Literal(Literal::Char(value)), 3)
    }

    pub fn bool_lit(&mut self, value: bool) -> NodeId {
        self.leaf_expr(Expr::Literal(Literal::Bool(value)), 5)
    }

    pub fn null(&mut self) -> NodeId {
        self.leaf_expr(Expr::Literal(Literal::Null), 4)
    }

    pub fn name(&mut self, name: &str) -> NodeId {
        self.leaf_expr(Expr::Name(name.into()), name.len())
    }

    pub fn paren(&mut self, inner: NodeId) -> NodeId {
        self.expr(Expr::Paren(inner))
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.expr(Expr::Unary { op, operand })
    }

    pub fn not(&mut self, operand: NodeId) -> NodeId {
        self.unary(UnaryOp::Not, operand)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.expr(Expr::Binary { op, lhs, rhs })
    }

    pub fn and(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn tuple(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.expr(Expr::Tuple { ty: None, elements })
    }

    pub fn typed_tuple(&mut self, ty: NodeId, elements: Vec<NodeId>) -> NodeId {
        self.expr(Expr::Tuple {
            ty: Some(ty),
            elements,
        })
    }

    // type expressions

    pub fn ty(&mut self, name: &str) -> NodeId {
        self.leaf_type(TypeExpr::named(name), name.len())
    }

    pub fn ty_params(&mut self, name: &str, params: Vec<NodeId>) -> NodeId {
        let names = name.split('.').map(str::to_string).collect();
        let span = self.leaf_span(name.len());
        self.ast.add_type(TypeExpr::Named { names, params }, span)
    }

    pub fn keyword_type(&mut self, keyword: Keyword) -> NodeId {
        let width = keyword.to_string().len();
        self.leaf_type(TypeExpr::Keyword(keyword), width)
    }

    pub fn tuple_type(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.ast.add_type(TypeExpr::Tuple(elements), Span::null())
    }

    pub fn nullable(&mut self, inner: NodeId) -> NodeId {
        self.ast.add_type(TypeExpr::Nullable(inner), Span::null())
    }

    pub fn bad_type(&mut self, text: &str) -> NodeId {
        self.leaf_type(TypeExpr::Bad(text.into()), text.len())
    }

    // statements

    pub fn module(&mut self, name: &str, members: Vec<NodeId>) -> NodeId {
        self.stmt(Stmt::Module {
            name: name.into(),
            members,
        })
    }

    pub fn method(
        &mut self,
        name: &str,
        params: Vec<(&str, NodeId)>,
        returns: Vec<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let params = params
            .into_iter()
            .map(|(name, ty)| Param {
                name: name.into(),
                ty,
            })
            .collect();
        self.stmt(Stmt::Method {
            name: name.into(),
            params,
            returns,
            body,
        })
    }

    pub fn block(&mut self, stmts: Vec<NodeId>) -> NodeId {
        self.stmt(Stmt::Block(stmts))
    }

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        self.stmt(Stmt::Expr(expr))
    }

    pub fn var(&mut self, ty: NodeId, name: &str, init: Option<NodeId>) -> NodeId {
        self.stmt(Stmt::VarDecl {
            ty,
            name: name.into(),
            init,
        })
    }

    pub fn assign(&mut self, name: &str, value: NodeId) -> NodeId {
        let target = self.name(name);
        self.stmt(Stmt::Assign { target, value })
    }

    pub fn typedef(&mut self, name: &str, ty: NodeId) -> NodeId {
        self.stmt(Stmt::Typedef {
            name: name.into(),
            ty,
        })
    }

    pub fn if_then(&mut self, conds: Vec<NodeId>, then_branch: NodeId) -> NodeId {
        self.if_else(conds, then_branch, None)
    }

    pub fn if_else(
        &mut self,
        conds: Vec<NodeId>,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> NodeId {
        self.stmt(Stmt::If {
            conds,
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(&mut self, conds: Vec<NodeId>, body: NodeId) -> NodeId {
        self.stmt(Stmt::While {
            conds,
            body,
            do_while: false,
        })
    }

    pub fn do_while(&mut self, conds: Vec<NodeId>, body: NodeId) -> NodeId {
        self.stmt(Stmt::While {
            conds,
            body,
            do_while: true,
        })
    }

    pub fn for_loop(
        &mut self,
        init: Vec<NodeId>,
        conds: Vec<NodeId>,
        updates: Vec<NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.stmt(Stmt::For {
            init,
            conds,
            updates,
            body,
        })
    }

    pub fn switch(&mut self, value: NodeId, cases: Vec<NodeId>) -> NodeId {
        self.stmt(Stmt::Switch { value, cases })
    }

    pub fn case(&mut self, values: Vec<NodeId>, body: NodeId) -> NodeId {
        self.stmt(Stmt::Case { values, body })
    }

    pub fn default_case(&mut self, body: NodeId) -> NodeId {
        self.case(Vec::new(), body)
    }

    pub fn labeled(&mut self, label: &str, body: NodeId) -> NodeId {
        self.stmt(Stmt::Labeled {
            label: label.into(),
            body,
        })
    }

    pub fn brk(&mut self, label: Option<&str>) -> NodeId {
        let width = 5 + label.map_or(0, |l| l.len() + 1);
        self.leaf_stmt(Stmt::Break(label.map(str::to_string)), width)
    }

    pub fn cont(&mut self, label: Option<&str>) -> NodeId {
        let width = 8 + label.map_or(0, |l| l.len() + 1);
        self.leaf_stmt(Stmt::Continue(label.map(str::to_string)), width)
    }

    pub fn ret(&mut self, values: Vec<NodeId>) -> NodeId {
        if values.is_empty() {
            return self.leaf_stmt(Stmt::Return(values), 6);
        }
        self.stmt(Stmt::Return(values))
    }

    pub fn cond_decl(&mut self, ty: NodeId, name: &str, value: NodeId) -> NodeId {
        self.stmt(Stmt::CondDecl {
            ty,
            name: name.into(),
            value,
        })
    }
}
