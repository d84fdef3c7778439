use super::{Ast, AstVisitor, Expr, NodeId, Stmt, TypeExpr, Walk};
use crate::pool::ConstantPool;
use crate::pretty::{PrettyCtx, PrettyPrintable};
use itertools::Itertools;
use std::fmt::{self, Formatter};

/// Indented outline of a subtree, one node per line.
pub struct AstDisplay<'a> {
    ast: &'a Ast,
    root: NodeId,
    pool: Option<&'a ConstantPool>,
}

impl<'a> AstDisplay<'a> {
    pub fn new(ast: &'a Ast, root: NodeId) -> Self {
        Self {
            ast,
            root,
            pool: None,
        }
    }

    /// Resolve type ids through `pool` when types are shown.
    pub fn with_pool(mut self, pool: &'a ConstantPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

impl PrettyPrintable for AstDisplay<'_> {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        let mut outline = Outline::default();
        self.ast.accept(self.root, &mut outline);
        for (depth, id, text) in outline.lines {
            let mut line = format!(
                "{:width$}{}",
                "",
                text,
                width = depth * ctx.options.indent_size
            );
            let state = self.ast.state(id);
            if ctx.options.show_types {
                if let Some(ty) = state.ty {
                    match self.pool {
                        Some(pool) => line.push_str(&format!(" : {}", pool.describe(ty))),
                        None => line.push_str(&format!(" : {}", ty)),
                    }
                }
            }
            if ctx.options.show_spans {
                let span = self.ast.span(id);
                line.push_str(&format!(" @{}..{}", span.lo, span.hi));
            }
            if ctx.options.show_stages {
                line.push_str(&format!(" [{:?}]", state.stage));
            }
            ctx.writeln(f, line)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Outline {
    depth: usize,
    lines: Vec<(usize, NodeId, String)>,
}

impl Outline {
    fn line(&mut self, id: NodeId, text: String) -> Walk {
        self.lines.push((self.depth, id, text));
        self.depth += 1;
        Walk::Descend
    }
}

impl AstVisitor for Outline {
    fn visit_stmt(&mut self, _ast: &Ast, id: NodeId, stmt: &Stmt) -> Walk {
        let keyword = stmt.keyword();
        let text = match stmt {
            Stmt::Module { name, .. } => format!("{} {}", keyword, name),
            Stmt::Method { name, params, .. } => format!(
                "{} {}({})",
                keyword,
                name,
                params.iter().map(|param| &param.name).join(", ")
            ),
            Stmt::VarDecl { name, .. }
            | Stmt::Typedef { name, .. }
            | Stmt::CondDecl { name, .. } => format!("{} {}", keyword, name),
            Stmt::Labeled { label, .. }
            | Stmt::Break(Some(label))
            | Stmt::Continue(Some(label)) => format!("{} {}", keyword, label),
            _ => keyword.to_string(),
        };
        self.line(id, text)
    }

    fn visit_expr(&mut self, _ast: &Ast, id: NodeId, expr: &Expr) -> Walk {
        let text = match expr {
            Expr::Literal(literal) => literal.to_string(),
            Expr::Name(name) => name.clone(),
            Expr::Paren(_) => "()".to_string(),
            Expr::Unary { op, .. } => op.to_string(),
            Expr::Binary { op, .. } => op.to_string(),
            Expr::Tuple { .. } => "tuple".to_string(),
        };
        self.line(id, text)
    }

    fn visit_type(&mut self, _ast: &Ast, id: NodeId, ty: &TypeExpr) -> Walk {
        let text = match ty {
            TypeExpr::Named { .. } => ty.qualified_name().unwrap_or_default(),
            TypeExpr::Keyword(keyword) => keyword.to_string(),
            TypeExpr::Tuple(_) => "Tuple".to_string(),
            TypeExpr::Nullable(_) => "?".to_string(),
            TypeExpr::Bad(text) => format!("<bad type: {}>", text),
        };
        self.line(id, text)
    }

    fn leave(&mut self, _ast: &Ast, _id: NodeId) {
        self.depth -= 1;
    }
}
