use super::{Ast, Expr, NodeId, NodeKind, Stmt, TypeExpr};

/// Whether [`Ast::accept`] should descend into a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
}

/// Per-variant callbacks for a pre-order walk. `leave` runs after a node's children.
pub trait AstVisitor {
    fn visit_stmt(&mut self, _ast: &Ast, _id: NodeId, _stmt: &Stmt) -> Walk {
        Walk::Descend
    }

    fn visit_expr(&mut self, _ast: &Ast, _id: NodeId, _expr: &Expr) -> Walk {
        Walk::Descend
    }

    fn visit_type(&mut self, _ast: &Ast, _id: NodeId, _ty: &TypeExpr) -> Walk {
        Walk::Descend
    }

    fn leave(&mut self, _ast: &Ast, _id: NodeId) {}
}

impl Ast {
    pub fn accept(&self, id: NodeId, visitor: &mut dyn AstVisitor) {
        let walk = match self.kind(id) {
            NodeKind::Stmt(stmt) => visitor.visit_stmt(self, id, stmt),
            NodeKind::Expr(expr) => visitor.visit_expr(self, id, expr),
            NodeKind::Type(ty) => visitor.visit_type(self, id, ty),
        };
        if walk == Walk::Descend {
            for child in self.children(id) {
                self.accept(child, visitor);
            }
        }
        visitor.leave(self, id);
    }

    /// Every node under `root` (inclusive) in pre-order.
    pub fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut collector = PreorderCollector::default();
        self.accept(root, &mut collector);
        collector.ids
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self, root: NodeId) -> usize {
        let mut meter = DepthMeter::default();
        self.accept(root, &mut meter);
        meter.max
    }

    /// Recompute every parent link below `root`. `root` becomes parentless.
    pub fn link_parents(&mut self, root: NodeId) {
        let mut linker = ParentLinker::default();
        self.accept(root, &mut linker);
        self.node_mut(root).parent = None;
        for (child, parent) in linker.links {
            self.node_mut(child).parent = Some(parent);
        }
    }
}

#[derive(Default)]
struct PreorderCollector {
    ids: Vec<NodeId>,
}

impl PreorderCollector {
    fn push(&mut self, id: NodeId) -> Walk {
        self.ids.push(id);
        Walk::Descend
    }
}

impl AstVisitor for PreorderCollector {
    fn visit_stmt(&mut self, _ast: &Ast, id: NodeId, _stmt: &Stmt) -> Walk {
        self.push(id)
    }

    fn visit_expr(&mut self, _ast: &Ast, id: NodeId, _expr: &Expr) -> Walk {
        self.push(id)
    }

    fn visit_type(&mut self, _ast: &Ast, id: NodeId, _ty: &TypeExpr) -> Walk {
        self.push(id)
    }
}

#[derive(Default)]
struct DepthMeter {
    current: usize,
    max: usize,
}

impl DepthMeter {
    fn enter(&mut self) -> Walk {
        self.current += 1;
        self.max = self.max.max(self.current);
        Walk::Descend
    }
}

impl AstVisitor for DepthMeter {
    fn visit_stmt(&mut self, _ast: &Ast, _id: NodeId, _stmt: &Stmt) -> Walk {
        self.enter()
    }

    fn visit_expr(&mut self, _ast: &Ast, _id: NodeId, _expr: &Expr) -> Walk {
        self.enter()
    }

    fn visit_type(&mut self, _ast: &Ast, _id: NodeId, _ty: &TypeExpr) -> Walk {
        self.enter()
    }

    fn leave(&mut self, _ast: &Ast, _id: NodeId) {
        self.current -= 1;
    }
}

#[derive(Default)]
struct ParentLinker {
    links: Vec<(NodeId, NodeId)>,
}

impl ParentLinker {
    fn link(&mut self, ast: &Ast, id: NodeId) -> Walk {
        self.links
            .extend(ast.children(id).into_iter().map(|child| (child, id)));
        Walk::Descend
    }
}

impl AstVisitor for ParentLinker {
    fn visit_stmt(&mut self, ast: &Ast, id: NodeId, _stmt: &Stmt) -> Walk {
        self.link(ast, id)
    }

    fn visit_expr(&mut self, ast: &Ast, id: NodeId, _expr: &Expr) -> Walk {
        self.link(ast, id)
    }

    fn visit_type(&mut self, ast: &Ast, id: NodeId, _ty: &TypeExpr) -> Walk {
        self.link(ast, id)
    }
}
