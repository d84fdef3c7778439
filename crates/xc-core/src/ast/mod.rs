//! Arena-backed syntax tree.
//!
//! Nodes live in one [`Ast`] arena and are addressed by [`NodeId`]. Each node owns an ordered
//! child list fixed by its variant; the parent link is a plain index. Syntactic shape never
//! changes after construction, only the computed [`NodeState`] does, with one exception: a
//! validated node may be replaced in its parent's child list by the node it validated to.

mod build;
mod copy;
mod expr;
mod print;
mod stmt;
mod ty;
mod visit;

pub use build::*;
pub use expr::*;
pub use print::*;
pub use stmt::*;
pub use ty::*;
pub use visit::*;

use crate::pool::ConstId;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("n{_0}")]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-node processing stage. Stages only move forward; `Failed` is terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    Initial,
    Resolving,
    Resolved,
    Validating,
    Validated,
    Emitted,
    Failed,
}

impl Stage {
    pub fn is_failed(self) -> bool {
        self == Stage::Failed
    }

    /// True once the node has reached `target` (a failed node has reached nothing).
    pub fn has_reached(self, target: Stage) -> bool {
        !self.is_failed() && self >= target
    }
}

/// How well an expression's type matches the type its context requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fit {
    Exact,
    /// Matches after an implicit conversion (e.g. a value into its nullable type).
    Convertible,
    /// Several values packed into a tuple.
    Pack,
    Fail,
}

impl Fit {
    pub fn is_fit(self) -> bool {
        self != Fit::Fail
    }
}

/// What a name refers to once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameBinding {
    /// A local variable or parameter declared by `decl`.
    Local { decl: NodeId },
    Type(ConstId),
    /// A named compile-time constant supplied by the symbol table.
    Constant { ty: ConstId, value: ConstId },
    /// A package or module: a name that is neither a type nor a value.
    Namespace(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GotoKind {
    Break,
    Continue,
}

/// A resolved break/continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GotoBinding {
    pub target: NodeId,
    /// Number of entered scopes the jump leaves; see [`Ast::enters_scope`].
    pub depth: usize,
    pub kind: GotoKind,
}

/// Computed facts about a node. Shared by value when a subtree is copied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub stage: Stage,
    /// Expression result type, or the type a type expression denotes.
    pub ty: Option<ConstId>,
    pub constant: Option<ConstId>,
    pub fit: Option<Fit>,
    pub binding: Option<NameBinding>,
    pub goto: Option<GotoBinding>,
    /// Lazily allocated label-scope id for statements that own labels.
    pub label_scope: Option<u32>,
    pub break_used: bool,
    pub continue_used: bool,
    /// Whether control can reach the statement, computed during emission.
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Stmt(Stmt),
    Expr(Expr),
    Type(TypeExpr),
}

impl NodeKind {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Stmt(stmt) => stmt.children(),
            NodeKind::Expr(expr) => expr.children(),
            NodeKind::Type(ty) => ty.children(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            NodeKind::Stmt(stmt) => stmt.children_mut(),
            NodeKind::Expr(expr) => expr.children_mut(),
            NodeKind::Type(ty) => ty.children_mut(),
        }
    }

    /// The same syntax with every child id passed through `f`.
    pub fn map_children(&self, mut f: impl FnMut(NodeId) -> NodeId) -> NodeKind {
        let mut kind = self.clone();
        for child in kind.children_mut() {
            *child = f(*child);
        }
        kind
    }

    pub fn as_stmt(&self) -> Option<&Stmt> {
        match self {
            NodeKind::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            NodeKind::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeExpr> {
        match self {
            NodeKind::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    /// False for nodes the parser could only partially recognise.
    pub completable: bool,
    pub state: NodeState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<AstNode>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Mark `root` as the unit root and link every parent below it.
    pub fn set_root(&mut self, root: NodeId) {
        self.link_parents(root);
        self.root = Some(root);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node. Its children must already be in the arena; their parent links are set
    /// here.
    pub fn add(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let completable = !matches!(kind, NodeKind::Type(TypeExpr::Bad(_)));
        self.add_node(AstNode {
            kind,
            span,
            parent: None,
            completable,
            state: NodeState::default(),
        })
    }

    fn add_node(&mut self, node: AstNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in node.kind.children() {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(node);
        id
    }

    pub fn add_stmt(&mut self, stmt: Stmt, span: Span) -> NodeId {
        self.add(NodeKind::Stmt(stmt), span)
    }

    pub fn add_expr(&mut self, expr: Expr, span: Span) -> NodeId {
        self.add(NodeKind::Expr(expr), span)
    }

    pub fn add_type(&mut self, ty: TypeExpr, span: Span) -> NodeId {
        self.add(NodeKind::Type(ty), span)
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn stmt(&self, id: NodeId) -> Option<&Stmt> {
        self.kind(id).as_stmt()
    }

    pub fn expr(&self, id: NodeId) -> Option<&Expr> {
        self.kind(id).as_expr()
    }

    pub fn type_expr(&self, id: NodeId) -> Option<&TypeExpr> {
        self.kind(id).as_type()
    }

    pub fn state(&self, id: NodeId) -> &NodeState {
        &self.node(id).state
    }

    pub fn state_mut(&mut self, id: NodeId) -> &mut NodeState {
        &mut self.node_mut(id).state
    }

    pub fn stage(&self, id: NodeId) -> Stage {
        self.state(id).stage
    }

    pub fn set_stage(&mut self, id: NodeId, stage: Stage) {
        tracing::trace!("{} -> {:?}", id, stage);
        self.state_mut(id).stage = stage;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// The node's own span, or the union of its children's spans when it has none.
    pub fn span(&self, id: NodeId) -> Span {
        let node = self.node(id);
        if !node.span.is_null() {
            return node.span;
        }
        Span::union(node.kind.children().into_iter().map(|child| self.span(child)))
    }

    /// Swap `old` for `new` in `parent`'s child list and re-parent `new`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        if old == new {
            return true;
        }
        let mut replaced = false;
        for child in self.node_mut(parent).kind.children_mut() {
            if *child == old {
                *child = new;
                replaced = true;
            }
        }
        if replaced {
            self.node_mut(new).parent = Some(parent);
            self.node_mut(old).parent = None;
        }
        replaced
    }

    /// The label-scope id of `id`, allocating one from `counter` on first use.
    pub fn label_scope(&mut self, id: NodeId, counter: &AtomicU32) -> u32 {
        let state = self.state_mut(id);
        *state
            .label_scope
            .get_or_insert_with(|| counter.fetch_add(1, Ordering::Relaxed))
    }

    /// A condition may short-circuit iff it is one of its parent's own condition entries.
    pub fn allows_short_circuit(&self, parent: NodeId, child: NodeId) -> bool {
        self.stmt(parent)
            .map(|stmt| stmt.conds().contains(&child))
            .unwrap_or(false)
    }

    /// Whether the code for `id` is bracketed by ENTER/EXIT: blocks declaring locals, every
    /// `for`, and conditionals whose conditions declare locals. A method body is never entered.
    pub fn enters_scope(&self, id: NodeId) -> bool {
        let declares = |ids: &[NodeId], conds: bool| {
            ids.iter().any(|id| match self.stmt(*id) {
                Some(Stmt::VarDecl { .. }) => !conds,
                Some(Stmt::CondDecl { .. }) => conds,
                _ => false,
            })
        };
        match self.stmt(id) {
            Some(Stmt::Block(stmts)) => {
                let body = self
                    .parent(id)
                    .is_some_and(|parent| matches!(self.stmt(parent), Some(Stmt::Method { .. })));
                !body && declares(stmts, false)
            }
            Some(Stmt::For { .. }) => true,
            Some(stmt @ (Stmt::If { .. } | Stmt::While { .. })) => declares(stmt.conds(), true),
            _ => false,
        }
    }
}
