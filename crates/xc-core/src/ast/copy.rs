use super::{Ast, AstNode, NodeId};

impl Ast {
    /// Deep-copy the subtree at `id`. Syntax is duplicated with every child re-parented to its
    /// copy; computed state is carried over by value. The copy root has no parent.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let children = self.children(id);
        let copies: Vec<NodeId> = children
            .into_iter()
            .map(|child| self.copy_subtree(child))
            .collect();
        let original = self.node(id);
        // map_children visits children in the same order children() lists them
        let mut copies = copies.into_iter();
        let kind = original
            .kind
            .map_children(|child| copies.next().unwrap_or(child));
        let node = AstNode {
            kind,
            span: original.span,
            parent: None,
            completable: original.completable,
            state: original.state.clone(),
        };
        self.add_node(node)
    }

    /// Drop every node added after the arena held `len` nodes. No kept node may refer to a
    /// dropped one, which holds for a parentless copy and everything added under it.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
        if self.root.is_some_and(|root| root.index() >= len) {
            self.root = None;
        }
    }

    /// Same syntax shape at `a` and `b`: equal variants and payloads, equal child structure.
    /// Spans and computed state are ignored.
    pub fn structurally_equal(&self, a: NodeId, b: NodeId) -> bool {
        let (left, right) = (self.node(a), self.node(b));
        let placeholder = |_| NodeId(0);
        if left.completable != right.completable
            || left.kind.map_children(placeholder) != right.kind.map_children(placeholder)
        {
            return false;
        }
        let (left, right) = (left.kind.children(), right.kind.children());
        left.len() == right.len()
            && left
                .iter()
                .zip(&right)
                .all(|(l, r)| self.structurally_equal(*l, *r))
    }
}
