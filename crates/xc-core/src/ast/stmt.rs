use super::NodeId;

common_struct! {
    pub struct Param {
        pub name: String,
        pub ty: NodeId,
    }
}

common_enum! {
    pub enum Stmt {
        /// Compilation-unit root: a named container of methods.
        Module { name: String, members: Vec<NodeId> },
        Method {
            name: String,
            params: Vec<Param>,
            returns: Vec<NodeId>,
            body: NodeId,
        },
        Block(Vec<NodeId>),
        Expr(NodeId),
        VarDecl {
            ty: NodeId,
            name: String,
            init: Option<NodeId>,
        },
        Assign { target: NodeId, value: NodeId },
        /// Block-scoped type alias, visible to the whole enclosing block.
        Typedef { name: String, ty: NodeId },
        If {
            conds: Vec<NodeId>,
            then_branch: NodeId,
            else_branch: Option<NodeId>,
        },
        While {
            conds: Vec<NodeId>,
            body: NodeId,
            do_while: bool,
        },
        For {
            init: Vec<NodeId>,
            conds: Vec<NodeId>,
            updates: Vec<NodeId>,
            body: NodeId,
        },
        Switch { value: NodeId, cases: Vec<NodeId> },
        /// One arm of a switch; no values means `default`.
        Case { values: Vec<NodeId>, body: NodeId },
        Labeled { label: String, body: NodeId },
        Break(Option<String>),
        Continue(Option<String>),
        Return(Vec<NodeId>),
        /// `T x ?= value`: true iff `value` is not null, binding `x` to it.
        CondDecl {
            ty: NodeId,
            name: String,
            value: NodeId,
        },
    }
}

impl Stmt {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Stmt::Module { members, .. } => members.clone(),
            Stmt::Method {
                params,
                returns,
                body,
                ..
            } => params
                .iter()
                .map(|param| param.ty)
                .chain(returns.iter().copied())
                .chain(Some(*body))
                .collect(),
            Stmt::Block(stmts) => stmts.clone(),
            Stmt::Expr(expr) => vec![*expr],
            Stmt::VarDecl { ty, init, .. } => Some(*ty).into_iter().chain(*init).collect(),
            Stmt::Assign { target, value } => vec![*target, *value],
            Stmt::Typedef { ty, .. } => vec![*ty],
            Stmt::If {
                conds,
                then_branch,
                else_branch,
            } => conds
                .iter()
                .copied()
                .chain(Some(*then_branch))
                .chain(*else_branch)
                .collect(),
            Stmt::While { conds, body, .. } => conds.iter().copied().chain(Some(*body)).collect(),
            Stmt::For {
                init,
                conds,
                updates,
                body,
            } => init
                .iter()
                .chain(conds)
                .chain(updates)
                .copied()
                .chain(Some(*body))
                .collect(),
            Stmt::Switch { value, cases } => Some(*value).into_iter().chain(cases.clone()).collect(),
            Stmt::Case { values, body } => values.iter().copied().chain(Some(*body)).collect(),
            Stmt::Labeled { body, .. } => vec![*body],
            Stmt::Break(_) | Stmt::Continue(_) => Vec::new(),
            Stmt::Return(values) => values.clone(),
            Stmt::CondDecl { ty, value, .. } => vec![*ty, *value],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            Stmt::Module { members, .. } => members.iter_mut().collect(),
            Stmt::Method {
                params,
                returns,
                body,
                ..
            } => params
                .iter_mut()
                .map(|param| &mut param.ty)
                .chain(returns.iter_mut())
                .chain(Some(body))
                .collect(),
            Stmt::Block(stmts) => stmts.iter_mut().collect(),
            Stmt::Expr(expr) => vec![expr],
            Stmt::VarDecl { ty, init, .. } => Some(ty).into_iter().chain(init.as_mut()).collect(),
            Stmt::Assign { target, value } => vec![target, value],
            Stmt::Typedef { ty, .. } => vec![ty],
            Stmt::If {
                conds,
                then_branch,
                else_branch,
            } => conds
                .iter_mut()
                .chain(Some(then_branch))
                .chain(else_branch.as_mut())
                .collect(),
            Stmt::While { conds, body, .. } => conds.iter_mut().chain(Some(body)).collect(),
            Stmt::For {
                init,
                conds,
                updates,
                body,
            } => init
                .iter_mut()
                .chain(conds.iter_mut())
                .chain(updates.iter_mut())
                .chain(Some(body))
                .collect(),
            Stmt::Switch { value, cases } => Some(value).into_iter().chain(cases.iter_mut()).collect(),
            Stmt::Case { values, body } => values.iter_mut().chain(Some(body)).collect(),
            Stmt::Labeled { body, .. } => vec![body],
            Stmt::Break(_) | Stmt::Continue(_) => Vec::new(),
            Stmt::Return(values) => values.iter_mut().collect(),
            Stmt::CondDecl { ty, value, .. } => vec![ty, value],
        }
    }

    /// Condition entries of a conditional statement, in evaluation order.
    pub fn conds(&self) -> &[NodeId] {
        match self {
            Stmt::If { conds, .. } | Stmt::While { conds, .. } | Stmt::For { conds, .. } => conds,
            _ => &[],
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Stmt::While { .. } | Stmt::For { .. })
    }

    /// Natural target of an unlabeled break.
    pub fn is_break_target(&self) -> bool {
        self.is_loop() || matches!(self, Stmt::Switch { .. })
    }

    /// The name this statement declares into its enclosing scope, if any.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Stmt::VarDecl { name, .. } | Stmt::CondDecl { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Stmt::Module { .. } => "module",
            Stmt::Method { .. } => "method",
            Stmt::Block(_) => "block",
            Stmt::Expr(_) => "expr",
            Stmt::VarDecl { .. } => "var",
            Stmt::Assign { .. } => "assign",
            Stmt::Typedef { .. } => "typedef",
            Stmt::If { .. } => "if",
            Stmt::While { do_while: true, .. } => "do",
            Stmt::While { .. } => "while",
            Stmt::For { .. } => "for",
            Stmt::Switch { .. } => "switch",
            Stmt::Case { values, .. } if values.is_empty() => "default",
            Stmt::Case { .. } => "case",
            Stmt::Labeled { .. } => "label",
            Stmt::Break(_) => "break",
            Stmt::Continue(_) => "continue",
            Stmt::Return(_) => "return",
            Stmt::CondDecl { .. } => "cond",
        }
    }
}
