use super::NodeId;
use crate::pretty::{escape_char, escape_string};
use std::fmt::{Display, Formatter};

common_enum! {
    pub enum Literal {
        Int(i64),
        String(String),
        Char(char),
        Bool(bool),
        Null,
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{}", value),
            Literal::String(value) => write!(f, "\"{}\"", escape_string(value)),
            Literal::Char(value) => write!(f, "'{}'", escape_char(*value)),
            Literal::Bool(value) => write!(f, "{}", value),
            Literal::Null => f.write_str("null"),
        }
    }
}

common_enum! {
    #[derive(Copy, derive_more::Display)]
    pub enum UnaryOp {
        #[display("!")]
        Not,
        #[display("-")]
        Neg,
    }
}

common_enum! {
    #[derive(Copy, derive_more::Display)]
    pub enum BinaryOp {
        #[display("+")]
        Add,
        #[display("-")]
        Sub,
        #[display("*")]
        Mul,
        #[display("/")]
        Div,
        #[display("%")]
        Mod,
        #[display("<")]
        Lt,
        #[display("<=")]
        Le,
        #[display(">")]
        Gt,
        #[display(">=")]
        Ge,
        #[display("==")]
        Eq,
        #[display("!=")]
        Ne,
        #[display("&&")]
        And,
        #[display("||")]
        Or,
    }
}

impl BinaryOp {
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
        )
    }

    pub fn is_arithmetic(self) -> bool {
        !self.is_logical() && !self.is_comparison()
    }
}

common_enum! {
    pub enum Expr {
        Literal(Literal),
        /// A possibly qualified name such as `x` or `foo.Bar`.
        Name(String),
        Paren(NodeId),
        Unary { op: UnaryOp, operand: NodeId },
        Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
        Tuple {
            ty: Option<NodeId>,
            elements: Vec<NodeId>,
        },
    }
}

impl Expr {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Expr::Literal(_) | Expr::Name(_) => Vec::new(),
            Expr::Paren(inner) => vec![*inner],
            Expr::Unary { operand, .. } => vec![*operand],
            Expr::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Expr::Tuple { ty, elements } => ty.iter().chain(elements).copied().collect(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            Expr::Literal(_) | Expr::Name(_) => Vec::new(),
            Expr::Paren(inner) => vec![inner],
            Expr::Unary { operand, .. } => vec![operand],
            Expr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Expr::Tuple { ty, elements } => ty.iter_mut().chain(elements.iter_mut()).collect(),
        }
    }
}
