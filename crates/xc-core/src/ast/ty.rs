use super::NodeId;
use itertools::Itertools;

common_enum! {
    #[derive(Copy, derive_more::Display)]
    pub enum Keyword {
        #[display("immutable")]
        Immutable,
        #[display("service")]
        Service,
        #[display("const")]
        Const,
        #[display("enum")]
        Enum,
        #[display("module")]
        Module,
        #[display("package")]
        Package,
        #[display("class")]
        Class,
        #[display("interface")]
        Interface,
        #[display("mixin")]
        Mixin,
        #[display("static")]
        Static,
        #[display("typedef")]
        Typedef,
        #[display("import")]
        Import,
        #[display("var")]
        Var,
        #[display("val")]
        Val,
    }
}

common_enum! {
    pub enum TypeExpr {
        /// A possibly qualified type name with optional type parameters.
        Named { names: Vec<String>, params: Vec<NodeId> },
        Keyword(Keyword),
        Tuple(Vec<NodeId>),
        Nullable(NodeId),
        /// Source text the parser could not turn into a type.
        Bad(String),
    }
}

impl TypeExpr {
    pub fn named(name: &str) -> TypeExpr {
        TypeExpr::Named {
            names: name.split('.').map(str::to_string).collect(),
            params: Vec::new(),
        }
    }

    pub fn qualified_name(&self) -> Option<String> {
        match self {
            TypeExpr::Named { names, .. } => Some(names.iter().join(".")),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<NodeId> {
        match self {
            TypeExpr::Named { params, .. } => params.clone(),
            TypeExpr::Tuple(elements) => elements.clone(),
            TypeExpr::Nullable(inner) => vec![*inner],
            TypeExpr::Keyword(_) | TypeExpr::Bad(_) => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            TypeExpr::Named { params, .. } => params.iter_mut().collect(),
            TypeExpr::Tuple(elements) => elements.iter_mut().collect(),
            TypeExpr::Nullable(inner) => vec![inner],
            TypeExpr::Keyword(_) | TypeExpr::Bad(_) => Vec::new(),
        }
    }
}
