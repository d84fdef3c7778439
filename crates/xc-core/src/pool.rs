//! The constant pool: an append-only interning table for compile-time values.
//!
//! Structurally equal constants always intern to the same [`ConstId`], including when several
//! units intern concurrently. Unresolved type placeholders are the one exception: each
//! placeholder is a fresh slot whose content is filled exactly once.

use crate::ast::Keyword;
use crate::collections::ConcurrentMap;
use crate::error::Result;
use crate::pretty::{escape_char, escape_string};
use itertools::Itertools;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("#{_0}")]
pub struct ConstId(pub u32);

impl ConstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

common_enum! {
    /// Fixed categories that keyword type expressions denote.
    #[derive(Copy, PartialOrd, Ord)]
    pub enum TypeCategory {
        Immutable,
        Service,
        Const,
        Enum,
        Module,
        Package,
        Class,
    }
}

impl TypeCategory {
    /// Total over the type keywords; any other keyword reaching a type position is a defect.
    pub fn from_keyword(keyword: Keyword) -> Result<Self> {
        Ok(match keyword {
            Keyword::Immutable => TypeCategory::Immutable,
            Keyword::Service => TypeCategory::Service,
            Keyword::Const => TypeCategory::Const,
            Keyword::Enum => TypeCategory::Enum,
            Keyword::Module => TypeCategory::Module,
            Keyword::Package => TypeCategory::Package,
            Keyword::Class => TypeCategory::Class,
            other => invariant!("keyword `{}` does not denote a type category", other),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeCategory::Immutable => "immutable",
            TypeCategory::Service => "service",
            TypeCategory::Const => "const",
            TypeCategory::Enum => "enum",
            TypeCategory::Module => "module",
            TypeCategory::Package => "package",
            TypeCategory::Class => "class",
        }
    }
}

common_enum! {
    pub enum TypeConstant {
        /// A named class, e.g. `Int` or `collections.HashMap`.
        Class(String),
        Parameterized { base: ConstId, params: Vec<ConstId> },
        Tuple(Vec<ConstId>),
        Nullable(ConstId),
        Immutable(ConstId),
        Keyword(TypeCategory),
    }
}

common_enum! {
    pub enum Constant {
        Int(i64),
        String(String),
        Char(char),
        Bool(bool),
        Null,
        /// A tuple value whose elements are themselves constants.
        Tuple(Vec<ConstId>),
        Type(TypeConstant),
    }
}

impl Constant {
    pub fn as_type(&self) -> Option<&TypeConstant> {
        match self {
            Constant::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        self.as_type().is_some()
    }
}

#[derive(Debug)]
pub enum PoolEntry {
    Value(Constant),
    /// A type named before it could be resolved. The slot is stable; `target` is set once.
    Unresolved {
        name: String,
        target: OnceLock<ConstId>,
    },
}

impl PoolEntry {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, PoolEntry::Unresolved { .. })
    }
}

pub const INT_TYPE: &str = "Int";
pub const STRING_TYPE: &str = "String";
pub const BOOLEAN_TYPE: &str = "Boolean";
pub const CHAR_TYPE: &str = "Char";
pub const NULLABLE_TYPE: &str = "Nullable";
pub const OBJECT_TYPE: &str = "Object";

/// Names that resolve without consulting the symbol table.
pub const BUILTIN_TYPES: [&str; 6] = [
    INT_TYPE,
    STRING_TYPE,
    BOOLEAN_TYPE,
    CHAR_TYPE,
    NULLABLE_TYPE,
    OBJECT_TYPE,
];

#[derive(Default)]
pub struct ConstantPool {
    entries: RwLock<Vec<Arc<PoolEntry>>>,
    index: ConcurrentMap<Constant, ConstId>,
}

impl std::fmt::Debug for ConstantPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantPool")
            .field("entries", &self.len())
            .field("interned", &self.index.len())
            .finish()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<PoolEntry>>> {
        self.entries.read().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<PoolEntry>>> {
        self.entries.write().unwrap_or_else(|poison| poison.into_inner())
    }

    fn push(&self, entry: PoolEntry) -> ConstId {
        let mut entries = self.write();
        entries.push(Arc::new(entry));
        ConstId((entries.len() - 1) as u32)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find-or-insert. The shard lock on `index` is held while the entry is appended, so two
    /// threads interning equal constants agree on one id.
    pub fn intern(&self, constant: Constant) -> ConstId {
        if let Some(id) = self.index.get_cloned(&constant) {
            return id;
        }
        let entry = constant.clone();
        self.index
            .get_or_insert_with(constant, || self.push(PoolEntry::Value(entry)))
    }

    pub fn intern_type(&self, ty: TypeConstant) -> ConstId {
        self.intern(Constant::Type(ty))
    }

    pub fn int(&self, value: i64) -> ConstId {
        self.intern(Constant::Int(value))
    }

    pub fn string(&self, value: impl Into<String>) -> ConstId {
        self.intern(Constant::String(value.into()))
    }

    pub fn char(&self, value: char) -> ConstId {
        self.intern(Constant::Char(value))
    }

    pub fn bool(&self, value: bool) -> ConstId {
        self.intern(Constant::Bool(value))
    }

    pub fn null(&self) -> ConstId {
        self.intern(Constant::Null)
    }

    pub fn tuple(&self, elements: Vec<ConstId>) -> ConstId {
        self.intern(Constant::Tuple(elements))
    }

    pub fn class_type(&self, name: impl Into<String>) -> ConstId {
        self.intern_type(TypeConstant::Class(name.into()))
    }

    pub fn keyword_type(&self, category: TypeCategory) -> ConstId {
        self.intern_type(TypeConstant::Keyword(category))
    }

    pub fn tuple_type(&self, elements: Vec<ConstId>) -> ConstId {
        self.intern_type(TypeConstant::Tuple(elements))
    }

    pub fn nullable_type(&self, base: ConstId) -> ConstId {
        self.intern_type(TypeConstant::Nullable(base))
    }

    pub fn immutable_type(&self, base: ConstId) -> ConstId {
        self.intern_type(TypeConstant::Immutable(base))
    }

    pub fn parameterized_type(&self, base: ConstId, params: Vec<ConstId>) -> ConstId {
        if params.is_empty() {
            return base;
        }
        self.intern_type(TypeConstant::Parameterized { base, params })
    }

    pub fn int_type(&self) -> ConstId {
        self.class_type(INT_TYPE)
    }

    pub fn string_type(&self) -> ConstId {
        self.class_type(STRING_TYPE)
    }

    pub fn boolean_type(&self) -> ConstId {
        self.class_type(BOOLEAN_TYPE)
    }

    pub fn char_type(&self) -> ConstId {
        self.class_type(CHAR_TYPE)
    }

    pub fn object_type(&self) -> ConstId {
        self.class_type(OBJECT_TYPE)
    }

    /// The type of `null`.
    pub fn null_type(&self) -> ConstId {
        self.class_type(NULLABLE_TYPE)
    }

    /// The empty tuple type, used as the type of a method with no return values.
    pub fn void_type(&self) -> ConstId {
        self.tuple_type(Vec::new())
    }

    /// Allocate a fresh, non-interned placeholder for a type that is not yet resolvable.
    pub fn new_unresolved(&self, name: impl Into<String>) -> ConstId {
        self.push(PoolEntry::Unresolved {
            name: name.into(),
            target: OnceLock::new(),
        })
    }

    pub fn entry(&self, id: ConstId) -> Result<Arc<PoolEntry>> {
        match self.read().get(id.index()) {
            Some(entry) => Ok(entry.clone()),
            None => invariant!("constant {} is not in the pool", id),
        }
    }

    /// Fill a placeholder. Filling it again with an equal type is a no-op; a different type is
    /// a defect.
    pub fn resolve_placeholder(&self, placeholder: ConstId, target: ConstId) -> Result<()> {
        let entry = self.entry(placeholder)?;
        let PoolEntry::Unresolved { name, target: slot } = entry.as_ref() else {
            invariant!("constant {} is not an unresolved placeholder", placeholder);
        };
        let target = self.canonical(target)?;
        ensure_invariant!(
            target != placeholder,
            "placeholder {} for `{}` cannot resolve to itself",
            placeholder,
            name
        );
        let existing = *slot.get_or_init(|| target);
        if existing == target {
            return Ok(());
        }
        let previous = self.canonical(existing)?;
        ensure_invariant!(
            previous == target,
            "placeholder {} for `{}` already resolved to {}; refusing {}",
            placeholder,
            name,
            previous,
            target
        );
        Ok(())
    }

    /// Follow placeholder links. Stops at the first value or at an unfilled placeholder.
    pub fn resolve(&self, mut id: ConstId) -> Result<ConstId> {
        loop {
            match self.entry(id)?.as_ref() {
                PoolEntry::Value(_) => return Ok(id),
                PoolEntry::Unresolved { target, .. } => match target.get() {
                    Some(next) => id = *next,
                    None => return Ok(id),
                },
            }
        }
    }

    /// True when `id`, and every type it is built from, no longer depends on an unfilled
    /// placeholder.
    pub fn is_resolved(&self, id: ConstId) -> Result<bool> {
        let id = self.resolve(id)?;
        let entry = self.entry(id)?;
        Ok(match entry.as_ref() {
            PoolEntry::Unresolved { .. } => false,
            PoolEntry::Value(constant) => self
                .children(constant)
                .into_iter()
                .map(|child| self.is_resolved(child))
                .process_results(|mut all| all.all(|resolved| resolved))?,
        })
    }

    fn children(&self, constant: &Constant) -> Vec<ConstId> {
        match constant {
            Constant::Tuple(elements) => elements.clone(),
            Constant::Type(TypeConstant::Parameterized { base, params }) => {
                std::iter::once(*base).chain(params.iter().copied()).collect()
            }
            Constant::Type(TypeConstant::Tuple(elements)) => elements.clone(),
            Constant::Type(TypeConstant::Nullable(base))
            | Constant::Type(TypeConstant::Immutable(base)) => vec![*base],
            _ => Vec::new(),
        }
    }

    /// The id a fully resolved structural twin of `id` interns to. Composite types built over
    /// filled placeholders become equal to the same types built over the targets directly.
    pub fn canonical(&self, id: ConstId) -> Result<ConstId> {
        let id = self.resolve(id)?;
        let entry = self.entry(id)?;
        let PoolEntry::Value(constant) = entry.as_ref() else {
            return Ok(id);
        };
        let canon = |ids: &[ConstId]| -> Result<Vec<ConstId>> {
            ids.iter().map(|child| self.canonical(*child)).collect()
        };
        let rebuilt = match constant {
            Constant::Tuple(elements) => Constant::Tuple(canon(elements)?),
            Constant::Type(TypeConstant::Parameterized { base, params }) => {
                Constant::Type(TypeConstant::Parameterized {
                    base: self.canonical(*base)?,
                    params: canon(params)?,
                })
            }
            Constant::Type(TypeConstant::Tuple(elements)) => {
                Constant::Type(TypeConstant::Tuple(canon(elements)?))
            }
            Constant::Type(TypeConstant::Nullable(base)) => {
                Constant::Type(TypeConstant::Nullable(self.canonical(*base)?))
            }
            Constant::Type(TypeConstant::Immutable(base)) => {
                Constant::Type(TypeConstant::Immutable(self.canonical(*base)?))
            }
            _ => return Ok(id),
        };
        if &rebuilt == constant {
            return Ok(id);
        }
        Ok(self.intern(rebuilt))
    }

    /// The constant behind `id` after following placeholders; `None` for an unfilled one.
    pub fn get(&self, id: ConstId) -> Result<Option<Constant>> {
        let id = self.resolve(id)?;
        Ok(match self.entry(id)?.as_ref() {
            PoolEntry::Value(constant) => Some(constant.clone()),
            PoolEntry::Unresolved { .. } => None,
        })
    }

    pub fn is_type(&self, id: ConstId) -> Result<bool> {
        Ok(match self.entry(self.resolve(id)?)?.as_ref() {
            PoolEntry::Value(constant) => constant.is_type(),
            PoolEntry::Unresolved { .. } => true,
        })
    }

    pub fn as_bool(&self, id: ConstId) -> Result<Option<bool>> {
        Ok(match self.get(id)? {
            Some(Constant::Bool(value)) => Some(value),
            _ => None,
        })
    }

    pub fn as_int(&self, id: ConstId) -> Result<Option<i64>> {
        Ok(match self.get(id)? {
            Some(Constant::Int(value)) => Some(value),
            _ => None,
        })
    }

    /// The type of a value constant.
    pub fn type_of(&self, id: ConstId) -> Result<ConstId> {
        Ok(match self.get(id)? {
            Some(Constant::Int(_)) => self.int_type(),
            Some(Constant::String(_)) => self.string_type(),
            Some(Constant::Char(_)) => self.char_type(),
            Some(Constant::Bool(_)) => self.boolean_type(),
            Some(Constant::Null) => self.null_type(),
            Some(Constant::Tuple(elements)) => {
                let types = elements
                    .iter()
                    .map(|element| self.type_of(*element))
                    .collect::<Result<Vec<_>>>()?;
                self.tuple_type(types)
            }
            Some(Constant::Type(_)) | None => {
                invariant!("constant {} is a type, not a value", id)
            }
        })
    }

    /// Human-readable rendering for diagnostics and disassembly.
    pub fn describe(&self, id: ConstId) -> String {
        self.try_describe(id).unwrap_or_else(|_| id.to_string())
    }

    fn try_describe(&self, id: ConstId) -> Result<String> {
        let entry = self.entry(self.resolve(id)?)?;
        let constant = match entry.as_ref() {
            PoolEntry::Unresolved { name, .. } => return Ok(name.clone()),
            PoolEntry::Value(constant) => constant,
        };
        let list = |ids: &[ConstId]| ids.iter().map(|id| self.describe(*id)).join(", ");
        Ok(match constant {
            Constant::Int(value) => value.to_string(),
            Constant::String(value) => format!("\"{}\"", escape_string(value)),
            Constant::Char(value) => format!("'{}'", escape_char(*value)),
            Constant::Bool(value) => value.to_string(),
            Constant::Null => "null".to_string(),
            Constant::Tuple(elements) => format!("({})", list(elements)),
            Constant::Type(ty) => match ty {
                TypeConstant::Class(name) => name.clone(),
                TypeConstant::Parameterized { base, params } => {
                    format!("{}<{}>", self.describe(*base), list(params))
                }
                TypeConstant::Tuple(elements) => format!("Tuple<{}>", list(elements)),
                TypeConstant::Nullable(base) => format!("{}?", self.describe(*base)),
                TypeConstant::Immutable(base) => format!("immutable {}", self.describe(*base)),
                TypeConstant::Keyword(category) => category.name().to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    #[test]
    fn equal_constants_share_an_id() {
        let pool = ConstantPool::new();
        let a = pool.tuple(vec![pool.int(1), pool.string("a")]);
        let b = pool.tuple(vec![pool.int(1), pool.string("a")]);
        assert_eq!(a, b);
        assert_ne!(pool.int(1), pool.int(2));
        assert_eq!(pool.describe(a), "(1, \"a\")");
    }

    #[test]
    fn concurrent_interning_agrees() {
        let pool = Arc::new(ConstantPool::new());
        let ids = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let base = pool.class_type("collections.Map");
                    let params = vec![pool.string_type(), pool.int_type()];
                    pool.parameterized_type(base, params)
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().expect("thread panicked"))
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(pool.describe(ids[0]), "collections.Map<String, Int>");
    }

    #[test]
    fn placeholder_keeps_slot_and_resolves_once() -> Result<()> {
        let pool = ConstantPool::new();
        let first = pool.new_unresolved("foo.Bar");
        let second = pool.new_unresolved("foo.Bar");
        assert_ne!(first, second);
        assert!(!pool.is_resolved(first)?);
        assert_eq!(pool.describe(first), "foo.Bar");

        let target = pool.class_type("foo.Bar");
        pool.resolve_placeholder(first, target)?;
        assert_eq!(pool.resolve(first)?, target);
        assert!(pool.is_resolved(first)?);
        pool.resolve_placeholder(first, target)?;

        let err = pool
            .resolve_placeholder(first, pool.int_type())
            .expect_err("second resolution must fail");
        assert!(err.is_invariant());
        Ok(())
    }

    #[test]
    fn canonical_rebuilds_composites_over_placeholders() -> Result<()> {
        let pool = ConstantPool::new();
        let placeholder = pool.new_unresolved("Key");
        let nullable = pool.nullable_type(placeholder);
        assert!(!pool.is_resolved(nullable)?);
        pool.resolve_placeholder(placeholder, pool.string_type())?;
        assert_eq!(
            pool.canonical(nullable)?,
            pool.nullable_type(pool.string_type())
        );
        Ok(())
    }

    #[test]
    fn keyword_mapping_is_total_over_type_keywords() -> Result<()> {
        assert_eq!(
            TypeCategory::from_keyword(Keyword::Service)?,
            TypeCategory::Service
        );
        assert_eq!(
            TypeCategory::from_keyword(Keyword::Package)?,
            TypeCategory::Package
        );
        let err = TypeCategory::from_keyword(Keyword::Static).expect_err("not a type keyword");
        assert!(err.is_invariant());
        Ok(())
    }

    #[test]
    fn tuple_values_have_tuple_types() -> Result<()> {
        let pool = ConstantPool::new();
        let value = pool.tuple(vec![pool.int(1), pool.string("a")]);
        let ty = pool.type_of(value)?;
        assert_eq!(ty, pool.tuple_type(vec![pool.int_type(), pool.string_type()]));
        assert_eq!(pool.describe(ty), "Tuple<Int, String>");
        Ok(())
    }
}
