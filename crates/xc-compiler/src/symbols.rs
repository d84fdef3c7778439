//! The seam to the module/class/package model.
//!
//! The compiler only asks one question of it: what does a qualified name denote in a scope.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use xc_core::ast::NameBinding;
use xc_core::collections::ConcurrentMap;
use xc_core::pool::{ConstId, ConstantPool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Type(ConstId),
    Constant { ty: ConstId, value: ConstId },
    /// A package or module.
    Namespace(String),
}

impl From<Component> for NameBinding {
    fn from(component: Component) -> Self {
        match component {
            Component::Type(ty) => NameBinding::Type(ty),
            Component::Constant { ty, value } => NameBinding::Constant { ty, value },
            Component::Namespace(name) => NameBinding::Namespace(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Component),
    NotFound,
    /// The name exists but its component is still being assembled; ask again later.
    NotYetResolvable,
}

pub trait SymbolTable: Send + Sync {
    /// Look up `name` (dot-qualified) as seen from `scope`.
    fn lookup_name(&self, scope: &str, name: &str) -> Lookup;
}

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("symbol {name} is already defined")]
    Duplicate { name: String },
    #[error("symbol {name} must be bound to a value constant")]
    NotAValue { name: String },
}

#[derive(Debug, Clone)]
struct Entry {
    component: Component,
    /// Lookups that still answer `NotYetResolvable`.
    pending: Arc<AtomicUsize>,
}

/// In-memory symbol table for embedding and tests.
///
/// Names are looked up as `scope.name` first and then as `name`. A component can be made to
/// appear late by giving it a number of lookups to hold back.
#[derive(Debug, Default)]
pub struct StaticSymbolTable {
    entries: ConcurrentMap<String, Entry>,
}

impl StaticSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, name: &str, component: Component) -> Result<(), SymbolError> {
        self.define_late(name, component, 0)
    }

    /// Answer `NotYetResolvable` for the first `hold_back` lookups of `name`.
    pub fn define_late(
        &self,
        name: &str,
        component: Component,
        hold_back: usize,
    ) -> Result<(), SymbolError> {
        if self.entries.contains_key(&name.to_string()) {
            return Err(SymbolError::Duplicate {
                name: name.to_string(),
            });
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                component,
                pending: Arc::new(AtomicUsize::new(hold_back)),
            },
        );
        Ok(())
    }

    /// Define `name` as a class type interned in `pool`.
    pub fn define_class(&self, pool: &ConstantPool, name: &str) -> Result<ConstId, SymbolError> {
        let ty = pool.class_type(name);
        self.define(name, Component::Type(ty))?;
        Ok(ty)
    }

    pub fn define_constant(
        &self,
        pool: &ConstantPool,
        name: &str,
        value: ConstId,
    ) -> Result<(), SymbolError> {
        let ty = pool
            .type_of(value)
            .map_err(|_| SymbolError::NotAValue {
                name: name.to_string(),
            })?;
        self.define(name, Component::Constant { ty, value })
    }

    fn find(&self, name: &str) -> Option<Entry> {
        self.entries.get_cloned(&name.to_string())
    }
}

impl SymbolTable for StaticSymbolTable {
    fn lookup_name(&self, scope: &str, name: &str) -> Lookup {
        let entry = self
            .find(&format!("{}.{}", scope, name))
            .or_else(|| self.find(name));
        let Some(entry) = entry else {
            return Lookup::NotFound;
        };
        let held = entry
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match held {
            Ok(_) => Lookup::NotYetResolvable,
            Err(_) => Lookup::Found(entry.component),
        }
    }
}
