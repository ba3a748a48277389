//! Interning of types by canonical identifier.

use alloc::{collections::BTreeMap, string::String};

use super::Type;

/// Maps canonical type identifiers to a single shared [`Type`] handle so that
/// repeated constructions of the same type share one allocation.
#[derive(Debug, Default, Clone)]
pub struct TypeCache {
    types: BTreeMap<String, Type>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `ty`, inserting it on first sight.
    pub fn intern(&mut self, ty: Type) -> Type {
        if let Some(existing) = self.types.get(ty.id()) {
            return existing.clone();
        }
        self.types.insert(String::from(ty.id()), ty.clone());
        ty
    }

    pub fn get(&self, id: &str) -> Option<&Type> {
        self.types.get(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }
}
