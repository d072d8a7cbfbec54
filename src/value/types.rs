//! Structural type interner for tuple and array types.

use std::collections::HashMap;
use std::fmt;

use super::ARRAY_SIZE;

/// An interned type handle. Equal types always share a handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const NUM: TypeId = TypeId(0);
    pub const MIDI: TypeId = TypeId(1);
    pub const UNIT: TypeId = TypeId(2);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Num,
    Midi,
    Tuple(Vec<TypeId>),
    Array(TypeId),
}

#[derive(Debug)]
pub struct TypeInterner {
    cache: HashMap<Type, TypeId>,
    types: Vec<Type>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        let mut interner = Self {
            cache: HashMap::new(),
            types: Vec::new(),
        };
        // Order must match the TypeId constants.
        interner.intern(Type::Num);
        interner.intern(Type::Midi);
        interner.intern(Type::Tuple(Vec::new()));
        interner
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.cache.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.cache.insert(ty, id);
        id
    }

    pub fn tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.intern(Type::Tuple(elems))
    }

    pub fn array(&mut self, base: TypeId) -> TypeId {
        self.intern(Type::Array(base))
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Human-readable rendering used in diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Num => "num".to_string(),
            Type::Midi => "midi".to_string(),
            Type::Tuple(elems) => {
                let inner: Vec<String> = elems.iter().map(|e| self.display(*e)).collect();
                format!("({})", inner.join(", "))
            }
            Type::Array(base) => format!("[{}; {}]", self.display(*base), ARRAY_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_fixed() {
        let interner = TypeInterner::new();
        assert_eq!(interner.get(TypeId::NUM), &Type::Num);
        assert_eq!(interner.get(TypeId::MIDI), &Type::Midi);
        assert_eq!(interner.get(TypeId::UNIT), &Type::Tuple(Vec::new()));
    }

    #[test]
    fn tuples_are_deduplicated_structurally() {
        let mut interner = TypeInterner::new();
        let a = interner.tuple(vec![TypeId::NUM, TypeId::MIDI]);
        let b = interner.tuple(vec![TypeId::NUM, TypeId::MIDI]);
        let c = interner.tuple(vec![TypeId::MIDI, TypeId::NUM]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.display(a), "(num, midi)");
    }

    #[test]
    fn array_identity_includes_base() {
        let mut interner = TypeInterner::new();
        let nums = interner.array(TypeId::NUM);
        let pair = interner.tuple(vec![TypeId::NUM, TypeId::NUM]);
        let pairs = interner.array(pair);
        assert_ne!(nums, pairs);
        assert_eq!(interner.array(TypeId::NUM), nums);
        assert_eq!(interner.display(nums), format!("[num; {ARRAY_SIZE}]"));
    }
}
