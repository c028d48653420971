//! Stack item implementation for the Vela Virtual Machine.
//!
//! Composite items (`Array`, `Struct`, `Map`, `Buffer`) are shared mutable
//! references, so aliasing and self-referential graphs are constructible at
//! runtime. Traversals that must terminate (serialization, deep equality)
//! carry an identity set of visited nodes instead of assuming the graph is
//! a tree.

use crate::error::{Error, Result};
use crate::stack_item_type::StackItemType;
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::Zero;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A trait for opaque host-side handles carried on the stack.
pub trait InteropInterface: fmt::Debug {
    /// Gets the type of the interop interface.
    fn interface_type(&self) -> &str;

    /// Allows downcasting to concrete types.
    fn as_any(&self) -> &dyn Any;
}

/// Represents a value in the Vela VM.
#[derive(Debug, Clone)]
pub enum StackItem {
    /// Represents a null value.
    Null,

    /// Represents a boolean value.
    Boolean(bool),

    /// Represents an arbitrary-precision integer.
    Integer(BigInt),

    /// Represents an immutable byte string.
    ByteString(Vec<u8>),

    /// Represents a mutable byte buffer.
    Buffer(Rc<RefCell<Vec<u8>>>),

    /// Represents an array of stack items with reference-equality semantics.
    Array(Rc<RefCell<Vec<StackItem>>>),

    /// Represents a struct of stack items with value-equality semantics.
    Struct(Rc<RefCell<Vec<StackItem>>>),

    /// Represents an insertion-ordered map of stack items.
    Map(Rc<RefCell<Map>>),

    /// Represents a pointer to a position in a script.
    Pointer(usize),

    /// Represents an interop interface handle.
    InteropInterface(Rc<dyn InteropInterface>),
}

impl StackItem {
    /// The singleton Null value.
    pub fn null() -> Self {
        StackItem::Null
    }

    /// Creates a boolean stack item.
    pub fn from_bool(value: bool) -> Self {
        StackItem::Boolean(value)
    }

    /// Creates an integer stack item.
    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        StackItem::Integer(value.into())
    }

    /// Creates a byte string stack item.
    pub fn from_byte_string<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::ByteString(value.into())
    }

    /// Creates a buffer stack item.
    pub fn from_buffer<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::Buffer(Rc::new(RefCell::new(value.into())))
    }

    /// Creates an array stack item.
    pub fn from_array<T: Into<Vec<StackItem>>>(value: T) -> Self {
        StackItem::Array(Rc::new(RefCell::new(value.into())))
    }

    /// Creates a struct stack item.
    pub fn from_struct<T: Into<Vec<StackItem>>>(value: T) -> Self {
        StackItem::Struct(Rc::new(RefCell::new(value.into())))
    }

    /// Creates a map stack item.
    pub fn from_map(value: Map) -> Self {
        StackItem::Map(Rc::new(RefCell::new(value)))
    }

    /// Creates an empty map stack item.
    pub fn new_map() -> Self {
        Self::from_map(Map::new())
    }

    /// Creates a pointer stack item.
    pub fn from_pointer(value: usize) -> Self {
        StackItem::Pointer(value)
    }

    /// Creates an interop interface stack item.
    pub fn from_interface<T: InteropInterface + 'static>(value: T) -> Self {
        StackItem::InteropInterface(Rc::new(value))
    }

    /// Returns the type of the stack item.
    pub fn stack_item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer(_) => StackItemType::Pointer,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
        }
    }

    /// Returns true if the stack item is null.
    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// Converts the stack item to a boolean.
    pub fn as_bool(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(b) => b.iter().any(|x| *x != 0),
            StackItem::Buffer(b) => b.borrow().iter().any(|x| *x != 0),
            _ => true,
        }
    }

    /// Converts the stack item to an integer.
    pub fn as_int(&self) -> Result<BigInt> {
        match self {
            StackItem::Boolean(b) => Ok(BigInt::from(u8::from(*b))),
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::ByteString(b) => Ok(BigInt::from_signed_bytes_le(b)),
            StackItem::Buffer(b) => Ok(BigInt::from_signed_bytes_le(&b.borrow())),
            other => Err(Error::InvalidCast(format!(
                "{:?} cannot be converted to an integer",
                other.stack_item_type()
            ))),
        }
    }

    /// Converts the stack item to a byte vector.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        match self {
            StackItem::ByteString(b) => Ok(b.clone()),
            StackItem::Buffer(b) => Ok(b.borrow().clone()),
            StackItem::Integer(i) => Ok(int_to_bytes(i)),
            StackItem::Boolean(b) => Ok(vec![u8::from(*b)]),
            other => Err(Error::InvalidCast(format!(
                "{:?} cannot be converted to bytes",
                other.stack_item_type()
            ))),
        }
    }

    /// Returns the identity of a composite item, used by cycle guards.
    pub fn composite_id(&self) -> Option<usize> {
        match self {
            StackItem::Array(a) | StackItem::Struct(a) => Some(Rc::as_ptr(a) as *const () as usize),
            StackItem::Map(m) => Some(Rc::as_ptr(m) as *const () as usize),
            _ => None,
        }
    }

    /// Returns true if both items are the same runtime reference.
    ///
    /// Primitives compare by value; composites compare by pointer identity.
    pub fn same_ref(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Array(a), StackItem::Array(b))
            | (StackItem::Struct(a), StackItem::Struct(b)) => Rc::ptr_eq(a, b),
            (StackItem::Map(a), StackItem::Map(b)) => Rc::ptr_eq(a, b),
            (StackItem::Buffer(a), StackItem::Buffer(b)) => Rc::ptr_eq(a, b),
            (StackItem::InteropInterface(a), StackItem::InteropInterface(b)) => Rc::ptr_eq(a, b),
            (a, b) => deep_eq(a, b, &mut Vec::new()),
        }
    }
}

/// Minimal little-endian two's-complement encoding of an integer.
///
/// Zero encodes as the empty byte string.
pub(crate) fn int_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_signed_bytes_le()
    }
}

impl PartialEq for StackItem {
    fn eq(&self, other: &Self) -> bool {
        deep_eq(self, other, &mut Vec::new())
    }
}

fn deep_eq(a: &StackItem, b: &StackItem, visited: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (StackItem::Null, StackItem::Null) => true,
        (StackItem::Boolean(x), StackItem::Boolean(y)) => x == y,
        (StackItem::Integer(x), StackItem::Integer(y)) => x == y,
        (StackItem::ByteString(x), StackItem::ByteString(y)) => x == y,
        (StackItem::Buffer(x), StackItem::Buffer(y)) => {
            Rc::ptr_eq(x, y) || *x.borrow() == *y.borrow()
        }
        (StackItem::Pointer(x), StackItem::Pointer(y)) => x == y,
        (StackItem::InteropInterface(x), StackItem::InteropInterface(y)) => Rc::ptr_eq(x, y),
        (StackItem::Array(x), StackItem::Array(y)) | (StackItem::Struct(x), StackItem::Struct(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Rc::as_ptr(x) as *const () as usize, Rc::as_ptr(y) as *const () as usize);
            if visited.contains(&pair) {
                // Re-entering the same pair of nodes: treat as equal to terminate.
                return true;
            }
            visited.push(pair);
            let xs = x.borrow();
            let ys = y.borrow();
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(i, j)| deep_eq(i, j, visited))
        }
        (StackItem::Map(x), StackItem::Map(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Rc::as_ptr(x) as *const () as usize, Rc::as_ptr(y) as *const () as usize);
            if visited.contains(&pair) {
                return true;
            }
            visited.push(pair);
            let xs = x.borrow();
            let ys = y.borrow();
            xs.len() == ys.len()
                && xs
                    .entries()
                    .zip(ys.entries())
                    .all(|((ka, va), (kb, vb))| deep_eq(ka, kb, visited) && deep_eq(va, vb, visited))
        }
        _ => false,
    }
}

/// An insertion-ordered map of stack items.
///
/// Keys are restricted to primitive variants and are unique by their
/// canonical byte encoding; inserting an existing key replaces the value in
/// place.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: IndexMap<Vec<u8>, (StackItem, StackItem)>,
}

impl Map {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical byte encoding of a map key.
    ///
    /// Only primitive variants are valid keys.
    pub fn key_bytes(key: &StackItem) -> Result<Vec<u8>> {
        let mut out = vec![key.stack_item_type().to_byte()];
        match key {
            StackItem::Boolean(b) => out.push(u8::from(*b)),
            StackItem::Integer(i) => out.extend_from_slice(&int_to_bytes(i)),
            StackItem::ByteString(b) => out.extend_from_slice(b),
            other => {
                return Err(Error::InvalidType(format!(
                    "{:?} is not a valid map key",
                    other.stack_item_type()
                )))
            }
        }
        Ok(out)
    }

    /// Inserts a key-value pair, replacing any existing value for the key.
    pub fn insert(&mut self, key: StackItem, value: StackItem) -> Result<()> {
        let encoded = Self::key_bytes(&key)?;
        self.entries.insert(encoded, (key, value));
        Ok(())
    }

    /// Gets the value stored under a key.
    pub fn get(&self, key: &StackItem) -> Result<Option<&StackItem>> {
        let encoded = Self::key_bytes(key)?;
        Ok(self.entries.get(&encoded).map(|(_, v)| v))
    }

    /// Removes the value stored under a key, preserving insertion order of
    /// the remaining entries.
    pub fn remove(&mut self, key: &StackItem) -> Result<Option<StackItem>> {
        let encoded = Self::key_bytes(key)?;
        Ok(self.entries.shift_remove(&encoded).map(|(_, v)| v))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&StackItem, &StackItem)> {
        self.entries.values().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(StackItem::null().stack_item_type(), StackItemType::Any);
        assert_eq!(
            StackItem::from_bool(true).stack_item_type(),
            StackItemType::Boolean
        );
        assert_eq!(
            StackItem::from_int(42).stack_item_type(),
            StackItemType::Integer
        );
        assert_eq!(
            StackItem::from_byte_string(b"x".to_vec()).stack_item_type(),
            StackItemType::ByteString
        );
        assert_eq!(
            StackItem::from_buffer(vec![1]).stack_item_type(),
            StackItemType::Buffer
        );
        assert_eq!(
            StackItem::from_array(vec![]).stack_item_type(),
            StackItemType::Array
        );
        assert_eq!(
            StackItem::from_struct(vec![]).stack_item_type(),
            StackItemType::Struct
        );
        assert_eq!(StackItem::new_map().stack_item_type(), StackItemType::Map);
        assert_eq!(
            StackItem::from_pointer(3).stack_item_type(),
            StackItemType::Pointer
        );
    }

    #[test]
    fn test_as_bool() {
        assert!(!StackItem::null().as_bool());
        assert!(StackItem::from_bool(true).as_bool());
        assert!(!StackItem::from_int(0).as_bool());
        assert!(StackItem::from_int(-1).as_bool());
        assert!(!StackItem::from_byte_string(vec![0, 0]).as_bool());
        assert!(StackItem::from_byte_string(vec![0, 1]).as_bool());
        assert!(StackItem::from_array(vec![]).as_bool());
    }

    #[test]
    fn test_as_int() {
        assert_eq!(StackItem::from_bool(true).as_int().unwrap(), BigInt::from(1));
        assert_eq!(
            StackItem::from_byte_string(vec![0x01, 0x01]).as_int().unwrap(),
            BigInt::from(257)
        );
        assert_eq!(
            StackItem::from_byte_string(Vec::new()).as_int().unwrap(),
            BigInt::from(0)
        );
        assert!(StackItem::from_array(vec![]).as_int().is_err());
    }

    #[test]
    fn test_map_insertion_order_and_uniqueness() {
        let mut map = Map::new();
        map.insert(StackItem::from_int(2), StackItem::from_int(20)).unwrap();
        map.insert(StackItem::from_int(1), StackItem::from_int(10)).unwrap();
        map.insert(StackItem::from_int(2), StackItem::from_int(22)).unwrap();

        let keys: Vec<BigInt> = map.entries().map(|(k, _)| k.as_int().unwrap()).collect();
        assert_eq!(keys, vec![BigInt::from(2), BigInt::from(1)]);
        assert_eq!(
            map.get(&StackItem::from_int(2)).unwrap().unwrap().as_int().unwrap(),
            BigInt::from(22)
        );
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_map_rejects_composite_keys() {
        let mut map = Map::new();
        let err = map
            .insert(StackItem::from_array(vec![]), StackItem::null())
            .expect_err("composite keys are invalid");
        assert!(matches!(err, Error::InvalidType(_)));
    }

    #[test]
    fn test_struct_value_equality() {
        let a = StackItem::from_struct(vec![StackItem::from_int(1), StackItem::from_bool(true)]);
        let b = StackItem::from_struct(vec![StackItem::from_int(1), StackItem::from_bool(true)]);
        assert_eq!(a, b);
        assert!(!a.same_ref(&b));
    }

    #[test]
    fn test_array_reference_identity() {
        let a = StackItem::from_array(vec![StackItem::from_int(1)]);
        let b = a.clone();
        let c = StackItem::from_array(vec![StackItem::from_int(1)]);
        assert!(a.same_ref(&b));
        assert!(!a.same_ref(&c));
        // Structural equality still holds for distinct references.
        assert_eq!(a, c);
    }

    #[test]
    fn test_cyclic_equality_terminates() {
        let a = StackItem::from_array(vec![]);
        if let StackItem::Array(inner) = &a {
            inner.borrow_mut().push(a.clone());
        }
        let b = StackItem::from_array(vec![]);
        if let StackItem::Array(inner) = &b {
            inner.borrow_mut().push(b.clone());
        }
        // Must not hang or overflow.
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_mutation_visible_through_aliases() {
        let a = StackItem::from_array(vec![]);
        let b = a.clone();
        if let StackItem::Array(inner) = &a {
            inner.borrow_mut().push(StackItem::from_int(7));
        }
        if let StackItem::Array(inner) = &b {
            assert_eq!(inner.borrow().len(), 1);
        }
    }
}
