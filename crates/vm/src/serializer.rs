//! Canonical binary serialization for stack items.
//!
//! The encoding is depth-first and type-tag-prefixed: every node writes one
//! tag byte followed by a type-specific payload. The format is shared by
//! the evaluation stack and persisted contract storage, so both directions
//! are bounded: total emitted bytes against [`ExecutionLimits::max_item_size`]
//! and decoded node count against [`ExecutionLimits::max_deserialized_items`].

use crate::error::{Error, Result};
use crate::limits::ExecutionLimits;
use crate::stack_item::{int_to_bytes, InteropInterface, Map, StackItem};
use crate::stack_item_type::StackItemType;
use num_bigint::BigInt;
use std::any::Any;

/// Canonical serializer for [`StackItem`] values.
pub struct BinarySerializer;

/// Placeholder restored in place of an interop handle by the protected
/// decoder. Diagnostic use only; carries no state.
#[derive(Debug)]
pub struct OpaqueInterop;

impl InteropInterface for OpaqueInterop {
    fn interface_type(&self) -> &str {
        "Opaque"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BinarySerializer {
    /// Serializes a stack item into its canonical byte encoding.
    pub fn serialize(item: &StackItem, limits: &ExecutionLimits) -> Result<Vec<u8>> {
        let mut writer = LimitedWriter::new(limits.max_item_size);
        let mut visited = Vec::new();
        Self::encode(item, &mut writer, &mut visited, limits, false)?;
        Ok(writer.into_bytes())
    }

    /// Serializes a stack item, substituting placeholders for interop
    /// handles and pointers instead of failing.
    ///
    /// Intended for diagnostic snapshots only, never for consensus state.
    pub fn serialize_protected(item: &StackItem, limits: &ExecutionLimits) -> Result<Vec<u8>> {
        let mut writer = LimitedWriter::new(limits.max_item_size);
        let mut visited = Vec::new();
        Self::encode(item, &mut writer, &mut visited, limits, true)?;
        Ok(writer.into_bytes())
    }

    /// Deserializes a stack item from its canonical byte encoding.
    pub fn deserialize(data: &[u8], limits: &ExecutionLimits) -> Result<StackItem> {
        let mut reader = Reader::new(data);
        let mut remaining = limits.max_deserialized_items;
        Self::decode(&mut reader, &mut remaining, limits, false)
    }

    /// Deserializes a stack item produced by [`Self::serialize_protected`].
    pub fn deserialize_protected(data: &[u8], limits: &ExecutionLimits) -> Result<StackItem> {
        let mut reader = Reader::new(data);
        let mut remaining = limits.max_deserialized_items;
        Self::decode(&mut reader, &mut remaining, limits, true)
    }

    fn encode(
        item: &StackItem,
        writer: &mut LimitedWriter,
        visited: &mut Vec<usize>,
        limits: &ExecutionLimits,
        protected: bool,
    ) -> Result<()> {
        match item {
            StackItem::Null => writer.write_byte(StackItemType::Any.to_byte()),
            StackItem::Boolean(b) => {
                writer.write_byte(StackItemType::Boolean.to_byte())?;
                writer.write_byte(u8::from(*b))
            }
            StackItem::Integer(i) => {
                let bytes = int_to_bytes(i);
                if bytes.len() > limits.max_integer_size {
                    return Err(Error::SizeLimitExceeded(format!(
                        "integer takes {} bytes, limit is {}",
                        bytes.len(),
                        limits.max_integer_size
                    )));
                }
                writer.write_byte(StackItemType::Integer.to_byte())?;
                writer.write_var_bytes(&bytes)
            }
            StackItem::ByteString(b) => {
                writer.write_byte(StackItemType::ByteString.to_byte())?;
                writer.write_var_bytes(b)
            }
            StackItem::Buffer(b) => {
                writer.write_byte(StackItemType::Buffer.to_byte())?;
                writer.write_var_bytes(&b.borrow())
            }
            StackItem::Array(_) | StackItem::Struct(_) => {
                let id = item.composite_id().unwrap_or_default();
                if visited.contains(&id) {
                    return Err(Error::RecursiveStructure(
                        "array reached itself during serialization".to_string(),
                    ));
                }
                visited.push(id);
                writer.write_byte(item.stack_item_type().to_byte())?;
                let elements = match item {
                    StackItem::Array(a) | StackItem::Struct(a) => a.borrow(),
                    _ => unreachable!(),
                };
                writer.write_var_int(elements.len() as u64)?;
                for element in elements.iter() {
                    Self::encode(element, writer, visited, limits, protected)?;
                }
                drop(elements);
                visited.pop();
                Ok(())
            }
            StackItem::Map(m) => {
                let id = item.composite_id().unwrap_or_default();
                if visited.contains(&id) {
                    return Err(Error::RecursiveStructure(
                        "map reached itself during serialization".to_string(),
                    ));
                }
                visited.push(id);
                writer.write_byte(StackItemType::Map.to_byte())?;
                let map = m.borrow();
                writer.write_var_int(map.len() as u64)?;
                for (key, value) in map.entries() {
                    Self::encode(key, writer, visited, limits, protected)?;
                    Self::encode(value, writer, visited, limits, protected)?;
                }
                drop(map);
                visited.pop();
                Ok(())
            }
            StackItem::Pointer(p) => {
                if !protected {
                    return Err(Error::Unserializable("pointer".to_string()));
                }
                writer.write_byte(StackItemType::Pointer.to_byte())?;
                writer.write_var_int(*p as u64)
            }
            StackItem::InteropInterface(handle) => {
                if !protected {
                    return Err(Error::Unserializable(format!(
                        "interop interface {}",
                        handle.interface_type()
                    )));
                }
                writer.write_byte(StackItemType::InteropInterface.to_byte())
            }
        }
    }

    fn decode(
        reader: &mut Reader<'_>,
        remaining: &mut usize,
        limits: &ExecutionLimits,
        protected: bool,
    ) -> Result<StackItem> {
        if *remaining == 0 {
            return Err(Error::SizeLimitExceeded(format!(
                "more than {} items in encoding",
                limits.max_deserialized_items
            )));
        }
        *remaining -= 1;

        let tag = reader.read_byte()?;
        let item_type = StackItemType::from_byte(tag)
            .ok_or_else(|| Error::InvalidType(format!("unknown type tag 0x{:02x}", tag)))?;
        match item_type {
            StackItemType::Any => Ok(StackItem::Null),
            StackItemType::Boolean => Ok(StackItem::from_bool(reader.read_byte()? != 0)),
            StackItemType::Integer => {
                let bytes = reader.read_var_bytes(limits.max_integer_size)?;
                Ok(StackItem::Integer(BigInt::from_signed_bytes_le(&bytes)))
            }
            StackItemType::ByteString => {
                let bytes = reader.read_var_bytes(limits.max_item_size)?;
                Ok(StackItem::ByteString(bytes))
            }
            StackItemType::Buffer => {
                let bytes = reader.read_var_bytes(limits.max_item_size)?;
                Ok(StackItem::from_buffer(bytes))
            }
            StackItemType::Array | StackItemType::Struct => {
                let count = reader.read_var_int(limits.max_deserialized_items as u64)? as usize;
                let mut elements = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    elements.push(Self::decode(reader, remaining, limits, protected)?);
                }
                Ok(if item_type == StackItemType::Array {
                    StackItem::from_array(elements)
                } else {
                    StackItem::from_struct(elements)
                })
            }
            StackItemType::Map => {
                let count = reader.read_var_int(limits.max_deserialized_items as u64 / 2)? as usize;
                let mut map = Map::new();
                for _ in 0..count {
                    let key = Self::decode(reader, remaining, limits, protected)?;
                    let value = Self::decode(reader, remaining, limits, protected)?;
                    map.insert(key, value)?;
                }
                Ok(StackItem::from_map(map))
            }
            StackItemType::Pointer => {
                if !protected {
                    return Err(Error::InvalidType("pointer is not deserializable".to_string()));
                }
                let position = reader.read_var_int(u64::MAX)? as usize;
                Ok(StackItem::from_pointer(position))
            }
            StackItemType::InteropInterface => {
                if !protected {
                    return Err(Error::InvalidType(
                        "interop interface is not deserializable".to_string(),
                    ));
                }
                Ok(StackItem::from_interface(OpaqueInterop))
            }
        }
    }
}

/// Byte sink that fails the moment the configured ceiling is crossed, so
/// a partially written child can never survive as truncated output.
struct LimitedWriter {
    buf: Vec<u8>,
    cap: usize,
}

impl LimitedWriter {
    fn new(cap: usize) -> Self {
        Self { buf: Vec::new(), cap }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buf.len() + bytes.len() > self.cap {
            return Err(Error::SizeLimitExceeded(format!(
                "serialized item exceeds {} bytes",
                self.cap
            )));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_var_int(&mut self, value: u64) -> Result<()> {
        if value < 0xFD {
            self.write_byte(value as u8)
        } else if value <= 0xFFFF {
            self.write_byte(0xFD)?;
            self.write_all(&(value as u16).to_le_bytes())
        } else if value <= 0xFFFF_FFFF {
            self.write_byte(0xFE)?;
            self.write_all(&(value as u32).to_le_bytes())
        } else {
            self.write_byte(0xFF)?;
            self.write_all(&value.to_le_bytes())
        }
    }

    fn write_var_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_var_int(bytes.len() as u64)?;
        self.write_all(bytes)
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let bytes = self.read_exact(1)?;
        Ok(bytes[0])
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(Error::Malformed("unexpected end of input".to_string()));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_var_int(&mut self, max: u64) -> Result<u64> {
        let first = self.read_byte()?;
        let value = match first {
            0xFD => u16::from_le_bytes(self.read_exact(2)?.try_into().expect("2 bytes")) as u64,
            0xFE => u32::from_le_bytes(self.read_exact(4)?.try_into().expect("4 bytes")) as u64,
            0xFF => u64::from_le_bytes(self.read_exact(8)?.try_into().expect("8 bytes")),
            b => b as u64,
        };
        if value > max {
            return Err(Error::SizeLimitExceeded(format!(
                "length {} exceeds limit {}",
                value, max
            )));
        }
        Ok(value)
    }

    fn read_var_bytes(&mut self, max: usize) -> Result<Vec<u8>> {
        let len = self.read_var_int(max as u64)? as usize;
        Ok(self.read_exact(len)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ExecutionLimits {
        ExecutionLimits::default()
    }

    #[test]
    fn test_primitive_encodings() {
        let bytes =
            BinarySerializer::serialize(&StackItem::from_byte_string(vec![0u8; 5]), &limits())
                .unwrap();
        assert_eq!(bytes, vec![0x28, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let bytes = BinarySerializer::serialize(&StackItem::from_bool(true), &limits()).unwrap();
        assert_eq!(bytes, vec![0x20, 0x01]);

        let bytes = BinarySerializer::serialize(&StackItem::from_int(1), &limits()).unwrap();
        assert_eq!(bytes, vec![0x21, 0x01, 0x01]);

        let bytes = BinarySerializer::serialize(&StackItem::from_int(0), &limits()).unwrap();
        assert_eq!(bytes, vec![0x21, 0x00]);

        let bytes = BinarySerializer::serialize(&StackItem::null(), &limits()).unwrap();
        assert_eq!(bytes, vec![0x00]);
    }

    #[test]
    fn test_container_encodings() {
        let array = StackItem::from_array(vec![StackItem::from_int(1)]);
        let bytes = BinarySerializer::serialize(&array, &limits()).unwrap();
        assert_eq!(bytes, vec![0x40, 0x01, 0x21, 0x01, 0x01]);

        let strukt = StackItem::from_struct(vec![StackItem::from_int(1)]);
        let bytes = BinarySerializer::serialize(&strukt, &limits()).unwrap();
        assert_eq!(bytes, vec![0x41, 0x01, 0x21, 0x01, 0x01]);

        let mut map = Map::new();
        map.insert(StackItem::from_int(2), StackItem::from_int(1)).unwrap();
        let bytes = BinarySerializer::serialize(&StackItem::from_map(map), &limits()).unwrap();
        assert_eq!(bytes, vec![0x48, 0x01, 0x21, 0x01, 0x02, 0x21, 0x01, 0x01]);
    }

    #[test]
    fn test_round_trip() {
        let mut map = Map::new();
        map.insert(StackItem::from_int(2), StackItem::from_int(1)).unwrap();
        let items = vec![
            StackItem::null(),
            StackItem::from_bool(false),
            StackItem::from_int(0xF),
            StackItem::from_int(0xFAB),
            StackItem::from_int(0xFABCDi64),
            StackItem::from_int(0xFABCDEFEDCi64),
            StackItem::from_int(-1),
            StackItem::from_byte_string(vec![1, 2, 3]),
            StackItem::from_buffer(vec![4, 5, 6]),
            StackItem::from_array(vec![StackItem::from_int(1), StackItem::null()]),
            StackItem::from_struct(vec![StackItem::from_byte_string(b"x".to_vec())]),
            StackItem::from_map(map),
        ];
        for item in items {
            let bytes = BinarySerializer::serialize(&item, &limits()).unwrap();
            let restored = BinarySerializer::deserialize(&bytes, &limits()).unwrap();
            assert_eq!(item, restored);
            // Struct and Array share a wire shape; the tag keeps them apart.
            assert_eq!(item.stack_item_type(), restored.stack_item_type());
        }
    }

    #[test]
    fn test_unserializable_items() {
        let err = BinarySerializer::serialize(&StackItem::from_interface(OpaqueInterop), &limits())
            .expect_err("interop items have no canonical encoding");
        assert!(matches!(err, Error::Unserializable(_)));

        let err = BinarySerializer::serialize(&StackItem::from_pointer(0), &limits())
            .expect_err("pointers have no canonical encoding");
        assert!(matches!(err, Error::Unserializable(_)));

        // Unserializable items fail even when nested under valid parents.
        let nested = StackItem::from_array(vec![StackItem::from_pointer(1)]);
        assert!(matches!(
            BinarySerializer::serialize(&nested, &limits()),
            Err(Error::Unserializable(_))
        ));
    }

    #[test]
    fn test_protected_mode() {
        let item = StackItem::from_array(vec![
            StackItem::from_int(1),
            StackItem::from_interface(OpaqueInterop),
            StackItem::from_pointer(42),
        ]);
        let bytes = BinarySerializer::serialize_protected(&item, &limits()).unwrap();

        let err = BinarySerializer::deserialize(&bytes, &limits())
            .expect_err("plain decode rejects protected payloads");
        assert!(matches!(err, Error::InvalidType(_)));

        let restored = BinarySerializer::deserialize_protected(&bytes, &limits()).unwrap();
        if let StackItem::Array(elements) = &restored {
            let elements = elements.borrow();
            assert_eq!(elements.len(), 3);
            assert!(matches!(elements[1], StackItem::InteropInterface(_)));
            assert!(matches!(elements[2], StackItem::Pointer(42)));
        } else {
            panic!("expected array, got {:?}", restored);
        }
    }

    #[test]
    fn test_size_ceiling_mid_child() {
        let custom = ExecutionLimits::default();
        let half = custom.max_item_size / 2;
        let big = StackItem::from_byte_string(vec![0u8; half]);

        // One big child fits.
        let single = StackItem::from_array(vec![big.clone()]);
        assert!(BinarySerializer::serialize(&single, &custom).is_ok());

        // The second child crosses the ceiling after most output is written.
        let double = StackItem::from_array(vec![big.clone(), big]);
        let err = BinarySerializer::serialize(&double, &custom).expect_err("must cross ceiling");
        assert!(matches!(err, Error::SizeLimitExceeded(_)));
    }

    #[test]
    fn test_recursive_array_fails() {
        let array = StackItem::from_array(vec![]);
        if let StackItem::Array(inner) = &array {
            inner.borrow_mut().push(array.clone());
        }
        let err = BinarySerializer::serialize(&array, &limits()).expect_err("self-reference");
        assert!(matches!(err, Error::RecursiveStructure(_)));
    }

    #[test]
    fn test_recursive_via_nested_array_fails() {
        let outer = StackItem::from_array(vec![]);
        let inner = StackItem::from_array(vec![outer.clone()]);
        if let StackItem::Array(elements) = &outer {
            elements.borrow_mut().push(inner);
        }
        let err = BinarySerializer::serialize(&outer, &limits()).expect_err("indirect cycle");
        assert!(matches!(err, Error::RecursiveStructure(_)));
    }

    #[test]
    fn test_recursive_map_fails() {
        let map_item = StackItem::new_map();
        if let StackItem::Map(inner) = &map_item {
            inner
                .borrow_mut()
                .insert(StackItem::from_int(1), map_item.clone())
                .unwrap();
        }
        let err = BinarySerializer::serialize(&map_item, &limits()).expect_err("map cycle");
        assert!(matches!(err, Error::RecursiveStructure(_)));
    }

    #[test]
    fn test_shared_sibling_is_not_recursive() {
        let shared = StackItem::from_array(vec![StackItem::from_int(7)]);
        let parent = StackItem::from_array(vec![shared.clone(), shared]);
        let bytes = BinarySerializer::serialize(&parent, &limits()).unwrap();
        let restored = BinarySerializer::deserialize(&bytes, &limits()).unwrap();
        assert_eq!(parent, restored);
    }

    #[test]
    fn test_decode_element_count_ceiling() {
        let custom = ExecutionLimits {
            max_deserialized_items: 8,
            ..ExecutionLimits::default()
        };

        // Depth within the limit decodes fine: 8 nodes total.
        let mut item = StackItem::from_int(0);
        for _ in 0..7 {
            item = StackItem::from_array(vec![item]);
        }
        let bytes = BinarySerializer::serialize(&item, &custom).unwrap();
        assert!(BinarySerializer::deserialize(&bytes, &custom).is_ok());

        // One more node crosses the ceiling regardless of byte size.
        let item = StackItem::from_array(vec![item]);
        let bytes = BinarySerializer::serialize(&item, &custom).unwrap();
        let err = BinarySerializer::deserialize(&bytes, &custom).expect_err("count ceiling");
        assert!(matches!(err, Error::SizeLimitExceeded(_)));
    }

    #[test]
    fn test_decode_malformed_input() {
        assert!(matches!(
            BinarySerializer::deserialize(&[], &limits()),
            Err(Error::Malformed(_))
        ));

        let mut bytes = BinarySerializer::serialize(&StackItem::from_int(1), &limits()).unwrap();
        bytes[0] = 0xEE;
        assert!(matches!(
            BinarySerializer::deserialize(&bytes, &limits()),
            Err(Error::InvalidType(_))
        ));

        // Truncated payload.
        let bytes = vec![0x28, 0x05, 0x00];
        assert!(matches!(
            BinarySerializer::deserialize(&bytes, &limits()),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_integer_width_ceiling() {
        let wide = BigInt::from(1) << 300;
        let err = BinarySerializer::serialize(&StackItem::Integer(wide), &limits())
            .expect_err("too-wide integer");
        assert!(matches!(err, Error::SizeLimitExceeded(_)));
    }
}
