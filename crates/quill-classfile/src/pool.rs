//! The write-side constant pool.
//!
//! A deduplicating, insertion-ordered table. Indices are handed out as
//! entries are first requested; `long` and `double` occupy two slots as
//! the format requires. Interning is keyed by value, so identical
//! requests always return the same index and repeated runs produce
//! identical pools.

use crate::mutf8::encode_modified_utf8;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Entry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    Str(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
}

impl Entry {
    fn tag(&self) -> u8 {
        match self {
            Entry::Utf8(_) => 1,
            Entry::Integer(_) => 3,
            Entry::Float(_) => 4,
            Entry::Long(_) => 5,
            Entry::Double(_) => 6,
            Entry::Class(_) => 7,
            Entry::Str(_) => 8,
            Entry::FieldRef(..) => 9,
            Entry::MethodRef(..) => 10,
            Entry::InterfaceMethodRef(..) => 11,
            Entry::NameAndType(..) => 12,
        }
    }

    fn slots(&self) -> u16 {
        match self {
            Entry::Long(_) | Entry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Interning key; floats are keyed by their bit patterns so `-0.0` and
/// `0.0` (and distinct NaNs) stay distinct entries.
#[derive(Clone, PartialEq, Eq, Hash)]
enum Key {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    Str(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
}

#[derive(Default)]
pub struct ConstantPool {
    entries: Vec<Entry>,
    indices: HashMap<Key, u16>,
    next: u16,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            indices: HashMap::new(),
            next: 1,
        }
    }

    fn intern(&mut self, key: Key, entry: Entry) -> u16 {
        if let Some(&index) = self.indices.get(&key) {
            return index;
        }
        let index = self.next;
        self.next += entry.slots();
        self.entries.push(entry);
        self.indices.insert(key, index);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        self.intern(Key::Utf8(text.to_string()), Entry::Utf8(text.to_string()))
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.intern(Key::Integer(value), Entry::Integer(value))
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.intern(Key::Float(value.to_bits()), Entry::Float(value))
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.intern(Key::Long(value), Entry::Long(value))
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.intern(Key::Double(value.to_bits()), Entry::Double(value))
    }

    pub fn class_info(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.intern(Key::Class(name), Entry::Class(name))
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        self.intern(Key::Str(utf8), Entry::Str(utf8))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.intern(
            Key::NameAndType(name, descriptor),
            Entry::NameAndType(name, descriptor),
        )
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class_info(class);
        let nat = self.name_and_type(name, descriptor);
        self.intern(Key::FieldRef(class, nat), Entry::FieldRef(class, nat))
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class_info(class);
        let nat = self.name_and_type(name, descriptor);
        self.intern(Key::MethodRef(class, nat), Entry::MethodRef(class, nat))
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class_info(class);
        let nat = self.name_and_type(name, descriptor);
        self.intern(
            Key::InterfaceMethodRef(class, nat),
            Entry::InterfaceMethodRef(class, nat),
        )
    }

    /// The `constant_pool_count` value: one past the last occupied slot.
    pub fn count(&self) -> u16 {
        self.next
    }

    /// Serialize the table, tag by tag.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count().to_be_bytes());
        for entry in &self.entries {
            out.push(entry.tag());
            match entry {
                Entry::Utf8(text) => {
                    let encoded = encode_modified_utf8(text);
                    out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                    out.extend_from_slice(&encoded);
                }
                Entry::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
                Entry::Float(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
                Entry::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
                Entry::Double(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
                Entry::Class(i) | Entry::Str(i) => out.extend_from_slice(&i.to_be_bytes()),
                Entry::NameAndType(a, b)
                | Entry::FieldRef(a, b)
                | Entry::MethodRef(a, b)
                | Entry::InterfaceMethodRef(a, b) => {
                    out.extend_from_slice(&a.to_be_bytes());
                    out.extend_from_slice(&b.to_be_bytes());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entries_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.utf8("x");
        let b = pool.utf8("x");
        assert_eq!(a, b);
        assert_eq!(a, 1);
        let c = pool.class_info("x");
        assert_eq!(c, 2);
        assert_eq!(pool.class_info("x"), 2);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.long(7), 1);
        assert_eq!(pool.integer(7), 3);
        assert_eq!(pool.double(1.0), 4);
        assert_eq!(pool.utf8("next"), 6);
        assert_eq!(pool.count(), 7);
    }

    #[test]
    fn float_dedup_is_bitwise() {
        let mut pool = ConstantPool::new();
        let pos = pool.float(0.0);
        let neg = pool.float(-0.0);
        assert_ne!(pos, neg);
        assert_eq!(pool.float(0.0), pos);
    }

    #[test]
    fn method_ref_interns_transitively() {
        let mut pool = ConstantPool::new();
        let m = pool.method_ref("java/lang/AssertionError", "<init>", "()V");
        // utf8 x3 + class + name-and-type + ref
        assert_eq!(pool.count(), 7);
        assert_eq!(
            pool.method_ref("java/lang/AssertionError", "<init>", "()V"),
            m
        );
        assert_eq!(pool.count(), 7);
    }
}
