//! Class-file decoding.
//!
//! Produces the same [`ClassFile`] records the writer consumes. Only the
//! attributes quill understands are decoded; anything else (including
//! `Code`) is skipped without error, so files emitted by newer tools
//! still read cleanly.

use crate::bytes::ByteReader;
use crate::classfile::{
    AnnotationInfo, ClassFile, ConstValue, ElementValue, FieldInfo, InnerClass, MethodInfo,
    TargetInfo, TypeAnnotationInfo, TypePathStep,
};
use crate::error::{Error, Result};
use crate::mutf8::decode_modified_utf8;

/// A decoded constant-pool entry, as far as the reader cares.
#[derive(Clone, Debug)]
enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    Str(u16),
    /// Reference kinds the reader never chases.
    Opaque(&'static str),
}

impl PoolEntry {
    fn describe(&self) -> &'static str {
        match self {
            PoolEntry::Utf8(_) => "Utf8",
            PoolEntry::Integer(_) => "Integer",
            PoolEntry::Float(_) => "Float",
            PoolEntry::Long(_) => "Long",
            PoolEntry::Double(_) => "Double",
            PoolEntry::Class(_) => "Class",
            PoolEntry::Str(_) => "String",
            PoolEntry::Opaque(kind) => kind,
        }
    }
}

struct Pool {
    entries: Vec<Option<PoolEntry>>,
}

impl Pool {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let count = r.u16()? as usize;
        if count == 0 {
            return Err(Error::Malformed("constant_pool_count must be at least 1"));
        }
        let mut entries = vec![None; count];
        let mut index = 1;
        while index < count {
            let tag = r.u8()?;
            let (entry, slots) = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    (PoolEntry::Utf8(decode_modified_utf8(r.take(len)?)?), 1)
                }
                3 => (PoolEntry::Integer(r.i32()?), 1),
                4 => (PoolEntry::Float(f32::from_bits(r.u32()?)), 1),
                5 => (PoolEntry::Long(r.i64()?), 2),
                6 => (PoolEntry::Double(f64::from_bits(r.i64()? as u64)), 2),
                7 => (PoolEntry::Class(r.u16()?), 1),
                8 => (PoolEntry::Str(r.u16()?), 1),
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.take(4)?;
                    (PoolEntry::Opaque("reference"), 1)
                }
                15 => {
                    r.take(3)?;
                    (PoolEntry::Opaque("MethodHandle"), 1)
                }
                16 | 19 | 20 => {
                    r.take(2)?;
                    (PoolEntry::Opaque("indexed"), 1)
                }
                other => return Err(Error::BadPoolTag(other)),
            };
            entries[index] = Some(entry);
            if index + slots > count {
                return Err(Error::Malformed("wide constant at end of pool"));
            }
            index += slots;
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&PoolEntry> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::BadPoolIndex(index))
    }

    fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            PoolEntry::Utf8(text) => Ok(text),
            other => Err(Error::PoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.describe(),
            }),
        }
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            PoolEntry::Class(name) => Ok(self.utf8(*name)?.to_string()),
            other => Err(Error::PoolTypeMismatch {
                index,
                expected: "Class",
                found: other.describe(),
            }),
        }
    }

    fn integer(&self, index: u16) -> Result<i32> {
        match self.get(index)? {
            PoolEntry::Integer(value) => Ok(*value),
            other => Err(Error::PoolTypeMismatch {
                index,
                expected: "Integer",
                found: other.describe(),
            }),
        }
    }
}

pub fn read_class(bytes: &[u8]) -> Result<ClassFile> {
    let mut r = ByteReader::new(bytes);
    let magic = r.u32()?;
    if magic != 0xCAFEBABE {
        return Err(Error::BadMagic(magic));
    }
    let minor_version = r.u16()?;
    let major_version = r.u16()?;
    let pool = Pool::parse(&mut r)?;

    let access = r.u16()?;
    let name = pool.class_name(r.u16()?)?;
    let super_index = r.u16()?;
    let super_name = if super_index == 0 {
        None
    } else {
        Some(pool.class_name(super_index)?)
    };

    let interface_count = r.u16()? as usize;
    let mut interfaces = Vec::with_capacity(interface_count);
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(r.u16()?)?);
    }

    let field_count = r.u16()? as usize;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        fields.push(read_field(&mut r, &pool)?);
    }

    let method_count = r.u16()? as usize;
    let mut methods = Vec::with_capacity(method_count);
    for _ in 0..method_count {
        methods.push(read_method(&mut r, &pool)?);
    }

    let attrs = read_attributes(&mut r, &pool, true)?;
    r.expect_end()?;

    Ok(ClassFile {
        minor_version,
        major_version,
        access,
        name,
        super_name,
        interfaces,
        fields,
        methods,
        signature: attrs.signature,
        inner_classes: attrs.inner_classes,
        annotations: attrs.annotations,
        type_annotations: attrs.type_annotations,
        deprecated: attrs.deprecated,
    })
}

fn read_field(r: &mut ByteReader<'_>, pool: &Pool) -> Result<FieldInfo> {
    let access = r.u16()?;
    let name = pool.utf8(r.u16()?)?.to_string();
    let descriptor = pool.utf8(r.u16()?)?.to_string();
    let attrs = read_attributes(r, pool, false)?;
    Ok(FieldInfo {
        access,
        name,
        descriptor,
        signature: attrs.signature,
        constant_value: attrs.constant_value,
        annotations: attrs.annotations,
        type_annotations: attrs.type_annotations,
        deprecated: attrs.deprecated,
    })
}

fn read_method(r: &mut ByteReader<'_>, pool: &Pool) -> Result<MethodInfo> {
    let access = r.u16()?;
    let name = pool.utf8(r.u16()?)?.to_string();
    let descriptor = pool.utf8(r.u16()?)?.to_string();
    let attrs = read_attributes(r, pool, false)?;
    Ok(MethodInfo {
        access,
        name,
        descriptor,
        signature: attrs.signature,
        exceptions: attrs.exceptions,
        default_value: attrs.default_value,
        annotations: attrs.annotations,
        parameter_annotations: attrs.parameter_annotations,
        type_annotations: attrs.type_annotations,
        code: None,
        deprecated: attrs.deprecated,
    })
}

#[derive(Default)]
struct Attrs {
    signature: Option<String>,
    constant_value: Option<ConstValue>,
    exceptions: Vec<String>,
    inner_classes: Vec<InnerClass>,
    annotations: Vec<AnnotationInfo>,
    parameter_annotations: Vec<Vec<AnnotationInfo>>,
    type_annotations: Vec<TypeAnnotationInfo>,
    default_value: Option<ElementValue>,
    deprecated: bool,
}

fn read_attributes(r: &mut ByteReader<'_>, pool: &Pool, class_level: bool) -> Result<Attrs> {
    let count = r.u16()? as usize;
    let mut attrs = Attrs::default();
    for _ in 0..count {
        let name_index = r.u16()?;
        let length = r.u32()? as usize;
        let payload = r.take(length)?;
        let name = pool.utf8(name_index)?;
        let mut sub = ByteReader::new(payload);
        match name {
            "Signature" => {
                attrs.signature = Some(pool.utf8(sub.u16()?)?.to_string());
                sub.expect_end()?;
            }
            "ConstantValue" => {
                attrs.constant_value = Some(read_constant_value(&mut sub, pool)?);
                sub.expect_end()?;
            }
            "Exceptions" => {
                let n = sub.u16()? as usize;
                for _ in 0..n {
                    attrs.exceptions.push(pool.class_name(sub.u16()?)?);
                }
                sub.expect_end()?;
            }
            "Deprecated" => {
                attrs.deprecated = true;
            }
            "AnnotationDefault" => {
                attrs.default_value = Some(read_element_value(&mut sub, pool)?);
                sub.expect_end()?;
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let visible = name == "RuntimeVisibleAnnotations";
                let n = sub.u16()? as usize;
                for _ in 0..n {
                    attrs.annotations.push(read_annotation(&mut sub, pool, visible)?);
                }
                sub.expect_end()?;
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                let visible = name == "RuntimeVisibleTypeAnnotations";
                let n = sub.u16()? as usize;
                for _ in 0..n {
                    match read_type_annotation(&mut sub, pool, visible)? {
                        Some(type_annotation) => attrs.type_annotations.push(type_annotation),
                        // An unrecognized target kind makes the rest of
                        // the attribute unframeable; leave it undecoded.
                        None => break,
                    }
                }
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let visible = name == "RuntimeVisibleParameterAnnotations";
                let n = sub.u8()? as usize;
                if attrs.parameter_annotations.len() < n {
                    attrs.parameter_annotations.resize(n, Vec::new());
                }
                for param in attrs.parameter_annotations.iter_mut().take(n) {
                    let m = sub.u16()? as usize;
                    for _ in 0..m {
                        param.push(read_annotation(&mut sub, pool, visible)?);
                    }
                }
                sub.expect_end()?;
            }
            "InnerClasses" if class_level => {
                let n = sub.u16()? as usize;
                for _ in 0..n {
                    let inner = pool.class_name(sub.u16()?)?;
                    let outer_index = sub.u16()?;
                    let outer = if outer_index == 0 {
                        None
                    } else {
                        Some(pool.class_name(outer_index)?)
                    };
                    let name_index = sub.u16()?;
                    let simple = if name_index == 0 {
                        None
                    } else {
                        Some(pool.utf8(name_index)?.to_string())
                    };
                    let access = sub.u16()?;
                    attrs.inner_classes.push(InnerClass {
                        inner,
                        outer,
                        name: simple,
                        access,
                    });
                }
                sub.expect_end()?;
            }
            // Unknown attributes (and Code) are skipped for forward
            // compatibility.
            _ => {}
        }
    }
    Ok(attrs)
}

fn read_constant_value(r: &mut ByteReader<'_>, pool: &Pool) -> Result<ConstValue> {
    let index = r.u16()?;
    Ok(match pool.get(index)? {
        PoolEntry::Integer(v) => ConstValue::Int(*v),
        PoolEntry::Long(v) => ConstValue::Long(*v),
        PoolEntry::Float(v) => ConstValue::Float(*v),
        PoolEntry::Double(v) => ConstValue::Double(*v),
        PoolEntry::Str(utf8) => ConstValue::Str(pool.utf8(*utf8)?.to_string()),
        other => {
            return Err(Error::PoolTypeMismatch {
                index,
                expected: "loadable constant",
                found: other.describe(),
            })
        }
    })
}

/// Decodes one type annotation, or `None` for a target kind quill does
/// not emit (local-variable and expression targets, receiver types).
fn read_type_annotation(
    r: &mut ByteReader<'_>,
    pool: &Pool,
    visible: bool,
) -> Result<Option<TypeAnnotationInfo>> {
    let target = match r.u8()? {
        0x00 => TargetInfo::ClassTypeParameter(r.u8()?),
        0x01 => TargetInfo::MethodTypeParameter(r.u8()?),
        0x10 => TargetInfo::Supertype(r.u16()?),
        0x11 => TargetInfo::ClassTypeParameterBound {
            param: r.u8()?,
            bound: r.u8()?,
        },
        0x12 => TargetInfo::MethodTypeParameterBound {
            param: r.u8()?,
            bound: r.u8()?,
        },
        0x13 => TargetInfo::Field,
        0x14 => TargetInfo::MethodReturn,
        0x16 => TargetInfo::FormalParameter(r.u8()?),
        0x17 => TargetInfo::Throws(r.u16()?),
        _ => return Ok(None),
    };
    let path_len = r.u8()? as usize;
    let mut path = Vec::with_capacity(path_len);
    for _ in 0..path_len {
        path.push(TypePathStep {
            kind: r.u8()?,
            index: r.u8()?,
        });
    }
    let anno = read_annotation(r, pool, visible)?;
    Ok(Some(TypeAnnotationInfo { target, path, anno }))
}

fn read_annotation(r: &mut ByteReader<'_>, pool: &Pool, visible: bool) -> Result<AnnotationInfo> {
    let type_descriptor = pool.utf8(r.u16()?)?.to_string();
    let pair_count = r.u16()? as usize;
    let mut values = Vec::with_capacity(pair_count);
    for _ in 0..pair_count {
        let name = pool.utf8(r.u16()?)?.to_string();
        let value = read_element_value(r, pool)?;
        values.push((name, value));
    }
    Ok(AnnotationInfo {
        type_descriptor,
        runtime_visible: visible,
        values,
    })
}

fn read_element_value(r: &mut ByteReader<'_>, pool: &Pool) -> Result<ElementValue> {
    let tag = r.u8()?;
    Ok(match tag {
        b'B' => ElementValue::Const(ConstValue::Byte(pool.integer(r.u16()?)? as i8)),
        b'C' => ElementValue::Const(ConstValue::Char(pool.integer(r.u16()?)? as u16)),
        b'S' => ElementValue::Const(ConstValue::Short(pool.integer(r.u16()?)? as i16)),
        b'Z' => ElementValue::Const(ConstValue::Boolean(pool.integer(r.u16()?)? != 0)),
        b'I' => ElementValue::Const(ConstValue::Int(pool.integer(r.u16()?)?)),
        b'J' => {
            let index = r.u16()?;
            match pool.get(index)? {
                PoolEntry::Long(v) => ElementValue::Const(ConstValue::Long(*v)),
                other => {
                    return Err(Error::PoolTypeMismatch {
                        index,
                        expected: "Long",
                        found: other.describe(),
                    })
                }
            }
        }
        b'F' => {
            let index = r.u16()?;
            match pool.get(index)? {
                PoolEntry::Float(v) => ElementValue::Const(ConstValue::Float(*v)),
                other => {
                    return Err(Error::PoolTypeMismatch {
                        index,
                        expected: "Float",
                        found: other.describe(),
                    })
                }
            }
        }
        b'D' => {
            let index = r.u16()?;
            match pool.get(index)? {
                PoolEntry::Double(v) => ElementValue::Const(ConstValue::Double(*v)),
                other => {
                    return Err(Error::PoolTypeMismatch {
                        index,
                        expected: "Double",
                        found: other.describe(),
                    })
                }
            }
        }
        b's' => {
            let index = r.u16()?;
            let text = match pool.get(index)? {
                PoolEntry::Utf8(text) => text.clone(),
                // Tolerate producers that emit CONSTANT_String here.
                PoolEntry::Str(utf8) => pool.utf8(*utf8)?.to_string(),
                other => {
                    return Err(Error::PoolTypeMismatch {
                        index,
                        expected: "Utf8",
                        found: other.describe(),
                    })
                }
            };
            ElementValue::Const(ConstValue::Str(text))
        }
        b'e' => ElementValue::Enum {
            type_descriptor: pool.utf8(r.u16()?)?.to_string(),
            name: pool.utf8(r.u16()?)?.to_string(),
        },
        b'c' => ElementValue::Class {
            descriptor: pool.utf8(r.u16()?)?.to_string(),
        },
        b'@' => ElementValue::Anno(Box::new(read_annotation(r, pool, true)?)),
        b'[' => {
            let n = r.u16()? as usize;
            let mut values = Vec::with_capacity(n);
            for _ in 0..n {
                values.push(read_element_value(r, pool)?);
            }
            ElementValue::Array(values)
        }
        _ => return Err(Error::MalformedAttribute("element_value")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{CodeInfo, TargetInfo, TypeAnnotationInfo, TypePathStep};
    use crate::writer::write_class;
    use pretty_assertions::assert_eq;

    fn sample_class() -> ClassFile {
        ClassFile {
            minor_version: 0,
            major_version: 52,
            access: 0x0021,
            name: "p/Sample".to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec!["java/io/Serializable".to_string()],
            fields: vec![FieldInfo {
                access: 0x0019,
                name: "N".to_string(),
                descriptor: "I".to_string(),
                signature: None,
                constant_value: Some(ConstValue::Int(7)),
                annotations: vec![AnnotationInfo {
                    type_descriptor: "Lp/Mark;".to_string(),
                    runtime_visible: true,
                    values: vec![(
                        "value".to_string(),
                        ElementValue::Array(vec![
                            ElementValue::Const(ConstValue::Str("a".to_string())),
                            ElementValue::Const(ConstValue::Str("b".to_string())),
                        ]),
                    )],
                }],
                type_annotations: Vec::new(),
                deprecated: false,
            }],
            methods: vec![MethodInfo {
                access: 0x0001,
                name: "<init>".to_string(),
                descriptor: "()V".to_string(),
                signature: None,
                exceptions: vec!["java/io/IOException".to_string()],
                default_value: None,
                annotations: Vec::new(),
                parameter_annotations: Vec::new(),
                type_annotations: vec![TypeAnnotationInfo {
                    target: TargetInfo::MethodReturn,
                    path: vec![TypePathStep { kind: 0, index: 0 }],
                    anno: AnnotationInfo {
                        type_descriptor: "Lp/Mark;".to_string(),
                        runtime_visible: false,
                        values: Vec::new(),
                    },
                }],
                code: Some(CodeInfo { max_locals: 1 }),
                deprecated: false,
            }],
            signature: Some("<T:Ljava/lang/Object;>Ljava/lang/Object;".to_string()),
            inner_classes: vec![InnerClass {
                inner: "p/Sample$In".to_string(),
                outer: Some("p/Sample".to_string()),
                name: Some("In".to_string()),
                access: 0x0008,
            }],
            annotations: Vec::new(),
            type_annotations: Vec::new(),
            deprecated: true,
        }
    }

    #[test]
    fn written_classes_read_back() {
        let cf = sample_class();
        let bytes = write_class(&cf);
        let read = read_class(&bytes).unwrap();

        assert_eq!(read.access, cf.access);
        assert_eq!(read.name, cf.name);
        assert_eq!(read.super_name, cf.super_name);
        assert_eq!(read.interfaces, cf.interfaces);
        assert_eq!(read.signature, cf.signature);
        assert_eq!(read.inner_classes, cf.inner_classes);
        assert_eq!(read.deprecated, cf.deprecated);

        assert_eq!(read.fields.len(), 1);
        assert_eq!(read.fields[0].constant_value, Some(ConstValue::Int(7)));
        assert_eq!(read.fields[0].annotations, cf.fields[0].annotations);

        assert_eq!(read.methods.len(), 1);
        assert_eq!(read.methods[0].exceptions, cf.methods[0].exceptions);
        assert_eq!(
            read.methods[0].type_annotations,
            cf.methods[0].type_annotations
        );
        // Code is not decoded.
        assert_eq!(read.methods[0].code, None);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            read_class(&[0, 0, 0, 0]),
            Err(Error::BadMagic(0))
        ));
    }

    #[test]
    fn unknown_attributes_are_skipped() {
        let cf = ClassFile {
            minor_version: 0,
            major_version: 52,
            access: 0x0021,
            name: "p/Sample".to_string(),
            super_name: Some("java/lang/Object".to_string()),
            ..ClassFile::default()
        };
        let mut bytes = write_class(&cf);
        // Replace the empty class-attribute table with one attribute whose
        // name reuses the utf8 entry for "p/Sample" (pool index 1): an
        // attribute name no tool knows.
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
        bytes.truncate(bytes.len() - 2);
        bytes.extend_from_slice(&[0, 1]); // attributes_count
        bytes.extend_from_slice(&[0, 1]); // attribute_name_index
        bytes.extend_from_slice(&[0, 0, 0, 3]); // attribute_length
        bytes.extend_from_slice(&[0xDE, 0xAD, 0x00]);

        let read = read_class(&bytes).unwrap();
        assert_eq!(read.name, "p/Sample");
        assert_eq!(read.annotations, Vec::new());
    }
}
