//! Class-file serialization.
//!
//! The pool must precede everything that references it, but attribute
//! bodies discover pool entries as they serialize. So the writer runs in
//! two passes: class structure and attributes are emitted into a scratch
//! buffer while the pool grows, and the final stream is assembled as
//! magic, version, pool, scratch.

use crate::classfile::{
    AnnotationInfo, ClassFile, ConstValue, ElementValue, FieldInfo, MethodInfo, TargetInfo,
    TypeAnnotationInfo,
};
use crate::pool::ConstantPool;

const MAGIC: u32 = 0xCAFEBABE;

/// Bytecode for `throw new AssertionError()`:
/// `new`, `dup`, `invokespecial <init>`, `athrow`.
const OP_NEW: u8 = 0xBB;
const OP_DUP: u8 = 0x59;
const OP_INVOKESPECIAL: u8 = 0xB7;
const OP_ATHROW: u8 = 0xBF;

pub fn write_class(cf: &ClassFile) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let mut body = Vec::new();

    u2(&mut body, cf.access);
    let this_class = pool.class_info(&cf.name);
    u2(&mut body, this_class);
    let super_class = match &cf.super_name {
        Some(name) => pool.class_info(name),
        None => 0,
    };
    u2(&mut body, super_class);

    u2(&mut body, cf.interfaces.len() as u16);
    for interface in &cf.interfaces {
        let index = pool.class_info(interface);
        u2(&mut body, index);
    }

    u2(&mut body, cf.fields.len() as u16);
    for field in &cf.fields {
        write_field(&mut pool, &mut body, field);
    }

    u2(&mut body, cf.methods.len() as u16);
    for method in &cf.methods {
        write_method(&mut pool, &mut body, method);
    }

    let attributes = class_attributes(&mut pool, cf);
    write_attributes(&mut pool, &mut body, attributes);

    let mut out = Vec::with_capacity(body.len() + 512);
    out.extend_from_slice(&MAGIC.to_be_bytes());
    u2(&mut out, cf.minor_version);
    u2(&mut out, cf.major_version);
    pool.write_to(&mut out);
    out.extend_from_slice(&body);
    out
}

fn write_field(pool: &mut ConstantPool, body: &mut Vec<u8>, field: &FieldInfo) {
    u2(body, field.access);
    let name = pool.utf8(&field.name);
    u2(body, name);
    let descriptor = pool.utf8(&field.descriptor);
    u2(body, descriptor);
    let attributes = field_attributes(pool, field);
    write_attributes(pool, body, attributes);
}

fn write_method(pool: &mut ConstantPool, body: &mut Vec<u8>, method: &MethodInfo) {
    u2(body, method.access);
    let name = pool.utf8(&method.name);
    u2(body, name);
    let descriptor = pool.utf8(&method.descriptor);
    u2(body, descriptor);
    let attributes = method_attributes(pool, method);
    write_attributes(pool, body, attributes);
}

/// A serialized attribute: name plus encoded payload.
struct Attribute {
    name: &'static str,
    payload: Vec<u8>,
}

fn write_attributes(pool: &mut ConstantPool, body: &mut Vec<u8>, attributes: Vec<Attribute>) {
    u2(body, attributes.len() as u16);
    for attribute in attributes {
        let name = pool.utf8(attribute.name);
        u2(body, name);
        u4(body, attribute.payload.len() as u32);
        body.extend_from_slice(&attribute.payload);
    }
}

fn class_attributes(pool: &mut ConstantPool, cf: &ClassFile) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    if let Some(signature) = &cf.signature {
        attributes.push(signature_attribute(pool, signature));
    }
    if cf.deprecated {
        attributes.push(Attribute {
            name: "Deprecated",
            payload: Vec::new(),
        });
    }
    if !cf.inner_classes.is_empty() {
        let mut payload = Vec::new();
        u2(&mut payload, cf.inner_classes.len() as u16);
        for inner in &cf.inner_classes {
            let index = pool.class_info(&inner.inner);
            u2(&mut payload, index);
            let outer = match &inner.outer {
                Some(outer) => pool.class_info(outer),
                None => 0,
            };
            u2(&mut payload, outer);
            let name = match &inner.name {
                Some(name) => pool.utf8(name),
                None => 0,
            };
            u2(&mut payload, name);
            u2(&mut payload, inner.access);
        }
        attributes.push(Attribute {
            name: "InnerClasses",
            payload,
        });
    }
    push_annotation_attributes(pool, &mut attributes, &cf.annotations);
    push_type_annotation_attributes(pool, &mut attributes, &cf.type_annotations);
    attributes
}

fn field_attributes(pool: &mut ConstantPool, field: &FieldInfo) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    if let Some(value) = &field.constant_value {
        let mut payload = Vec::new();
        let index = constant_value_index(pool, value);
        u2(&mut payload, index);
        attributes.push(Attribute {
            name: "ConstantValue",
            payload,
        });
    }
    if let Some(signature) = &field.signature {
        attributes.push(signature_attribute(pool, signature));
    }
    if field.deprecated {
        attributes.push(Attribute {
            name: "Deprecated",
            payload: Vec::new(),
        });
    }
    push_annotation_attributes(pool, &mut attributes, &field.annotations);
    push_type_annotation_attributes(pool, &mut attributes, &field.type_annotations);
    attributes
}

fn method_attributes(pool: &mut ConstantPool, method: &MethodInfo) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    if let Some(code) = &method.code {
        let mut payload = Vec::new();
        u2(&mut payload, 2); // max_stack: the exception and its dup
        u2(&mut payload, code.max_locals);
        let error_class = pool.class_info("java/lang/AssertionError");
        let ctor = pool.method_ref("java/lang/AssertionError", "<init>", "()V");
        u4(&mut payload, 8);
        payload.push(OP_NEW);
        u2(&mut payload, error_class);
        payload.push(OP_DUP);
        payload.push(OP_INVOKESPECIAL);
        u2(&mut payload, ctor);
        payload.push(OP_ATHROW);
        u2(&mut payload, 0); // exception_table_length
        u2(&mut payload, 0); // attributes_count
        attributes.push(Attribute {
            name: "Code",
            payload,
        });
    }
    if !method.exceptions.is_empty() {
        let mut payload = Vec::new();
        u2(&mut payload, method.exceptions.len() as u16);
        for exception in &method.exceptions {
            let index = pool.class_info(exception);
            u2(&mut payload, index);
        }
        attributes.push(Attribute {
            name: "Exceptions",
            payload,
        });
    }
    if let Some(signature) = &method.signature {
        attributes.push(signature_attribute(pool, signature));
    }
    if method.deprecated {
        attributes.push(Attribute {
            name: "Deprecated",
            payload: Vec::new(),
        });
    }
    if let Some(default_value) = &method.default_value {
        let mut payload = Vec::new();
        write_element_value(pool, &mut payload, default_value);
        attributes.push(Attribute {
            name: "AnnotationDefault",
            payload,
        });
    }
    push_annotation_attributes(pool, &mut attributes, &method.annotations);
    if method.parameter_annotations.iter().any(|p| !p.is_empty()) {
        for visible in [true, false] {
            if !method
                .parameter_annotations
                .iter()
                .flatten()
                .any(|a| a.runtime_visible == visible)
            {
                continue;
            }
            let mut payload = Vec::new();
            payload.push(method.parameter_annotations.len() as u8);
            for parameter in &method.parameter_annotations {
                let selected: Vec<_> = parameter
                    .iter()
                    .filter(|a| a.runtime_visible == visible)
                    .collect();
                u2(&mut payload, selected.len() as u16);
                for anno in selected {
                    write_annotation(pool, &mut payload, anno);
                }
            }
            attributes.push(Attribute {
                name: if visible {
                    "RuntimeVisibleParameterAnnotations"
                } else {
                    "RuntimeInvisibleParameterAnnotations"
                },
                payload,
            });
        }
    }
    push_type_annotation_attributes(pool, &mut attributes, &method.type_annotations);
    attributes
}

fn signature_attribute(pool: &mut ConstantPool, signature: &str) -> Attribute {
    let mut payload = Vec::new();
    let index = pool.utf8(signature);
    u2(&mut payload, index);
    Attribute {
        name: "Signature",
        payload,
    }
}

fn push_annotation_attributes(
    pool: &mut ConstantPool,
    attributes: &mut Vec<Attribute>,
    annotations: &[AnnotationInfo],
) {
    for visible in [true, false] {
        let selected: Vec<_> = annotations
            .iter()
            .filter(|a| a.runtime_visible == visible)
            .collect();
        if selected.is_empty() {
            continue;
        }
        let mut payload = Vec::new();
        u2(&mut payload, selected.len() as u16);
        for anno in selected {
            write_annotation(pool, &mut payload, anno);
        }
        attributes.push(Attribute {
            name: if visible {
                "RuntimeVisibleAnnotations"
            } else {
                "RuntimeInvisibleAnnotations"
            },
            payload,
        });
    }
}

fn push_type_annotation_attributes(
    pool: &mut ConstantPool,
    attributes: &mut Vec<Attribute>,
    annotations: &[TypeAnnotationInfo],
) {
    for visible in [true, false] {
        let selected: Vec<_> = annotations
            .iter()
            .filter(|a| a.anno.runtime_visible == visible)
            .collect();
        if selected.is_empty() {
            continue;
        }
        let mut payload = Vec::new();
        u2(&mut payload, selected.len() as u16);
        for ta in selected {
            write_type_annotation(pool, &mut payload, ta);
        }
        attributes.push(Attribute {
            name: if visible {
                "RuntimeVisibleTypeAnnotations"
            } else {
                "RuntimeInvisibleTypeAnnotations"
            },
            payload,
        });
    }
}

fn write_type_annotation(pool: &mut ConstantPool, out: &mut Vec<u8>, ta: &TypeAnnotationInfo) {
    out.push(ta.target.target_type());
    match ta.target {
        TargetInfo::ClassTypeParameter(index) | TargetInfo::MethodTypeParameter(index) => {
            out.push(index)
        }
        TargetInfo::Supertype(index) => u2(out, index),
        TargetInfo::ClassTypeParameterBound { param, bound }
        | TargetInfo::MethodTypeParameterBound { param, bound } => {
            out.push(param);
            out.push(bound);
        }
        TargetInfo::Field | TargetInfo::MethodReturn => {}
        TargetInfo::FormalParameter(index) => out.push(index),
        TargetInfo::Throws(index) => u2(out, index),
    }
    out.push(ta.path.len() as u8);
    for step in &ta.path {
        out.push(step.kind);
        out.push(step.index);
    }
    write_annotation(pool, out, &ta.anno);
}

fn write_annotation(pool: &mut ConstantPool, out: &mut Vec<u8>, anno: &AnnotationInfo) {
    let type_index = pool.utf8(&anno.type_descriptor);
    u2(out, type_index);
    u2(out, anno.values.len() as u16);
    for (name, value) in &anno.values {
        let name_index = pool.utf8(name);
        u2(out, name_index);
        write_element_value(pool, out, value);
    }
}

fn write_element_value(pool: &mut ConstantPool, out: &mut Vec<u8>, value: &ElementValue) {
    match value {
        ElementValue::Const(cv) => {
            let (tag, index) = match cv {
                ConstValue::Boolean(v) => (b'Z', pool.integer(*v as i32)),
                ConstValue::Byte(v) => (b'B', pool.integer(*v as i32)),
                ConstValue::Char(v) => (b'C', pool.integer(*v as i32)),
                ConstValue::Short(v) => (b'S', pool.integer(*v as i32)),
                ConstValue::Int(v) => (b'I', pool.integer(*v)),
                ConstValue::Long(v) => (b'J', pool.long(*v)),
                ConstValue::Float(v) => (b'F', pool.float(*v)),
                ConstValue::Double(v) => (b'D', pool.double(*v)),
                ConstValue::Str(v) => (b's', pool.utf8(v)),
            };
            out.push(tag);
            u2(out, index);
        }
        ElementValue::Enum {
            type_descriptor,
            name,
        } => {
            out.push(b'e');
            let type_index = pool.utf8(type_descriptor);
            u2(out, type_index);
            let name_index = pool.utf8(name);
            u2(out, name_index);
        }
        ElementValue::Class { descriptor } => {
            out.push(b'c');
            let index = pool.utf8(descriptor);
            u2(out, index);
        }
        ElementValue::Anno(anno) => {
            out.push(b'@');
            write_annotation(pool, out, anno);
        }
        ElementValue::Array(values) => {
            out.push(b'[');
            u2(out, values.len() as u16);
            for value in values {
                write_element_value(pool, out, value);
            }
        }
    }
}

fn constant_value_index(pool: &mut ConstantPool, value: &ConstValue) -> u16 {
    match value {
        ConstValue::Boolean(v) => pool.integer(*v as i32),
        ConstValue::Byte(v) => pool.integer(*v as i32),
        ConstValue::Char(v) => pool.integer(*v as i32),
        ConstValue::Short(v) => pool.integer(*v as i32),
        ConstValue::Int(v) => pool.integer(*v),
        ConstValue::Long(v) => pool.long(*v),
        ConstValue::Float(v) => pool.float(*v),
        ConstValue::Double(v) => pool.double(*v),
        ConstValue::Str(v) => pool.string(v),
    }
}

fn u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
