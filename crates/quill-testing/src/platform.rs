//! A miniature platform class path.
//!
//! Just enough of `java.*` for header compilation tests: `Object`,
//! `String`, the enum and annotation machinery, and a couple of
//! exception and collection types. The class files are produced by
//! quill's own writer, so tests also exercise the reader on realistic
//! bytes.

use quill_classfile::{
    write_class, AnnotationInfo, ClassFile, ElementValue, FieldInfo, MethodInfo,
};
use std::collections::HashMap;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_FINAL: u16 = 0x0010;
const ACC_SUPER: u16 = 0x0020;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;
const ACC_ANNOTATION: u16 = 0x2000;
const ACC_ENUM: u16 = 0x4000;

fn class(name: &str, access: u16, super_name: Option<&str>) -> ClassFile {
    ClassFile {
        minor_version: 0,
        major_version: 52,
        access,
        name: name.to_string(),
        super_name: super_name.map(str::to_string),
        ..ClassFile::default()
    }
}

fn method(name: &str, descriptor: &str, access: u16) -> MethodInfo {
    MethodInfo {
        access,
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        signature: None,
        exceptions: Vec::new(),
        default_value: None,
        annotations: Vec::new(),
        parameter_annotations: Vec::new(),
        type_annotations: Vec::new(),
        code: None,
        deprecated: false,
    }
}

fn enum_field(name: &str, descriptor: &str) -> FieldInfo {
    FieldInfo {
        access: ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM,
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        signature: None,
        constant_value: None,
        annotations: Vec::new(),
        type_annotations: Vec::new(),
        deprecated: false,
    }
}

fn runtime_retention() -> AnnotationInfo {
    AnnotationInfo {
        type_descriptor: "Ljava/lang/annotation/Retention;".to_string(),
        runtime_visible: true,
        values: vec![(
            "value".to_string(),
            ElementValue::Enum {
                type_descriptor: "Ljava/lang/annotation/RetentionPolicy;".to_string(),
                name: "RUNTIME".to_string(),
            },
        )],
    }
}

/// Builds the stub platform classes, keyed by binary name.
pub fn jdk() -> HashMap<String, Vec<u8>> {
    let mut classes: Vec<ClassFile> = Vec::new();

    classes.push(class("java/lang/Object", ACC_PUBLIC | ACC_SUPER, None));
    classes.push(class(
        "java/lang/String",
        ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
        Some("java/lang/Object"),
    ));
    classes.push(class(
        "java/lang/Number",
        ACC_PUBLIC | ACC_ABSTRACT | ACC_SUPER,
        Some("java/lang/Object"),
    ));
    classes.push(class(
        "java/lang/Integer",
        ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
        Some("java/lang/Number"),
    ));

    let mut enum_base = class(
        "java/lang/Enum",
        ACC_PUBLIC | ACC_ABSTRACT | ACC_SUPER,
        Some("java/lang/Object"),
    );
    enum_base.signature = Some("<E:Ljava/lang/Enum<TE;>;>Ljava/lang/Object;".to_string());
    enum_base.methods.push(method(
        "name",
        "()Ljava/lang/String;",
        ACC_PUBLIC | ACC_FINAL,
    ));
    classes.push(enum_base);

    classes.push(class(
        "java/lang/Throwable",
        ACC_PUBLIC | ACC_SUPER,
        Some("java/lang/Object"),
    ));
    classes.push(class(
        "java/lang/Exception",
        ACC_PUBLIC | ACC_SUPER,
        Some("java/lang/Throwable"),
    ));
    classes.push(class(
        "java/io/IOException",
        ACC_PUBLIC | ACC_SUPER,
        Some("java/lang/Exception"),
    ));
    classes.push(class(
        "java/io/Serializable",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        Some("java/lang/Object"),
    ));

    let mut list = class(
        "java/util/List",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        Some("java/lang/Object"),
    );
    list.signature = Some("<E:Ljava/lang/Object;>Ljava/lang/Object;".to_string());
    classes.push(list);

    classes.push(class(
        "java/lang/annotation/Annotation",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        Some("java/lang/Object"),
    ));

    let mut policy = class(
        "java/lang/annotation/RetentionPolicy",
        ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_ENUM,
        Some("java/lang/Enum"),
    );
    policy.signature = Some("Ljava/lang/Enum<Ljava/lang/annotation/RetentionPolicy;>;".to_string());
    for constant in ["SOURCE", "CLASS", "RUNTIME"] {
        policy
            .fields
            .push(enum_field(constant, "Ljava/lang/annotation/RetentionPolicy;"));
    }
    classes.push(policy);

    let mut retention = class(
        "java/lang/annotation/Retention",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION,
        Some("java/lang/Object"),
    );
    retention.interfaces.push("java/lang/annotation/Annotation".to_string());
    retention.methods.push(method(
        "value",
        "()Ljava/lang/annotation/RetentionPolicy;",
        ACC_PUBLIC | ACC_ABSTRACT,
    ));
    retention.annotations.push(runtime_retention());
    classes.push(retention);

    let mut deprecated = class(
        "java/lang/Deprecated",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION,
        Some("java/lang/Object"),
    );
    deprecated
        .interfaces
        .push("java/lang/annotation/Annotation".to_string());
    deprecated.annotations.push(runtime_retention());
    classes.push(deprecated);

    let mut map = class(
        "java/util/Map",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        Some("java/lang/Object"),
    );
    map.signature = Some("<K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;".to_string());
    map.inner_classes.push(quill_classfile::InnerClass {
        inner: "java/util/Map$Entry".to_string(),
        outer: Some("java/util/Map".to_string()),
        name: Some("Entry".to_string()),
        access: ACC_PUBLIC | ACC_STATIC | ACC_INTERFACE | ACC_ABSTRACT,
    });
    classes.push(map);

    let mut entry = class(
        "java/util/Map$Entry",
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        Some("java/lang/Object"),
    );
    entry.signature = Some("<K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;".to_string());
    entry.inner_classes.push(quill_classfile::InnerClass {
        inner: "java/util/Map$Entry".to_string(),
        outer: Some("java/util/Map".to_string()),
        name: Some("Entry".to_string()),
        access: ACC_PUBLIC | ACC_STATIC | ACC_INTERFACE | ACC_ABSTRACT,
    });
    classes.push(entry);

    let mut math = class(
        "java/lang/Math",
        ACC_PUBLIC | ACC_FINAL | ACC_SUPER,
        Some("java/lang/Object"),
    );
    math.fields.push(FieldInfo {
        access: ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
        name: "PI".to_string(),
        descriptor: "D".to_string(),
        signature: None,
        constant_value: Some(quill_classfile::ConstValue::Double(std::f64::consts::PI)),
        annotations: Vec::new(),
        type_annotations: Vec::new(),
        deprecated: false,
    });
    classes.push(math);

    classes
        .into_iter()
        .map(|cf| (cf.name.clone(), write_class(&cf)))
        .collect()
}
