//! Lowering tests: bind hand-built units, lower, and inspect the emitted
//! class files through the reader.

use pretty_assertions::assert_eq;
use quill_binder::bind;
use quill_classfile::{parse_class_signature, read_class, ClassFile, ConstValue};
use quill_lower::lower_program;
use quill_model::constant::Value;
use quill_model::flags::Mods;
use quill_model::tree::{BinOp, Expr, TreeTy, TyMember};
use quill_model::ty::PrimKind;
use quill_testing::platform;
use quill_testing::tree::*;
use std::collections::BTreeMap;

fn compile(units: Vec<quill_model::tree::CompUnit>) -> BTreeMap<String, ClassFile> {
    let jdk = platform::jdk();
    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    lower_program(&bound, 52)
        .unwrap()
        .into_iter()
        .map(|(name, bytes)| (name, read_class(&bytes).unwrap()))
        .collect()
}

#[test]
fn trivial_class_lowers_to_object_subclass_with_stub_constructor() {
    let classes = compile(vec![unit("A.java", None, vec![class_decl("A")])]);
    let a = &classes["A"];

    assert_eq!(a.major_version, 52);
    assert_eq!(a.access, 0x0020); // ACC_SUPER only
    assert_eq!(a.super_name.as_deref(), Some("java/lang/Object"));
    assert_eq!(a.signature, None);
    assert_eq!(a.inner_classes, Vec::new());

    assert_eq!(a.methods.len(), 1);
    let ctor = &a.methods[0];
    assert_eq!(ctor.name, "<init>");
    assert_eq!(ctor.descriptor, "()V");
    assert_eq!(ctor.signature, None);
}

#[test]
fn enums_get_the_full_mandated_surface() {
    let classes = compile(vec![unit(
        "E.java",
        Some("p"),
        vec![enum_decl("E", &["X", "Y"])],
    )]);
    let e = &classes["p/E"];

    // final enum extending Enum<E>, with the generic supertype recorded
    // in the signature.
    assert_eq!(e.access & 0x4010, 0x4010); // ACC_ENUM | ACC_FINAL
    assert_eq!(e.super_name.as_deref(), Some("java/lang/Enum"));
    assert_eq!(e.signature.as_deref(), Some("Ljava/lang/Enum<Lp/E;>;"));
    assert_eq!(e.inner_classes, Vec::new());

    let fields: Vec<(&str, &str, u16)> = e
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.descriptor.as_str(), f.access))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("X", "Lp/E;", 0x4019),       // public static final enum
            ("Y", "Lp/E;", 0x4019),
            ("$VALUES", "[Lp/E;", 0x101a), // private static final synthetic
        ]
    );

    let methods: Vec<(&str, &str)> = e
        .methods
        .iter()
        .map(|m| (m.name.as_str(), m.descriptor.as_str()))
        .collect();
    assert_eq!(
        methods,
        vec![
            ("<init>", "(Ljava/lang/String;I)V"),
            ("values", "()[Lp/E;"),
            ("valueOf", "(Ljava/lang/String;)Lp/E;"),
        ]
    );
    // The constructor is private and carries no generic signature.
    assert_eq!(e.methods[0].access, 0x0002);
    assert_eq!(e.methods[0].signature, None);
}

#[test]
fn constant_fields_carry_constant_value() {
    let mut c = class_decl("C");
    c.members = vec![
        TyMember::Field(field_init(
            Mods::STATIC | Mods::FINAL,
            TreeTy::Prim(PrimKind::Int),
            "N",
            Expr::binary(
                BinOp::Add,
                Expr::lit(Value::Int(1)),
                Expr::binary(
                    BinOp::Mul,
                    Expr::lit(Value::Int(2)),
                    Expr::lit(Value::Int(3)),
                ),
            ),
        )),
        TyMember::Field(field_init(
            Mods::STATIC | Mods::FINAL,
            TreeTy::name(&["String"]),
            "S",
            Expr::binary(
                BinOp::Add,
                Expr::lit(Value::Str("v".to_string())),
                Expr::lit(Value::Int(1)),
            ),
        )),
        // Not final: no ConstantValue.
        TyMember::Field(field_init(
            Mods::STATIC,
            TreeTy::Prim(PrimKind::Int),
            "open",
            Expr::lit(Value::Int(5)),
        )),
    ];
    let classes = compile(vec![unit("C.java", Some("p"), vec![c])]);
    let c = &classes["p/C"];

    assert_eq!(c.fields[0].constant_value, Some(ConstValue::Int(7)));
    assert_eq!(
        c.fields[1].constant_value,
        Some(ConstValue::Str("v1".to_string()))
    );
    assert_eq!(c.fields[2].constant_value, None);
}

#[test]
fn generic_declarations_carry_signatures() {
    let mut l = class_decl("L");
    l.typarams = vec![typaram("T", vec![TreeTy::name(&["Number"])])];
    l.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["T"]),
        "head",
    ))];
    let classes = compile(vec![unit("L.java", Some("p"), vec![l])]);
    let l = &classes["p/L"];

    assert_eq!(
        l.signature.as_deref(),
        Some("<T:Ljava/lang/Number;>Ljava/lang/Object;")
    );
    let head = &l.fields[0];
    assert_eq!(head.descriptor, "Ljava/lang/Number;");
    assert_eq!(head.signature.as_deref(), Some("TT;"));

    // The emitted signature is grammatical.
    parse_class_signature(l.signature.as_deref().unwrap()).unwrap();
}

#[test]
fn runtime_annotations_partition_by_retention() {
    let mut runtime_anno = annotation_decl("R");
    runtime_anno.annos = vec![anno("Retention", vec![select("RetentionPolicy.RUNTIME")])];
    runtime_anno.members = vec![TyMember::Method(method(
        Mods::NONE,
        TreeTy::Prim(PrimKind::Int),
        "value",
        vec![],
    ))];
    let mut source_anno = annotation_decl("S");
    source_anno.annos = vec![anno("Retention", vec![select("RetentionPolicy.SOURCE")])];

    let mut c = class_decl("C");
    c.annos = vec![
        anno("R", vec![assign("value", Expr::lit(Value::Int(42)))]),
        anno("S", vec![]),
    ];

    let classes = compile(vec![
        unit_with_imports(
            "R.java",
            Some("p"),
            vec![import_on_demand("java.lang.annotation")],
            vec![runtime_anno, source_anno],
        ),
        unit("C.java", Some("p"), vec![c]),
    ]);
    let c = &classes["p/C"];

    // One visible annotation; the source-retention use vanished.
    assert_eq!(c.annotations.len(), 1);
    let r = &c.annotations[0];
    assert!(r.runtime_visible);
    assert_eq!(r.type_descriptor, "Lp/R;");
    assert_eq!(r.values.len(), 1);
    assert_eq!(r.values[0].0, "value");
    assert_eq!(
        r.values[0].1,
        quill_classfile::ElementValue::Const(ConstValue::Int(42))
    );

    // The annotation declaration itself lowers as an annotation interface.
    let r_decl = &classes["p/R"];
    assert_eq!(r_decl.access & 0x2600, 0x2600); // ANNOTATION | INTERFACE
    assert!(r_decl
        .interfaces
        .contains(&"java/lang/annotation/Annotation".to_string()));
}

#[test]
fn deprecated_annotations_emit_the_legacy_attribute() {
    let mut c = class_decl("C");
    c.annos = vec![anno("Deprecated", vec![])];
    let classes = compile(vec![unit("C.java", Some("p"), vec![c])]);
    let c = &classes["p/C"];
    assert!(c.deprecated);
    // @Deprecated has runtime retention, so the annotation appears too.
    assert_eq!(c.annotations.len(), 1);
}

#[test]
fn throws_clauses_lower_to_the_exceptions_attribute() {
    let mut c = class_decl("C");
    let mut m = method(Mods::NONE, TreeTy::Void, "run", vec![]);
    m.throws = vec![TreeTy::name(&["java", "io", "IOException"])];
    c.members = vec![TyMember::Method(m)];
    let classes = compile(vec![unit("C.java", Some("p"), vec![c])]);
    let c = &classes["p/C"];

    let run = c.methods.iter().find(|m| m.name == "run").unwrap();
    assert_eq!(run.exceptions, vec!["java/io/IOException".to_string()]);
    assert_eq!(run.signature, None);
}

#[test]
fn nested_references_close_the_inner_class_table() {
    // C references java.util.Map.Entry and declares a member class; both
    // appear in InnerClasses, along with nothing else.
    let mut c = class_decl("C");
    c.members = vec![
        TyMember::Ty(class_decl("In")),
        TyMember::Field(field(
            Mods::NONE,
            TreeTy::name(&["java", "util", "Map", "Entry"]),
            "e",
        )),
    ];
    let classes = compile(vec![unit("C.java", Some("p"), vec![c])]);
    let c = &classes["p/C"];

    let inner_names: Vec<&str> = c.inner_classes.iter().map(|i| i.inner.as_str()).collect();
    assert_eq!(inner_names, vec!["java/util/Map$Entry", "p/C$In"]);
    let entry = &c.inner_classes[0];
    assert_eq!(entry.outer.as_deref(), Some("java/util/Map"));
    assert_eq!(entry.name.as_deref(), Some("Entry"));

    // The member class's own file records itself as well.
    let inner = &classes["p/C$In"];
    let self_entry = inner
        .inner_classes
        .iter()
        .find(|i| i.inner == "p/C$In")
        .unwrap();
    assert_eq!(self_entry.outer.as_deref(), Some("p/C"));
}

#[test]
fn interface_members_get_implicit_flags() {
    let mut i = interface_decl("I");
    i.members = vec![
        TyMember::Field(field_init(
            Mods::NONE,
            TreeTy::Prim(PrimKind::Int),
            "K",
            Expr::lit(Value::Int(3)),
        )),
        TyMember::Method(method(Mods::NONE, TreeTy::Void, "run", vec![])),
    ];
    let classes = compile(vec![unit("I.java", Some("p"), vec![i])]);
    let i = &classes["p/I"];

    assert_eq!(i.access & 0x0600, 0x0600); // INTERFACE | ABSTRACT
    assert_eq!(i.access & 0x0020, 0); // never ACC_SUPER
    let k = &i.fields[0];
    assert_eq!(k.access, 0x0019); // public static final
    assert_eq!(k.constant_value, Some(ConstValue::Int(3)));
    let run = &i.methods[0];
    assert_eq!(run.access, 0x0401); // public abstract
}

#[test]
fn annotation_defaults_lower_to_annotation_default() {
    let mut r = annotation_decl("R");
    let mut value = method(Mods::NONE, TreeTy::Prim(PrimKind::Int), "value", vec![]);
    value.default_value = Some(Expr::lit(Value::Int(7)));
    let mut names = method(
        Mods::NONE,
        TreeTy::Array {
            elem: Box::new(TreeTy::name(&["String"])),
            annos: Vec::new(),
        },
        "names",
        vec![],
    );
    // A scalar default for an array element wraps into a one-element
    // array.
    names.default_value = Some(Expr::lit(Value::Str("n".to_string())));
    r.members = vec![TyMember::Method(value), TyMember::Method(names)];
    let classes = compile(vec![unit("R.java", Some("p"), vec![r])]);
    let r = &classes["p/R"];

    use quill_classfile::ElementValue;
    assert_eq!(
        r.methods[0].default_value,
        Some(ElementValue::Const(ConstValue::Int(7)))
    );
    assert_eq!(
        r.methods[1].default_value,
        Some(ElementValue::Array(vec![ElementValue::Const(
            ConstValue::Str("n".to_string())
        )]))
    );
}

/// A `@Retention(RUNTIME)` marker annotation `p.R` in its own unit.
fn runtime_marker_unit() -> quill_model::tree::CompUnit {
    let mut r = annotation_decl("R");
    r.annos = vec![anno("Retention", vec![select("RetentionPolicy.RUNTIME")])];
    unit_with_imports(
        "R.java",
        Some("p"),
        vec![import_on_demand("java.lang.annotation")],
        vec![r],
    )
}

/// A raw reference whose innermost segment is annotated with `@R`.
fn marked(segments: &[&str]) -> TreeTy {
    let TreeTy::Class(mut segs) = TreeTy::name(segments) else {
        unreachable!()
    };
    segs.last_mut().unwrap().annos.push(anno("R", vec![]));
    TreeTy::Class(segs)
}

fn marker_use() -> quill_classfile::AnnotationInfo {
    quill_classfile::AnnotationInfo {
        type_descriptor: "Lp/R;".to_string(),
        runtime_visible: true,
        values: Vec::new(),
    }
}

#[test]
fn parameter_annotations_skip_synthetic_parameters() {
    // Inner's constructor takes the synthetic enclosing instance first;
    // the parameter-annotation table and the formal-parameter type
    // annotation must both index the declared parameter as 0.
    let mut s = param(marked(&["String"]), "s");
    s.annos = vec![anno("R", vec![])];
    let mut inner = class_decl("Inner");
    inner.members = vec![TyMember::Method(constructor(Mods::NONE, vec![s]))];
    let mut outer = class_decl("Outer");
    outer.members = vec![TyMember::Ty(inner)];

    let classes = compile(vec![
        runtime_marker_unit(),
        unit("O.java", Some("p"), vec![outer]),
    ]);
    let inner = &classes["p/Outer$Inner"];
    let ctor = &inner.methods[0];
    assert_eq!(ctor.descriptor, "(Lp/Outer;Ljava/lang/String;)V");

    // One entry: the synthetic parameter is not counted.
    assert_eq!(ctor.parameter_annotations, vec![vec![marker_use()]]);
    assert_eq!(
        ctor.type_annotations,
        vec![quill_classfile::TypeAnnotationInfo {
            target: quill_classfile::TargetInfo::FormalParameter(0),
            path: Vec::new(),
            anno: marker_use(),
        }]
    );
}

#[test]
fn type_annotations_record_targets_and_paths() {
    use quill_classfile::{TargetInfo, TypeAnnotationInfo, TypePathStep};

    let base = class_decl("Base");
    let mut c = class_decl("C");
    c.typarams = vec![typaram("T", vec![marked(&["Base"])])];
    c.extends = Some(marked(&["Base"]));
    c.members = vec![
        TyMember::Field(field(Mods::NONE, marked(&["Base"]), "b")),
        TyMember::Field(field(
            Mods::NONE,
            TreeTy::Array {
                elem: Box::new(marked(&["Base"])),
                annos: Vec::new(),
            },
            "xs",
        )),
    ];

    let classes = compile(vec![
        runtime_marker_unit(),
        unit("C.java", Some("p"), vec![base, c]),
    ]);
    let c = &classes["p/C"];

    // Supertype first, then the class-bound slot of T.
    assert_eq!(
        c.type_annotations,
        vec![
            TypeAnnotationInfo {
                target: TargetInfo::Supertype(65535),
                path: Vec::new(),
                anno: marker_use(),
            },
            TypeAnnotationInfo {
                target: TargetInfo::ClassTypeParameterBound { param: 0, bound: 0 },
                path: Vec::new(),
                anno: marker_use(),
            },
        ]
    );

    let b = c.fields.iter().find(|f| f.name == "b").unwrap();
    assert_eq!(
        b.type_annotations,
        vec![TypeAnnotationInfo {
            target: TargetInfo::Field,
            path: Vec::new(),
            anno: marker_use(),
        }]
    );

    // The array element is one `type_path` step deep.
    let xs = c.fields.iter().find(|f| f.name == "xs").unwrap();
    assert_eq!(
        xs.type_annotations,
        vec![TypeAnnotationInfo {
            target: TargetInfo::Field,
            path: vec![TypePathStep { kind: 0, index: 0 }],
            anno: marker_use(),
        }]
    );
}

#[test]
fn stub_bodies_are_emitted_for_concrete_methods_only() {
    // Inspect the record level (the reader does not decode Code).
    let jdk = platform::jdk();
    let mut c = class_decl("C");
    c.mods = Mods::ABSTRACT;
    c.members = vec![
        TyMember::Method(method(Mods::ABSTRACT, TreeTy::Void, "gone", vec![])),
        TyMember::Method(method(
            Mods::NONE,
            TreeTy::Prim(PrimKind::Long),
            "stub",
            vec![
                param(TreeTy::Prim(PrimKind::Double), "d"),
                param(TreeTy::name(&["String"]), "s"),
            ],
        )),
    ];
    let units = vec![unit("C.java", Some("p"), vec![c])];
    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);

    let env = bound.env();
    let class = &bound.classes[&quill_model::sym::ClassSymbol::new("p/C")];
    let lowered = quill_lower::lower_class(&env, class, 52).unwrap();

    let gone = lowered.methods.iter().find(|m| m.name == "gone").unwrap();
    assert_eq!(gone.code, None);
    let stub = lowered.methods.iter().find(|m| m.name == "stub").unwrap();
    // this + double (2 slots) + reference
    assert_eq!(stub.code, Some(quill_classfile::CodeInfo { max_locals: 4 }));

    // The serialized form actually contains a Code attribute.
    let bytes = quill_classfile::write_class(&lowered);
    let code_utf8: &[u8] = b"\x00\x04Code";
    assert!(bytes
        .windows(code_utf8.len())
        .any(|window| window == code_utf8));
}
