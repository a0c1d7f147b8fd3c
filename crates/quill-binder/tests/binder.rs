//! Binder integration tests over hand-built compilation units.

use pretty_assertions::assert_eq;
use quill_binder::{bind, DiagKind, Retention};
use quill_model::constant::Value;
use quill_model::flags::{access, Mods};
use quill_model::sym::ClassSymbol;
use quill_model::tree::{Expr, TreeTy, TyMember};
use quill_model::ty::{PrimKind, Type};
use quill_model::{tree::BinOp, NoClassBytes};
use quill_testing::platform;
use quill_testing::tree::*;

fn int_lit(v: i32) -> Expr {
    Expr::lit(Value::Int(v))
}

#[test]
fn binds_a_trivial_class() {
    let jdk = platform::jdk();
    let units = vec![unit("A.java", None, vec![class_decl("A")])];
    let bound = bind(&units, &jdk).unwrap();

    assert!(bound.diagnostics.is_empty());
    let a = &bound.classes[&ClassSymbol::new("A")];
    assert_eq!(a.superclass, Some(Type::object()));
    assert_eq!(a.interfaces, Vec::new());
    // The default constructor is synthesized.
    assert_eq!(a.methods.len(), 1);
    let ctor = &a.methods[0];
    assert!(ctor.is_constructor());
    assert_eq!(ctor.access, 0);
    assert_eq!(ctor.params, Vec::new());
}

#[test]
fn duplicate_top_level_types_are_reported() {
    let jdk = platform::jdk();
    let units = vec![
        unit("A.java", Some("p"), vec![class_decl("A")]),
        unit("A2.java", Some("p"), vec![class_decl("A")]),
    ];
    let bound = bind(&units, &jdk).unwrap();
    assert_eq!(bound.diagnostics.len(), 1);
    assert_eq!(bound.diagnostics[0].kind, DiagKind::DuplicateType);
}

#[test]
fn hierarchy_cycles_are_reported_for_both_classes() {
    let jdk = platform::jdk();
    let mut a = class_decl("A");
    a.extends = Some(TreeTy::name(&["B"]));
    let mut b = class_decl("B");
    b.extends = Some(TreeTy::name(&["A"]));
    let units = vec![unit("AB.java", Some("p"), vec![a, b])];

    let bound = bind(&units, &jdk).unwrap();
    let cycles: Vec<_> = bound
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagKind::CyclicHierarchy)
        .collect();
    assert_eq!(cycles.len(), 2);
}

#[test]
fn constant_fields_fold_in_source_order() {
    let jdk = platform::jdk();
    let mut c = class_decl("C");
    c.members = vec![TyMember::Field(field_init(
        Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "N",
        Expr::binary(
            BinOp::Add,
            int_lit(1),
            Expr::binary(BinOp::Mul, int_lit(2), int_lit(3)),
        ),
    ))];
    let units = vec![unit("C.java", Some("p"), vec![c])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty());
    let c = &bound.classes[&ClassSymbol::new("p/C")];
    assert_eq!(c.field("N").unwrap().value, Some(Value::Int(7)));
}

#[test]
fn constants_resolve_across_compilation_units() {
    let jdk = platform::jdk();
    // A.M refers to Z.N; the worklist visits A first (topological order
    // is alphabetical here), stops on the missing dependency, and
    // retries after Z.N resolves.
    let mut a = class_decl("A");
    a.members = vec![TyMember::Field(field_init(
        Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "M",
        Expr::binary(BinOp::Add, select("Z.N"), int_lit(1)),
    ))];
    let mut z = class_decl("Z");
    z.members = vec![TyMember::Field(field_init(
        Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "N",
        int_lit(41),
    ))];
    let units = vec![
        unit("A.java", Some("p"), vec![a]),
        unit("Z.java", Some("p"), vec![z]),
    ];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let a = &bound.classes[&ClassSymbol::new("p/A")];
    assert_eq!(a.field("M").unwrap().value, Some(Value::Int(42)));
}

#[test]
fn cyclic_constants_are_reported() {
    let jdk = platform::jdk();
    let mut a = class_decl("A");
    a.members = vec![TyMember::Field(field_init(
        Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "X",
        select("B.Y"),
    ))];
    let mut b = class_decl("B");
    b.members = vec![TyMember::Field(field_init(
        Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "Y",
        select("A.X"),
    ))];
    let units = vec![unit("AB.java", Some("p"), vec![a, b])];

    let bound = bind(&units, &jdk).unwrap();
    let cyclic: Vec<_> = bound
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagKind::CyclicConstant)
        .collect();
    assert_eq!(cyclic.len(), 2);
}

#[test]
fn enum_declarations_get_their_mandated_members() {
    let jdk = platform::jdk();
    let units = vec![unit("E.java", Some("p"), vec![enum_decl("E", &["X", "Y"])])];
    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty());

    let e = &bound.classes[&ClassSymbol::new("p/E")];
    let sym = ClassSymbol::new("p/E");

    // Constants X and Y, then the synthetic $VALUES array.
    let names: Vec<&str> = e.fields.iter().map(|f| f.sym.name.as_str()).collect();
    assert_eq!(names, vec!["X", "Y", "$VALUES"]);
    let x = e.field("X").unwrap();
    assert_eq!(x.ty, Type::class(sym.clone()));
    assert_eq!(
        x.access,
        access::ACC_PUBLIC | access::ACC_STATIC | access::ACC_FINAL | access::ACC_ENUM
    );
    let values_field = e.field("$VALUES").unwrap();
    assert_ne!(values_field.access & access::ACC_SYNTHETIC, 0);

    // Constructor plus values/valueOf.
    let method_names: Vec<&str> = e.methods.iter().map(|m| m.sym.name.as_str()).collect();
    assert_eq!(method_names, vec!["<init>", "values", "valueOf"]);
    let ctor = &e.methods[0];
    assert_eq!(ctor.access, access::ACC_PRIVATE);
    assert_eq!(ctor.params.len(), 2);
    assert!(ctor.params.iter().all(|p| p.synthetic));
    let value_of = &e.methods[2];
    assert_eq!(value_of.ret, Type::class(sym));
    assert_eq!(value_of.params[0].ty, Type::string());
}

#[test]
fn retention_is_read_from_the_meta_annotation() {
    let jdk = platform::jdk();
    let mut r = annotation_decl("R");
    r.annos = vec![anno("Retention", vec![select("RetentionPolicy.RUNTIME")])];
    r.members = vec![TyMember::Method(method(
        Mods::NONE,
        TreeTy::Prim(PrimKind::Int),
        "value",
        vec![],
    ))];
    let units = vec![unit_with_imports(
        "R.java",
        Some("p"),
        vec![import_on_demand("java.lang.annotation")],
        vec![r],
    )];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let r = &bound.classes[&ClassSymbol::new("p/R")];
    assert_eq!(r.retention, Some(Retention::Runtime));
}

#[test]
fn annotation_defaults_are_evaluated() {
    let jdk = platform::jdk();
    let mut r = annotation_decl("R");
    let mut value = method(Mods::NONE, TreeTy::Prim(PrimKind::Int), "value", vec![]);
    value.default_value = Some(Expr::binary(BinOp::Mul, int_lit(6), int_lit(7)));
    r.members = vec![TyMember::Method(value)];
    let units = vec![unit("R.java", Some("p"), vec![r])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let r = &bound.classes[&ClassSymbol::new("p/R")];
    assert_eq!(
        r.methods[0].default_value,
        Some(quill_model::constant::Const::Value(Value::Int(42)))
    );
}

#[test]
fn ambiguous_on_demand_imports_are_reported_on_use() {
    let jdk = platform::jdk();
    // Both packages q and r declare a class D; unit in p imports both on
    // demand and uses the simple name.
    let mut user = class_decl("U");
    user.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["D"]),
        "d",
    ))];
    let units = vec![
        unit("q/D.java", Some("q"), vec![class_decl("D")]),
        unit("r/D.java", Some("r"), vec![class_decl("D")]),
        unit_with_imports(
            "p/U.java",
            Some("p"),
            vec![import_on_demand("q"), import_on_demand("r")],
            vec![user],
        ),
    ];

    let bound = bind(&units, &jdk).unwrap();
    assert_eq!(bound.diagnostics.len(), 1);
    assert_eq!(bound.diagnostics[0].kind, DiagKind::AmbiguousName);
    // The field type fell back to the sentinel.
    let u = &bound.classes[&ClassSymbol::new("p/U")];
    assert_eq!(u.field("d").unwrap().ty, Type::Error);
}

#[test]
fn single_type_imports_win_over_on_demand() {
    let jdk = platform::jdk();
    let mut user = class_decl("U");
    user.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["D"]),
        "d",
    ))];
    let units = vec![
        unit("q/D.java", Some("q"), vec![class_decl("D")]),
        unit("r/D.java", Some("r"), vec![class_decl("D")]),
        unit_with_imports(
            "p/U.java",
            Some("p"),
            vec![import("q.D"), import_on_demand("r")],
            vec![user],
        ),
    ];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let u = &bound.classes[&ClassSymbol::new("p/U")];
    assert_eq!(u.field("d").unwrap().ty, Type::class(ClassSymbol::new("q/D")));
}

#[test]
fn class_path_supertypes_are_visible_to_member_lookup() {
    let jdk = platform::jdk();
    // class C extends Integer: the supertype chain comes from the class
    // path, and resolving `Number` through java.lang works unimported.
    let mut c = class_decl("C");
    c.extends = Some(TreeTy::name(&["Integer"]));
    c.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["Number"]),
        "n",
    ))];
    let units = vec![unit("C.java", Some("p"), vec![c])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let c = &bound.classes[&ClassSymbol::new("p/C")];
    assert_eq!(
        c.superclass,
        Some(Type::class(ClassSymbol::new("java/lang/Integer")))
    );
    assert_eq!(
        c.field("n").unwrap().ty,
        Type::class(ClassSymbol::new("java/lang/Number"))
    );
}

#[test]
fn unknown_supertypes_use_the_sentinel_and_keep_binding() {
    let jdk = platform::jdk();
    let mut c = class_decl("C");
    c.extends = Some(TreeTy::name(&["Missing"]));
    c.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::Prim(PrimKind::Int),
        "x",
    ))];
    let units = vec![unit("C.java", Some("p"), vec![c])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagKind::SymbolNotFound));
    // Binding still produced the class and its field.
    let c = &bound.classes[&ClassSymbol::new("p/C")];
    assert_eq!(c.field("x").unwrap().ty, Type::Prim(PrimKind::Int));
}

#[test]
fn static_imports_feed_constant_evaluation() {
    let jdk = platform::jdk();
    let mut a = class_decl("A");
    a.members = vec![TyMember::Field(field_init(
        Mods::PUBLIC | Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "BASE",
        int_lit(10),
    ))];
    let mut b = class_decl("B");
    b.members = vec![TyMember::Field(field_init(
        Mods::STATIC | Mods::FINAL,
        TreeTy::Prim(PrimKind::Int),
        "DERIVED",
        Expr::binary(BinOp::Shl, Expr::ident("BASE"), int_lit(1)),
    ))];
    let units = vec![
        unit("q/A.java", Some("q"), vec![a]),
        unit_with_imports(
            "p/B.java",
            Some("p"),
            vec![import_static("q.A.BASE")],
            vec![b],
        ),
    ];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let b = &bound.classes[&ClassSymbol::new("p/B")];
    assert_eq!(b.field("DERIVED").unwrap().value, Some(Value::Int(20)));
}

#[test]
fn inherited_member_types_shadow_enclosing_scope() {
    let jdk = platform::jdk();
    // Sup declares member class T; Outer declares its own T; class Inner
    // extends Sup, so a use of `T` inside Inner resolves to Sup.T.
    let mut sup = class_decl("Sup");
    sup.members = vec![TyMember::Ty(class_decl("T"))];
    let mut inner = class_decl("Inner");
    inner.mods = Mods::STATIC;
    inner.extends = Some(TreeTy::name(&["Sup"]));
    inner.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["T"]),
        "t",
    ))];
    let mut outer = class_decl("Outer");
    outer.members = vec![TyMember::Ty(class_decl("T")), TyMember::Ty(inner)];
    let units = vec![unit("O.java", Some("p"), vec![sup, outer])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let inner = &bound.classes[&ClassSymbol::new("p/Outer$Inner")];
    assert_eq!(
        inner.field("t").unwrap().ty,
        Type::class(ClassSymbol::new("p/Sup$T"))
    );
}

#[test]
fn inner_class_constructors_take_the_enclosing_instance() {
    let jdk = platform::jdk();
    let mut inner = class_decl("Inner");
    inner.members = vec![TyMember::Method(constructor(
        Mods::NONE,
        vec![param(TreeTy::Prim(PrimKind::Int), "x")],
    ))];
    let mut outer = class_decl("Outer");
    outer.members = vec![TyMember::Ty(inner)];
    let units = vec![unit("O.java", Some("p"), vec![outer])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let inner = &bound.classes[&ClassSymbol::new("p/Outer$Inner")];
    let ctor = &inner.methods[0];
    assert_eq!(ctor.params.len(), 2);
    assert!(ctor.params[0].synthetic);
    assert_eq!(
        ctor.params[0].ty,
        Type::class(ClassSymbol::new("p/Outer"))
    );
    assert!(!ctor.params[1].synthetic);
}

#[test]
fn type_parameters_shadow_types_and_carry_bounds() {
    let jdk = platform::jdk();
    let mut l = class_decl("L");
    l.typarams = vec![typaram("T", vec![TreeTy::name(&["Number"])])];
    l.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["T"]),
        "head",
    ))];
    let units = vec![unit("L.java", Some("p"), vec![l])];

    let bound = bind(&units, &jdk).unwrap();
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let l = &bound.classes[&ClassSymbol::new("p/L")];
    assert_eq!(l.typarams.len(), 1);
    let info = &l.typaram_info[&l.typarams[0]];
    assert_eq!(
        info.class_bound,
        Some(Type::class(ClassSymbol::new("java/lang/Number")))
    );
    match &l.field("head").unwrap().ty {
        Type::TyVar { sym, .. } => assert_eq!(sym.name.as_str(), "T"),
        other => panic!("expected a type variable, got {other:?}"),
    }
}

#[test]
fn empty_class_path_still_binds_defaults() {
    // Without java.lang.Object bytes, defaulted supertypes still point at
    // the right symbols.
    let units = vec![unit("A.java", None, vec![class_decl("A")])];
    let bound = bind(&units, &NoClassBytes).unwrap();
    assert!(bound.diagnostics.is_empty());
    assert_eq!(
        bound.classes[&ClassSymbol::new("A")].superclass,
        Some(Type::object())
    );
}
