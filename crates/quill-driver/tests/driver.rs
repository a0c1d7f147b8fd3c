//! End-to-end driver tests: compile, write, and read back archives.

use pretty_assertions::assert_eq;
use quill_classfile::read_class;
use quill_classpath::ClassPathIndex;
use quill_driver::{compile, write_jar, CompileError, EmitOptions};
use quill_model::flags::Mods;
use quill_model::tree::{TreeTy, TyMember};
use quill_testing::platform;
use quill_testing::tree::*;
use std::io::{Read, Write};

#[test]
fn compiles_a_unit_to_class_bytes() {
    let jdk = platform::jdk();
    let units = vec![unit("A.java", Some("p"), vec![class_decl("A")])];
    let classes = compile(&units, &jdk, &EmitOptions::default()).unwrap();

    assert_eq!(classes.len(), 1);
    let a = read_class(&classes["p/A"]).unwrap();
    assert_eq!(a.name, "p/A");
    assert_eq!(a.major_version, 52);
    assert_eq!(a.super_name.as_deref(), Some("java/lang/Object"));
}

#[test]
fn repeated_runs_produce_identical_bytes() {
    let jdk = platform::jdk();
    let units = vec![
        unit(
            "E.java",
            Some("p"),
            vec![enum_decl("Flavor", &["SWEET", "SOUR"])],
        ),
        unit("A.java", Some("p"), vec![class_decl("A")]),
    ];
    let first = compile(&units, &jdk, &EmitOptions::default()).unwrap();
    let second = compile(&units, &jdk, &EmitOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn diagnostics_suppress_all_output() {
    let jdk = platform::jdk();
    let mut a = class_decl("A");
    a.extends = Some(TreeTy::name(&["B"]));
    let mut b = class_decl("B");
    b.extends = Some(TreeTy::name(&["A"]));
    let units = vec![unit("AB.java", Some("p"), vec![a, b])];

    match compile(&units, &jdk, &EmitOptions::default()) {
        Err(CompileError::Diagnostics(diags)) => {
            assert!(diags
                .iter()
                .all(|d| d.kind == quill_binder::DiagKind::CyclicHierarchy));
            assert_eq!(diags.len(), 2);
        }
        other => panic!("expected diagnostics, got {:?}", other.map(|m| m.len())),
    }
}

#[test]
fn jars_are_deterministic_and_sorted() {
    let jdk = platform::jdk();
    let units = vec![
        unit("B.java", Some("p"), vec![class_decl("B")]),
        unit("A.java", Some("p"), vec![class_decl("A")]),
    ];
    let classes = compile(&units, &jdk, &EmitOptions::default()).unwrap();

    let tmp = tempfile::TempDir::new().unwrap();
    let first_path = tmp.path().join("first.jar");
    let second_path = tmp.path().join("second.jar");
    write_jar(&first_path, &classes).unwrap();
    write_jar(&second_path, &classes).unwrap();

    let first = std::fs::read(&first_path).unwrap();
    let second = std::fs::read(&second_path).unwrap();
    assert_eq!(first, second);

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&first_path).unwrap()).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["p/A.class", "p/B.class"]);
}

#[test]
fn release_option_sets_the_major_version() {
    let jdk = platform::jdk();
    let units = vec![unit("A.java", Some("p"), vec![class_decl("A")])];
    let classes = compile(&units, &jdk, &EmitOptions::for_release(11)).unwrap();
    let a = read_class(&classes["p/A"]).unwrap();
    assert_eq!(a.major_version, 55);
}

#[test]
fn binds_against_a_jar_class_path() {
    // Assemble a class path jar holding the stub platform plus a
    // dependency, produced by our own writer.
    let tmp = tempfile::TempDir::new().unwrap();
    let jar_path = tmp.path().join("deps.jar");
    {
        let file = std::fs::File::create(&jar_path).unwrap();
        let mut jar = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in platform::jdk() {
            jar.start_file(format!("{name}.class"), options).unwrap();
            jar.write_all(&bytes).unwrap();
        }
        let dep = quill_classfile::ClassFile {
            minor_version: 0,
            major_version: 52,
            access: 0x0021,
            name: "dep/Base".to_string(),
            super_name: Some("java/lang/Object".to_string()),
            ..Default::default()
        };
        jar.start_file("dep/Base.class", options).unwrap();
        jar.write_all(&quill_classfile::write_class(&dep)).unwrap();
        jar.finish().unwrap();
    }
    let classpath = ClassPathIndex::open(&[], &[jar_path]).unwrap();

    let mut c = class_decl("C");
    c.extends = Some(TreeTy::name(&["dep", "Base"]));
    let units = vec![unit("C.java", Some("p"), vec![c])];
    let classes = compile(&units, &classpath, &EmitOptions::default()).unwrap();

    let c = read_class(&classes["p/C"]).unwrap();
    assert_eq!(c.super_name.as_deref(), Some("dep/Base"));
}

#[test]
fn emitted_generics_decode_back_to_the_same_types() {
    // Compile a generic class, then bind a fresh program against the
    // emitted bytes: the class-path reader must reconstruct the same
    // model types the source binder produced.
    let jdk = platform::jdk();
    let mut l = class_decl("L");
    l.typarams = vec![typaram("T", vec![TreeTy::name(&["Number"])])];
    l.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["T"]),
        "head",
    ))];
    let units = vec![unit("L.java", Some("p"), vec![l])];

    let bound = quill_binder::bind(&units, &jdk).unwrap();
    let source_class = bound.classes[&quill_model::sym::ClassSymbol::new("p/L")].clone();

    let mut classpath = platform::jdk();
    classpath.extend(compile(&units, &jdk, &EmitOptions::default()).unwrap());

    let consumer = vec![unit("U.java", Some("q"), vec![class_decl("U")])];
    let rebound = quill_binder::bind(&consumer, &classpath).unwrap();
    let env = rebound.env();
    let from_bytes = env
        .get(&quill_model::sym::ClassSymbol::new("p/L"))
        .unwrap()
        .expect("p/L on the class path");
    let from_bytes = from_bytes.get();

    assert_eq!(from_bytes.typarams, source_class.typarams);
    assert_eq!(from_bytes.typaram_info, source_class.typaram_info);
    assert_eq!(
        from_bytes.field("head").unwrap().ty,
        source_class.field("head").unwrap().ty
    );
    assert_eq!(from_bytes.superclass, source_class.superclass);
}

#[test]
fn generic_members_survive_a_round_trip_through_the_jar() {
    let jdk = platform::jdk();
    let mut l = class_decl("L");
    l.typarams = vec![typaram("T", vec![TreeTy::name(&["Number"])])];
    l.members = vec![TyMember::Field(field(
        Mods::NONE,
        TreeTy::name(&["T"]),
        "head",
    ))];
    let units = vec![unit("L.java", Some("p"), vec![l])];
    let classes = compile(&units, &jdk, &EmitOptions::default()).unwrap();

    let tmp = tempfile::TempDir::new().unwrap();
    let jar_path = tmp.path().join("out.jar");
    write_jar(&jar_path, &classes).unwrap();

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&jar_path).unwrap()).unwrap();
    let mut bytes = Vec::new();
    archive
        .by_name("p/L.class")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    let l = read_class(&bytes).unwrap();
    assert_eq!(
        l.signature.as_deref(),
        Some("<T:Ljava/lang/Number;>Ljava/lang/Object;")
    );
    assert_eq!(l.fields[0].descriptor, "Ljava/lang/Number;");
}
