//! Process-level tests of the `quill` binary.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use quill_classfile::{read_class, write_class, ClassFile, CodeInfo, ConstValue, FieldInfo, MethodInfo};
use std::io::{Read, Write};
use std::path::Path;

fn quill() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("quill"))
}

/// A compiled-looking class: a constant field plus a concrete method
/// with a body.
fn sample_class() -> ClassFile {
    ClassFile {
        minor_version: 0,
        major_version: 61,
        access: 0x0021,
        name: "p/Full".to_string(),
        super_name: Some("java/lang/Object".to_string()),
        fields: vec![FieldInfo {
            access: 0x0019,
            name: "N".to_string(),
            descriptor: "I".to_string(),
            signature: None,
            constant_value: Some(ConstValue::Int(7)),
            annotations: Vec::new(),
            type_annotations: Vec::new(),
            deprecated: false,
        }],
        methods: vec![MethodInfo {
            access: 0x0001,
            name: "run".to_string(),
            descriptor: "(J)V".to_string(),
            signature: None,
            exceptions: Vec::new(),
            default_value: None,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            type_annotations: Vec::new(),
            code: Some(CodeInfo { max_locals: 3 }),
            deprecated: false,
        }],
        ..ClassFile::default()
    }
}

fn write_full_jar(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let mut jar = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    jar.start_file("META-INF/MANIFEST.MF", options).unwrap();
    jar.write_all(b"Manifest-Version: 1.0\n").unwrap();
    jar.start_file("p/Full.class", options).unwrap();
    jar.write_all(&write_class(&sample_class())).unwrap();
    jar.finish().unwrap();
}

#[test]
fn help_mentions_core_commands() {
    quill().arg("--help").assert().success().stdout(
        predicate::str::contains("strip").and(predicate::str::contains("dump")),
    );
}

#[test]
fn strip_rewrites_a_jar_into_a_header_jar() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("full.jar");
    write_full_jar(input.path());
    let output = temp.child("headers.jar");

    quill()
        .arg("strip")
        .arg(input.path())
        .arg("--output")
        .arg(output.path())
        .arg("--release")
        .arg("8")
        .assert()
        .success()
        .stdout(predicate::str::contains("stripped 1 classes"));

    let mut archive = zip::ZipArchive::new(std::fs::File::open(output.path()).unwrap()).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    // The manifest is dropped; only class entries survive.
    assert_eq!(names, vec!["p/Full.class".to_string()]);

    let mut bytes = Vec::new();
    archive
        .by_name("p/Full.class")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    let stripped = read_class(&bytes).unwrap();
    assert_eq!(stripped.name, "p/Full");
    assert_eq!(stripped.major_version, 52);
    assert_eq!(stripped.fields[0].constant_value, Some(ConstValue::Int(7)));
    assert_eq!(stripped.methods[0].name, "run");
}

#[test]
fn dump_prints_a_class_summary() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("Full.class");
    file.write_binary(&write_class(&sample_class())).unwrap();

    quill().arg("dump").arg(file.path()).assert().success().stdout(
        predicate::str::contains("class: p/Full")
            .and(predicate::str::contains("super: java/lang/Object"))
            .and(predicate::str::contains("run(J)V"))
            .and(predicate::str::contains("I N")),
    );
}

#[test]
fn dump_reports_missing_input_with_exit_one() {
    let temp = TempDir::new().unwrap();
    quill()
        .arg("dump")
        .arg(temp.child("nope.class").path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.class"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    quill().assert().code(2);
}
