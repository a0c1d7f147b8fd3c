//! The `quill` binary.
//!
//! Source compilation is driven by a front end that owns the parser; the
//! standalone tool covers the jar-level operations: rewriting a compiled
//! jar into a header jar (`strip`) and inspecting a class file (`dump`).
//!
//! Exit codes: 0 on success, 1 for processing errors, 2 for usage errors
//! (via clap).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use quill_classfile::{read_class, write_class, ClassFile, CodeInfo};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quill", version, about = "Header-jar tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite a jar of compiled classes into a header jar: method
    /// bodies replaced with throw stubs, debug attributes dropped.
    Strip(StripArgs),
    /// Print a decoded summary of a class file.
    Dump(DumpArgs),
}

#[derive(Args)]
struct StripArgs {
    /// Input jar.
    input: PathBuf,
    /// Output header jar.
    #[arg(long, short)]
    output: PathBuf,
    /// Target platform release (8, 11, 17, ...); defaults to keeping
    /// each class's original version.
    #[arg(long)]
    release: Option<u16>,
}

#[derive(Args)]
struct DumpArgs {
    /// A `.class` file.
    file: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Strip(args) => strip(args),
        Command::Dump(args) => dump(args),
    }
}

fn strip(args: StripArgs) -> Result<()> {
    let file = std::fs::File::open(&args.input)
        .with_context(|| format!("open {}", args.input.display()))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut classes = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_owned();
        let Some(binary_name) = name.strip_suffix(".class") else {
            continue;
        };
        if name.starts_with("META-INF/") {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        let mut classfile =
            read_class(&bytes).with_context(|| format!("decode {name}"))?;
        strip_class(&mut classfile, args.release);
        classes.insert(binary_name.to_string(), write_class(&classfile));
    }

    quill_driver::write_jar(&args.output, &classes)
        .with_context(|| format!("write {}", args.output.display()))?;
    println!("stripped {} classes -> {}", classes.len(), args.output.display());
    Ok(())
}

/// Replaces each concrete method's body with the standard stub; the
/// reader has already dropped `Code` and the other attributes a header
/// does not carry.
fn strip_class(classfile: &mut ClassFile, release: Option<u16>) {
    const ACC_STATIC: u16 = 0x0008;
    const ACC_ABSTRACT: u16 = 0x0400;
    const ACC_NATIVE: u16 = 0x0100;

    if let Some(release) = release {
        classfile.major_version = release + 44;
        classfile.minor_version = 0;
    }
    for method in &mut classfile.methods {
        if method.access & (ACC_ABSTRACT | ACC_NATIVE) != 0 {
            continue;
        }
        let max_locals = descriptor_slots(&method.descriptor)
            + u16::from(method.access & ACC_STATIC == 0);
        method.code = Some(CodeInfo { max_locals });
    }
}

/// Local-variable slots claimed by a method descriptor's parameters.
fn descriptor_slots(descriptor: &str) -> u16 {
    let bytes = descriptor.as_bytes();
    let mut slots = 0;
    let mut i = 1; // skip '('
    while i < bytes.len() && bytes[i] != b')' {
        let start = i;
        while i < bytes.len() && bytes[i] == b'[' {
            i += 1;
        }
        if bytes.get(i).copied() == Some(b'L') {
            while i < bytes.len() && bytes[i] != b';' {
                i += 1;
            }
        }
        // An array is one slot regardless of its element type.
        let wide = i == start && matches!(bytes.get(i).copied(), Some(b'J' | b'D'));
        slots += if wide { 2 } else { 1 };
        i += 1;
    }
    slots
}

fn dump(args: DumpArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let classfile = read_class(&bytes).with_context(|| format!("decode {}", args.file.display()))?;

    println!("class: {}", classfile.name);
    println!("  version: {}.{}", classfile.major_version, classfile.minor_version);
    println!("  access: 0x{:04x}", classfile.access);
    if let Some(super_name) = &classfile.super_name {
        println!("  super: {super_name}");
    }
    for interface in &classfile.interfaces {
        println!("  implements: {interface}");
    }
    if let Some(signature) = &classfile.signature {
        println!("  signature: {signature}");
    }
    for inner in &classfile.inner_classes {
        println!(
            "  inner: {} (outer {})",
            inner.inner,
            inner.outer.as_deref().unwrap_or("-")
        );
    }
    for anno in &classfile.annotations {
        println!("  annotation: {}", anno.type_descriptor);
    }
    println!("  fields: {}", classfile.fields.len());
    for field in &classfile.fields {
        println!(
            "    {} {}{}",
            field.descriptor,
            field.name,
            field
                .constant_value
                .as_ref()
                .map(|v| format!(" = {v:?}"))
                .unwrap_or_default()
        );
    }
    println!("  methods: {}", classfile.methods.len());
    for method in &classfile.methods {
        println!("    {}{}", method.name, method.descriptor);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_slots_counts_wide_and_reference_types() {
        assert_eq!(descriptor_slots("()V"), 0);
        assert_eq!(descriptor_slots("(IJ)V"), 3);
        assert_eq!(descriptor_slots("(Ljava/lang/String;D[I)V"), 4);
        assert_eq!(descriptor_slots("([[J[Ljava/lang/String;)I"), 2);
    }

    #[test]
    fn strip_stubs_concrete_methods_and_retargets_the_version() {
        let mut classfile = ClassFile {
            minor_version: 0,
            major_version: 61,
            access: 0x0021,
            name: "p/C".to_string(),
            super_name: Some("java/lang/Object".to_string()),
            ..ClassFile::default()
        };
        classfile.methods.push(quill_classfile::MethodInfo {
            access: 0x0001,
            name: "run".to_string(),
            descriptor: "(J)V".to_string(),
            signature: None,
            exceptions: Vec::new(),
            default_value: None,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            type_annotations: Vec::new(),
            code: None,
            deprecated: false,
        });
        classfile.methods.push(quill_classfile::MethodInfo {
            access: 0x0401, // abstract
            name: "gone".to_string(),
            descriptor: "()V".to_string(),
            signature: None,
            exceptions: Vec::new(),
            default_value: None,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            type_annotations: Vec::new(),
            code: None,
            deprecated: false,
        });

        strip_class(&mut classfile, Some(8));
        assert_eq!(classfile.major_version, 52);
        // this + long (2 slots)
        assert_eq!(classfile.methods[0].code, Some(CodeInfo { max_locals: 3 }));
        assert_eq!(classfile.methods[1].code, None);
    }
}
