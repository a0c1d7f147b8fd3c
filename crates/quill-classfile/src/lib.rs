//! Class-file structures and binary codecs.
//!
//! The abstract [`ClassFile`] record sits between the pipeline and the
//! binary format: the reader decodes bytes into it, the writer encodes it
//! back. The same record type serves both directions so header-stripping
//! and round-trip tests compose from the same parts.
//!
//! The [`sig`] module models the descriptor and signature grammars as
//! typed values with a parser and a writer for each.

mod bytes;
mod classfile;
mod error;
mod mutf8;
mod pool;
mod reader;
pub mod sig;
mod writer;

pub use classfile::{
    AnnotationInfo, ClassFile, CodeInfo, ConstValue, ElementValue, FieldInfo, InnerClass,
    MethodInfo, TargetInfo, TypeAnnotationInfo, TypePathStep,
};
pub use error::{Error, Result};
pub use mutf8::{decode_modified_utf8, encode_modified_utf8};
pub use pool::ConstantPool;
pub use reader::read_class;
pub use sig::{
    parse_class_signature, parse_method_descriptor, parse_method_signature, parse_type_signature,
    write_class_signature, write_method_signature, write_type_signature, BaseType, ClassSig,
    ClassTySig, MethodSig, SimpleClassTySig, TyArgSig, TyParamSig, TySig,
};
pub use writer::write_class;

/// The default class-file version emitted by quill (Java 8).
pub const DEFAULT_MAJOR_VERSION: u16 = 52;
pub const DEFAULT_MINOR_VERSION: u16 = 0;
