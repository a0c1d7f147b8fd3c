//! The semantic data model shared across quill's pipeline.
//!
//! This crate holds the pieces every stage agrees on:
//! - flyweight [`sym`]bols identifying classes, members, and type variables;
//! - the [`ty`] sum describing resolved Java types;
//! - the [`constant`] sum for compile-time constant values, with
//!   platform-exact arithmetic and string conversion;
//! - the source declaration [`tree`] handed to the binder by an external
//!   parser;
//! - class-file [`flags`];
//! - the [`ClassBytes`] seam through which the binder reads compiled
//!   dependencies.
//!
//! Everything here is immutable value data; ownership never forms cycles
//! (classes refer to each other by symbol only).

pub mod constant;
pub mod flags;
pub mod sym;
pub mod tree;
pub mod ty;

pub use constant::{AnnoInfo, Const, EnumRef, Value};
pub use sym::{ClassSymbol, FieldSymbol, MethodSymbol, PackageSymbol, TyVarOwner, TyVarSymbol};
pub use ty::{ClassTy, PrimKind, SimpleClassTy, Type, WildcardBound};

use std::collections::HashMap;

/// A source of compiled classes, keyed by internal binary name
/// (`java/lang/Object`, `p/Outer$Inner`).
///
/// Implementations can be backed by jars, class directories, or in-memory
/// maps. The binder treats this as its only window onto the class path:
/// no I/O happens elsewhere.
pub trait ClassBytes {
    /// The raw class-file bytes for `binary_name`, if present.
    fn class_bytes(&self, binary_name: &str) -> Option<Vec<u8>>;

    /// Whether a class named `binary_name` exists.
    ///
    /// Kept separate from [`ClassBytes::class_bytes`] so name resolution
    /// can probe candidates without copying archive entries.
    fn has_class(&self, binary_name: &str) -> bool {
        self.class_bytes(binary_name).is_some()
    }

    /// Whether any class exists in the slash-separated `package`.
    fn has_package(&self, package: &str) -> bool;
}

impl ClassBytes for HashMap<String, Vec<u8>> {
    fn class_bytes(&self, binary_name: &str) -> Option<Vec<u8>> {
        self.get(binary_name).cloned()
    }

    fn has_class(&self, binary_name: &str) -> bool {
        self.contains_key(binary_name)
    }

    fn has_package(&self, package: &str) -> bool {
        let prefix = format!("{package}/");
        self.keys().any(|k| k.starts_with(&prefix))
    }
}

/// An always-empty class path.
pub struct NoClassBytes;

impl ClassBytes for NoClassBytes {
    fn class_bytes(&self, _binary_name: &str) -> Option<Vec<u8>> {
        None
    }

    fn has_package(&self, _package: &str) -> bool {
        false
    }
}
