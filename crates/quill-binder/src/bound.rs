//! Bound class representations.
//!
//! Classes are filled in monotonically as phases run; the final
//! [`TypeBoundClass`] is shared between source and class-path origins so
//! downstream consumers never distinguish the two.

use quill_core::Name;
use quill_model::constant::{AnnoInfo, Const, Value};
use quill_model::sym::{ClassSymbol, FieldSymbol, MethodSymbol, TyVarSymbol};
use quill_model::tree::{MethDecl, TyDecl, TyKind, VarDecl};
use quill_model::ty::Type;
use std::collections::BTreeMap;

/// Where a bound class came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassOrigin {
    Source,
    ClassPath,
}

/// An annotation declaration's retention category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retention {
    Source,
    Class,
    Runtime,
}

/// A type parameter's resolved bounds.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TyVarInfo {
    /// The class bound, when the first bound is a class (or a type
    /// variable).
    pub class_bound: Option<Type>,
    pub interface_bounds: Vec<Type>,
}

/// A bound field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo<'a> {
    pub sym: FieldSymbol,
    pub ty: Type,
    pub access: u16,
    pub annotations: Vec<AnnoInfo>,
    pub decl: Option<&'a VarDecl>,
    /// The constant value, once phase V has computed it.
    pub value: Option<Value>,
}

impl FieldInfo<'_> {
    pub fn name(&self) -> &Name {
        &self.sym.name
    }
}

/// A bound formal parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamInfo {
    pub name: Name,
    pub ty: Type,
    pub annotations: Vec<AnnoInfo>,
    /// Compiler-introduced parameters (enum name/ordinal, the enclosing
    /// instance) that never appear in generic signatures.
    pub synthetic: bool,
}

/// A bound method or constructor.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodInfo<'a> {
    pub sym: MethodSymbol,
    pub typarams: Vec<TyVarSymbol>,
    pub typaram_info: BTreeMap<TyVarSymbol, TyVarInfo>,
    pub ret: Type,
    pub params: Vec<ParamInfo>,
    pub throws: Vec<Type>,
    pub access: u16,
    /// An annotation method's default, once phase V has computed it.
    pub default_value: Option<Const>,
    pub annotations: Vec<AnnoInfo>,
    pub decl: Option<&'a MethDecl>,
}

impl MethodInfo<'_> {
    pub fn name(&self) -> &Name {
        &self.sym.name
    }

    pub fn is_constructor(&self) -> bool {
        self.sym.name.as_str() == "<init>"
    }
}

/// A fully bound class.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeBoundClass<'a> {
    pub origin: ClassOrigin,
    pub sym: ClassSymbol,
    pub kind: TyKind,
    /// The enclosing class for members, `None` for top-level classes.
    pub owner: Option<ClassSymbol>,
    /// Declaration access flags (visibility as written; the lowering
    /// adjusts for the class-file and `InnerClasses` views).
    pub access: u16,
    /// Declared member classes by simple name.
    pub children: BTreeMap<Name, ClassSymbol>,
    pub typarams: Vec<TyVarSymbol>,
    pub typaram_info: BTreeMap<TyVarSymbol, TyVarInfo>,
    /// `None` only for `java/lang/Object`.
    pub superclass: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldInfo<'a>>,
    pub methods: Vec<MethodInfo<'a>>,
    pub annotations: Vec<AnnoInfo>,
    /// Populated for annotation declarations only.
    pub retention: Option<Retention>,
    /// The access flags this class carries in `InnerClasses` tables.
    /// Meaningful only for nested classes.
    pub inner_access: u16,
    pub decl: Option<&'a TyDecl>,
}

impl<'a> TypeBoundClass<'a> {
    pub fn field(&self, name: &str) -> Option<&FieldInfo<'a>> {
        self.fields.iter().find(|f| f.sym.name.as_str() == name)
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TyKind::Interface | TyKind::Annotation)
    }

    /// The symbols of the direct supertypes (superclass first).
    pub fn supertype_syms(&self) -> Vec<ClassSymbol> {
        let mut out = Vec::new();
        if let Some(Type::Class(c)) = &self.superclass {
            out.push(c.sym().clone());
        }
        for interface in &self.interfaces {
            if let Type::Class(c) = interface {
                out.push(c.sym().clone());
            }
        }
        out
    }
}
