//! Phase I: canonical naming.
//!
//! Walks every compilation unit, assigns a [`ClassSymbol`] to each type
//! declaration (nested included), and indexes top-level declarations by
//! package. Name collisions — top-level per package, members per
//! enclosing class — produce `DuplicateType` and the colliding
//! declaration is dropped.

use crate::diag::{self, Diagnostic};
use quill_core::Name;
use quill_model::sym::{ClassSymbol, PackageSymbol};
use quill_model::tree::{CompUnit, TyDecl, TyKind, TyMember};
use std::collections::BTreeMap;
use tracing::debug;

/// One named type declaration.
pub struct PackagedClass<'a> {
    pub sym: ClassSymbol,
    pub owner: Option<ClassSymbol>,
    pub kind: TyKind,
    pub package: PackageSymbol,
    /// Index of the unit this declaration came from.
    pub unit: usize,
    pub decl: &'a TyDecl,
    /// Member classes by simple name.
    pub children: BTreeMap<Name, ClassSymbol>,
}

/// The source-wide name index built by phase I.
pub struct NameBound<'a> {
    pub classes: BTreeMap<ClassSymbol, PackagedClass<'a>>,
    /// Top-level declarations: slashed package → simple name → symbol.
    pub tli: BTreeMap<String, BTreeMap<Name, ClassSymbol>>,
}

impl NameBound<'_> {
    pub fn top_level(&self, slashed_package: &str, name: &str) -> Option<&ClassSymbol> {
        self.tli.get(slashed_package)?.get(name)
    }
}

pub fn preprocess<'a>(units: &'a [CompUnit], diags: &mut Vec<Diagnostic>) -> NameBound<'a> {
    let mut bound = NameBound {
        classes: BTreeMap::new(),
        tli: BTreeMap::new(),
    };
    for (unit_index, unit) in units.iter().enumerate() {
        let package = match &unit.pkg {
            Some(pkg) => PackageSymbol::new(
                pkg.name
                    .iter()
                    .map(Name::as_str)
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            None => PackageSymbol::new(""),
        };
        let pkg_entry = bound.tli.entry(package.slashed()).or_default();
        let mut accepted = Vec::new();
        for decl in &unit.decls {
            let sym = package.class(decl.name.as_str());
            match pkg_entry.entry(decl.name.clone()) {
                std::collections::btree_map::Entry::Occupied(_) => {
                    diags.push(diag::duplicate_type(unit, decl.span, decl.name.as_str()));
                    continue;
                }
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(sym.clone());
                }
            }
            accepted.push((sym, decl));
        }
        for (sym, decl) in accepted {
            insert_decl(
                &mut bound.classes,
                unit,
                unit_index,
                &package,
                sym,
                None,
                decl,
                diags,
            );
        }
    }
    debug!(classes = bound.classes.len(), "canonical naming complete");
    bound
}

#[allow(clippy::too_many_arguments)]
fn insert_decl<'a>(
    classes: &mut BTreeMap<ClassSymbol, PackagedClass<'a>>,
    unit: &'a CompUnit,
    unit_index: usize,
    package: &PackageSymbol,
    sym: ClassSymbol,
    owner: Option<ClassSymbol>,
    decl: &'a TyDecl,
    diags: &mut Vec<Diagnostic>,
) {
    let mut children = BTreeMap::new();
    let mut nested = Vec::new();
    for member in &decl.members {
        let TyMember::Ty(member_decl) = member else {
            continue;
        };
        let member_sym = sym.member(member_decl.name.as_str());
        if children
            .insert(member_decl.name.clone(), member_sym.clone())
            .is_some()
        {
            diags.push(diag::duplicate_type(
                unit,
                member_decl.span,
                member_decl.name.as_str(),
            ));
            continue;
        }
        nested.push((member_sym, member_decl));
    }

    classes.insert(
        sym.clone(),
        PackagedClass {
            sym: sym.clone(),
            owner,
            kind: decl.kind,
            package: package.clone(),
            unit: unit_index,
            decl,
            children,
        },
    );

    for (member_sym, member_decl) in nested {
        insert_decl(
            classes,
            unit,
            unit_index,
            package,
            member_sym,
            Some(sym.clone()),
            member_decl,
            diags,
        );
    }
}
