//! Phase II: imports and package scopes.
//!
//! Builds one [`UnitScope`] per compilation unit. Single-type imports are
//! resolved eagerly to canonical symbols; on-demand imports are kept as
//! prefixes and consulted lazily at lookup time, which is when ambiguity
//! between two on-demand contributions is detected and reported.

use crate::cpenv::ClassPathEnv;
use crate::diag::{self, Diagnostic};
use crate::preprocess::NameBound;
use crate::BinderError;
use quill_core::{Name, Span};
use quill_model::sym::{ClassSymbol, PackageSymbol};
use quill_model::tree::CompUnit;
use std::collections::BTreeMap;
use tracing::debug;

/// The per-unit lookup scope: everything outside the enclosing-class
/// chain.
pub struct UnitScope {
    pub package: PackageSymbol,
    /// Single-type imports by simple name.
    pub singles: BTreeMap<Name, ClassSymbol>,
    /// On-demand prefixes: `a/b/` for packages, `a/b/Outer$` for member
    /// imports. A simple name appended to the prefix forms a candidate
    /// binary name.
    pub on_demand: Vec<String>,
    /// `import static a.b.C.F` — the owning class by member name.
    pub static_singles: BTreeMap<Name, ClassSymbol>,
    /// `import static a.b.C.*` — owning classes to search.
    pub static_on_demand: Vec<ClassSymbol>,
}

/// Outcome of a simple-name lookup.
pub enum Lookup {
    Found(ClassSymbol),
    Ambiguous(Vec<ClassSymbol>),
    NotFound,
}

/// Source and class-path existence, combined.
pub struct NameIndex<'e, 'a, 'p> {
    pub names: &'e NameBound<'a>,
    pub classpath: &'e ClassPathEnv<'p>,
}

impl NameIndex<'_, '_, '_> {
    pub fn class_exists(&self, binary: &str) -> bool {
        self.names.classes.contains_key(binary) || self.classpath.has_class(binary)
    }

    /// Resolves a canonical dotted name to a class: the shortest prefix
    /// naming a top-level class wins, the rest must be member classes.
    pub fn resolve_canonical(&self, segments: &[Name]) -> Option<ClassSymbol> {
        let mut package = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let candidate = if package.is_empty() {
                segment.as_str().to_string()
            } else {
                format!("{package}/{segment}")
            };
            if self.class_exists(&candidate) {
                // Remaining segments descend through member classes.
                let mut binary = candidate;
                for member in &segments[i + 1..] {
                    binary.push('$');
                    binary.push_str(member.as_str());
                    if !self.class_exists(&binary) {
                        return None;
                    }
                }
                return Some(ClassSymbol::new(binary));
            }
            package = if package.is_empty() {
                segment.as_str().to_string()
            } else {
                format!("{package}/{segment}")
            };
        }
        None
    }
}

pub fn bind_imports(
    units: &[CompUnit],
    names: &NameBound<'_>,
    classpath: &ClassPathEnv<'_>,
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<UnitScope>, BinderError> {
    let index = NameIndex { names, classpath };
    let mut scopes = Vec::with_capacity(units.len());
    for unit in units {
        scopes.push(bind_unit(unit, &index, diags));
    }
    debug!(units = scopes.len(), "import scopes built");
    Ok(scopes)
}

fn bind_unit(unit: &CompUnit, index: &NameIndex<'_, '_, '_>, diags: &mut Vec<Diagnostic>) -> UnitScope {
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

    let mut scope = UnitScope {
        package,
        singles: BTreeMap::new(),
        on_demand: Vec::new(),
        static_singles: BTreeMap::new(),
        static_on_demand: Vec::new(),
    };

    for import in &unit.imports {
        let dotted = import
            .path
            .iter()
            .map(Name::as_str)
            .collect::<Vec<_>>()
            .join(".");
        match (import.is_static, import.wildcard) {
            (false, false) => match index.resolve_canonical(&import.path) {
                Some(sym) => {
                    let simple = import.path.last().expect("non-empty import").clone();
                    scope.singles.insert(simple, sym);
                }
                None => diags.push(diag::symbol_not_found(unit, import.span, &dotted)),
            },
            (false, true) => {
                // `import a.b.*` — a.b may be a package or a class whose
                // members are imported.
                if let Some(sym) = index.resolve_canonical(&import.path) {
                    scope.on_demand.push(format!("{}$", sym.binary_name()));
                } else {
                    let slashed = import
                        .path
                        .iter()
                        .map(Name::as_str)
                        .collect::<Vec<_>>()
                        .join("/");
                    scope.on_demand.push(format!("{slashed}/"));
                }
            }
            (true, false) => {
                // `import static a.b.C.F` — everything but the last
                // segment names the owning class.
                let (member, owner_path) = import.path.split_last().expect("non-empty import");
                match index.resolve_canonical(owner_path) {
                    Some(owner) => {
                        scope.static_singles.insert(member.clone(), owner);
                    }
                    None => diags.push(diag::symbol_not_found(unit, import.span, &dotted)),
                }
            }
            (true, true) => match index.resolve_canonical(&import.path) {
                Some(owner) => scope.static_on_demand.push(owner),
                None => diags.push(diag::symbol_not_found(unit, import.span, &dotted)),
            },
        }
    }
    scope
}

/// Simple-name lookup through a unit scope, in resolution order:
/// single-type imports, the unit's package, on-demand imports, then the
/// implicit `java.lang`.
pub fn unit_lookup(scope: &UnitScope, index: &NameIndex<'_, '_, '_>, name: &str) -> Lookup {
    if let Some(sym) = scope.singles.get(name) {
        return Lookup::Found(sym.clone());
    }

    let pkg = scope.package.slashed();
    if let Some(sym) = index.names.top_level(&pkg, name) {
        return Lookup::Found(sym.clone());
    }
    let in_pkg = if pkg.is_empty() {
        name.to_string()
    } else {
        format!("{pkg}/{name}")
    };
    if index.classpath.has_class(&in_pkg) {
        return Lookup::Found(ClassSymbol::new(in_pkg));
    }

    let mut matches: Vec<ClassSymbol> = Vec::new();
    for prefix in &scope.on_demand {
        let candidate = format!("{prefix}{name}");
        if index.class_exists(&candidate) {
            let sym = ClassSymbol::new(candidate);
            if !matches.contains(&sym) {
                matches.push(sym);
            }
        }
    }
    match matches.len() {
        0 => {}
        1 => return Lookup::Found(matches.remove(0)),
        _ => return Lookup::Ambiguous(matches),
    }

    let lang = format!("java/lang/{name}");
    if index.class_exists(&lang) {
        return Lookup::Found(ClassSymbol::new(lang));
    }
    Lookup::NotFound
}

/// Reports a lookup failure with the right diagnostic and substitutes the
/// sentinel.
pub fn lookup_or_diag(
    result: Lookup,
    unit: &CompUnit,
    span: Span,
    name: &str,
    diags: &mut Vec<Diagnostic>,
) -> ClassSymbol {
    match result {
        Lookup::Found(sym) => sym,
        Lookup::Ambiguous(candidates) => {
            let shown: Vec<String> = candidates
                .iter()
                .map(|c| c.binary_name().replace('/', ".").replace('$', "."))
                .collect();
            diags.push(diag::ambiguous_name(unit, span, name, &shown));
            ClassSymbol::error()
        }
        Lookup::NotFound => {
            diags.push(diag::symbol_not_found(unit, span, name));
            ClassSymbol::error()
        }
    }
}
