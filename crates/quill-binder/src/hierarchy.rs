//! Phase III: the class hierarchy.
//!
//! Resolves each declaration's superclass and interface *names* to
//! symbols, using the phase II scopes plus declared type-parameter names,
//! then orders source classes so every supertype and enclosing class
//! precedes its dependents. Cycles are diagnosed (`CyclicHierarchy`) and
//! broken so later phases can still run.

use crate::cpenv::ClassPathEnv;
use crate::diag::{self, Diagnostic};
use crate::preprocess::{NameBound, PackagedClass};
use crate::scope::{lookup_or_diag, unit_lookup, NameIndex, UnitScope};
use crate::BinderError;
use quill_core::Name;
use quill_model::sym::ClassSymbol;
use quill_model::tree::{CompUnit, TreeTy, TyKind};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A header-bound class: supertype symbols and type-parameter names.
#[derive(Clone, Debug)]
pub struct HeaderInfo {
    pub super_sym: Option<ClassSymbol>,
    pub interface_syms: Vec<ClassSymbol>,
    pub typaram_names: Vec<Name>,
}

pub struct HierarchyBound {
    pub headers: BTreeMap<ClassSymbol, HeaderInfo>,
    /// Source classes, supertypes and enclosers first.
    pub topo: Vec<ClassSymbol>,
}

pub struct HierarchyBinder<'e, 'a, 'p> {
    units: &'a [CompUnit],
    names: &'e NameBound<'a>,
    scopes: &'e [UnitScope],
    classpath: &'e ClassPathEnv<'p>,
    headers: RefCell<BTreeMap<ClassSymbol, HeaderInfo>>,
    in_progress: RefCell<BTreeSet<ClassSymbol>>,
    diags: RefCell<Vec<Diagnostic>>,
    error: RefCell<Option<BinderError>>,
}

impl<'e, 'a, 'p> HierarchyBinder<'e, 'a, 'p> {
    pub fn new(
        units: &'a [CompUnit],
        names: &'e NameBound<'a>,
        scopes: &'e [UnitScope],
        classpath: &'e ClassPathEnv<'p>,
    ) -> Self {
        Self {
            units,
            names,
            scopes,
            classpath,
            headers: RefCell::new(BTreeMap::new()),
            in_progress: RefCell::new(BTreeSet::new()),
            diags: RefCell::new(Vec::new()),
            error: RefCell::new(None),
        }
    }

    pub fn bind(self, diags: &mut Vec<Diagnostic>) -> Result<HierarchyBound, BinderError> {
        for sym in self.names.classes.keys() {
            self.header(sym);
        }
        if let Some(error) = self.error.into_inner() {
            return Err(error);
        }
        let headers = self.headers.into_inner();
        let mut local_diags = self.diags.into_inner();

        // A class may not be its own ancestor.
        let index = NameIndex {
            names: self.names,
            classpath: self.classpath,
        };
        for (sym, _) in self.names.classes.iter() {
            if ancestor_cycle(sym, &headers, &index) {
                let pc = &self.names.classes[sym];
                local_diags.push(diag::cyclic_hierarchy(
                    &self.units[pc.unit],
                    pc.decl.span,
                    pc.decl.name.as_str(),
                ));
            }
        }

        diags.append(&mut local_diags);
        let topo = topo_order(self.names, &headers);
        debug!(classes = topo.len(), "hierarchy bound");
        Ok(HierarchyBound { headers, topo })
    }

    /// Ensures `sym`'s header is bound; recursion through member-type
    /// lookup is cut off by the in-progress set.
    fn header(&self, sym: &ClassSymbol) {
        if self.headers.borrow().contains_key(sym) {
            return;
        }
        if !self.in_progress.borrow_mut().insert(sym.clone()) {
            return;
        }
        let pc = &self.names.classes[sym];
        let unit = &self.units[pc.unit];
        let scope = &self.scopes[pc.unit];

        let typaram_names: Vec<Name> = pc.decl.typarams.iter().map(|tp| tp.name.clone()).collect();

        let super_sym = match (&pc.decl.extends, pc.kind) {
            (Some(tree), TyKind::Class) => Some(self.resolve_ref(pc, unit, scope, tree)),
            (_, TyKind::Class) => Some(ClassSymbol::object()),
            (_, TyKind::Enum) => Some(ClassSymbol::enum_()),
            (_, TyKind::Interface | TyKind::Annotation) => Some(ClassSymbol::object()),
        };

        let mut interface_syms: Vec<ClassSymbol> = pc
            .decl
            .implements
            .iter()
            .map(|tree| self.resolve_ref(pc, unit, scope, tree))
            .collect();
        if pc.kind == TyKind::Annotation {
            interface_syms.push(ClassSymbol::annotation());
        }

        self.in_progress.borrow_mut().remove(sym);
        self.headers.borrow_mut().insert(
            sym.clone(),
            HeaderInfo {
                super_sym,
                interface_syms,
                typaram_names,
            },
        );
    }

    /// Resolves a supertype reference to a symbol. Only head names are
    /// resolved here; type arguments wait for phase IV.
    fn resolve_ref(
        &self,
        pc: &PackagedClass<'a>,
        unit: &CompUnit,
        scope: &UnitScope,
        tree: &TreeTy,
    ) -> ClassSymbol {
        let TreeTy::Class(segments) = tree else {
            self.diags.borrow_mut().push(diag::symbol_not_found(
                unit,
                tree.span(),
                "<not a class type>",
            ));
            return ClassSymbol::error();
        };
        let head = &segments[0];

        let mut resolved = None;

        // The enclosing-class chain: type parameters shadow types, then
        // own and inherited member classes.
        let mut enclosing = Some(pc.sym.clone());
        while let Some(current) = enclosing {
            let current_pc = &self.names.classes[&current];
            if current_pc
                .decl
                .typarams
                .iter()
                .any(|tp| tp.name == head.name)
            {
                self.diags.borrow_mut().push(diag::symbol_not_found(
                    unit,
                    head.span,
                    &format!("type parameter `{}` is not a class here", head.name),
                ));
                return ClassSymbol::error();
            }
            if let Some(found) = self.member_type(&current, head.name.as_str()) {
                resolved = Some(found);
                break;
            }
            enclosing = current_pc.owner.clone();
        }

        let index = NameIndex {
            names: self.names,
            classpath: self.classpath,
        };
        let mut resolved = match resolved {
            Some(sym) => sym,
            None => {
                let simple = unit_lookup(scope, &index, head.name.as_str());
                match simple {
                    crate::scope::Lookup::NotFound if segments.len() > 1 => {
                        // Fully qualified: leading segments name packages.
                        let names: Vec<Name> =
                            segments.iter().map(|s| s.name.clone()).collect();
                        match index.resolve_canonical(&names) {
                            Some(sym) => return sym,
                            None => {
                                self.diags.borrow_mut().push(diag::symbol_not_found(
                                    unit,
                                    head.span,
                                    &dotted(segments),
                                ));
                                return ClassSymbol::error();
                            }
                        }
                    }
                    other => {
                        let mut diags = self.diags.borrow_mut();
                        lookup_or_diag(other, unit, head.span, head.name.as_str(), &mut diags)
                    }
                }
            }
        };
        if resolved.is_error() {
            return resolved;
        }

        // Remaining segments are member classes.
        for segment in &segments[1..] {
            match self.member_type(&resolved, segment.name.as_str()) {
                Some(member) => resolved = member,
                None => {
                    self.diags.borrow_mut().push(diag::symbol_not_found(
                        unit,
                        segment.span,
                        segment.name.as_str(),
                    ));
                    return ClassSymbol::error();
                }
            }
        }
        resolved
    }

    /// Member class `name` in `start` or its supertypes.
    fn member_type(&self, start: &ClassSymbol, name: &str) -> Option<ClassSymbol> {
        let mut queue = vec![start.clone()];
        let mut seen = BTreeSet::new();
        while let Some(sym) = queue.pop() {
            if !seen.insert(sym.clone()) {
                continue;
            }
            if let Some(pc) = self.names.classes.get(&sym) {
                if let Some(member) = pc.children.get(name) {
                    return Some(member.clone());
                }
                // Inherited members need this class's header; skip the
                // supertypes of a class currently being bound.
                self.header(&sym);
                if let Some(header) = self.headers.borrow().get(&sym) {
                    queue.extend(header.super_sym.iter().cloned());
                    queue.extend(header.interface_syms.iter().cloned());
                }
            } else {
                match self.classpath.bind(&sym) {
                    Ok(Some(class)) => {
                        if let Some(member) = class.children.get(name) {
                            return Some(member.clone());
                        }
                        queue.extend(class.supertype_syms());
                    }
                    Ok(None) => {}
                    Err(error) => {
                        self.error.borrow_mut().get_or_insert(error);
                    }
                }
            }
        }
        None
    }
}

fn dotted(segments: &[quill_model::tree::ClassTySeg]) -> String {
    segments
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Whether `sym` appears in its own transitive supertype set.
fn ancestor_cycle(
    sym: &ClassSymbol,
    headers: &BTreeMap<ClassSymbol, HeaderInfo>,
    index: &NameIndex<'_, '_, '_>,
) -> bool {
    let mut queue: Vec<ClassSymbol> = direct_supers(sym, headers, index);
    let mut seen = BTreeSet::new();
    while let Some(current) = queue.pop() {
        if &current == sym {
            return true;
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        queue.extend(direct_supers(&current, headers, index));
    }
    false
}

fn direct_supers(
    sym: &ClassSymbol,
    headers: &BTreeMap<ClassSymbol, HeaderInfo>,
    index: &NameIndex<'_, '_, '_>,
) -> Vec<ClassSymbol> {
    if let Some(header) = headers.get(sym) {
        let mut out = Vec::new();
        out.extend(header.super_sym.iter().cloned());
        out.extend(header.interface_syms.iter().cloned());
        return out;
    }
    match index.classpath.bind(sym) {
        Ok(Some(class)) => class.supertype_syms(),
        _ => Vec::new(),
    }
}

/// Kahn's algorithm over source classes; dependency edges run from
/// supertypes and enclosing classes to their dependents. Ready classes
/// are taken in symbol order, so the result is deterministic. Classes on
/// diagnosed cycles are appended at the end in symbol order.
fn topo_order(
    names: &NameBound<'_>,
    headers: &BTreeMap<ClassSymbol, HeaderInfo>,
) -> Vec<ClassSymbol> {
    let mut indegree: BTreeMap<&ClassSymbol, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&ClassSymbol, Vec<&ClassSymbol>> = BTreeMap::new();

    for (sym, pc) in &names.classes {
        let mut degree = 0;
        let mut deps: Vec<ClassSymbol> = Vec::new();
        if let Some(header) = headers.get(sym) {
            deps.extend(header.super_sym.iter().cloned());
            deps.extend(header.interface_syms.iter().cloned());
        }
        deps.extend(pc.owner.iter().cloned());
        for dep in deps {
            if let Some((dep_key, _)) = names.classes.get_key_value(&dep) {
                if dep_key != sym {
                    degree += 1;
                    dependents.entry(dep_key).or_default().push(sym);
                }
            }
        }
        indegree.insert(sym, degree);
    }

    let mut ready: BTreeSet<&ClassSymbol> = indegree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&s, _)| s)
        .collect();
    let mut order = Vec::with_capacity(names.classes.len());
    while let Some(&sym) = ready.iter().next() {
        ready.remove(sym);
        order.push(sym.clone());
        for &dependent in dependents.get(sym).into_iter().flatten() {
            let degree = indegree.get_mut(dependent).expect("known class");
            *degree -= 1;
            if *degree == 0 {
                ready.insert(dependent);
            }
        }
    }
    if order.len() < names.classes.len() {
        for sym in names.classes.keys() {
            if !order.contains(sym) {
                order.push(sym.clone());
            }
        }
    }
    order
}
