//! Phase IV: type resolution.
//!
//! Binds, per class in hierarchy order: type-parameter bounds, field and
//! method signatures, thrown types, and annotation uses. The member scope
//! layers method type parameters over class type parameters (cut off at
//! static boundaries) over own-and-inherited member classes over the
//! enclosing chain over the unit scope. Mandated members missing from
//! source — default constructors, enum `values`/`valueOf`/`$VALUES`, the
//! enum constructor's name/ordinal parameters, the inner-class enclosing
//! instance — are synthesized here so later stages see one shape.

use crate::bound::{ClassOrigin, FieldInfo, MethodInfo, ParamInfo, TyVarInfo, TypeBoundClass};
use crate::cpenv::{ClassEnv, ClassPathEnv};
use crate::diag::{self, Diagnostic};
use crate::hierarchy::{HeaderInfo, HierarchyBound};
use crate::preprocess::{NameBound, PackagedClass};
use crate::scope::{unit_lookup, Lookup, NameIndex, UnitScope};
use crate::BinderError;
use quill_core::Name;
use quill_model::constant::AnnoInfo;
use quill_model::flags::{access::*, Mods};
use quill_model::sym::{ClassSymbol, FieldSymbol, MethodSymbol, TyVarSymbol};
use quill_model::tree::{
    Anno, ClassTySeg, CompUnit, MethDecl, TreeTy, TyDecl, TyKind, TyMember, VarDecl, WildTreeBound,
};
use quill_model::ty::{ClassTy, SimpleClassTy, Type, WildcardBound};
use std::collections::BTreeMap;
use tracing::debug;

pub fn bind_types<'a>(
    units: &'a [CompUnit],
    names: &NameBound<'a>,
    scopes: &[UnitScope],
    hierarchy: &HierarchyBound,
    classpath: &ClassPathEnv<'_>,
    diags: &mut Vec<Diagnostic>,
) -> Result<BTreeMap<ClassSymbol, TypeBoundClass<'a>>, BinderError> {
    let mut done: BTreeMap<ClassSymbol, TypeBoundClass<'a>> = BTreeMap::new();
    for sym in &hierarchy.topo {
        let pc = &names.classes[sym];
        let binder = ClassBinder::new(units, names, scopes, hierarchy, classpath, &done, pc);
        let (class, mut local_diags, fatal) = binder.bind(pc);
        diags.append(&mut local_diags);
        if let Some(error) = fatal {
            return Err(error);
        }
        done.insert(sym.clone(), class);
    }
    debug!(classes = done.len(), "types bound");
    Ok(done)
}

/// One level of the enclosing-class chain.
struct ScopeLevel {
    sym: ClassSymbol,
    /// Type variables visible at this level; empty past a static boundary.
    tyvars: Vec<(Name, TyVarSymbol)>,
}

pub(crate) enum SimpleRes {
    TyVar(TyVarSymbol),
    Class(ClassSymbol),
    Ambiguous(Vec<ClassSymbol>),
    NotFound,
}

pub(crate) struct ClassBinder<'e, 'a, 'p> {
    names: &'e NameBound<'a>,
    pub(crate) unit: &'a CompUnit,
    pub(crate) unit_scope: &'e UnitScope,
    pub(crate) env: ClassEnv<'e, 'a, 'p>,
    pub(crate) index: NameIndex<'e, 'a, 'p>,
    headers: &'e BTreeMap<ClassSymbol, HeaderInfo>,
    sym: ClassSymbol,
    chain: Vec<ScopeLevel>,
    method_tyvars: Vec<(Name, TyVarSymbol)>,
    diags: Vec<Diagnostic>,
    fatal: Option<BinderError>,
}

impl<'e, 'a, 'p> ClassBinder<'e, 'a, 'p> {
    pub(crate) fn new(
        units: &'a [CompUnit],
        names: &'e NameBound<'a>,
        scopes: &'e [UnitScope],
        hierarchy: &'e HierarchyBound,
        classpath: &'e ClassPathEnv<'p>,
        done: &'e BTreeMap<ClassSymbol, TypeBoundClass<'a>>,
        pc: &PackagedClass<'a>,
    ) -> Self {
        let mut chain = Vec::new();
        let mut hidden = false;
        let mut current = Some(pc.sym.clone());
        while let Some(sym) = current {
            let level_pc = &names.classes[&sym];
            let tyvars = if hidden {
                Vec::new()
            } else {
                level_pc
                    .decl
                    .typarams
                    .iter()
                    .map(|tp| {
                        (
                            tp.name.clone(),
                            TyVarSymbol::of_class(sym.clone(), tp.name.as_str()),
                        )
                    })
                    .collect()
            };
            // A static declaration cuts off enclosing type variables;
            // member interfaces, enums, and annotations are implicitly
            // static.
            if level_pc.decl.mods.contains(Mods::STATIC) || level_pc.kind != TyKind::Class {
                hidden = true;
            }
            chain.push(ScopeLevel {
                sym: sym.clone(),
                tyvars,
            });
            current = level_pc.owner.clone();
        }

        Self {
            names,
            unit: &units[pc.unit],
            unit_scope: &scopes[pc.unit],
            env: ClassEnv {
                source: done,
                classpath,
            },
            index: NameIndex { names, classpath },
            headers: &hierarchy.headers,
            sym: pc.sym.clone(),
            chain,
            method_tyvars: Vec::new(),
            diags: Vec::new(),
            fatal: None,
        }
    }

    fn bind(
        mut self,
        pc: &PackagedClass<'a>,
    ) -> (TypeBoundClass<'a>, Vec<Diagnostic>, Option<BinderError>) {
        let decl = pc.decl;
        let (typarams, typaram_info) = self.bind_typarams(decl, None);

        let superclass = match (&decl.extends, pc.kind) {
            (Some(tree), TyKind::Class) => Some(self.bind_ty(tree)),
            (_, TyKind::Class) => Some(Type::object()),
            (_, TyKind::Enum) => Some(Type::Class(ClassTy::new(vec![SimpleClassTy::new(
                ClassSymbol::enum_(),
                vec![Type::class(pc.sym.clone())],
            )]))),
            (_, TyKind::Interface | TyKind::Annotation) => Some(Type::object()),
        };

        let mut interfaces: Vec<Type> = decl
            .implements
            .iter()
            .map(|tree| self.bind_ty(tree))
            .collect();
        if pc.kind == TyKind::Annotation {
            interfaces.push(Type::class(ClassSymbol::annotation()));
        }

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut has_constructor = false;
        for member in &decl.members {
            match member {
                TyMember::Ty(_) => {}
                TyMember::Field(var) => fields.push(self.bind_field(pc, var)),
                TyMember::Method(meth) => {
                    has_constructor |= meth.is_constructor();
                    methods.push(self.bind_method(pc, meth));
                }
            }
        }

        if matches!(pc.kind, TyKind::Class | TyKind::Enum) && !has_constructor {
            methods.insert(0, self.default_constructor(pc));
        }
        if pc.kind == TyKind::Enum {
            methods.push(self.enum_values(pc));
            methods.push(self.enum_value_of(pc));
            fields.push(FieldInfo {
                sym: FieldSymbol::new(pc.sym.clone(), "$VALUES"),
                ty: Type::array(Type::class(pc.sym.clone())),
                access: ACC_PRIVATE | ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC,
                annotations: Vec::new(),
                decl: None,
                value: None,
            });
        }

        let annotations = self.bind_annos(&decl.annos);
        let access = class_access(pc, decl);

        let class = TypeBoundClass {
            origin: ClassOrigin::Source,
            sym: pc.sym.clone(),
            kind: pc.kind,
            owner: pc.owner.clone(),
            access,
            children: pc.children.clone(),
            typarams,
            typaram_info,
            superclass,
            interfaces,
            fields,
            methods,
            annotations,
            retention: None,
            inner_access: access,
            decl: Some(decl),
        };
        (class, self.diags, self.fatal)
    }

    /// Binds a declaration's type parameters into symbols and bound info.
    /// `method` carries the owning method symbol for method-level
    /// parameters.
    fn bind_typarams(
        &mut self,
        decl: &'a TyDecl,
        method: Option<(&MethDecl, &MethodSymbol)>,
    ) -> (Vec<TyVarSymbol>, BTreeMap<TyVarSymbol, TyVarInfo>) {
        let typarams: Vec<&quill_model::tree::TyParam> = match method {
            Some((meth, _)) => meth.typarams.iter().collect(),
            None => decl.typarams.iter().collect(),
        };
        let syms: Vec<TyVarSymbol> = typarams
            .iter()
            .map(|tp| match method {
                Some((_, msym)) => TyVarSymbol::of_method((*msym).clone(), tp.name.as_str()),
                None => TyVarSymbol::of_class(self.sym.clone(), tp.name.as_str()),
            })
            .collect();
        if method.is_some() {
            self.method_tyvars = typarams
                .iter()
                .zip(&syms)
                .map(|(tp, sym)| (tp.name.clone(), sym.clone()))
                .collect();
        }

        let mut info = BTreeMap::new();
        for (tp, sym) in typarams.iter().zip(&syms) {
            let mut class_bound = None;
            let mut interface_bounds = Vec::new();
            for (i, bound_tree) in tp.bounds.iter().enumerate() {
                let bound = self.bind_ty(bound_tree);
                let is_interface = match &bound {
                    Type::Class(c) => self.is_interface_sym(c.sym()),
                    _ => false,
                };
                if i == 0 && !is_interface {
                    class_bound = Some(bound);
                } else {
                    interface_bounds.push(bound);
                }
            }
            info.insert(
                sym.clone(),
                TyVarInfo {
                    class_bound,
                    interface_bounds,
                },
            );
        }
        (syms, info)
    }

    fn bind_field(&mut self, pc: &PackagedClass<'a>, var: &'a VarDecl) -> FieldInfo<'a> {
        let (ty, access) = if var.mods.contains(Mods::ENUM_CONSTANT) {
            (
                Type::class(pc.sym.clone()),
                ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM,
            )
        } else {
            let mut access = var.mods.visibility_access();
            if var.mods.contains(Mods::STATIC) {
                access |= ACC_STATIC;
            }
            if var.mods.contains(Mods::FINAL) {
                access |= ACC_FINAL;
            }
            if var.mods.contains(Mods::TRANSIENT) {
                access |= ACC_TRANSIENT;
            }
            if var.mods.contains(Mods::VOLATILE) {
                access |= ACC_VOLATILE;
            }
            if matches!(pc.kind, TyKind::Interface | TyKind::Annotation) {
                access |= ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
            }
            (self.bind_ty(&var.ty), access)
        };
        FieldInfo {
            sym: FieldSymbol::new(pc.sym.clone(), var.name.as_str()),
            ty,
            access,
            annotations: self.bind_annos(&var.annos),
            decl: Some(var),
            value: None,
        }
    }

    fn bind_method(&mut self, pc: &PackagedClass<'a>, meth: &'a MethDecl) -> MethodInfo<'a> {
        let key = method_key(meth);
        let msym = MethodSymbol::new(pc.sym.clone(), meth.name.as_str(), key);
        let (typarams, typaram_info) = self.bind_typarams(pc.decl, Some((meth, &msym)));

        let mut params = Vec::new();
        if meth.is_constructor() {
            params.extend(self.implicit_constructor_params(pc));
        }
        for param in &meth.params {
            let ty = self.bind_ty(&param.ty);
            params.push(ParamInfo {
                name: param.name.clone(),
                ty,
                annotations: self.bind_annos(&param.annos),
                synthetic: false,
            });
        }

        let ret = if meth.is_constructor() {
            Type::Void
        } else {
            self.bind_ty(&meth.ret)
        };
        let throws: Vec<Type> = meth.throws.iter().map(|t| self.bind_ty(t)).collect();

        let mut access = meth.mods.visibility_access();
        for (source, target) in [
            (Mods::STATIC, ACC_STATIC),
            (Mods::FINAL, ACC_FINAL),
            (Mods::ABSTRACT, ACC_ABSTRACT),
            (Mods::NATIVE, ACC_NATIVE),
            (Mods::SYNCHRONIZED, ACC_SYNCHRONIZED),
            (Mods::STRICTFP, ACC_STRICT),
        ] {
            if meth.mods.contains(source) {
                access |= target;
            }
        }
        match pc.kind {
            TyKind::Interface => {
                access |= ACC_PUBLIC;
                if !meth.mods.contains(Mods::DEFAULT) && !meth.mods.contains(Mods::STATIC) {
                    access |= ACC_ABSTRACT;
                }
            }
            TyKind::Annotation => {
                access |= ACC_PUBLIC | ACC_ABSTRACT;
            }
            TyKind::Enum if meth.is_constructor() => {
                access = (access & !(ACC_PUBLIC | ACC_PROTECTED)) | ACC_PRIVATE;
            }
            _ => {}
        }

        let annotations = self.bind_annos(&meth.annos);
        self.method_tyvars.clear();

        MethodInfo {
            sym: msym,
            typarams,
            typaram_info,
            ret,
            params,
            throws,
            access,
            default_value: None,
            annotations,
            decl: Some(meth),
        }
    }

    /// The compiler-introduced leading constructor parameters: enum
    /// name/ordinal, or the enclosing instance of an inner class.
    fn implicit_constructor_params(&mut self, pc: &PackagedClass<'a>) -> Vec<ParamInfo> {
        match pc.kind {
            TyKind::Enum => vec![
                ParamInfo {
                    name: Name::from("$enum$name"),
                    ty: Type::string(),
                    annotations: Vec::new(),
                    synthetic: true,
                },
                ParamInfo {
                    name: Name::from("$enum$ordinal"),
                    ty: Type::Prim(quill_model::ty::PrimKind::Int),
                    annotations: Vec::new(),
                    synthetic: true,
                },
            ],
            TyKind::Class => match (&pc.owner, pc.decl.mods.contains(Mods::STATIC)) {
                (Some(owner), false) if self.has_enclosing_instance(owner) => vec![ParamInfo {
                    name: Name::from("this$0"),
                    ty: Type::class(owner.clone()),
                    annotations: Vec::new(),
                    synthetic: true,
                }],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Inner classes of interfaces are implicitly static.
    fn has_enclosing_instance(&self, owner: &ClassSymbol) -> bool {
        self.names
            .classes
            .get(owner)
            .map(|pc| matches!(pc.kind, TyKind::Class | TyKind::Enum))
            .unwrap_or(false)
    }

    fn default_constructor(&mut self, pc: &PackagedClass<'a>) -> MethodInfo<'a> {
        let access = match pc.kind {
            TyKind::Enum => ACC_PRIVATE,
            _ => pc.decl.mods.visibility_access(),
        };
        let params = self.implicit_constructor_params(pc);
        MethodInfo {
            sym: MethodSymbol::new(pc.sym.clone(), "<init>", ""),
            typarams: Vec::new(),
            typaram_info: BTreeMap::new(),
            ret: Type::Void,
            params,
            throws: Vec::new(),
            access,
            default_value: None,
            annotations: Vec::new(),
            decl: None,
        }
    }

    fn enum_values(&mut self, pc: &PackagedClass<'a>) -> MethodInfo<'a> {
        MethodInfo {
            sym: MethodSymbol::new(pc.sym.clone(), "values", ""),
            typarams: Vec::new(),
            typaram_info: BTreeMap::new(),
            ret: Type::array(Type::class(pc.sym.clone())),
            params: Vec::new(),
            throws: Vec::new(),
            access: ACC_PUBLIC | ACC_STATIC,
            default_value: None,
            annotations: Vec::new(),
            decl: None,
        }
    }

    fn enum_value_of(&mut self, pc: &PackagedClass<'a>) -> MethodInfo<'a> {
        MethodInfo {
            sym: MethodSymbol::new(pc.sym.clone(), "valueOf", "java/lang/String"),
            typarams: Vec::new(),
            typaram_info: BTreeMap::new(),
            ret: Type::class(pc.sym.clone()),
            params: vec![ParamInfo {
                name: Name::from("name"),
                ty: Type::string(),
                annotations: Vec::new(),
                synthetic: false,
            }],
            throws: Vec::new(),
            access: ACC_PUBLIC | ACC_STATIC,
            default_value: None,
            annotations: Vec::new(),
            decl: None,
        }
    }

    // === Type resolution =====================================================

    pub(crate) fn bind_ty(&mut self, tree: &TreeTy) -> Type {
        match tree {
            TreeTy::Prim(kind) => Type::Prim(*kind),
            TreeTy::Void => Type::Void,
            TreeTy::Array { elem, annos } => {
                let annos = self.bind_annos(annos);
                let elem = self.bind_ty(elem);
                if matches!(elem, Type::Void) {
                    self.diags.push(diag::symbol_not_found(
                        self.unit,
                        tree.span(),
                        "array of void",
                    ));
                    return Type::Error;
                }
                Type::Array {
                    elem: Box::new(elem),
                    annos,
                }
            }
            TreeTy::Wild { span, .. } => {
                self.diags.push(diag::symbol_not_found(
                    self.unit,
                    *span,
                    "wildcard outside a type argument list",
                ));
                Type::Error
            }
            TreeTy::Class(segments) => self.bind_class_ty(segments),
        }
    }

    fn bind_class_ty(&mut self, segments: &[ClassTySeg]) -> Type {
        let head = &segments[0];
        match self.resolve_simple(head.name.as_str()) {
            SimpleRes::TyVar(sym) => {
                if segments.len() > 1 || !head.targs.is_empty() {
                    self.diags.push(diag::symbol_not_found(
                        self.unit,
                        head.span,
                        &format!("type parameter `{}` cannot be qualified or parameterized", head.name),
                    ));
                    return Type::Error;
                }
                Type::TyVar {
                    sym,
                    annos: self.bind_annos(&head.annos),
                }
            }
            SimpleRes::Class(sym) => self.bind_class_segments(sym, head, &segments[1..]),
            SimpleRes::Ambiguous(candidates) => {
                let shown: Vec<String> = candidates
                    .iter()
                    .map(|c| c.binary_name().replace('/', ".").replace('$', "."))
                    .collect();
                self.diags.push(diag::ambiguous_name(
                    self.unit,
                    head.span,
                    head.name.as_str(),
                    &shown,
                ));
                Type::Error
            }
            SimpleRes::NotFound => {
                // Package-qualified: consume leading segments as a package
                // until a top-level class appears.
                if segments.len() > 1 {
                    let mut package = String::new();
                    for (i, segment) in segments.iter().enumerate() {
                        let candidate = if package.is_empty() {
                            segment.name.as_str().to_string()
                        } else {
                            format!("{package}/{}", segment.name)
                        };
                        if self.index.class_exists(&candidate) {
                            let sym = ClassSymbol::new(candidate);
                            return self.bind_class_segments(sym, segment, &segments[i + 1..]);
                        }
                        if !segment.targs.is_empty() {
                            break;
                        }
                        package = candidate;
                    }
                }
                self.diags.push(diag::symbol_not_found(
                    self.unit,
                    head.span,
                    head.name.as_str(),
                ));
                Type::Error
            }
        }
    }

    /// Builds a [`ClassTy`] from a resolved head and the remaining
    /// written member segments.
    fn bind_class_segments(
        &mut self,
        head_sym: ClassSymbol,
        head: &ClassTySeg,
        rest: &[ClassTySeg],
    ) -> Type {
        let mut segments = vec![SimpleClassTy {
            sym: head_sym.clone(),
            targs: head.targs.iter().map(|t| self.bind_targ(t)).collect(),
            annos: self.bind_annos(&head.annos),
        }];
        let mut current = head_sym;
        for segment in rest {
            match self.find_member(&current, segment.name.as_str()) {
                Some(member) => {
                    segments.push(SimpleClassTy {
                        sym: member.clone(),
                        targs: segment.targs.iter().map(|t| self.bind_targ(t)).collect(),
                        annos: self.bind_annos(&segment.annos),
                    });
                    current = member;
                }
                None => {
                    self.diags.push(diag::symbol_not_found(
                        self.unit,
                        segment.span,
                        segment.name.as_str(),
                    ));
                    return Type::Error;
                }
            }
        }
        Type::Class(ClassTy::new(segments))
    }

    fn bind_targ(&mut self, tree: &TreeTy) -> Type {
        match tree {
            TreeTy::Wild { bound, annos, .. } => {
                let annos = self.bind_annos(annos);
                let bound = match bound {
                    WildTreeBound::None => WildcardBound::Unbounded,
                    WildTreeBound::Extends(inner) => {
                        WildcardBound::Extends(Box::new(self.bind_ty(inner)))
                    }
                    WildTreeBound::Super(inner) => {
                        WildcardBound::Super(Box::new(self.bind_ty(inner)))
                    }
                };
                Type::Wild { bound, annos }
            }
            _ => self.bind_ty(tree),
        }
    }

    /// The enclosing-class chain, innermost first.
    pub(crate) fn enclosing_syms(&self) -> Vec<ClassSymbol> {
        self.chain.iter().map(|level| level.sym.clone()).collect()
    }

    /// Drains the diagnostics and fatal error collected so far.
    pub(crate) fn finish(self) -> (Vec<Diagnostic>, Option<BinderError>) {
        (self.diags, self.fatal)
    }

    pub(crate) fn record_fatal(&mut self, error: BinderError) {
        self.fatal.get_or_insert(error);
    }

    /// Resolution order for a simple type name: method type parameters,
    /// then per enclosing level its type parameters and own-or-inherited
    /// member classes, then the unit scope.
    pub(crate) fn resolve_simple(&mut self, name: &str) -> SimpleRes {
        if let Some((_, sym)) = self.method_tyvars.iter().find(|(n, _)| n == name) {
            return SimpleRes::TyVar(sym.clone());
        }
        for i in 0..self.chain.len() {
            if let Some((_, sym)) = self.chain[i].tyvars.iter().find(|(n, _)| n == name) {
                return SimpleRes::TyVar(sym.clone());
            }
            let level_sym = self.chain[i].sym.clone();
            if let Some(member) = self.find_member(&level_sym, name) {
                return SimpleRes::Class(member);
            }
        }
        match unit_lookup(self.unit_scope, &self.index, name) {
            Lookup::Found(sym) => SimpleRes::Class(sym),
            Lookup::Ambiguous(candidates) => SimpleRes::Ambiguous(candidates),
            Lookup::NotFound => SimpleRes::NotFound,
        }
    }

    /// Member class `name` in `start` or an inherited scope. Source
    /// classes are walked through their phase III headers, so lookups
    /// work even while the class is still being bound.
    pub(crate) fn find_member(&mut self, start: &ClassSymbol, name: &str) -> Option<ClassSymbol> {
        let mut queue = vec![start.clone()];
        let mut seen = std::collections::BTreeSet::new();
        while let Some(sym) = queue.pop() {
            if !seen.insert(sym.clone()) {
                continue;
            }
            if let Some(pc) = self.names.classes.get(&sym) {
                if let Some(member) = pc.children.get(name) {
                    return Some(member.clone());
                }
                if let Some(header) = self.headers.get(&sym) {
                    queue.extend(header.super_sym.iter().cloned());
                    queue.extend(header.interface_syms.iter().cloned());
                }
                continue;
            }
            match self.env.classpath.bind(&sym) {
                Ok(Some(class)) => {
                    if let Some(member) = class.children.get(name) {
                        return Some(member.clone());
                    }
                    queue.extend(class.supertype_syms());
                }
                Ok(None) => {}
                Err(error) => {
                    self.fatal.get_or_insert(error);
                    return None;
                }
            }
        }
        None
    }

    fn is_interface_sym(&mut self, sym: &ClassSymbol) -> bool {
        if let Some(pc) = self.names.classes.get(sym) {
            return matches!(pc.kind, TyKind::Interface | TyKind::Annotation);
        }
        match self.env.classpath.bind(sym) {
            Ok(Some(class)) => class.is_interface(),
            Ok(None) => false,
            Err(error) => {
                self.fatal.get_or_insert(error);
                false
            }
        }
    }

    // === Annotations =========================================================

    pub(crate) fn bind_annos(&mut self, annos: &[Anno]) -> Vec<AnnoInfo> {
        annos.iter().map(|anno| self.bind_anno(anno)).collect()
    }

    fn bind_anno(&mut self, anno: &Anno) -> AnnoInfo {
        let sym = self.resolve_anno_name(anno);
        AnnoInfo::new(sym, anno.args.clone())
    }

    pub(crate) fn resolve_anno_name(&mut self, anno: &Anno) -> ClassSymbol {
        let head = anno.name.first().expect("annotation name");
        match self.resolve_simple(head.as_str()) {
            SimpleRes::Class(mut sym) => {
                for segment in &anno.name[1..] {
                    match self.find_member(&sym, segment.as_str()) {
                        Some(member) => sym = member,
                        None => {
                            self.diags.push(diag::symbol_not_found(
                                self.unit,
                                anno.span,
                                segment.as_str(),
                            ));
                            return ClassSymbol::error();
                        }
                    }
                }
                sym
            }
            SimpleRes::NotFound if anno.name.len() > 1 => {
                match self.index.resolve_canonical(&anno.name) {
                    Some(sym) => sym,
                    None => {
                        let dotted = anno
                            .name
                            .iter()
                            .map(Name::as_str)
                            .collect::<Vec<_>>()
                            .join(".");
                        self.diags
                            .push(diag::symbol_not_found(self.unit, anno.span, &dotted));
                        ClassSymbol::error()
                    }
                }
            }
            SimpleRes::Ambiguous(candidates) => {
                let shown: Vec<String> = candidates
                    .iter()
                    .map(|c| c.binary_name().replace('/', "."))
                    .collect();
                self.diags.push(diag::ambiguous_name(
                    self.unit,
                    anno.span,
                    head.as_str(),
                    &shown,
                ));
                ClassSymbol::error()
            }
            _ => {
                self.diags
                    .push(diag::symbol_not_found(self.unit, anno.span, head.as_str()));
                ClassSymbol::error()
            }
        }
    }
}

/// Class-file access flags for a declaration.
fn class_access(pc: &PackagedClass<'_>, decl: &TyDecl) -> u16 {
    let mut access = decl.mods.visibility_access();
    if decl.mods.contains(Mods::STATIC) {
        access |= ACC_STATIC;
    }
    if decl.mods.contains(Mods::ABSTRACT) {
        access |= ACC_ABSTRACT;
    }
    if decl.mods.contains(Mods::FINAL) {
        access |= ACC_FINAL;
    }
    match pc.kind {
        TyKind::Class => {}
        TyKind::Interface => access |= ACC_INTERFACE | ACC_ABSTRACT,
        TyKind::Annotation => access |= ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION,
        TyKind::Enum => access |= ACC_ENUM | ACC_FINAL,
    }
    if pc.owner.is_some() && pc.kind != TyKind::Class {
        // Member interfaces, enums, and annotations are implicitly static.
        access |= ACC_STATIC;
    }
    access
}

/// The overload-distinguishing key, computed from the written parameter
/// types so it is stable before resolution.
fn method_key(meth: &MethDecl) -> String {
    fn ty_key(tree: &TreeTy, out: &mut String) {
        match tree {
            TreeTy::Prim(kind) => out.push_str(&kind.to_string()),
            TreeTy::Void => out.push_str("void"),
            TreeTy::Array { elem, .. } => {
                ty_key(elem, out);
                out.push_str("[]");
            }
            TreeTy::Wild { .. } => out.push('?'),
            TreeTy::Class(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(segment.name.as_str());
                }
            }
        }
    }
    let mut key = String::new();
    for (i, param) in meth.params.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        ty_key(&param.ty, &mut key);
    }
    key
}
