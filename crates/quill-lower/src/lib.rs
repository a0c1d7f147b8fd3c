//! Lowering: the bound program → abstract class-file records → bytes.
//!
//! Policies, per declaration:
//! - access flags are translated to their class-file form (`ACC_SUPER`
//!   on classes and enums, nested visibility widened, `static` dropped
//!   from the class view but kept in `InnerClasses`);
//! - descriptors are erased, signatures emitted only when a declaration
//!   is generic or mentions type variables or parameterized types;
//! - primitive/`String` constants become `ConstantValue`;
//! - annotations are partitioned by retention (source dropped) and by
//!   position (declaration vs. type);
//! - every class that mentions a nested class gets an `InnerClasses`
//!   table, transitively closed, in binary-name order;
//! - every concrete method body is the `throw new AssertionError()` stub.

mod sig_lower;

use quill_binder::{
    BinderError, BoundProgram, ClassEnv, FieldInfo, MethodInfo, Retention, TyVarInfo,
    TypeBoundClass,
};
use quill_classfile as cf;
use quill_model::constant::{AnnoInfo, Const, Value};
use quill_model::flags::access::*;
use quill_model::sym::{ClassSymbol, TyVarSymbol};
use quill_model::tree::TyKind;
use quill_model::ty::{Type, WildcardBound};
use sig_lower::SigLower;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Lowers every source class and serializes it.
///
/// Keys are internal binary names; callers append `.class` for archive
/// entries.
pub fn lower_program(
    program: &BoundProgram<'_, '_>,
    major_version: u16,
) -> Result<BTreeMap<String, Vec<u8>>, BinderError> {
    let env = program.env();
    let mut out = BTreeMap::new();
    for sym in &program.topo {
        let class = &program.classes[sym];
        let classfile = lower_class(&env, class, major_version)?;
        out.insert(
            sym.binary_name().to_string(),
            cf::write_class(&classfile),
        );
    }
    debug!(classes = out.len(), "lowered program");
    Ok(out)
}

/// Lowers one bound class to its class-file record.
pub fn lower_class(
    env: &ClassEnv<'_, '_, '_>,
    class: &TypeBoundClass<'_>,
    major_version: u16,
) -> Result<cf::ClassFile, BinderError> {
    let sig = SigLower { env };
    let mut refs = RefCollector::default();

    refs.class_chain(&class.sym);
    for child in class.children.values() {
        refs.class_chain(child);
    }
    if let Some(superclass) = &class.superclass {
        refs.ty(superclass);
    }
    for interface in &class.interfaces {
        refs.ty(interface);
    }
    for info in class.typaram_info.values() {
        refs.tyvar_info(info);
    }
    refs.annos(&class.annotations);

    let super_name = match &class.superclass {
        Some(ty) => Some(sig.erased_name(ty)?),
        None => None,
    };
    let interfaces = class
        .interfaces
        .iter()
        .map(|i| sig.erased_name(i))
        .collect::<Result<Vec<_>, _>>()?;

    let typaram_lookup = |tv: &TyVarSymbol| class.typaram_info.get(tv).cloned().unwrap_or_default();
    let signature = sig.class_signature(
        &class.typarams,
        typaram_lookup,
        &class.superclass,
        &class.interfaces,
    );

    let mut fields = Vec::with_capacity(class.fields.len());
    for field in &class.fields {
        fields.push(lower_field(env, &sig, &mut refs, field)?);
    }
    let mut methods = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        methods.push(lower_method(env, &sig, &mut refs, method)?);
    }

    let mut type_annotations = Vec::new();
    if let Some(superclass) = &class.superclass {
        collect_type_annotations(
            env,
            superclass,
            cf::TargetInfo::Supertype(65535),
            &mut type_annotations,
        )?;
    }
    for (i, interface) in class.interfaces.iter().enumerate() {
        collect_type_annotations(
            env,
            interface,
            cf::TargetInfo::Supertype(i as u16),
            &mut type_annotations,
        )?;
    }
    for (param_index, tv) in class.typarams.iter().enumerate() {
        if let Some(info) = class.typaram_info.get(tv) {
            collect_bound_annotations(
                env,
                info,
                |bound| cf::TargetInfo::ClassTypeParameterBound {
                    param: param_index as u8,
                    bound,
                },
                &mut type_annotations,
            )?;
        }
    }

    let annotations = lower_annos(env, &class.annotations)?;
    let deprecated = is_deprecated(&class.annotations);
    let inner_classes = inner_class_table(env, refs)?;

    Ok(cf::ClassFile {
        minor_version: cf::DEFAULT_MINOR_VERSION,
        major_version,
        access: class_file_access(class),
        name: class.sym.binary_name().to_string(),
        super_name,
        interfaces,
        fields,
        methods,
        signature,
        inner_classes,
        annotations,
        type_annotations,
        deprecated,
    })
}

fn lower_field(
    env: &ClassEnv<'_, '_, '_>,
    sig: &SigLower<'_, '_, '_, '_>,
    refs: &mut RefCollector,
    field: &FieldInfo<'_>,
) -> Result<cf::FieldInfo, BinderError> {
    refs.ty(&field.ty);
    refs.annos(&field.annotations);

    let mut type_annotations = Vec::new();
    collect_type_annotations(env, &field.ty, cf::TargetInfo::Field, &mut type_annotations)?;

    Ok(cf::FieldInfo {
        access: field.access,
        name: field.sym.name.as_str().to_string(),
        descriptor: sig.field_descriptor(&field.ty)?,
        signature: field.ty.is_generic().then(|| sig.type_signature(&field.ty)),
        constant_value: field.value.as_ref().map(lower_value),
        annotations: lower_annos(env, &field.annotations)?,
        type_annotations,
        deprecated: is_deprecated(&field.annotations),
    })
}

fn lower_method(
    env: &ClassEnv<'_, '_, '_>,
    sig: &SigLower<'_, '_, '_, '_>,
    refs: &mut RefCollector,
    method: &MethodInfo<'_>,
) -> Result<cf::MethodInfo, BinderError> {
    for param in &method.params {
        refs.ty(&param.ty);
        refs.annos(&param.annotations);
    }
    refs.ty(&method.ret);
    for thrown in &method.throws {
        refs.ty(thrown);
    }
    for info in method.typaram_info.values() {
        refs.tyvar_info(info);
    }
    refs.annos(&method.annotations);

    let param_tys: Vec<Type> = method.params.iter().map(|p| p.ty.clone()).collect();
    let descriptor = sig.method_descriptor(&param_tys, &method.ret)?;

    let typaram_lookup =
        |tv: &TyVarSymbol| method.typaram_info.get(tv).cloned().unwrap_or_default();
    let signature_params: Vec<&Type> = method
        .params
        .iter()
        .filter(|p| !p.synthetic)
        .map(|p| &p.ty)
        .collect();
    let signature = sig.method_signature(
        &method.typarams,
        typaram_lookup,
        &signature_params,
        &method.ret,
        &method.throws,
    );

    let exceptions = method
        .throws
        .iter()
        .map(|t| sig.erased_name(t))
        .collect::<Result<Vec<_>, _>>()?;

    // Parameter annotations cover declared (non-synthetic) parameters.
    let declared: Vec<_> = method.params.iter().filter(|p| !p.synthetic).collect();
    let parameter_annotations: Vec<Vec<cf::AnnotationInfo>> = {
        let mut out = Vec::with_capacity(declared.len());
        for param in &declared {
            out.push(lower_annos(env, &param.annotations)?);
        }
        if out.iter().all(|p| p.is_empty()) {
            Vec::new()
        } else {
            out
        }
    };

    let mut type_annotations = Vec::new();
    collect_type_annotations(
        env,
        &method.ret,
        cf::TargetInfo::MethodReturn,
        &mut type_annotations,
    )?;
    for (i, param) in declared.iter().enumerate() {
        collect_type_annotations(
            env,
            &param.ty,
            cf::TargetInfo::FormalParameter(i as u8),
            &mut type_annotations,
        )?;
    }
    for (i, thrown) in method.throws.iter().enumerate() {
        collect_type_annotations(
            env,
            thrown,
            cf::TargetInfo::Throws(i as u16),
            &mut type_annotations,
        )?;
    }
    for (param_index, tv) in method.typarams.iter().enumerate() {
        if let Some(info) = method.typaram_info.get(tv) {
            collect_bound_annotations(
                env,
                info,
                |bound| cf::TargetInfo::MethodTypeParameterBound {
                    param: param_index as u8,
                    bound,
                },
                &mut type_annotations,
            )?;
        }
    }

    let concrete = method.access & (ACC_ABSTRACT | ACC_NATIVE) == 0;
    let code = concrete.then(|| {
        let mut slots: u16 = if method.access & ACC_STATIC != 0 { 0 } else { 1 };
        for param in &method.params {
            slots += match param.ty.prim_kind() {
                Some(kind) => kind.width(),
                None => 1,
            };
        }
        cf::CodeInfo { max_locals: slots }
    });

    Ok(cf::MethodInfo {
        access: method.access,
        name: method.sym.name.as_str().to_string(),
        descriptor,
        signature,
        exceptions,
        default_value: method
            .default_value
            .as_ref()
            .map(|value| lower_const(env, value))
            .transpose()?,
        annotations: lower_annos(env, &method.annotations)?,
        parameter_annotations,
        type_annotations,
        code,
        deprecated: is_deprecated(&method.annotations),
    })
}

// === Annotations =============================================================

/// Declaration annotations, partitioned by the annotation class's
/// retention; `SOURCE` uses are dropped entirely.
fn lower_annos(
    env: &ClassEnv<'_, '_, '_>,
    annos: &[AnnoInfo],
) -> Result<Vec<cf::AnnotationInfo>, BinderError> {
    let mut out = Vec::new();
    for anno in annos {
        match retention(env, &anno.sym)? {
            Retention::Source => {}
            visible => out.push(lower_anno(env, anno, visible == Retention::Runtime)?),
        }
    }
    Ok(out)
}

fn retention(env: &ClassEnv<'_, '_, '_>, sym: &ClassSymbol) -> Result<Retention, BinderError> {
    Ok(env
        .get(sym)?
        .and_then(|handle| handle.get().retention)
        .unwrap_or(Retention::Class))
}

fn lower_anno(
    env: &ClassEnv<'_, '_, '_>,
    anno: &AnnoInfo,
    runtime_visible: bool,
) -> Result<cf::AnnotationInfo, BinderError> {
    let mut values = Vec::with_capacity(anno.values.len());
    for (name, value) in &anno.values {
        values.push((name.as_str().to_string(), lower_const(env, value)?));
    }
    Ok(cf::AnnotationInfo {
        type_descriptor: format!("L{};", anno.sym.binary_name()),
        runtime_visible,
        values,
    })
}

/// The total encoding of the constant sum into `element_value`s.
fn lower_const(env: &ClassEnv<'_, '_, '_>, value: &Const) -> Result<cf::ElementValue, BinderError> {
    Ok(match value {
        Const::Value(v) => cf::ElementValue::Const(lower_value(v)),
        Const::Enum(e) => cf::ElementValue::Enum {
            type_descriptor: format!("L{};", e.owner.binary_name()),
            name: e.name.as_str().to_string(),
        },
        Const::ClassLit(ty) => cf::ElementValue::Class {
            descriptor: match ty {
                Type::Void => "V".to_string(),
                other => SigLower { env }.field_descriptor(other)?,
            },
        },
        Const::Anno(anno) => cf::ElementValue::Anno(Box::new(lower_anno(env, anno, true)?)),
        Const::Array(values) => cf::ElementValue::Array(
            values
                .iter()
                .map(|v| lower_const(env, v))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

fn lower_value(value: &Value) -> cf::ConstValue {
    match value {
        Value::Boolean(v) => cf::ConstValue::Boolean(*v),
        Value::Byte(v) => cf::ConstValue::Byte(*v),
        Value::Short(v) => cf::ConstValue::Short(*v),
        Value::Char(v) => cf::ConstValue::Char(*v),
        Value::Int(v) => cf::ConstValue::Int(*v),
        Value::Long(v) => cf::ConstValue::Long(*v),
        Value::Float(v) => cf::ConstValue::Float(*v),
        Value::Double(v) => cf::ConstValue::Double(*v),
        Value::Str(v) => cf::ConstValue::Str(v.clone()),
    }
}

fn is_deprecated(annos: &[AnnoInfo]) -> bool {
    annos.iter().any(|a| a.sym == ClassSymbol::deprecated())
}

// === Type annotations ========================================================

/// Walks a type, emitting a type annotation for every annotated node
/// with the `type_path` to reach it.
fn collect_type_annotations(
    env: &ClassEnv<'_, '_, '_>,
    ty: &Type,
    target: cf::TargetInfo,
    out: &mut Vec<cf::TypeAnnotationInfo>,
) -> Result<(), BinderError> {
    fn walk(
        env: &ClassEnv<'_, '_, '_>,
        ty: &Type,
        target: cf::TargetInfo,
        path: &mut Vec<cf::TypePathStep>,
        out: &mut Vec<cf::TypeAnnotationInfo>,
    ) -> Result<(), BinderError> {
        let emit = |annos: &[AnnoInfo],
                    path: &[cf::TypePathStep],
                    out: &mut Vec<cf::TypeAnnotationInfo>|
         -> Result<(), BinderError> {
            for anno in annos {
                match retention(env, &anno.sym)? {
                    Retention::Source => {}
                    visible => out.push(cf::TypeAnnotationInfo {
                        target,
                        path: path.to_vec(),
                        anno: lower_anno(env, anno, visible == Retention::Runtime)?,
                    }),
                }
            }
            Ok(())
        };
        match ty {
            Type::Prim(_) | Type::Void | Type::Error => {}
            Type::Array { elem, annos } => {
                emit(annos, path, out)?;
                path.push(cf::TypePathStep { kind: 0, index: 0 });
                walk(env, elem, target, path, out)?;
                path.pop();
            }
            Type::TyVar { annos, .. } => emit(annos, path, out)?,
            Type::Wild { bound, annos } => {
                emit(annos, path, out)?;
                let inner = match bound {
                    WildcardBound::Extends(t) | WildcardBound::Super(t) => Some(t),
                    WildcardBound::Unbounded => None,
                };
                if let Some(inner) = inner {
                    path.push(cf::TypePathStep { kind: 2, index: 0 });
                    walk(env, inner, target, path, out)?;
                    path.pop();
                }
            }
            Type::Class(class) => {
                for (depth, segment) in class.segments.iter().enumerate() {
                    emit(&segment.annos, path, out)?;
                    for (i, targ) in segment.targs.iter().enumerate() {
                        path.push(cf::TypePathStep {
                            kind: 3,
                            index: i as u8,
                        });
                        walk(env, targ, target, path, out)?;
                        path.pop();
                    }
                    if depth + 1 < class.segments.len() {
                        path.push(cf::TypePathStep { kind: 1, index: 0 });
                    }
                }
                for _ in 1..class.segments.len() {
                    path.pop();
                }
            }
        }
        Ok(())
    }
    walk(env, ty, target, &mut Vec::new(), out)
}

fn collect_bound_annotations(
    env: &ClassEnv<'_, '_, '_>,
    info: &TyVarInfo,
    target: impl Fn(u8) -> cf::TargetInfo,
    out: &mut Vec<cf::TypeAnnotationInfo>,
) -> Result<(), BinderError> {
    if let Some(bound) = &info.class_bound {
        collect_type_annotations(env, bound, target(0), out)?;
    }
    for (i, bound) in info.interface_bounds.iter().enumerate() {
        collect_type_annotations(env, bound, target(i as u8 + 1), out)?;
    }
    Ok(())
}

// === Access flags ============================================================

/// The class-file access view: visibility widened for nested classes,
/// `static` dropped, `ACC_SUPER` set on concrete classes.
fn class_file_access(class: &TypeBoundClass<'_>) -> u16 {
    let mut access = class.access;
    if access & ACC_PRIVATE != 0 {
        access &= !(ACC_PRIVATE | ACC_PUBLIC | ACC_PROTECTED);
    }
    if access & ACC_PROTECTED != 0 {
        access = (access & !ACC_PROTECTED) | ACC_PUBLIC;
    }
    access &= !ACC_STATIC;
    if access & ACC_INTERFACE == 0 {
        access |= ACC_SUPER;
    }
    access
}

// === InnerClasses ============================================================

/// Collects the class symbols a lowered class mentions.
#[derive(Default)]
struct RefCollector {
    syms: BTreeSet<ClassSymbol>,
}

impl RefCollector {
    fn ty(&mut self, ty: &Type) {
        match ty {
            Type::Prim(_) | Type::Void | Type::Error => {}
            Type::Array { elem, annos } => {
                self.anno_syms(annos);
                self.ty(elem);
            }
            Type::TyVar { annos, .. } => self.anno_syms(annos),
            Type::Wild { bound, annos } => {
                self.anno_syms(annos);
                match bound {
                    WildcardBound::Extends(t) | WildcardBound::Super(t) => self.ty(t),
                    WildcardBound::Unbounded => {}
                }
            }
            Type::Class(class) => {
                for segment in &class.segments {
                    self.syms.insert(segment.sym.clone());
                    self.anno_syms(&segment.annos);
                    for targ in &segment.targs {
                        self.ty(targ);
                    }
                }
            }
        }
    }

    fn tyvar_info(&mut self, info: &TyVarInfo) {
        if let Some(bound) = &info.class_bound {
            self.ty(bound);
        }
        for bound in &info.interface_bounds {
            self.ty(bound);
        }
    }

    fn annos(&mut self, annos: &[AnnoInfo]) {
        self.anno_syms(annos);
    }

    fn anno_syms(&mut self, annos: &[AnnoInfo]) {
        for anno in annos {
            self.syms.insert(anno.sym.clone());
            for value in anno.values.values() {
                self.const_syms(value);
            }
        }
    }

    fn const_syms(&mut self, value: &Const) {
        match value {
            Const::Value(_) => {}
            Const::Enum(e) => {
                self.syms.insert(e.owner.clone());
            }
            Const::ClassLit(ty) => self.ty(ty),
            Const::Anno(anno) => self.anno_syms(std::slice::from_ref(anno)),
            Const::Array(values) => {
                for v in values {
                    self.const_syms(v);
                }
            }
        }
    }

    fn class_chain(&mut self, sym: &ClassSymbol) {
        self.syms.insert(sym.clone());
    }
}

/// Every referenced nested class, closed over enclosing chains, in
/// binary-name order.
fn inner_class_table(
    env: &ClassEnv<'_, '_, '_>,
    refs: RefCollector,
) -> Result<Vec<cf::InnerClass>, BinderError> {
    let mut entries: BTreeMap<ClassSymbol, cf::InnerClass> = BTreeMap::new();
    let mut queue: Vec<ClassSymbol> = refs.syms.into_iter().collect();
    while let Some(sym) = queue.pop() {
        if sym.is_error() || entries.contains_key(&sym) {
            continue;
        }
        let (owner, access) = match env.get(&sym)? {
            Some(handle) => {
                let class = handle.get();
                (class.owner.clone(), class.inner_access)
            }
            None => (sym.textual_owner(), ACC_PUBLIC | ACC_STATIC),
        };
        let Some(owner) = owner else {
            continue;
        };
        entries.insert(
            sym.clone(),
            cf::InnerClass {
                inner: sym.binary_name().to_string(),
                outer: Some(owner.binary_name().to_string()),
                name: Some(sym.simple_name().to_string()),
                access,
            },
        );
        queue.push(owner);
    }
    Ok(entries.into_values().collect())
}
