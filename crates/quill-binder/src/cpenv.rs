//! Class-path class binding.
//!
//! Compiled dependencies are decoded on first use and cached. The result
//! is the same [`TypeBoundClass`] the source pipeline produces, filled to
//! the type-bound layer: descriptors and signatures become model types,
//! constant values and annotation defaults become [`Const`]s, and the
//! `InnerClasses` table becomes owner/children links.

use crate::bound::{ClassOrigin, FieldInfo, MethodInfo, ParamInfo, Retention, TyVarInfo, TypeBoundClass};
use crate::BinderError;
use quill_classfile as cf;
use quill_classfile::sig::{ClassTySig, TyArgSig, TySig};
use quill_core::Name;
use quill_model::constant::{AnnoInfo, Const, EnumRef, Value};
use quill_model::sym::{ClassSymbol, FieldSymbol, MethodSymbol, TyVarOwner, TyVarSymbol};
use quill_model::tree::TyKind;
use quill_model::ty::{ClassTy, PrimKind, SimpleClassTy, Type, WildcardBound};
use quill_model::ClassBytes;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::debug;

use quill_model::flags::access::{ACC_ANNOTATION, ACC_ENUM, ACC_INTERFACE};

/// Lazily binds class-path classes, with a per-invocation cache.
pub struct ClassPathEnv<'p> {
    bytes: &'p dyn ClassBytes,
    cache: RefCell<HashMap<ClassSymbol, Option<Rc<TypeBoundClass<'static>>>>>,
}

impl<'p> ClassPathEnv<'p> {
    pub fn new(bytes: &'p dyn ClassBytes) -> Self {
        Self {
            bytes,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn has_class(&self, binary_name: &str) -> bool {
        self.bytes.has_class(binary_name)
    }

    pub fn has_package(&self, slashed: &str) -> bool {
        self.bytes.has_package(slashed)
    }

    /// Binds `sym`, or returns `None` when the class path has no such
    /// class. Decode failures are fatal.
    pub fn bind(&self, sym: &ClassSymbol) -> Result<Option<Rc<TypeBoundClass<'static>>>, BinderError> {
        if let Some(cached) = self.cache.borrow().get(sym) {
            return Ok(cached.clone());
        }
        let bound = match self.bytes.class_bytes(sym.binary_name()) {
            None => None,
            Some(bytes) => {
                debug!(class = %sym, "binding class-path class");
                let classfile =
                    cf::read_class(&bytes).map_err(|source| BinderError::ClassPathDecode {
                        sym: sym.clone(),
                        source,
                    })?;
                Some(Rc::new(bind_classfile(sym, &classfile)))
            }
        };
        self.cache.borrow_mut().insert(sym.clone(), bound.clone());
        Ok(bound)
    }
}

/// A bound class from either origin.
pub enum ClassHandle<'e, 'a> {
    Source(&'e TypeBoundClass<'a>),
    Path(Rc<TypeBoundClass<'static>>),
}

impl<'e, 'a> ClassHandle<'e, 'a> {
    pub fn get(&self) -> &TypeBoundClass<'a> {
        match self {
            ClassHandle::Source(class) => class,
            ClassHandle::Path(class) => class,
        }
    }
}

/// The combined view over source-bound classes and the class path.
/// Source classes shadow same-named class-path classes.
pub struct ClassEnv<'e, 'a, 'p> {
    pub source: &'e BTreeMap<ClassSymbol, TypeBoundClass<'a>>,
    pub classpath: &'e ClassPathEnv<'p>,
}

impl<'e, 'a, 'p> ClassEnv<'e, 'a, 'p> {
    pub fn get(&self, sym: &ClassSymbol) -> Result<Option<ClassHandle<'e, 'a>>, BinderError> {
        if let Some(class) = self.source.get(sym) {
            return Ok(Some(ClassHandle::Source(class)));
        }
        Ok(self.classpath.bind(sym)?.map(ClassHandle::Path))
    }

    /// Finds field `name` in `start` or an inherited scope.
    pub fn find_field(
        &self,
        start: &ClassSymbol,
        name: &str,
    ) -> Result<Option<(ClassSymbol, FieldInfo<'a>)>, BinderError> {
        let mut queue = vec![start.clone()];
        let mut seen = std::collections::BTreeSet::new();
        while let Some(sym) = queue.pop() {
            if !seen.insert(sym.clone()) {
                continue;
            }
            let Some(handle) = self.get(&sym)? else {
                continue;
            };
            let class = handle.get();
            if let Some(field) = class.field(name) {
                return Ok(Some((sym.clone(), field.clone())));
            }
            queue.extend(class.supertype_syms());
        }
        Ok(None)
    }

    /// The bound info for a type variable, looked up through its owner.
    pub fn tyvar_info(&self, sym: &TyVarSymbol) -> Result<Option<TyVarInfo>, BinderError> {
        let (owner, method_key) = match &sym.owner {
            TyVarOwner::Class(class) => (class, None),
            TyVarOwner::Method(method) => (&method.owner, Some(method)),
        };
        let Some(handle) = self.get(owner)? else {
            return Ok(None);
        };
        let class = handle.get();
        let info = match method_key {
            None => class.typaram_info.get(sym).cloned(),
            Some(method) => class
                .methods
                .iter()
                .find(|m| &m.sym == method)
                .and_then(|m| m.typaram_info.get(sym).cloned()),
        };
        Ok(info)
    }
}

// === Class-file conversion ===================================================

struct SigScope {
    vars: HashMap<String, TyVarSymbol>,
}

impl SigScope {
    fn empty() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    fn resolve(&self, name: &str) -> Option<TyVarSymbol> {
        self.vars.get(name).cloned()
    }
}

fn bind_classfile(sym: &ClassSymbol, classfile: &cf::ClassFile) -> TypeBoundClass<'static> {
    let kind = if classfile.access & ACC_ANNOTATION != 0 {
        TyKind::Annotation
    } else if classfile.access & ACC_INTERFACE != 0 {
        TyKind::Interface
    } else if classfile.access & ACC_ENUM != 0 {
        TyKind::Enum
    } else {
        TyKind::Class
    };

    // Owner, nested members, and the InnerClasses access view.
    let mut owner = None;
    let mut inner_access = 0;
    let mut children = BTreeMap::new();
    for inner in &classfile.inner_classes {
        if inner.inner == classfile.name {
            owner = inner.outer.clone().map(ClassSymbol::new);
            inner_access = inner.access;
        } else if inner.outer.as_deref() == Some(classfile.name.as_str()) {
            if let Some(simple) = &inner.name {
                children.insert(Name::from(simple.as_str()), ClassSymbol::new(inner.inner.as_str()));
            }
        }
    }
    if owner.is_none() {
        // No self-entry in InnerClasses: fall back to the `$` heuristic.
        owner = sym.textual_owner();
    }

    // Type parameters and supertypes, preferring the generic signature.
    let mut scope = SigScope::empty();
    let mut typarams = Vec::new();
    let mut typaram_info = BTreeMap::new();
    let mut superclass;
    let mut interfaces;

    let parsed_sig = classfile
        .signature
        .as_deref()
        .and_then(|text| cf::parse_class_signature(text).ok());
    match parsed_sig {
        Some(class_sig) => {
            for tp in &class_sig.typarams {
                let tv = TyVarSymbol::of_class(sym.clone(), tp.name.as_str());
                scope.vars.insert(tp.name.clone(), tv.clone());
                typarams.push(tv);
            }
            for (tp, tv) in class_sig.typarams.iter().zip(&typarams) {
                typaram_info.insert(tv.clone(), convert_typaram_bounds(&scope, tp));
            }
            superclass = Some(Type::Class(convert_class_ty(&scope, &class_sig.superclass)));
            interfaces = class_sig
                .interfaces
                .iter()
                .map(|i| Type::Class(convert_class_ty(&scope, i)))
                .collect();
        }
        None => {
            superclass = classfile
                .super_name
                .as_deref()
                .map(|name| Type::class(ClassSymbol::new(name)));
            interfaces = classfile
                .interfaces
                .iter()
                .map(|name| Type::class(ClassSymbol::new(name.as_str())))
                .collect::<Vec<_>>();
        }
    }
    if classfile.name == "java/lang/Object" {
        superclass = None;
        interfaces = Vec::new();
    }

    let fields = classfile
        .fields
        .iter()
        .map(|field| bind_cp_field(sym, &scope, field))
        .collect();
    let methods = classfile
        .methods
        .iter()
        .filter(|method| method.name != "<clinit>")
        .map(|method| bind_cp_method(sym, &scope, method))
        .collect();

    let annotations: Vec<AnnoInfo> = classfile
        .annotations
        .iter()
        .map(convert_annotation)
        .collect();
    let retention = (kind == TyKind::Annotation).then(|| retention_of(&annotations));

    TypeBoundClass {
        origin: ClassOrigin::ClassPath,
        sym: sym.clone(),
        kind,
        owner,
        access: classfile.access,
        children,
        typarams,
        typaram_info,
        superclass,
        interfaces,
        fields,
        methods,
        annotations,
        retention,
        inner_access,
        decl: None,
    }
}

/// The declared retention of an annotation class, from its own
/// `@Retention` meta-annotation.
pub fn retention_of(annotations: &[AnnoInfo]) -> Retention {
    for anno in annotations {
        if anno.sym != ClassSymbol::retention() {
            continue;
        }
        if let Some(Const::Enum(value)) = anno.values.get("value") {
            return match value.name.as_str() {
                "SOURCE" => Retention::Source,
                "RUNTIME" => Retention::Runtime,
                _ => Retention::Class,
            };
        }
    }
    Retention::Class
}

fn bind_cp_field(owner: &ClassSymbol, scope: &SigScope, field: &cf::FieldInfo) -> FieldInfo<'static> {
    let ty = field
        .signature
        .as_deref()
        .or(Some(field.descriptor.as_str()))
        .and_then(|text| cf::parse_type_signature(text).ok())
        .map(|sig| convert_type(scope, &sig))
        .unwrap_or(Type::Error);
    let value = field
        .constant_value
        .as_ref()
        .map(|cv| reinterpret_constant(cv, &field.descriptor));
    FieldInfo {
        sym: FieldSymbol::new(owner.clone(), field.name.as_str()),
        ty,
        access: field.access,
        annotations: field.annotations.iter().map(convert_annotation).collect(),
        decl: None,
        value,
    }
}

fn bind_cp_method(
    owner: &ClassSymbol,
    class_scope: &SigScope,
    method: &cf::MethodInfo,
) -> MethodInfo<'static> {
    let sym = MethodSymbol::new(owner.clone(), method.name.as_str(), method.descriptor.as_str());
    let descriptor = cf::parse_method_descriptor(&method.descriptor).ok();
    let signature = method
        .signature
        .as_deref()
        .and_then(|text| cf::parse_method_signature(text).ok());

    let mut scope = SigScope {
        vars: class_scope.vars.clone(),
    };
    let mut typarams = Vec::new();
    let mut typaram_info = BTreeMap::new();
    if let Some(sig) = &signature {
        for tp in &sig.typarams {
            let tv = TyVarSymbol::of_method(sym.clone(), tp.name.as_str());
            scope.vars.insert(tp.name.clone(), tv.clone());
            typarams.push(tv);
        }
        for (tp, tv) in sig.typarams.iter().zip(&typarams) {
            typaram_info.insert(tv.clone(), convert_typaram_bounds(&scope, tp));
        }
    }

    // The generic signature omits leading synthetic/mandated parameters;
    // take arity from the descriptor and overlay generic types on the
    // trailing parameters.
    let desc_params = descriptor.as_ref().map(|d| d.params.clone()).unwrap_or_default();
    let sig_params = signature.as_ref().map(|s| s.params.clone());
    let params: Vec<ParamInfo> = match sig_params {
        Some(sig_params) if sig_params.len() <= desc_params.len() => {
            let synthetic_count = desc_params.len() - sig_params.len();
            desc_params
                .iter()
                .take(synthetic_count)
                .map(|p| ParamInfo {
                    name: Name::from("arg"),
                    ty: convert_type(&scope, p),
                    annotations: Vec::new(),
                    synthetic: true,
                })
                .chain(sig_params.iter().map(|p| ParamInfo {
                    name: Name::from("arg"),
                    ty: convert_type(&scope, p),
                    annotations: Vec::new(),
                    synthetic: false,
                }))
                .collect()
        }
        _ => desc_params
            .iter()
            .map(|p| ParamInfo {
                name: Name::from("arg"),
                ty: convert_type(&scope, p),
                annotations: Vec::new(),
                synthetic: false,
            })
            .collect(),
    };

    let ret = match (&signature, &descriptor) {
        (Some(sig), _) => sig
            .ret
            .as_ref()
            .map(|r| convert_type(&scope, r))
            .unwrap_or(Type::Void),
        (None, Some(desc)) => desc
            .ret
            .as_ref()
            .map(|r| convert_type(&scope, r))
            .unwrap_or(Type::Void),
        (None, None) => Type::Error,
    };

    let throws = match &signature {
        Some(sig) if !sig.throws.is_empty() => {
            sig.throws.iter().map(|t| convert_type(&scope, t)).collect()
        }
        _ => method
            .exceptions
            .iter()
            .map(|name| Type::class(ClassSymbol::new(name.as_str())))
            .collect(),
    };

    let default_value = method.default_value.as_ref().map(convert_element_value);

    MethodInfo {
        sym,
        typarams,
        typaram_info,
        ret,
        params,
        throws,
        access: method.access,
        default_value,
        annotations: method.annotations.iter().map(convert_annotation).collect(),
        decl: None,
    }
}

fn convert_typaram_bounds(scope: &SigScope, tp: &cf::TyParamSig) -> TyVarInfo {
    TyVarInfo {
        class_bound: tp.class_bound.as_ref().map(|b| convert_type(scope, b)),
        interface_bounds: tp
            .interface_bounds
            .iter()
            .map(|b| convert_type(scope, b))
            .collect(),
    }
}

fn convert_type(scope: &SigScope, sig: &TySig) -> Type {
    match sig {
        TySig::Base(base) => Type::Prim(convert_base(*base)),
        TySig::TyVar(name) => match scope.resolve(name) {
            Some(sym) => Type::tyvar(sym),
            None => Type::Error,
        },
        TySig::Array(elem) => Type::array(convert_type(scope, elem)),
        TySig::Class(class) => Type::Class(convert_class_ty(scope, class)),
    }
}

fn convert_class_ty(scope: &SigScope, sig: &ClassTySig) -> ClassTy {
    let mut segments = Vec::with_capacity(sig.classes.len());
    let mut binary = String::new();
    if !sig.package.is_empty() {
        binary.push_str(&sig.package);
        binary.push('/');
    }
    for (i, simple) in sig.classes.iter().enumerate() {
        if i > 0 {
            binary.push('$');
        }
        binary.push_str(&simple.name);
        let targs = simple
            .targs
            .iter()
            .map(|targ| match targ {
                TyArgSig::Wild => Type::Wild {
                    bound: WildcardBound::Unbounded,
                    annos: Vec::new(),
                },
                TyArgSig::Extends(t) => Type::Wild {
                    bound: WildcardBound::Extends(Box::new(convert_type(scope, t))),
                    annos: Vec::new(),
                },
                TyArgSig::Super(t) => Type::Wild {
                    bound: WildcardBound::Super(Box::new(convert_type(scope, t))),
                    annos: Vec::new(),
                },
                TyArgSig::Concrete(t) => convert_type(scope, t),
            })
            .collect();
        segments.push(SimpleClassTy::new(ClassSymbol::new(binary.as_str()), targs));
    }
    ClassTy::new(segments)
}

fn convert_base(base: cf::BaseType) -> PrimKind {
    match base {
        cf::BaseType::Boolean => PrimKind::Boolean,
        cf::BaseType::Byte => PrimKind::Byte,
        cf::BaseType::Char => PrimKind::Char,
        cf::BaseType::Short => PrimKind::Short,
        cf::BaseType::Int => PrimKind::Int,
        cf::BaseType::Long => PrimKind::Long,
        cf::BaseType::Float => PrimKind::Float,
        cf::BaseType::Double => PrimKind::Double,
    }
}

fn convert_annotation(anno: &cf::AnnotationInfo) -> AnnoInfo {
    let sym = descriptor_to_sym(&anno.type_descriptor);
    let mut info = AnnoInfo::new(sym, Vec::new());
    for (name, value) in &anno.values {
        info.values
            .insert(Name::from(name.as_str()), convert_element_value(value));
    }
    info
}

fn convert_element_value(value: &cf::ElementValue) -> Const {
    match value {
        cf::ElementValue::Const(cv) => Const::Value(match cv {
            cf::ConstValue::Boolean(v) => Value::Boolean(*v),
            cf::ConstValue::Byte(v) => Value::Byte(*v),
            cf::ConstValue::Char(v) => Value::Char(*v),
            cf::ConstValue::Short(v) => Value::Short(*v),
            cf::ConstValue::Int(v) => Value::Int(*v),
            cf::ConstValue::Long(v) => Value::Long(*v),
            cf::ConstValue::Float(v) => Value::Float(*v),
            cf::ConstValue::Double(v) => Value::Double(*v),
            cf::ConstValue::Str(v) => Value::Str(v.clone()),
        }),
        cf::ElementValue::Enum {
            type_descriptor,
            name,
        } => Const::Enum(EnumRef {
            owner: descriptor_to_sym(type_descriptor),
            name: Name::from(name.as_str()),
        }),
        cf::ElementValue::Class { descriptor } => {
            let ty = cf::parse_type_signature(descriptor)
                .map(|sig| convert_type(&SigScope::empty(), &sig))
                .unwrap_or(Type::Error);
            Const::ClassLit(ty)
        }
        cf::ElementValue::Anno(anno) => Const::Anno(convert_annotation(anno)),
        cf::ElementValue::Array(values) => {
            Const::Array(values.iter().map(convert_element_value).collect())
        }
    }
}

/// `Lp/Outer$Inner;` → symbol. Falls back to the sentinel on malformed
/// input.
fn descriptor_to_sym(descriptor: &str) -> ClassSymbol {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .map(ClassSymbol::new)
        .unwrap_or_else(ClassSymbol::error)
}

/// `ConstantValue` entries store booleans, bytes, shorts, and chars as
/// pool integers; the field descriptor recovers the declared kind.
fn reinterpret_constant(value: &cf::ConstValue, descriptor: &str) -> Value {
    match (value, descriptor) {
        (cf::ConstValue::Int(v), "Z") => Value::Boolean(*v != 0),
        (cf::ConstValue::Int(v), "B") => Value::Byte(*v as i8),
        (cf::ConstValue::Int(v), "C") => Value::Char(*v as u16),
        (cf::ConstValue::Int(v), "S") => Value::Short(*v as i16),
        (cf::ConstValue::Int(v), _) => Value::Int(*v),
        (cf::ConstValue::Long(v), _) => Value::Long(*v),
        (cf::ConstValue::Float(v), _) => Value::Float(*v),
        (cf::ConstValue::Double(v), _) => Value::Double(*v),
        (cf::ConstValue::Str(v), _) => Value::Str(v.clone()),
        (cf::ConstValue::Boolean(v), _) => Value::Boolean(*v),
        (cf::ConstValue::Byte(v), _) => Value::Byte(*v),
        (cf::ConstValue::Char(v), _) => Value::Char(*v),
        (cf::ConstValue::Short(v), _) => Value::Short(*v),
    }
}
