//! Erasure and signature generation.
//!
//! Descriptors use the erased form: type variables erase to their
//! leftmost bound, parameterized classes to the raw class, arrays
//! per-dimension. Signatures keep the generic structure and are only
//! requested when a declaration actually carries one.

use quill_binder::{BinderError, ClassEnv, TyVarInfo};
use quill_classfile::sig::{ClassSig, ClassTySig, MethodSig, SimpleClassTySig, TyArgSig, TyParamSig, TySig};
use quill_classfile::{write_class_signature, write_method_signature, write_type_signature, BaseType};
use quill_model::sym::TyVarSymbol;
use quill_model::ty::{ClassTy, PrimKind, Type, WildcardBound};

pub(crate) struct SigLower<'x, 'e, 'a, 'p> {
    pub env: &'x ClassEnv<'e, 'a, 'p>,
}

impl SigLower<'_, '_, '_, '_> {
    // === Erasure =============================================================

    /// The erased binary name of a reference type.
    pub fn erased_name(&self, ty: &Type) -> Result<String, BinderError> {
        Ok(match self.erase(ty)? {
            TySig::Class(class) => class.binary_name(),
            _ => "java/lang/Object".to_string(),
        })
    }

    pub fn erase(&self, ty: &Type) -> Result<TySig, BinderError> {
        Ok(match ty {
            Type::Prim(kind) => TySig::Base(base_of(*kind)),
            Type::Class(class) => TySig::Class(ClassTySig::raw(class.sym().binary_name())),
            Type::Array { elem, .. } => TySig::Array(Box::new(self.erase(elem)?)),
            Type::TyVar { sym, .. } => {
                let bound = self.leftmost_bound(sym)?;
                self.erase(&bound)?
            }
            Type::Wild { bound, .. } => match bound {
                WildcardBound::Extends(inner) => self.erase(inner)?,
                _ => TySig::Class(ClassTySig::raw("java/lang/Object")),
            },
            Type::Void | Type::Error => TySig::Class(ClassTySig::raw("java/lang/Object")),
        })
    }

    fn leftmost_bound(&self, sym: &TyVarSymbol) -> Result<Type, BinderError> {
        let info = self.env.tyvar_info(sym)?.unwrap_or_default();
        Ok(bound_or_object(&info))
    }

    pub fn field_descriptor(&self, ty: &Type) -> Result<String, BinderError> {
        Ok(write_type_signature(&self.erase(ty)?))
    }

    pub fn method_descriptor(&self, params: &[Type], ret: &Type) -> Result<String, BinderError> {
        let mut out = String::from("(");
        for param in params {
            out.push_str(&write_type_signature(&self.erase(param)?));
        }
        out.push(')');
        match ret {
            Type::Void => out.push('V'),
            other => out.push_str(&write_type_signature(&self.erase(other)?)),
        }
        Ok(out)
    }

    // === Signatures ==========================================================

    /// A field or component signature string.
    pub fn type_signature(&self, ty: &Type) -> String {
        write_type_signature(&self.signature_ty(ty))
    }

    /// A class signature, when the declaration needs one: it has type
    /// parameters, or a parameterized or variable supertype.
    pub fn class_signature(
        &self,
        typarams: &[TyVarSymbol],
        typaram_info: impl Fn(&TyVarSymbol) -> TyVarInfo,
        superclass: &Option<Type>,
        interfaces: &[Type],
    ) -> Option<String> {
        let needed = !typarams.is_empty()
            || superclass.as_ref().is_some_and(Type::is_generic)
            || interfaces.iter().any(Type::is_generic);
        if !needed {
            return None;
        }
        let sig = ClassSig {
            typarams: typarams
                .iter()
                .map(|tv| self.typaram_sig(tv, typaram_info(tv)))
                .collect(),
            superclass: match superclass {
                Some(Type::Class(class)) => self.class_ty_sig(class),
                _ => ClassTySig::raw("java/lang/Object"),
            },
            interfaces: interfaces
                .iter()
                .map(|i| match i {
                    Type::Class(class) => self.class_ty_sig(class),
                    _ => ClassTySig::raw("java/lang/Object"),
                })
                .collect(),
        };
        Some(write_class_signature(&sig))
    }

    /// A method signature, when the declaration is generic or mentions
    /// type variables or parameterized types. Synthetic parameters never
    /// appear in it.
    pub fn method_signature(
        &self,
        typarams: &[TyVarSymbol],
        typaram_info: impl Fn(&TyVarSymbol) -> TyVarInfo,
        params: &[&Type],
        ret: &Type,
        throws: &[Type],
    ) -> Option<String> {
        let needed = !typarams.is_empty()
            || params.iter().any(|p| p.is_generic())
            || ret.is_generic()
            || throws.iter().any(Type::is_generic);
        if !needed {
            return None;
        }
        let include_throws = throws.iter().any(Type::is_generic);
        let sig = MethodSig {
            typarams: typarams
                .iter()
                .map(|tv| self.typaram_sig(tv, typaram_info(tv)))
                .collect(),
            params: params.iter().map(|p| self.signature_ty(p)).collect(),
            ret: match ret {
                Type::Void => None,
                other => Some(self.signature_ty(other)),
            },
            throws: if include_throws {
                throws.iter().map(|t| self.signature_ty(t)).collect()
            } else {
                Vec::new()
            },
        };
        Some(write_method_signature(&sig))
    }

    fn typaram_sig(&self, sym: &TyVarSymbol, info: TyVarInfo) -> TyParamSig {
        let class_bound = match (&info.class_bound, info.interface_bounds.is_empty()) {
            (Some(bound), _) => Some(self.signature_ty(bound)),
            // An unbounded parameter still needs a class bound in the
            // attribute grammar.
            (None, true) => Some(TySig::Class(ClassTySig::raw("java/lang/Object"))),
            (None, false) => None,
        };
        TyParamSig {
            name: sym.name.as_str().to_string(),
            class_bound,
            interface_bounds: info
                .interface_bounds
                .iter()
                .map(|b| self.signature_ty(b))
                .collect(),
        }
    }

    pub fn signature_ty(&self, ty: &Type) -> TySig {
        match ty {
            Type::Prim(kind) => TySig::Base(base_of(*kind)),
            Type::TyVar { sym, .. } => TySig::TyVar(sym.name.as_str().to_string()),
            Type::Array { elem, .. } => TySig::Array(Box::new(self.signature_ty(elem))),
            Type::Class(class) => TySig::Class(self.class_ty_sig(class)),
            Type::Void | Type::Error | Type::Wild { .. } => {
                TySig::Class(ClassTySig::raw("java/lang/Object"))
            }
        }
    }

    /// Renders segments: raw enclosing levels merge into the head simple
    /// name with `$`; once a level is parameterized, deeper levels become
    /// `.` suffixes.
    fn class_ty_sig(&self, class: &ClassTy) -> ClassTySig {
        let head_binary = class.segments[0].sym.binary_name();
        let (package, head_simple) = match head_binary.rsplit_once('/') {
            Some((pkg, simple)) => (pkg.to_string(), simple.to_string()),
            None => (String::new(), head_binary.to_string()),
        };

        let mut classes: Vec<SimpleClassTySig> = vec![SimpleClassTySig {
            name: head_simple,
            targs: class.segments[0]
                .targs
                .iter()
                .map(|t| self.targ_sig(t))
                .collect(),
        }];
        for window in class.segments.windows(2) {
            let (outer, inner) = (&window[0], &window[1]);
            let suffix = inner
                .sym
                .binary_name()
                .strip_prefix(outer.sym.binary_name())
                .and_then(|rest| rest.strip_prefix('$'))
                .unwrap_or(inner.sym.simple_name());
            let targs: Vec<TyArgSig> = inner.targs.iter().map(|t| self.targ_sig(t)).collect();
            let merged_raw = classes.iter().all(|c| c.targs.is_empty()) && targs.is_empty();
            if merged_raw {
                let head = classes.last_mut().expect("head segment");
                head.name.push('$');
                head.name.push_str(suffix);
            } else {
                classes.push(SimpleClassTySig {
                    name: suffix.to_string(),
                    targs,
                });
            }
        }
        ClassTySig { package, classes }
    }

    fn targ_sig(&self, ty: &Type) -> TyArgSig {
        match ty {
            Type::Wild { bound, .. } => match bound {
                WildcardBound::Unbounded => TyArgSig::Wild,
                WildcardBound::Extends(inner) => TyArgSig::Extends(self.signature_ty(inner)),
                WildcardBound::Super(inner) => TyArgSig::Super(self.signature_ty(inner)),
            },
            other => TyArgSig::Concrete(self.signature_ty(other)),
        }
    }
}

fn bound_or_object(info: &TyVarInfo) -> Type {
    info.class_bound
        .clone()
        .or_else(|| info.interface_bounds.first().cloned())
        .unwrap_or_else(Type::object)
}

fn base_of(kind: PrimKind) -> BaseType {
    match kind {
        PrimKind::Boolean => BaseType::Boolean,
        PrimKind::Byte => BaseType::Byte,
        PrimKind::Char => BaseType::Char,
        PrimKind::Short => BaseType::Short,
        PrimKind::Int => BaseType::Int,
        PrimKind::Long => BaseType::Long,
        PrimKind::Float => BaseType::Float,
        PrimKind::Double => BaseType::Double,
    }
}
