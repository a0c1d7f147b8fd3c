//! The constant-expression evaluator.
//!
//! Evaluation runs over the bound field environment and either produces a
//! [`Const`], or stops: [`EvalStop::Needs`] names a field whose value has
//! not been computed yet (the phase V worklist retries once it is), and
//! [`EvalStop::Fail`] carries the diagnostic for expressions that have no
//! compile-time value at all.

use crate::bound::FieldInfo;
use crate::diag::{self, Diagnostic};
use crate::typebind::{ClassBinder, SimpleRes};
use quill_core::{Name, Span};
use quill_model::constant::{AnnoInfo, BitOp, CmpOp, Const, EnumRef, Value};
use quill_model::flags::access::{ACC_ENUM, ACC_FINAL};
use quill_model::sym::{ClassSymbol, FieldSymbol};
use quill_model::tree::{Anno, BinOp, Expr, TreeTy, UnOp};
use quill_model::ty::{ClassTy, Type};
use std::collections::BTreeMap;

pub(crate) enum EvalStop {
    /// The expression depends on a field not yet evaluated.
    Needs(FieldSymbol),
    Fail(Diagnostic),
}

pub(crate) type EvalResult = Result<Const, EvalStop>;

pub(crate) struct ConstEvaluator<'x, 'e, 'a, 'p> {
    pub binder: &'x mut ClassBinder<'e, 'a, 'p>,
    /// Field constants computed so far this phase.
    pub values: &'x BTreeMap<FieldSymbol, Value>,
}

impl<'x, 'e, 'a, 'p> ConstEvaluator<'x, 'e, 'a, 'p> {
    fn fail(&self, span: Span) -> EvalStop {
        EvalStop::Fail(diag::not_a_constant(self.binder.unit, span))
    }

    fn fail_anno(&self, span: Span, detail: &str) -> EvalStop {
        EvalStop::Fail(diag::bad_annotation_value(self.binder.unit, span, detail))
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Lit { value, .. } => Ok(Const::Value(value.clone())),
            Expr::Ident { span, name } => self.resolve_ident(*span, name),
            Expr::Select { span, .. } => self.resolve_select(*span, expr),
            Expr::ClassLit { ty, .. } => Ok(Const::ClassLit(self.binder.bind_ty(ty))),
            Expr::Unary { span, op, operand } => {
                let value = self.eval_value(operand)?;
                let result = match op {
                    UnOp::Plus => value.promote(),
                    UnOp::Neg => value.neg(),
                    UnOp::BitNot => value.bit_not(),
                    UnOp::Not => value.logical_not(),
                };
                result.map(Const::Value).ok_or_else(|| self.fail(*span))
            }
            Expr::Binary { span, op, lhs, rhs } => self.eval_binary(*span, *op, lhs, rhs),
            Expr::Conditional {
                span,
                cond,
                then_value,
                else_value,
            } => {
                // All three operands must be constant.
                let cond = self.eval_value(cond)?;
                let then_value = self.eval(then_value)?;
                let else_value = self.eval(else_value)?;
                match cond {
                    Value::Boolean(true) => Ok(then_value),
                    Value::Boolean(false) => Ok(else_value),
                    _ => Err(self.fail(*span)),
                }
            }
            Expr::Cast { span, ty, operand } => {
                let value = self.eval_value(operand)?;
                match ty {
                    TreeTy::Prim(kind) => value
                        .cast_prim(*kind)
                        .map(Const::Value)
                        .ok_or_else(|| self.fail(*span)),
                    // Among reference types, only a String cast keeps an
                    // expression constant.
                    TreeTy::Class(_) => {
                        let bound = self.binder.bind_ty(ty);
                        if bound.is_string() && value.is_string() {
                            Ok(Const::Value(value))
                        } else {
                            Err(self.fail(*span))
                        }
                    }
                    _ => Err(self.fail(*span)),
                }
            }
            Expr::ArrayInit { elems, .. } => {
                let mut values = Vec::with_capacity(elems.len());
                for elem in elems {
                    values.push(self.eval(elem)?);
                }
                Ok(Const::Array(values))
            }
            Expr::AnnoExpr { anno, .. } => Ok(Const::Anno(self.eval_anno(anno)?)),
            Expr::Assign { span, .. } => Err(self.fail(*span)),
        }
    }

    fn eval_value(&mut self, expr: &Expr) -> Result<Value, EvalStop> {
        match self.eval(expr)? {
            Const::Value(value) => Ok(value),
            _ => Err(self.fail(expr.span())),
        }
    }

    fn eval_binary(&mut self, span: Span, op: BinOp, lhs: &Expr, rhs: &Expr) -> EvalResult {
        let a = self.eval_value(lhs)?;
        let b = self.eval_value(rhs)?;
        let result = match op {
            BinOp::Add if a.is_string() || b.is_string() => Some(Value::Str(format!(
                "{}{}",
                a.to_java_string(),
                b.to_java_string()
            ))),
            BinOp::Add => a.add(&b),
            BinOp::Sub => a.sub(&b),
            BinOp::Mul => a.mul(&b),
            BinOp::Div => a.div(&b),
            BinOp::Rem => a.rem(&b),
            BinOp::Shl => a.shl(&b),
            BinOp::Shr => a.shr(&b),
            BinOp::Ushr => a.ushr(&b),
            BinOp::Lt => a.compare(CmpOp::Lt, &b),
            BinOp::Le => a.compare(CmpOp::Le, &b),
            BinOp::Gt => a.compare(CmpOp::Gt, &b),
            BinOp::Ge => a.compare(CmpOp::Ge, &b),
            BinOp::Eq => a.equals(&b),
            BinOp::Ne => a
                .equals(&b)
                .and_then(|v| v.logical_not()),
            BinOp::BitAnd => a.bitwise(BitOp::And, &b),
            BinOp::BitOr => a.bitwise(BitOp::Or, &b),
            BinOp::BitXor => a.bitwise(BitOp::Xor, &b),
            BinOp::AndAnd => match (&a, &b) {
                (Value::Boolean(x), Value::Boolean(y)) => Some(Value::Boolean(*x && *y)),
                _ => None,
            },
            BinOp::OrOr => match (&a, &b) {
                (Value::Boolean(x), Value::Boolean(y)) => Some(Value::Boolean(*x || *y)),
                _ => None,
            },
        };
        result.map(Const::Value).ok_or_else(|| self.fail(span))
    }

    // === Name resolution =====================================================

    /// A bare identifier: a constant field of the enclosing classes or a
    /// static import.
    fn resolve_ident(&mut self, span: Span, name: &Name) -> EvalResult {
        for start in self.binder.enclosing_syms() {
            if let Some((owner, field)) = self.find_field(&start, name.as_str()) {
                return self.field_const(span, owner, &field);
            }
        }
        if let Some(owner) = self.binder.unit_scope.static_singles.get(name).cloned() {
            if let Some((owner, field)) = self.find_field(&owner, name.as_str()) {
                return self.field_const(span, owner, &field);
            }
        }
        for owner in self.binder.unit_scope.static_on_demand.clone() {
            if let Some((owner, field)) = self.find_field(&owner, name.as_str()) {
                return self.field_const(span, owner, &field);
            }
        }
        Err(self.fail(span))
    }

    /// `a.b.C.F`: the prefix names a type, the final segment a constant
    /// field.
    fn resolve_select(&mut self, span: Span, expr: &Expr) -> EvalResult {
        let Some(path) = flatten_select(expr) else {
            return Err(self.fail(span));
        };
        let (field_name, type_path) = path.split_last().expect("non-empty select");
        let Some(owner) = self.resolve_type_path(type_path) else {
            return Err(self.fail(span));
        };
        match self.find_field(&owner, field_name.as_str()) {
            Some((owner, field)) => self.field_const(span, owner, &field),
            None => Err(self.fail(span)),
        }
    }

    /// Resolves a dotted name to a class: simple resolution of the head,
    /// member descent, then package-qualified fallback.
    fn resolve_type_path(&mut self, path: &[Name]) -> Option<ClassSymbol> {
        let head = path.first()?;
        match self.binder.resolve_simple(head.as_str()) {
            SimpleRes::Class(mut sym) => {
                for segment in &path[1..] {
                    sym = self.binder.find_member(&sym, segment.as_str())?;
                }
                Some(sym)
            }
            SimpleRes::NotFound if path.len() > 1 => self.binder.index.resolve_canonical(path),
            _ => None,
        }
    }

    fn find_field(
        &mut self,
        start: &ClassSymbol,
        name: &str,
    ) -> Option<(ClassSymbol, FieldInfo<'a>)> {
        match self.binder.env.find_field(start, name) {
            Ok(found) => found,
            Err(error) => {
                self.binder.record_fatal(error);
                None
            }
        }
    }

    /// The constant a resolved field contributes.
    fn field_const(
        &mut self,
        span: Span,
        owner: ClassSymbol,
        field: &FieldInfo<'a>,
    ) -> EvalResult {
        if field.access & ACC_ENUM != 0 {
            return Ok(Const::Enum(EnumRef {
                owner,
                name: field.sym.name.clone(),
            }));
        }
        if let Some(value) = self.values.get(&field.sym) {
            return Ok(Const::Value(value.clone()));
        }
        if let Some(value) = &field.value {
            return Ok(Const::Value(value.clone()));
        }
        if field_is_constant_candidate(field) {
            return Err(EvalStop::Needs(field.sym.clone()));
        }
        Err(self.fail(span))
    }

    // === Annotation uses =====================================================

    /// Resolves and evaluates an annotation use, type-directing each
    /// element value by the annotation class's method signatures.
    pub(crate) fn eval_anno(&mut self, anno: &Anno) -> Result<AnnoInfo, EvalStop> {
        let sym = self.binder.resolve_anno_name(anno);
        let mut info = AnnoInfo::new(sym.clone(), anno.args.clone());
        info.values = self.eval_anno_args(&sym, &anno.args)?;
        Ok(info)
    }

    /// Evaluates an already-bound annotation's raw arguments.
    pub(crate) fn eval_anno_info(&mut self, info: &AnnoInfo) -> Result<AnnoInfo, EvalStop> {
        let mut out = AnnoInfo::new(info.sym.clone(), info.args.clone());
        out.values = self.eval_anno_args(&info.sym, &info.args)?;
        Ok(out)
    }

    fn eval_anno_args(
        &mut self,
        sym: &ClassSymbol,
        args: &[Expr],
    ) -> Result<BTreeMap<Name, Const>, EvalStop> {
        let mut values = BTreeMap::new();
        for arg in args {
            let (name, value_expr) = match arg {
                Expr::Assign { name, value, .. } => (name.clone(), value.as_ref()),
                other => (Name::from("value"), other),
            };
            let value = self.eval(value_expr)?;
            let coerced = match self.element_type(sym, &name) {
                Some(element_ty) => coerce_const(value, &element_ty)
                    .map_err(|detail| self.fail_anno(value_expr.span(), &detail))?,
                None if sym.is_error() => value,
                None => {
                    return Err(self.fail_anno(
                        arg.span(),
                        &format!("no element named `{name}` on `{sym}`"),
                    ))
                }
            };
            values.insert(name, coerced);
        }
        Ok(values)
    }

    /// The declared type of element `name` on annotation `sym`.
    fn element_type(&mut self, sym: &ClassSymbol, name: &Name) -> Option<Type> {
        let handle = match self.binder.env.get(sym) {
            Ok(handle) => handle?,
            Err(error) => {
                self.binder.record_fatal(error);
                return None;
            }
        };
        let class = handle.get();
        class
            .methods
            .iter()
            .find(|m| &m.sym.name == name)
            .map(|m| m.ret.clone())
    }
}

/// Whether a field can still become a constant: `final`, initialized,
/// of primitive or `String` type.
pub(crate) fn field_is_constant_candidate(field: &FieldInfo<'_>) -> bool {
    field.access & ACC_FINAL != 0
        && field.decl.is_some_and(|decl| decl.init.is_some())
        && (matches!(field.ty, Type::Prim(_)) || field.ty.is_string())
}

/// Flattens `a.b.c` selects into segments; `None` if any link is not a
/// plain identifier.
fn flatten_select(expr: &Expr) -> Option<Vec<Name>> {
    match expr {
        Expr::Ident { name, .. } => Some(vec![name.clone()]),
        Expr::Select { base, name, .. } => {
            let mut path = flatten_select(base)?;
            path.push(name.clone());
            Some(path)
        }
        _ => None,
    }
}

/// Conversion of an evaluated constant to an annotation element's
/// declared type: array wrapping, primitive assignment conversion, and
/// shape checks for class, enum, and nested-annotation elements.
pub(crate) fn coerce_const(value: Const, ty: &Type) -> Result<Const, String> {
    match ty {
        Type::Array { elem, .. } => match value {
            Const::Array(values) => values
                .into_iter()
                .map(|v| coerce_const(v, elem))
                .collect::<Result<Vec<_>, _>>()
                .map(Const::Array),
            single => Ok(Const::Array(vec![coerce_const(single, elem)?])),
        },
        Type::Prim(kind) => match value {
            Const::Value(v) => v
                .assign_prim(*kind)
                .map(Const::Value)
                .ok_or_else(|| format!("value is not assignable to `{kind}`")),
            _ => Err(format!("expected a `{kind}` value")),
        },
        Type::Class(class) => coerce_to_class(value, class),
        Type::Error => Ok(value),
        _ => Ok(value),
    }
}

fn coerce_to_class(value: Const, class: &ClassTy) -> Result<Const, String> {
    let sym = class.sym();
    if *sym == ClassSymbol::string() {
        return match value {
            Const::Value(Value::Str(_)) => Ok(value),
            _ => Err("expected a string".to_string()),
        };
    }
    if sym.binary_name() == "java/lang/Class" {
        return match value {
            Const::ClassLit(_) => Ok(value),
            _ => Err("expected a class literal".to_string()),
        };
    }
    match value {
        Const::Enum(_) | Const::Anno(_) => Ok(value),
        // Elements typed `Object` or an error sentinel pass through.
        other => Ok(other),
    }
}
