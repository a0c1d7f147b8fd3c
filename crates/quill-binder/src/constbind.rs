//! Phase V: constants.
//!
//! Field initializers are evaluated on an explicit worklist in (class
//! topological order, declaration order). A retry queue replaces
//! exception-driven suspension: an evaluation that stops on a
//! not-yet-computed field re-runs once something else resolves, and when
//! an iteration makes no progress every survivor is a `CyclicConstant`.
//! With field constants fixed, annotation element values, annotation
//! method defaults, and retention policies are computed in one pass.

use crate::bound::TypeBoundClass;
use crate::consteval::{coerce_const, field_is_constant_candidate, ConstEvaluator, EvalStop};
use crate::cpenv::{retention_of, ClassPathEnv};
use crate::diag::{self, Diagnostic};
use crate::hierarchy::HierarchyBound;
use crate::preprocess::NameBound;
use crate::scope::UnitScope;
use crate::typebind::ClassBinder;
use crate::BinderError;
use quill_model::constant::{AnnoInfo, Const, Value};
use quill_model::sym::{ClassSymbol, FieldSymbol};
use quill_model::tree::{CompUnit, TyKind};
use quill_model::ty::Type;
use std::collections::BTreeMap;
use tracing::debug;

pub fn bind_consts<'a>(
    units: &'a [CompUnit],
    names: &NameBound<'a>,
    scopes: &[UnitScope],
    hierarchy: &HierarchyBound,
    classpath: &ClassPathEnv<'_>,
    mut classes: BTreeMap<ClassSymbol, TypeBoundClass<'a>>,
    diags: &mut Vec<Diagnostic>,
) -> Result<BTreeMap<ClassSymbol, TypeBoundClass<'a>>, BinderError> {
    let values = evaluate_fields(
        units, names, scopes, hierarchy, classpath, &classes, diags,
    )?;

    for (field_sym, value) in &values {
        if let Some(class) = classes.get_mut(&field_sym.owner) {
            if let Some(field) = class.fields.iter_mut().find(|f| &f.sym == field_sym) {
                field.value = Some(value.clone());
            }
        }
    }

    evaluate_annotations(
        units, names, scopes, hierarchy, classpath, &mut classes, &values, diags,
    )?;

    for sym in &hierarchy.topo {
        let retention = match classes.get(sym) {
            Some(class) if class.kind == TyKind::Annotation => {
                Some(retention_of(&class.annotations))
            }
            _ => None,
        };
        if let Some(retention) = retention {
            if let Some(class) = classes.get_mut(sym) {
                class.retention = Some(retention);
            }
        }
    }

    debug!(constants = values.len(), "constants bound");
    Ok(classes)
}

struct FieldTask {
    owner: ClassSymbol,
    field: FieldSymbol,
}

#[allow(clippy::too_many_arguments)]
fn evaluate_fields<'a>(
    units: &'a [CompUnit],
    names: &NameBound<'a>,
    scopes: &[UnitScope],
    hierarchy: &HierarchyBound,
    classpath: &ClassPathEnv<'_>,
    classes: &BTreeMap<ClassSymbol, TypeBoundClass<'a>>,
    diags: &mut Vec<Diagnostic>,
) -> Result<BTreeMap<FieldSymbol, Value>, BinderError> {
    let mut pending = Vec::new();
    for sym in &hierarchy.topo {
        let class = &classes[sym];
        for field in &class.fields {
            if field_is_constant_candidate(field) {
                pending.push(FieldTask {
                    owner: sym.clone(),
                    field: field.sym.clone(),
                });
            }
        }
    }

    let mut values: BTreeMap<FieldSymbol, Value> = BTreeMap::new();
    loop {
        let mut progressed = false;
        let mut still_pending = Vec::new();
        for task in pending {
            let pc = &names.classes[&task.owner];
            let class = &classes[&task.owner];
            let field = class
                .fields
                .iter()
                .find(|f| f.sym == task.field)
                .expect("task field");
            let decl = field.decl.expect("constant candidate has a declaration");
            let init = decl.init.as_ref().expect("constant candidate has an initializer");

            let mut binder =
                ClassBinder::new(units, names, scopes, hierarchy, classpath, classes, pc);
            let result = ConstEvaluator {
                binder: &mut binder,
                values: &values,
            }
            .eval(init);
            let (mut local_diags, fatal) = binder.finish();
            diags.append(&mut local_diags);
            if let Some(error) = fatal {
                return Err(error);
            }

            match result {
                Ok(Const::Value(value)) => match assign_to_field_type(&value, &field.ty) {
                    Some(coerced) => {
                        values.insert(task.field, coerced);
                        progressed = true;
                    }
                    None => {
                        diags.push(diag::not_a_constant(&units[pc.unit], init.span()));
                    }
                },
                Ok(_) => diags.push(diag::not_a_constant(&units[pc.unit], init.span())),
                Err(EvalStop::Needs(_)) => still_pending.push(task),
                Err(EvalStop::Fail(diag)) => diags.push(diag),
            }
        }

        if still_pending.is_empty() {
            break;
        }
        if !progressed {
            for task in &still_pending {
                let pc = &names.classes[&task.owner];
                let class = &classes[&task.owner];
                let span = class
                    .fields
                    .iter()
                    .find(|f| f.sym == task.field)
                    .and_then(|f| f.decl)
                    .map(|d| d.span)
                    .unwrap_or_default();
                diags.push(diag::cyclic_constant(
                    &units[pc.unit],
                    span,
                    task.field.name.as_str(),
                ));
            }
            break;
        }
        pending = still_pending;
    }
    Ok(values)
}

/// Assignment conversion of an initializer value to the field's declared
/// type.
fn assign_to_field_type(value: &Value, ty: &Type) -> Option<Value> {
    match ty {
        Type::Prim(kind) => value.assign_prim(*kind),
        _ if ty.is_string() => match value {
            Value::Str(_) => Some(value.clone()),
            _ => None,
        },
        _ => None,
    }
}

struct MethodUpdate {
    annotations: Vec<AnnoInfo>,
    param_annotations: Vec<Vec<AnnoInfo>>,
    default_value: Option<Const>,
}

struct ClassUpdate {
    annotations: Vec<AnnoInfo>,
    field_annotations: Vec<Vec<AnnoInfo>>,
    methods: Vec<MethodUpdate>,
}

#[allow(clippy::too_many_arguments)]
fn evaluate_annotations<'a>(
    units: &'a [CompUnit],
    names: &NameBound<'a>,
    scopes: &[UnitScope],
    hierarchy: &HierarchyBound,
    classpath: &ClassPathEnv<'_>,
    classes: &mut BTreeMap<ClassSymbol, TypeBoundClass<'a>>,
    values: &BTreeMap<FieldSymbol, Value>,
    diags: &mut Vec<Diagnostic>,
) -> Result<(), BinderError> {
    for sym in &hierarchy.topo {
        let pc = &names.classes[sym];
        let update = {
            let class = &classes[sym];
            let mut binder =
                ClassBinder::new(units, names, scopes, hierarchy, classpath, classes, pc);
            let mut evaluator = ConstEvaluator {
                binder: &mut binder,
                values,
            };

            let annotations = eval_annos(&mut evaluator, &class.annotations, diags);
            let field_annotations = class
                .fields
                .iter()
                .map(|f| eval_annos(&mut evaluator, &f.annotations, diags))
                .collect();
            let methods = class
                .methods
                .iter()
                .map(|m| {
                    let annotations = eval_annos(&mut evaluator, &m.annotations, diags);
                    let param_annotations = m
                        .params
                        .iter()
                        .map(|p| eval_annos(&mut evaluator, &p.annotations, diags))
                        .collect();
                    let default_value = m
                        .decl
                        .and_then(|decl| decl.default_value.as_ref())
                        .and_then(|expr| match evaluator.eval(expr) {
                            Ok(value) => match coerce_const(value, &m.ret) {
                                Ok(coerced) => Some(coerced),
                                Err(detail) => {
                                    diags.push(diag::bad_annotation_value(
                                        &units[pc.unit],
                                        expr.span(),
                                        &detail,
                                    ));
                                    None
                                }
                            },
                            Err(EvalStop::Fail(diag)) => {
                                diags.push(diag);
                                None
                            }
                            Err(EvalStop::Needs(_)) => {
                                diags.push(diag::not_a_constant(&units[pc.unit], expr.span()));
                                None
                            }
                        });
                    MethodUpdate {
                        annotations,
                        param_annotations,
                        default_value,
                    }
                })
                .collect();

            let (mut local_diags, fatal) = binder.finish();
            diags.append(&mut local_diags);
            if let Some(error) = fatal {
                return Err(error);
            }
            ClassUpdate {
                annotations,
                field_annotations,
                methods,
            }
        };

        let class = classes.get_mut(sym).expect("bound class");
        class.annotations = update.annotations;
        for (field, annotations) in class.fields.iter_mut().zip(update.field_annotations) {
            field.annotations = annotations;
        }
        for (method, method_update) in class.methods.iter_mut().zip(update.methods) {
            method.annotations = method_update.annotations;
            for (param, annotations) in method
                .params
                .iter_mut()
                .zip(method_update.param_annotations)
            {
                param.annotations = annotations;
            }
            if method.default_value.is_none() {
                method.default_value = method_update.default_value;
            }
        }
    }
    Ok(())
}

/// Evaluates each annotation's raw arguments into element values,
/// keeping the unevaluated form when evaluation fails (emission is gated
/// on the diagnostics anyway).
fn eval_annos(
    evaluator: &mut ConstEvaluator<'_, '_, '_, '_>,
    annos: &[AnnoInfo],
    diags: &mut Vec<Diagnostic>,
) -> Vec<AnnoInfo> {
    annos
        .iter()
        .map(|anno| match evaluator.eval_anno_info(anno) {
            Ok(evaluated) => evaluated,
            Err(EvalStop::Fail(diag)) => {
                diags.push(diag);
                anno.clone()
            }
            Err(EvalStop::Needs(_)) => anno.clone(),
        })
        .collect()
}
