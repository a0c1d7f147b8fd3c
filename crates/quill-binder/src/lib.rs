//! The binder: parsed compilation units in, a bound program out.
//!
//! Five ordered phases, each consuming the previous phase's output:
//!
//! 1. canonical naming ([`preprocess`]) — symbols for every declaration;
//! 2. imports and package scopes ([`scope`]);
//! 3. hierarchy ([`hierarchy`]) — supertype symbols, cycle detection,
//!    topological order;
//! 4. type resolution ([`typebind`]) — bounds, signatures, annotation
//!    uses, synthesized mandated members;
//! 5. constants ([`constbind`]) — the field-initializer worklist,
//!    annotation element values, defaults, and retention.
//!
//! Recoverable problems accumulate as [`Diagnostic`]s while sentinel
//! symbols keep later phases running; the only hard failures are
//! class-path decode errors and internal invariant breaks, surfaced as
//! [`BinderError`].

pub mod bound;
mod constbind;
mod consteval;
mod cpenv;
pub mod diag;
mod hierarchy;
mod preprocess;
mod scope;
mod typebind;

pub use bound::{
    ClassOrigin, FieldInfo, MethodInfo, ParamInfo, Retention, TyVarInfo, TypeBoundClass,
};
pub use cpenv::{retention_of, ClassEnv, ClassHandle, ClassPathEnv};
pub use diag::{DiagKind, Diagnostic};

use quill_model::sym::ClassSymbol;
use quill_model::tree::CompUnit;
use quill_model::ClassBytes;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Unrecoverable binder failures.
#[derive(Debug, Error)]
pub enum BinderError {
    #[error("failed to decode class-path class {sym}: {source}")]
    ClassPathDecode {
        sym: ClassSymbol,
        source: quill_classfile::Error,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

/// The binder's output: fully bound source classes, the order they were
/// bound in, the diagnostics, and the class-path environment (kept so
/// lowering can consult dependency classes).
pub struct BoundProgram<'a, 'p> {
    pub classes: BTreeMap<ClassSymbol, TypeBoundClass<'a>>,
    /// Source classes, supertypes and enclosers first.
    pub topo: Vec<ClassSymbol>,
    pub diagnostics: Vec<Diagnostic>,
    pub classpath: ClassPathEnv<'p>,
}

impl<'a, 'p> BoundProgram<'a, 'p> {
    /// The combined source + class-path view.
    pub fn env(&self) -> ClassEnv<'_, 'a, 'p> {
        ClassEnv {
            source: &self.classes,
            classpath: &self.classpath,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Binds `units` against `classpath`.
pub fn bind<'a, 'p>(
    units: &'a [CompUnit],
    classpath: &'p dyn ClassBytes,
) -> Result<BoundProgram<'a, 'p>, BinderError> {
    let classpath = ClassPathEnv::new(classpath);
    let mut diagnostics = Vec::new();

    let names = preprocess::preprocess(units, &mut diagnostics);
    let scopes = scope::bind_imports(units, &names, &classpath, &mut diagnostics)?;
    let hierarchy = hierarchy::HierarchyBinder::new(units, &names, &scopes, &classpath)
        .bind(&mut diagnostics)?;
    let classes = typebind::bind_types(
        units,
        &names,
        &scopes,
        &hierarchy,
        &classpath,
        &mut diagnostics,
    )?;
    let classes = constbind::bind_consts(
        units,
        &names,
        &scopes,
        &hierarchy,
        &classpath,
        classes,
        &mut diagnostics,
    )?;

    debug!(
        classes = classes.len(),
        diagnostics = diagnostics.len(),
        "binding complete"
    );
    Ok(BoundProgram {
        classes,
        topo: hierarchy.topo,
        diagnostics,
        classpath,
    })
}
