//! Diagnostics collected during binding.
//!
//! Recoverable problems accumulate in a sink while binding continues with
//! sentinel substitutions; callers gate emission on the sink being empty.

use quill_core::{LineCol, Span};
use quill_model::tree::CompUnit;
use std::fmt;

/// The closed set of reportable conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagKind {
    ParseError,
    DuplicateType,
    SymbolNotFound,
    AmbiguousName,
    CyclicHierarchy,
    CyclicConstant,
    NotAConstant,
    BadAnnotationValue,
    ClassPathDecodeError,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub path: String,
    pub position: LineCol,
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic anchored at `span` inside `unit`.
    pub fn at(unit: &CompUnit, span: Span, kind: DiagKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: unit.source.path.clone(),
            position: unit.source.line_index().line_col(span.start),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path, self.position.line, self.position.col, self.message
        )
    }
}

#[must_use]
pub fn duplicate_type(unit: &CompUnit, span: Span, name: &str) -> Diagnostic {
    Diagnostic::at(
        unit,
        span,
        DiagKind::DuplicateType,
        format!("duplicate declaration of `{name}`"),
    )
}

#[must_use]
pub fn symbol_not_found(unit: &CompUnit, span: Span, name: &str) -> Diagnostic {
    Diagnostic::at(
        unit,
        span,
        DiagKind::SymbolNotFound,
        format!("symbol `{name}` not found"),
    )
}

#[must_use]
pub fn ambiguous_name(unit: &CompUnit, span: Span, name: &str, candidates: &[String]) -> Diagnostic {
    let mut message = format!("`{name}` is ambiguous");
    if !candidates.is_empty() {
        message.push_str(": ");
        message.push_str(&candidates.join(", "));
    }
    Diagnostic::at(unit, span, DiagKind::AmbiguousName, message)
}

#[must_use]
pub fn cyclic_hierarchy(unit: &CompUnit, span: Span, name: &str) -> Diagnostic {
    Diagnostic::at(
        unit,
        span,
        DiagKind::CyclicHierarchy,
        format!("cycle in the supertype hierarchy of `{name}`"),
    )
}

#[must_use]
pub fn cyclic_constant(unit: &CompUnit, span: Span, name: &str) -> Diagnostic {
    Diagnostic::at(
        unit,
        span,
        DiagKind::CyclicConstant,
        format!("constant `{name}` depends on itself"),
    )
}

#[must_use]
pub fn not_a_constant(unit: &CompUnit, span: Span) -> Diagnostic {
    Diagnostic::at(
        unit,
        span,
        DiagKind::NotAConstant,
        "expression is not a compile-time constant",
    )
}

#[must_use]
pub fn bad_annotation_value(unit: &CompUnit, span: Span, detail: &str) -> Diagnostic {
    Diagnostic::at(
        unit,
        span,
        DiagKind::BadAnnotationValue,
        format!("bad annotation value: {detail}"),
    )
}
