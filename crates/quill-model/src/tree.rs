//! The declaration tree handed to the binder.
//!
//! quill does not parse: an external front end produces these nodes. The
//! tree covers exactly what a header needs — packages, imports, type
//! declarations, member signatures, annotation uses, and the
//! constant-expression subset. Method bodies never appear.
//!
//! Every node carries a byte [`Span`] into the unit's original text so
//! diagnostics can report line/column positions.

use crate::constant::Value;
use crate::flags::Mods;
use crate::ty::PrimKind;
use quill_core::{LineIndex, Name, Span};

/// One parsed source file.
#[derive(Clone, Debug, PartialEq)]
pub struct CompUnit {
    pub source: SourceFile,
    pub pkg: Option<PkgDecl>,
    pub imports: Vec<ImportDecl>,
    pub decls: Vec<TyDecl>,
}

/// The file a unit came from, with its text retained for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn line_index(&self) -> LineIndex {
        LineIndex::new(&self.text)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PkgDecl {
    pub span: Span,
    pub annos: Vec<Anno>,
    /// Dotted segments, e.g. `["com", "example"]`.
    pub name: Vec<Name>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    pub span: Span,
    /// Dotted segments, without the trailing `*`.
    pub path: Vec<Name>,
    pub is_static: bool,
    pub wildcard: bool,
}

/// The declaration kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TyKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TyDecl {
    pub span: Span,
    pub mods: Mods,
    pub annos: Vec<Anno>,
    pub kind: TyKind,
    pub name: Name,
    pub typarams: Vec<TyParam>,
    pub extends: Option<TreeTy>,
    pub implements: Vec<TreeTy>,
    pub members: Vec<TyMember>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TyMember {
    Ty(TyDecl),
    Field(VarDecl),
    Method(MethDecl),
}

/// A field or formal parameter.
///
/// Enum constants arrive as fields marked [`Mods::ENUM_CONSTANT`]; their
/// declared type is ignored (the binder substitutes the enum itself).
#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub span: Span,
    pub mods: Mods,
    pub annos: Vec<Anno>,
    pub ty: TreeTy,
    pub name: Name,
    pub init: Option<Expr>,
}

/// A method or constructor. Constructors use the name `<init>` and a
/// `Void` return type.
#[derive(Clone, Debug, PartialEq)]
pub struct MethDecl {
    pub span: Span,
    pub mods: Mods,
    pub annos: Vec<Anno>,
    pub typarams: Vec<TyParam>,
    pub ret: TreeTy,
    pub name: Name,
    pub params: Vec<VarDecl>,
    pub throws: Vec<TreeTy>,
    /// An annotation method's `default` expression.
    pub default_value: Option<Expr>,
}

impl MethDecl {
    pub fn is_constructor(&self) -> bool {
        self.name.as_str() == "<init>"
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TyParam {
    pub span: Span,
    pub name: Name,
    pub bounds: Vec<TreeTy>,
    pub annos: Vec<Anno>,
}

/// An unresolved type as written in source.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeTy {
    Prim(PrimKind),
    Void,
    /// A dotted, possibly parameterized reference: one segment per written
    /// name part, arguments attached to the segment that declared them.
    Class(Vec<ClassTySeg>),
    Array {
        elem: Box<TreeTy>,
        annos: Vec<Anno>,
    },
    /// Valid only as a type argument.
    Wild {
        span: Span,
        bound: WildTreeBound,
        annos: Vec<Anno>,
    },
}

impl TreeTy {
    /// A raw (argument-free) reference from dotted segments.
    pub fn name(segments: &[&str]) -> TreeTy {
        TreeTy::Class(
            segments
                .iter()
                .map(|s| ClassTySeg {
                    span: Span::default(),
                    name: Name::from(*s),
                    targs: Vec::new(),
                    annos: Vec::new(),
                })
                .collect(),
        )
    }

    pub fn span(&self) -> Span {
        match self {
            TreeTy::Class(segs) => segs.first().map_or(Span::default(), |s| s.span),
            TreeTy::Wild { span, .. } => *span,
            TreeTy::Array { elem, .. } => elem.span(),
            TreeTy::Prim(_) | TreeTy::Void => Span::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassTySeg {
    pub span: Span,
    pub name: Name,
    pub targs: Vec<TreeTy>,
    pub annos: Vec<Anno>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WildTreeBound {
    None,
    Extends(Box<TreeTy>),
    Super(Box<TreeTy>),
}

/// An annotation use as written: a (possibly qualified) name and raw
/// arguments, each either `name = expr` or a lone value expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Anno {
    pub span: Span,
    pub name: Vec<Name>,
    pub args: Vec<Expr>,
}

/// The constant-expression subset.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Lit {
        span: Span,
        value: Value,
    },
    Ident {
        span: Span,
        name: Name,
    },
    /// `base.name`: qualified constants, enum references, class members.
    Select {
        span: Span,
        base: Box<Expr>,
        name: Name,
    },
    /// `T.class`.
    ClassLit {
        span: Span,
        ty: TreeTy,
    },
    Unary {
        span: Span,
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        span: Span,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        span: Span,
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Cast {
        span: Span,
        ty: TreeTy,
        operand: Box<Expr>,
    },
    /// `{ a, b, c }` in an annotation or array initializer.
    ArrayInit {
        span: Span,
        elems: Vec<Expr>,
    },
    /// `name = value` inside annotation arguments.
    Assign {
        span: Span,
        name: Name,
        value: Box<Expr>,
    },
    /// A nested annotation value.
    AnnoExpr {
        span: Span,
        anno: Anno,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Lit { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Select { span, .. }
            | Expr::ClassLit { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Cast { span, .. }
            | Expr::ArrayInit { span, .. }
            | Expr::Assign { span, .. }
            | Expr::AnnoExpr { span, .. } => *span,
        }
    }

    pub fn lit(value: Value) -> Expr {
        Expr::Lit {
            span: Span::default(),
            value,
        }
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Ident {
            span: Span::default(),
            name: Name::from(name),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            span: Span::default(),
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnOp, operand: Expr) -> Expr {
        Expr::Unary {
            span: Span::default(),
            op,
            operand: Box::new(operand),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Neg,
    BitNot,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Ushr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    AndAnd,
    OrOr,
}
