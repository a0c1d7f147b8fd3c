//! Declaration-tree builders.

use quill_core::{Name, Span};
use quill_model::flags::Mods;
use quill_model::tree::{
    Anno, CompUnit, Expr, ImportDecl, MethDecl, PkgDecl, SourceFile, TreeTy, TyDecl, TyKind,
    TyMember, TyParam, VarDecl,
};

pub fn unit(path: &str, pkg: Option<&str>, decls: Vec<TyDecl>) -> CompUnit {
    unit_with_imports(path, pkg, Vec::new(), decls)
}

pub fn unit_with_imports(
    path: &str,
    pkg: Option<&str>,
    imports: Vec<ImportDecl>,
    decls: Vec<TyDecl>,
) -> CompUnit {
    CompUnit {
        source: SourceFile::new(path, ""),
        pkg: pkg.map(|name| PkgDecl {
            span: Span::default(),
            annos: Vec::new(),
            name: name.split('.').map(Name::from).collect(),
        }),
        imports,
        decls,
    }
}

pub fn import(path: &str) -> ImportDecl {
    ImportDecl {
        span: Span::default(),
        path: path.split('.').map(Name::from).collect(),
        is_static: false,
        wildcard: false,
    }
}

pub fn import_on_demand(path: &str) -> ImportDecl {
    ImportDecl {
        wildcard: true,
        ..import(path)
    }
}

pub fn import_static(path: &str) -> ImportDecl {
    ImportDecl {
        is_static: true,
        ..import(path)
    }
}

pub fn ty_decl(kind: TyKind, name: &str) -> TyDecl {
    TyDecl {
        span: Span::default(),
        mods: Mods::NONE,
        annos: Vec::new(),
        kind,
        name: Name::from(name),
        typarams: Vec::new(),
        extends: None,
        implements: Vec::new(),
        members: Vec::new(),
    }
}

pub fn class_decl(name: &str) -> TyDecl {
    ty_decl(TyKind::Class, name)
}

pub fn interface_decl(name: &str) -> TyDecl {
    ty_decl(TyKind::Interface, name)
}

pub fn enum_decl(name: &str, constants: &[&str]) -> TyDecl {
    let mut decl = ty_decl(TyKind::Enum, name);
    decl.members = constants
        .iter()
        .map(|c| TyMember::Field(enum_constant(c)))
        .collect();
    decl
}

pub fn annotation_decl(name: &str) -> TyDecl {
    ty_decl(TyKind::Annotation, name)
}

pub fn typaram(name: &str, bounds: Vec<TreeTy>) -> TyParam {
    TyParam {
        span: Span::default(),
        name: Name::from(name),
        bounds,
        annos: Vec::new(),
    }
}

pub fn field(mods: Mods, ty: TreeTy, name: &str) -> VarDecl {
    VarDecl {
        span: Span::default(),
        mods,
        annos: Vec::new(),
        ty,
        name: Name::from(name),
        init: None,
    }
}

pub fn field_init(mods: Mods, ty: TreeTy, name: &str, init: Expr) -> VarDecl {
    VarDecl {
        init: Some(init),
        ..field(mods, ty, name)
    }
}

pub fn enum_constant(name: &str) -> VarDecl {
    field(Mods::ENUM_CONSTANT, TreeTy::Void, name)
}

pub fn param(ty: TreeTy, name: &str) -> VarDecl {
    field(Mods::NONE, ty, name)
}

pub fn method(mods: Mods, ret: TreeTy, name: &str, params: Vec<VarDecl>) -> MethDecl {
    MethDecl {
        span: Span::default(),
        mods,
        annos: Vec::new(),
        typarams: Vec::new(),
        ret,
        name: Name::from(name),
        params,
        throws: Vec::new(),
        default_value: None,
    }
}

pub fn constructor(mods: Mods, params: Vec<VarDecl>) -> MethDecl {
    method(mods, TreeTy::Void, "<init>", params)
}

/// An annotation use; `name` is dotted as written in source.
pub fn anno(name: &str, args: Vec<Expr>) -> Anno {
    Anno {
        span: Span::default(),
        name: name.split('.').map(Name::from).collect(),
        args,
    }
}

pub fn assign(name: &str, value: Expr) -> Expr {
    Expr::Assign {
        span: Span::default(),
        name: Name::from(name),
        value: Box::new(value),
    }
}

pub fn select(path: &str) -> Expr {
    let mut parts = path.split('.');
    let mut expr = Expr::ident(parts.next().expect("non-empty path"));
    for part in parts {
        expr = Expr::Select {
            span: Span::default(),
            base: Box::new(expr),
            name: Name::from(part),
        };
    }
    expr
}
