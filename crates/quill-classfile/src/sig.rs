//! The descriptor and signature grammars, as typed values.
//!
//! Signatures are parsed into a small model ([`ClassSig`], [`MethodSig`],
//! [`TySig`]) and written back with the matching `write_*` functions;
//! `parse(write(x)) == x` for every value the model can express.
//! Descriptors are the argument-free subset of the same grammar, so
//! [`parse_type_signature`] decodes them too.

use crate::error::{Error, Result};
use std::fmt::Write as _;

/// A primitive, as spelled in descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl BaseType {
    pub fn tag(self) -> char {
        match self {
            BaseType::Boolean => 'Z',
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Short => 'S',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Float => 'F',
            BaseType::Double => 'D',
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            b'Z' => BaseType::Boolean,
            b'B' => BaseType::Byte,
            b'C' => BaseType::Char,
            b'S' => BaseType::Short,
            b'I' => BaseType::Int,
            b'J' => BaseType::Long,
            b'F' => BaseType::Float,
            b'D' => BaseType::Double,
            _ => return None,
        })
    }
}

/// A `JavaTypeSignature`.
#[derive(Clone, Debug, PartialEq)]
pub enum TySig {
    Base(BaseType),
    Class(ClassTySig),
    TyVar(String),
    Array(Box<TySig>),
}

/// A `ClassTypeSignature`: package, then one simple signature per nesting
/// level. A raw nested class keeps `$` inside the first simple name
/// (`La/b/Outer$Inner;`); parameterized enclosing levels split into `.`
/// suffixes (`La/b/Outer<TT;>.Inner;`).
#[derive(Clone, Debug, PartialEq)]
pub struct ClassTySig {
    /// Slash-separated, without a trailing slash; empty for the unnamed
    /// package.
    pub package: String,
    pub classes: Vec<SimpleClassTySig>,
}

impl ClassTySig {
    /// A raw reference to `binary` (internal name).
    pub fn raw(binary: &str) -> Self {
        let (package, simple) = match binary.rsplit_once('/') {
            Some((p, s)) => (p.to_string(), s),
            None => (String::new(), binary),
        };
        Self {
            package,
            classes: vec![SimpleClassTySig {
                name: simple.to_string(),
                targs: Vec::new(),
            }],
        }
    }

    /// The erased internal binary name.
    pub fn binary_name(&self) -> String {
        let mut out = String::new();
        if !self.package.is_empty() {
            out.push_str(&self.package);
            out.push('/');
        }
        for (i, simple) in self.classes.iter().enumerate() {
            if i > 0 {
                out.push('$');
            }
            out.push_str(&simple.name);
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimpleClassTySig {
    pub name: String,
    pub targs: Vec<TyArgSig>,
}

/// A `TypeArgument`.
#[derive(Clone, Debug, PartialEq)]
pub enum TyArgSig {
    /// `*`
    Wild,
    /// `+Ref`
    Extends(TySig),
    /// `-Ref`
    Super(TySig),
    Concrete(TySig),
}

/// A `TypeParameter` with its bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct TyParamSig {
    pub name: String,
    pub class_bound: Option<TySig>,
    pub interface_bounds: Vec<TySig>,
}

/// A `ClassSignature`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassSig {
    pub typarams: Vec<TyParamSig>,
    pub superclass: ClassTySig,
    pub interfaces: Vec<ClassTySig>,
}

/// A `MethodSignature`. `ret` is `None` for `void`.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSig {
    pub typarams: Vec<TyParamSig>,
    pub params: Vec<TySig>,
    pub ret: Option<TySig>,
    /// Each entry is a class or type-variable signature.
    pub throws: Vec<TySig>,
}

// === Parsing =================================================================

struct SigParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SigParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: &'static str) -> Error {
        Error::BadSignature(self.text.to_string(), message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8> {
        let b = self.peek().ok_or_else(|| self.error("unexpected end"))?;
        self.pos += 1;
        Ok(b)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error("unexpected character"))
        }
    }

    /// An identifier: anything up to a grammar delimiter.
    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b';' | b':' | b'.' | b'/' | b'<' | b'>') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty identifier"));
        }
        Ok(self.text[start..self.pos].to_string())
    }

    fn type_sig(&mut self) -> Result<TySig> {
        match self.peek().ok_or_else(|| self.error("unexpected end"))? {
            b'L' => Ok(TySig::Class(self.class_type_sig()?)),
            b'T' => {
                self.pos += 1;
                let name = self.identifier()?;
                self.expect(b';')?;
                Ok(TySig::TyVar(name))
            }
            b'[' => {
                self.pos += 1;
                Ok(TySig::Array(Box::new(self.type_sig()?)))
            }
            tag => {
                let base = BaseType::from_tag(tag).ok_or_else(|| self.error("bad type tag"))?;
                self.pos += 1;
                Ok(TySig::Base(base))
            }
        }
    }

    fn class_type_sig(&mut self) -> Result<ClassTySig> {
        self.expect(b'L')?;
        // Package: identifiers followed by '/'.
        let mut package = String::new();
        let mut name = self.identifier()?;
        while self.eat(b'/') {
            if !package.is_empty() {
                package.push('/');
            }
            package.push_str(&name);
            name = self.identifier()?;
        }
        let mut classes = vec![SimpleClassTySig {
            name,
            targs: self.type_args()?,
        }];
        while self.eat(b'.') {
            let name = self.identifier()?;
            classes.push(SimpleClassTySig {
                name,
                targs: self.type_args()?,
            });
        }
        self.expect(b';')?;
        Ok(ClassTySig { package, classes })
    }

    fn type_args(&mut self) -> Result<Vec<TyArgSig>> {
        let mut targs = Vec::new();
        if !self.eat(b'<') {
            return Ok(targs);
        }
        loop {
            match self.peek().ok_or_else(|| self.error("unexpected end"))? {
                b'>' => {
                    self.pos += 1;
                    break;
                }
                b'*' => {
                    self.pos += 1;
                    targs.push(TyArgSig::Wild);
                }
                b'+' => {
                    self.pos += 1;
                    targs.push(TyArgSig::Extends(self.type_sig()?));
                }
                b'-' => {
                    self.pos += 1;
                    targs.push(TyArgSig::Super(self.type_sig()?));
                }
                _ => targs.push(TyArgSig::Concrete(self.type_sig()?)),
            }
        }
        if targs.is_empty() {
            return Err(self.error("empty type argument list"));
        }
        Ok(targs)
    }

    fn type_params(&mut self) -> Result<Vec<TyParamSig>> {
        let mut typarams = Vec::new();
        if !self.eat(b'<') {
            return Ok(typarams);
        }
        while !self.eat(b'>') {
            let name = self.identifier()?;
            self.expect(b':')?;
            let class_bound = match self.peek() {
                Some(b':') | Some(b'>') | None => None,
                _ => Some(self.type_sig()?),
            };
            let mut interface_bounds = Vec::new();
            while self.eat(b':') {
                interface_bounds.push(self.type_sig()?);
            }
            typarams.push(TyParamSig {
                name,
                class_bound,
                interface_bounds,
            });
        }
        if typarams.is_empty() {
            return Err(self.error("empty type parameter list"));
        }
        Ok(typarams)
    }

    fn done(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }
}

/// Parses a `ClassSignature`.
pub fn parse_class_signature(text: &str) -> Result<ClassSig> {
    let mut p = SigParser::new(text);
    let typarams = p.type_params()?;
    let superclass = p.class_type_sig()?;
    let mut interfaces = Vec::new();
    while p.peek().is_some() {
        interfaces.push(p.class_type_sig()?);
    }
    Ok(ClassSig {
        typarams,
        superclass,
        interfaces,
    })
}

/// Parses a `MethodSignature` or method descriptor.
pub fn parse_method_signature(text: &str) -> Result<MethodSig> {
    let mut p = SigParser::new(text);
    let typarams = p.type_params()?;
    p.expect(b'(')?;
    let mut params = Vec::new();
    while !p.eat(b')') {
        params.push(p.type_sig()?);
    }
    let ret = if p.eat(b'V') { None } else { Some(p.type_sig()?) };
    let mut throws = Vec::new();
    while p.eat(b'^') {
        throws.push(p.type_sig()?);
    }
    p.done()?;
    Ok(MethodSig {
        typarams,
        params,
        ret,
        throws,
    })
}

/// Alias for descriptor call sites; descriptors are a signature subset.
pub fn parse_method_descriptor(text: &str) -> Result<MethodSig> {
    parse_method_signature(text)
}

/// Parses a field signature or descriptor.
pub fn parse_type_signature(text: &str) -> Result<TySig> {
    let mut p = SigParser::new(text);
    let sig = p.type_sig()?;
    p.done()?;
    Ok(sig)
}

// === Writing =================================================================

pub fn write_type_signature(sig: &TySig) -> String {
    let mut out = String::new();
    push_type_sig(&mut out, sig);
    out
}

pub fn write_class_signature(sig: &ClassSig) -> String {
    let mut out = String::new();
    push_type_params(&mut out, &sig.typarams);
    push_class_ty_sig(&mut out, &sig.superclass);
    for interface in &sig.interfaces {
        push_class_ty_sig(&mut out, interface);
    }
    out
}

pub fn write_method_signature(sig: &MethodSig) -> String {
    let mut out = String::new();
    push_type_params(&mut out, &sig.typarams);
    out.push('(');
    for param in &sig.params {
        push_type_sig(&mut out, param);
    }
    out.push(')');
    match &sig.ret {
        Some(ret) => push_type_sig(&mut out, ret),
        None => out.push('V'),
    }
    for thrown in &sig.throws {
        out.push('^');
        push_type_sig(&mut out, thrown);
    }
    out
}

fn push_type_params(out: &mut String, typarams: &[TyParamSig]) {
    if typarams.is_empty() {
        return;
    }
    out.push('<');
    for tp in typarams {
        out.push_str(&tp.name);
        out.push(':');
        if let Some(bound) = &tp.class_bound {
            push_type_sig(out, bound);
        }
        for bound in &tp.interface_bounds {
            out.push(':');
            push_type_sig(out, bound);
        }
    }
    out.push('>');
}

fn push_type_sig(out: &mut String, sig: &TySig) {
    match sig {
        TySig::Base(base) => out.push(base.tag()),
        TySig::TyVar(name) => {
            let _ = write!(out, "T{name};");
        }
        TySig::Array(elem) => {
            out.push('[');
            push_type_sig(out, elem);
        }
        TySig::Class(class) => push_class_ty_sig(out, class),
    }
}

fn push_class_ty_sig(out: &mut String, sig: &ClassTySig) {
    out.push('L');
    if !sig.package.is_empty() {
        out.push_str(&sig.package);
        out.push('/');
    }
    for (i, simple) in sig.classes.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(&simple.name);
        if !simple.targs.is_empty() {
            out.push('<');
            for targ in &simple.targs {
                match targ {
                    TyArgSig::Wild => out.push('*'),
                    TyArgSig::Extends(t) => {
                        out.push('+');
                        push_type_sig(out, t);
                    }
                    TyArgSig::Super(t) => {
                        out.push('-');
                        push_type_sig(out, t);
                    }
                    TyArgSig::Concrete(t) => push_type_sig(out, t),
                }
            }
            out.push('>');
        }
    }
    out.push(';');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip_class(text: &str) {
        let parsed = parse_class_signature(text).unwrap();
        assert_eq!(write_class_signature(&parsed), text);
    }

    fn round_trip_method(text: &str) {
        let parsed = parse_method_signature(text).unwrap();
        assert_eq!(write_method_signature(&parsed), text);
    }

    fn round_trip_type(text: &str) {
        let parsed = parse_type_signature(text).unwrap();
        assert_eq!(write_type_signature(&parsed), text);
    }

    #[test]
    fn class_signatures_round_trip() {
        round_trip_class("Ljava/lang/Object;");
        round_trip_class("<T:Ljava/lang/Number;>Ljava/lang/Object;");
        round_trip_class("<T:Ljava/lang/Object;:Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;");
        round_trip_class("<E::Ljava/io/Serializable;>Ljava/lang/Object;Ljava/lang/Iterable<TE;>;");
        round_trip_class("Ljava/lang/Enum<Lp/E;>;");
    }

    #[test]
    fn method_signatures_round_trip() {
        round_trip_method("()V");
        round_trip_method("(IJLjava/lang/String;)[B");
        round_trip_method("<X:Ljava/lang/Object;>(TX;)TX;^Ljava/io/IOException;^TX;");
        round_trip_method("(Ljava/util/List<+Ljava/lang/Number;>;)V");
    }

    #[test]
    fn type_signatures_round_trip() {
        round_trip_type("I");
        round_trip_type("[[Z");
        round_trip_type("TT;");
        round_trip_type("Ljava/util/Map<TK;TV;>;");
        round_trip_type("Ljava/util/List<*>;");
        round_trip_type("Ljava/util/List<-Ljava/lang/Integer;>;");
        round_trip_type("Lp/Outer<Ljava/lang/String;>.Inner;");
        round_trip_type("Lp/Outer$Inner;");
    }

    #[test]
    fn binary_names_recover_nesting() {
        let sig = parse_type_signature("Lp/Outer<TT;>.Inner;").unwrap();
        match sig {
            TySig::Class(c) => assert_eq!(c.binary_name(), "p/Outer$Inner"),
            _ => panic!("expected class signature"),
        }
        assert_eq!(ClassTySig::raw("p/Outer$Inner").binary_name(), "p/Outer$Inner");
        assert_eq!(ClassTySig::raw("TopLevel").binary_name(), "TopLevel");
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(parse_type_signature("Q").is_err());
        assert!(parse_type_signature("Ljava/lang/Object").is_err());
        assert!(parse_class_signature("<T>Ljava/lang/Object;").is_err());
        assert!(parse_method_signature("(I").is_err());
        assert!(parse_type_signature("II").is_err());
    }
}
