//! Flyweight symbols.
//!
//! Symbols identify declarations by name alone; they own no semantic data
//! and compare by value, so they can be shared freely and used as map keys.
//! The binder's environment maps a [`ClassSymbol`] to the bound class it
//! names; everything else is reachable from there.

use quill_core::Name;
use std::fmt;

/// A class, interface, enum, or annotation, identified by its internal
/// binary name: slashes separate packages, `$` separates nesting levels
/// (`java/util/Map$Entry`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassSymbol(Name);

impl ClassSymbol {
    pub fn new(binary: impl Into<Name>) -> Self {
        Self(binary.into())
    }

    pub fn binary_name(&self) -> &str {
        self.0.as_str()
    }

    /// The simple name: everything after the last `/` and `$`.
    pub fn simple_name(&self) -> &str {
        let tail = self
            .binary_name()
            .rsplit_once('/')
            .map_or(self.binary_name(), |(_, t)| t);
        tail.rsplit_once('$').map_or(tail, |(_, t)| t)
    }

    /// The package portion, dotted (empty for the unnamed package).
    pub fn package(&self) -> PackageSymbol {
        match self.binary_name().rsplit_once('/') {
            Some((pkg, _)) => PackageSymbol::new(pkg.replace('/', ".")),
            None => PackageSymbol::new(""),
        }
    }

    /// The member class `name` nested inside `self`.
    pub fn member(&self, name: &str) -> ClassSymbol {
        ClassSymbol::new(format!("{}${name}", self.binary_name()))
    }

    /// The textual enclosing class, if the binary name has one.
    ///
    /// This is a syntactic fallback for class-path classes without an
    /// `InnerClasses` attribute; bound classes carry their real owner.
    pub fn textual_owner(&self) -> Option<ClassSymbol> {
        let (head, _) = self.binary_name().rsplit_once('$')?;
        Some(ClassSymbol::new(head))
    }

    pub fn object() -> Self {
        Self::new("java/lang/Object")
    }

    pub fn string() -> Self {
        Self::new("java/lang/String")
    }

    pub fn enum_() -> Self {
        Self::new("java/lang/Enum")
    }

    pub fn annotation() -> Self {
        Self::new("java/lang/annotation/Annotation")
    }

    pub fn retention() -> Self {
        Self::new("java/lang/annotation/Retention")
    }

    pub fn deprecated() -> Self {
        Self::new("java/lang/Deprecated")
    }

    /// The sentinel substituted for unresolvable names so later phases can
    /// keep running.
    pub fn error() -> Self {
        Self::new("quill/error/Err")
    }

    pub fn is_error(&self) -> bool {
        self.binary_name() == "quill/error/Err"
    }
}

impl std::borrow::Borrow<str> for ClassSymbol {
    fn borrow(&self) -> &str {
        self.binary_name()
    }
}

impl fmt::Debug for ClassSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassSymbol({})", self.0)
    }
}

impl fmt::Display for ClassSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A field, identified by its owner and simple name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldSymbol {
    pub owner: ClassSymbol,
    pub name: Name,
}

impl FieldSymbol {
    pub fn new(owner: ClassSymbol, name: impl Into<Name>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }
}

impl fmt::Debug for FieldSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldSymbol({}#{})", self.owner, self.name)
    }
}

/// A method, identified by owner, name, and an erasure key that keeps
/// overloads distinct.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSymbol {
    pub owner: ClassSymbol,
    pub name: Name,
    /// Canonical text of the parameter types; see `Type`'s `Display`.
    pub key: Name,
}

impl MethodSymbol {
    pub fn new(owner: ClassSymbol, name: impl Into<Name>, key: impl Into<Name>) -> Self {
        Self {
            owner,
            name: name.into(),
            key: key.into(),
        }
    }
}

impl fmt::Debug for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodSymbol({}#{}({}))", self.owner, self.name, self.key)
    }
}

/// The declaration a type variable belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TyVarOwner {
    Class(ClassSymbol),
    Method(MethodSymbol),
}

/// A type variable, identified by its owner and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVarSymbol {
    pub owner: TyVarOwner,
    pub name: Name,
}

impl TyVarSymbol {
    pub fn of_class(owner: ClassSymbol, name: impl Into<Name>) -> Self {
        Self {
            owner: TyVarOwner::Class(owner),
            name: name.into(),
        }
    }

    pub fn of_method(owner: MethodSymbol, name: impl Into<Name>) -> Self {
        Self {
            owner: TyVarOwner::Method(owner),
            name: name.into(),
        }
    }
}

/// A package, identified by its dotted name (empty for the unnamed
/// package).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageSymbol(Name);

impl PackageSymbol {
    pub fn new(dotted: impl Into<Name>) -> Self {
        Self(dotted.into())
    }

    pub fn dotted(&self) -> &str {
        self.0.as_str()
    }

    pub fn slashed(&self) -> String {
        self.0.as_str().replace('.', "/")
    }

    pub fn is_unnamed(&self) -> bool {
        self.0.is_empty()
    }

    /// The binary name of top-level class `simple` in this package.
    pub fn class(&self, simple: &str) -> ClassSymbol {
        if self.is_unnamed() {
            ClassSymbol::new(simple)
        } else {
            ClassSymbol::new(format!("{}/{simple}", self.slashed()))
        }
    }
}

impl fmt::Debug for PackageSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageSymbol({})", self.0)
    }
}

impl fmt::Display for PackageSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dotted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_strips_package_and_nesting() {
        let sym = ClassSymbol::new("java/util/Map$Entry");
        assert_eq!(sym.simple_name(), "Entry");
        assert_eq!(sym.package().dotted(), "java.util");
        assert_eq!(sym.textual_owner(), Some(ClassSymbol::new("java/util/Map")));
    }

    #[test]
    fn unnamed_package() {
        let sym = ClassSymbol::new("A");
        assert_eq!(sym.simple_name(), "A");
        assert!(sym.package().is_unnamed());
        assert_eq!(sym.textual_owner(), None);
        assert_eq!(PackageSymbol::new("").class("A"), sym);
    }

    #[test]
    fn symbols_are_value_equal() {
        let a = FieldSymbol::new(ClassSymbol::new("p/C"), "x");
        let b = FieldSymbol::new(ClassSymbol::new("p/C"), "x");
        assert_eq!(a, b);
    }
}
