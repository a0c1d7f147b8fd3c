//! Source modifiers and class-file access flags.

use std::fmt;
use std::ops::BitOr;

/// Class-file access bits (`ACC_*`).
pub mod access {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;
}

/// A set of source-level modifiers.
///
/// `ENUM_CONSTANT` is not a keyword: the external parser marks the
/// implicitly `public static final` constant declarations of an enum body
/// with it so the binder can tell them from ordinary fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mods(u32);

impl Mods {
    pub const NONE: Mods = Mods(0);
    pub const PUBLIC: Mods = Mods(1 << 0);
    pub const PRIVATE: Mods = Mods(1 << 1);
    pub const PROTECTED: Mods = Mods(1 << 2);
    pub const STATIC: Mods = Mods(1 << 3);
    pub const FINAL: Mods = Mods(1 << 4);
    pub const ABSTRACT: Mods = Mods(1 << 5);
    pub const NATIVE: Mods = Mods(1 << 6);
    pub const SYNCHRONIZED: Mods = Mods(1 << 7);
    pub const TRANSIENT: Mods = Mods(1 << 8);
    pub const VOLATILE: Mods = Mods(1 << 9);
    pub const STRICTFP: Mods = Mods(1 << 10);
    pub const DEFAULT: Mods = Mods(1 << 11);
    pub const ENUM_CONSTANT: Mods = Mods(1 << 12);

    pub fn contains(self, other: Mods) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The visibility bits translated to access flags.
    pub fn visibility_access(self) -> u16 {
        use access::*;
        if self.contains(Mods::PUBLIC) {
            ACC_PUBLIC
        } else if self.contains(Mods::PROTECTED) {
            ACC_PROTECTED
        } else if self.contains(Mods::PRIVATE) {
            ACC_PRIVATE
        } else {
            0
        }
    }
}

impl BitOr for Mods {
    type Output = Mods;

    fn bitor(self, rhs: Mods) -> Mods {
        Mods(self.0 | rhs.0)
    }
}

impl fmt::Debug for Mods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(Mods, &str)] = &[
            (Mods::PUBLIC, "public"),
            (Mods::PRIVATE, "private"),
            (Mods::PROTECTED, "protected"),
            (Mods::STATIC, "static"),
            (Mods::FINAL, "final"),
            (Mods::ABSTRACT, "abstract"),
            (Mods::NATIVE, "native"),
            (Mods::SYNCHRONIZED, "synchronized"),
            (Mods::TRANSIENT, "transient"),
            (Mods::VOLATILE, "volatile"),
            (Mods::STRICTFP, "strictfp"),
            (Mods::DEFAULT, "default"),
            (Mods::ENUM_CONSTANT, "enum-constant"),
        ];
        let mut first = true;
        f.write_str("Mods(")?;
        for (bit, name) in NAMES {
            if self.contains(*bit) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        f.write_str(")")
    }
}
