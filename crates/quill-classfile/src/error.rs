use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while decoding or encoding class files.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("bad magic: 0x{0:08x}")]
    BadMagic(u32),
    #[error("bad constant pool index {0}")]
    BadPoolIndex(u16),
    #[error("bad constant pool tag {0}")]
    BadPoolTag(u8),
    #[error("constant pool index {index} holds {found}, expected {expected}")]
    PoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid modified UTF-8")]
    BadModifiedUtf8,
    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),
    #[error("invalid signature {0:?}: {1}")]
    BadSignature(String, &'static str),
    #[error("{0}")]
    Malformed(&'static str),
}
