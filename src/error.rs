use alloc::borrow::Cow;
use core::fmt::{Debug, Display};

/// Error types used throughout the `objlink` library.
///
/// These errors represent the fatal failure conditions of the relocation
/// engine. Unresolved external symbols are deliberately *not* an error:
/// they are accumulated on [`crate::Object::missing_symbols`] so that every
/// missing name can be reported in a single pass.
#[derive(Debug)]
pub enum Error {
    /// An error occurred while reserving, protecting, or releasing a memory
    /// mapping backing a section, the GOT, or common storage.
    Mmap {
        /// A descriptive message about the memory mapping error.
        msg: Cow<'static, str>,
    },

    /// An error occurred while constructing an object from parsed pieces.
    ///
    /// This error typically indicates issues such as:
    /// * Duplicate or empty section names
    /// * A second symbol table for the same object
    Build {
        /// A descriptive message about the construction error.
        msg: Cow<'static, str>,
    },

    /// An error occurred while relocating an object.
    ///
    /// This error typically indicates issues such as:
    /// * An unimplemented relocation type for a supported machine
    /// * A branch stub that is still out of range after allocation
    /// * A relocation offset outside the patched section
    /// * A missing `.symtab`
    Relocation {
        /// A descriptive message about the relocation error.
        msg: Cow<'static, str>,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Mmap { msg } => write!(f, "Memory mapping error: {msg}"),
            Error::Build { msg } => write!(f, "Object construction error: {msg}"),
            Error::Relocation { msg } => write!(f, "Relocation error: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

/// Creates a memory mapping error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn mmap_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Mmap { msg: msg.into() }
}

/// Creates an object construction error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn build_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Build { msg: msg.into() }
}

/// Creates a relocation error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn relocate_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Relocation { msg: msg.into() }
}
