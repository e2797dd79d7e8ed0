//! Operating system and environment abstractions.
//!
//! This module provides the seam for low-level memory operations: reserving
//! anonymous read-write mappings for sections, changing protection once
//! relocation has finished, and releasing mappings when an object is dropped.
//! It allows the relocation engine to be portable across operating systems
//! and bare-metal environments.

use bitflags::bitflags;
use core::ffi::{c_int, c_void};
use core::ptr::NonNull;

use crate::Result;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    /// Memory protection flags for controlling access permissions.
    ///
    /// These flags determine what operations can be performed on a mapped
    /// memory region. They can be combined using bitwise OR operations.
    pub struct ProtFlags: c_int {
        /// No access allowed. Useful for reserving address space.
        const PROT_NONE = 0;

        /// Allow reading from the memory region.
        const PROT_READ = 1;

        /// Allow writing to the memory region.
        const PROT_WRITE = 2;

        /// Allow executing code in the memory region.
        const PROT_EXEC = 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug)]
    /// Memory mapping configuration flags.
    pub struct MapFlags: c_int {
        /// Create a private copy-on-write mapping.
        const MAP_PRIVATE = 2;

        /// Place the mapping at exactly the specified address.
        const MAP_FIXED = 16;

        /// Create an anonymous mapping not backed by any file.
        const MAP_ANONYMOUS = 32;
    }
}

/// The interface the relocation engine uses to obtain and manage memory.
///
/// Implementations provide page-granular anonymous mappings. On hosted
/// platforms [`DefaultMmap`] wraps the system allocator; bare-metal
/// environments can supply their own implementation.
pub trait Mmap {
    /// Reserve a zero-initialized anonymous mapping of `len` bytes.
    ///
    /// # Safety
    /// The caller must ensure that `len` is non-zero and that the returned
    /// region is only accessed according to `prot`.
    unsafe fn mmap_anonymous(
        addr: Option<usize>,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
    ) -> Result<NonNull<c_void>>;

    /// Change the protection of a previously mapped region.
    ///
    /// # Safety
    /// `addr`/`len` must denote a mapping created by this implementation.
    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()>;

    /// Release a previously mapped region.
    ///
    /// # Safety
    /// `addr`/`len` must denote a mapping created by this implementation,
    /// and the region must not be used afterwards.
    unsafe fn munmap(addr: NonNull<c_void>, len: usize) -> Result<()>;
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::DefaultMmap;
    }
}
