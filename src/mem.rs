//! Owned anonymous mappings backing sections, the GOT, and common storage.

use core::ffi::c_void;
use core::ptr::NonNull;

use crate::Result;
use crate::os::{MapFlags, Mmap, ProtFlags};

pub(crate) const PAGE_SIZE: usize = 0x1000;

#[inline]
pub(crate) const fn roundup(x: usize, align: usize) -> usize {
    (x + align - 1) & !(align - 1)
}

/// A region of mapped memory owned by an [`crate::Object`].
///
/// The unmap and protect entry points are captured as plain function pointers
/// when the region is created, so the rest of the crate does not need to be
/// generic over the [`Mmap`] implementation.
pub(crate) struct SectionMem {
    memory: NonNull<c_void>,
    len: usize,
    mprotect: unsafe fn(NonNull<c_void>, usize, ProtFlags) -> Result<()>,
    munmap: unsafe fn(NonNull<c_void>, usize) -> Result<()>,
}

impl SectionMem {
    /// Reserve a zero-initialized read-write region of at least `len` bytes.
    pub(crate) fn reserve<M: Mmap>(len: usize) -> Result<Self> {
        let len = roundup(len.max(1), PAGE_SIZE);
        let memory = unsafe {
            M::mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE,
            )
        }?;
        Ok(Self {
            memory,
            len,
            mprotect: M::mprotect,
            munmap: M::munmap,
        })
    }

    /// The kind of function pointer stored by [`SectionMem::reserve`],
    /// used where a region must be allocated after the `Mmap` type parameter
    /// has been erased (the common/NOBITS pre-pass).
    pub(crate) fn reserve_fn<M: Mmap>() -> fn(usize) -> Result<SectionMem> {
        SectionMem::reserve::<M>
    }

    #[inline]
    pub(crate) fn base(&self) -> usize {
        self.memory.as_ptr() as usize
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.memory.as_ptr().cast(), self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.memory.as_ptr().cast(), self.len) }
    }

    /// Change the protection of the whole region.
    pub(crate) fn protect(&self, prot: ProtFlags) -> Result<()> {
        unsafe { (self.mprotect)(self.memory, self.len, prot) }
    }
}

impl Drop for SectionMem {
    fn drop(&mut self) {
        // Nothing sensible to do with an unmap failure during drop.
        let _ = unsafe { (self.munmap)(self.memory, self.len) };
    }
}
