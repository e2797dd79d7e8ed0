use super::{MapFlags, Mmap, ProtFlags};
use crate::{Result, mmap_error};
use core::ffi::c_void;
use core::ptr::NonNull;
use libc::{mmap, mprotect, munmap};

/// An implementation of the [`Mmap`] trait backed by the libc allocator.
pub struct DefaultMmap;

impl Mmap for DefaultMmap {
    unsafe fn mmap_anonymous(
        addr: Option<usize>,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
    ) -> Result<NonNull<c_void>> {
        let ptr = unsafe {
            mmap(
                addr.unwrap_or(0) as _,
                len,
                prot.bits(),
                (flags | MapFlags::MAP_ANONYMOUS).bits(),
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(mmap_error("mmap anonymous failed"));
        }
        NonNull::new(ptr).ok_or_else(|| mmap_error("mmap returned a null mapping"))
    }

    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
        let res = unsafe { mprotect(addr.as_ptr(), len, prot.bits()) };
        if res != 0 {
            return Err(mmap_error("mprotect failed"));
        }
        Ok(())
    }

    unsafe fn munmap(addr: NonNull<c_void>, len: usize) -> Result<()> {
        let res = unsafe { munmap(addr.as_ptr(), len) };
        if res != 0 {
            return Err(mmap_error("munmap failed"));
        }
        Ok(())
    }
}
