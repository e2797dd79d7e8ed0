//! Storage for common and NOBITS-resident data symbols.
//!
//! SHN_COMMON symbols have no storage in the object file; OBJECT symbols
//! living in NOBITS sections get the same treatment (the original toolchain
//! emitted `.lcomm` data that way). Before any relocation runs, one zeroed
//! region sized for all of them is reserved, and each symbol is assigned a
//! distinct, aligned address inside it.

use crate::mem::SectionMem;
use crate::os::Mmap;
use crate::{Result, mmap_error};

/// Alignment used for NOBITS-resident symbols, whose required alignment the
/// symbol entry does not carry.
pub(crate) const NOBITS_ALIGN: usize = 16;

pub(crate) struct CommonAllocator {
    reserve: fn(usize) -> Result<SectionMem>,
    mem: Option<SectionMem>,
    cursor: usize,
}

impl CommonAllocator {
    pub(crate) fn new<M: Mmap>() -> Self {
        Self {
            reserve: SectionMem::reserve_fn::<M>(),
            mem: None,
            cursor: 0,
        }
    }

    /// Reserves one zero-initialized region of `total` bytes.
    pub(crate) fn init(&mut self, total: usize) -> Result<()> {
        if total == 0 {
            return Ok(());
        }
        let mem = (self.reserve)(total)
            .map_err(|_| mmap_error("failed to reserve common symbol storage"))?;
        self.mem = Some(mem);
        self.cursor = 0;
        Ok(())
    }

    /// Assigns `size` bytes aligned to `align`, returning the address.
    ///
    /// Only valid after [`CommonAllocator::init`]; the reservation already
    /// accounts for per-symbol alignment padding, so assignment cannot run
    /// past the region.
    pub(crate) fn assign(&mut self, size: usize, align: usize) -> Option<usize> {
        let mem = self.mem.as_ref()?;
        let align = align.max(1);
        let offset = self.cursor.checked_add(align - 1)? & !(align - 1);
        if offset + size > mem.len() {
            return None;
        }
        self.cursor = offset + size;
        Some(mem.base() + offset)
    }
}
