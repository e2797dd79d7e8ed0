//! The Global Offset Table for MIPS position-independent code.
//!
//! The table is owned by its [`crate::Object`], never process-wide, and
//! grows by interning: `search` returns the slot already holding a matching
//! entry or appends a new one. Code addresses slots GP-relative, where
//! `GP = base + GP_OFFSET`.

use alloc::vec::Vec;

use crate::Result;
use crate::mem::SectionMem;
use crate::os::Mmap;

/// Displacement between the GOT base and the GP register value.
///
/// Centering GP inside the table lets a signed 16-bit displacement address
/// 64 KiB of slots.
pub const GP_OFFSET: u32 = 0x7FF0;

struct GotEntry {
    sym: usize,
    addr: usize,
    bind: u8,
}

/// The object's Global Offset Table.
pub(crate) struct GotSection {
    mem: Option<SectionMem>,
    capacity: usize,
    entries: Vec<GotEntry>,
}

impl GotSection {
    /// A table with no backing storage, for machines that never use one.
    pub(crate) fn empty() -> Self {
        Self {
            mem: None,
            capacity: 0,
            entries: Vec::new(),
        }
    }

    /// Reserves a table. The mapping is page-granular, so the usable slot
    /// count may exceed the requested minimum.
    pub(crate) fn reserve<M: Mmap>(min_slots: usize) -> Result<Self> {
        let mem = SectionMem::reserve::<M>(min_slots.max(1) * 4)?;
        let capacity = mem.len() / 4;
        Ok(Self {
            mem: Some(mem),
            capacity,
            entries: Vec::new(),
        })
    }

    /// Runtime address of slot 0, from which GP is derived.
    #[inline]
    pub(crate) fn address(&self) -> usize {
        self.mem.as_ref().map(|mem| mem.base()).unwrap_or(0)
    }

    /// Interns `(sym, addr, bind)` and returns its zero-based slot index.
    ///
    /// LOCAL entries are uniqued by address alone; other bindings by symbol
    /// index and address. Returns `None` when the table is exhausted or has
    /// no backing storage.
    pub(crate) fn search(&mut self, sym: usize, addr: usize, bind: u8) -> Option<usize> {
        use elf::abi::STB_LOCAL;

        let found = self.entries.iter().position(|entry| {
            if entry.bind != bind {
                return false;
            }
            if bind == STB_LOCAL {
                entry.addr == addr
            } else {
                entry.sym == sym && entry.addr == addr
            }
        });
        if let Some(idx) = found {
            return Some(idx);
        }

        let idx = self.entries.len();
        if idx >= self.capacity {
            return None;
        }
        let mem = self.mem.as_mut()?;
        mem.as_mut_slice()[idx * 4..idx * 4 + 4].copy_from_slice(&(addr as u32).to_le_bytes());
        self.entries.push(GotEntry { sym, addr, bind });
        Some(idx)
    }
}
