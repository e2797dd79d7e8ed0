//! Sections of a relocatable object.
//!
//! PROGBITS sections own a read-write mapping (flipped to its final
//! protection once relocation completes) and, for machines that branch
//! through trampolines, the stub allocator serving that section. REL/RELA
//! sections hold the relocation entries the driver consumes. Patching uses
//! explicit little-endian reads and writes at section-relative offsets.

use alloc::string::String;
use alloc::vec::Vec;
use elf::abi::{SHF_EXECINSTR, SHF_WRITE};

use crate::Result;
use crate::mem::SectionMem;
use crate::os::ProtFlags;
use crate::stub::StubAllocator;

/// Convert section flags to memory protection flags.
pub(crate) fn section_prot(sh_flags: u64) -> ProtFlags {
    let mut prot = ProtFlags::PROT_READ;
    if sh_flags & SHF_WRITE as u64 != 0 {
        prot |= ProtFlags::PROT_WRITE;
    }
    if sh_flags & SHF_EXECINSTR as u64 != 0 {
        prot |= ProtFlags::PROT_EXEC;
    }
    prot
}

/// Derive the name of the section a relocation table patches.
///
/// `.rel.text` names `.text`; `.rela.text` names `.text`.
pub(crate) fn reloc_target_name(table_name: &str, rela: bool) -> Option<&str> {
    if rela {
        table_name.strip_prefix(".rela")
    } else {
        table_name.strip_prefix(".rel")
    }
}

/// One relocation entry, produced by the parser collaborator.
///
/// The addend is present only for RELA entries; REL machines read it from
/// the patched word itself.
#[derive(Clone, Copy, Debug)]
pub struct RelocEntry {
    r_offset: usize,
    r_sym: usize,
    r_type: u32,
    r_addend: Option<i64>,
}

impl RelocEntry {
    /// Creates a REL entry (implicit addend).
    pub fn rel(r_offset: usize, r_sym: usize, r_type: u32) -> Self {
        Self {
            r_offset,
            r_sym,
            r_type,
            r_addend: None,
        }
    }

    /// Creates a RELA entry (explicit addend).
    pub fn rela(r_offset: usize, r_sym: usize, r_type: u32, r_addend: i64) -> Self {
        Self {
            r_offset,
            r_sym,
            r_type,
            r_addend: Some(r_addend),
        }
    }

    /// Returns the offset of the patch site in the target section.
    #[inline]
    pub fn r_offset(&self) -> usize {
        self.r_offset
    }

    /// Returns the symbol table index.
    #[inline]
    pub fn r_symbol(&self) -> usize {
        self.r_sym
    }

    /// Returns the relocation type.
    #[inline]
    pub fn r_type(&self) -> u32 {
        self.r_type
    }

    /// Returns the explicit addend, if this is a RELA entry.
    #[inline]
    pub fn r_addend(&self) -> Option<i64> {
        self.r_addend
    }
}

/// A content-bearing section mapped read-write for patching.
pub(crate) struct ProgBits {
    mem: SectionMem,
    size: usize,
    stubs: StubAllocator,
}

impl ProgBits {
    pub(crate) fn new(mem: SectionMem, size: usize, stubs: StubAllocator) -> Self {
        Self { mem, size, stubs }
    }

    /// Runtime address of the first byte of the section.
    #[inline]
    pub(crate) fn base(&self) -> usize {
        self.mem.base()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.mem.as_slice()[..self.size]
    }

    pub(crate) fn read_u32(&self, offset: usize) -> Option<u32> {
        let end = offset.checked_add(4)?;
        if end > self.size {
            return None;
        }
        let bytes = &self.mem.as_slice()[offset..end];
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn write_u32(&mut self, offset: usize, value: u32) -> Option<()> {
        let end = offset.checked_add(4)?;
        if end > self.size {
            return None;
        }
        self.mem.as_mut_slice()[offset..end].copy_from_slice(&value.to_le_bytes());
        Some(())
    }

    pub(crate) fn write_u64(&mut self, offset: usize, value: u64) -> Option<()> {
        let end = offset.checked_add(8)?;
        if end > self.size {
            return None;
        }
        self.mem.as_mut_slice()[offset..end].copy_from_slice(&value.to_le_bytes());
        Some(())
    }

    #[inline]
    pub(crate) fn stubs_mut(&mut self) -> &mut StubAllocator {
        &mut self.stubs
    }

    fn protect(&self, prot: ProtFlags) -> Result<()> {
        self.mem.protect(prot)
    }
}

/// A zero-initialized section (`.bss` and friends).
pub(crate) struct NoBits {
    mem: SectionMem,
    size: usize,
}

impl NoBits {
    pub(crate) fn new(mem: SectionMem, size: usize) -> Self {
        Self { mem, size }
    }

    #[inline]
    pub(crate) fn base(&self) -> usize {
        self.mem.base()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    fn protect(&self, prot: ProtFlags) -> Result<()> {
        self.mem.protect(prot)
    }
}

/// A relocation table awaiting consumption by the driver.
pub(crate) struct RelTable {
    pub(crate) entries: Vec<RelocEntry>,
    pub(crate) rela: bool,
}

pub(crate) enum SectionKind {
    /// The reserved null section at index 0.
    Null,
    Progbits(ProgBits),
    Nobits(NoBits),
    RelTable(RelTable),
}

/// A section of a relocatable object.
pub struct Section {
    name: String,
    sh_flags: u64,
    kind: SectionKind,
}

impl Section {
    pub(crate) fn new(name: String, sh_flags: u64, kind: SectionKind) -> Self {
        Self {
            name,
            sh_flags,
            kind,
        }
    }

    /// Returns the section name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw `sh_flags` of the section.
    #[inline]
    pub fn sh_flags(&self) -> u64 {
        self.sh_flags
    }

    /// Returns the runtime address of a materialized section.
    pub fn address(&self) -> Option<usize> {
        match &self.kind {
            SectionKind::Progbits(p) => Some(p.base()),
            SectionKind::Nobits(n) => Some(n.base()),
            _ => None,
        }
    }

    /// Returns the content bytes of a PROGBITS section.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            SectionKind::Progbits(p) => Some(p.bytes()),
            _ => None,
        }
    }

    /// Returns the size in bytes of a materialized section.
    pub fn len(&self) -> Option<usize> {
        match &self.kind {
            SectionKind::Progbits(p) => Some(p.len()),
            SectionKind::Nobits(n) => Some(n.len()),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn is_nobits(&self) -> bool {
        matches!(self.kind, SectionKind::Nobits(_))
    }

    pub(crate) fn progbits_mut(&mut self) -> Option<&mut ProgBits> {
        match &mut self.kind {
            SectionKind::Progbits(p) => Some(p),
            _ => None,
        }
    }

    /// Takes the relocation entries out of a REL/RELA section.
    ///
    /// The driver consumes relocation tables; after this returns the section
    /// holds an empty table.
    pub(crate) fn take_rel_table(&mut self) -> Option<(Vec<RelocEntry>, bool)> {
        match &mut self.kind {
            SectionKind::RelTable(table) => {
                Some((core::mem::take(&mut table.entries), table.rela))
            }
            _ => None,
        }
    }

    /// Applies the final protection implied by the section flags.
    pub(crate) fn protect(&self) -> Result<()> {
        let prot = section_prot(self.sh_flags);
        match &self.kind {
            SectionKind::Progbits(p) => p.protect(prot),
            SectionKind::Nobits(n) => n.protect(prot),
            _ => Ok(()),
        }
    }
}
