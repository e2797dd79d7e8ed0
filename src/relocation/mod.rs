//! Relocation of loaded objects.
//!
//! The driver walks the section table in index order: first the
//! common/NOBITS pre-pass reserves storage for symbols that have none, then
//! every REL/RELA table is dispatched to the relocator for the object's
//! machine, and finally each materialized section receives the protection
//! its flags call for. Relocation entries are consumed in the process.

use alloc::borrow::ToOwned;
use alloc::format;

use elf::abi::{SHN_ABS, SHN_COMMON, SHN_UNDEF, SHN_XINDEX, STT_OBJECT};

use crate::arch::{
    Machine, arm::ArmRelocator, mips::MipsRelocator, x86::X86Relocator, x86_64::X86_64Relocator,
};
use crate::common::NOBITS_ALIGN;
use crate::got::GotSection;
use crate::object::Object;
use crate::section::{ProgBits, RelocEntry, reloc_target_name};
use crate::symbol::SymbolTable;
use crate::{Error, Result, relocate_error};

use alloc::sync::Arc;

/// A trait for looking up symbols during relocation.
///
/// This is the host's side of undefined-symbol resolution. It allows for
/// flexible resolution strategies, supporting both closures and structs with
/// state; whatever the resolver captures plays the role of a context
/// pointer. Returning `None` signals "not found", which marks the object as
/// missing symbols but does not stop relocation.
pub trait SymbolLookup {
    /// Find the address of a symbol by name.
    fn lookup(&self, name: &str) -> Option<*const ()>;
}

impl<F> SymbolLookup for F
where
    F: Fn(&str) -> Option<*const ()> + ?Sized,
{
    fn lookup(&self, name: &str) -> Option<*const ()> {
        self(name)
    }
}

impl SymbolLookup for () {
    fn lookup(&self, _name: &str) -> Option<*const ()> {
        None
    }
}

impl<S: SymbolLookup> SymbolLookup for Option<S> {
    fn lookup(&self, name: &str) -> Option<*const ()> {
        self.as_ref().and_then(|s| s.lookup(name))
    }
}

impl<S: SymbolLookup + ?Sized> SymbolLookup for Arc<S> {
    fn lookup(&self, name: &str) -> Option<*const ()> {
        (**self).lookup(name)
    }
}

/// One machine's table relocator.
pub(crate) trait StaticReloc {
    fn relocate_table<S>(
        helper: &mut RelocHelper<'_, S>,
        reltab: &[RelocEntry],
        text: &mut ProgBits,
    ) -> Result<()>
    where
        S: SymbolLookup + ?Sized;

    /// Whether a relocation of `r_type` may request a branch stub.
    fn needs_stub(_r_type: u32) -> bool {
        false
    }

    /// Whether a relocation of `r_type` interns a GOT entry.
    fn needs_got(_r_type: u32) -> bool {
        false
    }
}

/// Shared state handed to the machine relocators: the symbol table, the GOT,
/// the host lookup, and the diagnostics context of the table being processed.
pub(crate) struct RelocHelper<'a, S: ?Sized> {
    pub(crate) machine: Machine,
    pub(crate) object: &'a str,
    pub(crate) section: &'a str,
    pub(crate) symtab: &'a mut SymbolTable,
    pub(crate) got: &'a mut GotSection,
    pub(crate) find_sym: &'a S,
    pub(crate) missing_symbols: &'a mut bool,
}

impl<'a, S: SymbolLookup + ?Sized> RelocHelper<'a, S> {
    /// Cached address (0 when unresolved), type and binding of the symbol a
    /// relocation references.
    pub(crate) fn symbol_parts(&self, rel: &RelocEntry) -> Result<(usize, u8, u8)> {
        let sym = self
            .symtab
            .symbol(rel.r_symbol())
            .ok_or_else(|| self.error(rel, "symbol index out of range"))?;
        Ok((sym.address().unwrap_or(0), sym.st_type(), sym.st_bind()))
    }

    /// Whether the referenced symbol carries the given name.
    pub(crate) fn symbol_name_is(&self, rel: &RelocEntry, name: &str) -> bool {
        self.symtab
            .symbol(rel.r_symbol())
            .map(|sym| sym.name() == name)
            .unwrap_or(false)
    }

    /// Resolves the referenced symbol through the host lookup, caching the
    /// address on success. A miss sets `missing_symbols` and yields 0 so
    /// relocation can continue and report every missing name at once.
    pub(crate) fn resolve(&mut self, rel: &RelocEntry) -> Result<usize> {
        let found = {
            let Some(sym) = self.symtab.symbol(rel.r_symbol()) else {
                return Err(self.error(rel, "symbol index out of range"));
            };
            self.find_sym.lookup(sym.name())
        };
        match found {
            Some(ptr) => {
                let addr = ptr as usize;
                #[cfg(feature = "log")]
                if let Some(sym) = self.symtab.symbol(rel.r_symbol()) {
                    log::trace!(
                        "binding object [{}] to [find_sym]: symbol [{}]",
                        self.object,
                        sym.name()
                    );
                }
                if let Some(sym) = self.symtab.symbol_mut(rel.r_symbol()) {
                    sym.set_address(addr);
                }
                Ok(addr)
            }
            None => {
                #[cfg(feature = "log")]
                if let Some(sym) = self.symtab.symbol(rel.r_symbol()) {
                    log::trace!(
                        "object [{}]: unresolved symbol [{}]",
                        self.object,
                        sym.name()
                    );
                }
                *self.missing_symbols = true;
                Ok(0)
            }
        }
    }

    /// Overwrites the referenced symbol's cached address (stub redirection,
    /// `_gp_disp`).
    pub(crate) fn set_symbol_address(&mut self, rel: &RelocEntry, addr: usize) -> Result<()> {
        self.symtab
            .symbol_mut(rel.r_symbol())
            .map(|sym| sym.set_address(addr))
            .ok_or_else(|| self.error(rel, "symbol index out of range"))
    }

    pub(crate) fn load32(&self, text: &ProgBits, rel: &RelocEntry) -> Result<u32> {
        text.read_u32(rel.r_offset())
            .ok_or_else(|| self.error(rel, "patch site outside section"))
    }

    pub(crate) fn store32(&self, text: &mut ProgBits, rel: &RelocEntry, value: u32) -> Result<()> {
        text.write_u32(rel.r_offset(), value)
            .ok_or_else(|| self.error(rel, "patch site outside section"))
    }

    pub(crate) fn store64(&self, text: &mut ProgBits, rel: &RelocEntry, value: u64) -> Result<()> {
        text.write_u64(rel.r_offset(), value)
            .ok_or_else(|| self.error(rel, "patch site outside section"))
    }

    fn symbol_name(&self, rel: &RelocEntry) -> &str {
        self.symtab
            .symbol(rel.r_symbol())
            .map(|sym| sym.name())
            .unwrap_or("?")
    }

    pub(crate) fn error(&self, rel: &RelocEntry, msg: &str) -> Error {
        relocate_error(format!(
            "object [{}]: section [{}] offset {:#x}: {} (symbol [{}]): {}",
            self.object,
            self.section,
            rel.r_offset(),
            self.machine.rel_type_str(rel.r_type()),
            self.symbol_name(rel),
            msg
        ))
    }

    pub(crate) fn unknown_type(&self, rel: &RelocEntry) -> Error {
        relocate_error(format!(
            "object [{}]: section [{}] offset {:#x}: unimplemented relocation type {} (symbol [{}])",
            self.object,
            self.section,
            rel.r_offset(),
            rel.r_type(),
            self.symbol_name(rel)
        ))
    }
}

impl Object {
    /// Relocates the object in place.
    ///
    /// Processes every relocation table in section order, resolving
    /// undefined symbols through `find_sym`, then applies each section's
    /// final protection. Fatal conditions (unimplemented relocation types,
    /// out-of-range stubs, exhausted tables, a missing symbol table) return
    /// an error naming the offending site; unresolved externals instead set
    /// [`Object::missing_symbols`] and relocation continues.
    ///
    /// An object whose `missing_symbols` flag is set after this returns must
    /// not be executed.
    pub fn relocate<S>(&mut self, find_sym: &S) -> Result<()>
    where
        S: SymbolLookup + ?Sized,
    {
        if self.symtab.is_none() {
            return Err(relocate_error(format!(
                "object [{}]: no symbol table",
                self.name
            )));
        }

        // Symbols without storage get their addresses before any table runs.
        self.reserve_common()?;

        for idx in 0..self.sections.len() {
            let Some((entries, rela)) = self.sections[idx].take_rel_table() else {
                continue;
            };
            let table_name = self.sections[idx].name().to_owned();
            let target_name = reloc_target_name(&table_name, rela).ok_or_else(|| {
                relocate_error(format!(
                    "object [{}]: malformed relocation section name [{}]",
                    self.name, table_name
                ))
            })?;
            let target_idx = self.section_index(target_name).ok_or_else(|| {
                relocate_error(format!(
                    "object [{}]: relocation table [{}] has no target section [{}]",
                    self.name, table_name, target_name
                ))
            })?;

            #[cfg(feature = "log")]
            log::debug!(
                "relocating object [{}]: {} entries from [{}] against [{}]",
                self.name,
                entries.len(),
                table_name,
                target_name
            );

            let machine = self.machine;
            let Object {
                name,
                sections,
                symtab,
                got,
                missing_symbols,
                ..
            } = self;
            let Some(symtab) = symtab.as_mut() else {
                continue;
            };
            let name = name.as_str();
            let text = sections[target_idx].progbits_mut().ok_or_else(|| {
                relocate_error(format!(
                    "object [{}]: relocation target [{}] is not a content section",
                    name, target_name
                ))
            })?;

            let mut helper = RelocHelper {
                machine,
                object: name,
                section: target_name,
                symtab,
                got,
                find_sym,
                missing_symbols,
            };
            match machine {
                Machine::Arm => ArmRelocator::relocate_table(&mut helper, &entries, text)?,
                Machine::X86 => X86Relocator::relocate_table(&mut helper, &entries, text)?,
                Machine::X86_64 => X86_64Relocator::relocate_table(&mut helper, &entries, text)?,
                Machine::Mips => MipsRelocator::relocate_table(&mut helper, &entries, text)?,
            }
        }

        for section in &self.sections {
            section.protect()?;
        }
        Ok(())
    }

    /// Reserves zeroed storage for SHN_COMMON symbols and for OBJECT symbols
    /// living in NOBITS sections, and assigns each a distinct aligned
    /// address.
    fn reserve_common(&mut self) -> Result<()> {
        let Object {
            sections,
            symtab,
            common,
            ..
        } = self;
        let Some(symtab) = symtab.as_mut() else {
            return Ok(());
        };

        let mut total = 0usize;
        for sym in symtab.iter() {
            if sym.st_type() != STT_OBJECT {
                continue;
            }
            match sym.st_shndx() {
                idx if idx == SHN_COMMON as usize => {
                    // The value of a common symbol is its required alignment.
                    total += sym.st_size() + sym.st_value();
                }
                idx if idx == SHN_ABS as usize
                    || idx == SHN_UNDEF as usize
                    || idx == SHN_XINDEX as usize => {}
                idx => {
                    if sections.get(idx).is_some_and(|sec| sec.is_nobits()) {
                        total += sym.st_size() + NOBITS_ALIGN;
                    }
                }
            }
        }
        if total == 0 {
            return Ok(());
        }
        common.init(total)?;

        for sym in symtab.iter_mut() {
            if sym.st_type() != STT_OBJECT {
                continue;
            }
            let assigned = match sym.st_shndx() {
                idx if idx == SHN_COMMON as usize => common.assign(sym.st_size(), sym.st_value()),
                idx if idx == SHN_ABS as usize
                    || idx == SHN_UNDEF as usize
                    || idx == SHN_XINDEX as usize =>
                {
                    continue;
                }
                idx => {
                    if sections.get(idx).is_some_and(|sec| sec.is_nobits()) {
                        common.assign(sym.st_size(), NOBITS_ALIGN)
                    } else {
                        continue;
                    }
                }
            };
            match assigned {
                Some(addr) => sym.set_address(addr),
                None => return Err(relocate_error("common symbol storage exhausted")),
            }
        }
        Ok(())
    }
}
