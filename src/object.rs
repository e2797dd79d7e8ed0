//! The in-memory relocatable object.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::arch::Machine;
use crate::common::CommonAllocator;
use crate::got::GotSection;
use crate::section::Section;
use crate::symbol::SymbolTable;

/// A relocatable object materialized into memory and ready for relocation.
///
/// Built by [`crate::ObjectBuilder`] from parsed pieces. Call
/// [`Object::relocate`] once; afterwards the object is either executable or
/// flagged with [`Object::missing_symbols`] and must be discarded. Dropping
/// the object releases every mapping it owns, including stubs and the GOT.
pub struct Object {
    pub(crate) name: String,
    pub(crate) machine: Machine,
    pub(crate) sections: Vec<Section>,
    pub(crate) symtab: Option<SymbolTable>,
    pub(crate) got: GotSection,
    pub(crate) common: CommonAllocator,
    pub(crate) missing_symbols: bool,
}

impl Object {
    /// Returns the diagnostic name of the object.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the machine kind of the object.
    #[inline]
    pub fn machine(&self) -> Machine {
        self.machine
    }

    /// True when at least one undefined symbol could not be resolved during
    /// relocation. Such an object must not be executed.
    #[inline]
    pub fn missing_symbols(&self) -> bool {
        self.missing_symbols
    }

    /// Returns the symbol table, if the object carries one.
    #[inline]
    pub fn symtab(&self) -> Option<&SymbolTable> {
        self.symtab.as_ref()
    }

    /// Returns the section named `name`.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.section_index(name).map(|idx| &self.sections[idx])
    }

    pub(crate) fn section_index(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|sec| !sec.name().is_empty() && sec.name() == name)
    }

    /// Returns the runtime address of the section named `name`.
    pub fn section_address(&self, name: &str) -> Option<usize> {
        self.section(name).and_then(|sec| sec.address())
    }

    /// Returns the content bytes of the PROGBITS section named `name`.
    pub fn section_bytes(&self, name: &str) -> Option<&[u8]> {
        self.section(name).and_then(|sec| sec.bytes())
    }

    /// Runtime address of the object's Global Offset Table (MIPS only; zero
    /// when the object has none). Hosts running position-independent MIPS
    /// code must enter it with `GP = got_address() + GP_OFFSET`.
    #[inline]
    pub fn got_address(&self) -> usize {
        self.got.address()
    }

    /// Returns the resolved address of the symbol named `name`, if the
    /// symbol exists and has been assigned one.
    pub fn symbol_address(&self, name: &str) -> Option<usize> {
        let symtab = self.symtab.as_ref()?;
        symtab
            .index_of(name)
            .and_then(|idx| symtab.symbol(idx))
            .and_then(|sym| sym.address())
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("machine", &self.machine)
            .field("missing_symbols", &self.missing_symbols)
            .finish()
    }
}
