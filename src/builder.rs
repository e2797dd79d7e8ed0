//! Construction of [`Object`]s from parsed pieces.
//!
//! The builder is the seam between the parser collaborator and the
//! relocation engine: the parser feeds it sections, relocation tables and
//! the symbol table, and `build` materializes the mappings. Each text
//! section's stub region and the MIPS GOT are sized up front by scanning the
//! relocation tables with the machine's predicates, and symbols defined in
//! sections get their absolute addresses precomputed from the section bases.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use elf::abi::STT_OBJECT;
use hashbrown::HashMap;

use crate::arch::Machine;
use crate::common::CommonAllocator;
use crate::got::GotSection;
use crate::mem::{SectionMem, roundup};
use crate::object::Object;
use crate::os::Mmap;
use crate::section::{
    NoBits, ProgBits, RelTable, RelocEntry, Section, SectionKind, reloc_target_name,
};
use crate::stub::StubAllocator;
use crate::symbol::{Symbol, SymbolTable};
use crate::{Result, build_error};

/// Alignment of the stub region at the tail of a text section's mapping.
const STUB_ALIGN: usize = 8;

enum Staged {
    Null,
    Progbits {
        name: String,
        bytes: Vec<u8>,
        sh_flags: u64,
    },
    Nobits {
        name: String,
        size: usize,
        sh_flags: u64,
    },
    Rel {
        name: String,
        entries: Vec<RelocEntry>,
        rela: bool,
    },
}

impl Staged {
    fn name(&self) -> &str {
        match self {
            Staged::Null => "",
            Staged::Progbits { name, .. } => name,
            Staged::Nobits { name, .. } => name,
            Staged::Rel { name, .. } => name,
        }
    }
}

/// Builder for creating relocatable objects.
///
/// Sections are numbered in the order they are added, starting at 1; index 0
/// is the reserved null section, exactly as in an ELF section table. Symbol
/// `shndx` values refer to these indices.
pub struct ObjectBuilder {
    name: String,
    machine: Machine,
    staged: Vec<Staged>,
    symbols: Option<Vec<Symbol>>,
}

impl ObjectBuilder {
    /// Creates a builder for an object of the given machine kind. `name` is
    /// used in diagnostics only.
    pub fn new(machine: Machine, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            machine,
            staged: alloc::vec![Staged::Null],
            symbols: None,
        }
    }

    /// Adds a PROGBITS section with the given content.
    pub fn progbits(mut self, name: impl Into<String>, bytes: &[u8], sh_flags: u64) -> Self {
        self.staged.push(Staged::Progbits {
            name: name.into(),
            bytes: bytes.to_vec(),
            sh_flags,
        });
        self
    }

    /// Adds a zero-initialized NOBITS section.
    pub fn nobits(mut self, name: impl Into<String>, size: usize, sh_flags: u64) -> Self {
        self.staged.push(Staged::Nobits {
            name: name.into(),
            size,
            sh_flags,
        });
        self
    }

    /// Adds a REL relocation table. The name determines the patched section:
    /// `.rel.text` patches `.text`.
    pub fn rel(mut self, name: impl Into<String>, entries: Vec<RelocEntry>) -> Self {
        self.staged.push(Staged::Rel {
            name: name.into(),
            entries,
            rela: false,
        });
        self
    }

    /// Adds a RELA relocation table. The name determines the patched
    /// section: `.rela.text` patches `.text`.
    pub fn rela(mut self, name: impl Into<String>, entries: Vec<RelocEntry>) -> Self {
        self.staged.push(Staged::Rel {
            name: name.into(),
            entries,
            rela: true,
        });
        self
    }

    /// Sets the object's symbol table. An object has exactly one.
    pub fn symtab(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Materializes the object: reserves section mappings, sizes stub
    /// regions and the GOT from the relocation tables, and precomputes the
    /// addresses of section-defined symbols.
    pub fn build<M: Mmap>(self) -> Result<Object> {
        for (idx, staged) in self.staged.iter().enumerate() {
            let name = staged.name();
            if name.is_empty() {
                if matches!(staged, Staged::Null) {
                    continue;
                }
                return Err(build_error("section name must not be empty"));
            }
            if self.staged[..idx].iter().any(|other| other.name() == name) {
                return Err(build_error(format!("duplicate section name [{name}]")));
            }
        }

        // Upper bound on trampolines per text section and on GOT slots,
        // counted the same way the tables will request them.
        let mut stub_bytes: HashMap<String, usize> = HashMap::new();
        let mut got_slots = 0usize;
        for staged in &self.staged {
            let Staged::Rel {
                name,
                entries,
                rela,
            } = staged
            else {
                continue;
            };
            let Some(target) = reloc_target_name(name, *rela) else {
                continue;
            };
            for entry in entries {
                if self.machine.needs_stub(entry.r_type()) {
                    *stub_bytes.entry(target.to_string()).or_insert(0) += self.machine.stub_size();
                }
                if self.machine.needs_got(entry.r_type()) {
                    got_slots += 1;
                }
            }
        }

        let mut sections = Vec::with_capacity(self.staged.len());
        for staged in self.staged {
            let section = match staged {
                Staged::Null => Section::new(String::new(), 0, SectionKind::Null),
                Staged::Progbits {
                    name,
                    bytes,
                    sh_flags,
                } => {
                    let stub_capacity = stub_bytes.get(name.as_str()).copied().unwrap_or(0);
                    let stub_offset = roundup(bytes.len(), STUB_ALIGN);
                    let mut mem = SectionMem::reserve::<M>(stub_offset + stub_capacity)?;
                    mem.as_mut_slice()[..bytes.len()].copy_from_slice(&bytes);
                    let stubs =
                        StubAllocator::new(self.machine, mem.base() + stub_offset, stub_capacity);
                    Section::new(
                        name,
                        sh_flags,
                        SectionKind::Progbits(ProgBits::new(mem, bytes.len(), stubs)),
                    )
                }
                Staged::Nobits {
                    name,
                    size,
                    sh_flags,
                } => {
                    let mem = SectionMem::reserve::<M>(size)?;
                    Section::new(name, sh_flags, SectionKind::Nobits(NoBits::new(mem, size)))
                }
                Staged::Rel {
                    name,
                    entries,
                    rela,
                } => Section::new(name, 0, SectionKind::RelTable(RelTable { entries, rela })),
            };
            sections.push(section);
        }

        // Position-independent MIPS code derives GP from the GOT base even
        // when no slot is ever interned, so the table always exists.
        let got = if self.machine == Machine::Mips {
            GotSection::reserve::<M>(got_slots.max(1))?
        } else {
            GotSection::empty()
        };

        let symtab = self.symbols.map(|mut symbols| {
            for sym in &mut symbols {
                if sym.is_abs() {
                    sym.set_address(sym.st_value());
                    continue;
                }
                let Some(section) = sections.get(sym.st_shndx()) else {
                    continue;
                };
                // OBJECT symbols in NOBITS sections are assigned common
                // storage by the relocation pre-pass instead.
                if sym.st_type() == STT_OBJECT && section.is_nobits() {
                    continue;
                }
                if let Some(base) = section.address() {
                    sym.set_address(base + sym.st_value());
                }
            }
            SymbolTable::new(symbols)
        });

        #[cfg(feature = "log")]
        log::debug!(
            "loaded object [{}] for {:?}: {} sections",
            self.name,
            self.machine,
            sections.len()
        );

        Ok(Object {
            name: self.name,
            machine: self.machine,
            sections,
            symtab,
            got,
            common: CommonAllocator::new::<M>(),
            missing_symbols: false,
        })
    }
}
