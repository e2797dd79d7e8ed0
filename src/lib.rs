//! # objlink
//!
//! **objlink** is an in-memory relocation engine for ELF relocatable objects
//! (`.o` files). Given an object that a parser has already materialized into
//! addressable memory, it patches the code sections against the symbol table,
//! resolves undefined symbols through a caller-supplied lookup, emits branch
//! stubs and a MIPS Global Offset Table where the architecture demands them,
//! and finally flips section protections so the code can run.
//!
//! Four machines are supported, dispatched at runtime on the object's machine
//! kind: ARM (32-bit), i386, x86-64 and MIPS32.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use objlink::{Machine, ObjectBuilder, RelocEntry, Symbol, os::DefaultMmap};
//! use elf::abi::{R_X86_64_64, SHF_ALLOC, SHF_EXECINSTR, STB_GLOBAL, STT_NOTYPE};
//!
//! fn main() -> objlink::Result<()> {
//!     let text = [0u8; 16];
//!     let mut object = ObjectBuilder::new(Machine::X86_64, "demo.o")
//!         .progbits(".text", &text, (SHF_ALLOC | SHF_EXECINSTR) as u64)
//!         .rela(".rela.text", vec![RelocEntry::rela(2, 1, R_X86_64_64, 0)])
//!         .symtab(vec![
//!             Symbol::null(),
//!             Symbol::undefined("host_entry", STT_NOTYPE, STB_GLOBAL),
//!         ])
//!         .build::<DefaultMmap>()?;
//!
//!     object.relocate(&|name: &str| match name {
//!         "host_entry" => Some(0x1000 as *const ()),
//!         _ => None,
//!     })?;
//!     assert!(!object.missing_symbols());
//!     Ok(())
//! }
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod arch;
mod builder;
mod common;
mod error;
mod got;
mod mem;
mod object;
pub mod os;
pub mod relocation;
mod section;
mod stub;
mod symbol;

pub use arch::Machine;
pub use builder::ObjectBuilder;
pub use error::Error;
pub use got::GP_OFFSET;
pub use object::Object;
pub use relocation::SymbolLookup;
pub use section::{RelocEntry, Section};
pub use symbol::{Symbol, SymbolTable};

pub(crate) use error::{build_error, mmap_error, relocate_error};

/// A type alias for `Result`s returned by `objlink` functions.
///
/// This is a convenience alias that eliminates the need to repeatedly specify
/// the `Error` type in function signatures.
pub type Result<T> = core::result::Result<T, Error>;
