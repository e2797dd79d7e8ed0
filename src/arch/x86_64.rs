//! x86-64 relocations.

use elf::abi::{R_X86_64_32, R_X86_64_32S, R_X86_64_64, R_X86_64_PC32};

use crate::Result;
use crate::relocation::{RelocHelper, StaticReloc, SymbolLookup};
use crate::section::{ProgBits, RelocEntry};

pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_X86_64_64 => "R_X86_64_64",
        R_X86_64_PC32 => "R_X86_64_PC32",
        R_X86_64_32 => "R_X86_64_32",
        R_X86_64_32S => "R_X86_64_32S",
        _ => "R_X86_64_UNKNOWN",
    }
}

pub(crate) struct X86_64Relocator;

impl StaticReloc for X86_64Relocator {
    fn relocate_table<S>(
        helper: &mut RelocHelper<'_, S>,
        reltab: &[RelocEntry],
        text: &mut ProgBits,
    ) -> Result<()>
    where
        S: SymbolLookup + ?Sized,
    {
        for rel in reltab {
            let p = (text.base() + rel.r_offset()) as u64;
            let a = rel
                .r_addend()
                .ok_or_else(|| helper.error(rel, "entry carries no addend"))?;

            let (addr, _, _) = helper.symbol_parts(rel)?;
            let mut s = addr as u64;
            if s == 0 {
                s = helper.resolve(rel)? as u64;
            }

            match rel.r_type() {
                R_X86_64_64 => {
                    helper.store64(text, rel, s.wrapping_add_signed(a))?;
                }
                R_X86_64_PC32 => {
                    let value = s.wrapping_add_signed(a).wrapping_sub(p);
                    helper.store32(text, rel, value as u32)?;
                }
                R_X86_64_32 | R_X86_64_32S => {
                    helper.store32(text, rel, s.wrapping_add_signed(a) as u32)?;
                }
                _ => return Err(helper.unknown_type(rel)),
            }
        }
        Ok(())
    }
}
