//! i386 relocations.

use crate::Result;
use crate::relocation::{RelocHelper, StaticReloc, SymbolLookup};
use crate::section::{ProgBits, RelocEntry};

pub const R_386_32: u32 = 1;
pub const R_386_PC32: u32 = 2;

pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_386_32 => "R_386_32",
        R_386_PC32 => "R_386_PC32",
        _ => "R_386_UNKNOWN",
    }
}

pub(crate) struct X86Relocator;

impl StaticReloc for X86Relocator {
    fn relocate_table<S>(
        helper: &mut RelocHelper<'_, S>,
        reltab: &[RelocEntry],
        text: &mut ProgBits,
    ) -> Result<()>
    where
        S: SymbolLookup + ?Sized,
    {
        for rel in reltab {
            // REL form: the addend is the word already at the patch site.
            let a = helper.load32(text, rel)?;
            let p = (text.base() + rel.r_offset()) as u32;

            let (addr, _, _) = helper.symbol_parts(rel)?;
            let mut s = addr as u32;
            if s == 0 {
                s = helper.resolve(rel)? as u32;
            }

            match rel.r_type() {
                R_386_PC32 => {
                    helper.store32(text, rel, s.wrapping_add(a).wrapping_sub(p))?;
                }
                R_386_32 => {
                    helper.store32(text, rel, s.wrapping_add(a))?;
                }
                _ => return Err(helper.unknown_type(rel)),
            }
        }
        Ok(())
    }
}
