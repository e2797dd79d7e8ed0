//! 32-bit ARM relocations.

use elf::abi::{R_ARM_ABS32, STT_FUNC, STT_NOTYPE};

use crate::Result;
use crate::relocation::{RelocHelper, StaticReloc, SymbolLookup};
use crate::section::{ProgBits, RelocEntry};

pub const R_ARM_CALL: u32 = 28;
pub const R_ARM_MOVW_ABS_NC: u32 = 43;
pub const R_ARM_MOVT_ABS: u32 = 44;

pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_ARM_ABS32 => "R_ARM_ABS32",
        R_ARM_CALL => "R_ARM_CALL",
        R_ARM_MOVW_ABS_NC => "R_ARM_MOVW_ABS_NC",
        R_ARM_MOVT_ABS => "R_ARM_MOVT_ABS",
        _ => "R_ARM_UNKNOWN",
    }
}

#[inline]
fn sign_extend_24(x: u32) -> i32 {
    ((x << 8) as i32) >> 8
}

pub(crate) struct ArmRelocator;

impl StaticReloc for ArmRelocator {
    fn needs_stub(r_type: u32) -> bool {
        r_type == R_ARM_CALL
    }

    fn relocate_table<S>(
        helper: &mut RelocHelper<'_, S>,
        reltab: &[RelocEntry],
        text: &mut ProgBits,
    ) -> Result<()>
    where
        S: SymbolLookup + ?Sized,
    {
        for rel in reltab {
            let inst = helper.load32(text, rel)?;
            let p = (text.base() + rel.r_offset()) as u32;
            let (addr, st_type, _) = helper.symbol_parts(rel)?;

            match rel.r_type() {
                R_ARM_ABS32 => {
                    let a = inst;
                    helper.store32(text, rel, (addr as u32).wrapping_add(a))?;
                }

                R_ARM_CALL => {
                    let a = sign_extend_24(inst & 0x00FF_FFFF);

                    // The callee may live in another PROGBITS section of the
                    // same object, or outside the object entirely.
                    let mut callee = addr;
                    match st_type {
                        STT_FUNC => {
                            if callee == 0 {
                                return Err(
                                    helper.error(rel, "defined callee has no resolved address")
                                );
                            }
                        }
                        STT_NOTYPE => {
                            if callee == 0 {
                                callee = helper.resolve(rel)?;
                            }
                        }
                        _ => {
                            return Err(
                                helper.error(rel, "unsupported symbol type for branch-and-link")
                            );
                        }
                    }

                    // Branch through a trampoline so the target is always
                    // reachable from this section.
                    let stub = text
                        .stubs_mut()
                        .allocate(callee)
                        .ok_or_else(|| helper.error(rel, "unable to allocate stub"))?;

                    let s = stub as u32;
                    let result = (s >> 2).wrapping_sub(p >> 2).wrapping_add(a as u32);
                    if result > 0x007F_FFFF && result < 0xFF80_0000 {
                        return Err(helper.error(rel, "stub is still out of branch range"));
                    }
                    helper.store32(text, rel, (inst & 0xFF00_0000) | (result & 0x00FF_FFFF))?;
                }

                R_ARM_MOVW_ABS_NC | R_ARM_MOVT_ABS => {
                    let mut s = addr as u32;
                    if addr == 0 && st_type == STT_NOTYPE {
                        s = helper.resolve(rel)? as u32;
                    }
                    if rel.r_type() == R_ARM_MOVT_ABS {
                        s >>= 16;
                    }
                    // Recompose the split 16-bit immediate: imm4 in bits
                    // 16..19, imm12 in bits 0..11. No sign extension.
                    let a = ((inst & 0xF_0000) >> 4) | (inst & 0xFFF);
                    let result = s.wrapping_add(a);
                    helper.store32(
                        text,
                        rel,
                        ((result & 0xF000) << 4) | (result & 0xFFF) | (inst & 0xFFF0_F000),
                    )?;
                }

                _ => return Err(helper.unknown_type(rel)),
            }
        }
        Ok(())
    }
}
