//! MIPS32 relocations.
//!
//! The most intricate of the four machines: HI16/GOT16 entries pair with the
//! nearest following LO16 on the same symbol, position-independent code goes
//! through GP-relative GOT slots, and `_gp_disp` is a virtual symbol whose
//! value is computed against each `lui` site rather than resolved.

use elf::abi::STB_LOCAL;

use crate::Result;
use crate::got::GP_OFFSET;
use crate::relocation::{RelocHelper, StaticReloc, SymbolLookup};
use crate::section::{ProgBits, RelocEntry};

pub const R_MIPS_NONE: u32 = 0;
pub const R_MIPS_16: u32 = 1;
pub const R_MIPS_32: u32 = 2;
pub const R_MIPS_26: u32 = 4;
pub const R_MIPS_HI16: u32 = 5;
pub const R_MIPS_LO16: u32 = 6;
pub const R_MIPS_GOT16: u32 = 9;
pub const R_MIPS_CALL16: u32 = 11;
pub const R_MIPS_GPREL32: u32 = 12;
pub const R_MIPS_JALR: u32 = 37;

/// Name of the virtual symbol the o32 ABI uses for the GP displacement.
const GP_DISP: &str = "_gp_disp";

pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_MIPS_NONE => "R_MIPS_NONE",
        R_MIPS_16 => "R_MIPS_16",
        R_MIPS_32 => "R_MIPS_32",
        R_MIPS_26 => "R_MIPS_26",
        R_MIPS_HI16 => "R_MIPS_HI16",
        R_MIPS_LO16 => "R_MIPS_LO16",
        R_MIPS_GOT16 => "R_MIPS_GOT16",
        R_MIPS_CALL16 => "R_MIPS_CALL16",
        R_MIPS_GPREL32 => "R_MIPS_GPREL32",
        R_MIPS_JALR => "R_MIPS_JALR",
        _ => "R_MIPS_UNKNOWN",
    }
}

#[inline]
fn sign_extend_16(x: u32) -> u32 {
    x as u16 as i16 as i32 as u32
}

/// Index of the nearest LO16 entry on the same symbol after `from`.
fn find_lo16(reltab: &[RelocEntry], from: usize, sym: usize) -> Option<usize> {
    reltab[from + 1..]
        .iter()
        .position(|rel| rel.r_type() == R_MIPS_LO16 && rel.r_symbol() == sym)
        .map(|found| from + 1 + found)
}

pub(crate) struct MipsRelocator;

impl MipsRelocator {
    /// Branch to a freshly allocated stub for `target`, caching the stub as
    /// the symbol's address for subsequent relocations.
    fn branch_through_stub<S>(
        helper: &mut RelocHelper<'_, S>,
        text: &mut ProgBits,
        rel: &RelocEntry,
        keep: u32,
        p: u32,
        target: usize,
    ) -> Result<()>
    where
        S: SymbolLookup + ?Sized,
    {
        let stub = text
            .stubs_mut()
            .allocate(target)
            .ok_or_else(|| helper.error(rel, "unable to allocate stub"))?;
        helper.set_symbol_address(rel, stub)?;
        let s = stub as u32;
        if p.wrapping_add(4) >> 28 != s >> 28 {
            return Err(helper.error(rel, "stub is out of branch range"));
        }
        helper.store32(text, rel, keep | ((s >> 2) & 0x03FF_FFFF))
    }
}

impl StaticReloc for MipsRelocator {
    fn needs_stub(r_type: u32) -> bool {
        r_type == R_MIPS_26
    }

    fn needs_got(r_type: u32) -> bool {
        matches!(r_type, R_MIPS_GOT16 | R_MIPS_CALL16)
    }

    fn relocate_table<S>(
        helper: &mut RelocHelper<'_, S>,
        reltab: &[RelocEntry],
        text: &mut ProgBits,
    ) -> Result<()>
    where
        S: SymbolLookup + ?Sized,
    {
        for i in 0..reltab.len() {
            let rel = &reltab[i];
            if matches!(rel.r_type(), R_MIPS_NONE | R_MIPS_JALR) {
                continue;
            }

            let inst = helper.load32(text, rel)?;
            let p = (text.base() + rel.r_offset()) as u32;
            let (addr, _, st_bind) = helper.symbol_parts(rel)?;
            let gp_disp = helper.symbol_name_is(rel, GP_DISP);

            let mut s = addr as u32;
            let mut need_stub = false;
            if s == 0 && !gp_disp {
                need_stub = true;
                s = helper.resolve(rel)? as u32;
            }

            match rel.r_type() {
                R_MIPS_16 => {
                    let a = sign_extend_16(inst & 0xFFFF);
                    let value = s.wrapping_add(a);
                    let signed = value as i32;
                    if !(-32768..=32767).contains(&signed) {
                        return Err(helper.error(rel, "16-bit immediate overflow"));
                    }
                    helper.store32(text, rel, (inst & 0xFFFF_0000) | (value & 0xFFFF))?;
                }

                R_MIPS_32 => {
                    helper.store32(text, rel, s.wrapping_add(inst))?;
                }

                R_MIPS_26 => {
                    let keep = inst & 0xFC00_0000;
                    if !need_stub {
                        let a = (inst & 0x03FF_FFFF) << 2;
                        if st_bind == STB_LOCAL {
                            // Local call: complete the target with the high
                            // nibble of the delay-slot address.
                            let a = (a | (p.wrapping_add(4) & 0xF000_0000)).wrapping_add(s);
                            helper.store32(text, rel, keep | ((a >> 2) & 0x03FF_FFFF))?;
                        } else {
                            let a = if a & 0x0800_0000 != 0 {
                                // Sign extend from bit 27.
                                a | 0xF000_0000
                            } else {
                                a
                            };
                            let a = a.wrapping_add(s);
                            if p.wrapping_add(4) >> 28 != a >> 28 {
                                // Far call: the 26-bit field cannot reach the
                                // callee's 256 MiB segment.
                                Self::branch_through_stub(helper, text, rel, keep, p, a as usize)?;
                            } else {
                                helper.store32(text, rel, keep | ((a >> 2) & 0x03FF_FFFF))?;
                            }
                        }
                    } else {
                        // Call into another image.
                        let a = (inst & 0x03FF_FFFF) << 2;
                        if a != 0 {
                            return Err(helper.error(rel, "addend must be zero"));
                        }
                        Self::branch_through_stub(helper, text, rel, keep, p, s as usize)?;
                    }
                }

                R_MIPS_HI16 => {
                    let mut a = (inst & 0xFFFF) << 16;
                    if let Some(lo) = find_lo16(reltab, i, rel.r_symbol()) {
                        let lo_inst = helper.load32(text, &reltab[lo])?;
                        a = a.wrapping_add(sign_extend_16(lo_inst & 0xFFFF));
                    }
                    if gp_disp {
                        s = (helper.got.address() as u32)
                            .wrapping_add(GP_OFFSET)
                            .wrapping_sub(p);
                        // The paired LO16 reads this back.
                        helper.set_symbol_address(rel, s as usize)?;
                    }
                    // +0x8000 compensates for the signed LO16 half.
                    let value = s.wrapping_add(a).wrapping_add(0x8000);
                    helper.store32(text, rel, (inst & 0xFFFF_0000) | ((value >> 16) & 0xFFFF))?;
                }

                R_MIPS_LO16 => {
                    let a = inst & 0xFFFF;
                    helper.store32(text, rel, (inst & 0xFFFF_0000) | (s.wrapping_add(a) & 0xFFFF))?;
                }

                R_MIPS_GOT16 | R_MIPS_CALL16 => {
                    let mut a = inst & 0xFFFF;
                    if rel.r_type() == R_MIPS_GOT16 && st_bind == STB_LOCAL {
                        a <<= 16;
                        if let Some(lo) = find_lo16(reltab, i, rel.r_symbol()) {
                            let lo_inst = helper.load32(text, &reltab[lo])?;
                            a = a.wrapping_add(sign_extend_16(lo_inst & 0xFFFF));
                        }
                    } else if a != 0 {
                        return Err(helper.error(rel, "addend must be zero"));
                    }
                    let slot = helper
                        .got
                        .search(rel.r_symbol(), s.wrapping_add(a) as usize, st_bind)
                        .ok_or_else(|| helper.error(rel, "global offset table exhausted"))?;
                    let disp = ((slot as u32) << 2).wrapping_sub(GP_OFFSET);
                    helper.store32(text, rel, (inst & 0xFFFF_0000) | (disp & 0xFFFF))?;
                }

                R_MIPS_GPREL32 => {
                    let gp = (helper.got.address() as u32).wrapping_add(GP_OFFSET);
                    helper.store32(text, rel, inst.wrapping_add(s).wrapping_sub(gp))?;
                }

                _ => return Err(helper.unknown_type(rel)),
            }
        }
        Ok(())
    }
}
