//! Architectures supported by the relocation engine.
//!
//! Unlike a dynamic loader, which only ever links objects for the host it
//! runs on, the engine relocates whatever machine the object was compiled
//! for, so all four relocators are always compiled and the driver dispatches
//! on [`Machine`] at runtime.

use elf::abi::{EM_386, EM_ARM, EM_MIPS, EM_X86_64};

pub(crate) mod arm;
pub(crate) mod mips;
pub(crate) mod x86;
pub(crate) mod x86_64;

pub use arm::{R_ARM_CALL, R_ARM_MOVT_ABS, R_ARM_MOVW_ABS_NC};
pub use mips::{
    R_MIPS_16, R_MIPS_26, R_MIPS_32, R_MIPS_CALL16, R_MIPS_GOT16, R_MIPS_GPREL32, R_MIPS_HI16,
    R_MIPS_JALR, R_MIPS_LO16, R_MIPS_NONE,
};
pub use x86::{R_386_32, R_386_PC32};

/// The machine kind of a relocatable object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Machine {
    /// 32-bit ARM (`EM_ARM`).
    Arm,
    /// i386 (`EM_386`).
    X86,
    /// x86-64 (`EM_X86_64`).
    X86_64,
    /// MIPS32 (`EM_MIPS`).
    Mips,
}

impl Machine {
    /// Maps an ELF `e_machine` value to a supported machine.
    pub fn from_elf(e_machine: u16) -> Option<Self> {
        match e_machine {
            EM_ARM => Some(Machine::Arm),
            EM_386 => Some(Machine::X86),
            EM_X86_64 => Some(Machine::X86_64),
            EM_MIPS => Some(Machine::Mips),
            _ => None,
        }
    }

    /// Size in bytes of one branch stub, zero when the machine has none.
    pub(crate) fn stub_size(self) -> usize {
        match self {
            Machine::Arm => 8,
            Machine::Mips => 16,
            Machine::X86 | Machine::X86_64 => 0,
        }
    }

    /// Whether a relocation of `r_type` may request a branch stub.
    pub(crate) fn needs_stub(self, r_type: u32) -> bool {
        use crate::relocation::StaticReloc;
        match self {
            Machine::Arm => arm::ArmRelocator::needs_stub(r_type),
            Machine::X86 => x86::X86Relocator::needs_stub(r_type),
            Machine::X86_64 => x86_64::X86_64Relocator::needs_stub(r_type),
            Machine::Mips => mips::MipsRelocator::needs_stub(r_type),
        }
    }

    /// Whether a relocation of `r_type` interns a GOT entry.
    pub(crate) fn needs_got(self, r_type: u32) -> bool {
        use crate::relocation::StaticReloc;
        match self {
            Machine::Arm => arm::ArmRelocator::needs_got(r_type),
            Machine::X86 => x86::X86Relocator::needs_got(r_type),
            Machine::X86_64 => x86_64::X86_64Relocator::needs_got(r_type),
            Machine::Mips => mips::MipsRelocator::needs_got(r_type),
        }
    }

    /// A human readable relocation type name for diagnostics.
    pub(crate) fn rel_type_str(self, r_type: u32) -> &'static str {
        match self {
            Machine::Arm => arm::rel_type_to_str(r_type),
            Machine::X86 => x86::rel_type_to_str(r_type),
            Machine::X86_64 => x86_64::rel_type_to_str(r_type),
            Machine::Mips => mips::rel_type_to_str(r_type),
        }
    }
}
