//! Branch stubs (far-call trampolines).
//!
//! Each text section owns one allocator over the tail of its own mapping,
//! which keeps every stub within direct-branch range of every instruction
//! in the section it serves. Allocation is idempotent per target: repeated
//! requests for the same destination return the same stub.

use hashbrown::HashMap;

use crate::arch::Machine;

/// ARM far jump: `ldr pc, [pc, #-4]` followed by the literal target.
const ARM_STUB_LDR_PC: u32 = 0xE51F_F004;

/// MIPS far jump through `$t9`, which the o32 PIC ABI expects to hold the
/// callee address on entry: `lui $t9, hi; ori $t9, $t9, lo; jr $t9; nop`.
const MIPS_STUB_LUI_T9: u32 = 0x3C19_0000;
const MIPS_STUB_ORI_T9: u32 = 0x3739_0000;
const MIPS_STUB_JR_T9: u32 = 0x0320_0008;

/// Allocates fixed-size trampolines out of a text section's stub region.
pub(crate) struct StubAllocator {
    machine: Machine,
    base: usize,
    capacity: usize,
    used: usize,
    targets: HashMap<usize, usize>,
}

impl StubAllocator {
    /// Creates an allocator over `capacity` bytes starting at `base`.
    ///
    /// `base` must point into writable memory owned by the section the
    /// allocator serves; the builder carves it from the tail of the
    /// section's own mapping.
    pub(crate) fn new(machine: Machine, base: usize, capacity: usize) -> Self {
        Self {
            machine,
            base,
            capacity,
            used: 0,
            targets: HashMap::new(),
        }
    }

    /// Returns the stub jumping to `target`, writing a new trampoline if
    /// none exists yet. Returns `None` when the machine has no stub form or
    /// the region is exhausted.
    pub(crate) fn allocate(&mut self, target: usize) -> Option<usize> {
        if let Some(&stub) = self.targets.get(&target) {
            return Some(stub);
        }
        let size = self.machine.stub_size();
        if size == 0 || self.used + size > self.capacity {
            return None;
        }
        let stub = self.base + self.used;
        self.write_stub(stub, target);
        self.used += size;
        self.targets.insert(target, stub);
        Some(stub)
    }

    fn write_stub(&self, stub: usize, target: usize) {
        let words: [u32; 4] = match self.machine {
            Machine::Arm => [ARM_STUB_LDR_PC, target as u32, 0, 0],
            Machine::Mips => [
                MIPS_STUB_LUI_T9 | ((target as u32) >> 16),
                MIPS_STUB_ORI_T9 | ((target as u32) & 0xFFFF),
                MIPS_STUB_JR_T9,
                0,
            ],
            Machine::X86 | Machine::X86_64 => return,
        };
        let size = self.machine.stub_size();
        let region = unsafe { core::slice::from_raw_parts_mut(stub as *mut u8, size) };
        for (chunk, word) in region.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }
}
