//! Register access layer
//!
//! All hardware access goes through the [`UsbRegisters`] trait so the
//! transfer engine and bring-up sequences can be driven by a scripted
//! backend in tests. [`MmioRegisters`] is the real implementation:
//! volatile access with explicit barriers for the weakly-ordered ARM
//! memory model.

use crate::error::{Result, UsbError};

/// Number of poll iterations before a register wait gives up.
///
/// Each iteration is followed by a 1 us delay, bounding every hardware
/// wait at roughly one second.
pub const POLL_ATTEMPTS: u32 = 1_000_000;

/// Access to the DWC2 register block.
///
/// Offsets are relative to the controller base address (see the constants
/// in [`crate::dwc`]).
pub trait UsbRegisters {
    /// Read a 32-bit register.
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register.
    fn write32(&mut self, offset: u32, value: u32);

    /// Read-modify-write: clear `clear`, then set `set`.
    fn modify32(&mut self, offset: u32, clear: u32, set: u32) {
        let value = self.read32(offset);
        self.write32(offset, (value & !clear) | set);
    }

    /// Busy-wait for `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Data synchronization barrier ordering CPU memory access against
    /// device DMA, issued before exposing an outbound buffer to the
    /// controller and after an inbound transfer completes.
    fn dma_barrier(&mut self);
}

/// Poll a register until `mask` is fully set (or fully clear when `set`
/// is false), with a bounded iteration count.
pub fn wait_for_bit<R: UsbRegisters>(
    regs: &mut R,
    offset: u32,
    mask: u32,
    set: bool,
) -> Result<()> {
    let mut timeout = POLL_ATTEMPTS;
    while timeout > 0 {
        let mut value = regs.read32(offset);
        if !set {
            value = !value;
        }
        if value & mask == mask {
            return Ok(());
        }
        regs.delay_us(1);
        timeout -= 1;
    }

    #[cfg(feature = "defmt")]
    defmt::error!(
        "wait_for_bit: timeout (reg {:#x}, mask {:#x}, wait_set {})",
        offset,
        mask,
        set
    );

    Err(UsbError::Timeout)
}

/// Memory-mapped register access with ARM barrier discipline.
///
/// Reads are bracketed with DMB so the value observed is ordered against
/// surrounding accesses; writes end with DSB so the store has reached the
/// peripheral before execution continues.
pub struct MmioRegisters {
    base: usize,
    cycles_per_us: u32,
}

impl MmioRegisters {
    /// Create a register backend over the controller block at `base`.
    ///
    /// `cpu_hz` calibrates the busy-wait delay loop.
    ///
    /// # Safety
    ///
    /// `base` must be the virtual address of a DWC2 register block mapped
    /// as device memory, and the caller must have exclusive ownership of
    /// that controller.
    pub const unsafe fn new(base: usize, cpu_hz: u32) -> Self {
        Self {
            base,
            cycles_per_us: cpu_hz / 1_000_000,
        }
    }
}

impl UsbRegisters for MmioRegisters {
    #[inline(always)]
    fn read32(&self, offset: u32) -> u32 {
        let addr = (self.base + offset as usize) as *const u32;
        cortex_m::asm::dmb();
        let value = unsafe { core::ptr::read_volatile(addr) };
        cortex_m::asm::dmb();
        value
    }

    #[inline(always)]
    fn write32(&mut self, offset: u32, value: u32) {
        let addr = (self.base + offset as usize) as *mut u32;
        cortex_m::asm::dmb();
        unsafe { core::ptr::write_volatile(addr, value) };
        cortex_m::asm::dsb();
    }

    #[inline(always)]
    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us.saturating_mul(self.cycles_per_us));
    }

    #[inline(always)]
    fn dma_barrier(&mut self) {
        cortex_m::asm::dsb();
    }
}
