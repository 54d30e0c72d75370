// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M implementation of the register interface.
//!
//! The application still has to route the SysTick exception to the engine.
//! With `cortex-m-rt` that looks like this:
//!
//! ```ignore
//! static TICKS: TickEngine<CortexMSysTick> =
//!     TickEngine::new(unsafe { CortexMSysTick::new_unchecked() }, 96_000_000);
//!
//! #[cortex_m_rt::exception]
//! fn SysTick() {
//!     TICKS.on_interrupt();
//! }
//! ```

use cortex_m::peripheral::{syst, SCB, SYST};

use crate::config::ClockSource;
use crate::hw::{SysTickHw, CSR_CLKSOURCE, CSR_ENABLE, CSR_TICKINT};

/// Offset of SHPR3 (system handler priorities 12-15) within the SCB block.
const SHPR3_OFFSET: usize = 0x20;
/// SysTick is handler 15, the top byte of SHPR3.
const SYSTICK_PRIO_SHIFT: u32 = 24;

/// Returns `shpr3` with the SysTick priority byte replaced by `priority`.
fn with_systick_priority(shpr3: u32, priority: u8) -> u32 {
    (shpr3 & !(0xFF << SYSTICK_PRIO_SHIFT)) | (u32::from(priority) << SYSTICK_PRIO_SHIFT)
}

/// Handle on the core SysTick registers.
///
/// This is a zero-sized stand-in for [`SYST`], which can't be shared with an
/// interrupt handler because it is neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct CortexMSysTick {
    _private: (),
}

impl CortexMSysTick {
    /// Takes over the SysTick peripheral.
    pub fn new(_syst: SYST) -> Self {
        Self { _private: () }
    }

    /// Produces a handle without proof of ownership of `SYST`. This is the
    /// `const` version for use in `static` initializers.
    ///
    /// # Safety
    ///
    /// Nothing else in the program may use the SysTick registers, or the
    /// engine's view of the counter state will be wrong.
    pub const unsafe fn new_unchecked() -> Self {
        Self { _private: () }
    }

    fn regs(&self) -> &'static syst::RegisterBlock {
        // Safety: SYST::PTR is the architecturally fixed register block
        // address, valid for the life of the program. Exclusive use is the
        // caller's promise from `new`/`new_unchecked`.
        unsafe { &*SYST::PTR }
    }

    fn modify_csr(&self, f: impl FnOnce(u32) -> u32) {
        // Safety: CSR only contains the bits we're managing plus the
        // read-to-clear COUNTFLAG, which we don't use.
        unsafe { self.regs().csr.modify(f) }
    }
}

impl SysTickHw for CortexMSysTick {
    fn is_counter_enabled(&self) -> bool {
        self.regs().csr.read() & CSR_ENABLE != 0
    }

    fn enable_counter(&self) {
        self.modify_csr(|v| v | CSR_ENABLE);
    }

    fn disable_counter(&self) {
        self.modify_csr(|v| v & !CSR_ENABLE);
    }

    fn set_reload(&self, value: u32) {
        // Safety: callers keep value within the 24-bit field.
        unsafe { self.regs().rvr.write(value) }
    }

    fn clear_current(&self) {
        // Safety: any write clears CVR and COUNTFLAG.
        unsafe { self.regs().cvr.write(0) }
    }

    fn set_clock_source(&self, source: ClockSource) {
        match source {
            ClockSource::Internal => self.modify_csr(|v| v | CSR_CLKSOURCE),
            ClockSource::External => self.modify_csr(|v| v & !CSR_CLKSOURCE),
        }
    }

    fn enable_interrupt(&self) {
        self.modify_csr(|v| v | CSR_TICKINT);
    }

    fn disable_interrupt(&self) {
        self.modify_csr(|v| v & !CSR_TICKINT);
    }

    fn is_interrupt_enabled(&self) -> bool {
        self.regs().csr.read() & CSR_TICKINT != 0
    }

    fn set_max_priority(&self) {
        // SHPR3 is word-accessible on every profile, ARMv6-M included, so this
        // goes around `SCB::set_priority` and leaves `Peripherals` untaken.
        let shpr3 = (SCB::PTR as *const u8).wrapping_add(SHPR3_OFFSET) as *mut u32;
        // Safety: SHPR3 is a fixed, always-mapped SCB register. Only the
        // SysTick byte changes; the PendSV byte is written back as read.
        unsafe {
            let v = core::ptr::read_volatile(shpr3);
            core::ptr::write_volatile(shpr3, with_systick_priority(v, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systick_priority_byte_only() {
        // PendSV at 0x40, SysTick at 0xC0, reserved bytes zero.
        assert_eq!(with_systick_priority(0xC040_0000, 0), 0x0040_0000);
        assert_eq!(with_systick_priority(0x0000_0000, 0), 0);
        assert_eq!(with_systick_priority(0xFFFF_FFFF, 0), 0x00FF_FFFF);
        assert_eq!(with_systick_priority(0x0012_3456, 0x80), 0x8012_3456);
    }
}
