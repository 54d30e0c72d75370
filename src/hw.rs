// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register-level interface to a SysTick-style down-counter.
//!
//! The engine in [`time`][crate::time] never touches hardware directly; it
//! goes through [`SysTickHw`]. The real Cortex-M implementation lives in
//! [`cortex_m_timer`][crate::cortex_m_timer], and tests substitute a fake.
//!
//! All methods take `&self`. Peripheral registers are volatile cells, so this
//! is honest, and it lets the engine be shared with the interrupt handler
//! through a plain `static`.

use crate::config::ClockSource;

/// Largest value the 24-bit reload register can hold.
pub const RELOAD_MAX: u32 = 0x00FF_FFFF;

/// Control/status register: counter enable.
pub const CSR_ENABLE: u32 = 1 << 0;
/// Control/status register: overflow interrupt enable.
pub const CSR_TICKINT: u32 = 1 << 1;
/// Control/status register: clock source, set for the processor clock.
pub const CSR_CLKSOURCE: u32 = 1 << 2;

/// Operations a tick engine needs from its timer peripheral.
pub trait SysTickHw {
    /// Checks the counter enable bit.
    fn is_counter_enabled(&self) -> bool;
    /// Starts the counter.
    fn enable_counter(&self);
    /// Stops the counter.
    fn disable_counter(&self);

    /// Writes the reload register. `value` is at most [`RELOAD_MAX`].
    fn set_reload(&self, value: u32);
    /// Resets the current-value register to zero.
    fn clear_current(&self);
    /// Selects the counter clock, leaving the other control bits alone.
    fn set_clock_source(&self, source: ClockSource);

    /// Turns on the overflow interrupt.
    fn enable_interrupt(&self);
    /// Turns off the overflow interrupt.
    fn disable_interrupt(&self);
    /// Checks the overflow interrupt enable bit.
    fn is_interrupt_enabled(&self) -> bool;

    /// Gives the overflow interrupt the highest priority the core supports.
    fn set_max_priority(&self);
}

impl<T: SysTickHw + ?Sized> SysTickHw for &T {
    fn is_counter_enabled(&self) -> bool {
        (**self).is_counter_enabled()
    }
    fn enable_counter(&self) {
        (**self).enable_counter()
    }
    fn disable_counter(&self) {
        (**self).disable_counter()
    }
    fn set_reload(&self, value: u32) {
        (**self).set_reload(value)
    }
    fn clear_current(&self) {
        (**self).clear_current()
    }
    fn set_clock_source(&self, source: ClockSource) {
        (**self).set_clock_source(source)
    }
    fn enable_interrupt(&self) {
        (**self).enable_interrupt()
    }
    fn disable_interrupt(&self) {
        (**self).disable_interrupt()
    }
    fn is_interrupt_enabled(&self) -> bool {
        (**self).is_interrupt_enabled()
    }
    fn set_max_priority(&self) {
        (**self).set_max_priority()
    }
}
