// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver test suite, LM3S6965 wrapper (runs under QEMU's `lm3s6965evb`).

#![no_std]
#![no_main]

// get the panic handler
use panic_semihosting as _;

use cortex_m_rt::{entry, exception};
use ms_systick::{CortexMSysTick, TickEngine};

/// This constant assumes a 12MHz clock at reset. None of the tests rely on
/// this being exactly _correct,_ only on it being in a sensible range.
const HZ: u32 = 12_000_000;

static TICKS: TickEngine<CortexMSysTick> =
    // Safety: nothing else in this program touches SYST.
    TickEngine::new(unsafe { CortexMSysTick::new_unchecked() }, HZ);

#[exception]
fn SysTick() {
    TICKS.on_interrupt();
}

#[entry]
fn main() -> ! {
    ms_systick_testsuite::run_test_suite(&TICKS)
}
