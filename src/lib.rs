// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A millisecond tick counter for the ARM Cortex-M SysTick timer.
//!
//! This crate programs the SysTick timer to overflow at a fixed period, counts
//! milliseconds from the overflow interrupt, and provides a delay built on that
//! count. What happens on each interrupt can be replaced at runtime.
//!
//! # Pieces
//!
//! - [`config`] holds the startup configuration table and
//!   [`get_default_config`].
//! - [`time`] holds the [`TickEngine`], which does the actual work.
//! - [`hw`] describes the register interface the engine needs, so that it can
//!   be driven by something other than real hardware (in tests, for instance).
//! - [`cortex_m_timer`] implements that interface for the real peripheral.
//!   It's behind the `systick` feature, on by default.
//! - [`callback`] describes what can be run from the interrupt.
//!
//! # Getting started
//!
//! ```ignore
//! use ms_systick::{get_default_config, CortexMSysTick, TickEngine};
//!
//! static TICKS: TickEngine<CortexMSysTick> =
//!     TickEngine::new(unsafe { CortexMSysTick::new_unchecked() }, 96_000_000);
//!
//! #[cortex_m_rt::exception]
//! fn SysTick() {
//!     TICKS.on_interrupt();
//! }
//!
//! #[cortex_m_rt::entry]
//! fn main() -> ! {
//!     // ... bring up the clock tree first ...
//!     TICKS.init(&get_default_config());
//!     loop {
//!         TICKS.delay(500);
//!         // blink something
//!     }
//! }
//! ```
//!
//! Clock-tree setup is the application's job; `init` assumes the core clock is
//! already running at the frequency given to [`TickEngine::new`].
//!
//! # Concurrency and interrupts
//!
//! The model is one core, one interrupt writing the tick count, and any amount
//! of normal code reading it. Reads use a native-width atomic load, so they
//! never see a half-written count.
//!
//! Reprogramming the timer is only allowed while it is stopped. This is what
//! keeps the interrupt from firing while registers are half-written, and it is
//! the only synchronization the engine relies on; there are no locks. The one
//! critical section is a few instructions long, copying the current callback
//! out in [`TickEngine::on_interrupt`].
//!
//! Applications must provide a `critical-section` implementation. On a
//! single-core Cortex-M, turning on the `critical-section-single-core` feature
//! of `cortex-m` is enough.

#![cfg_attr(not(test), no_std)]

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications,
)]

/// Internal assert macro that doesn't stringify its expression or generate any
/// fancy messages. This means failures must be diagnosed by file:line only, so,
/// don't use this more than once on the same line. In exchange, this makes
/// asserts significantly smaller in terms of text size.
macro_rules! cheap_assert {
    ($x:expr) => {
        if !$x { panic!(); };
    }
}

pub mod callback;
pub mod config;
pub mod hw;
pub mod time;

#[cfg(feature = "systick")]
pub mod cortex_m_timer;

pub use callback::TickCallback;
pub use config::{config_get, get_default_config, ClockSource, SysTickConfig, SysTickId};
#[cfg(feature = "systick")]
pub use cortex_m_timer::CortexMSysTick;
pub use hw::SysTickHw;
pub use time::{reload_value, Stopped, TickEngine};
