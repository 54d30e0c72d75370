// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt-time behavior.
//!
//! Every SysTick overflow ends up in
//! [`TickEngine::on_interrupt`][crate::time::TickEngine::on_interrupt], which
//! runs whatever is currently registered. Out of the box that's the engine's
//! own [`increment`][crate::time::TickEngine::increment].
//!
//! # Interrupt context
//!
//! A callback runs in the SysTick handler. It must not block, must not wait on
//! anything that normal-context code holds, and should finish in bounded time.
//! Replacing the default callback also means the tick counter stops advancing
//! unless the replacement advances it.

use core::fmt;

/// Something that can be run on every tick interrupt.
///
/// This is implemented for any `Fn() + Sync`, so a plain `fn` item or a
/// `static` closure works.
pub trait TickCallback: Sync {
    /// Called from interrupt context once per timer overflow.
    fn on_tick(&self);
}

impl<F: Fn() + Sync> TickCallback for F {
    fn on_tick(&self) {
        self()
    }
}

/// What `on_interrupt` will run. Never empty.
#[derive(Copy, Clone)]
pub(crate) enum Dispatch {
    /// Advance the engine's own tick counter.
    Increment,
    /// Run an application-supplied callback instead.
    Custom(&'static dyn TickCallback),
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increment => f.write_str("Increment"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
