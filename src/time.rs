// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timekeeping using the SysTick Timer.
//!
//! A [`TickEngine`] programs a SysTick-style down-counter to overflow at a
//! fixed period and maintains a 32-bit count of milliseconds ("ticks"),
//! advanced from the overflow interrupt. On top of that it offers a busy-wait
//! [`delay`][TickEngine::delay] and an `async` equivalent.
//!
//! To use it, put an engine in a `static`, call [`TickEngine::init`] once the
//! clock tree is running, and route the SysTick exception to
//! [`TickEngine::on_interrupt`]. See
//! [`cortex_m_timer`][crate::cortex_m_timer] for the hookup.
//!
//! # Reconfiguring
//!
//! The counter must be stopped while its reload value or interrupt enable is
//! changed, so that the interrupt can't fire halfway through. The engine
//! enforces this: [`set_frequency`][TickEngine::set_frequency] and
//! [`set_interrupt`][TickEngine::set_interrupt] do nothing at all while the
//! counter runs. The usual pattern is
//!
//! ```ignore
//! TICKS.pause();
//! TICKS.set_frequency(&get_default_config().with_frequency_khz(5));
//! TICKS.resume();
//! ```
//!
//! or, equivalently, [`TickEngine::reconfigure`].
//!
//! Internally, every register write and every change to the cached tick step
//! goes through a [`Stopped`] handle, and each of its operations checks the
//! counter enable bit again before touching anything.
//!
//! # Overflow of the tick counter
//!
//! `get_tick` returns a `u32`, which wraps after about 49.7 days at one tick
//! per millisecond. Compare tick values with
//! [`ticks_since`][TickEngine::ticks_since] (or `wrapping_sub`), never with
//! `<`; differences are correct as long as the interval itself is shorter than
//! one full wrap.

use core::cell::Cell;
use core::fmt;
use core::future::Future;
use core::task::Poll;

use critical_section::Mutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::callback::{Dispatch, TickCallback};
use crate::config::{ClockSource, SysTickConfig};
use crate::hw::{SysTickHw, RELOAD_MAX};

/// Computes the reload register value for a timer that overflows
/// `1000 / frequency_khz` times per second, i.e.
/// `core_clock_hz / (1000 / frequency_khz) - 1`.
///
/// Returns `None` if `frequency_khz` is zero or above 1000, if the clock is
/// too slow to count even one cycle per period, or if the result doesn't fit
/// the 24-bit reload register.
pub fn reload_value(core_clock_hz: u32, frequency_khz: u32) -> Option<u32> {
    let divisor = 1000_u32.checked_div(frequency_khz)?;
    let cycles = core_clock_hz.checked_div(divisor)?;
    let reload = cycles.checked_sub(1)?;
    if reload > RELOAD_MAX {
        None
    } else {
        Some(reload)
    }
}

/// Number of ticks `delay` waits for: the requested duration plus one tick
/// step, because the first increment after sampling the start tick may arrive
/// almost immediately. Saturates rather than wrapping the request.
fn delay_threshold(duration_ms: u32, tick_freq: u32) -> u32 {
    duration_ms.saturating_add(tick_freq)
}

/// Millisecond tick counter driven by a SysTick-style timer.
///
/// All operations take `&self`, so the engine can sit in a `static` shared
/// between normal code and the interrupt handler.
pub struct TickEngine<H> {
    hw: H,
    core_clock_hz: u32,
    /// Milliseconds since init. Written only by `increment`.
    tick_ms: AtomicU32,
    /// Milliseconds per overflow. Written only through `Stopped`.
    tick_freq: AtomicU32,
    callback: Mutex<Cell<Dispatch>>,
}

impl<H> TickEngine<H> {
    /// Creates an engine for the timer behind `hw`, on a core running at
    /// `core_clock_hz`. Nothing is written to the hardware until
    /// [`init`][Self::init].
    pub const fn new(hw: H, core_clock_hz: u32) -> Self {
        Self {
            hw,
            core_clock_hz,
            tick_ms: AtomicU32::new(0),
            tick_freq: AtomicU32::new(0),
            callback: Mutex::new(Cell::new(Dispatch::Increment)),
        }
    }

    /// Borrows the register interface.
    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// Core clock frequency given at construction.
    pub fn core_clock_hz(&self) -> u32 {
        self.core_clock_hz
    }

    /// Milliseconds added per overflow, as last programmed by
    /// [`set_frequency`][Self::set_frequency]. Zero before that.
    pub fn tick_freq(&self) -> u32 {
        self.tick_freq.load(Ordering::Relaxed)
    }

    /// Returns the current tick count.
    ///
    /// This is safe to call from any context, including concurrently with the
    /// interrupt handler.
    pub fn get_tick(&self) -> u32 {
        self.tick_ms.load(Ordering::Acquire)
    }

    /// Ticks elapsed since `start`, correct across wraparound.
    pub fn ticks_since(&self, start: u32) -> u32 {
        self.get_tick().wrapping_sub(start)
    }

    /// Advances the tick count by one overflow's worth of milliseconds.
    ///
    /// This is the default interrupt callback. If you register your own
    /// callback and still want timekeeping, call this from it.
    pub fn increment(&self) {
        let step = self.tick_freq.load(Ordering::Relaxed);
        self.tick_ms.fetch_add(step, Ordering::Release);
    }

    /// Spins until at least `duration_ms` milliseconds have passed.
    ///
    /// One extra tick step is added to the wait to cover a partial first tick,
    /// unless that would overflow `duration_ms`. This never yields and has no
    /// way to give up early: if the tick interrupt isn't running, it doesn't
    /// return.
    pub fn delay(&self, duration_ms: u32) {
        let start = self.get_tick();
        let threshold = delay_threshold(duration_ms, self.tick_freq());
        while self.ticks_since(start) < threshold {
            core::hint::spin_loop();
        }
    }

    /// Like [`delay`][Self::delay], but yields to the executor between checks
    /// instead of spinning.
    ///
    /// The start tick is sampled when this is called, not when the future is
    /// first polled. The future wakes itself on every poll, so on an executor
    /// with nothing else to run this behaves much like `delay`.
    pub fn delay_async(
        &self,
        duration_ms: u32,
    ) -> impl Future<Output = ()> + '_ {
        let start = self.get_tick();
        let threshold = delay_threshold(duration_ms, self.tick_freq());
        futures::future::poll_fn(move |cx| {
            if self.ticks_since(start) >= threshold {
                Poll::Ready(())
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
    }

    /// Makes `callback` the interrupt-time behavior, replacing whatever was
    /// there before (including the default increment).
    pub fn register_callback(&self, callback: &'static dyn TickCallback) {
        self.set_dispatch(Dispatch::Custom(callback));
    }

    /// Goes back to plain [`increment`][Self::increment] on each interrupt.
    pub fn restore_default_callback(&self) {
        self.set_dispatch(Dispatch::Increment);
    }

    fn set_dispatch(&self, dispatch: Dispatch) {
        critical_section::with(|cs| self.callback.borrow(cs).set(dispatch));
    }

    /// Interrupt entry point. Runs the registered callback.
    ///
    /// Call this from the SysTick exception handler, exactly once per
    /// overflow.
    pub fn on_interrupt(&self) {
        // Copy out and release the critical section before running user code.
        let dispatch = critical_section::with(|cs| self.callback.borrow(cs).get());
        match dispatch {
            Dispatch::Increment => self.increment(),
            Dispatch::Custom(callback) => callback.on_tick(),
        }
    }
}

impl<H: SysTickHw> TickEngine<H> {
    /// Sets up and starts the timer according to `config`.
    ///
    /// Does nothing if `config.enabled` is false. Otherwise this stops the
    /// counter, programs the reload value, raises the SysTick interrupt to
    /// maximum priority, selects the clock source, applies the interrupt
    /// setting, and starts the counter again.
    ///
    /// # Panics
    ///
    /// If `config.frequency_khz` and the core clock don't produce a reload
    /// value that fits the timer (see [`reload_value`]).
    pub fn init(&self, config: &SysTickConfig) {
        if !config.enabled {
            return;
        }
        self.pause();
        let stopped = Stopped { engine: self };
        stopped.set_frequency(config);
        self.hw.set_max_priority();
        stopped.set_clock_source(config.clock_source);
        stopped.set_interrupt(config.interrupt_enabled);
        self.resume();
    }

    /// Checks whether the counter is running.
    pub fn is_running(&self) -> bool {
        self.hw.is_counter_enabled()
    }

    /// Stops the counter. Idempotent.
    pub fn pause(&self) {
        self.hw.disable_counter();
    }

    /// Starts the counter. Idempotent.
    pub fn resume(&self) {
        self.hw.enable_counter();
    }

    /// Returns a handle for reprogramming the timer, if it is stopped.
    pub(crate) fn stopped(&self) -> Option<Stopped<'_, H>> {
        if self.is_running() {
            None
        } else {
            Some(Stopped { engine: self })
        }
    }

    /// Programs the timer for `config.frequency_khz`. Does nothing if the
    /// counter is running or `config` is disabled.
    ///
    /// # Panics
    ///
    /// If the resulting reload value doesn't fit the timer.
    pub fn set_frequency(&self, config: &SysTickConfig) {
        if let Some(stopped) = self.stopped() {
            stopped.set_frequency(config);
        }
    }

    /// Turns the overflow interrupt on or off. Does nothing if the counter is
    /// running.
    pub fn set_interrupt(&self, enable: bool) {
        if let Some(stopped) = self.stopped() {
            stopped.set_interrupt(enable);
        }
    }

    /// Pauses the counter, runs `body` with a [`Stopped`] handle, and then
    /// resumes the counter if it was running beforehand.
    pub fn reconfigure<R>(&self, body: impl FnOnce(&Stopped<'_, H>) -> R) -> R {
        let was_running = self.is_running();
        self.pause();
        let result = body(&Stopped { engine: self });
        if was_running {
            self.resume();
        }
        result
    }
}

impl<H: fmt::Debug> fmt::Debug for TickEngine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dispatch = critical_section::with(|cs| self.callback.borrow(cs).get());
        f.debug_struct("TickEngine")
            .field("hw", &self.hw)
            .field("core_clock_hz", &self.core_clock_hz)
            .field("tick_ms", &self.get_tick())
            .field("tick_freq", &self.tick_freq())
            .field("callback", &dispatch)
            .finish()
    }
}

/// The only way to change the timer's programming, handed out by
/// [`TickEngine::reconfigure`].
///
/// Every operation re-reads the counter enable bit first and does nothing if
/// the counter is running, so resuming while holding one of these just turns
/// the remaining writes into no-ops.
#[derive(Debug)]
pub struct Stopped<'a, H> {
    engine: &'a TickEngine<H>,
}

impl<H: SysTickHw> Stopped<'_, H> {
    fn still_stopped(&self) -> bool {
        !self.engine.hw.is_counter_enabled()
    }

    /// Programs the reload value for `config.frequency_khz`, zeroes the
    /// current count, and records the new tick step. Does nothing if `config`
    /// is disabled or the counter is running.
    ///
    /// # Panics
    ///
    /// If the resulting reload value doesn't fit the timer.
    pub fn set_frequency(&self, config: &SysTickConfig) {
        if !config.enabled || !self.still_stopped() {
            return;
        }
        // None folds into the range check.
        let reload = reload_value(self.engine.core_clock_hz, config.frequency_khz)
            .unwrap_or(u32::MAX);
        cheap_assert!(reload <= RELOAD_MAX);

        self.engine.tick_freq.store(config.frequency_khz, Ordering::Relaxed);
        self.engine.hw.set_reload(reload);
        self.engine.hw.clear_current();
    }

    /// Turns the overflow interrupt on or off. Does nothing if the counter is
    /// running.
    pub fn set_interrupt(&self, enable: bool) {
        if !self.still_stopped() {
            return;
        }
        if enable {
            self.engine.hw.enable_interrupt();
        } else {
            self.engine.hw.disable_interrupt();
        }
    }

    /// Selects the counter clock. Does nothing if the counter is running.
    pub fn set_clock_source(&self, source: ClockSource) {
        if self.still_stopped() {
            self.engine.hw.set_clock_source(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::pin::pin;
    use portable_atomic::{AtomicBool, AtomicUsize};

    use crate::config::get_default_config;
    use crate::hw::{CSR_CLKSOURCE, CSR_ENABLE, CSR_TICKINT};

    const HZ: u32 = 96_000_000;

    /// Register-level stand-in for the SysTick block.
    #[derive(Debug)]
    struct FakeSysTick {
        csr: AtomicU32,
        rvr: AtomicU32,
        cvr: AtomicU32,
        reload_writes: AtomicUsize,
        priority_writes: AtomicUsize,
    }

    impl FakeSysTick {
        fn new() -> Self {
            Self {
                csr: AtomicU32::new(0),
                rvr: AtomicU32::new(0),
                // Garbage, so we can see it get cleared.
                cvr: AtomicU32::new(1234),
                reload_writes: AtomicUsize::new(0),
                priority_writes: AtomicUsize::new(0),
            }
        }

        fn csr(&self) -> u32 {
            self.csr.load(Ordering::SeqCst)
        }

        fn reload(&self) -> u32 {
            self.rvr.load(Ordering::SeqCst)
        }
    }

    impl SysTickHw for FakeSysTick {
        fn is_counter_enabled(&self) -> bool {
            self.csr() & CSR_ENABLE != 0
        }
        fn enable_counter(&self) {
            self.csr.fetch_or(CSR_ENABLE, Ordering::SeqCst);
        }
        fn disable_counter(&self) {
            self.csr.fetch_and(!CSR_ENABLE, Ordering::SeqCst);
        }
        fn set_reload(&self, value: u32) {
            self.reload_writes.fetch_add(1, Ordering::SeqCst);
            self.rvr.store(value, Ordering::SeqCst);
        }
        fn clear_current(&self) {
            self.cvr.store(0, Ordering::SeqCst);
        }
        fn set_clock_source(&self, source: ClockSource) {
            match source {
                ClockSource::Internal => self.csr.fetch_or(CSR_CLKSOURCE, Ordering::SeqCst),
                ClockSource::External => self.csr.fetch_and(!CSR_CLKSOURCE, Ordering::SeqCst),
            };
        }
        fn enable_interrupt(&self) {
            self.csr.fetch_or(CSR_TICKINT, Ordering::SeqCst);
        }
        fn disable_interrupt(&self) {
            self.csr.fetch_and(!CSR_TICKINT, Ordering::SeqCst);
        }
        fn is_interrupt_enabled(&self) -> bool {
            self.csr() & CSR_TICKINT != 0
        }
        fn set_max_priority(&self) {
            self.priority_writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn engine() -> TickEngine<FakeSysTick> {
        TickEngine::new(FakeSysTick::new(), HZ)
    }

    /// Runs `body` while another thread plays the part of the SysTick
    /// interrupt, calling `on_interrupt` as fast as it can.
    fn with_interrupts<R>(
        engine: &TickEngine<FakeSysTick>,
        body: impl FnOnce() -> R,
    ) -> R {
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    engine.on_interrupt();
                    std::thread::yield_now();
                }
            });
            let result = body();
            done.store(true, Ordering::SeqCst);
            result
        })
    }

    #[test]
    fn test_reload_value_formula() {
        assert_eq!(reload_value(96_000_000, 1), Some(95_999));
        assert_eq!(reload_value(16_000_000, 1), Some(15_999));
        // 1000 / 5 = 200
        assert_eq!(reload_value(96_000_000, 5), Some(479_999));
        assert_eq!(reload_value(50_000_000, 2), Some(99_999));
    }

    #[test]
    fn test_reload_value_range() {
        // Exactly fits the 24-bit register.
        assert_eq!(reload_value(0x0100_0000, 1000), Some(RELOAD_MAX));
        assert_eq!(reload_value(0x0100_0001, 1000), None);
        assert_eq!(reload_value(96_000_000, 1000), None);
    }

    #[test]
    fn test_reload_value_degenerate() {
        assert_eq!(reload_value(HZ, 0), None);
        assert_eq!(reload_value(HZ, 1001), None);
        assert_eq!(reload_value(0, 1), None);
        assert_eq!(reload_value(999, 1), None);
    }

    #[test]
    fn test_end_to_end() {
        let engine = engine();
        engine.init(&get_default_config());

        let hw = engine.hw();
        assert_eq!(hw.reload(), 95_999);
        assert_eq!(hw.cvr.load(Ordering::SeqCst), 0);
        assert!(engine.is_running());
        assert!(hw.is_interrupt_enabled());
        assert_ne!(hw.csr() & CSR_CLKSOURCE, 0);
        assert_eq!(hw.priority_writes.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tick_freq(), 1);

        for _ in 0..50 {
            engine.on_interrupt();
        }
        assert_eq!(engine.get_tick(), 50);
    }

    #[test]
    fn test_init_external_clock_no_interrupt() {
        let engine = engine();
        let config = get_default_config()
            .with_interrupt(false)
            .with_clock_source(ClockSource::External);
        engine.hw().csr.store(CSR_CLKSOURCE | CSR_TICKINT, Ordering::SeqCst);

        engine.init(&config);

        assert_eq!(engine.hw().csr(), CSR_ENABLE);
    }

    #[test]
    fn test_engine_over_borrowed_hw() {
        let hw = FakeSysTick::new();
        let engine = TickEngine::new(&hw, 16_000_000);
        engine.init(&get_default_config());

        assert_eq!(hw.reload(), 15_999);
        assert!(hw.is_counter_enabled());
    }

    #[test]
    fn test_init_disabled_is_noop() {
        let engine = engine();
        engine.init(&SysTickConfig::disabled());

        let hw = engine.hw();
        assert_eq!(hw.csr(), 0);
        assert_eq!(hw.reload_writes.load(Ordering::SeqCst), 0);
        assert_eq!(hw.priority_writes.load(Ordering::SeqCst), 0);
        assert_eq!(engine.tick_freq(), 0);
    }

    #[test]
    #[should_panic]
    fn test_init_out_of_range_panics() {
        let engine = engine();
        engine.init(&get_default_config().with_frequency_khz(1000));
    }

    #[test]
    #[should_panic]
    fn test_set_frequency_zero_panics() {
        let engine = engine();
        engine.set_frequency(&get_default_config().with_frequency_khz(0));
    }

    #[test]
    fn test_reconfigure_while_running_is_noop() {
        let engine = engine();
        engine.init(&get_default_config());
        let csr_before = engine.hw().csr();

        engine.set_frequency(&get_default_config().with_frequency_khz(5));
        engine.set_interrupt(false);

        assert_eq!(engine.hw().reload(), 95_999);
        assert_eq!(engine.hw().reload_writes.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tick_freq(), 1);
        assert_eq!(engine.hw().csr(), csr_before);
        assert!(engine.stopped().is_none());
    }

    #[test]
    fn test_reconfigure_while_stopped_applies() {
        let engine = engine();
        engine.init(&get_default_config());

        engine.pause();
        engine.hw().cvr.store(77, Ordering::SeqCst);
        engine.set_frequency(&get_default_config().with_frequency_khz(5));
        engine.set_interrupt(false);
        engine.resume();

        assert_eq!(engine.hw().reload(), 479_999);
        assert_eq!(engine.hw().cvr.load(Ordering::SeqCst), 0);
        assert_eq!(engine.tick_freq(), 5);
        assert!(!engine.hw().is_interrupt_enabled());
        assert!(engine.is_running());

        engine.on_interrupt();
        engine.on_interrupt();
        assert_eq!(engine.get_tick(), 10);
    }

    #[test]
    fn test_set_frequency_disabled_config_is_noop() {
        let engine = engine();
        engine.set_frequency(&SysTickConfig::disabled().with_frequency_khz(5));
        assert_eq!(engine.hw().reload_writes.load(Ordering::SeqCst), 0);
        assert_eq!(engine.tick_freq(), 0);
    }

    #[test]
    fn test_pause_resume_preserves_programming() {
        let engine = engine();
        engine.init(&get_default_config());

        engine.pause();
        engine.pause();
        assert!(!engine.is_running());
        engine.resume();
        engine.resume();
        assert!(engine.is_running());

        assert_eq!(engine.hw().reload(), 95_999);
        assert_eq!(engine.hw().reload_writes.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tick_freq(), 1);
    }

    #[test]
    fn test_reconfigure_restores_running_state() {
        let engine = engine();
        engine.init(&get_default_config());

        let step = engine.reconfigure(|stopped| {
            stopped.set_frequency(&get_default_config().with_frequency_khz(2));
            engine.tick_freq()
        });
        assert_eq!(step, 2);
        assert!(engine.is_running());
        assert_eq!(engine.hw().reload(), 191_999);

        engine.pause();
        engine.reconfigure(|stopped| stopped.set_interrupt(false));
        assert!(!engine.is_running());
        assert!(!engine.hw().is_interrupt_enabled());
    }

    #[test]
    fn test_stopped_handle_inert_after_resume() {
        let engine = engine();
        engine.init(&get_default_config());
        engine.pause();

        let stopped = engine.stopped().unwrap();
        engine.resume();
        stopped.set_frequency(&get_default_config().with_frequency_khz(5));
        stopped.set_interrupt(false);
        stopped.set_clock_source(ClockSource::External);

        assert!(engine.is_running());
        assert_eq!(engine.tick_freq(), 1);
        assert_eq!(engine.hw().reload(), 95_999);
        assert!(engine.hw().is_interrupt_enabled());
        assert_ne!(engine.hw().csr() & CSR_CLKSOURCE, 0);
    }

    #[test]
    fn test_reconfigure_body_cannot_resume_and_write() {
        let engine = engine();
        engine.init(&get_default_config());

        engine.reconfigure(|stopped| {
            engine.resume();
            stopped.set_frequency(&get_default_config().with_frequency_khz(5));
            stopped.set_interrupt(false);
        });

        assert!(engine.is_running());
        assert_eq!(engine.tick_freq(), 1);
        assert_eq!(engine.hw().reload(), 95_999);
        assert_eq!(engine.hw().reload_writes.load(Ordering::SeqCst), 1);
        assert!(engine.hw().is_interrupt_enabled());
    }

    #[test]
    fn test_increment_steps_and_wraps() {
        let engine = engine();
        engine.init(&get_default_config().with_frequency_khz(4));

        for _ in 0..7 {
            engine.increment();
        }
        assert_eq!(engine.get_tick(), 28);

        engine.tick_ms.store(u32::MAX - 1, Ordering::SeqCst);
        let start = engine.get_tick();
        engine.increment();
        assert_eq!(engine.get_tick(), 2);
        assert_eq!(engine.ticks_since(start), 4);
    }

    #[test]
    fn test_register_callback_replaces() {
        static FIRST: AtomicUsize = AtomicUsize::new(0);
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        fn first() {
            FIRST.fetch_add(1, Ordering::SeqCst);
        }
        fn second() {
            SECOND.fetch_add(1, Ordering::SeqCst);
        }

        let engine = engine();
        engine.init(&get_default_config());

        engine.register_callback(&first);
        engine.on_interrupt();
        assert_eq!(FIRST.load(Ordering::SeqCst), 1);
        assert_eq!(engine.get_tick(), 0);

        engine.register_callback(&second);
        engine.on_interrupt();
        engine.on_interrupt();
        assert_eq!(FIRST.load(Ordering::SeqCst), 1);
        assert_eq!(SECOND.load(Ordering::SeqCst), 2);
        assert_eq!(engine.get_tick(), 0);

        engine.restore_default_callback();
        engine.on_interrupt();
        assert_eq!(SECOND.load(Ordering::SeqCst), 2);
        assert_eq!(engine.get_tick(), 1);
    }

    #[test]
    fn test_callback_can_chain_to_increment() {
        static ENGINE: TickEngine<FakeSysTick> = TickEngine::new(
            FakeSysTick {
                csr: AtomicU32::new(0),
                rvr: AtomicU32::new(0),
                cvr: AtomicU32::new(0),
                reload_writes: AtomicUsize::new(0),
                priority_writes: AtomicUsize::new(0),
            },
            HZ,
        );
        static SEEN: AtomicUsize = AtomicUsize::new(0);
        fn count_and_tick() {
            SEEN.fetch_add(1, Ordering::SeqCst);
            ENGINE.increment();
        }

        ENGINE.init(&get_default_config());
        ENGINE.register_callback(&count_and_tick);
        for _ in 0..3 {
            ENGINE.on_interrupt();
        }
        assert_eq!(SEEN.load(Ordering::SeqCst), 3);
        assert_eq!(ENGINE.get_tick(), 3);
    }

    #[test]
    fn test_delay_threshold() {
        assert_eq!(delay_threshold(10, 1), 11);
        assert_eq!(delay_threshold(0, 5), 5);
        assert_eq!(delay_threshold(u32::MAX - 1, 1), u32::MAX);
        assert_eq!(delay_threshold(u32::MAX - 1, 5), u32::MAX);
        assert_eq!(delay_threshold(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_delay_waits_long_enough() {
        let engine = engine();
        engine.init(&get_default_config());

        let elapsed = with_interrupts(&engine, || {
            let start = engine.get_tick();
            engine.delay(10);
            engine.ticks_since(start)
        });
        assert!(elapsed >= 11);
    }

    #[test]
    fn test_delay_across_wraparound() {
        let engine = engine();
        engine.init(&get_default_config().with_frequency_khz(2));
        engine.tick_ms.store(u32::MAX - 3, Ordering::SeqCst);

        let (start, elapsed) = with_interrupts(&engine, || {
            let start = engine.get_tick();
            engine.delay(20);
            (start, engine.ticks_since(start))
        });
        assert!(elapsed >= 22);
        // The counter really did wrap underneath us.
        assert!(engine.get_tick() < start);
    }

    #[test]
    fn test_delay_async() {
        let engine = engine();
        engine.init(&get_default_config());

        let elapsed = with_interrupts(&engine, || {
            let start = engine.get_tick();
            futures::executor::block_on(engine.delay_async(8));
            engine.ticks_since(start)
        });
        assert!(elapsed >= 9);
    }

    #[test]
    fn test_delay_async_pending_without_ticks() {
        use core::task::Context;
        use futures::task::noop_waker_ref;

        let engine = engine();
        engine.init(&get_default_config());

        let mut cx = Context::from_waker(noop_waker_ref());
        let mut delay = pin!(engine.delay_async(3));
        assert!(delay.as_mut().poll(&mut cx).is_pending());

        for _ in 0..3 {
            engine.on_interrupt();
        }
        assert!(delay.as_mut().poll(&mut cx).is_pending());

        engine.on_interrupt();
        assert!(delay.as_mut().poll(&mut cx).is_ready());
    }
}
