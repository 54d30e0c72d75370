// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver test suite.
//!
//! The test suite is SoC-independent. The binary wrapper owns the engine
//! `static` and the SysTick exception handler, and passes the engine in.

#![no_std]

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::{SCB, SYST};
use cortex_m_semihosting::hprintln;
use portable_atomic::{AtomicU32, Ordering};

use ms_systick::{get_default_config, reload_value, CortexMSysTick, TickEngine};

type Ticks = &'static TickEngine<CortexMSysTick>;

macro_rules! tests {
    ($ticks:expr, $($name:path,)*) => {
        $(
            {
                cortex_m_semihosting::hprint!(concat!(stringify!($name), "... "));
                $name($ticks);
                cortex_m_semihosting::hprintln!("OK");
            }
        )*
    };
}

pub fn run_test_suite(ticks: Ticks) -> ! {
    ticks.init(&get_default_config());

    tests! {
        ticks,
        test_init_programs_timer,
        test_init_leaves_peripherals_untaken,
        test_clock_advancing,
        test_delay_duration,
        test_pause_stops_counting,
        test_reconfigure_running_is_noop,
        test_reconfigure_frequency,
        test_callback_dispatch,
        test_delay_async,
    }

    hprintln!("tests complete.");
    cortex_m_semihosting::debug::exit(Ok(()));

    loop {
        cortex_m::asm::wfi();
    }
}

fn test_init_programs_timer(ticks: Ticks) {
    let expected = reload_value(ticks.core_clock_hz(), 1).unwrap();
    assert_eq!(SYST::get_reload(), expected);
    assert!(ticks.is_running());
    assert_eq!(ticks.tick_freq(), 1);
}

fn test_init_leaves_peripherals_untaken(ticks: Ticks) {
    assert_eq!(SCB::get_priority(SystemHandler::SysTick), 0);
    assert!(ticks.is_running());
    assert!(cortex_m::Peripherals::take().is_some());
}

fn test_clock_advancing(ticks: Ticks) {
    let t1 = ticks.get_tick();
    ticks.delay(2);
    let t2 = ticks.get_tick();
    assert!(t2.wrapping_sub(t1) >= 3);
}

fn test_delay_duration(ticks: Ticks) {
    let start = ticks.get_tick();
    ticks.delay(10);
    assert!(ticks.ticks_since(start) >= 11);
}

fn test_pause_stops_counting(ticks: Ticks) {
    ticks.pause();
    let before = ticks.get_tick();
    // Roughly 5ms of spinning at the nominal clock.
    cortex_m::asm::delay(ticks.core_clock_hz() / 200);
    assert_eq!(ticks.get_tick(), before);
    ticks.resume();
    ticks.delay(1);
    assert!(ticks.ticks_since(before) > 0);
}

fn test_reconfigure_running_is_noop(ticks: Ticks) {
    let reload = SYST::get_reload();
    ticks.set_frequency(&get_default_config().with_frequency_khz(5));
    ticks.set_interrupt(false);
    assert_eq!(SYST::get_reload(), reload);
    assert_eq!(ticks.tick_freq(), 1);
    assert!(ticks.is_running());
}

fn test_reconfigure_frequency(ticks: Ticks) {
    let fast = get_default_config();
    let slow = fast.with_frequency_khz(5);

    ticks.reconfigure(|stopped| stopped.set_frequency(&slow));
    assert_eq!(ticks.tick_freq(), 5);
    assert_eq!(SYST::get_reload(), reload_value(ticks.core_clock_hz(), 5).unwrap());

    let start = ticks.get_tick();
    ticks.delay(20);
    let elapsed = ticks.ticks_since(start);
    assert!(elapsed >= 25);
    assert_eq!(elapsed % 5, 0);

    ticks.reconfigure(|stopped| stopped.set_frequency(&fast));
    assert_eq!(ticks.tick_freq(), 1);
}

static SEEN: AtomicU32 = AtomicU32::new(0);

fn count_interrupt() {
    SEEN.fetch_add(1, Ordering::Relaxed);
}

fn test_callback_dispatch(ticks: Ticks) {
    ticks.register_callback(&count_interrupt);
    let frozen = ticks.get_tick();

    // Ten periods' worth of spinning; the tick count is no use as a clock
    // while it's frozen.
    cortex_m::asm::delay(ticks.core_clock_hz() / 100);

    assert!(SEEN.load(Ordering::Relaxed) > 0);
    assert_eq!(ticks.get_tick(), frozen);

    ticks.restore_default_callback();
    ticks.delay(1);
    assert!(ticks.ticks_since(frozen) > 0);
}

fn test_delay_async(ticks: Ticks) {
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    let start = ticks.get_tick();
    let mut delay = pin!(ticks.delay_async(5));
    while let Poll::Pending = delay.as_mut().poll(&mut cx) {
        cortex_m::asm::nop();
    }
    assert!(ticks.ticks_since(start) >= 6);
}
