// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Startup configuration for the tick source.
//!
//! The configuration lives in a fixed table, one entry per [`SysTickId`], and
//! is never mutated. Applications normally just call [`get_default_config`]
//! and hand the result to [`TickEngine::init`][crate::time::TickEngine::init].
//!
//! Note that disabling the tick source (`enabled: false`) is supported, but it
//! also takes away every timeout that depends on [`get_tick`] -- bus drivers
//! waiting on a peripheral, for instance, will wait forever.
//!
//! [`get_tick`]: crate::time::TickEngine::get_tick

/// Where the SysTick counter takes its clock from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockSource {
    /// The implementation-defined reference clock (often the core clock / 8).
    External,
    /// The processor core clock. This is the usual choice.
    Internal,
}

/// Identifies one tick source instance in the configuration table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SysTickId {
    /// The core SysTick timer.
    SysTick1,
}

impl SysTickId {
    /// Number of entries in the configuration table.
    pub const COUNT: usize = 1;

    const fn index(self) -> usize {
        match self {
            Self::SysTick1 => 0,
        }
    }
}

/// Describes how one tick source should be set up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SysTickConfig {
    /// Whether the tick source should be armed at all.
    pub enabled: bool,
    /// Milliseconds added to the tick counter per timer overflow. This also
    /// sets the overflow period. Recommended value is 1.
    pub frequency_khz: u32,
    /// Whether the overflow interrupt should be generated. Without it, the
    /// tick counter never advances.
    pub interrupt_enabled: bool,
    /// Counter clock source.
    pub clock_source: ClockSource,
}

impl SysTickConfig {
    /// The recommended setup: enabled, one tick per millisecond, interrupt on,
    /// core clock.
    pub const fn new() -> Self {
        Self {
            enabled: true,
            frequency_khz: 1,
            interrupt_enabled: true,
            clock_source: ClockSource::Internal,
        }
    }

    /// A configuration that leaves the tick source alone.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Returns a copy of `self` with a different `frequency_khz`.
    pub const fn with_frequency_khz(self, frequency_khz: u32) -> Self {
        Self { frequency_khz, ..self }
    }

    /// Returns a copy of `self` with the interrupt enabled or disabled.
    pub const fn with_interrupt(self, interrupt_enabled: bool) -> Self {
        Self { interrupt_enabled, ..self }
    }

    /// Returns a copy of `self` using `clock_source`.
    pub const fn with_clock_source(self, clock_source: ClockSource) -> Self {
        Self { clock_source, ..self }
    }
}

impl Default for SysTickConfig {
    fn default() -> Self {
        Self::new()
    }
}

static CONFIG_TABLE: [SysTickConfig; SysTickId::COUNT] = [
    // SysTick1
    SysTickConfig::new(),
];

/// Returns the table entry for `id`.
pub fn config_get(id: SysTickId) -> &'static SysTickConfig {
    &CONFIG_TABLE[id.index()]
}

/// Returns the configuration of the first (and usually only) tick source.
pub fn get_default_config() -> SysTickConfig {
    *config_get(SysTickId::SysTick1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_contents() {
        let config = get_default_config();
        assert!(config.enabled);
        assert_eq!(config.frequency_khz, 1);
        assert!(config.interrupt_enabled);
        assert_eq!(config.clock_source, ClockSource::Internal);
    }

    #[test]
    fn test_default_config_is_stable() {
        assert_eq!(get_default_config(), get_default_config());
        assert_eq!(get_default_config(), *config_get(SysTickId::SysTick1));
    }

    #[test]
    fn test_variants_leave_table_alone() {
        let custom = get_default_config()
            .with_frequency_khz(5)
            .with_interrupt(false)
            .with_clock_source(ClockSource::External);
        assert_eq!(custom.frequency_khz, 5);
        assert!(!custom.interrupt_enabled);
        assert_eq!(custom.clock_source, ClockSource::External);

        assert_eq!(get_default_config(), SysTickConfig::new());
    }

    #[test]
    fn test_disabled() {
        let config = SysTickConfig::disabled();
        assert!(!config.enabled);
        assert_eq!(config.frequency_khz, 1);
    }
}
