// Licensed under the Apache-2.0 license

//! Electrical configuration of a GPIO I2C bus and its timing defaults.

use crate::gpio::LineId;
use crate::i2c::error::Error;
use fugit::{MicrosDurationU32, MillisDurationU32};

/// Half clock period used when the clock line can be read back (≈100 kHz).
pub const DEFAULT_BIT_DELAY_US: u32 = 5;
/// Half clock period used for output-only clock lines (≈10 kHz).
///
/// Such a line cannot be stretched, so the master runs slow enough for
/// targets to keep up.
pub const OUTPUT_ONLY_BIT_DELAY_US: u32 = 50;
/// Longest wait for a stretched clock line to be released.
pub const DEFAULT_STRETCH_TIMEOUT_MS: u32 = 100;

/// Which of the two bus lines an item refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusLine {
    Sda,
    Scl,
}

impl core::fmt::Display for BusLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Sda => f.write_str("SDA"),
            Self::Scl => f.write_str("SCL"),
        }
    }
}

/// Electrical configuration of one GPIO I2C bus. Immutable once built.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpioI2cConfig {
    pub sda: LineId,
    pub scl: LineId,
    /// SDA is open-drain: driving high only disables the output stage.
    pub data_open_drain: bool,
    /// Force SDA to input before every sample.
    pub data_enforce_direction: bool,
    pub clock_open_drain: bool,
    /// SCL can only be driven; it cannot be read or stretched.
    pub clock_output_only: bool,
    /// Half clock period. `None` picks a default from the clock mode.
    pub bit_delay: Option<MicrosDurationU32>,
    /// Clock stretch timeout. `None` picks [`DEFAULT_STRETCH_TIMEOUT_MS`].
    pub stretch_timeout: Option<MillisDurationU32>,
}

/// Timing the bit engine runs with, defaults resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitTiming {
    pub bit_delay: MicrosDurationU32,
    pub stretch_timeout: MillisDurationU32,
}

impl BitTiming {
    /// Half clock period in microseconds.
    #[must_use]
    pub fn bit_delay_us(&self) -> u32 {
        self.bit_delay.ticks()
    }

    /// Stretch timeout in microseconds, saturating.
    #[must_use]
    pub fn stretch_timeout_us(&self) -> u32 {
        self.stretch_timeout.ticks().saturating_mul(1_000)
    }
}

impl GpioI2cConfig {
    /// Reject flag combinations that cannot describe real wiring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when both roles name the same
    /// line or when a timing value is explicitly zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sda == self.scl {
            return Err(Error::InvalidConfiguration(
                "SDA and SCL must be distinct lines",
            ));
        }
        if self.bit_delay.is_some_and(|d| d.ticks() == 0) {
            return Err(Error::InvalidConfiguration("bit delay must be non-zero"));
        }
        if self.stretch_timeout.is_some_and(|t| t.ticks() == 0) {
            return Err(Error::InvalidConfiguration(
                "stretch timeout must be non-zero",
            ));
        }
        Ok(())
    }

    /// Resolve timing, filling in defaults for unset values.
    #[must_use]
    pub fn timing(&self) -> BitTiming {
        let bit_delay = self.bit_delay.unwrap_or_else(|| {
            if self.clock_output_only {
                MicrosDurationU32::micros(OUTPUT_ONLY_BIT_DELAY_US)
            } else {
                MicrosDurationU32::micros(DEFAULT_BIT_DELAY_US)
            }
        });
        let stretch_timeout = self
            .stretch_timeout
            .unwrap_or(MillisDurationU32::millis(DEFAULT_STRETCH_TIMEOUT_MS));
        BitTiming {
            bit_delay,
            stretch_timeout,
        }
    }

    /// Whether the clock line can be sampled, and so stretched by targets.
    #[must_use]
    pub fn can_stretch(&self) -> bool {
        !self.clock_output_only
    }
}

pub struct GpioI2cConfigBuilder {
    sda: LineId,
    scl: LineId,
    data_open_drain: bool,
    data_enforce_direction: bool,
    clock_open_drain: bool,
    clock_output_only: bool,
    bit_delay: Option<MicrosDurationU32>,
    stretch_timeout: Option<MillisDurationU32>,
}

impl GpioI2cConfigBuilder {
    /// Start from plain direction-switched lines and default timing.
    #[must_use]
    pub fn new(sda: LineId, scl: LineId) -> Self {
        Self {
            sda,
            scl,
            data_open_drain: false,
            data_enforce_direction: false,
            clock_open_drain: false,
            clock_output_only: false,
            bit_delay: None,
            stretch_timeout: None,
        }
    }
    #[must_use]
    pub fn data_open_drain(mut self, enabled: bool) -> Self {
        self.data_open_drain = enabled;
        self
    }
    #[must_use]
    pub fn data_enforce_direction(mut self, enabled: bool) -> Self {
        self.data_enforce_direction = enabled;
        self
    }
    #[must_use]
    pub fn clock_open_drain(mut self, enabled: bool) -> Self {
        self.clock_open_drain = enabled;
        self
    }
    #[must_use]
    pub fn clock_output_only(mut self, enabled: bool) -> Self {
        self.clock_output_only = enabled;
        self
    }
    #[must_use]
    pub fn bit_delay(mut self, delay: MicrosDurationU32) -> Self {
        self.bit_delay = Some(delay);
        self
    }
    #[must_use]
    pub fn stretch_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.stretch_timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn build(self) -> GpioI2cConfig {
        GpioI2cConfig {
            sda: self.sda,
            scl: self.scl,
            data_open_drain: self.data_open_drain,
            data_enforce_direction: self.data_enforce_direction,
            clock_open_drain: self.clock_open_drain,
            clock_output_only: self.clock_output_only,
            bit_delay: self.bit_delay,
            stretch_timeout: self.stretch_timeout,
        }
    }
}
