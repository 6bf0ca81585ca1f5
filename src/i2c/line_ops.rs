// Licensed under the Apache-2.0 license

//! Electrical-mode selection for the two bus lines.
//!
//! A line is released (driven "high") in one of two ways:
//!
//! - **Direction switching**: low means "output, drive 0", high means "input"
//!   and the external pull-up provides the level.
//! - **Output value**: the line stays an output and its value is written.
//!   Only correct for open-drain lines, where writing 1 disables the driver,
//!   and for output-only clock lines, which break the protocol's stretching
//!   rules but usually work in practice.
//!
//! [`LineOps::select`] picks one strategy per line from a [`GpioI2cConfig`]
//! at setup. The result is plain data: nothing on the transfer path inspects
//! the configuration again.

use crate::gpio::{Direction, FlexLine};
use crate::i2c::common::GpioI2cConfig;
use crate::i2c::error::Error;

/// How SDA is driven.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataSet {
    /// Switch direction; high is input.
    Direction,
    /// Write the output value of an open-drain line.
    Value,
    /// Write the output value, first returning the line to output mode if a
    /// previous sample left it as input.
    ValueEnforceDirection,
}

/// How SDA is sampled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataGet {
    Value,
    /// Force input mode before sampling. Some open-drain controllers leave
    /// the line in an indeterminate direction after it has been driven.
    EnforceDirection,
}

/// How SCL is driven.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockSet {
    Direction,
    Value,
}

/// How SCL is sampled. Absent (`None` in [`LineOps`]) for output-only clocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockGet {
    Value,
}

/// Bound line strategies of one adapter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineOps {
    pub set_sda: DataSet,
    pub get_sda: DataGet,
    pub set_scl: ClockSet,
    pub get_scl: Option<ClockGet>,
}

impl LineOps {
    #[must_use]
    pub fn select(config: &GpioI2cConfig) -> Self {
        // Direction enforcement is applied to SDA only; SCL direction is
        // assumed settled by its set strategy. Whether some controllers also
        // need it on the clock line is unverified.
        let (set_sda, get_sda) = match (config.data_open_drain, config.data_enforce_direction) {
            (true, true) => (DataSet::ValueEnforceDirection, DataGet::EnforceDirection),
            (true, false) => (DataSet::Value, DataGet::Value),
            (false, true) => (DataSet::Direction, DataGet::EnforceDirection),
            (false, false) => (DataSet::Direction, DataGet::Value),
        };

        let set_scl = if config.clock_open_drain || config.clock_output_only {
            ClockSet::Value
        } else {
            ClockSet::Direction
        };
        let get_scl = (!config.clock_output_only).then_some(ClockGet::Value);

        Self {
            set_sda,
            get_sda,
            set_scl,
            get_scl,
        }
    }
}

impl DataSet {
    pub fn apply<L: FlexLine>(self, line: &mut L, high: bool) -> Result<(), L::Error> {
        match self {
            DataSet::Direction => drive_by_direction(line, high),
            DataSet::Value => line.set_value(high),
            DataSet::ValueEnforceDirection => {
                if line.direction()? == Direction::Input {
                    line.set_direction_output(high)
                } else {
                    line.set_value(high)
                }
            }
        }
    }
}

impl DataGet {
    pub fn apply<L: FlexLine>(self, line: &mut L) -> Result<bool, L::Error> {
        match self {
            DataGet::Value => line.get_value(),
            DataGet::EnforceDirection => {
                if line.direction()? == Direction::Output {
                    line.set_direction_input()?;
                }
                line.get_value()
            }
        }
    }
}

impl ClockSet {
    pub fn apply<L: FlexLine>(self, line: &mut L, high: bool) -> Result<(), L::Error> {
        match self {
            ClockSet::Direction => drive_by_direction(line, high),
            ClockSet::Value => line.set_value(high),
        }
    }
}

impl ClockGet {
    pub fn apply<L: FlexLine>(self, line: &mut L) -> Result<bool, L::Error> {
        match self {
            ClockGet::Value => line.get_value(),
        }
    }
}

fn drive_by_direction<L: FlexLine>(line: &mut L, high: bool) -> Result<(), L::Error> {
    if high {
        line.set_direction_input()
    } else {
        line.set_direction_output(false)
    }
}

/// Put a freshly acquired line into its released starting state.
///
/// Value-driven lines become outputs driving high and stay outputs; this is
/// a real transition on the wire. Direction-switched lines become inputs.
pub(crate) fn release_line<L: FlexLine>(line: &mut L, value_driven: bool) -> Result<(), L::Error> {
    if value_driven {
        line.set_direction_output(true)
    } else {
        line.set_direction_input()
    }
}

/// The two owned bus lines together with their bound strategies.
pub struct BitLines<L: FlexLine> {
    sda: L,
    scl: L,
    ops: LineOps,
}

impl<L: FlexLine> BitLines<L> {
    pub(crate) fn new(sda: L, scl: L, ops: LineOps) -> Self {
        Self { sda, scl, ops }
    }

    #[must_use]
    pub fn ops(&self) -> &LineOps {
        &self.ops
    }

    /// Whether SCL can be sampled for clock stretching.
    #[must_use]
    pub fn can_read_scl(&self) -> bool {
        self.ops.get_scl.is_some()
    }

    pub fn set_sda(&mut self, high: bool) -> Result<(), Error> {
        self.ops
            .set_sda
            .apply(&mut self.sda, high)
            .map_err(Error::gpio)
    }

    pub fn get_sda(&mut self) -> Result<bool, Error> {
        self.ops.get_sda.apply(&mut self.sda).map_err(Error::gpio)
    }

    pub fn set_scl(&mut self, high: bool) -> Result<(), Error> {
        self.ops
            .set_scl
            .apply(&mut self.scl, high)
            .map_err(Error::gpio)
    }

    /// Sample SCL, or `None` when the clock is output-only.
    pub fn get_scl(&mut self) -> Option<Result<bool, Error>> {
        let get = self.ops.get_scl?;
        Some(get.apply(&mut self.scl).map_err(Error::gpio))
    }

    pub fn sda_id(&self) -> crate::gpio::LineId {
        self.sda.id()
    }

    pub fn scl_id(&self) -> crate::gpio::LineId {
        self.scl.id()
    }

    /// Give the lines back, SDA first.
    pub(crate) fn into_lines(self) -> (L, L) {
        (self.sda, self.scl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::common::GpioI2cConfigBuilder;
    use crate::i2c::sim::{LineEvent, SimChip};
    use crate::gpio::LineProvider;

    fn config(open_drain: bool, enforce: bool, clk_od: bool, clk_oo: bool) -> GpioI2cConfig {
        GpioI2cConfigBuilder::new(0, 1)
            .data_open_drain(open_drain)
            .data_enforce_direction(enforce)
            .clock_open_drain(clk_od)
            .clock_output_only(clk_oo)
            .build()
    }

    #[test]
    fn test_select_direction_mode() {
        let ops = LineOps::select(&config(false, false, false, false));

        assert_eq!(ops.set_sda, DataSet::Direction);
        assert_eq!(ops.get_sda, DataGet::Value);
        assert_eq!(ops.set_scl, ClockSet::Direction);
        assert_eq!(ops.get_scl, Some(ClockGet::Value));
    }

    #[test]
    fn test_select_open_drain() {
        let ops = LineOps::select(&config(true, false, true, false));

        assert_eq!(ops.set_sda, DataSet::Value);
        assert_eq!(ops.get_sda, DataGet::Value);
        assert_eq!(ops.set_scl, ClockSet::Value);
        assert_eq!(ops.get_scl, Some(ClockGet::Value));
    }

    #[test]
    fn test_select_enforce_direction() {
        let ops = LineOps::select(&config(true, true, false, false));

        assert_eq!(ops.set_sda, DataSet::ValueEnforceDirection);
        assert_eq!(ops.get_sda, DataGet::EnforceDirection);
        // Enforcement never reaches the clock line.
        assert_eq!(ops.set_scl, ClockSet::Direction);
    }

    #[test]
    fn test_select_enforce_direction_without_open_drain() {
        let ops = LineOps::select(&config(false, true, false, false));

        assert_eq!(ops.set_sda, DataSet::Direction);
        assert_eq!(ops.get_sda, DataGet::EnforceDirection);
    }

    #[test]
    fn test_enforced_read_releases_driven_low_line() {
        let chip = SimChip::new();
        let mut line = chip.clone().request(4, "test").unwrap();
        DataSet::Direction.apply(&mut line, false).unwrap();

        assert!(DataGet::EnforceDirection.apply(&mut line).unwrap());
        assert_eq!(chip.direction(4), Some(Direction::Input));
    }

    #[test]
    fn test_output_only_clock_has_no_reader() {
        for clk_od in [false, true] {
            let ops = LineOps::select(&config(false, false, clk_od, true));
            assert_eq!(ops.set_scl, ClockSet::Value);
            assert_eq!(ops.get_scl, None);
        }
    }

    #[test]
    fn test_direction_strategy_drives_low_releases_high() {
        let chip = SimChip::new();
        let mut line = chip.clone().request(4, "test").unwrap();
        chip.clear_events();

        DataSet::Direction.apply(&mut line, false).unwrap();
        DataSet::Direction.apply(&mut line, true).unwrap();

        assert_eq!(
            chip.events(),
            vec![LineEvent::Output(4, false), LineEvent::Input(4)]
        );
    }

    #[test]
    fn test_value_strategy_never_switches_to_input() {
        let chip = SimChip::new();
        let mut line = chip.clone().request(4, "test").unwrap();
        release_line(&mut line, true).unwrap();
        chip.clear_events();

        for high in [false, true, false, true] {
            DataSet::Value.apply(&mut line, high).unwrap();
        }

        assert!(chip
            .events()
            .iter()
            .all(|event| matches!(event, LineEvent::Value(4, _))));
        assert_eq!(chip.direction(4), Some(Direction::Output));
    }

    #[test]
    fn test_enforced_read_then_write_restores_output() {
        let chip = SimChip::new();
        let mut line = chip.clone().request(4, "test").unwrap();
        release_line(&mut line, true).unwrap();

        assert!(DataGet::EnforceDirection.apply(&mut line).unwrap());
        assert_eq!(chip.direction(4), Some(Direction::Input));

        DataSet::ValueEnforceDirection.apply(&mut line, false).unwrap();
        assert_eq!(chip.direction(4), Some(Direction::Output));
        assert!(!chip.level(4));
    }
}
