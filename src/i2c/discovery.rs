// Licensed under the Apache-2.0 license

//! Bus description lookup from a hardware-description node.
//!
//! A node describes one bus: two line references (index 0 is SDA, index 1
//! is SCL), optional u32 properties, and a handle number that becomes the
//! adapter id.
//!
//! | property             | meaning                                   |
//! |----------------------|-------------------------------------------|
//! | `sda-is-open-drain`  | non-zero: SDA is open-drain               |
//! | `sda-enforce-dir`    | non-zero: force SDA direction around I/O  |
//! | `scl-is-open-drain`  | non-zero: SCL is open-drain               |
//! | `scl-is-output-only` | non-zero: SCL cannot be read back         |
//! | `udelay`             | half clock period in microseconds         |
//! | `timeout`            | clock stretch timeout in milliseconds     |
//!
//! A missing or zero `udelay`/`timeout` leaves the default in place.

use embedded_hal::delay::DelayNs;
use fugit::{MicrosDurationU32, MillisDurationU32};

use crate::common::Logger;
use crate::gpio::{FlexLine, LineId, LineProvider, RequestError};
use crate::i2c::common::{BusLine, GpioI2cConfig, GpioI2cConfigBuilder};
use crate::i2c::error::Error;
use crate::i2c::gpio_adapter::AdapterSlot;
use crate::i2c::registry::AdapterRegistry;

/// Compatible strings handled by this driver.
pub const COMPATIBLE: [&str; 2] = ["virtual,i2c-gpio", "i2c-gpio"];

pub const PROP_SDA_OPEN_DRAIN: &str = "sda-is-open-drain";
pub const PROP_SDA_ENFORCE_DIR: &str = "sda-enforce-dir";
pub const PROP_SCL_OPEN_DRAIN: &str = "scl-is-open-drain";
pub const PROP_SCL_OUTPUT_ONLY: &str = "scl-is-output-only";
pub const PROP_UDELAY: &str = "udelay";
pub const PROP_TIMEOUT: &str = "timeout";

/// Read access to one description node.
pub trait PropertySource {
    fn is_compatible(&self, compatible: &str) -> bool;

    /// Value of a u32 property, `None` when absent.
    fn property_u32(&self, name: &str) -> Option<u32>;

    /// Line referenced at `index` in the node's line list.
    fn line(&self, index: usize) -> Option<LineId>;

    /// Handle number of the node.
    fn handle(&self) -> i32;

    /// Path-like name for diagnostics.
    fn full_name(&self) -> &str;
}

/// Whether this driver handles `node`.
pub fn matches<N: PropertySource + ?Sized>(node: &N) -> bool {
    COMPATIBLE.iter().any(|compatible| node.is_compatible(compatible))
}

/// Everything needed to probe one bus, produced from a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    pub config: GpioI2cConfig,
    pub id: i32,
}

/// Build a [`Discovery`] from `node`.
///
/// # Errors
///
/// - [`Error::InvalidConfiguration`] when the node is not compatible or its
///   flags contradict each other
/// - [`Error::PinUnavailable`] with [`RequestError::NotFound`] when a line
///   reference is missing
pub fn discover<N: PropertySource + ?Sized>(node: &N) -> Result<Discovery, Error> {
    if !matches(node) {
        return Err(Error::InvalidConfiguration("node is not an i2c-gpio bus"));
    }

    let sda = node.line(0).ok_or(Error::PinUnavailable {
        line: BusLine::Sda,
        reason: RequestError::NotFound,
    })?;
    let scl = node.line(1).ok_or(Error::PinUnavailable {
        line: BusLine::Scl,
        reason: RequestError::NotFound,
    })?;

    let flag = |name: &str| node.property_u32(name).is_some_and(|value| value != 0);
    let mut builder = GpioI2cConfigBuilder::new(sda, scl)
        .data_open_drain(flag(PROP_SDA_OPEN_DRAIN))
        .data_enforce_direction(flag(PROP_SDA_ENFORCE_DIR))
        .clock_open_drain(flag(PROP_SCL_OPEN_DRAIN))
        .clock_output_only(flag(PROP_SCL_OUTPUT_ONLY));
    if let Some(us) = node.property_u32(PROP_UDELAY).filter(|&us| us != 0) {
        builder = builder.bit_delay(MicrosDurationU32::micros(us));
    }
    if let Some(ms) = node.property_u32(PROP_TIMEOUT).filter(|&ms| ms != 0) {
        builder = builder.stretch_timeout(MillisDurationU32::millis(ms));
    }

    let config = builder.build();
    config.validate()?;
    Ok(Discovery {
        config,
        id: node.handle(),
    })
}

/// Discover `node` and probe `slot` with the result.
///
/// # Errors
///
/// Any error of [`discover`] or [`AdapterSlot::probe`].
pub fn probe_node<N, P, R, L, D, G>(
    slot: &mut AdapterSlot<L, D, G>,
    node: &N,
    provider: &mut P,
    delay: D,
    registry: &mut R,
) -> Result<Discovery, Error>
where
    N: PropertySource + ?Sized,
    P: LineProvider<Line = L> + ?Sized,
    R: AdapterRegistry + ?Sized,
    L: FlexLine,
    D: DelayNs,
    G: Logger,
{
    let discovery = discover(node).inspect_err(|err| {
        slot.logger()
            .error(format_args!("{}: {err}", node.full_name()));
    })?;
    slot.probe(&discovery.config, discovery.id, provider, delay, registry)?;
    Ok(discovery)
}

/// Node from a static board table.
#[derive(Copy, Clone, Debug)]
pub struct StaticNode<'a> {
    pub full_name: &'a str,
    pub compatible: &'a str,
    pub handle: i32,
    pub lines: &'a [LineId],
    pub properties: &'a [(&'a str, u32)],
}

impl PropertySource for StaticNode<'_> {
    fn is_compatible(&self, compatible: &str) -> bool {
        self.compatible == compatible
    }

    fn property_u32(&self, name: &str) -> Option<u32> {
        self.properties
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, value)| value)
    }

    fn line(&self, index: usize) -> Option<LineId> {
        self.lines.get(index).copied()
    }

    fn handle(&self) -> i32 {
        self.handle
    }

    fn full_name(&self) -> &str {
        self.full_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoOpLogger;
    use crate::i2c::common::{DEFAULT_STRETCH_TIMEOUT_MS, OUTPUT_ONLY_BIT_DELAY_US};
    use crate::i2c::gpio_adapter::AdapterState;
    use crate::i2c::registry::BusRegistry;
    use crate::i2c::sim::{SimChip, SimDelay, SimLine};

    fn node<'a>(properties: &'a [(&'a str, u32)], lines: &'a [LineId]) -> StaticNode<'a> {
        StaticNode {
            full_name: "/i2c-video",
            compatible: "virtual,i2c-gpio",
            handle: 5,
            lines,
            properties,
        }
    }

    #[test]
    fn test_matches_both_compatibles() {
        let mut n = node(&[], &[0, 1]);
        assert!(matches(&n));
        n.compatible = "i2c-gpio";
        assert!(matches(&n));
        n.compatible = "gpio-leds";
        assert!(!matches(&n));
        assert!(matches!(
            discover(&n),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_flags_and_timing() {
        let props = [
            (PROP_SDA_OPEN_DRAIN, 1),
            (PROP_SDA_ENFORCE_DIR, 1),
            (PROP_SCL_OPEN_DRAIN, 0),
            (PROP_UDELAY, 10),
            (PROP_TIMEOUT, 250),
        ];
        let discovery = discover(&node(&props, &[12, 13])).unwrap();
        let config = discovery.config;

        assert_eq!(discovery.id, 5);
        assert_eq!((config.sda, config.scl), (12, 13));
        assert!(config.data_open_drain);
        assert!(config.data_enforce_direction);
        assert!(!config.clock_open_drain);
        assert!(!config.clock_output_only);
        assert_eq!(config.timing().bit_delay_us(), 10);
        assert_eq!(config.timing().stretch_timeout_us(), 250_000);
    }

    #[test]
    fn test_zero_timing_means_default() {
        let props = [
            (PROP_SCL_OUTPUT_ONLY, 1),
            (PROP_UDELAY, 0),
            (PROP_TIMEOUT, 0),
        ];
        let config = discover(&node(&props, &[0, 1])).unwrap().config;

        assert_eq!(config.bit_delay, None);
        assert_eq!(config.timing().bit_delay_us(), OUTPUT_ONLY_BIT_DELAY_US);
        assert_eq!(
            config.timing().stretch_timeout.ticks(),
            DEFAULT_STRETCH_TIMEOUT_MS
        );
    }

    #[test]
    fn test_enforce_dir_alone_probes() {
        let mut chip = SimChip::new();
        let mut registry = BusRegistry::<2>::new();
        let mut slot = AdapterSlot::<SimLine, SimDelay, NoOpLogger>::default();
        let props = [(PROP_SDA_ENFORCE_DIR, 1)];
        let node = node(&props, &[0, 1]);

        let discovery =
            probe_node(&mut slot, &node, &mut chip, SimDelay::new(), &mut registry).unwrap();

        assert!(discovery.config.data_enforce_direction);
        assert!(!discovery.config.data_open_drain);
        assert_eq!(slot.state(), AdapterState::Registered);
    }

    #[test]
    fn test_missing_clock_line() {
        let result = discover(&node(&[], &[3]));

        assert_eq!(
            result,
            Err(Error::PinUnavailable {
                line: BusLine::Scl,
                reason: RequestError::NotFound,
            })
        );
    }

    #[test]
    fn test_probe_node_end_to_end() {
        let mut chip = SimChip::new();
        let mut registry = BusRegistry::<2>::new();
        let mut slot = AdapterSlot::<SimLine, SimDelay, NoOpLogger>::default();
        let props = [(PROP_SDA_OPEN_DRAIN, 1), (PROP_SCL_OPEN_DRAIN, 1)];

        let node = node(&props, &[8, 9]);

        let discovery =
            probe_node(&mut slot, &node, &mut chip, SimDelay::new(), &mut registry).unwrap();

        assert_eq!(discovery.id, 5);
        assert_eq!(slot.state(), AdapterState::Registered);
        assert_eq!(
            registry.get(5).map(|info| info.name.as_str()),
            Some("i2c-gpio5")
        );
        assert_eq!(chip.requested_count(), 2);

        slot.remove(&mut registry).unwrap();
        assert_eq!(chip.requested_count(), 0);
    }

    #[test]
    fn test_probe_node_rejects_bad_node_without_touching_lines() {
        let mut chip = SimChip::new();
        let mut registry = BusRegistry::<2>::new();
        let mut slot = AdapterSlot::<SimLine, SimDelay, NoOpLogger>::default();

        let node = node(&[], &[]);

        let result = probe_node(&mut slot, &node, &mut chip, SimDelay::new(), &mut registry);

        assert!(matches!(
            result,
            Err(Error::PinUnavailable {
                line: BusLine::Sda,
                ..
            })
        ));
        assert!(chip.events().is_empty());
        assert!(registry.is_empty());
    }
}
