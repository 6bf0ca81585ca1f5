// Licensed under the Apache-2.0 license

//! Board bring-up against simulated lines: discover a node, probe it, talk
//! to a target, recover, and tear down.

use embedded_hal::i2c::{ErrorKind, I2c, NoAcknowledgeSource};
use i2c_gpio::common::LogLogger;
use i2c_gpio::i2c::discovery::{PROP_SCL_OPEN_DRAIN, PROP_SDA_OPEN_DRAIN, PROP_TIMEOUT};
use i2c_gpio::i2c::sim::{SimChip, SimDelay, SimLine, SimTarget};
use i2c_gpio::i2c::{
    probe_node, AdapterSlot, AdapterState, BusRegistry, Error, I2cHardwareCore, StaticNode,
};

const SDA: u32 = 20;
const SCL: u32 = 21;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn board_node() -> StaticNode<'static> {
    StaticNode {
        full_name: "/soc/i2c-gpio@0",
        compatible: "virtual,i2c-gpio",
        handle: 2,
        lines: &[SDA, SCL],
        properties: &[(PROP_SDA_OPEN_DRAIN, 1), (PROP_SCL_OPEN_DRAIN, 1), (PROP_TIMEOUT, 5)],
    }
}

#[test]
fn eeprom_write_then_read_back() {
    init_logging();
    let mut chip = SimChip::new();
    chip.wire_bus(SDA, SCL);
    chip.attach_target(SimTarget::new(0x50));
    let mut registry = BusRegistry::<4>::new();
    let mut slot = AdapterSlot::<SimLine, SimDelay, _>::new(LogLogger::default());

    probe_node(&mut slot, &board_node(), &mut chip, SimDelay::new(), &mut registry).unwrap();
    assert_eq!(slot.state(), AdapterState::Registered);

    let mut i2c = slot.controller().unwrap();
    i2c.write(0x50, &[0x40, 0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    let mut readback = [0u8; 4];
    i2c.write_read(0x50, &[0x40], &mut readback).unwrap();
    assert_eq!(readback, [0xDE, 0xAD, 0xBE, 0xEF]);

    let err = i2c.read(0x51, &mut readback).unwrap_err();
    assert_eq!(err, Error::NoAcknowledge(NoAcknowledgeSource::Address));
    assert_eq!(
        embedded_hal::i2c::Error::kind(&err),
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    );

    slot.remove(&mut registry).unwrap();
    assert_eq!(slot.state(), AdapterState::Destroyed);
    assert_eq!(chip.requested_count(), 0);
    assert!(registry.is_empty());
}

#[test]
fn stuck_clock_does_not_tear_down_adapter() {
    init_logging();
    let mut chip = SimChip::new();
    chip.wire_bus(SDA, SCL);
    chip.attach_target(SimTarget::new(0x50));
    let mut registry = BusRegistry::<4>::new();
    let mut slot = AdapterSlot::<SimLine, SimDelay, _>::new(LogLogger::default());
    let delay = SimDelay::new();
    probe_node(&mut slot, &board_node(), &mut chip, delay.clone(), &mut registry).unwrap();

    chip.hold_clock_low(true);
    let before = delay.elapsed_us();
    let result = slot.controller().unwrap().write(0x50, &[0x00]);
    let waited = delay.elapsed_us() - before;
    assert_eq!(result, Err(Error::StretchTimeout));
    assert!((5_000..6_000).contains(&waited), "waited {waited} us");

    chip.hold_clock_low(false);
    assert_eq!(slot.state(), AdapterState::Registered);
    let bus = slot.bus().unwrap();
    assert!(bus.can_stretch());
    bus.recover_bus().unwrap();
    slot.controller().unwrap().write(0x50, &[0x00, 0x5A]).unwrap();
    assert_eq!(chip.target().unwrap().memory()[0], 0x5A);

    slot.remove(&mut registry).unwrap();
    assert_eq!(chip.requested_count(), 0);
}

#[test]
fn two_buses_share_a_registry() {
    init_logging();
    let mut chip = SimChip::new();
    let mut registry = BusRegistry::<4>::new();
    let mut first = AdapterSlot::<SimLine, SimDelay, _>::new(LogLogger::default());
    let mut second = AdapterSlot::<SimLine, SimDelay, _>::new(LogLogger::default());
    let other = StaticNode {
        full_name: "/soc/i2c-gpio@1",
        handle: 3,
        lines: &[30, 31],
        properties: &[],
        ..board_node()
    };

    probe_node(&mut first, &board_node(), &mut chip, SimDelay::new(), &mut registry).unwrap();
    probe_node(&mut second, &other, &mut chip, SimDelay::new(), &mut registry).unwrap();
    assert_eq!(registry.len(), 2);

    // A second probe of the same node collides on its lines first.
    let mut clash = AdapterSlot::<SimLine, SimDelay, _>::new(LogLogger::default());
    assert!(matches!(
        probe_node(&mut clash, &board_node(), &mut chip, SimDelay::new(), &mut registry),
        Err(Error::PinUnavailable { .. })
    ));
    assert_eq!(chip.requested_count(), 4);

    first.remove(&mut registry).unwrap();
    second.remove(&mut registry).unwrap();
    clash.remove(&mut registry).unwrap();
    assert!(registry.is_empty());
    assert_eq!(chip.requested_count(), 0);
}
