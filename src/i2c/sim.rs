// Licensed under the Apache-2.0 license

//! Host-side simulation of a GPIO controller wired to an I2C bus.
//!
//! [`SimChip`] hands out [`SimLine`]s, records every direction and value
//! change, and resolves bus levels the way open-drain wiring does: a line
//! reads high only when nobody pulls it low. An optional [`SimTarget`]
//! watches the resolved levels and answers like a small register-file
//! device (first written byte selects the register, later bytes auto-increment).
//! [`SimDelay`] accounts for requested delays without sleeping.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorType};

use crate::gpio::{Direction, FlexLine, LineId, LineProvider, RequestError};

/// Something a consumer did to a simulated line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Requested(LineId),
    Released(LineId),
    Input(LineId),
    Output(LineId, bool),
    Value(LineId, bool),
}

/// Error raised by lines marked faulty.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SimLineError;

impl digital::Error for SimLineError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

#[derive(Copy, Clone, Debug)]
struct LineState {
    direction: Direction,
    value: bool,
    requested: bool,
}

impl LineState {
    fn released_by_consumer(&self) -> bool {
        self.direction == Direction::Input || self.value
    }
}

#[derive(Default)]
struct ChipState {
    lines: BTreeMap<LineId, LineState>,
    missing: BTreeSet<LineId>,
    faulty: BTreeSet<LineId>,
    events: Vec<LineEvent>,
    /// (SDA, SCL) when the chip is wired to a bus.
    bus: Option<(LineId, LineId)>,
    clock_held_low: bool,
    stretch_reads: u32,
    target: Option<SimTarget>,
}

impl ChipState {
    fn line(&mut self, id: LineId) -> &mut LineState {
        self.lines.entry(id).or_insert(LineState {
            direction: Direction::Input,
            value: false,
            requested: false,
        })
    }

    fn consumer_released(&self, id: LineId) -> bool {
        self.lines
            .get(&id)
            .map_or(true, LineState::released_by_consumer)
    }

    fn level(&self, id: LineId) -> bool {
        let mut level = self.consumer_released(id);
        if let Some((sda, scl)) = self.bus {
            if id == scl && self.clock_held_low {
                level = false;
            }
            if id == sda && self.target.as_ref().is_some_and(SimTarget::drives_low) {
                level = false;
            }
        }
        level
    }

    fn settle(&mut self) {
        let Some((sda, scl)) = self.bus else {
            return;
        };
        let scl_level = self.level(scl);
        let sda_released = self.consumer_released(sda);
        if let Some(target) = self.target.as_mut() {
            target.on_bus(scl_level, sda_released);
        }
    }
}

/// Simulated GPIO controller. Clones share the same state.
#[derive(Clone, Default)]
pub struct SimChip {
    state: Rc<RefCell<ChipState>>,
}

impl SimChip {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` unknown to the controller.
    pub fn remove_line(&self, id: LineId) {
        self.state.borrow_mut().missing.insert(id);
    }

    /// Make every operation on `id` fail.
    pub fn set_faulty(&self, id: LineId) {
        self.state.borrow_mut().faulty.insert(id);
    }

    /// Treat `sda` and `scl` as a pulled-up I2C bus.
    pub fn wire_bus(&self, sda: LineId, scl: LineId) {
        let mut state = self.state.borrow_mut();
        state.bus = Some((sda, scl));
        state.settle();
    }

    pub fn attach_target(&self, target: SimTarget) {
        let mut state = self.state.borrow_mut();
        state.target = Some(target);
        state.settle();
    }

    /// Snapshot of the attached target.
    #[must_use]
    pub fn target(&self) -> Option<SimTarget> {
        self.state.borrow().target.clone()
    }

    /// Hold SCL low from the target side until released again.
    pub fn hold_clock_low(&self, held: bool) {
        let mut state = self.state.borrow_mut();
        state.clock_held_low = held;
        state.settle();
    }

    /// Report SCL low for the next `reads` samples, as a briefly
    /// stretching target would.
    pub fn stretch_clock(&self, reads: u32) {
        self.state.borrow_mut().stretch_reads = reads;
    }

    #[must_use]
    pub fn events(&self) -> Vec<LineEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    #[must_use]
    pub fn is_requested(&self, id: LineId) -> bool {
        self.state
            .borrow()
            .lines
            .get(&id)
            .is_some_and(|line| line.requested)
    }

    /// Number of lines currently held by consumers.
    #[must_use]
    pub fn requested_count(&self) -> usize {
        self.state
            .borrow()
            .lines
            .values()
            .filter(|line| line.requested)
            .count()
    }

    #[must_use]
    pub fn direction(&self, id: LineId) -> Option<Direction> {
        self.state.borrow().lines.get(&id).map(|line| line.direction)
    }

    /// Resolved level of `id`, including target-side pulls.
    #[must_use]
    pub fn level(&self, id: LineId) -> bool {
        self.state.borrow().level(id)
    }
}

impl LineProvider for SimChip {
    type Line = SimLine;

    fn request(&mut self, id: LineId, _consumer: &str) -> Result<SimLine, RequestError> {
        let mut state = self.state.borrow_mut();
        if state.missing.contains(&id) {
            return Err(RequestError::NotFound);
        }
        let line = state.line(id);
        if line.requested {
            return Err(RequestError::Busy);
        }
        line.requested = true;
        state.events.push(LineEvent::Requested(id));
        Ok(SimLine {
            id,
            chip: Rc::clone(&self.state),
        })
    }
}

/// Line handle from a [`SimChip`]. Dropping it releases the line.
pub struct SimLine {
    id: LineId,
    chip: Rc<RefCell<ChipState>>,
}

impl SimLine {
    fn update(
        &mut self,
        event: LineEvent,
        apply: impl FnOnce(&mut LineState),
    ) -> Result<(), SimLineError> {
        let mut state = self.chip.borrow_mut();
        if state.faulty.contains(&self.id) {
            return Err(SimLineError);
        }
        apply(state.line(self.id));
        state.events.push(event);
        state.settle();
        Ok(())
    }
}

impl ErrorType for SimLine {
    type Error = SimLineError;
}

impl FlexLine for SimLine {
    fn id(&self) -> LineId {
        self.id
    }

    fn direction(&mut self) -> Result<Direction, Self::Error> {
        let mut state = self.chip.borrow_mut();
        if state.faulty.contains(&self.id) {
            return Err(SimLineError);
        }
        Ok(state.line(self.id).direction)
    }

    fn set_direction_input(&mut self) -> Result<(), Self::Error> {
        self.update(LineEvent::Input(self.id), |line| {
            line.direction = Direction::Input;
        })
    }

    fn set_direction_output(&mut self, high: bool) -> Result<(), Self::Error> {
        self.update(LineEvent::Output(self.id, high), |line| {
            line.direction = Direction::Output;
            line.value = high;
        })
    }

    fn set_value(&mut self, high: bool) -> Result<(), Self::Error> {
        self.update(LineEvent::Value(self.id, high), |line| {
            line.value = high;
        })
    }

    fn get_value(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.chip.borrow_mut();
        if state.faulty.contains(&self.id) {
            return Err(SimLineError);
        }
        let is_scl = state.bus.is_some_and(|(_, scl)| scl == self.id);
        if is_scl && state.stretch_reads > 0 {
            state.stretch_reads -= 1;
            return Ok(false);
        }
        Ok(state.level(self.id))
    }
}

impl Drop for SimLine {
    fn drop(&mut self) {
        let mut state = self.chip.borrow_mut();
        state.line(self.id).requested = false;
        state.events.push(LineEvent::Released(self.id));
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Address,
    Receive,
    AckOut,
    Transmit,
    AckIn,
}

/// Simulated 7-bit target with a 256-byte register file.
#[derive(Clone, Debug)]
pub struct SimTarget {
    address: u8,
    memory: [u8; 256],
    pointer: u8,
    pointer_set: bool,
    reading: bool,
    master_acked: bool,
    phase: Phase,
    shift: u8,
    bits: u8,
    sda_low: bool,
    prev_scl: bool,
    prev_sda: bool,
}

impl SimTarget {
    #[must_use]
    pub fn new(address: u8) -> Self {
        Self {
            address,
            memory: [0; 256],
            pointer: 0,
            pointer_set: false,
            reading: false,
            master_acked: false,
            phase: Phase::Idle,
            shift: 0,
            bits: 0,
            sda_low: false,
            prev_scl: true,
            prev_sda: true,
        }
    }

    /// Preload registers starting at 0.
    #[must_use]
    pub fn with_memory(mut self, data: &[u8]) -> Self {
        for (slot, byte) in self.memory.iter_mut().zip(data) {
            *slot = *byte;
        }
        self
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[must_use]
    pub fn memory(&self) -> &[u8; 256] {
        &self.memory
    }

    fn drives_low(&self) -> bool {
        self.sda_low
    }

    fn on_bus(&mut self, scl: bool, sda_released: bool) {
        let sda = sda_released && !self.sda_low;
        if self.prev_scl && scl && self.prev_sda != sda {
            if sda {
                self.phase = Phase::Idle;
            } else {
                self.phase = Phase::Address;
                self.shift = 0;
                self.bits = 0;
            }
            self.sda_low = false;
        } else if !self.prev_scl && scl {
            self.rising(sda);
        } else if self.prev_scl && !scl {
            self.falling();
        }
        self.prev_scl = scl;
        self.prev_sda = sda_released && !self.sda_low;
    }

    fn rising(&mut self, sda: bool) {
        match self.phase {
            Phase::Address | Phase::Receive => {
                self.shift = (self.shift << 1) | u8::from(sda);
                self.bits += 1;
            }
            Phase::AckIn => self.master_acked = !sda,
            _ => {}
        }
    }

    fn falling(&mut self) {
        match self.phase {
            Phase::Address if self.bits == 8 => {
                if self.shift >> 1 == self.address {
                    self.reading = self.shift & 1 == 1;
                    self.pointer_set = false;
                    self.sda_low = true;
                    self.phase = Phase::AckOut;
                } else {
                    self.phase = Phase::Idle;
                }
            }
            Phase::Receive if self.bits == 8 => {
                if self.pointer_set {
                    if let Some(slot) = self.memory.get_mut(usize::from(self.pointer)) {
                        *slot = self.shift;
                    }
                    self.pointer = self.pointer.wrapping_add(1);
                } else {
                    self.pointer = self.shift;
                    self.pointer_set = true;
                }
                self.sda_low = true;
                self.phase = Phase::AckOut;
            }
            Phase::AckOut => {
                self.sda_low = false;
                if self.reading {
                    self.load_byte();
                } else {
                    self.phase = Phase::Receive;
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            Phase::Transmit => {
                if self.bits == 8 {
                    self.sda_low = false;
                    self.phase = Phase::AckIn;
                } else {
                    self.sda_low = self.shift & (0x80 >> self.bits) == 0;
                    self.bits += 1;
                }
            }
            Phase::AckIn => {
                if self.master_acked {
                    self.load_byte();
                } else {
                    self.sda_low = false;
                    self.phase = Phase::Idle;
                }
            }
            _ => {}
        }
    }

    fn load_byte(&mut self) {
        self.shift = self
            .memory
            .get(usize::from(self.pointer))
            .copied()
            .unwrap_or(0);
        self.pointer = self.pointer.wrapping_add(1);
        self.sda_low = self.shift & 0x80 == 0;
        self.bits = 1;
        self.phase = Phase::Transmit;
    }
}

/// Delay source that only counts. Clones share the counter.
#[derive(Clone, Default)]
pub struct SimDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl SimDelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns.get() / 1_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_busy_and_release() {
        let mut chip = SimChip::new();
        let line = chip.request(2, "a").unwrap();

        assert_eq!(chip.request(2, "b").err(), Some(RequestError::Busy));
        assert!(chip.is_requested(2));

        drop(line);
        assert!(!chip.is_requested(2));
        assert!(chip.request(2, "b").is_ok());
    }

    #[test]
    fn test_missing_line() {
        let mut chip = SimChip::new();
        chip.remove_line(9);
        assert_eq!(chip.request(9, "a").err(), Some(RequestError::NotFound));
    }

    #[test]
    fn test_wired_and_resolution() {
        let mut chip = SimChip::new();
        chip.wire_bus(0, 1);
        let mut scl = chip.request(1, "scl").unwrap();

        scl.set_direction_output(true).unwrap();
        assert!(scl.get_value().unwrap());

        chip.hold_clock_low(true);
        assert!(!scl.get_value().unwrap());

        chip.hold_clock_low(false);
        chip.stretch_clock(2);
        assert!(!scl.get_value().unwrap());
        assert!(!scl.get_value().unwrap());
        assert!(scl.get_value().unwrap());
    }

    #[test]
    fn test_delay_accumulates() {
        let delay = SimDelay::new();
        let mut handle = delay.clone();
        handle.delay_us(5);
        handle.delay_ms(1);
        assert_eq!(delay.elapsed_us(), 1_005);
    }
}
