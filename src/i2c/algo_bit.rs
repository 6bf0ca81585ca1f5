// Licensed under the Apache-2.0 license

//! Bit-level I2C master engine.
//!
//! Generates start, repeated start and stop conditions and shifts bytes MSB
//! first through the line strategies of a [`BitLines`]. All timing is derived
//! from the half clock period; the only blocking wait is for a stretched SCL,
//! bounded by the stretch timeout.
//!
//! Multi-master arbitration is not detected.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::gpio::FlexLine;
use crate::i2c::common::BitTiming;
use crate::i2c::error::Error;
use crate::i2c::line_ops::BitLines;

/// Poll interval while waiting for a stretched clock.
const STRETCH_POLL_US: u32 = 1;
/// A byte plus its acknowledge bit.
const RECOVERY_CLOCKS: usize = 9;

pub struct BitAlgo<L: FlexLine, D: DelayNs> {
    lines: BitLines<L>,
    timing: BitTiming,
    delay: D,
}

impl<L: FlexLine, D: DelayNs> BitAlgo<L, D> {
    pub fn new(lines: BitLines<L>, timing: BitTiming, delay: D) -> Self {
        Self {
            lines,
            timing,
            delay,
        }
    }

    #[must_use]
    pub fn lines(&self) -> &BitLines<L> {
        &self.lines
    }

    #[must_use]
    pub fn timing(&self) -> &BitTiming {
        &self.timing
    }

    pub(crate) fn into_parts(self) -> (BitLines<L>, D) {
        (self.lines, self.delay)
    }

    fn udelay(&mut self, us: u32) {
        if us > 0 {
            self.delay.delay_us(us);
        }
    }

    fn full(&self) -> u32 {
        self.timing.bit_delay_us()
    }

    fn half_up(&self) -> u32 {
        self.timing.bit_delay_us().div_ceil(2)
    }

    fn half_down(&self) -> u32 {
        self.timing.bit_delay_us() / 2
    }

    fn sdalo(&mut self) -> Result<(), Error> {
        self.lines.set_sda(false)?;
        self.udelay(self.half_up());
        Ok(())
    }

    fn sdahi(&mut self) -> Result<(), Error> {
        self.lines.set_sda(true)?;
        self.udelay(self.half_up());
        Ok(())
    }

    fn scllo(&mut self) -> Result<(), Error> {
        self.lines.set_scl(false)?;
        self.udelay(self.half_down());
        Ok(())
    }

    /// Release SCL and wait for it to read high.
    ///
    /// Targets may hold SCL low to stretch the clock. Output-only clocks
    /// cannot be read back, so the wait is skipped for them.
    fn sclhi(&mut self) -> Result<(), Error> {
        self.lines.set_scl(true)?;
        let timeout_us = self.timing.stretch_timeout_us();
        let mut waited_us: u32 = 0;
        while let Some(level) = self.lines.get_scl() {
            if level? {
                break;
            }
            if waited_us >= timeout_us {
                // The target may have let go while we were giving up.
                if self.lines.get_scl().transpose()?.unwrap_or(true) {
                    break;
                }
                return Err(Error::StretchTimeout);
            }
            self.delay.delay_us(STRETCH_POLL_US);
            waited_us = waited_us.saturating_add(STRETCH_POLL_US);
        }
        self.udelay(self.full());
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        // SDA falls while SCL is high.
        self.lines.set_sda(false)?;
        self.udelay(self.full());
        self.scllo()
    }

    fn repstart(&mut self) -> Result<(), Error> {
        self.sdahi()?;
        self.sclhi()?;
        self.start()
    }

    fn stop(&mut self) -> Result<(), Error> {
        // SDA rises while SCL is high.
        self.sdalo()?;
        self.sclhi()?;
        self.lines.set_sda(true)?;
        self.udelay(self.full());
        Ok(())
    }

    /// Best-effort stop after a failed transfer. When the clock is stuck
    /// low there is nothing to wait for, so SCL is only released.
    fn bailout(&mut self, cause: Error) {
        // The first failure is the one reported.
        let _ = if cause == Error::StretchTimeout {
            self.release_bus()
        } else {
            self.stop()
        };
    }

    fn release_bus(&mut self) -> Result<(), Error> {
        self.lines.set_sda(false)?;
        self.lines.set_scl(true)?;
        self.lines.set_sda(true)
    }

    /// Shift one byte out and return whether the receiver acknowledged.
    fn outb(&mut self, byte: u8) -> Result<bool, Error> {
        for bit in (0..8).rev() {
            self.lines.set_sda(byte & (1 << bit) != 0)?;
            self.udelay(self.half_up());
            self.sclhi()?;
            self.scllo()?;
        }
        self.sdahi()?;
        self.sclhi()?;
        // Receiver pulls SDA low to acknowledge.
        let ack = !self.lines.get_sda()?;
        self.scllo()?;
        Ok(ack)
    }

    /// Shift one byte in. The caller sends ACK/NAK afterwards.
    fn inb(&mut self) -> Result<u8, Error> {
        let mut byte = 0u8;
        self.sdahi()?;
        for bit in 0..8 {
            self.sclhi()?;
            byte <<= 1;
            if self.lines.get_sda()? {
                byte |= 1;
            }
            self.lines.set_scl(false)?;
            let hold = if bit == 7 { self.half_down() } else { self.full() };
            self.udelay(hold);
        }
        Ok(byte)
    }

    fn acknak(&mut self, ack: bool) -> Result<(), Error> {
        if ack {
            self.lines.set_sda(false)?;
        }
        self.udelay(self.half_up());
        self.sclhi()?;
        self.scllo()
    }

    fn address(&mut self, addr: SevenBitAddress, read: bool) -> Result<(), Error> {
        let byte = (addr << 1) | u8::from(read);
        if self.outb(byte)? {
            Ok(())
        } else {
            Err(Error::NoAcknowledge(NoAcknowledgeSource::Address))
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            if !self.outb(byte)? {
                return Err(Error::NoAcknowledge(NoAcknowledgeSource::Data));
            }
        }
        Ok(())
    }

    fn receive_bytes(&mut self, buffer: &mut [u8], nak_last: bool) -> Result<(), Error> {
        let count = buffer.len();
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = self.inb()?;
            let last = index + 1 == count;
            self.acknak(!(last && nak_last))?;
        }
        Ok(())
    }

    /// Clock out a target that is stuck driving SDA low in the middle of a
    /// byte: pulse SCL until SDA reads high, then send a stop.
    ///
    /// # Errors
    ///
    /// [`Error::BusBusy`] when SDA is still low after the stop.
    pub fn recover(&mut self) -> Result<(), Error> {
        self.sdahi()?;
        for _ in 0..RECOVERY_CLOCKS {
            if self.lines.get_sda()? {
                break;
            }
            self.scllo()?;
            self.sclhi()?;
        }
        self.scllo()?;
        self.stop()?;
        if self.lines.get_sda()? {
            Ok(())
        } else {
            Err(Error::BusBusy)
        }
    }

    /// Run `operations` against `addr` as one transaction.
    ///
    /// Adjacent operations of the same kind share one address phase; a
    /// repeated start separates operations of different kinds. The last byte
    /// of a read run is NAKed. A stop is always sent, also after a failure.
    ///
    /// # Errors
    ///
    /// [`Error::NoAcknowledge`] when the address or a written byte is not
    /// acknowledged, [`Error::StretchTimeout`] when SCL stays low, and
    /// [`Error::Gpio`] when a line operation fails.
    pub fn transfer(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        match self.run(addr, operations) {
            Ok(()) => self.stop(),
            Err(err) => {
                self.bailout(err);
                Err(err)
            }
        }
    }

    fn run(&mut self, addr: SevenBitAddress, operations: &mut [Operation<'_>]) -> Result<(), Error> {
        self.start()?;
        let count = operations.len();
        let mut previous_read: Option<bool> = None;
        for index in 0..count {
            let next_read = operations
                .iter()
                .skip(index + 1)
                .find(|op| !is_empty_read(op))
                .map(|op| matches!(op, Operation::Read(_)));
            let Some(operation) = operations.get_mut(index) else {
                break;
            };
            // A read address with nothing to read would leave the target
            // driving its first data bit with no NAK to stop it.
            if is_empty_read(operation) {
                continue;
            }
            let read = matches!(operation, Operation::Read(_));
            if previous_read != Some(read) {
                if previous_read.is_some() {
                    self.repstart()?;
                }
                self.address(addr, read)?;
            }
            match operation {
                Operation::Write(bytes) => self.send_bytes(bytes)?,
                Operation::Read(buffer) => {
                    let nak_last = next_read != Some(true);
                    self.receive_bytes(buffer, nak_last)?;
                }
            }
            previous_read = Some(read);
        }
        if previous_read.is_none() {
            // No operations: address-only write probe.
            self.address(addr, false)?;
        }
        Ok(())
    }
}

fn is_empty_read(operation: &Operation<'_>) -> bool {
    matches!(operation, Operation::Read(buffer) if buffer.is_empty())
}
