// Licensed under the Apache-2.0 license

//! embedded-hal facade over any [`I2cMaster`].
//!
//! Drivers written against `embedded_hal::i2c::I2c` talk to the controller;
//! the controller forwards to the master and reports failures through its
//! [`Logger`].

use crate::common::{Logger, NoOpLogger};
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }

    /// Recover a stuck bus, logging the outcome.
    ///
    /// # Errors
    ///
    /// Propagates the master's recovery failure.
    pub fn recover(&mut self) -> Result<(), H::Error> {
        let result = self.hardware.recover_bus();
        match &result {
            Ok(()) => self.logger.info(format_args!("bus recovered")),
            Err(err) => self
                .logger
                .error(format_args!("bus recovery failed: {err:?}")),
        }
        result
    }

    fn report(
        &mut self,
        what: &str,
        addr: SevenBitAddress,
        result: Result<(), H::Error>,
    ) -> Result<(), H::Error> {
        if let Err(err) = &result {
            self.logger
                .error(format_args!("{what} at {addr:#04x} failed: {err:?}"));
        }
        result
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let result = self.hardware.read(addr, buffer);
        self.report("read", addr, result)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        let result = self.hardware.write(addr, bytes);
        self.report("write", addr, result)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.write_read(addr, bytes, buffer);
        self.report("write_read", addr, result)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.transaction_slice(addr, operations);
        self.report("transaction", addr, result)
    }
}
