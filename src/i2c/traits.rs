// Licensed under the Apache-2.0 license

//! # I2C master traits
//!
//! Small composable traits describing what a live bus can do, independent
//! of how it is implemented.
//!
//! ```text
//! I2cHardwareCore (foundation: capabilities, recovery)
//!     └── I2cMaster (transfers)
//! ```

use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

/// Core bus interface shared by every master implementation.
pub trait I2cHardwareCore {
    /// Error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Whether targets can stretch the clock on this bus.
    ///
    /// A master that cannot sample SCL runs open loop and must be slow
    /// enough for every target.
    fn can_stretch(&self) -> bool;

    /// Attempt to recover the bus from a target stuck mid-byte.
    ///
    /// # Errors
    ///
    /// Returns an error if SDA is still held low afterwards or a line
    /// operation fails.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C master operations
///
/// # Examples
///
/// ```rust,ignore
/// use i2c_gpio::i2c::I2cMaster;
///
/// fn read_sensor<T: I2cMaster>(mut i2c: T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.read(0x48u8, &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write `bytes` to the target at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge or the bus fails.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buffer` from the target at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge or the bus fails.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read with a repeated start in between.
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute `ops_slice` as one transaction ended by a single stop.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the transaction is abandoned at that point.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

impl<T: I2cHardwareCore + ?Sized> I2cHardwareCore for &mut T {
    type Error = T::Error;

    fn can_stretch(&self) -> bool {
        (**self).can_stretch()
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        (**self).recover_bus()
    }
}

impl<A: AddressMode, T: I2cMaster<A> + ?Sized> I2cMaster<A> for &mut T {
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(addr, bytes)
    }

    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(addr, buffer)
    }

    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        (**self).write_read(addr, bytes, buffer)
    }

    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        (**self).transaction_slice(addr, ops_slice)
    }
}
