// Licensed under the Apache-2.0 license

//! Bus adapter lifecycle: acquire the two lines, pick their strategies,
//! register the adapter, and tear it all down again.
//!
//! ```text
//! Constructed ──probe──▶ Acquired ──register──▶ Registered
//!      ▲                    │ (failure: lines released)  │
//!      └────────────────────┘                           remove
//!                                                        ▼
//!                                  Destroyed ◀──── Quiescing
//! ```
//!
//! Line handles release themselves when dropped, so every early return in
//! [`AdapterSlot::probe`] rolls back whatever was acquired so far, in reverse
//! acquisition order.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};

use crate::common::{Logger, NoOpLogger};
use crate::gpio::{FlexLine, LineProvider};
use crate::i2c::algo_bit::BitAlgo;
use crate::i2c::common::{BusLine, GpioI2cConfig};
use crate::i2c::error::Error;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::line_ops::{release_line, BitLines, LineOps};
use crate::i2c::registry::{AdapterInfo, AdapterName, AdapterRegistry};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};

/// Lifecycle position of an [`AdapterSlot`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdapterState {
    /// Nothing acquired.
    Constructed,
    /// Lines held and in their starting state, not yet visible.
    Acquired,
    /// Visible in the registry; transfers allowed.
    Registered,
    /// Being removed; no new transfers.
    Quiescing,
    /// Removed and lines released.
    Destroyed,
}

/// A live GPIO I2C adapter: its registry entry and the engine that owns
/// both lines.
pub struct GpioI2cAdapter<L: FlexLine, D: DelayNs> {
    info: AdapterInfo,
    algo: BitAlgo<L, D>,
}

impl<L: FlexLine, D: DelayNs> GpioI2cAdapter<L, D> {
    #[must_use]
    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    #[must_use]
    pub fn nr(&self) -> u32 {
        self.info.nr
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    #[must_use]
    pub fn lines(&self) -> &BitLines<L> {
        self.algo.lines()
    }
}

impl<L: FlexLine, D: DelayNs> I2cHardwareCore for GpioI2cAdapter<L, D> {
    type Error = Error;

    fn can_stretch(&self) -> bool {
        self.info.can_stretch
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        self.algo.recover()
    }
}

impl<L: FlexLine, D: DelayNs> I2cMaster for GpioI2cAdapter<L, D> {
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.algo.transfer(addr, &mut [Operation::Write(bytes)])
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.algo.transfer(addr, &mut [Operation::Read(buffer)])
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.algo
            .transfer(addr, &mut [Operation::Write(bytes), Operation::Read(buffer)])
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.algo.transfer(addr, ops_slice)
    }
}

/// Owner of at most one adapter, driving it through its lifecycle.
pub struct AdapterSlot<L: FlexLine, D: DelayNs, G: Logger = NoOpLogger> {
    state: AdapterState,
    adapter: Option<GpioI2cAdapter<L, D>>,
    logger: G,
}

impl<L: FlexLine, D: DelayNs> Default for AdapterSlot<L, D, NoOpLogger> {
    fn default() -> Self {
        Self::new(NoOpLogger)
    }
}

impl<L: FlexLine, D: DelayNs, G: Logger> AdapterSlot<L, D, G> {
    pub fn new(logger: G) -> Self {
        Self {
            state: AdapterState::Constructed,
            adapter: None,
            logger,
        }
    }

    #[must_use]
    pub fn state(&self) -> AdapterState {
        self.state
    }

    #[must_use]
    pub fn adapter(&self) -> Option<&GpioI2cAdapter<L, D>> {
        self.adapter.as_ref()
    }

    pub(crate) fn logger(&mut self) -> &mut G {
        &mut self.logger
    }

    /// The live adapter.
    ///
    /// # Errors
    ///
    /// [`Error::NotRegistered`] unless a probe has succeeded and no remove
    /// has happened since.
    pub fn bus(&mut self) -> Result<&mut GpioI2cAdapter<L, D>, Error> {
        self.adapter.as_mut().ok_or(Error::NotRegistered)
    }

    /// embedded-hal view of the live adapter, logging through this slot.
    ///
    /// # Errors
    ///
    /// [`Error::NotRegistered`] as for [`Self::bus`].
    pub fn controller(
        &mut self,
    ) -> Result<I2cController<&mut GpioI2cAdapter<L, D>, &mut G>, Error> {
        let adapter = self.adapter.as_mut().ok_or(Error::NotRegistered)?;
        Ok(I2cController::new(adapter, &mut self.logger))
    }

    /// Bring up an adapter numbered after `id` on the lines named by
    /// `config`.
    ///
    /// On failure nothing stays registered and no line stays held; the slot
    /// returns to [`AdapterState::Constructed`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] for contradictory flags, or when the
    ///   slot already holds a live adapter
    /// - [`Error::PinUnavailable`] when a line cannot be acquired
    /// - [`Error::Gpio`] when a line refuses its starting state
    /// - [`Error::RegistrationFailed`] when the registry refuses the adapter
    pub fn probe<P, R>(
        &mut self,
        config: &GpioI2cConfig,
        id: i32,
        provider: &mut P,
        delay: D,
        registry: &mut R,
    ) -> Result<(), Error>
    where
        P: LineProvider<Line = L> + ?Sized,
        R: AdapterRegistry + ?Sized,
    {
        if self.adapter.is_some() {
            return Err(Error::InvalidConfiguration("adapter already registered"));
        }
        match self.bring_up(config, id, provider, delay, registry) {
            Ok(adapter) => {
                self.logger.info(format_args!(
                    "{}: using lines {} (SDA) and {} (SCL{})",
                    adapter.name(),
                    adapter.lines().sda_id(),
                    adapter.lines().scl_id(),
                    if adapter.can_stretch() {
                        ""
                    } else {
                        ", no clock stretching"
                    }
                ));
                self.adapter = Some(adapter);
                self.state = AdapterState::Registered;
                Ok(())
            }
            Err(err) => {
                self.logger
                    .error(format_args!("i2c-gpio{id}: probe failed: {err}"));
                self.state = AdapterState::Constructed;
                Err(err)
            }
        }
    }

    fn bring_up<P, R>(
        &mut self,
        config: &GpioI2cConfig,
        id: i32,
        provider: &mut P,
        delay: D,
        registry: &mut R,
    ) -> Result<GpioI2cAdapter<L, D>, Error>
    where
        P: LineProvider<Line = L> + ?Sized,
        R: AdapterRegistry + ?Sized,
    {
        config.validate()?;

        let mut sda = provider
            .request(config.sda, "sda")
            .map_err(|reason| Error::PinUnavailable {
                line: BusLine::Sda,
                reason,
            })?;
        let mut scl = provider
            .request(config.scl, "scl")
            .map_err(|reason| Error::PinUnavailable {
                line: BusLine::Scl,
                reason,
            })?;

        // Value-driven lines are asserted high here; the bus sees an edge.
        release_line(&mut sda, config.data_open_drain).map_err(Error::gpio)?;
        release_line(&mut scl, config.clock_open_drain || config.clock_output_only)
            .map_err(Error::gpio)?;
        self.state = AdapterState::Acquired;

        let ops = LineOps::select(config);
        let timing = config.timing();
        let info = AdapterInfo {
            nr: u32::try_from(id).unwrap_or(0),
            name: adapter_name(id)?,
            can_stretch: config.can_stretch(),
            bit_delay: timing.bit_delay,
            stretch_timeout: timing.stretch_timeout,
        };

        // Still owned by locals: a refusal drops SCL, then SDA.
        registry
            .add_numbered_bus(&info)
            .map_err(Error::RegistrationFailed)?;
        self.logger.debug(format_args!(
            "{}: registered as bus {}",
            info.name, info.nr
        ));

        let lines = BitLines::new(sda, scl, ops);
        Ok(GpioI2cAdapter {
            info,
            algo: BitAlgo::new(lines, timing, delay),
        })
    }

    /// Tear the adapter down: deregister, then release SCL, then SDA.
    ///
    /// Does nothing when no adapter is live, so it is safe after a failed
    /// probe and when called twice.
    ///
    /// # Errors
    ///
    /// [`Error::DeregistrationFailed`] when the registry refuses; the adapter
    /// then stays registered and keeps its lines.
    pub fn remove<R>(&mut self, registry: &mut R) -> Result<(), Error>
    where
        R: AdapterRegistry + ?Sized,
    {
        let Some(adapter) = self.adapter.take() else {
            return Ok(());
        };
        self.state = AdapterState::Quiescing;

        if let Err(err) = registry.del_adapter(adapter.nr()) {
            self.logger.error(format_args!(
                "{}: deregistration refused: {err}",
                adapter.name()
            ));
            self.adapter = Some(adapter);
            self.state = AdapterState::Registered;
            return Err(Error::DeregistrationFailed(err));
        }

        let GpioI2cAdapter { info, algo } = adapter;
        let (lines, _delay) = algo.into_parts();
        let (sda, scl) = lines.into_lines();
        drop(scl);
        drop(sda);

        self.logger
            .debug(format_args!("{}: removed", info.name));
        self.state = AdapterState::Destroyed;
        Ok(())
    }
}

fn adapter_name(id: i32) -> Result<AdapterName, Error> {
    let mut name = AdapterName::new();
    write!(name, "i2c-gpio{id}")
        .map_err(|_| Error::InvalidConfiguration("adapter name too long"))?;
    Ok(name)
}
