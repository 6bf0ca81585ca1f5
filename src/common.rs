// Licensed under the Apache-2.0 license

//! Logging hooks shared by the drivers.
//!
//! Drivers are generic over a [`Logger`] so that a board can route
//! diagnostics wherever it has an output (UART, RTT, host console) or drop
//! them entirely with [`NoOpLogger`].

use core::fmt;

/// Sink for driver diagnostics.
pub trait Logger {
    fn debug(&mut self, args: fmt::Arguments<'_>);
    fn info(&mut self, args: fmt::Arguments<'_>);
    fn error(&mut self, args: fmt::Arguments<'_>);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}
    fn info(&mut self, _args: fmt::Arguments<'_>) {}
    fn error(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Logger forwarding to the [`log`] facade under a fixed target.
#[derive(Clone, Copy, Debug)]
pub struct LogLogger {
    target: &'static str,
}

impl LogLogger {
    #[must_use]
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogLogger {
    fn default() -> Self {
        Self::new("i2c_gpio")
    }
}

impl Logger for LogLogger {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        log::debug!(target: self.target, "{args}");
    }

    fn info(&mut self, args: fmt::Arguments<'_>) {
        log::info!(target: self.target, "{args}");
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        log::error!(target: self.target, "{args}");
    }
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        (**self).debug(args);
    }

    fn info(&mut self, args: fmt::Arguments<'_>) {
        (**self).info(args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        (**self).error(args);
    }
}
