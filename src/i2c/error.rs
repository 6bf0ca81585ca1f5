// Licensed under the Apache-2.0 license

use crate::gpio::RequestError;
use crate::i2c::common::BusLine;
use crate::i2c::registry::RegistryError;
use embedded_hal::digital;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Errors reported by the GPIO I2C adapter and its bit engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A bus line could not be acquired from its provider.
    #[error("{line} line unavailable: {reason}")]
    PinUnavailable { line: BusLine, reason: RequestError },
    /// The bus registry refused the adapter.
    #[error("adapter registration failed: {0}")]
    RegistrationFailed(RegistryError),
    /// The bus registry refused to remove the adapter.
    #[error("adapter deregistration failed: {0}")]
    DeregistrationFailed(RegistryError),
    /// SCL stayed low past the stretch timeout.
    #[error("SCL not released within the stretch timeout")]
    StretchTimeout,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("no acknowledge ({0:?})")]
    NoAcknowledge(NoAcknowledgeSource),
    /// A line operation failed in the middle of a transfer.
    #[error("GPIO line error ({0:?})")]
    Gpio(digital::ErrorKind),
    /// SDA still held low after bus recovery.
    #[error("SDA stuck low")]
    BusBusy,
    /// Transfer attempted on an adapter that is not live.
    #[error("adapter is not registered")]
    NotRegistered,
}

impl Error {
    pub(crate) fn gpio<E: digital::Error>(err: E) -> Self {
        Self::Gpio(err.kind())
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::NoAcknowledge(source) => ErrorKind::NoAcknowledge(source),
            Error::StretchTimeout | Error::BusBusy | Error::Gpio(_) => ErrorKind::Bus,
            Error::PinUnavailable { .. }
            | Error::RegistrationFailed(_)
            | Error::DeregistrationFailed(_)
            | Error::InvalidConfiguration(_)
            | Error::NotRegistered => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn test_hal_error_kinds() {
        assert_eq!(
            Error::NoAcknowledge(NoAcknowledgeSource::Address).kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(Error::StretchTimeout.kind(), ErrorKind::Bus);
        assert_eq!(Error::NotRegistered.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_display_names_the_line() {
        let err = Error::PinUnavailable {
            line: BusLine::Scl,
            reason: RequestError::Busy,
        };
        assert_eq!(err.to_string(), "SCL line unavailable: line busy");
    }
}
