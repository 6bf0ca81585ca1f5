// Licensed under the Apache-2.0 license

//! Pin abstraction consumed by the bit-banged bus.
//!
//! A [`FlexLine`] is a single physical line whose direction can be switched
//! at runtime, which `embedded_hal::digital` deliberately does not model.
//! Lines are handed out by a [`LineProvider`] (the GPIO controller owning the
//! line namespace). A line handle is exclusively owned; dropping it releases
//! the line back to its provider.

use core::fmt;

use embedded_hal::digital::ErrorType;

/// Line identifier in the provider's namespace.
pub type LineId = u32;

/// Direction a line is currently configured for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A general purpose line with runtime-switchable direction.
///
/// Dropping the handle must release the line.
pub trait FlexLine: ErrorType {
    /// Identifier this handle was requested with.
    fn id(&self) -> LineId;

    /// Current direction as reported by the controller.
    fn direction(&mut self) -> Result<Direction, Self::Error>;

    /// Switch to input. The output stage is disabled.
    fn set_direction_input(&mut self) -> Result<(), Self::Error>;

    /// Switch to output, driving `high` from the first instant.
    fn set_direction_output(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Set the output value without touching direction.
    ///
    /// On an open-drain line `true` turns the driver off and the pull-up
    /// provides the high level.
    fn set_value(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Sample the line level.
    fn get_value(&mut self) -> Result<bool, Self::Error>;
}

/// Why a line request was refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// Another consumer holds the line.
    Busy,
    /// The identifier does not name a line on this controller.
    NotFound,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("line busy"),
            Self::NotFound => f.write_str("no such line"),
        }
    }
}

/// Source of exclusively owned line handles.
pub trait LineProvider {
    type Line: FlexLine;

    /// Request exclusive ownership of `line` on behalf of `consumer`.
    ///
    /// The line is returned in whatever direction and level it had; the
    /// caller is responsible for the starting state.
    fn request(&mut self, line: LineId, consumer: &str) -> Result<Self::Line, RequestError>;
}

impl<P: LineProvider + ?Sized> LineProvider for &mut P {
    type Line = P::Line;

    fn request(&mut self, line: LineId, consumer: &str) -> Result<Self::Line, RequestError> {
        (**self).request(line, consumer)
    }
}
