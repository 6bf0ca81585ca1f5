// Licensed under the Apache-2.0 license

//! Bit-banged I2C bus master over two general purpose I/O lines.
//!
//! The crate turns a data line (SDA) and a clock line (SCL) into a registered
//! I2C adapter. How each line is driven (direction switching or open-drain
//! output value) is chosen once from an electrical configuration; the
//! bit-level engine then drives transfers through those bound strategies.
//!
//! The `std` feature enables the host-side line simulator in [`i2c::sim`].
//! The end-to-end suite in `tests/` depends on it and only runs with
//! `cargo test --features std`; unit tests use the simulator either way.

// Enforce Copilot coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod common;
pub mod gpio;
pub mod i2c;
