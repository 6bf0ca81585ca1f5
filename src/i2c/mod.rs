// Licensed under the Apache-2.0 license

//! GPIO bit-banged I2C master.
//!
//! - [`line_ops`] picks how each line is driven and sampled
//! - [`algo_bit`] generates the bus conditions and shifts bytes
//! - [`gpio_adapter`] acquires the lines and registers the adapter
//! - [`discovery`] builds a configuration from a description node
//! - [`i2c_controller`] exposes a live adapter as `embedded_hal::i2c::I2c`

pub mod algo_bit;
pub mod common;
pub mod discovery;
pub mod error;
pub mod gpio_adapter;
pub mod i2c_controller;
pub mod line_ops;
pub mod registry;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod traits;

pub use common::{GpioI2cConfig, GpioI2cConfigBuilder};
pub use discovery::{discover, probe_node, Discovery, PropertySource, StaticNode};
pub use error::Error;
pub use gpio_adapter::{AdapterSlot, AdapterState, GpioI2cAdapter};
pub use i2c_controller::I2cController;
pub use registry::{AdapterRegistry, BusRegistry};
pub use traits::{I2cHardwareCore, I2cMaster};
