// Licensed under the Apache-2.0 license

//! Numbered bus registry.
//!
//! Stands in for the bus framework's adapter table: it records which bus
//! numbers are taken, under which name, and with what capabilities. Transfers
//! never go through the registry; it only gates which adapters are live.

use core::fmt;

use fugit::{MicrosDurationU32, MillisDurationU32};
use heapless::{String, Vec};

/// Longest adapter name kept by the registry.
pub const ADAPTER_NAME_LEN: usize = 48;

pub type AdapterName = String<ADAPTER_NAME_LEN>;

/// What a registered adapter looks like to the rest of the system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    pub nr: u32,
    pub name: AdapterName,
    /// `false` when SCL is output-only and targets cannot stretch the clock.
    pub can_stretch: bool,
    pub bit_delay: MicrosDurationU32,
    pub stretch_timeout: MillisDurationU32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Another adapter already owns this bus number.
    NumberInUse(u32),
    /// No room left in the table.
    Full,
    /// The registry refused the request for its own reasons.
    Rejected,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumberInUse(nr) => write!(f, "bus number {nr} already in use"),
            Self::Full => f.write_str("adapter table full"),
            Self::Rejected => f.write_str("request rejected"),
        }
    }
}

/// Registration interface of the bus framework.
pub trait AdapterRegistry {
    /// Register an adapter under the bus number in `info`.
    ///
    /// # Errors
    ///
    /// Fails when the number is taken or the table cannot hold another entry.
    fn add_numbered_bus(&mut self, info: &AdapterInfo) -> Result<(), RegistryError>;

    /// Remove the adapter registered as `nr`. Removing an absent number is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Implementations may refuse removal; the caller must then keep the
    /// adapter alive.
    fn del_adapter(&mut self, nr: u32) -> Result<(), RegistryError>;
}

impl<R: AdapterRegistry + ?Sized> AdapterRegistry for &mut R {
    fn add_numbered_bus(&mut self, info: &AdapterInfo) -> Result<(), RegistryError> {
        (**self).add_numbered_bus(info)
    }

    fn del_adapter(&mut self, nr: u32) -> Result<(), RegistryError> {
        (**self).del_adapter(nr)
    }
}

/// Fixed-capacity adapter table holding up to `N` buses.
#[derive(Debug, Default)]
pub struct BusRegistry<const N: usize> {
    adapters: Vec<AdapterInfo, N>,
}

impl<const N: usize> BusRegistry<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    #[must_use]
    pub fn get(&self, nr: u32) -> Option<&AdapterInfo> {
        self.adapters.iter().find(|info| info.nr == nr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdapterInfo> {
        self.adapters.iter()
    }
}

impl<const N: usize> AdapterRegistry for BusRegistry<N> {
    fn add_numbered_bus(&mut self, info: &AdapterInfo) -> Result<(), RegistryError> {
        if self.get(info.nr).is_some() {
            return Err(RegistryError::NumberInUse(info.nr));
        }
        self.adapters
            .push(info.clone())
            .map_err(|_| RegistryError::Full)
    }

    fn del_adapter(&mut self, nr: u32) -> Result<(), RegistryError> {
        if let Some(index) = self.adapters.iter().position(|info| info.nr == nr) {
            self.adapters.swap_remove(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(nr: u32) -> AdapterInfo {
        let mut name = AdapterName::new();
        name.push_str("i2c-gpio").unwrap();
        AdapterInfo {
            nr,
            name,
            can_stretch: true,
            bit_delay: MicrosDurationU32::micros(5),
            stretch_timeout: MillisDurationU32::millis(100),
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut registry = BusRegistry::<4>::new();

        registry.add_numbered_bus(&info(3)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(3).map(|i| i.nr), Some(3));
        assert!(registry.get(4).is_none());
    }

    #[test]
    fn test_number_conflict_rejected() {
        let mut registry = BusRegistry::<4>::new();
        registry.add_numbered_bus(&info(1)).unwrap();

        assert_eq!(
            registry.add_numbered_bus(&info(1)),
            Err(RegistryError::NumberInUse(1))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_full_table_rejected() {
        let mut registry = BusRegistry::<1>::new();
        registry.add_numbered_bus(&info(0)).unwrap();

        assert_eq!(
            registry.add_numbered_bus(&info(1)),
            Err(RegistryError::Full)
        );
    }

    #[test]
    fn test_del_adapter_is_idempotent() {
        let mut registry = BusRegistry::<2>::new();
        registry.add_numbered_bus(&info(7)).unwrap();

        assert!(registry.del_adapter(7).is_ok());
        assert!(registry.del_adapter(7).is_ok());
        assert!(registry.is_empty());
    }
}
