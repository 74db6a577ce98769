//! Driver subsystem: registration, discovery and probe errors.
//!
//! Responsibilities:
//! - Provide the [Driver] trait for platform drivers and a registry that maps compatible
//!   strings to driver implementations.
//! - Allow concurrent lookups via [DriverRegistry::find_drivers] and synchronized updates via
//!   [DriverRegistry::register_driver].
//!
//! Ownership and concurrency notes:
//! - The compatible map is protected by an [RwLock] for concurrent reader-heavy access patterns.
//! - Drivers are shared as [Arc<dyn Driver>]; lookups hand out clones so no lock is held while
//!   probing.
use crate::{debug_ex, gpio::GpioError, mmio::MmioError, platform::PlatformDevice};
use alloc::{collections::btree_map::BTreeMap, sync::Arc, vec, vec::Vec};
use core::fmt::Debug;
use spin::RwLock;

/// Trait implemented by drivers.
///
/// Responsibilities:
/// - Identify compatible strings via [Driver::get_comp_strs] so the registry can discover candidates.
/// - Implement [Driver::probe] to attempt binding to a device. Return `Ok(())` on success or a
///   [DriverProbeError]. Anything registered through the device's devres list during a failed
///   probe is released by the platform.
/// - Implement [Driver::remove] to undo what a successful probe did that devres does not cover.
///
/// Guarantees and expectations:
/// - [Driver::probe] and [Driver::remove] for one device never run concurrently.
/// - [Driver::remove] only runs after a successful [Driver::probe].
pub trait Driver: Sync + Send + Debug {
    fn get_name(&self) -> &'static str;
    fn get_comp_strs(&self) -> &'static [&'static str];
    fn probe(&self, pdev: &PlatformDevice) -> Result<(), DriverProbeError>;
    fn remove(&self, _pdev: &PlatformDevice) {}
    fn on_registered(&self) {}
}

/// Registry mapping from compatible string to candidate drivers.
pub struct DriverRegistry {
    comp_map: RwLock<BTreeMap<&'static str, Vec<Arc<dyn Driver>>>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    pub const fn new() -> DriverRegistry {
        DriverRegistry {
            comp_map: RwLock::new(BTreeMap::new()),
        }
    }

    /// Look up drivers matching `comp_str`.
    ///
    /// Return owned clones of the candidates in registration order; empty if none match.
    pub fn find_drivers(&self, comp_str: &str) -> Vec<Arc<dyn Driver>> {
        let guard = self.comp_map.read();
        if let Some(drv) = guard.get(comp_str) {
            drv.clone()
        } else {
            vec![]
        }
    }

    /// Candidates for a device listing `compatible`, most specific string first.
    ///
    /// A driver matching several of the strings appears once.
    pub fn match_device<S: AsRef<str>>(&self, compatible: &[S]) -> Vec<Arc<dyn Driver>> {
        let mut res: Vec<Arc<dyn Driver>> = Vec::new();
        for comp in compatible {
            for drv in self.find_drivers(comp.as_ref()) {
                if !res.iter().any(|known| Arc::ptr_eq(known, &drv)) {
                    res.push(drv);
                }
            }
        }
        res
    }

    /// Register a driver instance.
    ///
    /// Steps:
    /// 1. Log registration and invoke [Driver::on_registered].
    /// 2. Insert the shared instance under each compatible string returned by the driver.
    pub fn register_driver<T: 'static + Driver>(&self, driver: T) -> Arc<dyn Driver> {
        debug_ex!("\tRegistered driver '{}'.", driver.get_name());
        driver.on_registered();
        let driver: Arc<dyn Driver> = Arc::new(driver);

        let mut guard = self.comp_map.write();
        for comp in driver.get_comp_strs() {
            guard.entry(*comp).or_default().push(driver.clone());
        }
        driver
    }

    pub fn is_empty(&self) -> bool {
        self.comp_map.read().is_empty()
    }
}

// region: Error Types

/// Errors that may be returned by [Driver::probe].
///
/// Use these variants to express common probe failure reasons; platform code may wrap or
/// convert them into higher-level diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverProbeError {
    /// MMIO-related failures (address missing, invalid or already claimed).
    #[error("mmio: {0}")]
    Mmio(#[from] MmioError),
    /// A GPIO chip could not be set up or registered.
    #[error("gpio: {0}")]
    Gpio(#[from] GpioError),
    /// The device has nothing this driver can drive; the next candidate may try.
    #[error("no device")]
    NoDevice,
    /// The device description is malformed.
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory")]
    OutOfMemory,
    /// The device is already bound.
    #[error("device busy")]
    Busy,
    /// Custom driver-specific information.
    #[error("{info}")]
    Customized { info: &'static str },
}

impl DriverProbeError {
    /// The closest classic errno value, for callers that report numbers.
    pub fn errno(&self) -> i32 {
        const ENOMEM: i32 = 12;
        const EBUSY: i32 = 16;
        const ENODEV: i32 = 19;
        const EINVAL: i32 = 22;
        const EIO: i32 = 5;
        match self {
            DriverProbeError::NoDevice => -ENODEV,
            DriverProbeError::InvalidArgument => -EINVAL,
            DriverProbeError::OutOfMemory => -ENOMEM,
            DriverProbeError::Busy | DriverProbeError::Mmio(MmioError::Busy) => -EBUSY,
            DriverProbeError::Gpio(GpioError::LabelInUse { .. }) => -EBUSY,
            DriverProbeError::Gpio(GpioError::InvalidWidth { .. }) => -EINVAL,
            DriverProbeError::Mmio(_) | DriverProbeError::Gpio(_) => -EIO,
            DriverProbeError::Customized { .. } => -EIO,
        }
    }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy(&'static [&'static str]);

    impl Driver for Dummy {
        fn get_name(&self) -> &'static str {
            "dummy"
        }

        fn get_comp_strs(&self) -> &'static [&'static str] {
            self.0
        }

        fn probe(&self, _pdev: &PlatformDevice) -> Result<(), DriverProbeError> {
            Err(DriverProbeError::NoDevice)
        }
    }

    #[test]
    fn candidates_follow_compatible_order() {
        let reg = DriverRegistry::new();
        let generic = reg.register_driver(Dummy(&["vendor,generic"]));
        let both = reg.register_driver(Dummy(&["vendor,exact", "vendor,generic"]));
        let found = reg.match_device(&["vendor,exact", "vendor,generic"]);
        assert_eq!(found.len(), 2);
        assert!(Arc::ptr_eq(&found[0], &both));
        assert!(Arc::ptr_eq(&found[1], &generic));
        assert!(reg.find_drivers("vendor,other").is_empty());
    }

    #[test]
    fn errno_classes() {
        assert_eq!(DriverProbeError::NoDevice.errno(), -19);
        assert_eq!(DriverProbeError::InvalidArgument.errno(), -22);
        assert_eq!(DriverProbeError::from(MmioError::Busy).errno(), -16);
        assert_eq!(DriverProbeError::OutOfMemory.errno(), -12);
    }
}
