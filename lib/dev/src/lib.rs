//! Platform device model: devices, drivers, device-scoped resources, MMIO and
//! memory-mapped GPIO chips.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod device;
pub mod devres;
pub mod driver;
pub mod gpio;
pub mod handle;
pub mod logging;
pub mod mmio;
pub mod platform;

pub use device::{Device, OfNode};
pub use driver::{Driver, DriverProbeError, DriverRegistry};
pub use handle::{Handle, HandleRef};
pub use platform::{Platform, PlatformDevice};

#[doc(hidden)]
pub use log as __log;
