//! GPIO driver for the FPGA manager I/O ports that connect the HPS to the FPGA fabric
//! on Altera SoCFPGA parts.
//!
//! The block has two 32-bit ports behind one register region: port 0 at offset 0 can be
//! read and driven, port 1 at offset 4 is input only. Each port is registered as its own
//! [dev::gpio::GpioChip], findable through the device tree node describing it.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod driver;
pub mod error;
pub mod gpio;
pub mod pdata;
pub mod port;

pub use driver::{FpgamgrGpioDriver, register_drivers};
pub use error::{FpgamgrError, PortError};
pub use gpio::{FpgamgrGpio, SetupState};
pub use pdata::{PlatformData, PortProperty};
pub use port::{FpgamgrGpioPort, PortKind};
