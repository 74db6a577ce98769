use alloc::boxed::Box;
use dev::{DriverProbeError, gpio::GpioError, mmio::MmioError};

/// Why a single port could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The generic chip rejected the port's register window or configuration.
    #[error("chip init: {0}")]
    Init(GpioError),
    /// The chip could not be registered, usually a label collision.
    #[error("chip registration: {0}")]
    Register(GpioError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FpgamgrError {
    /// The device has no device tree node to discover ports from.
    #[error("no port configuration")]
    ConfigurationAbsent,
    /// The device tree node has no port children.
    #[error("port configuration is empty")]
    ConfigurationEmpty,
    #[error("missing/invalid port index for {name}")]
    InvalidPortIndex { name: Box<str> },
    #[error("out of memory")]
    AllocationFailure,
    /// The supplied port list is empty.
    #[error("no ports")]
    NoPorts,
    #[error("cannot map register region: {0}")]
    RegionMapFailure(MmioError),
    /// Port `position` of the list failed; every port before it has been removed again.
    #[error("port {position} failed: {source}")]
    PartialFailure { position: usize, source: PortError },
}

impl From<FpgamgrError> for DriverProbeError {
    fn from(err: FpgamgrError) -> Self {
        match err {
            FpgamgrError::ConfigurationAbsent
            | FpgamgrError::ConfigurationEmpty
            | FpgamgrError::NoPorts => DriverProbeError::NoDevice,
            FpgamgrError::InvalidPortIndex { .. } => DriverProbeError::InvalidArgument,
            FpgamgrError::AllocationFailure => DriverProbeError::OutOfMemory,
            FpgamgrError::RegionMapFailure(err) => DriverProbeError::Mmio(err),
            FpgamgrError::PartialFailure {
                source: PortError::Init(err) | PortError::Register(err),
                ..
            } => DriverProbeError::Gpio(err),
        }
    }
}
