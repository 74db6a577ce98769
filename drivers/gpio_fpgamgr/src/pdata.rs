//! Port descriptions, either supplied by the board code or read from the device tree.
use crate::error::FpgamgrError;
use alloc::{boxed::Box, vec::Vec};
use dev::{Device, OfNode};

/// One port: where it is described, what to call it, and which register it uses.
#[derive(Debug, Clone)]
pub struct PortProperty {
    pub node: Option<OfNode>,
    /// Full path of the port's node when read from the device tree; also the chip label.
    pub name: Box<str>,
    /// Register index, 0 or 1.
    pub idx: u32,
}

impl PortProperty {
    pub fn new(name: impl AsRef<str>, idx: u32) -> PortProperty {
        PortProperty {
            node: None,
            name: Box::from(name.as_ref()),
            idx,
        }
    }
}

/// Platform data for the driver.
///
/// Board code can attach one to the device with [Device::with_platform_data]; it is then
/// used as-is instead of the device tree.
#[derive(Debug, Clone, Default)]
pub struct PlatformData {
    pub properties: Vec<PortProperty>,
}

impl PlatformData {
    pub const MAX_PORT_INDEX: u32 = 1;

    pub fn new(properties: Vec<PortProperty>) -> PlatformData {
        PlatformData { properties }
    }

    pub fn nports(&self) -> usize {
        self.properties.len()
    }

    /// Read the port list from the children of the device's node.
    ///
    /// Every child must carry `reg = <0>` or `reg = <1>`; the first one that does not
    /// fails the whole read.
    #[cfg(feature = "of")]
    pub fn from_of(dev: &Device) -> Result<PlatformData, FpgamgrError> {
        let np = dev.of_node.as_ref().ok_or(FpgamgrError::ConfigurationAbsent)?;
        let nports = np.child_count();
        if nports == 0 {
            return Err(FpgamgrError::ConfigurationEmpty);
        }

        let mut properties = Vec::new();
        properties
            .try_reserve_exact(nports)
            .map_err(|_| FpgamgrError::AllocationFailure)?;

        for port_np in np.children() {
            let idx = match port_np.read_u32("reg") {
                Ok(idx) if idx <= Self::MAX_PORT_INDEX => idx,
                _ => {
                    let name = port_np.full_path();
                    log::error!("{}: missing/invalid port index for {}", dev.name, name);
                    return Err(FpgamgrError::InvalidPortIndex { name });
                }
            };
            properties.push(PortProperty {
                name: port_np.full_path(),
                node: Some(port_np),
                idx,
            });
        }

        Ok(PlatformData { properties })
    }

    #[cfg(not(feature = "of"))]
    pub fn from_of(_dev: &Device) -> Result<PlatformData, FpgamgrError> {
        Err(FpgamgrError::ConfigurationAbsent)
    }
}
