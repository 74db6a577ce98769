//! The platform bus: devices, the drivers bound to them and the services drivers use
//! while probing.
//!
//! A [Platform] owns the driver registry, the GPIO chip registry, the MMIO mapper and
//! the region claims. Drivers never see the platform directly; each probe gets a
//! [PlatformDevice], which ties every resource it hands out to the device's devres list.
//!
//! Attach and detach of one device are serialised. A failed probe and a detach both
//! release the device's devres entries, newest first, and clear its driver data.
use crate::{
    debug_ex,
    device::{Device, OfNode},
    devres::DevresId,
    driver::{Driver, DriverProbeError, DriverRegistry},
    gpio::{GpioChip, GpioChipRegistry, GpioError},
    handle::Handle,
    mmio::{IoMapper, IoMem, IoRange, IoRegionClaims, MmioError},
};
use alloc::{format, sync::Arc, vec::Vec};
use core::ops::Deref;
use dt::{DeviceTree, NodeType};
use log::warn;
use spin::RwLock;

/// Compatible strings of nodes whose children are devices too.
const BUS_COMPATIBLES: &[&str] = &["simple-bus", "simple-mfd"];

pub struct Platform {
    drivers: DriverRegistry,
    gpio: Handle<GpioChipRegistry>,
    mapper: Arc<dyn IoMapper>,
    claims: Handle<IoRegionClaims>,
    devices: RwLock<Vec<Handle<Device>>>,
}

impl Platform {
    pub fn new(mapper: Arc<dyn IoMapper>) -> Platform {
        Platform {
            drivers: DriverRegistry::new(),
            gpio: Handle::from(GpioChipRegistry::new()),
            mapper,
            claims: Handle::from(IoRegionClaims::new()),
            devices: RwLock::new(Vec::new()),
        }
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn gpio(&self) -> &GpioChipRegistry {
        &self.gpio
    }

    pub fn claims(&self) -> &IoRegionClaims {
        &self.claims
    }

    pub fn devices(&self) -> Vec<Handle<Device>> {
        self.devices.read().clone()
    }

    pub fn find_device(&self, name: &str) -> Option<Handle<Device>> {
        self.devices
            .read()
            .iter()
            .find(|dev| dev.name.as_ref() == name)
            .cloned()
    }

    /// Add `dev` to the bus without probing it.
    pub fn register_device(&self, dev: Device) -> Handle<Device> {
        let dev = Handle::from(dev);
        self.devices.write().push(dev.clone());
        debug_ex!("\tRegistered device {}.", dev.name);
        dev
    }

    /// Add `dev` to the bus and bind a driver if one matches.
    ///
    /// Probe errors are logged; the device stays on the bus unbound.
    pub fn add_device(&self, dev: Device) -> Handle<Device> {
        let dev = self.register_device(dev);
        if let Err(err) = self.attach(&dev) {
            warn!("Error probing device '{}': {}", dev.name, err);
        }
        dev
    }

    /// Detach `dev` if bound and take it off the bus. `false` if it was not on the bus.
    pub fn remove_device(&self, dev: &Handle<Device>) -> bool {
        self.detach(dev);
        let mut guard = self.devices.write();
        match guard.iter().position(|d| d.ptr_eq(dev)) {
            Some(idx) => {
                guard.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Try the matching drivers in turn until one binds.
    ///
    /// Returns `Ok(false)` if no driver matched or every candidate answered
    /// [DriverProbeError::NoDevice]. Any other probe error stops the search.
    pub fn attach(&self, dev: &Handle<Device>) -> Result<bool, DriverProbeError> {
        let _lifecycle = dev.lifecycle.lock();
        if dev.is_bound() {
            return Err(DriverProbeError::Busy);
        }
        for driver in self.drivers.match_device(&dev.compatible[..]) {
            let pdev = PlatformDevice {
                platform: self,
                dev: dev.clone(),
            };
            match driver.probe(&pdev) {
                Ok(()) => {
                    debug_ex!("\tBound '{}' to {}.", driver.get_name(), dev.name);
                    dev.bind(driver);
                    return Ok(true);
                }
                Err(err) => {
                    Self::unwind(dev);
                    if err != DriverProbeError::NoDevice {
                        return Err(err);
                    }
                    debug_ex!("\t'{}' passed on {}.", driver.get_name(), dev.name);
                }
            }
        }
        Ok(false)
    }

    /// Unbind `dev`. `false` if no driver was bound, which makes a second call a no-op.
    pub fn detach(&self, dev: &Handle<Device>) -> bool {
        let _lifecycle = dev.lifecycle.lock();
        let driver: Arc<dyn Driver> = match dev.unbind() {
            Some(driver) => driver,
            None => return false,
        };
        let pdev = PlatformDevice {
            platform: self,
            dev: dev.clone(),
        };
        driver.remove(&pdev);
        Self::unwind(dev);
        debug_ex!("\tUnbound '{}' from {}.", driver.get_name(), dev.name);
        true
    }

    fn unwind(dev: &Handle<Device>) {
        dev.devres_release_all();
        drop(dev.take_drvdata());
    }

    /// Create and probe a device for every available, compatible node under the root,
    /// descending into bus nodes. Returns the devices created.
    pub fn populate(&self, tree: Handle<DeviceTree>) -> Vec<Handle<Device>> {
        debug_ex!("Registering devices...");
        let mut created = Vec::new();
        let root = tree.root_id;
        self.populate_children(&tree, root, &mut created);
        debug_ex!("Devices registered.");
        created
    }

    fn populate_children(
        &self,
        tree: &Handle<DeviceTree>,
        node_id: usize,
        created: &mut Vec<Handle<Device>>,
    ) {
        let Some(node) = OfNode::new(tree.clone(), node_id) else {
            return;
        };
        for child in node.children() {
            if child.node().node_type == NodeType::Description {
                debug_ex!("\tSkipped Description Node {}.", child.full_path());
                continue;
            }
            if !child.is_available() {
                debug_ex!("\tSkipped disabled node {}.", child.full_path());
                continue;
            }
            let compatible = child.compatible();
            if compatible.is_empty() {
                continue;
            }
            let is_bus = compatible.iter().any(|c| BUS_COMPATIBLES.contains(c));
            let child_id = child.node().node_id;
            let name = {
                let n = child.node();
                if n.unit_addr.is_empty() {
                    format!("{}", n.node_name)
                } else {
                    format!("{}.{}", n.unit_addr, n.node_name)
                }
            };
            created.push(self.add_device(Device::new(name).with_of_node(child)));
            if is_bus {
                self.populate_children(tree, child_id, created);
            }
        }
    }
}

/// A device as seen by the driver probing or removing it.
pub struct PlatformDevice<'p> {
    platform: &'p Platform,
    dev: Handle<Device>,
}

impl Deref for PlatformDevice<'_> {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.dev
    }
}

/// A GPIO chip registered through [PlatformDevice::devm_gpiochip_add].
#[derive(Debug, Clone)]
pub struct DevmGpioChip {
    chip: Handle<GpioChip>,
    devres: DevresId,
}

impl DevmGpioChip {
    pub fn chip(&self) -> &Handle<GpioChip> {
        &self.chip
    }
}

impl Deref for DevmGpioChip {
    type Target = GpioChip;

    fn deref(&self) -> &GpioChip {
        &self.chip
    }
}

impl PlatformDevice<'_> {
    pub fn device(&self) -> &Handle<Device> {
        &self.dev
    }

    pub fn of_node(&self) -> Option<&OfNode> {
        self.dev.of_node.as_ref()
    }

    /// Memory resource `idx`.
    pub fn get_resource(&self, idx: usize) -> Option<&IoRange> {
        self.dev.resources.get(idx)
    }

    pub fn gpio(&self) -> &GpioChipRegistry {
        &self.platform.gpio
    }

    /// Claim and map `res` for the lifetime of the binding.
    ///
    /// The mapping is unmapped and the claim dropped when the device is detached or
    /// the probe fails.
    pub fn devm_ioremap_resource(&self, res: Option<&IoRange>) -> Result<IoMem, MmioError> {
        let range = res.ok_or(MmioError::AddressNotSpecified)?.clone();
        self.platform.claims.claim(&range)?;
        let mem = match self.platform.mapper.map(&range) {
            Ok(mem) => mem,
            Err(err) => {
                self.platform.claims.release(&range);
                return Err(err);
            }
        };
        debug_ex!("\t{}: mapped {:?}.", self.dev.name, range);
        let mapper = self.platform.mapper.clone();
        let claims = self.platform.claims.clone();
        let mapped = mem.clone();
        self.dev.devres_add("ioremap", move || {
            mapper.unmap(&mapped);
            claims.release(&range);
        });
        Ok(mem)
    }

    /// Register `chip` until the device is detached, the probe fails, or
    /// [PlatformDevice::devm_gpiochip_remove] is called.
    pub fn devm_gpiochip_add(&self, chip: GpioChip) -> Result<DevmGpioChip, GpioError> {
        let chip = self.platform.gpio.add(chip)?;
        let registry = self.platform.gpio.clone();
        let registered = chip.clone();
        let devres = self.dev.devres_add("gpiochip", move || {
            if let Err(err) = registry.remove(&registered) {
                warn!("Error removing gpiochip '{}': {}", registered.label(), err);
            }
        });
        Ok(DevmGpioChip { chip, devres })
    }

    /// Unregister a chip now. `false` if it was already released.
    pub fn devm_gpiochip_remove(&self, chip: &DevmGpioChip) -> bool {
        self.dev.devres_release(chip.devres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::IdentityMapper;

    #[derive(Debug)]
    struct Picky;

    impl Driver for Picky {
        fn get_name(&self) -> &'static str {
            "picky"
        }

        fn get_comp_strs(&self) -> &'static [&'static str] {
            &["test,picky"]
        }

        fn probe(&self, pdev: &PlatformDevice) -> Result<(), DriverProbeError> {
            pdev.devm_ioremap_resource(pdev.get_resource(0))?;
            Err(DriverProbeError::NoDevice)
        }
    }

    #[test]
    fn declined_probe_releases_mapping() {
        let mem = vec![0u32; 2].into_boxed_slice();
        let start = mem.as_ptr() as usize;
        let platform = Platform::new(Arc::new(unsafe { IdentityMapper::new() }));
        platform.drivers().register_driver(Picky);
        let dev = platform.register_device(
            Device::new("picky")
                .with_compatible("test,picky")
                .with_resource(start..start + 8),
        );
        assert_eq!(platform.attach(&dev), Ok(false));
        assert!(!dev.is_bound());
        assert!(!platform.claims().is_claimed(&IoRange::from(start..start + 8)));
        assert!(!platform.detach(&dev));
        assert!(platform.remove_device(&dev));
        assert!(platform.devices().is_empty());
    }
}
