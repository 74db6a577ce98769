//! The per-device manager: maps the register region once and brings up the ports.
//!
//! Setup is all or nothing. Ports are activated in list order; if one fails, the ones
//! already registered are unregistered newest first before the error is returned. The
//! register mapping is device-scoped and outlives every port; the platform releases it
//! on detach or when the probe fails.
use crate::{
    error::FpgamgrError,
    pdata::PlatformData,
    port::FpgamgrGpioPort,
};
use alloc::vec::Vec;
use dev::{Device, Handle, HandleRef, PlatformDevice, debug_ex, mmio::IoMem};
use log::error;
use spin::{Mutex, RwLock, RwLockReadGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    Uninitialized,
    RegionMapped,
    Activating,
    RollingBack,
    Ready,
}

#[derive(Debug)]
pub struct FpgamgrGpio {
    dev: HandleRef<Device>,
    regs: IoMem,
    ports: RwLock<Vec<FpgamgrGpioPort>>,
    nr_ports: usize,
    state: Mutex<SetupState>,
}

impl FpgamgrGpio {
    /// Map the device's register region and register one chip per entry of `pdata`.
    pub fn setup(
        pdev: &PlatformDevice,
        pdata: &PlatformData,
    ) -> Result<Handle<FpgamgrGpio>, FpgamgrError> {
        let nr_ports = pdata.nports();
        if nr_ports == 0 {
            return Err(FpgamgrError::NoPorts);
        }

        let mut ports = Vec::new();
        ports
            .try_reserve_exact(nr_ports)
            .map_err(|_| FpgamgrError::AllocationFailure)?;

        let regs = pdev
            .devm_ioremap_resource(pdev.get_resource(0))
            .map_err(|err| {
                error!("{}: cannot map registers: {}", pdev.name, err);
                FpgamgrError::RegionMapFailure(err)
            })?;

        let gpio = Handle::from(FpgamgrGpio {
            dev: pdev.device().create_ref(),
            regs,
            ports: RwLock::new(Vec::new()),
            nr_ports,
            state: Mutex::new(SetupState::RegionMapped),
        });

        gpio.set_state(SetupState::Activating);
        for (i, pp) in pdata.properties.iter().enumerate() {
            match FpgamgrGpioPort::activate(&gpio, pdev, pp, i) {
                Ok(port) => ports.push(port),
                Err(source) => {
                    gpio.set_state(SetupState::RollingBack);
                    while let Some(port) = ports.pop() {
                        port.deactivate(pdev);
                    }
                    return Err(FpgamgrError::PartialFailure {
                        position: i,
                        source,
                    });
                }
            }
        }

        *gpio.ports.write() = ports;
        gpio.set_state(SetupState::Ready);
        Ok(gpio)
    }

    fn set_state(&self, state: SetupState) {
        debug_ex!("\tfpgamgr gpio {:?}: {:?}.", self.regs, state);
        *self.state.lock() = state;
    }

    /// The manager bound to `dev`, if any.
    pub fn from_device(dev: &Device) -> Option<Handle<FpgamgrGpio>> {
        dev.drvdata::<Handle<FpgamgrGpio>>()
    }

    pub fn state(&self) -> SetupState {
        *self.state.lock()
    }

    pub fn device(&self) -> Option<Handle<Device>> {
        self.dev.get_handle()
    }

    pub fn regs(&self) -> &IoMem {
        &self.regs
    }

    pub fn nr_ports(&self) -> usize {
        self.nr_ports
    }

    /// Live ports in list order.
    pub fn ports(&self) -> RwLockReadGuard<'_, Vec<FpgamgrGpioPort>> {
        self.ports.read()
    }
}
