use crate::{gpio::FpgamgrGpio, pdata::PlatformData};
use dev::{Driver, DriverProbeError, DriverRegistry, PlatformDevice, debug_ex};

#[derive(Debug)]
pub struct FpgamgrGpioDriver;

impl Driver for FpgamgrGpioDriver {
    fn get_name(&self) -> &'static str {
        "gpio-altera-fpgamgr"
    }

    fn get_comp_strs(&self) -> &'static [&'static str] {
        &["altr,fpgamgr-gpio"]
    }

    /// Board-supplied platform data wins over the device tree; a port list read from
    /// the tree lives only for the duration of the probe.
    fn probe(&self, pdev: &PlatformDevice) -> Result<(), DriverProbeError> {
        let gpio = match pdev.platform_data::<PlatformData>() {
            Some(pdata) => FpgamgrGpio::setup(pdev, pdata)?,
            None => {
                let pdata = PlatformData::from_of(pdev)?;
                FpgamgrGpio::setup(pdev, &pdata)?
            }
        };
        debug_ex!("\t{}: {} fpgamgr port(s) ready.", pdev.name, gpio.nr_ports());
        pdev.set_drvdata(gpio);
        Ok(())
    }
}

/// Make the driver known to `drivers`.
pub fn register_drivers(drivers: &DriverRegistry) {
    drivers.register_driver(FpgamgrGpioDriver);
}
