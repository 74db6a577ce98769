mod common;

use common::{FPGAMGR_GPIO_BASE, Window, platform, record_events};
use dev::{
    Device, DriverProbeError,
    gpio::{Direction, GpioError, GpioEvent},
    mmio::{IoRange, MmioError},
};
use gpio_fpgamgr::{FpgamgrGpio, PlatformData, PortKind, PortProperty, SetupState};

fn fpgamgr_device(pdata: PlatformData, len: usize) -> Device {
    Device::new("ff706010.gpio")
        .with_compatible("altr,fpgamgr-gpio")
        .with_resource(FPGAMGR_GPIO_BASE..FPGAMGR_GPIO_BASE + len)
        .with_platform_data(pdata)
}

fn ports(list: &[(&str, u32)]) -> PlatformData {
    PlatformData::new(
        list.iter()
            .map(|(name, idx)| PortProperty::new(name, *idx))
            .collect(),
    )
}

#[test]
fn two_ports_become_ready() {
    let window = Window::new();
    let platform = platform(&window);
    let dev = platform.register_device(fpgamgr_device(
        ports(&[("port0", 0), ("port1", 1)]),
        8,
    ));
    assert_eq!(platform.attach(&dev), Ok(true));

    let gpio = FpgamgrGpio::from_device(&dev).unwrap();
    assert_eq!(gpio.state(), SetupState::Ready);
    assert_eq!(gpio.nr_ports(), 2);
    assert!(gpio.device().unwrap().ptr_eq(&dev));
    let ports = gpio.ports();
    assert_eq!(ports.len(), 2);

    let port0 = &ports[0];
    assert_eq!(port0.idx(), 0);
    assert_eq!(port0.slot(), 0);
    assert_eq!(port0.kind(), PortKind::InOut);
    assert_eq!(port0.chip().dat_phys(), FPGAMGR_GPIO_BASE);
    assert_eq!(port0.chip().ngpio(), 32);
    assert!(port0.chip().can_output());
    assert!(port0.gpio().unwrap().ptr_eq(&gpio));
    port0.chip().direction_output(7, true).unwrap();
    assert_eq!(window.word(FPGAMGR_GPIO_BASE), 1 << 7);

    let port1 = &ports[1];
    assert_eq!(port1.slot(), 1);
    assert_eq!(port1.kind(), PortKind::InputOnly);
    assert_eq!(port1.chip().dat_phys(), FPGAMGR_GPIO_BASE + 4);
    assert_eq!(port1.chip().get_direction(0), Ok(Direction::Input));
    assert_eq!(port1.chip().direction_output(0, true), Err(GpioError::NotSupported));
    window.set_word(FPGAMGR_GPIO_BASE + 4, 0x8000_0001);
    assert!(port1.chip().get(31).unwrap());
    assert!(port1.chip().get(0).unwrap());
    assert!(!port1.chip().get(1).unwrap());

    assert_eq!(platform.gpio().len(), 2);
    assert!(platform.gpio().find_by_label("port1").is_some());
}

#[test]
fn single_port_list_is_ready() {
    let window = Window::new();
    let platform = platform(&window);
    let dev = platform.register_device(fpgamgr_device(ports(&[("only", 1)]), 8));
    assert_eq!(platform.attach(&dev), Ok(true));
    let gpio = FpgamgrGpio::from_device(&dev).unwrap();
    assert_eq!(gpio.ports().len(), 1);
    assert_eq!(gpio.ports()[0].chip().dat_phys(), FPGAMGR_GPIO_BASE + 4);
    assert_eq!(gpio.ports()[0].idx(), 1);
    assert_eq!(gpio.ports()[0].slot(), 0);
}

#[test]
fn empty_port_list_is_not_a_device() {
    let window = Window::new();
    let platform = platform(&window);
    let dev = platform.register_device(fpgamgr_device(ports(&[]), 8));
    assert_eq!(platform.attach(&dev), Ok(false));
    assert!(!dev.is_bound());
    assert_eq!(window.maps(), 0);
}

#[test]
fn missing_region_activates_nothing() {
    let window = Window::new();
    let platform = platform(&window);
    let events = record_events(&platform);
    let dev = platform.register_device(
        Device::new("fpgamgr")
            .with_compatible("altr,fpgamgr-gpio")
            .with_platform_data(ports(&[("port0", 0), ("port1", 1)])),
    );
    assert_eq!(
        platform.attach(&dev),
        Err(DriverProbeError::Mmio(MmioError::AddressNotSpecified))
    );
    assert!(events.lock().unwrap().is_empty());
    assert!(FpgamgrGpio::from_device(&dev).is_none());
}

#[test]
fn unmappable_region_activates_nothing() {
    let window = Window::new();
    let platform = platform(&window);
    let events = record_events(&platform);
    let dev = platform.register_device(
        Device::new("fpgamgr")
            .with_compatible("altr,fpgamgr-gpio")
            .with_resource(0x1000..0x1008)
            .with_platform_data(ports(&[("port0", 0)])),
    );
    assert_eq!(
        platform.attach(&dev),
        Err(DriverProbeError::Mmio(MmioError::InvalidAddress))
    );
    assert!(events.lock().unwrap().is_empty());
    assert!(!platform.claims().is_claimed(&IoRange::from(0x1000..0x1008)));
}

#[test]
fn registration_failure_rolls_back_newest_first() {
    let window = Window::new();
    let platform = platform(&window);
    let events = record_events(&platform);
    let dev = platform.register_device(fpgamgr_device(
        ports(&[("port0", 0), ("port1", 1), ("port0", 0), ("never", 1)]),
        8,
    ));
    assert_eq!(
        platform.attach(&dev),
        Err(DriverProbeError::Gpio(GpioError::LabelInUse { label: "port0".into() }))
    );

    let seen: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| match e {
            GpioEvent::Added { label, .. } => format!("+{label}"),
            GpioEvent::Removed { label, .. } => format!("-{label}"),
        })
        .collect();
    assert_eq!(seen, ["+port0", "+port1", "-port1", "-port0"]);
    assert!(platform.gpio().is_empty());
    assert!(!dev.is_bound());
    assert!(dev.devres_names().is_empty());
    assert_eq!(window.maps(), 1);
    assert_eq!(window.unmaps(), 1);
}

#[test]
fn init_failure_rolls_back_earlier_ports() {
    let window = Window::new();
    let platform = platform(&window);
    let events = record_events(&platform);
    // Only port 0's register is covered by the region.
    let dev = platform.register_device(fpgamgr_device(
        ports(&[("port0", 0), ("port1", 1)]),
        4,
    ));
    assert_eq!(
        platform.attach(&dev),
        Err(DriverProbeError::Gpio(GpioError::Mmio(MmioError::NotEnoughSpace)))
    );
    assert_eq!(
        *events.lock().unwrap(),
        [
            GpioEvent::Added { label: "port0".into(), base: 512, ngpio: 32 },
            GpioEvent::Removed { label: "port0".into(), base: 512 },
        ]
    );
}

#[test]
fn detach_after_failed_setup_is_a_no_op() {
    let window = Window::new();
    let platform = platform(&window);
    let events = record_events(&platform);
    let dev = platform.register_device(fpgamgr_device(
        ports(&[("port0", 0), ("port0", 1)]),
        8,
    ));
    assert!(platform.attach(&dev).is_err());
    let after_probe = events.lock().unwrap().len();
    assert_eq!(after_probe, 2);

    assert!(!platform.detach(&dev));
    assert!(!platform.detach(&dev));
    assert_eq!(events.lock().unwrap().len(), after_probe);
    assert_eq!(window.unmaps(), 1);
}

#[test]
fn detach_unregisters_every_port() {
    let window = Window::new();
    let platform = platform(&window);
    let dev = platform.register_device(fpgamgr_device(
        ports(&[("port0", 0), ("port1", 1)]),
        8,
    ));
    assert_eq!(platform.attach(&dev), Ok(true));
    let gpio = FpgamgrGpio::from_device(&dev).unwrap();
    assert_eq!(platform.attach(&dev), Err(DriverProbeError::Busy));

    assert!(platform.detach(&dev));
    assert!(platform.gpio().is_empty());
    assert!(FpgamgrGpio::from_device(&dev).is_none());
    assert_eq!(window.unmaps(), 1);
    assert!(gpio.ports().iter().all(|port| port.chip().base().is_none()));
    assert!(!platform.claims().is_claimed(&IoRange::from(
        FPGAMGR_GPIO_BASE..FPGAMGR_GPIO_BASE + 8
    )));

    // The device can be bound again once released.
    assert_eq!(platform.attach(&dev), Ok(true));
    assert_eq!(platform.gpio().len(), 2);
}

#[test]
fn other_compatibles_are_not_probed() {
    let window = Window::new();
    let platform = platform(&window);
    let dev = platform.register_device(
        Device::new("ff706000.gpio")
            .with_compatible("snps,dw-apb-gpio")
            .with_resource(FPGAMGR_GPIO_BASE..FPGAMGR_GPIO_BASE + 8)
            .with_platform_data(ports(&[("port0", 0)])),
    );
    assert_eq!(platform.attach(&dev), Ok(false));
    assert_eq!(window.maps(), 0);
    assert!(platform.gpio().is_empty());
}
