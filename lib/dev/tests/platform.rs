use dev::{
    Device, Driver, DriverProbeError, Handle, Platform, PlatformDevice,
    gpio::{GpioChip, GpioEvent, GpioFlags},
    mmio::{IoMapper, IoMem, IoRange, MmioError},
};
use dt::{DeviceTree, fdt::builder::FdtBuilder};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

const WINDOW_BASE: usize = 0x1000_0000;

/// Serves physical addresses `WINDOW_BASE..WINDOW_BASE + 64` from ordinary memory.
struct Window {
    mem: Mutex<Box<[u32; 16]>>,
    unmapped: AtomicUsize,
}

impl Window {
    fn new() -> Arc<Window> {
        Arc::new(Window {
            mem: Mutex::new(Box::new([0; 16])),
            unmapped: AtomicUsize::new(0),
        })
    }
}

impl IoMapper for Window {
    fn map(&self, range: &IoRange) -> Result<IoMem, MmioError> {
        if range.start < WINDOW_BASE || range.end > WINDOW_BASE + 64 {
            return Err(MmioError::InvalidAddress);
        }
        let base = self.mem.lock().unwrap().as_mut_ptr() as *mut u8;
        unsafe { IoMem::new(base.add(range.start - WINDOW_BASE), range.len(), range.start) }
    }

    fn unmap(&self, _mem: &IoMem) {
        self.unmapped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registers one output chip over the first word of resource 0.
#[derive(Debug)]
struct OneChip;

impl Driver for OneChip {
    fn get_name(&self) -> &'static str {
        "one-chip"
    }

    fn get_comp_strs(&self) -> &'static [&'static str] {
        &["test,one-chip"]
    }

    fn probe(&self, pdev: &PlatformDevice) -> Result<(), DriverProbeError> {
        let regs = pdev.devm_ioremap_resource(pdev.get_resource(0))?;
        let mut chip = GpioChip::new(&pdev.name, 4, regs.window(0, 4)?, GpioFlags::empty())?;
        chip.of_node = pdev.of_node().cloned();
        let chip = pdev.devm_gpiochip_add(chip)?;
        pdev.set_drvdata(chip);
        Ok(())
    }
}

fn platform(window: &Arc<Window>) -> Platform {
    let platform = Platform::new(window.clone());
    platform.drivers().register_driver(OneChip);
    platform
}

#[test]
fn detach_releases_chip_and_mapping() {
    let window = Window::new();
    let platform = platform(&window);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    platform
        .gpio()
        .subscribe(move |e| sink.lock().unwrap().push(e.clone()));

    let dev = platform.register_device(
        Device::new("chip0")
            .with_compatible("test,one-chip")
            .with_resource(WINDOW_BASE..WINDOW_BASE + 8),
    );
    assert_eq!(platform.attach(&dev), Ok(true));
    assert_eq!(dev.devres_names(), ["ioremap", "gpiochip"]);
    let chip = platform.gpio().find_by_label("chip0").unwrap();
    chip.set(4, true).unwrap();
    assert_eq!(window.mem.lock().unwrap()[0], 1 << 4);
    assert_eq!(platform.attach(&dev), Err(DriverProbeError::Busy));

    assert!(platform.detach(&dev));
    assert!(!platform.detach(&dev));
    assert!(platform.gpio().is_empty());
    assert_eq!(window.unmapped.load(Ordering::SeqCst), 1);
    assert!(!platform.claims().is_claimed(&IoRange::from(WINDOW_BASE..WINDOW_BASE + 8)));
    assert_eq!(
        *events.lock().unwrap(),
        [
            GpioEvent::Added { label: "chip0".into(), base: 512, ngpio: 32 },
            GpioEvent::Removed { label: "chip0".into(), base: 512 },
        ]
    );
}

#[test]
fn overlapping_region_is_busy() {
    let window = Window::new();
    let platform = platform(&window);
    let first = platform.add_device(
        Device::new("a")
            .with_compatible("test,one-chip")
            .with_resource(WINDOW_BASE..WINDOW_BASE + 8),
    );
    assert!(first.is_bound());
    let second = platform.register_device(
        Device::new("b")
            .with_compatible("test,one-chip")
            .with_resource(WINDOW_BASE + 4..WINDOW_BASE + 12),
    );
    assert_eq!(platform.attach(&second), Err(DriverProbeError::Mmio(MmioError::Busy)));
    assert!(second.devres_names().is_empty());
    assert_eq!(platform.gpio().len(), 1);
}

#[test]
fn missing_resource_is_reported() {
    let window = Window::new();
    let platform = platform(&window);
    let dev = platform.register_device(Device::new("bare").with_compatible("test,one-chip"));
    assert_eq!(
        platform.attach(&dev),
        Err(DriverProbeError::Mmio(MmioError::AddressNotSpecified))
    );
}

#[test]
fn populate_walks_buses_and_skips_disabled_nodes() {
    let mut b = FdtBuilder::new();
    b.begin_node("")
        .property_u32("#address-cells", 1)
        .property_u32("#size-cells", 1)
        .begin_node("soc")
        .property_u32("#address-cells", 1)
        .property_u32("#size-cells", 1)
        .property_strlist("compatible", &["simple-bus"])
        .begin_node("chip@10000000")
        .property_str("compatible", "test,one-chip")
        .property_cells("reg", &[WINDOW_BASE as u32, 8])
        .end_node()
        .begin_node("chip@10000010")
        .property_str("compatible", "test,one-chip")
        .property_cells("reg", &[WINDOW_BASE as u32 + 0x10, 8])
        .property_str("status", "disabled")
        .end_node()
        .end_node()
        .begin_node("aliases")
        .property_str("chip0", "/soc/chip@10000000")
        .end_node()
        .end_node();
    let tree = Handle::from(DeviceTree::from_fdt(&b.finish().unwrap()).unwrap());

    let window = Window::new();
    let platform = platform(&window);
    let created = platform.populate(tree);
    let names: Vec<&str> = created.iter().map(|d| d.name.as_ref()).collect();
    assert_eq!(names, ["soc", "10000000.chip"]);

    let dev = platform.find_device("10000000.chip").unwrap();
    assert!(dev.is_bound());
    let node = dev.of_node.clone().unwrap();
    let chip = platform.gpio().find_by_of_node(&node).unwrap();
    assert_eq!(chip.dat_phys(), WINDOW_BASE);
    assert!(platform.remove_device(&dev));
    assert!(platform.gpio().find_by_of_node(&node).is_none());
}
