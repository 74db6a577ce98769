#![allow(dead_code)]

use dev::{
    Handle, Platform,
    gpio::GpioEvent,
    mmio::{IoMapper, IoMem, IoRange, MmioError},
};
use dt::{DeviceTree, fdt::builder::FdtBuilder};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Physical address of the fpgamgr GPIO registers on Cyclone V.
pub const FPGAMGR_GPIO_BASE: usize = 0xff70_6010;
pub const FPGAMGR_GPIO_PATH: &str = "/soc/gpio@ff706010";

const WINDOW_BASE: usize = 0xff70_6000;
const WINDOW_WORDS: usize = 64;

/// Serves a small range of physical addresses around the fpgamgr block from memory.
pub struct Window {
    mem: Mutex<Box<[u32; WINDOW_WORDS]>>,
    pub maps: AtomicUsize,
    pub unmaps: AtomicUsize,
}

impl Window {
    pub fn new() -> Arc<Window> {
        Arc::new(Window {
            mem: Mutex::new(Box::new([0; WINDOW_WORDS])),
            maps: AtomicUsize::new(0),
            unmaps: AtomicUsize::new(0),
        })
    }

    /// The word at physical address `phys`.
    pub fn word(&self, phys: usize) -> u32 {
        self.mem.lock().unwrap()[(phys - WINDOW_BASE) / 4]
    }

    pub fn set_word(&self, phys: usize, value: u32) {
        self.mem.lock().unwrap()[(phys - WINDOW_BASE) / 4] = value;
    }

    pub fn maps(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn unmaps(&self) -> usize {
        self.unmaps.load(Ordering::SeqCst)
    }
}

impl IoMapper for Window {
    fn map(&self, range: &IoRange) -> Result<IoMem, MmioError> {
        if range.start < WINDOW_BASE || range.end > WINDOW_BASE + WINDOW_WORDS * 4 {
            return Err(MmioError::InvalidAddress);
        }
        self.maps.fetch_add(1, Ordering::SeqCst);
        let base = self.mem.lock().unwrap().as_mut_ptr() as *mut u8;
        unsafe { IoMem::new(base.add(range.start - WINDOW_BASE), range.len(), range.start) }
    }

    fn unmap(&self, _mem: &IoMem) {
        self.unmaps.fetch_add(1, Ordering::SeqCst);
    }
}

/// A platform with the fpgamgr driver registered, backed by `window`.
pub fn platform(window: &Arc<Window>) -> Platform {
    let platform = Platform::new(window.clone());
    gpio_fpgamgr::register_drivers(platform.drivers());
    platform
}

/// Every chip add and remove seen by `platform`, in order.
pub fn record_events(platform: &Platform) -> Arc<Mutex<Vec<GpioEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    platform
        .gpio()
        .subscribe(move |e| sink.lock().unwrap().push(e.clone()));
    events
}

/// A SoCFPGA-like tree whose fpgamgr node has one child per `(name, reg)` entry.
pub fn socfpga_tree(ports: &[(&str, Option<u32>)]) -> Handle<DeviceTree> {
    multi_block_tree(&[(FPGAMGR_GPIO_BASE, ports)])
}

/// A SoCFPGA-like tree with one fpgamgr node per `(base, ports)` entry, each 8 bytes long.
pub fn multi_block_tree(blocks: &[(usize, &[(&str, Option<u32>)])]) -> Handle<DeviceTree> {
    let mut b = FdtBuilder::new();
    b.begin_node("")
        .property_u32("#address-cells", 1)
        .property_u32("#size-cells", 1)
        .property_str("model", "Altera SOCFPGA Cyclone V")
        .begin_node("soc")
        .property_u32("#address-cells", 1)
        .property_u32("#size-cells", 1)
        .property_strlist("compatible", &["simple-bus"]);
    for (base, ports) in blocks {
        b.begin_node(&format!("gpio@{base:x}"))
            .property_str("compatible", "altr,fpgamgr-gpio")
            .property_cells("reg", &[*base as u32, 8])
            .property_u32("#address-cells", 1)
            .property_u32("#size-cells", 0);
        for (name, reg) in ports.iter() {
            b.begin_node(name);
            if let Some(reg) = reg {
                b.property_u32("reg", *reg);
            }
            b.property_empty("gpio-controller")
                .property_u32("#gpio-cells", 2)
                .end_node();
        }
        b.end_node();
    }
    b.end_node().end_node();
    Handle::from(DeviceTree::from_fdt(&b.finish().unwrap()).unwrap())
}

/// The two ports of the Cyclone V reference tree.
pub fn reference_tree() -> Handle<DeviceTree> {
    socfpga_tree(&[("gpio@0", Some(0)), ("gpio@1", Some(1))])
}
