use crate::{error::PortError, gpio::FpgamgrGpio, pdata::PortProperty};
use dev::{
    Handle, HandleRef, PlatformDevice,
    gpio::{GpioChip, GpioError, GpioFlags},
    platform::DevmGpioChip,
};
use log::error;

/// What a port may do, fixed by its register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Index 0: lines can be read and driven.
    InOut,
    /// Index 1: lines can only be read.
    InputOnly,
}

impl PortKind {
    pub fn for_index(idx: u32) -> PortKind {
        if idx == 0 {
            PortKind::InOut
        } else {
            PortKind::InputOnly
        }
    }

    fn flags(self) -> GpioFlags {
        match self {
            PortKind::InOut => GpioFlags::empty(),
            PortKind::InputOnly => GpioFlags::NO_OUTPUT,
        }
    }
}

/// A live port: one registered chip over one 32-bit data register.
#[derive(Debug)]
pub struct FpgamgrGpioPort {
    chip: DevmGpioChip,
    gpio: HandleRef<FpgamgrGpio>,
    idx: u32,
    slot: usize,
    kind: PortKind,
}

impl FpgamgrGpioPort {
    /// Bytes per data register.
    pub const WIDTH: usize = 4;

    /// Set up and register the chip for `pp`, the port at position `slot` of the list.
    pub(crate) fn activate(
        gpio: &Handle<FpgamgrGpio>,
        pdev: &PlatformDevice,
        pp: &PortProperty,
        slot: usize,
    ) -> Result<FpgamgrGpioPort, PortError> {
        let kind = PortKind::for_index(pp.idx);
        let mut chip = gpio
            .regs()
            .window(pp.idx as usize * Self::WIDTH, Self::WIDTH)
            .map_err(GpioError::from)
            .and_then(|dat| GpioChip::new(&pp.name, Self::WIDTH, dat, kind.flags()))
            .map_err(|err| {
                error!("{}: failed to init gpio chip for {}", pdev.name, pp.name);
                PortError::Init(err)
            })?;

        chip.of_node = pp.node.clone();

        let chip = pdev.devm_gpiochip_add(chip).map_err(|err| {
            error!("{}: failed to register gpiochip for {}", pdev.name, pp.name);
            PortError::Register(err)
        })?;
        dev::debug_ex!("\t{}: port {} ({}) registered.", pdev.name, pp.idx, pp.name);

        Ok(FpgamgrGpioPort {
            chip,
            gpio: gpio.create_ref(),
            idx: pp.idx,
            slot,
            kind,
        })
    }

    /// Unregister the chip ahead of detach.
    pub(crate) fn deactivate(self, pdev: &PlatformDevice) {
        if !pdev.devm_gpiochip_remove(&self.chip) {
            log::warn!("{}: gpiochip {} already released", pdev.name, self.chip.label());
        }
    }

    pub fn chip(&self) -> &Handle<GpioChip> {
        self.chip.chip()
    }

    /// The manager owning this port, while it is alive.
    pub fn gpio(&self) -> Option<Handle<FpgamgrGpio>> {
        self.gpio.get_handle()
    }

    pub fn idx(&self) -> u32 {
        self.idx
    }

    /// Position in the port list the manager was set up with.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }
}
