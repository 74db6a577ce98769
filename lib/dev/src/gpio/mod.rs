//! Generic memory-mapped GPIO chips.
//!
//! A [GpioChip] drives up to `8 * size` lines through one data register: reading the
//! register samples the lines, writing it drives them. There are no separate set, clear or
//! direction registers, so direction is a property of the chip as a whole: a chip created
//! with [GpioFlags::NO_OUTPUT] is input-only, otherwise every line can be driven.
//!
//! Output writes go through a shadow copy of the data register, guarded per chip, so
//! concurrent `set` calls on one chip do not lose each other's bits.
use crate::{
    device::OfNode,
    mmio::{IoMem, MmioError},
};
use alloc::boxed::Box;
use bitflags::bitflags;
use spin::Mutex;

pub mod registry;

pub use registry::{GpioChipRegistry, GpioEvent};

bitflags! {
    /// Construction flags for [GpioChip].
    pub struct GpioFlags: u32 {
        /// The data register is big endian.
        const BIG_ENDIAN = 1 << 0;
        /// The chip cannot drive any line.
        const NO_OUTPUT  = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpioError {
    #[error("unsupported register width {size}")]
    InvalidWidth { size: usize },
    #[error("data register: {0}")]
    Mmio(#[from] MmioError),
    #[error("line {line} out of range (chip has {ngpio})")]
    InvalidLine { line: u32, ngpio: u32 },
    #[error("operation not supported by this chip")]
    NotSupported,
    #[error("a chip labelled '{label}' is already registered")]
    LabelInUse { label: Box<str> },
    #[error("chip is not registered")]
    NotRegistered,
    #[error("no free GPIO number range for {ngpio} lines")]
    BaseExhausted { ngpio: u32 },
}

pub struct GpioChip {
    label: Box<str>,
    size: usize,
    ngpio: u32,
    dat: IoMem,
    flags: GpioFlags,
    pub of_node: Option<OfNode>,
    shadow: Mutex<u32>,
    base: Mutex<Option<u32>>,
}

impl core::fmt::Debug for GpioChip {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpioChip")
            .field("label", &self.label)
            .field("ngpio", &self.ngpio)
            .field("dat", &self.dat)
            .field("flags", &self.flags)
            .field("base", &*self.base.lock())
            .finish()
    }
}

impl GpioChip {
    /// Set up a chip over the `size`-byte data register at the start of `dat`.
    ///
    /// Fails if `size` is not 1, 2 or 4, or if `dat` cannot hold a naturally aligned
    /// register of that size.
    pub fn new(
        label: impl AsRef<str>,
        size: usize,
        dat: IoMem,
        flags: GpioFlags,
    ) -> Result<GpioChip, GpioError> {
        if !matches!(size, 1 | 2 | 4) {
            return Err(GpioError::InvalidWidth { size });
        }
        let mut chip = GpioChip {
            label: Box::from(label.as_ref()),
            size,
            ngpio: (size * 8) as u32,
            dat,
            flags,
            of_node: None,
            shadow: Mutex::new(0),
            base: Mutex::new(None),
        };
        let initial = chip.read_dat()?;
        *chip.shadow.get_mut() = initial;
        Ok(chip)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ngpio(&self) -> u32 {
        self.ngpio
    }

    pub fn flags(&self) -> GpioFlags {
        self.flags
    }

    /// Physical address of the data register.
    pub fn dat_phys(&self) -> usize {
        self.dat.phys()
    }

    /// First global line number, once registered.
    pub fn base(&self) -> Option<u32> {
        *self.base.lock()
    }

    pub(crate) fn set_base(&self, base: Option<u32>) {
        *self.base.lock() = base;
    }

    pub fn can_output(&self) -> bool {
        !self.flags.contains(GpioFlags::NO_OUTPUT)
    }

    fn read_dat(&self) -> Result<u32, GpioError> {
        let be = self.flags.contains(GpioFlags::BIG_ENDIAN);
        let value = match self.size {
            1 => u32::from(self.dat.reg::<u8>(0)?.read()),
            2 => {
                let raw = self.dat.reg::<u16>(0)?.read();
                u32::from(if be { u16::from_be(raw) } else { u16::from_le(raw) })
            }
            _ => {
                let raw = self.dat.reg::<u32>(0)?.read();
                if be { u32::from_be(raw) } else { u32::from_le(raw) }
            }
        };
        Ok(value)
    }

    fn write_dat(&self, value: u32) -> Result<(), GpioError> {
        let be = self.flags.contains(GpioFlags::BIG_ENDIAN);
        match self.size {
            1 => self.dat.reg::<u8>(0)?.write(value as u8),
            2 => {
                let value = value as u16;
                self.dat
                    .reg::<u16>(0)?
                    .write(if be { value.to_be() } else { value.to_le() })
            }
            _ => self
                .dat
                .reg::<u32>(0)?
                .write(if be { value.to_be() } else { value.to_le() }),
        }
        Ok(())
    }

    fn mask(&self, line: u32) -> Result<u32, GpioError> {
        if line >= self.ngpio {
            return Err(GpioError::InvalidLine {
                line,
                ngpio: self.ngpio,
            });
        }
        Ok(1 << line)
    }

    pub fn get(&self, line: u32) -> Result<bool, GpioError> {
        let mask = self.mask(line)?;
        Ok((self.read_dat()? & mask) != 0)
    }

    /// Lines in `mask` as sampled now.
    pub fn get_multiple(&self, mask: u32) -> Result<u32, GpioError> {
        Ok(self.read_dat()? & mask)
    }

    /// Drive `line`; ignored on input-only chips.
    pub fn set(&self, line: u32, value: bool) -> Result<(), GpioError> {
        let mask = self.mask(line)?;
        self.set_multiple(mask, if value { mask } else { 0 })
    }

    /// Drive the lines in `mask` to the matching bits of `bits`.
    pub fn set_multiple(&self, mask: u32, bits: u32) -> Result<(), GpioError> {
        if !self.can_output() {
            return Ok(());
        }
        let mut shadow = self.shadow.lock();
        let next = (*shadow & !mask) | (bits & mask);
        self.write_dat(next)?;
        *shadow = next;
        Ok(())
    }

    pub fn get_direction(&self, line: u32) -> Result<Direction, GpioError> {
        self.mask(line)?;
        Ok(if self.can_output() {
            Direction::Output
        } else {
            Direction::Input
        })
    }

    pub fn direction_input(&self, line: u32) -> Result<(), GpioError> {
        self.mask(line)?;
        Ok(())
    }

    pub fn direction_output(&self, line: u32, value: bool) -> Result<(), GpioError> {
        if !self.can_output() {
            return Err(GpioError::NotSupported);
        }
        self.set(line, value)
    }
}
