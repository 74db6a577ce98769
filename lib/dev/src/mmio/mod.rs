//! Memory-mapped I/O: physical ranges, mapped windows and region ownership.
use alloc::vec::Vec;
use core::{fmt::Debug, ops::Range, ptr::NonNull};
use spin::Mutex;
use utils::impl_basic;

pub mod reg;

use reg::Register;

/// A physical address range, usually one entry of a device's `reg`.
pub struct IoRange {
    inner: Range<usize>,
}

impl_basic!(IoRange, Range<usize>);

impl IoRange {
    pub fn overlaps(&self, other: &Range<usize>) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Clone for IoRange {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl PartialEq for IoRange {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Debug for IoRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("[{:#x},{:#x})", self.start, self.end))
    }
}

/// MMIO-related failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MmioError {
    /// MMIO space is not enough.
    #[error("MMIO space is not enough")]
    NotEnoughSpace,
    /// MMIO address is invalid, misaligned or out of supported range.
    #[error("invalid MMIO address")]
    InvalidAddress,
    /// Device did not specify MMIO resources.
    #[error("MMIO address not specified")]
    AddressNotSpecified,
    /// The region is already claimed by another mapping.
    #[error("MMIO region busy")]
    Busy,
}

/// A mapped window of device memory.
///
/// Windows created by [IoMem::window] alias their parent; accesses go through
/// [Register] so aliasing is fine.
#[derive(Clone)]
pub struct IoMem {
    base: NonNull<u8>,
    len: usize,
    phys: usize,
}

unsafe impl Send for IoMem {}
unsafe impl Sync for IoMem {}

impl Debug for IoMem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "IoMem[{:#x},{:#x})",
            self.phys,
            self.phys + self.len
        ))
    }
}

impl IoMem {
    /// Wrap `len` bytes of mapped memory at `base` that back physical address `phys`.
    ///
    /// # Safety
    /// `base..base+len` must stay valid for volatile access for the lifetime of the
    /// returned value and every window derived from it.
    pub unsafe fn new(base: *mut u8, len: usize, phys: usize) -> Result<IoMem, MmioError> {
        let base = NonNull::new(base).ok_or(MmioError::InvalidAddress)?;
        Ok(IoMem { base, len, phys })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical address backing offset 0.
    pub fn phys(&self) -> usize {
        self.phys
    }

    /// Sub-window `[offset, offset + len)`; must lie inside this window.
    pub fn window(&self, offset: usize, len: usize) -> Result<IoMem, MmioError> {
        let end = offset.checked_add(len).ok_or(MmioError::InvalidAddress)?;
        if end > self.len {
            return Err(MmioError::NotEnoughSpace);
        }
        Ok(IoMem {
            base: unsafe { self.base.add(offset) },
            len,
            phys: self.phys + offset,
        })
    }

    /// Typed register at `offset`, which must be naturally aligned and in bounds.
    pub fn reg<T: Sized + Copy>(&self, offset: usize) -> Result<&Register<T>, MmioError> {
        let size = size_of::<T>();
        let end = offset.checked_add(size).ok_or(MmioError::InvalidAddress)?;
        if end > self.len {
            return Err(MmioError::NotEnoughSpace);
        }
        let ptr = unsafe { self.base.add(offset) };
        if ptr.as_ptr() as usize % align_of::<T>() != 0 {
            return Err(MmioError::InvalidAddress);
        }
        Ok(unsafe { &*(ptr.as_ptr() as *const Register<T>) })
    }

    pub fn read32(&self, offset: usize) -> Result<u32, MmioError> {
        Ok(self.reg::<u32>(offset)?.read())
    }

    pub fn write32(&self, offset: usize, value: u32) -> Result<(), MmioError> {
        self.reg::<u32>(offset)?.write(value);
        Ok(())
    }
}

/// Maps physical ranges into accessible memory.
pub trait IoMapper: Send + Sync {
    fn map(&self, range: &IoRange) -> Result<IoMem, MmioError>;
    fn unmap(&self, _mem: &IoMem) {}
}

/// Mapper for address spaces where physical addresses are directly accessible.
pub struct IdentityMapper {
    _private: (),
}

impl IdentityMapper {
    /// # Safety
    /// Every range handed to [IoMapper::map] must be valid, accessible memory for as
    /// long as the mapping is in use.
    pub const unsafe fn new() -> IdentityMapper {
        IdentityMapper { _private: () }
    }
}

impl IoMapper for IdentityMapper {
    fn map(&self, range: &IoRange) -> Result<IoMem, MmioError> {
        if range.is_empty() {
            return Err(MmioError::NotEnoughSpace);
        }
        unsafe { IoMem::new(range.start as *mut u8, range.len(), range.start) }
    }
}

/// Tracks which physical ranges are owned by a live mapping.
pub struct IoRegionClaims {
    claimed: Mutex<Vec<Range<usize>>>,
}

impl Default for IoRegionClaims {
    fn default() -> Self {
        Self::new()
    }
}

impl IoRegionClaims {
    pub const fn new() -> IoRegionClaims {
        IoRegionClaims {
            claimed: Mutex::new(Vec::new()),
        }
    }

    /// Claim `range` exclusively; [MmioError::Busy] if it overlaps a claimed one.
    pub fn claim(&self, range: &IoRange) -> Result<(), MmioError> {
        let mut guard = self.claimed.lock();
        if guard.iter().any(|claimed| range.overlaps(claimed)) {
            return Err(MmioError::Busy);
        }
        guard.push(range.inner.clone());
        Ok(())
    }

    pub fn release(&self, range: &IoRange) -> bool {
        let mut guard = self.claimed.lock();
        match guard.iter().position(|claimed| *claimed == range.inner) {
            Some(idx) => {
                guard.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_claimed(&self, range: &IoRange) -> bool {
        self.claimed.lock().iter().any(|claimed| range.overlaps(claimed))
    }
}
