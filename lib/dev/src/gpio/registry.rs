//! Live GPIO chips and the global line numbers they occupy.
//!
//! Chips get the lowest free range of line numbers at or above [GpioChipRegistry::DYNAMIC_BASE].
//! Labels are unique among live chips. Listeners see every add and remove, in order.
use crate::{
    debug_ex,
    device::OfNode,
    gpio::{GpioChip, GpioError},
    handle::Handle,
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, vec::Vec};
use spin::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioEvent {
    Added { label: Box<str>, base: u32, ngpio: u32 },
    Removed { label: Box<str>, base: u32 },
}

type Listener = Box<dyn Fn(&GpioEvent) + Send + Sync>;

pub struct GpioChipRegistry {
    /// Keyed by base line number.
    chips: RwLock<BTreeMap<u32, Handle<GpioChip>>>,
    listeners: RwLock<Vec<Listener>>,
}

impl Default for GpioChipRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioChipRegistry {
    pub const DYNAMIC_BASE: u32 = 512;
    pub const MAX_LINES: u32 = 1024;

    pub const fn new() -> GpioChipRegistry {
        GpioChipRegistry {
            chips: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&GpioEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    fn notify(&self, event: GpioEvent) {
        for listener in self.listeners.read().iter() {
            listener(&event);
        }
    }

    fn find_base(chips: &BTreeMap<u32, Handle<GpioChip>>, ngpio: u32) -> Option<u32> {
        let mut base = Self::DYNAMIC_BASE;
        for (start, chip) in chips.range(Self::DYNAMIC_BASE..) {
            if base + ngpio <= *start {
                break;
            }
            base = base.max(start + chip.ngpio());
        }
        (base + ngpio <= Self::DYNAMIC_BASE + Self::MAX_LINES).then_some(base)
    }

    /// Make `chip` live and assign its line numbers.
    pub fn add(&self, chip: GpioChip) -> Result<Handle<GpioChip>, GpioError> {
        let (base, handle) = {
            let mut guard = self.chips.write();
            if guard.values().any(|c| c.label() == chip.label()) {
                return Err(GpioError::LabelInUse {
                    label: Box::from(chip.label()),
                });
            }
            let base = Self::find_base(&guard, chip.ngpio()).ok_or(GpioError::BaseExhausted {
                ngpio: chip.ngpio(),
            })?;
            chip.set_base(Some(base));
            let handle = Handle::from(chip);
            guard.insert(base, handle.clone());
            (base, handle)
        };
        debug_ex!(
            "\tRegistered gpiochip '{}', lines {}..{}.",
            handle.label(),
            base,
            base + handle.ngpio()
        );
        self.notify(GpioEvent::Added {
            label: Box::from(handle.label()),
            base,
            ngpio: handle.ngpio(),
        });
        Ok(handle)
    }

    pub fn remove(&self, chip: &Handle<GpioChip>) -> Result<(), GpioError> {
        let base = {
            let mut guard = self.chips.write();
            let base = guard
                .iter()
                .find(|(_, c)| c.ptr_eq(chip))
                .map(|(base, _)| *base)
                .ok_or(GpioError::NotRegistered)?;
            guard.remove(&base);
            chip.set_base(None);
            base
        };
        debug_ex!("\tRemoved gpiochip '{}'.", chip.label());
        self.notify(GpioEvent::Removed {
            label: Box::from(chip.label()),
            base,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.read().is_empty()
    }

    pub fn contains(&self, chip: &Handle<GpioChip>) -> bool {
        self.chips.read().values().any(|c| c.ptr_eq(chip))
    }

    pub fn find_by_label(&self, label: &str) -> Option<Handle<GpioChip>> {
        self.chips
            .read()
            .values()
            .find(|c| c.label() == label)
            .cloned()
    }

    /// The chip registered for device tree node `node`.
    pub fn find_by_of_node(&self, node: &OfNode) -> Option<Handle<GpioChip>> {
        self.chips
            .read()
            .values()
            .find(|c| c.of_node.as_ref() == Some(node))
            .cloned()
    }

    /// The chip owning global line `gpio`, with the line's offset inside it.
    pub fn find_by_line(&self, gpio: u32) -> Option<(Handle<GpioChip>, u32)> {
        let guard = self.chips.read();
        let (base, chip) = guard.range(..=gpio).next_back()?;
        (gpio < base + chip.ngpio()).then(|| (chip.clone(), gpio - base))
    }
}
