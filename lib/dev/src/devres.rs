//! Device-scoped resources.
//!
//! Every entry carries a release action. Entries are released in reverse order of
//! registration when the device is detached or its probe fails; a single entry can
//! also be released early, after which it is gone from the list for good.
use alloc::{boxed::Box, vec::Vec};
use core::fmt;

pub type DevresId = usize;

type Release = Box<dyn FnOnce() + Send>;

struct DevresEntry {
    id: DevresId,
    name: &'static str,
    release: Release,
}

#[derive(Default)]
pub struct Devres {
    entries: Vec<DevresEntry>,
    next_id: DevresId,
}

impl fmt::Debug for Devres {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.id, e.name)))
            .finish()
    }
}

impl Devres {
    pub const fn new() -> Devres {
        Devres {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, name: &'static str, release: impl FnOnce() + Send + 'static) -> DevresId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(DevresEntry {
            id,
            name,
            release: Box::new(release),
        });
        id
    }

    /// Detach entry `id` without running it; the caller decides when to release.
    pub fn remove(&mut self, id: DevresId) -> Option<Release> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx).release)
    }

    /// Take every entry, most recently added first.
    pub fn take_all(&mut self) -> Vec<(&'static str, Release)> {
        let mut entries = core::mem::take(&mut self.entries);
        entries.reverse();
        entries.into_iter().map(|e| (e.name, e.release)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }
}
