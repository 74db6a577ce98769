//! Devices as seen by drivers: identity, resources and per-device state.
use crate::{
    devres::{Devres, DevresId},
    driver::Driver,
    handle::Handle,
    mmio::IoRange,
};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{any::Any, fmt, ops::Range};
use dt::{DeviceTree, Node, PropertyError};
use spin::Mutex;

/// A reference to one node of a shared device tree.
#[derive(Clone)]
pub struct OfNode {
    tree: Handle<DeviceTree>,
    node_id: usize,
}

impl OfNode {
    pub fn new(tree: Handle<DeviceTree>, node_id: usize) -> Option<OfNode> {
        tree.get_node_by_id(node_id)?;
        Some(OfNode { tree, node_id })
    }

    pub fn from_path(tree: Handle<DeviceTree>, path: &str) -> Option<OfNode> {
        let node_id = tree.get_node(path)?.node_id;
        Some(OfNode { tree, node_id })
    }

    pub fn tree(&self) -> &DeviceTree {
        &self.tree
    }

    pub fn node(&self) -> &Node {
        &self.tree.container[self.node_id]
    }

    pub fn full_name(&self) -> &str {
        &self.node().full_name
    }

    pub fn full_path(&self) -> Box<str> {
        self.tree.get_full_path(self.node())
    }

    pub fn children(&self) -> impl Iterator<Item = OfNode> + '_ {
        self.node().children.iter().map(|id| OfNode {
            tree: self.tree.clone(),
            node_id: *id,
        })
    }

    pub fn child_count(&self) -> usize {
        self.tree.child_count(self.node())
    }

    pub fn read_u32(&self, name: &str) -> Result<u32, PropertyError> {
        self.tree.read_u32(self.node(), name)
    }

    pub fn compatible(&self) -> Vec<&str> {
        self.tree.get_compatible(self.node())
    }

    pub fn is_compatible(&self, comp: &str) -> bool {
        self.tree.is_compatible(self.node(), comp)
    }

    pub fn reg(&self) -> Result<Vec<Range<usize>>, PropertyError> {
        self.tree.get_reg_value(self.node())
    }

    /// `status` absent, `"okay"` or `"ok"`.
    pub fn is_available(&self) -> bool {
        match self.tree.get_property(self.node(), "status") {
            None => true,
            Some(prop) => matches!(prop.value_as_str(), Ok("okay") | Ok("ok")),
        }
    }
}

impl PartialEq for OfNode {
    fn eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree) && self.node_id == other.node_id
    }
}

impl fmt::Debug for OfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

#[derive(Default)]
struct DeviceState {
    driver: Option<Arc<dyn Driver>>,
    drvdata: Option<Box<dyn Any + Send + Sync>>,
    devres: Devres,
}

pub struct Device {
    pub name: Box<str>,
    pub compatible: Vec<Box<str>>,
    pub of_node: Option<OfNode>,
    pub resources: Vec<IoRange>,
    platform_data: Option<Box<dyn Any + Send + Sync>>,
    /// Serialises probe and remove.
    pub(crate) lifecycle: Mutex<()>,
    state: Mutex<DeviceState>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("compatible", &self.compatible)
            .field("of_node", &self.of_node)
            .field("resources", &self.resources)
            .finish()
    }
}

impl Device {
    pub fn new(name: impl AsRef<str>) -> Device {
        Device {
            name: Box::from(name.as_ref()),
            compatible: Vec::new(),
            of_node: None,
            resources: Vec::new(),
            platform_data: None,
            lifecycle: Mutex::new(()),
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub fn with_compatible(mut self, comp: impl AsRef<str>) -> Device {
        self.compatible.push(Box::from(comp.as_ref()));
        self
    }

    pub fn with_resource(mut self, range: Range<usize>) -> Device {
        self.resources.push(IoRange::from(range));
        self
    }

    /// Bind to a device tree node, taking compatible strings and `reg` ranges from it.
    pub fn with_of_node(mut self, node: OfNode) -> Device {
        for comp in node.compatible() {
            self.compatible.push(Box::from(comp));
        }
        if let Ok(ranges) = node.reg() {
            self.resources
                .extend(ranges.into_iter().filter(|r| !r.is_empty()).map(IoRange::from));
        }
        self.of_node = Some(node);
        self
    }

    /// Attach host-prepared configuration; drivers prefer it over device tree discovery.
    pub fn with_platform_data<T: Any + Send + Sync>(mut self, data: T) -> Device {
        self.platform_data = Some(Box::new(data));
        self
    }

    pub fn platform_data<T: Any>(&self) -> Option<&T> {
        self.platform_data.as_deref()?.downcast_ref::<T>()
    }

    pub fn has_platform_data(&self) -> bool {
        self.platform_data.is_some()
    }

    pub fn is_compatible(&self, comp: &str) -> bool {
        self.compatible.iter().any(|c| c.as_ref() == comp)
    }

    pub fn set_drvdata<T: Any + Send + Sync>(&self, data: T) {
        self.state.lock().drvdata = Some(Box::new(data));
    }

    /// A copy of the driver data, if it is a `T`.
    pub fn drvdata<T: Any + Clone>(&self) -> Option<T> {
        self.state.lock().drvdata.as_deref()?.downcast_ref::<T>().cloned()
    }

    pub(crate) fn take_drvdata(&self) -> Option<Box<dyn Any + Send + Sync>> {
        self.state.lock().drvdata.take()
    }

    pub fn driver(&self) -> Option<Arc<dyn Driver>> {
        self.state.lock().driver.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().driver.is_some()
    }

    pub(crate) fn bind(&self, driver: Arc<dyn Driver>) {
        self.state.lock().driver = Some(driver);
    }

    pub(crate) fn unbind(&self) -> Option<Arc<dyn Driver>> {
        self.state.lock().driver.take()
    }

    pub fn devres_add(
        &self,
        name: &'static str,
        release: impl FnOnce() + Send + 'static,
    ) -> DevresId {
        self.state.lock().devres.add(name, release)
    }

    /// Release a single entry now. `false` if it was already gone.
    pub fn devres_release(&self, id: DevresId) -> bool {
        let release = self.state.lock().devres.remove(id);
        match release {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    /// Release every entry, newest first. Returns how many ran.
    pub fn devres_release_all(&self) -> usize {
        let entries = self.state.lock().devres.take_all();
        let count = entries.len();
        for (name, release) in entries {
            crate::debug_ex!("\t{}: releasing '{}'.", self.name, name);
            release();
        }
        count
    }

    pub fn devres_names(&self) -> Vec<&'static str> {
        self.state.lock().devres.names()
    }
}
