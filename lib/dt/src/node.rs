use crate::prop::{Property, PropertyError};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, string::String, vec, vec::Vec};
use core::ops::Range;

pub struct DeviceTree {
    pub root_id: usize,
    pub container: Vec<Node>,
    pub mem_rsv_map: Vec<Range<usize>>,
    pub phandle_map: BTreeMap<usize, Box<str>>,
}

pub struct Node {
    pub node_id: usize,
    pub parent_id: usize,
    pub full_name: Box<str>,
    pub node_name: Box<str>,
    pub unit_addr: Box<str>,
    pub children: Vec<usize>,
    pub props: Vec<Property>,
    pub node_type: NodeType,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeType {
    Device,
    Description,
}

impl DeviceTree {
    pub fn is_root(&self, node: &Node) -> bool {
        self.get_parent(node).node_id == node.node_id
    }
    fn full_path(&self, node: &Node) -> String {
        if self.is_root(node) {
            String::new()
        } else {
            self.full_path(self.get_parent(node)) + "/" + node.full_name.as_ref()
        }
    }
    /// Absolute path of `node`, `/` for the root.
    pub fn get_full_path(&self, node: &Node) -> Box<str> {
        let path = self.full_path(node);
        if path.is_empty() {
            Box::from("/")
        } else {
            path.into_boxed_str()
        }
    }
    pub fn root(&self) -> &Node {
        &self.container[self.root_id]
    }
    pub fn get_node_by_id(&self, node_id: usize) -> Option<&Node> {
        self.container.get(node_id)
    }
    pub fn get_parent(&self, node: &Node) -> &Node {
        &self.container[node.parent_id]
    }
    pub fn get_children<'b>(&'b self, node: &Node) -> impl Iterator<Item = &'b Node> {
        node.children.iter().map(|x| &self.container[*x])
    }
    pub fn child_count(&self, node: &Node) -> usize {
        node.children.len()
    }
    pub fn get_property<'b>(&self, node: &'b Node, name: impl AsRef<str>) -> Option<&'b Property> {
        let name = name.as_ref();
        node.props.iter().find(|prop| prop.name.as_ref() == name)
    }
    /// Read the first cell of property `name`.
    pub fn read_u32(&self, node: &Node, name: impl AsRef<str>) -> Result<u32, PropertyError> {
        self.get_property(node, name)
            .ok_or(PropertyError::PropNotFound)?
            .value_as_u32()
    }
    /// Entries of the `compatible` property, empty when absent.
    pub fn get_compatible<'b>(&self, node: &'b Node) -> Vec<&'b str> {
        self.get_property(node, "compatible")
            .and_then(|prop| prop.value_as_strlist().ok())
            .unwrap_or_default()
    }
    pub fn is_compatible(&self, node: &Node, comp: &str) -> bool {
        self.get_compatible(node).contains(&comp)
    }
    fn find_node_id(&self, path: &str) -> Option<usize> {
        let mut node = self.root();
        for section in path.split('/') {
            if section.trim().is_empty() {
                continue;
            }
            node = self
                .get_children(node)
                .find(|subnode| subnode.full_name.as_ref() == section)?;
        }
        Some(node.node_id)
    }
    pub fn get_node(&self, path: impl AsRef<str>) -> Option<&Node> {
        let id = self.find_node_id(path.as_ref())?;
        Some(&self.container[id])
    }
    pub fn get_node_mut(&mut self, path: impl AsRef<str>) -> Option<&mut Node> {
        let id = self.find_node_id(path.as_ref())?;
        Some(&mut self.container[id])
    }
    /// Resolve a path where each section may be `*`, a full name or a bare node name.
    pub fn get_nodes(&self, path: impl AsRef<str>) -> Vec<&Node> {
        let path: Vec<&str> = path.as_ref().split('/').collect();
        self.get_sub_nodes(self.root(), &path, 0)
    }
    pub fn get_nodes_mut<F: Fn(&mut Node)>(&mut self, path: impl AsRef<str>, f: F) {
        let ids: Vec<usize> = self.get_nodes(path).iter().map(|x| x.node_id).collect();
        for id in ids {
            f(&mut self.container[id]);
        }
    }
    fn get_sub_nodes<'b>(&'b self, node: &'b Node, path: &[&str], mut cursor: usize) -> Vec<&'b Node> {
        while cursor < path.len() && path[cursor].trim().is_empty() {
            cursor += 1;
        }
        if cursor >= path.len() {
            return vec![node];
        }
        let sec = path[cursor];
        self.get_children(node)
            .flat_map(|child| {
                if sec == "*" || child.full_name.as_ref() == sec || child.node_name.as_ref() == sec {
                    self.get_sub_nodes(child, path, cursor + 1)
                } else {
                    vec![]
                }
            })
            .collect()
    }
    pub fn get_node_by_phandle(&self, phandle: usize) -> Result<&Node, PropertyError> {
        let path = self
            .phandle_map
            .get(&phandle)
            .ok_or(PropertyError::DanglingHandle)?;
        self.get_node(path).ok_or(PropertyError::DanglingHandle)
    }
    /// Decode `reg` into address ranges using the parent's `#address-cells` and `#size-cells`.
    pub fn get_reg_value(&self, node: &Node) -> Result<Vec<Range<usize>>, PropertyError> {
        let mut size_cel = 1;
        let mut addr_cel = 2;
        if !self.is_root(node) {
            let parent = self.get_parent(node);
            if let Some(prop) = self.get_property(parent, "#address-cells") {
                addr_cel = prop.value_as_u32()? as usize;
            }
            if let Some(prop) = self.get_property(parent, "#size-cells") {
                size_cel = prop.value_as_u32()? as usize;
            }
        }
        let reg = self
            .get_property(node, "reg")
            .ok_or(PropertyError::PropNotFound)?
            .value_as_cells()?;
        let width = size_cel + addr_cel;
        if width == 0 || reg.len() % width != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        let fold = |cells: &[u32]| {
            if cells.len() > 2 {
                return Err(PropertyError::InvalidPropFormat);
            }
            let value = cells
                .iter()
                .fold(0u64, |acc, cell| (acc << 32) | u64::from(*cell));
            usize::try_from(value).map_err(|_| PropertyError::InvalidPropFormat)
        };
        reg.chunks_exact(width)
            .map(|entry| {
                let addr = fold(&entry[..addr_cel])?;
                let sz = fold(&entry[addr_cel..])?;
                let end = addr.checked_add(sz).ok_or(PropertyError::InvalidPropFormat)?;
                Ok(addr..end)
            })
            .collect()
    }
}
