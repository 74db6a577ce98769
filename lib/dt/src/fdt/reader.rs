use core::{mem::swap, ops::Range, str};

use crate::{
    fdt::{FDT_HEADER_SIZE, FdtError, FdtHeader, FdtNodeType},
    node::{DeviceTree, Node, NodeType},
    prop::Property,
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, vec, vec::Vec};
use utils::{
    endian::{BigEndian32, BigEndian64, EndianData},
    num::checked_align_up,
};

pub struct FdtReader<'a> {
    blob: &'a [u8],
    cursor: usize,
    nodes: Vec<Node>,
}

/// Basic Reader Functions
impl<'a> FdtReader<'a> {
    /// Read a 32-bit big-endian word at the cursor without advancing.
    #[inline(always)]
    fn peek_u32(&self) -> Result<u32, FdtError> {
        self.word_at(self.cursor)
    }

    /// Advance the cursor by 4 bytes.
    #[inline(always)]
    fn advance(&mut self) {
        self.cursor += 4;
    }

    /// Advance the cursor by `step` bytes and align it to 4 bytes.
    #[inline(always)]
    fn advance_bytes_aligned(&mut self, step: usize) -> Result<(), FdtError> {
        self.cursor = self
            .cursor
            .checked_add(step)
            .and_then(|pos| checked_align_up(pos, 4))
            .ok_or(FdtError::Truncated {
                offset: self.cursor,
            })?;
        Ok(())
    }

    /// Read a 32-bit big-endian word and advance the cursor by 4 bytes.
    #[inline(always)]
    fn read_u32(&mut self) -> Result<u32, FdtError> {
        let res = self.peek_u32()?;
        self.advance();
        Ok(res)
    }

    /// Read `len` bytes at the cursor and advance to the next 4-byte aligned position.
    fn readbytes_aligned(&mut self, len: usize) -> Result<&'a [u8], FdtError> {
        let res = self.bytes_at(self.cursor, len)?;
        self.advance_bytes_aligned(len)?;
        Ok(res)
    }

    /// Advance past zero words and NOPs to the next meaningful token.
    fn skip(&mut self) -> Result<(), FdtError> {
        let mut p = self.peek_u32()?;
        while p == 0 || p == FdtNodeType::FDT_NOP.bits() {
            self.advance();
            p = self.peek_u32()?;
        }
        Ok(())
    }

    /// Read a NUL-terminated string at the cursor and advance to the next aligned position.
    fn readstr_aligned(&mut self) -> Result<&'a str, FdtError> {
        let res = self.str_at(self.cursor)?;
        self.advance_bytes_aligned(res.len() + 1)?;
        Ok(res)
    }

    /// Read a tag word and verify it equals `supposed`.
    ///
    /// Returns `Ok(())` if the tag matches, otherwise returns
    /// `FdtError::InvalidNodeType` with the current tag and cursor.
    fn read_and_check(&mut self, supposed: FdtNodeType) -> Result<(), FdtError> {
        let node_type = self.read_u32()?;
        if node_type != supposed.bits() {
            return Err(FdtError::InvalidNodeType {
                node_type: node_type as usize,
                cursor: self.cursor,
            });
        }
        Ok(())
    }
}

impl<'a> FdtReader<'a> {
    /// Expected FDT magic number (0xd00dfeed).
    pub const FDT_MAGIC: u32 = 0xd00dfeed;
    /// The FDT version this parser targets.
    pub const FDT_VERSION: usize = 17;
    /// The last compatible FDT version accepted by this parser.
    pub const LAST_COMP_VERSION: usize = 16;

    /// Create a reader over an FDT blob.
    ///
    /// This does not validate the blob; [Self::read] calls [Self::validate] first.
    pub fn new(blob: &'a [u8]) -> FdtReader<'a> {
        FdtReader {
            blob,
            cursor: 0,
            nodes: vec![],
        }
    }

    // region: helper methods:

    /// End of the readable area: `totalsize` clamped to the blob length.
    fn limit(&self) -> usize {
        match BigEndian32::read_from(self.blob.get(4..).unwrap_or_default()) {
            Some(total) => (total as usize).min(self.blob.len()),
            None => self.blob.len(),
        }
    }

    fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8], FdtError> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.limit())
            .ok_or(FdtError::Truncated { offset })?;
        Ok(&self.blob[offset..end])
    }

    fn word_at(&self, offset: usize) -> Result<u32, FdtError> {
        BigEndian32::read_from(self.bytes_at(offset, 4)?).ok_or(FdtError::Truncated { offset })
    }

    fn str_at(&self, offset: usize) -> Result<&'a str, FdtError> {
        let tail = self
            .blob
            .get(offset..self.limit())
            .ok_or(FdtError::Truncated { offset })?;
        let len = tail
            .iter()
            .position(|b| *b == 0)
            .ok_or(FdtError::Truncated { offset })?;
        str::from_utf8(&tail[..len]).map_err(|_| FdtError::InvalidString { offset })
    }

    // endregion

    /// Decode the FDT header.
    pub fn get_header(&self) -> Result<FdtHeader, FdtError> {
        if self.blob.len() < FDT_HEADER_SIZE {
            return Err(FdtError::Truncated {
                offset: self.blob.len(),
            });
        }
        let word = |idx: usize| {
            BigEndian32::read_from(&self.blob[idx * 4..])
                .map(BigEndian32::from_value)
                .ok_or(FdtError::Truncated { offset: idx * 4 })
        };
        Ok(FdtHeader {
            magic: word(0)?,
            totalsize: word(1)?,
            off_dt_struct: word(2)?,
            off_dt_strings: word(3)?,
            off_mem_rsvmap: word(4)?,
            version: word(5)?,
            last_comp_version: word(6)?,
            boot_cpuid_phys: word(7)?,
            size_dt_strings: word(8)?,
            size_dt_struct: word(9)?,
        })
    }

    /// Validate the FDT header (magic number, size and compatible version range).
    ///
    /// Returns `Ok(())` on success, or an `FdtError` describing the failure.
    pub fn validate(&self) -> Result<(), FdtError> {
        let header = self.get_header()?;
        let magic = header.magic.value();

        // 1. Check the magic number
        if magic != Self::FDT_MAGIC {
            return Err(FdtError::InvalidMagic {
                magic: magic as usize,
            });
        }

        // 2. The blob must hold everything the header claims
        let total = header.totalsize.value() as usize;
        if total > self.blob.len() || total < FDT_HEADER_SIZE {
            return Err(FdtError::Truncated {
                offset: self.blob.len(),
            });
        }

        // 3. Check the fdt version. We use version 17, and the last compatible version is 16
        let version = header.version.value();
        if version < Self::LAST_COMP_VERSION as u32
            || header.last_comp_version.value() > Self::FDT_VERSION as u32
        {
            return Err(FdtError::IncompatibleVersion {
                version: version as usize,
            });
        }
        Ok(())
    }

    /// Read a null-terminated string from the FDT string table at `offset`.
    pub fn get_string(&self, offset: usize) -> Result<&'a str, FdtError> {
        let base = self.get_header()?.off_dt_strings.value() as usize;
        let offset = base
            .checked_add(offset)
            .ok_or(FdtError::Truncated { offset: base })?;
        self.str_at(offset)
    }

    /// Read consecutive property entries from the structure block and return them.
    ///
    /// Stops when a non-`FDT_PROP` tag is encountered and returns the collected props.
    fn read_props(&mut self) -> Result<Vec<Property>, FdtError> {
        let mut res = Vec::<Property>::new();
        loop {
            self.skip()?;
            if self.peek_u32()? != FdtNodeType::FDT_PROP.bits() {
                break Ok(res);
            }
            self.advance();
            let len = self.read_u32()? as usize;
            let name_offset = self.read_u32()? as usize;
            let name = self.get_string(name_offset)?;
            let data = self.readbytes_aligned(len)?;
            res.push(Property::new(name, data));
        }
    }

    /// Parse a single node (name, properties and child nodes) from the structure block without setting its parent.
    ///
    /// Recursively parses subnodes until the matching `FDT_END_NODE` is found.
    fn read_node(&mut self) -> Result<usize, FdtError> {
        self.skip()?;
        self.read_and_check(FdtNodeType::FDT_BEGIN_NODE)?;
        let full_name = self.readstr_aligned()?;
        let (node_name, unit_addr) = full_name.split_once('@').unwrap_or((full_name, ""));
        let props = self.read_props()?;
        let mut children = vec![];
        loop {
            self.skip()?;
            let nodetype = self.peek_u32()?;
            if nodetype == FdtNodeType::FDT_BEGIN_NODE.bits() {
                children.push(self.read_node()?);
            } else if nodetype == FdtNodeType::FDT_END_NODE.bits() {
                self.advance();
                break;
            } else {
                return Err(FdtError::InvalidNodeType {
                    node_type: nodetype as usize,
                    cursor: self.cursor,
                });
            }
        }
        let id = self.nodes.len();
        let node = Node {
            node_id: id,
            parent_id: 0,
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            children,
            props,
            node_type: NodeType::Device,
        };
        self.nodes.push(node);
        Ok(id)
    }

    fn set_parent(&mut self, node_id: usize) {
        for child_idx in 0..self.nodes[node_id].children.len() {
            let sub_id = self.nodes[node_id].children[child_idx];
            self.nodes[sub_id].parent_id = node_id;
            self.set_parent(sub_id);
        }
    }

    /// Get the memory reservation map. The reserved memory block is not aligned.
    ///
    /// **The reserved memory block are not promised to be not overlapped**
    fn get_mem_rsv_map(&self) -> Result<Vec<Range<usize>>, FdtError> {
        let mut offset = self.get_header()?.off_mem_rsvmap.value() as usize;
        let mut res = Vec::new();
        loop {
            let entry = self.bytes_at(offset, 16)?;
            let addr = BigEndian64::read_from(entry).ok_or(FdtError::Truncated { offset })?;
            let size = BigEndian64::read_from(&entry[8..]).ok_or(FdtError::Truncated { offset })?;
            if addr == 0 && size == 0 {
                break;
            }
            res.push((addr as usize)..(addr.saturating_add(size) as usize));
            offset += 16;
        }
        Ok(res)
    }

    fn read_internal(&mut self) -> Result<DeviceTree, FdtError> {
        self.validate()?;
        self.cursor = self.get_header()?.off_dt_struct.value() as usize;
        let root_id = self.read_node()?;
        self.set_parent(root_id);
        self.nodes[root_id].parent_id = root_id;
        self.skip()?;
        self.read_and_check(FdtNodeType::FDT_END)?;

        let mut tree = DeviceTree {
            root_id,
            container: vec![],
            mem_rsv_map: self.get_mem_rsv_map()?,
            phandle_map: BTreeMap::new(),
        };
        swap(&mut self.nodes, &mut tree.container);
        let phandles: Vec<(usize, Box<str>)> = tree
            .container
            .iter()
            .filter_map(|node| {
                let prop = tree
                    .get_property(node, "phandle")
                    .or_else(|| tree.get_property(node, "linux,phandle"))?;
                let phandle = prop.value_as_u32().ok()?;
                Some((phandle as usize, tree.get_full_path(node)))
            })
            .collect();
        for (phandle, path) in phandles {
            if let Some(prev) = tree.phandle_map.insert(phandle, path) {
                log::warn!("Duplicated phandle {:#x}, replacing '{}'.", phandle, prev);
            }
        }
        for path in ["/aliases", "/reserved-memory", "/chosen", "/__symbols__"] {
            if let Some(node) = tree.get_node_mut(path) {
                node.node_type = NodeType::Description;
            }
        }
        tree.get_nodes_mut("/memory", |node| {
            node.node_type = NodeType::Description;
        });
        Ok(tree)
    }

    /// Parse the entire structure block into a [DeviceTree].
    ///
    /// All strings and byte-array data are **copied**, so the blob can be dropped afterwards.
    pub fn read(&mut self) -> Result<DeviceTree, FdtError> {
        match self.read_internal() {
            Ok(res) => Ok(res),
            Err(err) => {
                self.cursor = 0;
                self.nodes.clear();
                Err(err)
            }
        }
    }
}

impl DeviceTree {
    /// Parse a flattened device tree blob.
    pub fn from_fdt(blob: &[u8]) -> Result<DeviceTree, FdtError> {
        FdtReader::new(blob).read()
    }
}
