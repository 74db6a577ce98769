//! Serialise a device tree into a flattened blob (version 17).
//!
//! Nodes are emitted in call order: [FdtBuilder::begin_node] opens a node,
//! properties attach to the innermost open node, [FdtBuilder::end_node] closes it.
use crate::fdt::{FDT_HEADER_SIZE, FdtError, FdtNodeType, reader::FdtReader};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, vec::Vec};
use utils::num::AlignableTo;

pub struct FdtBuilder {
    structure: Vec<u8>,
    strings: Vec<u8>,
    string_offsets: BTreeMap<Box<str>, u32>,
    mem_rsv: Vec<(u64, u64)>,
    depth: usize,
    unbalanced: bool,
}

impl Default for FdtBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FdtBuilder {
    pub fn new() -> FdtBuilder {
        FdtBuilder {
            structure: Vec::new(),
            strings: Vec::new(),
            string_offsets: BTreeMap::new(),
            mem_rsv: Vec::new(),
            depth: 0,
            unbalanced: false,
        }
    }

    fn push_u32(&mut self, value: u32) {
        self.structure.extend_from_slice(&value.to_be_bytes());
    }

    fn pad(&mut self) {
        let len = self.structure.len().align_up(4);
        self.structure.resize(len, 0);
    }

    fn string_offset(&mut self, name: &str) -> u32 {
        if let Some(offset) = self.string_offsets.get(name) {
            return *offset;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.string_offsets.insert(Box::from(name), offset);
        offset
    }

    /// Open a node; the root node is named `""`.
    pub fn begin_node(&mut self, name: &str) -> &mut Self {
        self.push_u32(FdtNodeType::FDT_BEGIN_NODE.bits());
        self.structure.extend_from_slice(name.as_bytes());
        self.structure.push(0);
        self.pad();
        self.depth += 1;
        self
    }

    pub fn end_node(&mut self) -> &mut Self {
        if self.depth == 0 {
            self.unbalanced = true;
            return self;
        }
        self.push_u32(FdtNodeType::FDT_END_NODE.bits());
        self.depth -= 1;
        self
    }

    pub fn property(&mut self, name: &str, data: &[u8]) -> &mut Self {
        let name_offset = self.string_offset(name);
        self.push_u32(FdtNodeType::FDT_PROP.bits());
        self.push_u32(data.len() as u32);
        self.push_u32(name_offset);
        self.structure.extend_from_slice(data);
        self.pad();
        self
    }

    pub fn property_empty(&mut self, name: &str) -> &mut Self {
        self.property(name, &[])
    }

    pub fn property_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.property(name, &value.to_be_bytes())
    }

    pub fn property_cells(&mut self, name: &str, cells: &[u32]) -> &mut Self {
        let data: Vec<u8> = cells.iter().flat_map(|cell| cell.to_be_bytes()).collect();
        self.property(name, &data)
    }

    pub fn property_str(&mut self, name: &str, value: &str) -> &mut Self {
        self.property_strlist(name, &[value])
    }

    pub fn property_strlist(&mut self, name: &str, values: &[&str]) -> &mut Self {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.property(name, &data)
    }

    pub fn reserve_memory(&mut self, addr: u64, size: u64) -> &mut Self {
        self.mem_rsv.push((addr, size));
        self
    }

    /// Lay out header, reservation map, structure and strings blocks.
    pub fn finish(&mut self) -> Result<Vec<u8>, FdtError> {
        if self.depth != 0 || self.unbalanced {
            return Err(FdtError::UnbalancedNodes { depth: self.depth });
        }
        self.push_u32(FdtNodeType::FDT_END.bits());

        let off_mem_rsvmap = FDT_HEADER_SIZE.align_up(8);
        let off_dt_struct = off_mem_rsvmap + (self.mem_rsv.len() + 1) * 16;
        let off_dt_strings = off_dt_struct + self.structure.len();
        let totalsize = off_dt_strings + self.strings.len();

        let mut blob = Vec::with_capacity(totalsize);
        for word in [
            FdtReader::FDT_MAGIC,
            totalsize as u32,
            off_dt_struct as u32,
            off_dt_strings as u32,
            off_mem_rsvmap as u32,
            FdtReader::FDT_VERSION as u32,
            FdtReader::LAST_COMP_VERSION as u32,
            0,
            self.strings.len() as u32,
            self.structure.len() as u32,
        ] {
            blob.extend_from_slice(&word.to_be_bytes());
        }
        blob.resize(off_mem_rsvmap, 0);
        for (addr, size) in self.mem_rsv.iter().chain([(0, 0)].iter()) {
            blob.extend_from_slice(&addr.to_be_bytes());
            blob.extend_from_slice(&size.to_be_bytes());
        }
        blob.extend_from_slice(&self.structure);
        blob.extend_from_slice(&self.strings);
        Ok(blob)
    }
}
